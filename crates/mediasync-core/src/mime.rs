//! MIME type and filename helpers

/// File extension associated with a MIME type, lowercase.
///
/// When the MIME subtype is itself a known extension (`image/png`, `image/jpeg`)
/// it wins over the other registered aliases.
pub fn extension_from_mime_type(mime_type: Option<&str>) -> Option<String> {
    let mime_type = mime_type?.split(';').next()?.trim().to_lowercase();
    if mime_type.is_empty() {
        return None;
    }

    let extensions = mime_guess::get_mime_extensions_str(&mime_type)?;
    let subtype = mime_type.split('/').nth(1).unwrap_or_default();

    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
}

/// Extension of a filename, lowercase. `None` when there is no non-empty suffix.
pub fn extension_from_filename(filename: Option<&str>) -> Option<String> {
    let filename = filename?.trim();
    let (_, extension) = filename.rsplit_once('.')?;
    if extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}

/// MIME type guessed from a filename's extension, `application/octet-stream`
/// when unknown.
pub fn mime_type_from_filename(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Filename without its final extension.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}
