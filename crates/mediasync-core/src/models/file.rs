use bytes::Bytes;

/// A file attached to a write request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
