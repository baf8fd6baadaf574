//! Shared constants

/// Job queue that carries remote transformation work.
pub const TRANSFORMATION_QUEUE: &str = "remote-media";

/// Default collection slug the adapter is attached to.
pub const DEFAULT_COLLECTION: &str = "media";

/// Files above this size are uploaded in chunks (50 MiB).
pub const MULTIPART_THRESHOLD: u64 = 1024 * 1024 * 50;

/// Chunk size used for chunked uploads (20 MiB).
pub const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024 * 20;

/// Width of generated thumbnails, in pixels.
pub const THUMBNAIL_WIDTH: u32 = 320;

/// Image extensions the provider categorizes as `image` resources.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "avif", "gif", "png", "webp", "ai", "bmp", "bw", "djvu", "dng", "ps", "edt", "eps", "eps3",
    "fbx", "flif", "glb", "gltf", "heif", "heic", "ico", "indd", "jpg", "jpe", "jpeg", "jp2",
    "wdp", "jxr", "hdp", "jxl", "ply", "psd", "arw", "cr2", "tga", "tif", "tiff", "u3ma", "usdz",
];

/// Video extensions the provider categorizes as `video` resources.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3g2", "3gp", "avi", "ts", "m2ts", "mts", "mov", "mkv", "mp4", "mpeg", "mpd", "mxf", "ogv",
    "webm", "wmv",
];
