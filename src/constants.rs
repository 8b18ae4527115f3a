/// Constants module to avoid magic numbers in the codebase

// Network Configuration
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TOKEN_ENV: &str = "TAXCHAT_TOKEN";
pub const ENV_PREFIX: &str = "TAXCHAT_";

// Timeouts
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const UPLOAD_TIMEOUT_SECS: u64 = 300; // 5 minutes for large attachments
pub const ERROR_DISMISS_SECS: u64 = 7;

// Conversation titles
pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";
pub const TITLE_MAX_CHARS: usize = 50;
pub const TITLE_ELLIPSIS: &str = "...";

// Uploads
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024; // 50MB
pub const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub const ALLOWED_UPLOAD_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
    // Audio
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/webm",
    // Video
    "video/mp4",
    "video/webm",
    "video/ogg",
];

// Extension lookup used when a file is picked from disk
pub const UPLOAD_EXTENSION_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("weba", "audio/webm"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogv", "video/ogg"),
];
