// Gateway module for file uploads - follows the Train Station Pattern
// All external access to upload functionality must go through this gateway

mod http;
mod service;
mod validate;

pub use http::HttpUploader;
pub use service::{ProgressCallback, UploadService};
pub use validate::{mime_for_path, validate_upload, UploadFile};

#[cfg(test)]
pub use service::MockUploadService;
