use bytes::Bytes;
use std::path::Path;

use crate::constants::{ALLOWED_UPLOAD_TYPES, UPLOAD_EXTENSION_TYPES};
use crate::utils::{Result, TaxChatError};

/// A file picked for attachment, fully buffered
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    /// Empty when the type could not be determined
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, inferring its content type from the extension
    ///
    /// Files over `max_file_size` are rejected from their metadata, before
    /// anything is read into memory.
    pub async fn from_path(path: &Path, max_file_size: u64) -> Result<Self> {
        let size = tokio::fs::metadata(path).await?.len();
        check_size(size, max_file_size)?;
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::new(name, mime_for_path(path), data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Content type for a path, or an empty string for unknown extensions
pub fn mime_for_path(path: &Path) -> String {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return String::new();
    };
    let ext = ext.to_ascii_lowercase();
    UPLOAD_EXTENSION_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| mime.to_string())
        .unwrap_or_default()
}

fn check_size(size: u64, max_file_size: u64) -> Result<()> {
    if size > max_file_size {
        return Err(TaxChatError::UploadRejected(format!(
            "File size exceeds {}MB limit",
            max_file_size / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Reject uploads locally before any network call is made
pub fn validate_upload(conversation_id: &str, file: &UploadFile, max_file_size: u64) -> Result<()> {
    if conversation_id.trim().is_empty() {
        return Err(TaxChatError::UploadRejected(
            "Invalid conversation ID".to_string(),
        ));
    }

    check_size(file.size(), max_file_size)?;

    // An unknown (empty) type is let through for the server to judge
    if !file.mime_type.is_empty() && !ALLOWED_UPLOAD_TYPES.contains(&file.mime_type.as_str()) {
        return Err(TaxChatError::UploadRejected(format!(
            "File type \"{}\" is not supported",
            file.mime_type
        )));
    }

    if file.size() == 0 {
        return Err(TaxChatError::UploadRejected("File is empty".to_string()));
    }

    Ok(())
}
