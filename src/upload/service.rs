use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::validate::UploadFile;
use crate::models::UploadResult;
use crate::utils::Result;

/// Progress callback, invoked with a percentage in `0..=100`
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Turns a local file into a durable URL the API can attach to a message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadService: Send + Sync {
    /// Validate and upload `file` into `conversation_id`
    ///
    /// Validation failures are reported as `UploadRejected` without touching
    /// the network; cancelling `cancel` yields `UploadCancelled`.
    async fn upload(
        &self,
        conversation_id: &str,
        file: UploadFile,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<UploadResult>;
}
