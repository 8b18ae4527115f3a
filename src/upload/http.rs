use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::{ProgressCallback, UploadService};
use super::validate::{validate_upload, UploadFile};
use crate::app::{ApiConfig, UploadConfig};
use crate::auth::TokenStore;
use crate::gateway::{endpoint, parse_base_url, unwrap_envelope};
use crate::models::UploadResult;
use crate::utils::{Result, TaxChatError};

/// Multipart uploader for `POST /conversations/{id}/upload`
pub struct HttpUploader {
    client: Client,
    base_url: Url,
    tokens: TokenStore,
    max_file_size: u64,
    chunk_size: usize,
}

impl HttpUploader {
    pub fn new(api: &ApiConfig, upload: &UploadConfig, tokens: TokenStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(upload.timeout())
            .build()
            .map_err(|e| TaxChatError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_base_url(&api.base_url)?,
            tokens,
            max_file_size: upload.max_file_size,
            chunk_size: upload.chunk_size.max(1),
        })
    }

    async fn send(
        &self,
        conversation_id: &str,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult> {
        let size = file.size();
        let mime_type = file.mime_type.clone();
        let body = progress_body(file.data, self.chunk_size, progress.clone());

        let mut part = Part::stream_with_length(body, size).file_name(file.name.clone());
        if !mime_type.is_empty() {
            part = part
                .mime_str(&mime_type)
                .map_err(|e| TaxChatError::UploadRejected(e.to_string()))?;
        }

        let form = Form::new()
            .part("file", part)
            .text("originalName", file.name)
            .text("mimeType", mime_type)
            .text("size", size.to_string());

        let url = endpoint(&self.base_url, &["conversations", conversation_id, "upload"]);
        let mut request = self.client.post(url).multipart(form);
        if let Some(token) = self.tokens.access_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!("Upload failed with {}", status.as_u16());
            return Err(TaxChatError::from_status(status.as_u16(), &text));
        }

        let result = parse_upload_response(&text)?;
        if let Some(callback) = progress {
            callback(100);
        }
        info!("Uploaded {} ({} bytes)", result.original_name, result.size);
        Ok(result)
    }
}

#[async_trait]
impl UploadService for HttpUploader {
    async fn upload(
        &self,
        conversation_id: &str,
        file: UploadFile,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<UploadResult> {
        validate_upload(conversation_id, &file, self.max_file_size)?;
        debug!(
            "Uploading {} ({} bytes, {}) to {}",
            file.name,
            file.size(),
            file.mime_type,
            conversation_id
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Upload cancelled");
                Err(TaxChatError::UploadCancelled)
            }
            result = self.send(conversation_id, file, progress) => result,
        }
    }
}

/// Whole-number share of `total` covered by `done`
pub(crate) fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Body that reports progress as each chunk is handed to the transport
fn progress_body(data: Bytes, chunk_size: usize, progress: Option<ProgressCallback>) -> Body {
    Body::wrap_stream(progress_stream(data, chunk_size, progress))
}

fn progress_stream(
    data: Bytes,
    chunk_size: usize,
    progress: Option<ProgressCallback>,
) -> impl futures::Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(chunk_size)
        .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
        .collect();

    let mut sent = 0u64;
    stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(callback) = &progress {
            callback(percent(sent, total));
        }
        Ok(chunk)
    }))
}

fn parse_upload_response(text: &str) -> Result<UploadResult> {
    let invalid = || TaxChatError::InvalidResponse("Invalid response from server".to_string());
    let body: Value = serde_json::from_str(text).map_err(|_| invalid())?;
    let data = unwrap_envelope(body)?;
    let file = data.get("file").cloned().ok_or_else(invalid)?;
    serde_json::from_value(file).map_err(|_| invalid())
}
