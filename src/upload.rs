//! Media upload collaborator.
//!
//! Uploads one file as a multipart form and normalizes every outcome into
//! an [`UploadResult`]. HTTP failures, error bodies and transport exceptions
//! all become `UploadResult::Failed`; nothing here returns `Err`.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Anything other than `"video"` is treated as an image.
    #[must_use]
    pub fn from_file_type(raw: Option<&str>) -> Self {
        if raw == Some("video") { Self::Video } else { Self::Image }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    fn article(self) -> &'static str {
        match self {
            Self::Image => "an",
            Self::Video => "a",
        }
    }
}

/// Outcome of one upload, as reported to the chat controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadResult {
    Uploaded { filename: String, media: MediaKind, message: Option<String> },
    Failed { error: String },
}

/// User turn announcing a finished upload to the agents.
#[must_use]
pub fn upload_prompt(filename: &str, media: MediaKind) -> String {
    let kind = media.as_str();
    format!("I just uploaded {} {kind}: {filename}. Can you help me with this {kind}?", media.article())
}

#[derive(Deserialize)]
struct UploadAccepted {
    filename: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
}

#[derive(Deserialize)]
struct UploadRejected {
    error: String,
}

/// Map an HTTP status and body to an [`UploadResult`].
#[must_use]
pub fn normalize_response(status: StatusCode, body: &str) -> UploadResult {
    if status.is_success() {
        return match serde_json::from_str::<UploadAccepted>(body) {
            Ok(accepted) => UploadResult::Uploaded {
                media: MediaKind::from_file_type(accepted.file_type.as_deref()),
                filename: accepted.filename,
                message: accepted.message,
            },
            Err(e) => UploadResult::Failed { error: format!("invalid upload response: {e}") },
        };
    }

    match serde_json::from_str::<UploadRejected>(body) {
        Ok(rejected) => UploadResult::Failed { error: rejected.error },
        Err(_) => UploadResult::Failed { error: format!("HTTP {}", status.as_u16()) },
    }
}

/// Best-effort content type from a file extension.
fn guess_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// HTTP client for the upload endpoint.
#[derive(Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    url: String,
}

impl UploadClient {
    /// # Errors
    ///
    /// Fails only if the underlying HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }

    /// Read `path` and upload its contents under the file's own name.
    pub async fn upload_file(&self, path: &Path) -> UploadResult {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return UploadResult::Failed { error: format!("cannot read {}: {e}", path.display()) },
        };
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_owned();
        self.upload_bytes(file_name, bytes).await
    }

    /// Upload in-memory bytes as the form's `file` field.
    pub async fn upload_bytes(&self, file_name: String, bytes: Vec<u8>) -> UploadResult {
        let mime = guess_mime(&file_name);
        let mut part = Part::bytes(bytes).file_name(file_name);
        if let Some(mime) = mime {
            part = match part.mime_str(mime) {
                Ok(part) => part,
                Err(e) => return UploadResult::Failed { error: e.to_string() },
            };
        }
        let form = Form::new().part("file", part);

        let response = match self.http.post(&self.url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "upload request failed");
                return UploadResult::Failed { error: e.to_string() };
            }
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => normalize_response(status, &body),
            Err(e) => UploadResult::Failed { error: e.to_string() },
        }
    }
}
