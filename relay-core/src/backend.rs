// Client for the local transcription backend (`POST /fetch_mp3`).

use async_trait::async_trait;

use crate::error::RelayError;
use crate::protocol::{BackendRequest, BackendResponse};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/fetch_mp3";
pub const EXTENSION_ID_HEADER: &str = "X-Extension-Id";

/// One request/response exchange with whatever produces transcriptions.
///
/// Implementations only report transport and HTTP-level failures; a 2xx
/// body is returned as-is for the relay to classify.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn fetch_mp3(&self, video_url: &str) -> Result<BackendResponse, RelayError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    extension_id: String,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, extension_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            extension_id: extension_id.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TranscriptionBackend for HttpBackend {
    async fn fetch_mp3(&self, video_url: &str) -> Result<BackendResponse, RelayError> {
        tracing::debug!(video_url, backend = %self.url, "Calling transcription backend");

        let resp = self
            .client
            .post(&self.url)
            .header(EXTENSION_ID_HEADER, &self.extension_id)
            .json(&BackendRequest { video_url })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(video_url, error = ?e, "Backend request failed");
                RelayError::BackendUnreachable(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "Unknown".to_string());
            return Err(RelayError::BackendHttp {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| RelayError::BackendUnreachable(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(video_url, error = ?e, body = %body, "Backend returned invalid JSON");
            RelayError::MalformedBackendResponse(e.to_string())
        })
    }
}
