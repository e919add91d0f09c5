// Popup-side wrapper: one async call per transcription, whichever way the
// relay chooses to hand the result back.

use tokio::sync::oneshot;

use crate::cache::ResultCache;
use crate::error::RelayError;
use crate::protocol::{RelayRequest, RelayResponse, TranscriptPayload};
use crate::relay::RelayHandle;

/// What the hosting context exposes to a requester. Either side may be
/// missing, e.g. in a context without storage permission.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    pub messaging: Option<RelayHandle>,
    pub storage: Option<ResultCache>,
}

impl HostCapabilities {
    pub fn new(messaging: RelayHandle, storage: ResultCache) -> Self {
        Self {
            messaging: Some(messaging),
            storage: Some(storage),
        }
    }
}

pub struct Requester {
    capabilities: HostCapabilities,
}

impl Requester {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self { capabilities }
    }

    /// Send one `fetchMp3` request. Nothing is sent when a capability is
    /// missing.
    pub async fn send(&self, video_url: &str) -> Result<PendingTranscript, RelayError> {
        let relay = self
            .capabilities
            .messaging
            .as_ref()
            .ok_or(RelayError::CapabilityUnavailable("runtime messaging"))?;
        let cache = self
            .capabilities
            .storage
            .clone()
            .ok_or(RelayError::CapabilityUnavailable("shared storage"))?;

        let response = relay.dispatch(RelayRequest::fetch_mp3(video_url)).await?;
        tracing::debug!(video_url, "Transcription request sent");

        Ok(PendingTranscript {
            video_url: video_url.to_string(),
            response,
            cache,
        })
    }

    /// `send` followed by `wait`.
    pub async fn fetch_transcript(&self, video_url: &str) -> Result<TranscriptPayload, RelayError> {
        self.send(video_url).await?.wait().await
    }
}

/// A request that has been sent and not yet settled.
///
/// Waiting consumes it, so a settled request cannot be observed again.
/// Dropping it abandons the reply; the relay then discards any stored
/// result.
pub struct PendingTranscript {
    video_url: String,
    response: oneshot::Receiver<RelayResponse>,
    cache: ResultCache,
}

impl PendingTranscript {
    pub async fn wait(self) -> Result<TranscriptPayload, RelayError> {
        let response = self.response.await.map_err(|_| RelayError::ChannelClosed)?;

        let outcome = match response {
            RelayResponse::Failed { error } => Err(RelayError::Relayed(error)),
            RelayResponse::Direct(payload) => Ok(payload),
            RelayResponse::Stored { storage_key, .. } => self.cache.take_once(&storage_key).await,
        };

        match &outcome {
            Ok(_) => tracing::debug!(video_url = %self.video_url, "Transcription resolved"),
            Err(e) => tracing::warn!(video_url = %self.video_url, "Transcription rejected: {}", e),
        }
        outcome
    }
}
