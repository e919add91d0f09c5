// Background relay: owns the backend call and every write to the shared
// store. Runs as one long-lived task; requesters come and go.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::TranscriptionBackend;
use crate::cache::ResultCache;
use crate::error::RelayError;
use crate::protocol::{RelayRequest, RelayResponse, TranscriptPayload};

/// How a finished transcription reaches the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Write to the result cache and reply with the key.
    #[default]
    Storage,
    /// Carry the payload in the reply itself.
    Direct,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RelayOptions {
    pub transfer: TransferMode,
    /// Keep the backend's `base64_webm` audio alongside the text.
    pub forward_audio: bool,
}

pub struct Relay {
    backend: Arc<dyn TranscriptionBackend>,
    cache: ResultCache,
    options: RelayOptions,
}

impl Relay {
    pub fn new(
        backend: Arc<dyn TranscriptionBackend>,
        cache: ResultCache,
        options: RelayOptions,
    ) -> Self {
        Self {
            backend,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn options(&self) -> RelayOptions {
        self.options
    }

    /// Serve one request. Always yields exactly one response; failures are
    /// logged in full here and reduced to their one-line message.
    pub async fn handle(&self, request: &RelayRequest) -> RelayResponse {
        match self.process(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    video_url = request.video_url(),
                    error = ?e,
                    "Relay request failed"
                );
                RelayResponse::failed(e.to_string())
            }
        }
    }

    async fn process(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError> {
        let RelayRequest::FetchMp3 { video_url } = request;
        tracing::info!(video_url = %video_url, "Fetching transcription");

        let data = self.backend.fetch_mp3(video_url).await?;

        if let Some(message) = data.error.as_deref().filter(|m| !m.is_empty()) {
            return Err(RelayError::BackendLogic(message.to_string()));
        }

        let text = data
            .transcription()
            .ok_or_else(|| {
                RelayError::MalformedBackendResponse(
                    "no transcription_response or response.transcription_text".to_string(),
                )
            })?
            .to_string();

        let payload = TranscriptPayload {
            text,
            audio_base64: if self.options.forward_audio {
                data.base64_webm
            } else {
                None
            },
        };

        match self.options.transfer {
            TransferMode::Direct => Ok(RelayResponse::Direct(payload)),
            TransferMode::Storage => {
                let storage_key = self.cache.put(payload).await?;
                tracing::info!(
                    video_url = %video_url,
                    storage_key = %storage_key,
                    "Transcription ready"
                );
                Ok(RelayResponse::stored(storage_key))
            }
        }
    }
}

struct Envelope {
    request: RelayRequest,
    reply: oneshot::Sender<RelayResponse>,
}

/// Sending side of the relay's message channel. Cheap to clone; the relay
/// task stops once every handle is dropped.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Envelope>,
}

impl RelayHandle {
    /// Queue one request; the receiver fires with its only reply.
    pub async fn dispatch(
        &self,
        request: RelayRequest,
    ) -> Result<oneshot::Receiver<RelayResponse>, RelayError> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| RelayError::ChannelClosed)?;

        Ok(response)
    }

    /// Deliver one request and wait for its reply.
    pub async fn send_message(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        self.dispatch(request)
            .await?
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }
}

/// Start the relay on the current runtime.
///
/// Each request is served on its own task, so a slow backend call never
/// holds up the next message.
pub fn spawn(relay: Relay, channel_capacity: usize) -> (RelayHandle, JoinHandle<()>) {
    let relay = Arc::new(relay);
    let (tx, mut rx) = mpsc::channel::<Envelope>(channel_capacity.max(1));

    let task = tokio::spawn(async move {
        tracing::info!(transfer = ?relay.options().transfer, "Relay ready");

        while let Some(Envelope { request, reply }) = rx.recv().await {
            let relay = relay.clone();
            tokio::spawn(async move {
                let response = relay.handle(&request).await;

                if let Err(unsent) = reply.send(response) {
                    tracing::warn!(
                        video_url = request.video_url(),
                        "Requester gone before the response was delivered"
                    );
                    if let RelayResponse::Stored { storage_key, .. } = unsent {
                        relay.cache().discard(&storage_key).await;
                    }
                }
            });
        }

        tracing::info!("Relay stopped");
    });

    (RelayHandle { tx }, task)
}
