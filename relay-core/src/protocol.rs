// Messages exchanged between the popup side and the background relay,
// plus the JSON shape returned by the transcription backend.

use serde::{Deserialize, Serialize};

/// Message sent by a requester to the relay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "action")]
pub enum RelayRequest {
    #[serde(rename = "fetchMp3")]
    FetchMp3 {
        #[serde(rename = "videoUrl")]
        video_url: String,
    },
}

impl RelayRequest {
    pub fn fetch_mp3(video_url: impl Into<String>) -> Self {
        RelayRequest::FetchMp3 {
            video_url: video_url.into(),
        }
    }

    pub fn video_url(&self) -> &str {
        match self {
            RelayRequest::FetchMp3 { video_url } => video_url,
        }
    }
}

/// Transcription result as it travels to the requester, either inline or
/// through a stored entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TranscriptPayload {
    #[serde(rename = "transcription_response")]
    pub text: String,
    #[serde(
        rename = "base64_webm",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_base64: Option<String>,
}

/// The relay's single reply to a request.
///
/// Variant order matters for untagged decoding: `error` and `storageKey`
/// are checked before the payload shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum RelayResponse {
    Failed {
        error: String,
    },
    Stored {
        success: bool,
        #[serde(rename = "storageKey")]
        storage_key: String,
    },
    Direct(TranscriptPayload),
}

impl RelayResponse {
    pub fn stored(storage_key: String) -> Self {
        RelayResponse::Stored {
            success: true,
            storage_key,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        RelayResponse::Failed {
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RelayResponse::Failed { .. })
    }
}

/// Body posted to `/fetch_mp3`.
#[derive(Serialize, Debug)]
pub struct BackendRequest<'a> {
    pub video_url: &'a str,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct NestedTranscription {
    #[serde(default)]
    pub transcription_text: Option<String>,
}

/// JSON returned by the transcription backend on a 2xx status.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct BackendResponse {
    #[serde(default)]
    pub transcription_response: Option<String>,
    #[serde(default)]
    pub response: Option<NestedTranscription>,
    #[serde(default)]
    pub base64_webm: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendResponse {
    /// `transcription_response` wins when non-empty, otherwise
    /// `response.transcription_text`.
    pub fn transcription(&self) -> Option<&str> {
        self.transcription_response
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| {
                self.response
                    .as_ref()
                    .and_then(|nested| nested.transcription_text.as_deref())
            })
    }
}
