//! Popup ↔ background relay for video transcription.
//!
//! A short-lived [`Requester`] asks the long-lived [`Relay`] to fetch a
//! transcription from the local backend. The relay either answers inline or
//! parks the result in a [`ResultCache`] and answers with its key, so the
//! result outlives the requester if needed and is swept once it expires.

pub mod analytics;
pub mod backend;
pub mod cache;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod requester;
pub mod store;

// Re-export commonly used items
pub use analytics::{video_id_from_url, AnalyticsClient, AnalyticsReport};
pub use backend::{HttpBackend, TranscriptionBackend};
pub use cache::ResultCache;
pub use error::{RelayError, StoreError};
pub use protocol::{RelayRequest, RelayResponse, TranscriptPayload};
pub use relay::{Relay, RelayHandle, RelayOptions, TransferMode};
pub use requester::{HostCapabilities, PendingTranscript, Requester};
pub use store::{FileStore, MemoryStore, SharedStore};
