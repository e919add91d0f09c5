use thiserror::Error;

/// Failure of a single relay round trip.
///
/// `Display` is the one-line summary that crosses from the relay to the
/// requester; `Debug` keeps the detail for the logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("required host capability unavailable: {0}")]
    CapabilityUnavailable(&'static str),

    #[error("HTTP error! status: {status}, body: {body}")]
    BackendHttp { status: u16, body: String },

    #[error("{0}")]
    BackendLogic(String),

    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("malformed backend response: {0}")]
    MalformedBackendResponse(String),

    #[error("failed to store result: {0}")]
    StorageWrite(String),

    #[error("failed to read stored result: {0}")]
    StorageRead(String),

    #[error("no stored result for key {0}")]
    MissingStoredResult(String),

    #[error("{0}")]
    Relayed(String),

    #[error("message channel closed before a response was received")]
    ChannelClosed,
}

/// Failure of a shared store back-end.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store entry is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}
