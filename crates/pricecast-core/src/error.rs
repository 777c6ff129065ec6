//! Error types for the price streaming service.
//!
//! Every error is scoped to a single streaming session. None of them are
//! retried and none of them are reported to the client: by the time one is
//! raised the session is over.
//!
//! ## Error Cases
//! - `Encoding`: the payload could not be serialized into the SSE record.
//! - `InvalidEventName`: the event name would break SSE record framing.
//! - `Transport`: writing or flushing the response failed, usually because the
//!   client went away.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the price streaming service.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The payload could not be encoded as JSON.
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The event name is empty or contains a line break.
    #[error("Invalid event name: {name:?}")]
    InvalidEventName { name: String },

    /// Writing to or flushing the response stream failed.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` when the error means the client is no longer reading.
    pub const fn is_client_gone(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
