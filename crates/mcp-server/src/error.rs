use std::time::Duration;

use thiserror::Error;

/// Failures of the subprocess transport, in the order they can occur: the
/// child cannot be launched, a call fails remotely, a call outlives its
/// deadline, or the connection is gone entirely.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to launch wrapped server '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wrapped server error: {0}")]
    Remote(String),

    #[error("no response to '{method}' within {}s", after.as_secs())]
    Timeout { method: String, after: Duration },

    #[error("connection to wrapped server closed")]
    ConnectionClosed,

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
