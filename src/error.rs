//! Error taxonomy for the streaming session.
//!
//! In-band result errors are deliberately absent: they are logged by the
//! receiver and the loop continues. Only channel-level faults and local
//! setup faults surface here.

use std::path::PathBuf;
use std::time::Duration;

use crate::streaming::protocol::StatusCode;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The first message could not be written. Fatal; the session aborts
    /// before any content is sent.
    #[error("failed to send config: {cause:#}")]
    ConfigSend { cause: anyhow::Error },

    /// A content write failed mid-stream. The sender stops reading further
    /// input but the shutdown handshake still proceeds.
    #[error("content write failed after {chunks} chunks ({bytes} bytes): {cause:#}")]
    ContentWrite {
        chunks: u64,
        bytes: u64,
        cause: anyhow::Error,
    },

    /// The byte source failed mid-stream. Treated like a send failure: the
    /// handshake still proceeds so the remote observes termination.
    #[error("failed to read content source after {chunks} chunks ({bytes} bytes): {source}")]
    SourceRead {
        chunks: u64,
        bytes: u64,
        #[source]
        source: std::io::Error,
    },

    /// The half-close signal could not be issued after the send loop ended.
    #[error("failed to half-close the send direction after {chunks} chunks: {cause:#}")]
    HalfClose { chunks: u64, cause: anyhow::Error },

    /// The channel's terminal status is non-OK. Overrides an otherwise
    /// successful sender/receiver outcome.
    #[error("channel terminated with status {code:?}: {message}")]
    ChannelTerminal { code: StatusCode, message: String },

    /// A mirror sink failed to open before streaming started.
    #[error("local storage error at {}: {source}", .path.display())]
    LocalStorage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The single session deadline expired before both directions finished.
    #[error("session deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}
