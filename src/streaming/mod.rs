//! Streaming annotation session.
//!
//! Two concurrent loops over one duplex channel:
//!
//! ```text
//! ByteSource --> Sender   --> remote service   (Config, Content*, WritesDone)
//! remote    --> Receiver  --> ResultConsumer   (Result*, Status)
//! ```
//!
//! The session owns the sequencing: config first, content until exhaustion
//! or failure, half-close exactly once, then drain results to the terminal
//! status. Both directions may mirror their traffic to local storage.

pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod session;

pub use protocol::{
    AnnotateResult, ConfigFlags, ConfigRequest, Content, MessageType, ResultError, Status,
    StatusCode, StreamingFeature, WritesDone, CONTENT_CHUNK_SIZE, MAX_FRAME_SIZE,
};

pub use receiver::{Receiver, RecvOutcome};
pub use sender::{SendStats, Sender, SenderConfig};
pub use session::{SessionOptions, SessionReport, StreamingSession};

pub use protocol::{read_frame, write_frame};
