//! vistream - streaming annotation client.
//!
//! Streams locally captured video content to a remote annotation service
//! over a long-lived duplex channel and concurrently consumes incremental
//! annotation results, optionally mirroring both directions to local
//! storage.

pub mod cli;
pub mod config;
pub mod consumer;
pub mod error;
pub mod io;
pub mod streaming;
pub mod transport;

pub use config::{AnnotateConfig, InputSelect};
pub use consumer::{CollectConsumer, LogConsumer, ResultConsumer};
pub use error::SessionError;
pub use streaming::{SessionOptions, SessionReport, StreamingSession};
pub use transport::Channel;
