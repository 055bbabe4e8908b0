//! Channel establishment to the remote annotation service.
//!
//! Produces two independent half-channel handles backed by one TCP
//! connection; protocol handling is done by the streaming session.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A connected duplex channel, not yet split.
pub struct Channel {
    stream: TcpStream,
}

impl Channel {
    /// Connect to the endpoint, bounded by the session deadline.
    pub async fn connect(endpoint: &str, deadline: Duration) -> Result<Self> {
        let stream = timeout(deadline, TcpStream::connect(endpoint))
            .await
            .with_context(|| format!("Timed out connecting to {endpoint}"))?
            .with_context(|| format!("Failed to connect to {endpoint}"))?;
        stream.set_nodelay(true)?;
        tracing::info!("connected to {endpoint}");
        Ok(Self { stream })
    }

    /// Split into read/write halves, one per direction of concurrency.
    pub fn split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}
