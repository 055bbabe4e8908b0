//! Sender loop for the streaming session.
//!
//! Reads fixed-size chunks from the byte source and writes them as
//! content frames until the input is exhausted or a write fails. Either
//! way the send direction is half-closed exactly once afterwards, so the
//! remote and the receiver observe termination deterministically.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

use crate::error::{Result, SessionError};
use crate::io::{ByteSink, ByteSource};
use crate::streaming::protocol::{write_frame, Content, WritesDone, CONTENT_CHUNK_SIZE};

/// Sender configuration
pub struct SenderConfig {
    /// Bytes read from the source per chunk. Capped at the wire limit.
    pub chunk_size: usize,
    /// Absolute deadline bounding every source read and channel write.
    pub deadline: Instant,
    /// The deadline's original budget, reported on expiry.
    pub timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        let timeout = Duration::from_secs(3600);
        Self {
            chunk_size: CONTENT_CHUNK_SIZE,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }
}

/// Counters accumulated by the send loop, reported regardless of outcome.
#[derive(Debug, Default, Clone)]
pub struct SendStats {
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub mirror_failed: bool,
}

/// Sender state
pub struct Sender {
    config: SenderConfig,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// Run the send loop, then issue the half-close.
    ///
    /// A mirror write failure is a local fault: it is logged, the mirror
    /// is disabled, and sending continues. A channel write failure stops
    /// the loop but the half-close is still attempted. Every source read
    /// and channel write is bounded by the deadline, so expiry exits the
    /// loop through the same path and the mirror is still closed.
    pub async fn run<W>(
        self,
        source: &mut dyn ByteSource,
        writer: &mut W,
        mut mirror: Option<Box<dyn ByteSink>>,
    ) -> Result<SendStats>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk_size = self.config.chunk_size.clamp(1, CONTENT_CHUNK_SIZE);
        let mut buf = vec![0u8; chunk_size];
        let mut stats = SendStats::default();
        let mut fatal: Option<SessionError> = None;

        loop {
            let n = match timeout_at(self.config.deadline, source.read_chunk(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(source)) => {
                    fatal = Some(SessionError::SourceRead {
                        chunks: stats.chunks_sent,
                        bytes: stats.bytes_sent,
                        source,
                    });
                    break;
                }
                Err(_) => {
                    fatal = Some(SessionError::DeadlineExceeded(self.config.timeout));
                    break;
                }
            };

            let frame = Content {
                data: Bytes::copy_from_slice(&buf[..n]),
            }
            .encode();
            match timeout_at(self.config.deadline, write_frame(writer, &frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(cause)) => {
                    fatal = Some(SessionError::ContentWrite {
                        chunks: stats.chunks_sent,
                        bytes: stats.bytes_sent,
                        cause,
                    });
                    break;
                }
                Err(_) => {
                    fatal = Some(SessionError::DeadlineExceeded(self.config.timeout));
                    break;
                }
            }
            stats.chunks_sent += 1;
            stats.bytes_sent += n as u64;

            // Mirror after, not before, the successful channel write so the
            // mirror never gets ahead of the wire.
            let mut mirror_broken = false;
            if let Some(sink) = mirror.as_mut() {
                if let Err(e) = sink.write(&buf[..n]).await {
                    tracing::warn!("content mirror write failed, disabling mirror: {e}");
                    mirror_broken = true;
                }
            }
            if mirror_broken {
                stats.mirror_failed = true;
                mirror = None;
            }
        }

        // Half-close exactly once, on every exit path.
        let half_close = timeout_at(self.config.deadline, async {
            write_frame(writer, &WritesDone.encode()).await?;
            writer.flush().await?;
            writer.shutdown().await?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .unwrap_or_else(|_| Err(anyhow::anyhow!("deadline expired during half-close")));

        if let Some(sink) = mirror.as_mut() {
            if let Err(e) = sink.close().await {
                tracing::warn!("content mirror close failed: {e}");
                stats.mirror_failed = true;
            }
        }

        tracing::info!(
            chunks = stats.chunks_sent,
            bytes = stats.bytes_sent,
            "sender finished"
        );

        if let Some(err) = fatal {
            if let Err(e) = half_close {
                tracing::warn!("half-close after send failure also failed: {e:#}");
            }
            return Err(err);
        }
        if let Err(cause) = half_close {
            return Err(SessionError::HalfClose {
                chunks: stats.chunks_sent,
                cause,
            });
        }

        Ok(stats)
    }
}
