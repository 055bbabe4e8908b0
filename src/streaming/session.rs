//! Streaming session orchestration.
//!
//! Sequences the protocol over one duplex channel: a single config frame,
//! many content frames from the sender, concurrent result frames into the
//! receiver, then the half-close handshake and terminal status.
//!
//! Exactly two units of concurrency exist per session: the sender runs on
//! the calling task, the receiver on a spawned one. Each direction owns
//! its half of the channel and its own counters; they are combined only
//! after both have finished.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

use crate::consumer::ResultConsumer;
use crate::error::{Result, SessionError};
use crate::io::{ByteSink, ByteSource, FileSink, RecordSink};
use crate::streaming::protocol::{
    write_frame, ConfigRequest, Status, StatusCode, StreamingFeature, CONTENT_CHUNK_SIZE,
};
use crate::streaming::receiver::Receiver;
use crate::streaming::sender::{SendStats, Sender, SenderConfig};

/// Session options, assembled by the CLI layer before the session starts.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Single deadline governing the whole duplex channel.
    pub deadline: Duration,
    /// Bytes read from the source per content chunk.
    pub chunk_size: usize,
    /// Byte-exact mirror of sent content.
    pub content_mirror: Option<PathBuf>,
    /// Length-delimited mirror of received non-error results.
    pub result_mirror: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(3600),
            chunk_size: CONTENT_CHUNK_SIZE,
            content_mirror: None,
            result_mirror: None,
        }
    }
}

/// Counters reported after a successful session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub results_received: u64,
    pub in_band_errors: u64,
    pub content_mirror_failed: bool,
    pub result_mirror_failed: bool,
}

/// A session that has sent its config frame and is ready to stream.
///
/// Construction via [`StreamingSession::start`] walks the first lifecycle
/// transitions: mirrors opened, deadline fixed, config on the wire.
pub struct StreamingSession<R, W> {
    reader: R,
    writer: W,
    feature: StreamingFeature,
    deadline: Instant,
    options: SessionOptions,
    content_mirror: Option<Box<dyn ByteSink>>,
    result_mirror: Option<RecordSink>,
}

impl<R, W> StreamingSession<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    /// Open the mirrors, fix the deadline, and send the configuration as
    /// the first and only config frame on the channel.
    ///
    /// Mirror open failures are fatal here, before any data moves. A
    /// rejected config write fails with [`SessionError::ConfigSend`].
    pub async fn start(
        config: ConfigRequest,
        reader: R,
        mut writer: W,
        options: SessionOptions,
    ) -> Result<Self> {
        let content_mirror: Option<Box<dyn ByteSink>> = match &options.content_mirror {
            Some(path) => Some(Box::new(FileSink::create(path).await.map_err(|source| {
                SessionError::LocalStorage {
                    path: path.clone(),
                    source,
                }
            })?)),
            None => None,
        };
        let result_mirror = match &options.result_mirror {
            Some(path) => Some(RecordSink::create(path).await.map_err(|source| {
                SessionError::LocalStorage {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let deadline = Instant::now() + options.deadline;
        let feature = config.feature;

        let frame = config.encode();
        let send = async {
            write_frame(&mut writer, &frame).await?;
            writer.flush().await?;
            Ok::<_, anyhow::Error>(())
        };
        match timeout_at(deadline, send).await {
            Ok(Ok(())) => {}
            Ok(Err(cause)) => return Err(SessionError::ConfigSend { cause }),
            Err(_) => {
                return Err(SessionError::ConfigSend {
                    cause: anyhow::anyhow!("deadline expired before config was written"),
                })
            }
        }
        tracing::debug!(?feature, "config sent");

        Ok(Self {
            reader,
            writer,
            feature,
            deadline,
            options,
            content_mirror,
            result_mirror,
        })
    }

    /// Run both directions to completion and resolve the terminal status.
    ///
    /// The receiver runs on its own task; the sender runs here. After the
    /// sender returns (success or failure) its half-close has been issued,
    /// so the remote finishes its side and the receiver drains to the
    /// terminal status. A non-OK terminal status overrides an otherwise
    /// successful outcome.
    ///
    /// Both loops bound every channel operation by the deadline and exit
    /// through their normal cleanup on expiry, so mirrors are flushed and
    /// closed before the session reports `DeadlineExceeded`.
    pub async fn run(
        self,
        source: &mut dyn ByteSource,
        consumer: Box<dyn ResultConsumer>,
    ) -> Result<SessionReport> {
        let Self {
            reader,
            mut writer,
            feature,
            deadline,
            options,
            content_mirror,
            result_mirror,
        } = self;

        let receiver = Receiver::new(feature, consumer, result_mirror, deadline);
        let recv_handle = tokio::spawn(receiver.run(reader));

        let sender = Sender::new(SenderConfig {
            chunk_size: options.chunk_size,
            deadline,
            timeout: options.deadline,
        });
        let send_result = sender.run(source, &mut writer, content_mirror).await;

        // The session is not finished until the receiver has returned and
        // the terminal status is known, even after a send failure. The
        // receiver's reads are deadline-bounded, so the join is too.
        let mut recv_outcome = match recv_handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!("receiver task failed: {join_err}");
                return Err(SessionError::ChannelTerminal {
                    code: StatusCode::Internal,
                    message: "receiver task failed".to_string(),
                });
            }
        };

        let status = recv_outcome.status.take().unwrap_or_else(|| Status {
            code: StatusCode::Unavailable,
            message: "channel closed without a terminal status".to_string(),
        });

        match send_result {
            Err(err) => {
                tracing::warn!(
                    code = ?status.code,
                    results = recv_outcome.results_received,
                    "session failed during send: {err}"
                );
                Err(err)
            }
            Ok(send_stats) => {
                let report = build_report(send_stats, &recv_outcome);
                tracing::info!(
                    chunks = report.chunks_sent,
                    bytes = report.bytes_sent,
                    results = report.results_received,
                    code = ?status.code,
                    "session finished"
                );
                if recv_outcome.deadline_expired {
                    Err(SessionError::DeadlineExceeded(options.deadline))
                } else if status.code.is_ok() {
                    Ok(report)
                } else {
                    Err(SessionError::ChannelTerminal {
                        code: status.code,
                        message: status.message,
                    })
                }
            }
        }
    }
}

fn build_report(
    send_stats: SendStats,
    recv_outcome: &crate::streaming::receiver::RecvOutcome,
) -> SessionReport {
    SessionReport {
        chunks_sent: send_stats.chunks_sent,
        bytes_sent: send_stats.bytes_sent,
        results_received: recv_outcome.results_received,
        in_band_errors: recv_outcome.in_band_errors,
        content_mirror_failed: send_stats.mirror_failed,
        result_mirror_failed: recv_outcome.mirror_failed,
    }
}
