//! Receiver loop for the streaming session.
//!
//! Reads result frames until the remote closes its direction (ideally
//! with a terminal status frame) and dispatches each result downstream.
//! In-band errors are logged but never end the loop; only channel
//! closure does.

use tokio::io::AsyncRead;
use tokio::time::{timeout_at, Instant};

use crate::consumer::ResultConsumer;
use crate::io::RecordSink;
use crate::streaming::protocol::{
    read_frame, AnnotateResult, MessageType, Status, StreamingFeature,
};

/// What the receive loop observed, reported after it has returned.
#[derive(Debug, Default)]
pub struct RecvOutcome {
    pub results_received: u64,
    pub in_band_errors: u64,
    /// Terminal status frame, if the remote sent one before closing.
    pub status: Option<Status>,
    pub mirror_failed: bool,
    /// The deadline expired while waiting for the remote.
    pub deadline_expired: bool,
}

/// Receiver state
pub struct Receiver {
    feature: StreamingFeature,
    consumer: Box<dyn ResultConsumer>,
    mirror: Option<RecordSink>,
    deadline: Instant,
    results_received: u64,
    in_band_errors: u64,
    mirror_failed: bool,
    deadline_expired: bool,
}

impl Receiver {
    pub fn new(
        feature: StreamingFeature,
        consumer: Box<dyn ResultConsumer>,
        mirror: Option<RecordSink>,
        deadline: Instant,
    ) -> Self {
        Self {
            feature,
            consumer,
            mirror,
            deadline,
            results_received: 0,
            in_band_errors: 0,
            mirror_failed: false,
            deadline_expired: false,
        }
    }

    /// Read until the remote closes its direction. Every read is bounded
    /// by the deadline, and the record mirror is closed on every exit
    /// path, expiry included.
    pub async fn run<R>(mut self, mut reader: R) -> RecvOutcome
    where
        R: AsyncRead + Unpin,
    {
        let status = loop {
            let frame = match timeout_at(self.deadline, read_frame(&mut reader)).await {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::warn!("deadline expired while waiting on the remote");
                    self.deadline_expired = true;
                    break None;
                }
            };
            match frame {
                Ok((MessageType::Result, payload)) => match AnnotateResult::decode(payload) {
                    Ok(result) => self.handle_result(result).await,
                    Err(e) => {
                        tracing::warn!("malformed result frame, closing receive loop: {e:#}");
                        break None;
                    }
                },
                Ok((MessageType::Status, payload)) => match Status::decode(payload) {
                    Ok(status) => break Some(status),
                    Err(e) => {
                        tracing::warn!("malformed status frame: {e:#}");
                        break None;
                    }
                },
                Ok((other, _)) => {
                    tracing::warn!(?other, "unexpected message type on receive direction");
                }
                Err(e) => {
                    if is_clean_eof(&e) {
                        tracing::debug!("remote closed without a terminal status");
                    } else {
                        tracing::warn!("receive direction failed: {e:#}");
                    }
                    break None;
                }
            }
        };

        if let Some(mut sink) = self.mirror.take() {
            if let Err(e) = sink.close().await {
                tracing::warn!("result mirror close failed: {e}");
                self.mirror_failed = true;
            }
        }

        tracing::info!(results = self.results_received, "receiver finished");

        RecvOutcome {
            results_received: self.results_received,
            in_band_errors: self.in_band_errors,
            status,
            mirror_failed: self.mirror_failed,
            deadline_expired: self.deadline_expired,
        }
    }

    async fn handle_result(&mut self, result: AnnotateResult) {
        self.results_received += 1;

        // Every result reaches the consumer; only the mirror skips errors.
        self.consumer.consume(self.feature, &result);

        if let Some(err) = &result.error {
            self.in_band_errors += 1;
            tracing::warn!(code = err.code, "received in-band error: {}", err.message);
            return;
        }

        let mut mirror_broken = false;
        if let Some(sink) = self.mirror.as_mut() {
            if let Err(e) = sink.write_record(&result.encode_payload()).await {
                tracing::warn!("result mirror write failed, disabling mirror: {e}");
                mirror_broken = true;
            }
        }
        if mirror_broken {
            self.mirror_failed = true;
            self.mirror = None;
        }
    }
}

fn is_clean_eof(e: &anyhow::Error) -> bool {
    e.root_cause()
        .downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::UnexpectedEof)
        .unwrap_or(false)
}
