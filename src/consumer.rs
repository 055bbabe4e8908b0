//! Downstream consumption of annotation results.

use std::sync::{Arc, Mutex};

use crate::streaming::protocol::{AnnotateResult, StreamingFeature};

/// Receives each annotation result for side-effecting use. Stateless from
/// the session's perspective; every result is dispatched, including ones
/// carrying an in-band error.
pub trait ResultConsumer: Send {
    fn consume(&mut self, feature: StreamingFeature, result: &AnnotateResult);
}

/// Renders results to the log, standing in for a real display pipeline.
#[derive(Debug, Default)]
pub struct LogConsumer;

impl ResultConsumer for LogConsumer {
    fn consume(&mut self, feature: StreamingFeature, result: &AnnotateResult) {
        match &result.error {
            Some(err) => {
                tracing::warn!(?feature, code = err.code, "annotation error: {}", err.message);
            }
            None => {
                tracing::info!(
                    ?feature,
                    bytes = result.payload.len(),
                    "annotation result received"
                );
            }
        }
    }
}

/// Collects every dispatched result behind a shared handle. Used by tests
/// to observe the receive direction after the session has finished.
#[derive(Debug, Default, Clone)]
pub struct CollectConsumer {
    results: Arc<Mutex<Vec<AnnotateResult>>>,
}

impl CollectConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<AnnotateResult> {
        self.results.lock().expect("consumer lock poisoned").clone()
    }
}

impl ResultConsumer for CollectConsumer {
    fn consume(&mut self, _feature: StreamingFeature, result: &AnnotateResult) {
        self.results
            .lock()
            .expect("consumer lock poisoned")
            .push(result.clone());
    }
}
