use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::error;

use super::{Sink, SinkWorker};
use crate::error::EngineError;
use crate::result::WriteResult;

/// Called on the first anomaly in strict mode.
pub type AbortHook = Arc<dyn Fn() + Send + Sync>;

/// Reports failed or unexpected writes; in strict mode aborts on the first.
pub struct ErrorSink {
    worker: SinkWorker,
    strict: bool,
    abort: AbortHook,
    anomalies: Arc<AtomicU64>,
}

impl ErrorSink {
    pub fn new(writers: usize, strict: bool) -> Self {
        Self {
            worker: SinkWorker::new("error", writers),
            strict,
            abort: Arc::new(|| std::process::exit(1)),
            anomalies: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the default `process::exit(1)` strict-mode action.
    pub fn with_abort_hook(mut self, abort: AbortHook) -> Self {
        self.abort = abort;
        self
    }

    /// Shared counter of anomalous results seen so far.
    pub fn anomalies(&self) -> Arc<AtomicU64> {
        self.anomalies.clone()
    }
}

#[async_trait]
impl Sink for ErrorSink {
    fn name(&self) -> &'static str {
        "error"
    }

    fn sender(&self) -> Option<mpsc::Sender<WriteResult>> {
        self.worker.sender()
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        let strict = self.strict;
        let abort = self.abort.clone();
        let anomalies = self.anomalies.clone();
        self.worker.start(move |mut rx| async move {
            while let Some(result) = rx.recv().await {
                if !result.is_anomaly() {
                    continue;
                }
                anomalies.fetch_add(1, Ordering::Relaxed);
                match &result.error {
                    Some(e) => error!(status = result.status, "Error sending write: {e}"),
                    None => error!(
                        status = result.status,
                        body = result.body.as_deref().unwrap_or(""),
                        "Unexpected write status"
                    ),
                }
                if strict {
                    error!("Strict mode: aborting on first write error");
                    abort();
                    return;
                }
            }
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.worker.stop().await
    }
}
