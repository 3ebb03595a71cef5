use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};

use super::{Sink, SinkWorker};
use crate::error::EngineError;
use crate::result::WriteResult;

/// Fan-out root of the sink pipeline.
///
/// Writers push into the multi sink's channel; a forwarding task copies
/// each result into every subscriber with `try_send`. A full subscriber
/// channel drops that one delivery (drop-newest) and bumps [`dropped`].
///
/// [`dropped`]: MultiSink::dropped
pub struct MultiSink {
    worker: SinkWorker,
    sinks: Vec<Box<dyn Sink>>,
    dropped: Arc<AtomicU64>,
}

impl MultiSink {
    pub fn new(writers: usize) -> Self {
        Self {
            worker: SinkWorker::new("multi", writers),
            sinks: Vec::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a subscriber. Rejected once the multi sink has been opened.
    pub fn add_sink(&mut self, sink: Box<dyn Sink>) -> Result<(), EngineError> {
        if !self.worker.is_ready() {
            return Err(EngineError::SinkOpen);
        }
        self.sinks.push(sink);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliveries dropped because a subscriber was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for MultiSink {
    fn name(&self) -> &'static str {
        "multi"
    }

    fn sender(&self) -> Option<mpsc::Sender<WriteResult>> {
        self.worker.sender()
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        if !self.worker.is_ready() {
            return Err(EngineError::SinkReopened("multi"));
        }
        for i in 0..self.sinks.len() {
            if let Err(e) = self.sinks[i].open().await {
                for opened in &mut self.sinks[..i] {
                    if let Err(close_err) = opened.close().await {
                        error!("Failed to close sink '{}': {close_err}", opened.name());
                    }
                }
                return Err(e);
            }
        }
        let subscribers: Vec<(&'static str, mpsc::Sender<WriteResult>)> = self
            .sinks
            .iter()
            .filter_map(|s| s.sender().map(|tx| (s.name(), tx)))
            .collect();
        let dropped = self.dropped.clone();

        self.worker.start(move |mut rx| async move {
            while let Some(result) = rx.recv().await {
                for (name, tx) in &subscribers {
                    match tx.try_send(result.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            debug!("Sink '{name}' is full, dropping result");
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Sink '{name}' stopped receiving");
                        }
                    }
                }
            }
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.worker.stop().await?;
        let dropped = self.dropped();
        if dropped > 0 {
            warn!("Dropped {dropped} results for slow sinks");
        }
        for sink in &mut self.sinks {
            if let Err(e) = sink.close().await {
                error!("Failed to close sink '{}': {e}", sink.name());
            }
        }
        Ok(())
    }
}
