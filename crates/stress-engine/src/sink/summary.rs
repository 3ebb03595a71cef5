use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Sink, SinkWorker};
use crate::error::EngineError;
use crate::result::WriteResult;

/// Aggregated view of every result a case produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub results: u64,
    pub errors: u64,
    pub latency_total_ns: u128,
    pub latency_min_ns: Option<i64>,
    pub latency_max_ns: Option<i64>,
}

impl Summary {
    pub fn record(&mut self, result: &WriteResult) {
        self.results += 1;
        if result.is_anomaly() {
            self.errors += 1;
        }
        let latency = result.latency_ns.max(0);
        self.latency_total_ns += latency as u128;
        self.latency_min_ns = Some(self.latency_min_ns.map_or(latency, |m| m.min(latency)));
        self.latency_max_ns = Some(self.latency_max_ns.map_or(latency, |m| m.max(latency)));
    }

    pub fn mean_latency(&self) -> Option<Duration> {
        if self.results == 0 {
            return None;
        }
        let mean = self.latency_total_ns / self.results as u128;
        Some(Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX)))
    }
}

/// Accumulates a [`Summary`] for the report row of a case.
pub struct SummarySink {
    worker: SinkWorker,
    summary: Arc<Mutex<Summary>>,
}

impl SummarySink {
    pub fn new(writers: usize) -> Self {
        Self {
            worker: SinkWorker::new("summary", writers),
            summary: Arc::new(Mutex::new(Summary::default())),
        }
    }

    /// Handle for reading the summary after the sink is closed.
    pub fn handle(&self) -> Arc<Mutex<Summary>> {
        self.summary.clone()
    }
}

#[async_trait]
impl Sink for SummarySink {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn sender(&self) -> Option<mpsc::Sender<WriteResult>> {
        self.worker.sender()
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        let summary = self.summary.clone();
        self.worker.start(move |mut rx| async move {
            while let Some(result) = rx.recv().await {
                summary
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .record(&result);
            }
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.worker.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_record() {
        let mut s = Summary::default();
        assert_eq!(s.mean_latency(), None);
        s.record(&WriteResult {
            latency_ns: 100,
            status: 204,
            ..Default::default()
        });
        s.record(&WriteResult {
            latency_ns: 300,
            status: 500,
            ..Default::default()
        });
        assert_eq!(s.results, 2);
        assert_eq!(s.errors, 1);
        assert_eq!(s.latency_min_ns, Some(100));
        assert_eq!(s.latency_max_ns, Some(300));
        assert_eq!(s.mean_latency(), Some(Duration::from_nanos(200)));
    }
}
