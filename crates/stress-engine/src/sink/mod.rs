//! Result sink pipeline.
//!
//! Every sink moves through `Closed -> Open -> Closed` exactly once. A sink
//! owns a bounded inbound channel; [`MultiSink`] fans results out to its
//! subscribers with `try_send`, so a slow subscriber loses results instead
//! of stalling the writers.

mod check;
mod multi;
mod stats;
mod summary;

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::result::WriteResult;

pub use check::{AbortHook, ErrorSink};
pub use multi::MultiSink;
pub use stats::StatsSink;
pub use summary::{Summary, SummarySink};

/// Inbound buffer per writer.
pub const RESULTS_PER_WRITER: usize = 8;

#[async_trait]
pub trait Sink: Send {
    fn name(&self) -> &'static str;

    /// Inbound channel, `None` once the sink has been closed.
    fn sender(&self) -> Option<mpsc::Sender<WriteResult>>;

    async fn open(&mut self) -> Result<(), EngineError>;

    /// Stop accepting results, drain what is buffered and wait for the
    /// background task.
    async fn close(&mut self) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Ready,
    Open,
    Closed,
}

/// Channel plus background task shared by the sink implementations.
pub(crate) struct SinkWorker {
    name: &'static str,
    state: SinkState,
    tx: Option<mpsc::Sender<WriteResult>>,
    rx: Option<mpsc::Receiver<WriteResult>>,
    task: Option<JoinHandle<()>>,
}

impl SinkWorker {
    pub(crate) fn new(name: &'static str, writers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity(writers));
        Self {
            name,
            state: SinkState::Ready,
            tx: Some(tx),
            rx: Some(rx),
            task: None,
        }
    }

    pub(crate) fn sender(&self) -> Option<mpsc::Sender<WriteResult>> {
        self.tx.clone()
    }

    /// True until the sink has been opened.
    pub(crate) fn is_ready(&self) -> bool {
        self.state == SinkState::Ready
    }

    pub(crate) fn start<F, Fut>(&mut self, run: F) -> Result<(), EngineError>
    where
        F: FnOnce(mpsc::Receiver<WriteResult>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.state != SinkState::Ready {
            return Err(EngineError::SinkReopened(self.name));
        }
        let rx = self.rx.take().ok_or(EngineError::SinkReopened(self.name))?;
        self.task = Some(tokio::spawn(run(rx)));
        self.state = SinkState::Open;
        Ok(())
    }

    pub(crate) async fn stop(&mut self) -> Result<(), EngineError> {
        if self.state != SinkState::Open {
            return Err(EngineError::SinkNotOpen(self.name));
        }
        self.state = SinkState::Closed;
        self.tx = None;
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| EngineError::SinkTask {
                sink: self.name,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}

pub(crate) fn capacity(writers: usize) -> usize {
    RESULTS_PER_WRITER * writers.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_worker_is_one_shot() {
        let mut worker = SinkWorker::new("test", 1);
        assert!(worker.stop().await.is_err());
        worker.start(|mut rx| async move { while rx.recv().await.is_some() {} }).unwrap();
        assert!(worker
            .start(|mut rx| async move { while rx.recv().await.is_some() {} })
            .is_err());
        worker.stop().await.unwrap();
        assert!(worker.sender().is_none());
        assert!(matches!(
            worker.start(|_| async {}),
            Err(EngineError::SinkReopened("test"))
        ));
    }

    #[test]
    fn test_capacity() {
        assert_eq!(capacity(0), 8);
        assert_eq!(capacity(4), 32);
    }
}
