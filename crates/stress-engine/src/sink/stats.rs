use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stress_client::{Client, ClientError, InfluxClient, InfluxConfig};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tracing::{debug, warn};

use super::{Sink, SinkWorker};
use crate::error::EngineError;
use crate::result::WriteResult;

/// Default interval between stats flushes.
pub const STATS_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Records per-request latency and status into a separate InfluxDB.
///
/// Every successful send becomes a `req,status=<code> latNs=<ns> <ts>` line.
/// Lines are flushed on a fixed interval regardless of the writers' batch
/// size. Failures on the stats path are logged and otherwise ignored.
pub struct StatsSink {
    worker: SinkWorker,
    client: Arc<dyn Client>,
    flush_every: Duration,
}

impl StatsSink {
    pub fn new(writers: usize, client: Arc<dyn Client>) -> Self {
        Self {
            worker: SinkWorker::new("stats", writers),
            client,
            flush_every: STATS_FLUSH_INTERVAL,
        }
    }

    /// Stats sink writing to database `db` of the InfluxDB v1 server at `url`.
    pub fn influx(writers: usize, url: &str, db: &str) -> Result<Self, ClientError> {
        let cfg = InfluxConfig {
            name: "stats".to_string(),
            url: url.to_string(),
            db: db.to_string(),
            rp: "autogen".to_string(),
            precision: "ns".to_string(),
            consistency: "any".to_string(),
            ..Default::default()
        };
        Ok(Self::new(writers, Arc::new(InfluxClient::new(&cfg)?)))
    }

    pub fn with_flush_interval(mut self, every: Duration) -> Self {
        self.flush_every = every;
        self
    }
}

async fn flush(client: &dyn Client, buf: &mut String) {
    if buf.is_empty() {
        return;
    }
    let outcome = client.send(buf.as_bytes()).await;
    if !outcome.is_success() {
        debug!(status = outcome.status, "Failed to record stats batch");
    }
    buf.clear();
}

#[async_trait]
impl Sink for StatsSink {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn sender(&self) -> Option<mpsc::Sender<WriteResult>> {
        self.worker.sender()
    }

    async fn open(&mut self) -> Result<(), EngineError> {
        if !self.worker.is_ready() {
            return Err(EngineError::SinkReopened("stats"));
        }
        if let Err(e) = self.client.create("").await {
            warn!("Failed to create stats database on {}: {e}", self.client.connection());
        }

        let client = self.client.clone();
        let every = self.flush_every.max(Duration::from_millis(1));
        self.worker.start(move |mut rx| async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            let mut buf = String::new();
            loop {
                tokio::select! {
                    _ = ticker.tick() => flush(client.as_ref(), &mut buf).await,
                    received = rx.recv() => match received {
                        Some(result) if result.error.is_none() => {
                            let _ = writeln!(
                                buf,
                                "req,status={} latNs={} {}",
                                result.status, result.latency_ns, result.timestamp_ns
                            );
                        }
                        Some(_) => {}
                        None => {
                            flush(client.as_ref(), &mut buf).await;
                            break;
                        }
                    },
                }
            }
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.worker.stop().await
    }
}
