//! Parallel dispatch: one writer task per shard.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use stress_client::Client;
use stress_data::{Precision, StringPool, TableChunk, TableLayout, WorkItem};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::EngineError;
use crate::result::WriteResult;
use crate::tick::Pacing;
use crate::writer::{write_points, write_rows, WriteConfig};

/// Settings shared by every writer of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub concurrency: usize,
    pub batch_size: u64,
    /// Budget across all writers; each writer gets an equal share.
    pub max_points: u64,
    pub gzip_level: i32,
    pub runtime: Duration,
    /// Timestamp precision of the dispatched items.
    pub precision: Precision,
    pub pacing: Pacing,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfig(
                "concurrency must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Budget of a single writer.
    pub fn points_per_writer(&self) -> u64 {
        self.max_points / self.concurrency as u64
    }

    /// Absolute deadline, saturating for effectively unlimited runtimes.
    pub fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.runtime)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn writer_config(&self, deadline: DateTime<Utc>, results: mpsc::Sender<WriteResult>) -> WriteConfig {
        WriteConfig {
            batch_size: self.batch_size,
            max_points: self.points_per_writer(),
            gzip_level: self.gzip_level,
            deadline,
            precision: self.precision,
            tick: self.pacing.ticker(),
            results,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchTotals {
    pub points: u64,
    pub batches: u64,
    pub elapsed: Duration,
}

/// Contiguous, disjoint ranges of `len / shards` items each.
///
/// The remainder `len % shards` is left out.
///
/// # Panics
///
/// Panics if `shards` is zero.
pub fn shard_ranges(len: usize, shards: usize) -> Vec<Range<usize>> {
    assert!(shards > 0, "shard count must be greater than zero");
    let size = len / shards;
    (0..shards).map(|i| i * size..(i + 1) * size).collect()
}

/// Split `items` into shards and run one point writer per shard.
pub async fn dispatch_points<T>(
    items: Vec<T>,
    client: Arc<dyn Client>,
    cfg: &DispatchConfig,
    results: mpsc::Sender<WriteResult>,
) -> Result<DispatchTotals, EngineError>
where
    T: WorkItem + 'static,
{
    cfg.validate()?;
    let ranges = shard_ranges(items.len(), cfg.concurrency);
    let mut remaining = items.into_iter();
    let shards: Vec<Vec<T>> = ranges
        .iter()
        .map(|r| remaining.by_ref().take(r.len()).collect())
        .collect();
    debug!(
        "Dispatching {} shards of {} items",
        shards.len(),
        ranges.first().map_or(0, |r| r.len())
    );

    let start = Instant::now();
    let deadline = cfg.deadline_from(Utc::now());
    let points = Arc::new(AtomicU64::new(0));
    let batches = Arc::new(AtomicU64::new(0));
    let mut writers = JoinSet::new();

    for mut shard in shards {
        let client = client.clone();
        let write_cfg = cfg.writer_config(deadline, results.clone());
        let points = points.clone();
        let batches = batches.clone();
        writers.spawn(async move {
            let totals = write_points(&mut shard, client.as_ref(), write_cfg).await;
            points.fetch_add(totals.points, Ordering::Relaxed);
            batches.fetch_add(totals.batches, Ordering::Relaxed);
        });
    }
    drop(results);

    join_all(writers).await?;
    Ok(DispatchTotals {
        points: points.load(Ordering::Relaxed),
        batches: batches.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    })
}

/// Run one row writer per concurrency slot, each with its own chunk.
pub async fn dispatch_rows(
    layout: Arc<TableLayout>,
    pool: &StringPool,
    client: Arc<dyn Client>,
    cfg: &DispatchConfig,
    results: mpsc::Sender<WriteResult>,
) -> Result<DispatchTotals, EngineError> {
    cfg.validate()?;
    let batch_rows = usize::try_from(cfg.batch_size)
        .map_err(|_| EngineError::InvalidConfig(format!("batch size {} too large", cfg.batch_size)))?;

    let start = Instant::now();
    let deadline = cfg.deadline_from(Utc::now());
    let points = Arc::new(AtomicU64::new(0));
    let batches = Arc::new(AtomicU64::new(0));
    let mut writers = JoinSet::new();

    for i in 0..cfg.concurrency {
        let mut chunk = TableChunk::new(layout.clone(), batch_rows, pool);
        // Offset writers so concurrent chunks carry different values.
        for _ in 0..i {
            chunk.update();
        }
        let client = client.clone();
        let write_cfg = cfg.writer_config(deadline, results.clone());
        let points = points.clone();
        let batches = batches.clone();
        writers.spawn(async move {
            let totals = write_rows(&mut chunk, client.as_ref(), write_cfg).await;
            points.fetch_add(totals.points, Ordering::Relaxed);
            batches.fetch_add(totals.batches, Ordering::Relaxed);
        });
    }
    drop(results);

    join_all(writers).await?;
    Ok(DispatchTotals {
        points: points.load(Ordering::Relaxed),
        batches: batches.load(Ordering::Relaxed),
        elapsed: start.elapsed(),
    })
}

async fn join_all(mut writers: JoinSet<()>) -> Result<(), EngineError> {
    let mut failure = None;
    while let Some(joined) = writers.join_next().await {
        if let Err(e) = joined {
            failure.get_or_insert(e);
        }
    }
    match failure {
        Some(e) => Err(EngineError::WriterFailed(e)),
        None => Ok(()),
    }
}
