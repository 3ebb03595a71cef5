//! The batch writer loop.
//!
//! A writer owns one shard of work items and keeps serializing them, batch
//! by batch, until its point budget is spent or the deadline has passed.
//!
//! Budget policy: a writer never emits more than `max_points`. When the
//! budget runs out mid-batch the short batch is flushed and the writer stops.
//! When the deadline passes with a partial batch buffered, that batch is
//! discarded and not counted, so the returned count is always the number of
//! points handed to the transport.
//!
//! The timestamp cursor moves forward by at least one unit of the configured
//! precision per batch, so a series never repeats a rendered timestamp.

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use stress_client::{Client, SendOutcome};
use stress_data::{Precision, TableChunk, WorkItem};
use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::buffer::BatchBuffer;
use crate::result::WriteResult;
use crate::tick::Tick;

/// Point budget meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Per-writer settings.
pub struct WriteConfig {
    /// Items per send. Must be greater than zero.
    pub batch_size: u64,
    pub max_points: u64,
    /// `0` sends plain batches, anything else gzips them at that level.
    pub gzip_level: i32,
    pub deadline: DateTime<Utc>,
    /// Precision the items render their timestamps at.
    pub precision: Precision,
    pub tick: Box<dyn Tick>,
    pub results: mpsc::Sender<WriteResult>,
}

/// What one writer accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterTotals {
    pub points: u64,
    pub batches: u64,
    pub elapsed: Duration,
}

/// Stamp, serialize and send `items` until the budget or deadline is reached.
///
/// # Panics
///
/// Panics if `cfg.batch_size` is zero.
pub async fn write_points<T: WorkItem>(
    items: &mut [T],
    client: &dyn Client,
    mut cfg: WriteConfig,
) -> WriterTotals {
    assert!(cfg.batch_size > 0, "batch size must be greater than zero");

    let start = Instant::now();
    let unit = cfg.precision.unit();
    let mut buf = BatchBuffer::new(cfg.gzip_level);
    let mut emitted: u64 = 0;
    let mut totals = WriterTotals::default();
    let mut t = Utc::now();
    let mut last_stamp: Option<DateTime<Utc>> = None;

    'batches: loop {
        if t > cfg.deadline || emitted >= cfg.max_points {
            break;
        }

        if items.is_empty() {
            t = advance(t, cfg.tick.tick().await, unit);
            continue;
        }

        for item in items.iter_mut() {
            item.set_time(t);
            last_stamp = Some(t);
            if let Err(e) = buf.push(&*item) {
                error!("Failed to serialize work item: {e}");
                break 'batches;
            }
            emitted += 1;
            item.update();

            let budget_spent = emitted >= cfg.max_points;
            if emitted % cfg.batch_size == 0 || budget_spent {
                let items_in_batch = buf.items();
                let payload = match buf.take() {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to finish compressed batch: {e}");
                        break 'batches;
                    }
                };
                let outcome = client.send(&payload).await;
                publish(&cfg.results, outcome);
                totals.points += items_in_batch;
                totals.batches += 1;

                t = advance(t, cfg.tick.tick().await, unit);
                if t > cfg.deadline || budget_spent {
                    break 'batches;
                }
            }
        }

        // Batches larger than the shard reuse items within one tick; move
        // past the last stamp so each item's next timestamp is later.
        if let Some(stamp) = last_stamp {
            if t < stamp + unit {
                t = stamp + unit;
            }
        }
    }

    if !buf.is_empty() {
        trace!("Discarding {} unsent points at deadline", buf.items());
        buf.discard();
    }

    totals.elapsed = start.elapsed();
    totals
}

/// Send whole-chunk `INSERT`s until the budget or deadline is reached.
///
/// The chunk is truncated so the final batch does not exceed the budget,
/// and all rows are regenerated after every send.
pub async fn write_rows(chunk: &mut TableChunk, client: &dyn Client, mut cfg: WriteConfig) -> WriterTotals {
    assert!(cfg.batch_size > 0, "batch size must be greater than zero");

    let start = Instant::now();
    let unit = cfg.precision.unit();
    let mut totals = WriterTotals::default();
    let mut t = Utc::now();

    while t <= cfg.deadline && totals.points < cfg.max_points {
        let remaining = cfg.max_points - totals.points;
        if (chunk.rows() as u64) > remaining {
            chunk.truncate(remaining as usize);
        }
        let rows = chunk.rows() as u64;
        if rows == 0 {
            break;
        }

        let outcome = client.send_string(&chunk.insert_statement()).await;
        publish(&cfg.results, outcome);
        totals.points += rows;
        totals.batches += 1;

        t = advance(t, cfg.tick.tick().await, unit);
        chunk.update();
    }

    totals.elapsed = start.elapsed();
    totals
}

/// Next cursor: the ticked time if it is at least one `unit` ahead, else
/// exactly one `unit` on.
fn advance(current: DateTime<Utc>, ticked: DateTime<Utc>, unit: TimeDelta) -> DateTime<Utc> {
    let next = current + unit;
    if ticked >= next {
        ticked
    } else {
        next
    }
}

fn publish(results: &mpsc::Sender<WriteResult>, outcome: SendOutcome) {
    if results.try_send(WriteResult::from_outcome(outcome)).is_err() {
        trace!("Results channel full or closed, dropping write result");
    }
}
