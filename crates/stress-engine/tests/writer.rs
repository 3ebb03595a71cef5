//! Batch writer and dispatch behaviour against an in-memory client.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use flate2::read::GzDecoder;
use stress_client::testing::RecordingClient;
use stress_client::Client;
use stress_data::{
    generate_points_from_templates, Point, Precision, StringPool, TableChunk, TableLayout,
};
use stress_engine::{
    dispatch_points, dispatch_rows, write_points, write_rows, DispatchConfig, Pacing, Tick,
    Unthrottled, WriteConfig, WriteResult, UNBOUNDED,
};
use tokio::sync::mpsc;

/// Replays scripted times, then keeps returning the last one.
struct ScriptedTick {
    times: VecDeque<DateTime<Utc>>,
    last: DateTime<Utc>,
}

impl ScriptedTick {
    fn constant(t: DateTime<Utc>) -> Self {
        Self {
            times: VecDeque::new(),
            last: t,
        }
    }

    fn sequence(times: Vec<DateTime<Utc>>) -> Self {
        let last = *times.last().unwrap();
        Self {
            times: times.into(),
            last,
        }
    }
}

#[async_trait]
impl Tick for ScriptedTick {
    async fn tick(&mut self) -> DateTime<Utc> {
        if let Some(t) = self.times.pop_front() {
            self.last = t;
        }
        self.last
    }
}

fn points(count: usize) -> Vec<Point> {
    points_at(count, Precision::Nanosecond)
}

fn points_at(count: usize, precision: Precision) -> Vec<Point> {
    let pool = StringPool::from_values(vec!["s".into()]).unwrap();
    generate_points_from_templates("cpu", "host=h", "v=0i", count, precision, &pool).unwrap()
}

fn config(
    batch_size: u64,
    max_points: u64,
    deadline: DateTime<Utc>,
    tick: Box<dyn Tick>,
    results: mpsc::Sender<WriteResult>,
) -> WriteConfig {
    WriteConfig {
        batch_size,
        max_points,
        gzip_level: 0,
        deadline,
        precision: Precision::Nanosecond,
        tick,
        results,
    }
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + TimeDelta::hours(1)
}

fn lines(batch: &[u8]) -> Vec<String> {
    String::from_utf8(batch.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn drain(rx: &mut mpsc::Receiver<WriteResult>) -> Vec<WriteResult> {
    let mut out = Vec::new();
    while let Ok(r) = rx.try_recv() {
        out.push(r);
    }
    out
}

#[tokio::test]
async fn test_round_trip_single_writer() {
    let client = Arc::new(RecordingClient::default());
    let (tx, mut rx) = mpsc::channel(16);
    let cfg = DispatchConfig {
        concurrency: 1,
        batch_size: 2,
        max_points: 4,
        gzip_level: 0,
        runtime: Duration::from_secs(3600),
        precision: Precision::Nanosecond,
        pacing: Pacing::Unthrottled,
    };

    let totals = dispatch_points(points(4), client.clone(), &cfg, tx).await.unwrap();

    assert_eq!(totals.points, 4);
    assert_eq!(totals.batches, 2);
    let batches = client.batches();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| lines(b).len() == 2));
    assert_eq!(lines(&batches[0])[0].split(' ').next(), Some("cpu,host=h-0"));
    assert_eq!(lines(&batches[1])[0].split(' ').next(), Some("cpu,host=h-2"));

    let results = drain(&mut rx);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.is_anomaly()));
}

#[tokio::test]
async fn test_batch_threshold_yields_one_result_per_batch() {
    let client = RecordingClient::default();
    let (tx, mut rx) = mpsc::channel(16);
    let mut items = points(3);

    let totals = write_points(
        &mut items,
        &client,
        config(3, 9, far_future(), Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 9);
    assert_eq!(drain(&mut rx).len(), 3);
    let batches = client.batches();
    assert_eq!(batches.len(), 3);
    for batch in &batches {
        assert_eq!(lines(batch).len(), 3);
    }
}

#[tokio::test]
async fn test_budget_flushes_partial_batch_and_never_exceeds() {
    let client = RecordingClient::default();
    let (tx, mut rx) = mpsc::channel(16);
    let mut items = points(4);

    let totals = write_points(
        &mut items,
        &client,
        config(3, 5, far_future(), Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 5);
    assert_eq!(totals.batches, 2);
    let sizes: Vec<usize> = client.batches().iter().map(|b| lines(b).len()).collect();
    assert_eq!(sizes, vec![3, 2]);
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn test_past_deadline_sends_nothing() {
    let client = RecordingClient::default();
    let (tx, mut rx) = mpsc::channel(16);
    let mut items = points(4);
    let deadline = Utc::now() - TimeDelta::seconds(1);

    let totals = write_points(
        &mut items,
        &client,
        config(2, UNBOUNDED, deadline, Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 0);
    assert_eq!(totals.batches, 0);
    assert!(client.batches().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_unflushed_batch_is_discarded_at_deadline() {
    // Ticks land exactly on the deadline; the end-of-pass bump then moves
    // the cursor past it while one point is still buffered.
    let client = RecordingClient::default();
    let (tx, _rx) = mpsc::channel(16);
    let mut items = points(2);
    let deadline = far_future();

    let totals = write_points(
        &mut items,
        &client,
        config(3, UNBOUNDED, deadline, Box::new(ScriptedTick::constant(deadline)), tx),
    )
    .await;

    assert_eq!(totals.points, 3);
    assert_eq!(totals.batches, 1);
    assert_eq!(client.batches().len(), 1);
}

#[tokio::test]
async fn test_empty_shard_waits_for_deadline() {
    let client = RecordingClient::default();
    let (tx, _rx) = mpsc::channel(16);
    let mut items: Vec<Point> = Vec::new();
    let deadline = Utc::now() + TimeDelta::milliseconds(50);

    let totals = write_points(
        &mut items,
        &client,
        config(2, UNBOUNDED, deadline, Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 0);
    assert!(Utc::now() > deadline);
    assert!(client.batches().is_empty());
}

fn stamps_by_series(batches: &[Vec<u8>]) -> HashMap<String, Vec<i64>> {
    let mut by_series: HashMap<String, Vec<i64>> = HashMap::new();
    for batch in batches {
        for line in lines(batch) {
            let mut parts = line.split(' ');
            let series = parts.next().unwrap().to_string();
            let ts: i64 = parts.last().unwrap().parse().unwrap();
            by_series.entry(series).or_default().push(ts);
        }
    }
    by_series
}

#[tokio::test]
async fn test_timestamps_strictly_increase_with_stale_ticks() {
    let now = Utc::now();
    let ticks = vec![
        now,
        now - TimeDelta::seconds(1),
        now,
        now + TimeDelta::milliseconds(1),
        now + TimeDelta::milliseconds(1),
        now - TimeDelta::seconds(5),
    ];

    for (items_len, batch_size) in [(2usize, 3u64), (3, 1), (4, 2), (5, 7)] {
        let client = RecordingClient::default();
        let (tx, _rx) = mpsc::channel(64);
        let mut items = points(items_len);

        write_points(
            &mut items,
            &client,
            config(
                batch_size,
                40,
                far_future(),
                Box::new(ScriptedTick::sequence(ticks.clone())),
                tx,
            ),
        )
        .await;

        let by_series = stamps_by_series(&client.batches());
        assert_eq!(by_series.len(), items_len);
        for (series, stamps) in by_series {
            assert!(
                stamps.windows(2).all(|w| w[0] < w[1]),
                "{series} not strictly increasing for batch {batch_size}: {stamps:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_coarse_precision_timestamps_never_repeat() {
    for precision in [Precision::Millisecond, Precision::Second] {
        let client = RecordingClient::default();
        let (tx, _rx) = mpsc::channel(64);
        let mut items = points_at(1, precision);
        let mut cfg = config(1, 50, far_future(), Box::new(Unthrottled), tx);
        cfg.precision = precision;

        let totals = write_points(&mut items, &client, cfg).await;
        assert_eq!(totals.batches, 50);

        let by_series = stamps_by_series(&client.batches());
        let stamps = &by_series["cpu,host=h-0"];
        assert_eq!(stamps.len(), 50);
        assert!(
            stamps.windows(2).all(|w| w[0] < w[1]),
            "{precision} stamps repeat: {stamps:?}"
        );
    }
}

#[tokio::test]
async fn test_full_results_channel_drops_instead_of_blocking() {
    let client = RecordingClient::default();
    let (tx, mut rx) = mpsc::channel(1);
    let mut items = points(2);

    let totals = write_points(
        &mut items,
        &client,
        config(2, 10, far_future(), Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.batches, 5);
    assert_eq!(client.batches().len(), 5);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_failed_sends_are_reported_not_raised() {
    let client = RecordingClient::default();
    client.set_status(500);
    let (tx, mut rx) = mpsc::channel(8);
    let mut items = points(2);

    let totals = write_points(
        &mut items,
        &client,
        config(2, 4, far_future(), Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 4);
    let results = drain(&mut rx);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == 500 && r.error.is_some()));
    assert!(results.iter().all(|r| r.body.is_some()));
}

#[tokio::test]
async fn test_gzip_batches() {
    let client = RecordingClient::default().with_gzip(-1);
    let (tx, _rx) = mpsc::channel(8);
    let mut items = points(2);
    let mut cfg = config(2, 4, far_future(), Box::new(Unthrottled), tx);
    cfg.gzip_level = client.gzip_level();

    write_points(&mut items, &client, cfg).await;

    let batches = client.batches();
    assert_eq!(batches.len(), 2);
    for batch in batches {
        let mut text = String::new();
        GzDecoder::new(&batch[..]).read_to_string(&mut text).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("cpu,host=h-0 v="));
    }
}

#[tokio::test]
#[should_panic(expected = "batch size must be greater than zero")]
async fn test_zero_batch_size_panics() {
    let client = RecordingClient::default();
    let (tx, _rx) = mpsc::channel(1);
    let mut items = points(1);
    write_points(
        &mut items,
        &client,
        config(0, 4, far_future(), Box::new(Unthrottled), tx),
    )
    .await;
}

#[tokio::test]
async fn test_dispatch_splits_shards_and_budget() {
    let client = Arc::new(RecordingClient::default());
    let (tx, _rx) = mpsc::channel(64);
    let cfg = DispatchConfig {
        concurrency: 3,
        batch_size: 2,
        max_points: 12,
        gzip_level: 0,
        runtime: Duration::from_secs(3600),
        precision: Precision::Nanosecond,
        pacing: Pacing::Unthrottled,
    };

    // 7 items over 3 writers: shards of 2, the seventh item is never written.
    let totals = dispatch_points(points(7), client.clone(), &cfg, tx).await.unwrap();

    assert_eq!(totals.points, 12);
    let by_series = stamps_by_series(&client.batches());
    assert_eq!(by_series.len(), 6);
    assert!(!by_series.contains_key("cpu,host=h-6"));
    assert!(by_series.values().all(|stamps| stamps.len() == 2));
}

#[tokio::test]
async fn test_dispatch_rejects_zero_concurrency() {
    let client = Arc::new(RecordingClient::default());
    let (tx, _rx) = mpsc::channel(1);
    let cfg = DispatchConfig {
        concurrency: 0,
        batch_size: 2,
        max_points: 4,
        gzip_level: 0,
        runtime: Duration::from_secs(1),
        precision: Precision::Nanosecond,
        pacing: Pacing::Unthrottled,
    };
    assert!(dispatch_points(points(4), client, &cfg, tx).await.is_err());
}

#[tokio::test]
async fn test_write_rows_truncates_final_chunk() {
    let client = RecordingClient::default();
    let (tx, mut rx) = mpsc::channel(8);
    let layout = Arc::new(TableLayout::new("cpu", "host=h", "v=0i").unwrap());
    let pool = StringPool::from_values(vec!["s".into()]).unwrap();
    let mut chunk = TableChunk::new(layout, 3, &pool);

    let totals = write_rows(
        &mut chunk,
        &client,
        config(3, 7, far_future(), Box::new(Unthrottled), tx),
    )
    .await;

    assert_eq!(totals.points, 7);
    let rows: Vec<usize> = client
        .statements()
        .iter()
        .map(|s| s.matches("(null,").count())
        .collect();
    assert_eq!(rows, vec![3, 3, 1]);
    assert!(client.statements()[0].starts_with("INSERT INTO cpu VALUES"));
    assert_eq!(drain(&mut rx).len(), 3);
}

#[tokio::test]
async fn test_dispatch_rows_per_writer_budget() {
    let client = Arc::new(RecordingClient::default());
    let (tx, _rx) = mpsc::channel(64);
    let layout = Arc::new(TableLayout::new("cpu", "host=h", "v=0i").unwrap());
    let pool = StringPool::from_values(vec!["s".into()]).unwrap();
    let cfg = DispatchConfig {
        concurrency: 2,
        batch_size: 4,
        max_points: 20,
        gzip_level: 0,
        runtime: Duration::from_secs(3600),
        precision: Precision::Nanosecond,
        pacing: Pacing::Unthrottled,
    };

    let totals = dispatch_rows(layout, &pool, client.clone() as Arc<dyn Client>, &cfg, tx)
        .await
        .unwrap();

    assert_eq!(totals.points, 20);
    assert_eq!(totals.batches, 6);
    assert_eq!(client.statements().len(), 6);
}
