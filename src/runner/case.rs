//! One case: schema, sink pipeline, dispatch and the report row.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use stress_client::{Client, FileClient, InfluxClient, InfluxConfig, MySqlClient};
use stress_data::pool::DEFAULT_POOL_SIZE;
use stress_data::{generate_points_from_templates, Precision, StringPool, TableLayout};
use stress_engine::{
    dispatch_points, dispatch_rows, DispatchConfig, DispatchTotals, ErrorSink, MultiSink, Sink,
    StatsSink, Summary, SummarySink,
};
use tracing::{error, info, warn};

use super::RunSettings;
use crate::config::{Backend, CaseConfig};
use crate::report::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Configured,
    Running,
    Completed,
    Failed,
}

/// What the case writes.
#[derive(Debug, Clone)]
pub enum Workload {
    /// Line-protocol points; `create` is the schema command (empty for the
    /// backend default).
    Points { precision: Precision, create: String },
    /// Multi-row inserts into the table described by the layout.
    Rows(Arc<TableLayout>),
}

/// Totals of a finished case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaseOutcome {
    pub points: u64,
    pub batches: u64,
    pub elapsed: Duration,
    pub throughput: u64,
    pub summary: Summary,
}

pub struct CaseRunner {
    case: CaseConfig,
    client: Arc<dyn Client>,
    workload: Workload,
    state: CaseState,
}

impl CaseRunner {
    pub fn new(case: CaseConfig, client: Arc<dyn Client>, workload: Workload) -> Self {
        Self {
            case,
            client,
            workload,
            state: CaseState::Configured,
        }
    }

    /// Build the client for `backend`. A non-zero case gzip level overrides
    /// the connection's.
    pub async fn connect(
        case: CaseConfig,
        backend: Backend,
        settings: &RunSettings,
    ) -> anyhow::Result<Self> {
        match backend {
            Backend::Influx(mut cfg) => {
                if case.gzip != 0 {
                    cfg.gzip = case.gzip;
                }
                cfg.validate()?;
                let precision = cfg.precision()?;
                let client = InfluxClient::connect(&cfg)
                    .await
                    .with_context(|| format!("Failed to connect to {}", cfg.url))?;
                let workload = Workload::Points {
                    precision,
                    create: String::new(),
                };
                Ok(Self::new(case, Arc::new(client), workload))
            }
            Backend::MySql(cfg) => {
                let points = &settings.points;
                let layout =
                    TableLayout::new(&points.measurement, &points.series_key, &points.fields_str)?;
                let client = MySqlClient::connect(&cfg)
                    .await
                    .with_context(|| format!("Failed to connect to mysql at {}", cfg.host))?;
                Ok(Self::new(case, Arc::new(client), Workload::Rows(Arc::new(layout))))
            }
        }
    }

    /// Points runner writing into a dump file instead of over HTTP.
    pub async fn dump_to_file(
        case: CaseConfig,
        path: &str,
        cfg: &InfluxConfig,
        create: String,
    ) -> anyhow::Result<Self> {
        let precision = cfg.precision()?;
        let client = FileClient::create_file(path, cfg)
            .await
            .with_context(|| format!("Failed to open dump file {path}"))?;
        Ok(Self::new(case, Arc::new(client), Workload::Points { precision, create }))
    }

    pub fn name(&self) -> &str {
        &self.case.name
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    pub fn connection(&self) -> String {
        self.client.connection()
    }

    /// Run the case once and append its row to `report` (or print the
    /// throughput in quiet mode).
    pub async fn run(
        &mut self,
        settings: &RunSettings,
        report: &mut Report,
    ) -> anyhow::Result<CaseOutcome> {
        if self.state != CaseState::Configured {
            anyhow::bail!("Case '{}' has already been run", self.case.name);
        }
        info!(name = %self.case.name, "running case");
        self.state = CaseState::Running;

        match self.execute(settings, report).await {
            Ok(outcome) => {
                self.state = CaseState::Completed;
                Ok(outcome)
            }
            Err(e) => {
                self.state = CaseState::Failed;
                Err(e)
            }
        }
    }

    /// Drive the case, then close the client whatever the result.
    async fn execute(&self, settings: &RunSettings, report: &mut Report) -> anyhow::Result<CaseOutcome> {
        let result = self.drive(settings, report).await;
        if let Err(e) = self.client.close().await {
            error!("Error closing client: {e}");
        }
        result
    }

    async fn drive(&self, settings: &RunSettings, report: &mut Report) -> anyhow::Result<CaseOutcome> {
        self.validate(settings)?;
        self.create_schema(settings).await?;

        let concurrency = self.case.concurrent;
        let mut multi = MultiSink::new(concurrency);
        multi.add_sink(Box::new(ErrorSink::new(concurrency, settings.strict)))?;
        if let Some(stats) = &settings.stats {
            match StatsSink::influx(concurrency, &stats.host, &stats.database) {
                Ok(sink) => multi.add_sink(Box::new(sink))?,
                Err(e) => warn!("Stats recording disabled: {e}"),
            }
        }
        let summary_sink = SummarySink::new(concurrency);
        let summary = summary_sink.handle();
        multi.add_sink(Box::new(summary_sink))?;
        multi.open().await?;
        let results = multi
            .sender()
            .context("Result pipeline closed before dispatch")?;

        let dispatch = DispatchConfig {
            concurrency,
            batch_size: self.case.batch_size,
            max_points: settings.points.max_points(),
            gzip_level: self.client.gzip_level(),
            runtime: self.case.runtime,
            precision: self.precision(),
            pacing: settings.pacing(),
        };

        let started_at = Utc::now();
        let start = Instant::now();
        let dispatched = self.dispatch(settings, &dispatch, results).await;
        let elapsed = start.elapsed();

        if let Err(e) = multi.close().await {
            error!("Error closing result sinks: {e}");
        }
        let totals = dispatched?;

        let summary = summary.lock().map(|s| *s).unwrap_or_default();
        let throughput = throughput(totals.points, elapsed);
        let outcome = CaseOutcome {
            points: totals.points,
            batches: totals.batches,
            elapsed,
            throughput,
            summary,
        };

        if settings.quiet {
            println!("{throughput}");
        } else {
            report.append(self.report_row(started_at, &outcome))?;
        }
        Ok(outcome)
    }

    fn precision(&self) -> Precision {
        match &self.workload {
            Workload::Points { precision, .. } => *precision,
            Workload::Rows(_) => Precision::Nanosecond,
        }
    }

    fn validate(&self, settings: &RunSettings) -> anyhow::Result<()> {
        if self.case.concurrent == 0 {
            anyhow::bail!("Case '{}': concurrent must be greater than zero", self.case.name);
        }
        if self.case.batch_size == 0 {
            anyhow::bail!("Case '{}': batch-size must be greater than zero", self.case.name);
        }
        if matches!(self.workload, Workload::Points { .. })
            && settings.points.series_num < self.case.concurrent
        {
            anyhow::bail!(
                "Case '{}': {} series cannot be spread across {} writers",
                self.case.name,
                settings.points.series_num,
                self.case.concurrent
            );
        }
        Ok(())
    }

    async fn create_schema(&self, settings: &RunSettings) -> anyhow::Result<()> {
        match &self.workload {
            Workload::Points { create, .. } => {
                if settings.kapacitor {
                    return Ok(());
                }
                self.client
                    .create(create)
                    .await
                    .context("Failed to create database")?;
            }
            Workload::Rows(layout) => {
                self.client
                    .create(&layout.create_statement())
                    .await
                    .with_context(|| format!("Failed to create table {}", layout.name()))?;
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        settings: &RunSettings,
        cfg: &DispatchConfig,
        results: tokio::sync::mpsc::Sender<stress_engine::WriteResult>,
    ) -> anyhow::Result<DispatchTotals> {
        let pool = StringPool::generate(DEFAULT_POOL_SIZE)?;
        let totals = match &self.workload {
            Workload::Points { precision, .. } => {
                let points = &settings.points;
                let items = generate_points_from_templates(
                    &points.measurement,
                    &points.series_key,
                    &points.fields_str,
                    points.series_num,
                    *precision,
                    &pool,
                )?;
                dispatch_points(items, self.client.clone(), cfg, results).await?
            }
            Workload::Rows(layout) => {
                dispatch_rows(layout.clone(), &pool, self.client.clone(), cfg, results).await?
            }
        };
        Ok(totals)
    }

    fn report_row(&self, started_at: DateTime<Utc>, outcome: &CaseOutcome) -> Vec<String> {
        let avg_latency = outcome
            .summary
            .mean_latency()
            .map_or_else(|| "-".to_string(), |d| format!("{:.2}ms", d.as_secs_f64() * 1e3));
        vec![
            self.case.name.clone(),
            self.client.connection(),
            "insert".to_string(),
            self.case.concurrent.to_string(),
            self.case.batch_size.to_string(),
            started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.3}s", outcome.elapsed.as_secs_f64()),
            outcome.throughput.to_string(),
            outcome.points.to_string(),
            outcome.summary.errors.to_string(),
            avg_latency,
        ]
    }
}

/// Points per second, truncated.
pub fn throughput(points: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    (points as f64 / secs) as u64
}
