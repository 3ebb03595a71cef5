//! The `insert` and `reset` commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use stress_client::{Client, FileClient, InfluxClient, InfluxConfig, MySqlClient};
use tracing::{error, info, warn};

use super::{CaseOutcome, CaseRunner, RunSettings, Workload};
use crate::config::{format_duration, CaseConfig, Config};
use crate::report::Report;

/// Command-line knobs of `insert`.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// `measurement,tag=value,...`; replaces the configured series template.
    pub series: Option<String>,
    pub fields: Option<String>,
    pub series_num: usize,
    /// Total point budget, `0` for unbounded.
    pub points: u64,
    pub batch_size: u64,
    pub pps: u64,
    pub runtime: Duration,
    pub create: String,
    pub dump: Option<String>,
    pub connection: Option<String>,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            series: None,
            fields: None,
            series_num: 100_000,
            points: 0,
            batch_size: 10_000,
            pps: 200_000,
            runtime: Duration::MAX,
            create: String::new(),
            dump: None,
            connection: None,
        }
    }
}

/// Writer count and batch size derived from the target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPlan {
    pub concurrency: usize,
    pub batch_size: u64,
}

impl InsertPlan {
    /// One writer per `batch_size` points per second. A rate below one batch
    /// shrinks the batch to the rate and uses a single writer.
    pub fn new(pps: u64, batch_size: u64) -> anyhow::Result<Self> {
        if pps == 0 {
            anyhow::bail!("pps must be greater than zero");
        }
        if batch_size == 0 {
            anyhow::bail!("batch size must be greater than zero");
        }
        if pps < batch_size {
            return Ok(Self {
                concurrency: 1,
                batch_size: pps,
            });
        }
        let concurrency = usize::try_from(pps / batch_size)
            .context("pps / batch size does not fit a writer count")?;
        Ok(Self {
            concurrency,
            batch_size,
        })
    }
}

/// Apply the `insert` overrides to the configured point shape.
fn apply_overrides(settings: &RunSettings, opts: &InsertOptions) -> anyhow::Result<RunSettings> {
    let mut settings = settings.clone();
    if let Some(series) = &opts.series {
        let Some((measurement, tags)) = series.split_once(',') else {
            anyhow::bail!("expect series like 'ctr,some=tag', got '{series}'");
        };
        settings.points.measurement = measurement.to_string();
        settings.points.series_key = tags.to_string();
    }
    if let Some(fields) = &opts.fields {
        settings.points.fields_str = fields.clone();
    }
    settings.points.series_num = opts.series_num;
    settings.points.points_num = opts.points;
    Ok(settings)
}

fn influx_target(cfg: &Config, name: Option<&str>) -> anyhow::Result<InfluxConfig> {
    match name {
        Some(name) => cfg
            .find_influx(name)
            .cloned()
            .with_context(|| format!("InfluxDB connection '{name}' not found")),
        None => Ok(cfg.default_influx().cloned().unwrap_or_else(|| {
            warn!("No InfluxDB connection configured, using defaults");
            InfluxConfig::default()
        })),
    }
}

fn print_banner(settings: &RunSettings, plan: &InsertPlan, opts: &InsertOptions) {
    let points = &settings.points;
    println!("Using point template: {}", points.template_line());
    println!("Using batch size of {} line(s)", plan.batch_size);
    println!("Spreading writes across {} series", points.series_num);
    if settings.fast {
        println!("Output is unthrottled");
    } else {
        println!("Throttling output to ~{} points/sec", opts.pps);
    }
    println!("Using {} concurrent writer(s)", plan.concurrency);
    let budget = if opts.points == 0 {
        "unlimited".to_string()
    } else {
        opts.points.to_string()
    };
    let runtime = if opts.runtime == Duration::MAX {
        "unlimited".to_string()
    } else {
        format_duration(opts.runtime)
    };
    println!("Running until ~{budget} points sent or until ~{runtime} has elapsed");
}

/// Write points to the default (or named) InfluxDB connection, or into a
/// dump file.
pub async fn insert(
    cfg: &Config,
    settings: &RunSettings,
    opts: &InsertOptions,
) -> anyhow::Result<CaseOutcome> {
    let settings = apply_overrides(settings, opts)?;
    let plan = InsertPlan::new(opts.pps, opts.batch_size)?;
    if !settings.quiet {
        print_banner(&settings, &plan, opts);
    }

    let influx = influx_target(cfg, opts.connection.as_deref())?;
    let case = CaseConfig {
        name: "insert".to_string(),
        connection: influx.name.clone(),
        concurrent: plan.concurrency,
        batch_size: plan.batch_size,
        gzip: influx.gzip,
        runtime: opts.runtime,
    };

    let mut runner = match &opts.dump {
        Some(path) => CaseRunner::dump_to_file(case, path, &influx, opts.create.clone()).await?,
        None => {
            let precision = influx.precision()?;
            let client = InfluxClient::connect(&influx)
                .await
                .with_context(|| format!("Failed to connect to {}", influx.url))?;
            let workload = Workload::Points {
                precision,
                create: opts.create.clone(),
            };
            CaseRunner::new(case, Arc::new(client), workload)
        }
    };

    let mut report = Report::for_cases();
    let outcome = runner.run(&settings, &mut report).await?;
    if !settings.quiet {
        println!("Write Throughput: {}", outcome.throughput);
        println!("Points Written: {}", outcome.points);
    }
    Ok(outcome)
}

async fn reset_influx(cfg: &Config, dump: Option<&str>) -> anyhow::Result<()> {
    let influx = cfg
        .default_influx()
        .context("No InfluxDB connection configured")?;
    let client: Box<dyn Client> = match dump {
        Some(path) => Box::new(FileClient::create_file(path, influx).await?),
        None => Box::new(InfluxClient::connect(influx).await?),
    };
    client.reset().await?;
    Ok(())
}

async fn reset_mysql(cfg: &Config) -> anyhow::Result<()> {
    let mysql = cfg
        .default_mysql()
        .context("No MySQL connection configured")?;
    let client = MySqlClient::connect(mysql).await?;
    let reset = client.reset().await;
    if let Err(e) = client.close().await {
        error!("Error closing mysql client: {e}");
    }
    reset?;
    Ok(())
}

/// Drop the databases of the default InfluxDB and MySQL connections.
/// Failures are logged per backend.
pub async fn reset(cfg: &Config, dump: Option<&str>) {
    match reset_influx(cfg, dump).await {
        Ok(()) => info!("influxdb reset"),
        Err(e) => error!("influxdb reset failed: {e:#}"),
    }
    match reset_mysql(cfg).await {
        Ok(()) => info!("mysql reset"),
        Err(e) => error!("mysql reset failed: {e:#}"),
    }
}
