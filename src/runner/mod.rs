//! Case orchestration.
//!
//! [`RunSettings`] is built once from the configuration file and the
//! command line, then handed by reference to every case. Cases run one
//! after another with `cases.delay` between them.

mod case;
mod insert;

use std::time::Duration;

use stress_engine::Pacing;
use tracing::{error, info, warn};

use crate::cases::{collect_cases, filter_cases};
use crate::config::{format_duration, Config, PointsConfig};
use crate::report::Report;

pub use case::{throughput, CaseOutcome, CaseRunner, CaseState, Workload};
pub use insert::{insert, reset, InsertOptions, InsertPlan};

/// Where the stats sink records its samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsTarget {
    pub host: String,
    pub database: String,
}

/// Immutable settings shared by every case of one invocation.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub tick: Duration,
    pub fast: bool,
    pub quiet: bool,
    pub strict: bool,
    /// Skip database creation; the target manages its own schema.
    pub kapacitor: bool,
    pub points: PointsConfig,
    pub stats: Option<StatsTarget>,
}

impl RunSettings {
    /// Settings taken from the configuration file alone.
    pub fn from_config(cfg: &Config) -> Self {
        let stats = cfg.stats_record.enable.then(|| StatsTarget {
            host: cfg.stats_record.host.clone(),
            database: cfg.stats_record.database.clone(),
        });
        Self {
            tick: cfg.cases.tick,
            fast: cfg.cases.fast,
            quiet: false,
            strict: false,
            kapacitor: false,
            points: cfg.points.clone(),
            stats,
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::from_settings(self.tick, self.fast)
    }
}

/// Build a runner per selected case. Cases whose connection cannot be
/// resolved or reached are logged and skipped.
pub async fn build_runners(
    cfg: &Config,
    settings: &RunSettings,
    names: &[String],
) -> anyhow::Result<Vec<CaseRunner>> {
    let cases = filter_cases(collect_cases(&cfg.cases)?, names);
    let mut runners = Vec::with_capacity(cases.len());
    for case in cases {
        let name = case.name.clone();
        let backend = match cfg.resolve_backend(&case.connection) {
            Ok(backend) => backend,
            Err(e) => {
                error!(case = %name, "Skipping case: {e:#}");
                continue;
            }
        };
        match CaseRunner::connect(case, backend, settings).await {
            Ok(runner) => runners.push(runner),
            Err(e) => error!(case = %name, "Skipping case: {e:#}"),
        }
    }
    Ok(runners)
}

/// Run `runners` sequentially, sleeping `delay` between two cases.
/// A failing case is logged and the next one still runs.
pub async fn run_cases(
    runners: &mut [CaseRunner],
    settings: &RunSettings,
    delay: Duration,
) -> Report {
    let mut report = Report::for_cases();
    let total = runners.len();
    for (i, runner) in runners.iter_mut().enumerate() {
        info!("running case {}/{}: {}", i + 1, total, runner.name());
        if let Err(e) = runner.run(settings, &mut report).await {
            error!(case = %runner.name(), "Case failed: {e:#}");
        }
        if i + 1 < total && !delay.is_zero() {
            info!("waiting {} before next case", format_duration(delay));
            tokio::time::sleep(delay).await;
        }
    }
    report
}

/// Text printed after all cases, empty in quiet mode.
pub fn render_report(report: &Report, settings: &RunSettings) -> String {
    if settings.quiet {
        return String::new();
    }
    if report.is_empty() {
        warn!("No case produced a report row");
    }
    format!(
        "\nReport: =======>\nUse point template: {}\n\n{}\n",
        settings.points.template_line(),
        report.render()
    )
}
