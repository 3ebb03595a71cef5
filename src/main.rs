//! Command-line interface for dbstress
//!
//! # Usage Examples
//!
//! ## Insert
//! ```bash
//! # Throttled writes to the default InfluxDB connection
//! dbstress insert --series-num 100000 --batch-size 5000 --pps 100000 --runtime 5m
//!
//! # Unthrottled, into a file instead of over HTTP
//! dbstress --fast insert "cpu,host=server" "value=1i" --points 1000000 --dump out.lp
//! ```
//!
//! ## Cases
//! ```bash
//! dbstress cases list
//! dbstress cases run --run influx-c20
//! dbstress cases gen
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dbstress::cases::{self, SAMPLE_FILE};
use dbstress::config::{parse_duration, Config};
use dbstress::runner::{self, InsertOptions, RunSettings, StatsTarget};

#[derive(Parser)]
#[command(name = "dbstress")]
#[command(about = "Stress InfluxDB and MySQL with synthetic writes")]
#[command(long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Clone)]
struct GlobalOpts {
    /// Configuration file (default: search ./, ~/.config/dbstress, /etc/dbstress)
    #[arg(long, global = true, env = "DBSTRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Only print the write throughput
    #[arg(short, long, global = true, env = "DBSTRESS_QUIET")]
    quiet: bool,

    /// Exit as soon as an error or unexpected status is encountered
    #[arg(long, global = true, env = "DBSTRESS_STRICT")]
    strict: bool,

    /// Kapacitor mode: do not try to create the database
    #[arg(short, long, global = true, env = "DBSTRESS_KAPACITOR")]
    kapacitor: bool,

    /// Run as fast as possible
    #[arg(short, long, global = true, env = "DBSTRESS_FAST")]
    fast: bool,

    /// Time between two batches of one writer
    #[arg(long, global = true, value_parser = parse_duration, env = "DBSTRESS_TICK")]
    tick: Option<Duration>,

    /// Record runtime statistics
    #[arg(long, global = true, env = "DBSTRESS_STATS")]
    stats: bool,

    /// InfluxDB where runtime statistics are recorded
    #[arg(long, global = true, env = "DBSTRESS_STATS_HOST")]
    stats_host: Option<String>,

    /// Database that statistics are written to
    #[arg(long, global = true, env = "DBSTRESS_STATS_DB")]
    stats_db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert points into InfluxDB
    Insert {
        /// Series template, e.g. "ctr,some=tag"
        series: Option<String>,

        /// Field template, e.g. "n=0i,f=1.5,s=abcstr"
        fields: Option<String>,

        /// Number of series that will be written
        #[arg(short = 's', long, default_value_t = 100_000)]
        series_num: usize,

        /// Number of points that will be written (0 = unlimited)
        #[arg(short = 'n', long, default_value_t = 0)]
        points: u64,

        /// Number of points in a batch
        #[arg(short, long, default_value_t = 10_000)]
        batch_size: u64,

        /// Points per second
        #[arg(long, default_value_t = 200_000)]
        pps: u64,

        /// Total time the test will run (unlimited when omitted)
        #[arg(short, long, value_parser = parse_duration)]
        runtime: Option<Duration>,

        /// Custom create database command
        #[arg(long, default_value = "")]
        create: String,

        /// Dump to the given file instead of writing over HTTP
        #[arg(long)]
        dump: Option<String>,

        /// InfluxDB connection name (default connection when omitted)
        #[arg(long)]
        connection: Option<String>,
    },

    /// Drop all data of the default connections
    Reset {
        /// Dump to the given file instead of writing over HTTP
        #[arg(long)]
        dump: Option<String>,
    },

    /// Predefined cases
    Cases {
        #[command(subcommand)]
        command: CasesCommand,
    },

    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum CasesCommand {
    /// Run the configured cases
    Run {
        /// Only run these cases (comma separated names)
        #[arg(long, value_delimiter = ',')]
        run: Vec<String>,
    },
    /// List the configured cases
    List,
    /// Write a sample cases file
    Gen {
        #[arg(long, default_value = SAMPLE_FILE)]
        output: PathBuf,
    },
}

impl GlobalOpts {
    /// Flags override the configuration file.
    fn settings(&self, cfg: &Config) -> RunSettings {
        let mut settings = RunSettings::from_config(cfg);
        settings.quiet = self.quiet;
        settings.strict = self.strict;
        settings.kapacitor = self.kapacitor;
        settings.fast |= self.fast;
        if let Some(tick) = self.tick {
            settings.tick = tick;
        }
        if self.stats || settings.stats.is_some() {
            let mut target = settings.stats.take().unwrap_or_else(|| StatsTarget {
                host: cfg.stats_record.host.clone(),
                database: cfg.stats_record.database.clone(),
            });
            if let Some(host) = &self.stats_host {
                target.host = host.clone();
            }
            if let Some(db) = &self.stats_db {
                target.database = db.clone();
            }
            settings.stats = Some(target);
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Cli { global, command } = Cli::parse();
    let load = || -> anyhow::Result<(Config, RunSettings)> {
        let cfg = Config::load(global.config.as_deref())?;
        let settings = global.settings(&cfg);
        Ok((cfg, settings))
    };

    match command {
        Commands::Insert {
            series,
            fields,
            series_num,
            points,
            batch_size,
            pps,
            runtime,
            create,
            dump,
            connection,
        } => {
            let (cfg, settings) = load()?;
            let opts = InsertOptions {
                series,
                fields,
                series_num,
                points,
                batch_size,
                pps,
                runtime: runtime.unwrap_or(Duration::MAX),
                create,
                dump,
                connection,
            };
            runner::insert(&cfg, &settings, &opts).await?;
        }
        Commands::Reset { dump } => {
            let (cfg, _) = load()?;
            runner::reset(&cfg, dump.as_deref()).await;
        }
        Commands::Cases { command } => {
            let (cfg, settings) = load()?;
            match command {
                CasesCommand::Run { run } => {
                    let mut runners = runner::build_runners(&cfg, &settings, &run).await?;
                    if runners.is_empty() {
                        tracing::warn!("No runnable case found");
                        return Ok(());
                    }
                    let report = runner::run_cases(&mut runners, &settings, cfg.cases.delay).await;
                    print!("{}", runner::render_report(&report, &settings));
                }
                CasesCommand::List => {
                    let all = cases::collect_cases(&cfg.cases)?;
                    if let Some(table) = cases::list_table(&all) {
                        println!("{table}");
                    }
                }
                CasesCommand::Gen { output } => {
                    cases::write_cases(&output, &cases::sample_cases())?;
                }
            }
        }
        Commands::Version => {
            println!("dbstress {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
