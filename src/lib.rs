//! dbstress library
//!
//! Load generator for InfluxDB (line protocol over HTTP) and MySQL
//! (multi-row inserts). The write engine lives in the `stress-engine`
//! crate; this crate wires it to the configuration file, the case files and
//! the report table.
//!
//! # CLI Usage
//!
//! ```bash
//! # Write to the default InfluxDB connection at ~200k points/sec
//! dbstress insert --pps 200000 --batch-size 10000 --runtime 1m
//!
//! # Run the cases of dbstress.toml, two of them only
//! dbstress cases run --run influx-c20,mysql-c4
//!
//! # Drop the stress databases
//! dbstress reset
//! ```

pub mod cases;
pub mod config;
pub mod report;
pub mod runner;

pub use config::{Backend, CaseConfig, Config};
pub use report::Report;
pub use runner::{CaseOutcome, CaseRunner, CaseState, RunSettings, StatsTarget, Workload};
