//! Case definitions from CSV files.
//!
//! A case file has the header `name,connection,concurrent,batch-size,gzip,runtime`;
//! the `gzip` column is optional.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::info;

use crate::config::{format_duration, CaseConfig, CasesConfig};

/// File written by `cases gen`.
pub const SAMPLE_FILE: &str = "./cases.csv";

pub fn load_cases<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<CaseConfig>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open cases file {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut cases = Vec::new();
    for (i, record) in reader.deserialize::<CaseConfig>().enumerate() {
        let case = record.with_context(|| {
            format!("Invalid case on line {} of {}", i + 2, path.display())
        })?;
        cases.push(case);
    }
    Ok(cases)
}

pub fn write_cases<P: AsRef<Path>>(path: P, cases: &[CaseConfig]) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create cases file {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for case in cases {
        writer.serialize(case)?;
    }
    writer.flush()?;
    info!("Wrote {} case(s) to {}", cases.len(), path.display());
    Ok(())
}

pub fn sample_cases() -> Vec<CaseConfig> {
    vec![CaseConfig {
        name: "Sample".to_string(),
        connection: "Influx1.8".to_string(),
        concurrent: 20,
        batch_size: 2000,
        gzip: 0,
        runtime: Duration::from_secs(30),
    }]
}

/// Cases from the configuration file followed by those of `cases.file`.
pub fn collect_cases(cfg: &CasesConfig) -> anyhow::Result<Vec<CaseConfig>> {
    let mut cases = cfg.cases.clone();
    if let Some(file) = &cfg.file {
        cases.extend(load_cases(file)?);
    }
    Ok(cases)
}

/// Keep the cases whose name is in `names` (case-insensitive). An empty
/// filter keeps everything.
pub fn filter_cases(cases: Vec<CaseConfig>, names: &[String]) -> Vec<CaseConfig> {
    if names.is_empty() {
        return cases;
    }
    cases
        .into_iter()
        .filter(|c| names.iter().any(|n| n.trim().eq_ignore_ascii_case(&c.name)))
        .collect()
}

/// Table for `cases list`, `None` when there is nothing to show.
pub fn list_table(cases: &[CaseConfig]) -> Option<String> {
    if cases.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["name", "connection", "concur", "batch", "run"]);
    for case in cases {
        table.add_row(vec![
            case.name.clone(),
            case.connection.clone(),
            case.concurrent.to_string(),
            case.batch_size.to_string(),
            format_duration(case.runtime),
        ]);
    }
    Some(table.to_string())
}
