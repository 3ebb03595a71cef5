//! Configuration file model.
//!
//! The file is TOML with kebab-case keys:
//!
//! ```toml
//! [[connection.influxdb]]
//! name = "influx1.8"
//! url = "http://localhost:8086"
//! default = true
//!
//! [[connection.mysql]]
//! name = "mysql"
//! host = "localhost:3306"
//!
//! [points]
//! measurement = "ctr"
//! series-key = "some=tag"
//! fields-str = "n=0i"
//! series-num = 100000
//!
//! [cases]
//! delay = "1m"
//!
//! [[cases.case]]
//! name = "influx-c20-b2000"
//! connection = "influx1.8"
//! concurrent = 20
//! batch-size = 2000
//! runtime = "30s"
//! ```
//!
//! Every section is optional; missing keys take the defaults below.

pub mod duration;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stress_client::{InfluxConfig, MySqlConfig};
use tracing::{debug, warn};

pub use duration::{format_duration, parse_duration};

/// Name of the configuration file looked up in the search paths.
pub const CONFIG_FILE_NAME: &str = "dbstress.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub points: PointsConfig,
    pub stats_record: StatsRecordConfig,
    pub cases: CasesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConnectionConfig {
    pub influxdb: Vec<InfluxConfig>,
    pub mysql: Vec<MySqlConfig>,
}

/// Shape of the generated points and rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PointsConfig {
    pub measurement: String,
    /// Tag template, `k1=v1,k2=v2`.
    pub series_key: String,
    /// Field template, `n=0i,f=1.5,s=abcstr`.
    pub fields_str: String,
    pub series_num: usize,
    /// Total point budget per case; `0` means unbounded.
    pub points_num: u64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            measurement: "ctr".to_string(),
            series_key: "some=tag".to_string(),
            fields_str: "n=0i".to_string(),
            series_num: 100_000,
            points_num: 0,
        }
    }
}

impl PointsConfig {
    pub fn max_points(&self) -> u64 {
        if self.points_num == 0 {
            stress_engine::UNBOUNDED
        } else {
            self.points_num
        }
    }

    /// `measurement,tags` as printed in the report banner.
    pub fn template_line(&self) -> String {
        format!("{},{} {} <timestamp>", self.measurement, self.series_key, self.fields_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StatsRecordConfig {
    pub enable: bool,
    pub host: String,
    pub database: String,
}

impl Default for StatsRecordConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "http://localhost:8086".to_string(),
            database: "stress_stats".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CasesConfig {
    /// Pause between two cases.
    #[serde(with = "duration::serde_str")]
    pub delay: Duration,
    pub fast: bool,
    #[serde(with = "duration::serde_str")]
    pub tick: Duration,
    /// Optional CSV file with more cases, appended after `[[cases.case]]`.
    pub file: Option<PathBuf>,
    #[serde(rename = "case")]
    pub cases: Vec<CaseConfig>,
}

impl Default for CasesConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(60),
            fast: true,
            tick: Duration::from_secs(1),
            file: None,
            cases: Vec::new(),
        }
    }
}

/// One named workload against one named connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseConfig {
    pub name: String,
    pub connection: String,
    pub concurrent: usize,
    pub batch_size: u64,
    #[serde(default)]
    pub gzip: i32,
    #[serde(with = "duration::serde_str")]
    pub runtime: Duration,
}

/// Target of a case, resolved from its connection name.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Influx(InfluxConfig),
    MySql(MySqlConfig),
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Influx(_) => "influxdb",
            Backend::MySql(_) => "mysql",
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from a TOML string and validate connections.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        for influx in &config.connection.influxdb {
            influx.validate()?;
        }
        Ok(config)
    }

    /// Load `explicit` when given, otherwise the first file found in
    /// [`search_paths`]. With no file at all the defaults are used.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for path in search_paths() {
            if path.is_file() {
                debug!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }
        warn!("No configuration file found, using defaults.");
        Ok(Self::default())
    }

    pub fn find_influx(&self, name: &str) -> Option<&InfluxConfig> {
        self.connection
            .influxdb
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn find_mysql(&self, name: &str) -> Option<&MySqlConfig> {
        self.connection
            .mysql
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The connection marked `default = true`, else the first one.
    pub fn default_influx(&self) -> Option<&InfluxConfig> {
        let all = &self.connection.influxdb;
        all.iter().find(|c| c.default).or_else(|| all.first())
    }

    pub fn default_mysql(&self) -> Option<&MySqlConfig> {
        let all = &self.connection.mysql;
        all.iter().find(|c| c.default).or_else(|| all.first())
    }

    /// Resolve a connection name to its backend. A name defined for both
    /// backends is ambiguous.
    pub fn resolve_backend(&self, name: &str) -> anyhow::Result<Backend> {
        match (self.find_influx(name), self.find_mysql(name)) {
            (Some(influx), None) => Ok(Backend::Influx(influx.clone())),
            (None, Some(mysql)) => Ok(Backend::MySql(mysql.clone())),
            (Some(_), Some(_)) => {
                anyhow::bail!("Connection '{name}' is defined for both influxdb and mysql")
            }
            (None, None) => anyhow::bail!("Connection '{name}' not found"),
        }
    }
}

/// `./dbstress.toml`, `$HOME/.config/dbstress/dbstress.toml`,
/// `/etc/dbstress/dbstress.toml`.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(
            PathBuf::from(home)
                .join(".config")
                .join("dbstress")
                .join(CONFIG_FILE_NAME),
        );
    }
    paths.push(PathBuf::from("/etc/dbstress").join(CONFIG_FILE_NAME));
    paths
}
