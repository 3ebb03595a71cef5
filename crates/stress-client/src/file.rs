//! Line-protocol file dump.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::InfluxConfig;
use crate::error::ClientError;
use crate::influx::write_url;
use crate::{elapsed_ns, Client, SendOutcome, SUCCESS_STATUS};

struct DumpState {
    file: File,
    batch: u64,
}

/// Writes every batch to a local file instead of a server.
///
/// The file starts with a `# <write url>` comment, each batch is preceded by
/// `# Batch N:` and schema creation is recorded as `# create: <command>`.
pub struct FileClient {
    path: PathBuf,
    database: String,
    state: Mutex<DumpState>,
}

impl FileClient {
    pub async fn create_file(path: impl AsRef<Path>, cfg: &InfluxConfig) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).await?;
        file.write_all(format!("# {}\n", write_url(cfg)?).as_bytes())
            .await?;

        Ok(Self {
            path,
            database: cfg.db.clone(),
            state: Mutex::new(DumpState { file, batch: 0 }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, batch: &[u8]) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.batch += 1;
        let header = format!("# Batch {}:\n", state.batch);
        state.file.write_all(header.as_bytes()).await?;
        state.file.write_all(batch).await?;
        state.file.write_all(b"\n").await?;
        Ok(())
    }
}

#[async_trait]
impl Client for FileClient {
    async fn create(&self, command: &str) -> Result<(), ClientError> {
        let command = if command.is_empty() {
            format!("CREATE DATABASE {}", self.database)
        } else {
            command.to_string()
        };
        let mut state = self.state.lock().await;
        state
            .file
            .write_all(format!("# create: {command}\n\n").as_bytes())
            .await?;
        Ok(())
    }

    async fn send(&self, batch: &[u8]) -> SendOutcome {
        let start = Instant::now();
        match self.append(batch).await {
            Ok(()) => SendOutcome {
                latency_ns: elapsed_ns(start),
                status: SUCCESS_STATUS,
                ..Default::default()
            },
            Err(e) => SendOutcome::failed(e, elapsed_ns(start)),
        }
    }

    async fn send_string(&self, _statement: &str) -> SendOutcome {
        SendOutcome::failed(
            ClientError::NotSupported {
                client: "InfluxFile",
                operation: "send_string",
            },
            0,
        )
    }

    async fn close(&self) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.file.flush().await?;
        state.file.sync_all().await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), ClientError> {
        Err(ClientError::NotSupported {
            client: "InfluxFile",
            operation: "reset",
        })
    }

    fn name(&self) -> &str {
        "InfluxFile"
    }

    fn connection(&self) -> String {
        self.path.display().to_string()
    }

    fn gzip_level(&self) -> i32 {
        0
    }
}
