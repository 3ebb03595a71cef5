//! In-memory client that records every payload.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::{elapsed_ns, Client, SendOutcome, SUCCESS_STATUS};

/// Records batches, statements and schema commands instead of sending them.
pub struct RecordingClient {
    name: String,
    status: AtomicU16,
    gzip: i32,
    latency: Option<Duration>,
    fail_create: bool,
    closed: AtomicBool,
    batches: Mutex<Vec<Vec<u8>>>,
    statements: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
}

impl Default for RecordingClient {
    fn default() -> Self {
        Self::new("recording")
    }
}

impl RecordingClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: AtomicU16::new(SUCCESS_STATUS),
            gzip: 0,
            latency: None,
            fail_create: false,
            closed: AtomicBool::new(false),
            batches: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_gzip(mut self, level: i32) -> Self {
        self.gzip = level;
        self
    }

    /// Sleep this long inside every send.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Status reported by subsequent sends.
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<u8>> {
        lock(&self.batches).clone()
    }

    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).clone()
    }

    pub fn created(&self) -> Vec<String> {
        lock(&self.created).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn outcome(&self, start: Instant) -> SendOutcome {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let status = self.status.load(Ordering::SeqCst);
        SendOutcome {
            latency_ns: elapsed_ns(start),
            status,
            body: (status != SUCCESS_STATUS).then(|| format!("status {status}")),
            error: (status >= 400).then(|| {
                std::sync::Arc::new(ClientError::Status {
                    status,
                    body: String::new(),
                })
            }),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Client for RecordingClient {
    async fn create(&self, command: &str) -> Result<(), ClientError> {
        if self.fail_create {
            return Err(ClientError::Command {
                command: command.to_string(),
                status: 500,
                body: "create refused".to_string(),
            });
        }
        lock(&self.created).push(command.to_string());
        Ok(())
    }

    async fn send(&self, batch: &[u8]) -> SendOutcome {
        let start = Instant::now();
        lock(&self.batches).push(batch.to_vec());
        self.outcome(start).await
    }

    async fn send_string(&self, statement: &str) -> SendOutcome {
        let start = Instant::now();
        lock(&self.statements).push(statement.to_string());
        self.outcome(start).await
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self) -> Result<(), ClientError> {
        lock(&self.batches).clear();
        lock(&self.statements).clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn gzip_level(&self) -> i32 {
        self.gzip
    }
}
