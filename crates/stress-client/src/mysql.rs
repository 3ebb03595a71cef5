//! MySQL statement transport.

use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::Pool;
use tracing::{debug, info};

use crate::config::MySqlConfig;
use crate::error::ClientError;
use crate::{elapsed_ns, mask_connection_password, Client, SendOutcome, SUCCESS_STATUS};

/// Sends multi-row `INSERT` statements through a connection pool.
///
/// The pool starts without a database selected; `create` makes sure the
/// database exists and then swaps in a pool bound to it.
pub struct MySqlClient {
    cfg: MySqlConfig,
    pool: RwLock<Pool>,
}

impl MySqlClient {
    pub async fn connect(cfg: &MySqlConfig) -> Result<Self, ClientError> {
        let url = cfg.url(false)?;
        let pool = Pool::from_url(url.as_str()).map_err(mysql_async::Error::from)?;
        {
            let mut conn = pool.get_conn().await?;
            conn.ping().await?;
        }
        info!(
            "Connected to MySQL at {}",
            mask_connection_password(url.as_str())
        );
        Ok(Self {
            cfg: cfg.clone(),
            pool: RwLock::new(pool),
        })
    }

    fn pool(&self) -> Pool {
        self.pool
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_pool(&self, pool: Pool) -> Pool {
        let mut guard = self
            .pool
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, pool)
    }

    async fn execute(&self, statement: &str) -> Result<(), ClientError> {
        let mut conn = self.pool().get_conn().await?;
        conn.query_drop(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl Client for MySqlClient {
    async fn create(&self, command: &str) -> Result<(), ClientError> {
        if command.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "create table statement must not be empty".to_string(),
            ));
        }
        self.execute(&format!("CREATE DATABASE IF NOT EXISTS `{}`", self.cfg.db))
            .await?;

        let pool =
            Pool::from_url(self.cfg.url(true)?.as_str()).map_err(mysql_async::Error::from)?;
        let previous = self.replace_pool(pool);
        previous.disconnect().await?;

        debug!("Creating table: {command}");
        self.execute(command).await
    }

    async fn send(&self, _batch: &[u8]) -> SendOutcome {
        SendOutcome::failed(
            ClientError::NotSupported {
                client: "MySQL",
                operation: "send",
            },
            0,
        )
    }

    async fn send_string(&self, statement: &str) -> SendOutcome {
        let start = Instant::now();
        match self.execute(statement).await {
            Ok(()) => SendOutcome {
                latency_ns: elapsed_ns(start),
                status: SUCCESS_STATUS,
                ..Default::default()
            },
            Err(e) => SendOutcome::failed(e, elapsed_ns(start)),
        }
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.pool().disconnect().await?;
        Ok(())
    }

    async fn reset(&self) -> Result<(), ClientError> {
        self.execute(&format!("DROP DATABASE IF EXISTS `{}`", self.cfg.db))
            .await
    }

    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn connection(&self) -> String {
        self.cfg.host.clone()
    }

    fn gzip_level(&self) -> i32 {
        0
    }
}
