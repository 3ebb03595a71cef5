//! InfluxDB line-protocol transport over HTTP.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::InfluxConfig;
use crate::error::ClientError;
use crate::{elapsed_ns, Client, SendOutcome};

#[derive(Debug, Clone)]
enum Api {
    V1 {
        database: String,
        user: String,
        pass: String,
    },
    V2 {
        org_id: String,
        bucket: String,
        token: String,
    },
}

/// HTTP client for the InfluxDB v1 `/write` or v2 `/api/v2/write` endpoint.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    name: String,
    base_url: String,
    write_url: Url,
    gzip: i32,
    api: Api,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    id: String,
    name: String,
}

impl InfluxClient {
    /// Build a client without contacting the server.
    pub fn new(cfg: &InfluxConfig) -> Result<Self, ClientError> {
        cfg.validate()?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(cfg.tls_skip_verify)
            .build()?;
        let base_url = cfg.url.trim_end_matches('/').to_string();
        let api = if cfg.api_version == 2 {
            Api::V2 {
                org_id: cfg.v2.org_id.clone(),
                bucket: cfg.v2.bucket.clone(),
                token: cfg.v2.token.clone(),
            }
        } else {
            Api::V1 {
                database: cfg.db.clone(),
                user: cfg.user.clone(),
                pass: cfg.pass.clone(),
            }
        };

        Ok(Self {
            name: cfg.name.clone(),
            write_url: write_url(cfg)?,
            base_url,
            gzip: cfg.gzip,
            api,
            http,
        })
    }

    /// Build a client and verify the server answers its health endpoint.
    pub async fn connect(cfg: &InfluxConfig) -> Result<Self, ClientError> {
        let client = Self::new(cfg)?;
        client.check_health().await?;
        info!("Connected to InfluxDB at {}", client.base_url);
        Ok(client)
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    pub async fn check_health(&self) -> Result<(), ClientError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::HealthCheck {
                url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn query_v1(&self, command: &str, user: &str, pass: &str) -> Result<(), ClientError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("q", command)
            .finish();
        let mut req = self
            .http
            .post(format!("{}/query", self.base_url))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form);
        if !user.is_empty() && !pass.is_empty() {
            req = req.basic_auth(user, Some(pass));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ClientError::Command {
                command: command.to_string(),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        debug!("Executed '{command}'");
        Ok(())
    }

    fn v2_request(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .header(CONTENT_TYPE, "application/json");
        if token.is_empty() {
            req
        } else {
            req.header(AUTHORIZATION, format!("Token {token}"))
        }
    }

    async fn create_bucket(&self, org_id: &str, bucket: &str, token: &str) -> Result<(), ClientError> {
        let payload = serde_json::json!({
            "orgID": org_id,
            "name": bucket,
            "retentionRules": [],
        });
        let resp = self
            .v2_request(reqwest::Method::POST, "/api/v2/buckets", token)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // An existing bucket answers 422 (or 409 on some versions).
        if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::CONFLICT {
            debug!("Bucket '{bucket}' already exists");
            return Ok(());
        }
        Err(ClientError::Command {
            command: format!("create bucket {bucket}"),
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        })
    }

    async fn delete_bucket(&self, org_id: &str, bucket: &str, token: &str) -> Result<(), ClientError> {
        let resp = self
            .v2_request(reqwest::Method::GET, "/api/v2/buckets", token)
            .query(&[("orgID", org_id), ("name", bucket)])
            .send()
            .await?;
        let list: BucketList = serde_json::from_str(&resp.text().await?)?;
        let id = list
            .buckets
            .into_iter()
            .find(|b| b.name == bucket)
            .map(|b| b.id)
            .ok_or_else(|| ClientError::BucketNotFound(bucket.to_string()))?;

        let resp = self
            .v2_request(reqwest::Method::DELETE, &format!("/api/v2/buckets/{id}"), token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Command {
                command: format!("delete bucket {bucket}"),
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Client for InfluxClient {
    async fn create(&self, command: &str) -> Result<(), ClientError> {
        match &self.api {
            Api::V1 {
                database,
                user,
                pass,
            } => {
                let command = if command.is_empty() {
                    format!("CREATE DATABASE {database}")
                } else {
                    command.to_string()
                };
                self.query_v1(&command, user, pass).await
            }
            Api::V2 {
                org_id,
                bucket,
                token,
            } => self.create_bucket(org_id, bucket, token).await,
        }
    }

    async fn send(&self, batch: &[u8]) -> SendOutcome {
        let mut req = self
            .http
            .post(self.write_url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(batch.to_vec());
        if let Api::V2 { token, .. } = &self.api {
            if !token.is_empty() {
                req = req.header(AUTHORIZATION, format!("Token {token}"));
            }
        }
        if self.gzip != 0 {
            req = req.header(CONTENT_ENCODING, "gzip");
        }

        let start = Instant::now();
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => return SendOutcome::failed(e.into(), elapsed_ns(start)),
        };
        let status = resp.status();
        let body = if status == StatusCode::NO_CONTENT {
            None
        } else {
            Some(resp.text().await.unwrap_or_default())
        };
        let latency_ns = elapsed_ns(start);

        let error = if status.as_u16() >= 400 {
            Some(std::sync::Arc::new(ClientError::Status {
                status: status.as_u16(),
                body: body.clone().unwrap_or_default(),
            }))
        } else {
            None
        };

        SendOutcome {
            latency_ns,
            status: status.as_u16(),
            body,
            error,
        }
    }

    async fn send_string(&self, _statement: &str) -> SendOutcome {
        SendOutcome::failed(
            ClientError::NotSupported {
                client: "InfluxDB",
                operation: "send_string",
            },
            0,
        )
    }

    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), ClientError> {
        match &self.api {
            Api::V1 {
                database,
                user,
                pass,
            } => {
                self.query_v1(&format!("DROP DATABASE {database}"), user, pass)
                    .await
            }
            Api::V2 {
                org_id,
                bucket,
                token,
            } => self.delete_bucket(org_id, bucket, token).await,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> String {
        self.base_url
            .rsplit("//")
            .next()
            .unwrap_or(&self.base_url)
            .to_string()
    }

    fn gzip_level(&self) -> i32 {
        self.gzip
    }
}

/// Write endpoint with its query parameters.
pub fn write_url(cfg: &InfluxConfig) -> Result<Url, ClientError> {
    let base = cfg.url.trim_end_matches('/');
    let precision = cfg.precision()?;

    let mut url = if cfg.api_version == 2 {
        Url::parse(&format!("{base}/api/v2/write"))?
    } else {
        Url::parse(&format!("{base}/write"))?
    };
    {
        let mut query = url.query_pairs_mut();
        if cfg.api_version == 2 {
            query.append_pair("org", &cfg.v2.org_id);
            if !cfg.v2.bucket.is_empty() {
                query.append_pair("bucket", &cfg.v2.bucket);
            }
        } else {
            query.append_pair("db", &cfg.db);
            if !cfg.user.is_empty() {
                query.append_pair("u", &cfg.user);
            }
            if !cfg.pass.is_empty() {
                query.append_pair("p", &cfg.pass);
            }
            if !cfg.rp.is_empty() {
                query.append_pair("rp", &cfg.rp);
            }
        }
        if let Some(p) = precision.query_param() {
            query.append_pair("precision", p);
        }
        if !cfg.consistency.is_empty() && cfg.consistency != "one" {
            query.append_pair("consistency", &cfg.consistency);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InfluxV2Config;

    #[test]
    fn test_write_url_v1() {
        let cfg = InfluxConfig {
            url: "http://localhost:8086/".into(),
            db: "stress".into(),
            user: "u".into(),
            pass: "p".into(),
            rp: "autogen".into(),
            precision: "s".into(),
            consistency: "all".into(),
            ..Default::default()
        };
        assert_eq!(
            write_url(&cfg).unwrap().as_str(),
            "http://localhost:8086/write?db=stress&u=u&p=p&rp=autogen&precision=s&consistency=all"
        );
    }

    #[test]
    fn test_write_url_defaults_omit_precision_and_consistency() {
        let cfg = InfluxConfig::default();
        assert_eq!(
            write_url(&cfg).unwrap().as_str(),
            "http://localhost:8086/write?db=stress"
        );
    }

    #[test]
    fn test_write_url_v2() {
        let cfg = InfluxConfig {
            api_version: 2,
            precision: "ms".into(),
            v2: InfluxV2Config {
                org_id: "org1".into(),
                bucket: "b1".into(),
                token: "t".into(),
            },
            ..Default::default()
        };
        assert_eq!(
            write_url(&cfg).unwrap().as_str(),
            "http://localhost:8086/api/v2/write?org=org1&bucket=b1&precision=ms"
        );
    }

    #[test]
    fn test_connection_strips_scheme() {
        let client = InfluxClient::new(&InfluxConfig::default()).unwrap();
        assert_eq!(client.connection(), "localhost:8086");
        assert_eq!(client.gzip_level(), 0);
    }
}
