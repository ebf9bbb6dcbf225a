//! HTTP implementation of [`StatementApi`] for a SQL warehouse statement endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use rowcache_core::UpstreamConfig;

use crate::api::StatementApi;
use crate::error::{UpstreamError, UpstreamResult};

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements/";

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    disposition: &'static str,
    format: &'static str,
}

/// Statement engine client speaking JSON over HTTPS with bearer auth.
pub struct WarehouseClient {
    host: String,
    token: String,
    warehouse_id: String,
    http_client: reqwest::Client,
}

impl WarehouseClient {
    /// Builds a client, rejecting blank host/token/warehouse settings.
    pub fn new(config: &UpstreamConfig) -> UpstreamResult<Self> {
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(UpstreamError::Config(missing.join(", ")));
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;

        Ok(Self {
            host: config.host.trim().trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
            warehouse_id: config.warehouse_id.trim().to_string(),
            http_client,
        })
    }

    async fn exchange(&self, method: Method, path: &str, body: Option<&SubmitRequest<'_>>) -> UpstreamResult<Value> {
        let url = format!("{}{}", self.host, path);
        let mut request: RequestBuilder = self
            .http_client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!(path, error = %e, "Statement engine request failed");
            UpstreamError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(path, status = status.as_u16(), body = %body, "Statement engine error");
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                path: path.to_string(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl StatementApi for WarehouseClient {
    async fn submit_statement(&self, sql: &str) -> UpstreamResult<Value> {
        let request = SubmitRequest {
            statement: sql,
            warehouse_id: &self.warehouse_id,
            disposition: "EXTERNAL_LINKS",
            format: "JSON_ARRAY",
        };
        self.exchange(Method::POST, STATEMENTS_PATH, Some(&request)).await
    }

    async fn fetch_status(&self, statement_id: &str) -> UpstreamResult<Value> {
        let path = format!("{STATEMENTS_PATH}{statement_id}");
        self.exchange(Method::GET, &path, None).await
    }

    async fn fetch_chunk(&self, statement_id: &str, chunk_index: usize, row_limit: usize) -> UpstreamResult<Value> {
        let path = format!(
            "{STATEMENTS_PATH}{statement_id}/result/chunks/{chunk_index}?row_limit={row_limit}&format=JSON_ARRAY"
        );
        self.exchange(Method::GET, &path, None).await
    }

    async fn download_link(&self, url: &str) -> UpstreamResult<Bytes> {
        // Pre-signed: no bearer token
        let response = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/json, text/plain")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "External link download rejected");
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                path: "external_link".to_string(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Downloaded external link");
        Ok(bytes)
    }
}
