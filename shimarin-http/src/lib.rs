//! HTTP+JSON 传输层（shimarin-http）
//!
//! 以 `reqwest` 实现 `EventSource` 与 `ReplySink`：
//! - 拉取：`GET {endpoint}/events?fetch={n}`，200 时响应体为 JSON 数组；
//! - 回复：`GET {endpoint}/callback`，请求体为 `{identifier, payload}`。
//!
use async_trait::async_trait;
use serde_json::Value;
use shimarin_client::error::{TransportError, TransportResult as Result};
use shimarin_client::{EventSource, Reply, ReplySink};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::decode(err.to_string())
    } else {
        TransportError::network(err.to_string())
    }
}

/// 状态码不满足 `accept` 时读取响应体作为错误信息
async fn ensure_status(
    resp: reqwest::Response,
    accept: fn(StatusCode) -> bool,
) -> Result<reqwest::Response> {
    let status = resp.status();
    if accept(status) {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EventSource for HttpTransport {
    async fn fetch_batch(&self, fetch_count: usize) -> Result<Vec<Value>> {
        let url = format!("{}/events", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .query(&[("fetch", fetch_count)])
            .send()
            .await
            .map_err(from_reqwest)?;
        // 只有 200 携带事件数组
        let resp = ensure_status(resp, |status| status == StatusCode::OK).await?;

        match resp.json::<Value>().await.map_err(from_reqwest)? {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            other => Err(TransportError::decode(format!(
                "expected an array of events, found {other}"
            ))),
        }
    }
}

#[async_trait]
impl ReplySink for HttpTransport {
    async fn deliver_reply(&self, reply: &Reply) -> Result<()> {
        let url = format!("{}/callback", self.endpoint);
        tracing::debug!(identifier = reply.identifier(), "delivering reply");

        let resp = self
            .client
            .get(&url)
            .json(reply)
            .send()
            .await
            .map_err(from_reqwest)?;
        ensure_status(resp, |status| status.is_success()).await?;
        Ok(())
    }
}
