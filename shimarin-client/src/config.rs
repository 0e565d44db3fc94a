//! 进程配置（ClientConfig）
//!
//! 从环境变量读取远端地址与轮询参数：
//! - `SHIMARIN_SERVER_ENDPOINT`（必填）
//! - `SHIMARIN_POLLING_INTERVAL_MS`（默认 1000）
//! - `SHIMARIN_FETCH_COUNT`（默认 10）
//! - `SHIMARIN_HTTP_TIMEOUT_SECS`（默认 30）
//!
use crate::error::{ClientError, ClientResult};
use crate::eventing::PollingConfig;
use std::str::FromStr;
use std::time::Duration;

pub const SERVER_ENDPOINT: &str = "SHIMARIN_SERVER_ENDPOINT";
pub const POLLING_INTERVAL_MS: &str = "SHIMARIN_POLLING_INTERVAL_MS";
pub const FETCH_COUNT: &str = "SHIMARIN_FETCH_COUNT";
pub const HTTP_TIMEOUT_SECS: &str = "SHIMARIN_HTTP_TIMEOUT_SECS";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub server_endpoint: String,
    pub polling: PollingConfig,
    pub http_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以任意键值来源构建配置，便于测试
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_endpoint = lookup(SERVER_ENDPOINT)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::Config {
                reason: format!("{SERVER_ENDPOINT} is required"),
            })?;

        let defaults = PollingConfig::default();
        let polling_interval = parse::<u64>(&lookup, POLLING_INTERVAL_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.polling_interval);
        let fetch_count = parse::<usize>(&lookup, FETCH_COUNT)?.unwrap_or(defaults.fetch_count);
        if fetch_count == 0 {
            return Err(ClientError::Config {
                reason: format!("{FETCH_COUNT} must be positive"),
            });
        }
        let http_timeout = parse::<u64>(&lookup, HTTP_TIMEOUT_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Ok(Self {
            server_endpoint,
            polling: PollingConfig {
                polling_interval,
                fetch_count,
            },
            http_timeout,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> ClientResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ClientError::Config {
                reason: format!("{key}={raw}: {e}"),
            })
        })
        .transpose()
}
