//! 客户端统一错误定义
//!
//! 区分传输层错误（拉取/回复的网络与状态码问题）与客户端本身的错误
//! （序列化、畸形记录、状态机与配置），便于在各实现层统一转换。
//!
use thiserror::Error;

/// 传输层错误：`EventSource`/`ReplySink` 的实现统一返回该类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {reason}")]
    Network { reason: String },
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("decode error: {reason}")]
    Decode { reason: String },
}

impl TransportError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }
}

/// 客户端错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("malformed event record: {reason}")]
    MalformedRecord { reason: String },

    #[error("polling loop is already running")]
    AlreadyPolling,

    #[error("invalid config: {reason}")]
    Config { reason: String },
}

/// 统一 Result 类型别名
pub type ClientResult<T> = Result<T, ClientError>;

/// 传输层 Result 类型别名
pub type TransportResult<T> = Result<T, TransportError>;
