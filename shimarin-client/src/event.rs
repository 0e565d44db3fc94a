//! 事件模型（Event / RawEvent / Reply）
//!
//! - `RawEvent`：远端返回的原始记录，仅含 `event_type`、`identifier`、`payload` 三个字段；
//! - `Event`：构造后不可变的工作单元，持有回复通道，可按 `identifier` 回传结果；
//! - `Reply`：回传给远端的 `{identifier, payload}`，其中 `payload` 为 JSON 编码后的字符串。
//!
//! `payload` 始终作为不透明字符串传递，结构化解码由处理器自行负责。
//!
use crate::error::{ClientError, ClientResult};
use crate::eventing::ReplySink;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 远端返回的原始事件记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_type: String,
    /// 远端可能以数字形式下发，统一转换为字符串
    #[serde(deserialize_with = "identifier_from_json")]
    pub identifier: String,
    #[serde(default, deserialize_with = "payload_from_json")]
    pub payload: Option<String>,
}

impl RawEvent {
    /// 从一条未类型化的 JSON 记录解析；缺字段或 `event_type` 为空均视为畸形记录
    pub fn from_value(value: Value) -> ClientResult<Self> {
        let raw: RawEvent =
            serde_json::from_value(value).map_err(|e| ClientError::MalformedRecord {
                reason: e.to_string(),
            })?;

        if raw.event_type.is_empty() {
            return Err(ClientError::MalformedRecord {
                reason: "empty event_type".to_string(),
            });
        }

        Ok(raw)
    }
}

fn identifier_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "identifier must be a string or number, found {other}"
        ))),
    }
}

fn payload_from_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        // 非字符串的 JSON 值按紧凑格式重新编码，保持 payload 为不透明字符串
        other => Some(other.to_string()),
    })
}

/// 回传给远端的回复
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    identifier: String,
    payload: String,
}

impl Reply {
    pub fn new(identifier: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            payload: payload.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// JSON 编码后的回复内容
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// 事件：从远端拉取的一个工作单元
///
/// 构造后不可变；相等性仅由 `identifier` 决定。
#[derive(Clone)]
pub struct Event {
    event_type: String,
    identifier: String,
    payload: Option<String>,
    sink: Arc<dyn ReplySink>,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        identifier: impl Into<String>,
        payload: Option<String>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            identifier: identifier.into(),
            payload,
            sink,
        }
    }

    pub fn from_raw(raw: RawEvent, sink: Arc<dyn ReplySink>) -> Self {
        Self {
            event_type: raw.event_type,
            identifier: raw.identifier,
            payload: raw.payload,
            sink,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// 将 payload 作为 JSON 解码；无 payload 时返回 `Ok(None)`
    pub fn payload_json<T: DeserializeOwned>(&self) -> ClientResult<Option<T>> {
        self.payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(ClientError::from)
    }

    /// 回复远端：JSON 编码 `payload` 后按本事件的 `identifier` 投递
    ///
    /// 可多次调用，每次独立投递。投递失败会记录告警日志并返回给调用方，
    /// 由处理器决定忽略还是向上传播。
    pub async fn reply<T>(&self, payload: &T) -> ClientResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let reply = Reply::new(self.identifier.clone(), serde_json::to_string(payload)?);

        if let Err(err) = self.sink.deliver_reply(&reply).await {
            tracing::warn!(
                event_type = %self.event_type,
                identifier = %self.identifier,
                error = %err,
                "reply delivery failed"
            );
            return Err(err.into());
        }

        Ok(())
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("identifier", &self.identifier)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event: {}, Identifier: {}, Payload: {}",
            self.event_type,
            self.identifier,
            self.payload.as_deref().unwrap_or("None")
        )
    }
}
