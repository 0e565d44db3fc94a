//! 事件源（EventSource）协议
//!
//! 负责从远端批量拉取原始事件记录。记录保持为未类型化的 JSON，
//! 以便轮询循环逐条校验并跳过畸形记录，而不是整批失败。
//!
use crate::error::TransportResult as Result;
use async_trait::async_trait;
use serde_json::Value;

/// 事件源：从远端拉取一批原始事件记录
#[async_trait]
pub trait EventSource: Send + Sync {
    /// 拉取至多 `fetch_count` 条记录；`Err` 表示本轮拉取未成功（非成功状态码或网络错误）
    async fn fetch_batch(&self, fetch_count: usize) -> Result<Vec<Value>>;
}
