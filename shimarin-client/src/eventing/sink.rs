//! 回复投递（ReplySink）协议
//!
//! 将处理器产生的结果按原事件的 `identifier` 回传给远端。
//!
use crate::{error::TransportResult as Result, event::Reply};
use async_trait::async_trait;

/// 回复投递：把一条 `Reply` 发送到远端
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver_reply(&self, reply: &Reply) -> Result<()>;
}
