//! 事件处理器（EventHandler）
//!
//! 定义消费某类事件的处理逻辑与元信息（名称），并提供把异步闭包
//! 适配为处理器的 `HandlerFn`。
//!
use crate::event::Event;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// 事件处理器：处理一个匹配的事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与失败回调）
    fn handler_name(&self) -> &str;
    /// 处理事件；需要回传结果时调用 `event.reply(..)`
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

type BoxedHandlerFn = Arc<dyn Fn(Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 基于异步闭包的处理器
pub struct HandlerFn {
    name: String,
    f: BoxedHandlerFn,
}

impl HandlerFn {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |event| -> BoxFuture<'static, anyhow::Result<()>> {
                Box::pin(f(event))
            }),
        }
    }
}

#[async_trait]
impl EventHandler for HandlerFn {
    fn handler_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// 处理器失败回调：在日志之外接收处理器的失败通知
#[async_trait]
pub trait HandlerFailureObserver: Send + Sync {
    async fn on_handler_failed(&self, handler_name: &str, event: &Event, reason: &str);
}
