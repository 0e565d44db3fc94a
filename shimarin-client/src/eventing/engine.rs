//! 分发引擎（DispatchEngine）
//!
//! 将一个事件扇出给所有匹配的处理器并发执行：
//! - 按 `event_type` 从注册表取出处理器；
//! - 以 `for_each_concurrent` 并发调用，默认不限并发，所有处理器同时开始；
//! - 单个处理器返回错误或 panic 不影响其他处理器，失败记录日志并通知失败回调。
//!
use super::handler::{EventHandler, HandlerFailureObserver};
use super::registry::HandlerRegistry;
use crate::event::Event;
use bon::Builder;
use futures_util::{FutureExt, StreamExt, stream};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// 分发配置
#[derive(Clone, Copy, Debug, Default)]
pub struct DispatchConfig {
    /// 单事件的处理并发上限（同一事件广播给多个 handler），`None` 表示不限
    pub handler_concurrency: Option<usize>,
}

#[derive(Builder, Clone)]
pub struct DispatchEngine {
    registry: HandlerRegistry,
    failure_observer: Option<Arc<dyn HandlerFailureObserver>>,
    #[builder(default)]
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self::builder().registry(registry).build()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// 分发事件，等待本次扇出的所有处理器结束
    ///
    /// 由轮询循环放入独立任务中执行，因此不会阻塞拉取。
    pub async fn dispatch(&self, event: Event) {
        let handlers = self.registry.handlers_for(event.event_type());
        if handlers.is_empty() {
            tracing::debug!(
                event_type = event.event_type(),
                identifier = event.identifier(),
                "no handler registered"
            );
            return;
        }

        tracing::debug!(
            event_type = event.event_type(),
            identifier = event.identifier(),
            handlers = handlers.len(),
            "dispatching event"
        );

        let event = &event;
        stream::iter(handlers)
            .for_each_concurrent(self.config.handler_concurrency, |h| async move {
                self.invoke(h, event).await;
            })
            .await;
    }

    async fn invoke(&self, handler: Arc<dyn EventHandler>, event: &Event) {
        let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;

        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("{err:#}"),
            Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
        };

        tracing::error!(
            handler = handler.handler_name(),
            event_type = event.event_type(),
            identifier = event.identifier(),
            error = %reason,
            "event handler failed"
        );

        if let Some(observer) = &self.failure_observer {
            observer
                .on_handler_failed(handler.handler_name(), event, &reason)
                .await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
