//! 处理器注册表（HandlerRegistry）
//!
//! 按事件类型登记处理器，保留同一类型下的注册顺序。注册表只追加，
//! 克隆共享同一份数据，运行期间仍可继续注册。
//!
use super::handler::{EventHandler, HandlerFn};
use crate::event::Event;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_type: Arc<DashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以异步闭包注册处理器，名称为 `{event_type}#{序号}`
    pub fn register<F, Fut>(&self, event_type: impl Into<String>, f: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let event_type = event_type.into();
        let mut entry = self.by_type.entry(event_type.clone()).or_default();
        let name = format!("{event_type}#{}", entry.len());
        entry.push(Arc::new(HandlerFn::new(name, f)));
    }

    /// 注册实现了 `EventHandler` 的处理器；重复注册同一处理器会被调用多次
    pub fn register_handler(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.by_type
            .entry(event_type.into())
            .or_default()
            .push(handler);
    }

    /// 返回匹配该类型的全部处理器（按注册顺序），无匹配时为空
    pub fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.by_type
            .get(event_type)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    /// 已登记的处理器总数
    pub fn len(&self) -> usize {
        self.by_type.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 已登记的事件类型（排序后）
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.by_type.iter().map(|e| e.key().clone()).collect();
        types.sort_unstable();
        types
    }
}
