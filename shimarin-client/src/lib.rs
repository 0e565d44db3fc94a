//! 拉取式事件总线客户端（shimarin-client）
//!
//! 远端服务累积带有类型、标识与负载的事件；客户端周期性拉取一批事件，
//! 按类型路由到本地登记的处理器并发执行，处理器可按事件标识回传结果。
//!
//! 本 crate 只包含分发核心，与具体传输解耦：
//! - 事件模型（`event`）：`Event`、`RawEvent`、`Reply`；
//! - 事件系统（`eventing`）：拉取/回复协议、处理器注册表、分发引擎与轮询循环；
//! - 错误（`error`）与进程配置（`config`）。
//!
//! 典型用法：
//! 1. 创建 `HandlerRegistry` 并用 `register` 登记异步处理器；
//! 2. 提供 `EventSource` 与 `ReplySink` 的实现（如 `shimarin-http`）；
//! 3. 通过 `EventPolling::builder()` 组装轮询循环并 `start`；
//! 4. 退出前调用 `stop` 取消在途任务。
//!
pub mod config;
pub mod error;
pub mod event;
pub mod eventing;

pub use error::{ClientError, ClientResult, TransportError, TransportResult};
pub use event::{Event, RawEvent, Reply};
pub use eventing::{
    DispatchConfig, DispatchEngine, EventHandler, EventPolling, EventSource,
    HandlerFailureObserver, HandlerRegistry, PollingConfig, PollingHandle, PollingState,
    ReplySink,
};
