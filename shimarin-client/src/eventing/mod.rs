//! 事件子系统（eventing）
//!
//! 提供拉取式事件分发的协议与运行时：
//! - `EventSource`：从远端批量拉取原始事件记录；
//! - `ReplySink`：按事件 `identifier` 回传处理结果；
//! - `EventHandler` / `HandlerRegistry`：按事件类型登记处理器；
//! - `DispatchEngine`：将事件并发扇出到匹配的处理器，隔离单个处理器的失败；
//! - `EventPolling`：编排拉取、派发、休眠与停止，跟踪在途任务。
//!
//! 该模块仅定义协议与引擎，不绑定具体传输实现。
//!
pub mod engine;
pub mod handler;
pub mod polling;
pub mod registry;
pub mod running;
pub mod sink;
pub mod source;

pub use engine::{DispatchConfig, DispatchEngine};
pub use handler::{EventHandler, HandlerFailureObserver, HandlerFn};
pub use polling::{EventPolling, PollingConfig, PollingHandle, PollingState};
pub use registry::HandlerRegistry;
pub use running::RunningTasks;
pub use sink::ReplySink;
pub use source::EventSource;
