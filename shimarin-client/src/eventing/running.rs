//! 运行中任务集合（RunningTasks）
//!
//! 记录“已派发但尚未结束”的分发任务：
//! - `spawn` 插入任务，任务结束（正常、失败或被取消）时经由 drop guard 自行移除；
//! - `abort_all` 取消并清空全部任务，可与任务的自我移除并发执行。
//!
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct RunningTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: DashMap<u64, JoinHandle<()>>,
    next_id: AtomicU64,
}

/// 任务退出时（包括 abort 导致的 future 被丢弃）从集合中移除自身
struct RemoveOnDrop {
    inner: Arc<Inner>,
    id: u64,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        self.inner.tasks.remove(&self.id);
    }
}

impl RunningTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 派发一个受跟踪的任务；`token` 被取消时任务在下一个挂起点退出
    pub fn spawn<F>(&self, token: CancellationToken, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = RemoveOnDrop {
            inner: self.inner.clone(),
            id,
        };

        // 任务在登记完成后才开始执行，保证自我移除一定发生在插入之后
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let _guard = guard;
            if registered_rx.await.is_err() {
                return;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });

        self.inner.tasks.insert(id, join);
        if registered_tx.send(()).is_err() {
            // 任务尚未运行就被丢弃（如运行时正在关闭）
            self.inner.tasks.remove(&id);
        }
    }

    /// 取消并清空全部任务，返回被取消的数量
    pub fn abort_all(&self) -> usize {
        let ids: Vec<u64> = self.inner.tasks.iter().map(|e| *e.key()).collect();
        let mut aborted = 0;
        for id in ids {
            if let Some((_, join)) = self.inner.tasks.remove(&id) {
                join.abort();
                aborted += 1;
            }
        }
        aborted
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.is_empty()
    }
}
