//! 轮询循环（EventPolling）
//!
//! 长驻任务，反复执行“拉取 → 构造事件 → 派发 → 休眠”：
//! - 拉取失败视为本轮无事件，不终止循环；
//! - 畸形记录逐条跳过，不影响同批其他记录；
//! - 每个事件的分发放入 `RunningTasks` 跟踪的独立任务，循环不等待处理器完成；
//! - `stop` 取消循环与全部在途任务，可重复调用。
//!
//! 状态：`Idle → Polling → Stopping → Idle`。
//!
use super::engine::DispatchEngine;
use super::registry::HandlerRegistry;
use super::running::RunningTasks;
use super::{EventSource, ReplySink};
use crate::error::{ClientError, ClientResult};
use crate::event::{Event, RawEvent};
use bon::Builder;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::event_polling_builder::{IsUnset, SetEngine, SetSink, SetSource, State as BuilderState};

/// 轮询状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollingState {
    #[default]
    Idle,
    Polling,
    Stopping,
}

/// 轮询配置
#[derive(Clone, Copy, Debug)]
pub struct PollingConfig {
    /// 两次拉取之间的休眠时长
    pub polling_interval: Duration,
    /// 每次拉取的最大事件数
    pub fetch_count: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(1),
            fetch_count: 10,
        }
    }
}

#[derive(Default)]
struct Control {
    state: PollingState,
    token: Option<CancellationToken>,
    /// 每次 `start` 递增，用于区分句柄所属的运行
    generation: u64,
}

#[derive(Builder)]
pub struct EventPolling {
    source: Arc<dyn EventSource>,
    sink: Arc<dyn ReplySink>,
    engine: DispatchEngine,
    #[builder(skip)]
    running: RunningTasks,
    #[builder(skip)]
    control: Mutex<Control>,
}

impl<S: BuilderState> EventPollingBuilder<S> {
    /// 以默认分发配置从注册表构建分发引擎
    pub fn handlers(self, registry: HandlerRegistry) -> EventPollingBuilder<SetEngine<S>>
    where
        <S as BuilderState>::Engine: IsUnset,
    {
        self.engine(DispatchEngine::new(registry))
    }

    /// 同时实现拉取与回复的传输层，一次设置两端
    pub fn transport<T>(self, transport: Arc<T>) -> EventPollingBuilder<SetSink<SetSource<S>>>
    where
        T: EventSource + ReplySink + 'static,
        <S as BuilderState>::Source: IsUnset,
        <S as BuilderState>::Sink: IsUnset,
    {
        self.source(transport.clone()).sink(transport)
    }
}

impl EventPolling {
    /// 以指定间隔与批量大小启动轮询
    pub fn start(
        self: &Arc<Self>,
        polling_interval: Duration,
        fetch_count: usize,
    ) -> ClientResult<PollingHandle> {
        self.start_with(PollingConfig {
            polling_interval,
            fetch_count,
        })
    }

    /// 启动轮询；非 `Idle` 状态下调用返回 `AlreadyPolling`
    pub fn start_with(self: &Arc<Self>, config: PollingConfig) -> ClientResult<PollingHandle> {
        let (token, generation) = {
            let mut control = self.control();
            if control.state != PollingState::Idle {
                return Err(ClientError::AlreadyPolling);
            }
            let token = CancellationToken::new();
            control.state = PollingState::Polling;
            control.token = Some(token.clone());
            control.generation += 1;
            (token, control.generation)
        };

        tracing::info!(
            polling_interval_ms = config.polling_interval.as_millis() as u64,
            fetch_count = config.fetch_count,
            "event polling started"
        );

        let join = tokio::spawn(Self::poll_loop(self.clone(), token, config));

        Ok(PollingHandle {
            polling: self.clone(),
            generation,
            join: Some(join),
        })
    }

    /// 启动轮询，直到 `shutdown` 完成后停止并等待循环退出
    pub async fn run_until<F>(self: &Arc<Self>, config: PollingConfig, shutdown: F) -> ClientResult<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.start_with(config)?;
        shutdown.await;
        handle.stop();
        handle.join().await;
        Ok(())
    }

    /// 停止轮询并取消全部在途任务；未在轮询时为空操作，返回 `false`
    pub fn stop(&self) -> bool {
        self.stop_run(None)
    }

    /// 停止指定代次的运行；`None` 表示当前运行
    fn stop_run(&self, generation: Option<u64>) -> bool {
        let token = {
            let mut control = self.control();
            if control.state != PollingState::Polling {
                return false;
            }
            if generation.is_some_and(|g| g != control.generation) {
                return false;
            }
            control.state = PollingState::Stopping;
            control.token.take()
        };

        if let Some(token) = token {
            token.cancel();
        }
        let aborted = self.running.abort_all();
        self.control().state = PollingState::Idle;

        tracing::info!(aborted, "event polling stopped");
        true
    }

    pub fn state(&self) -> PollingState {
        self.control().state
    }

    fn is_current(&self, generation: u64) -> bool {
        self.control().generation == generation
    }

    /// 已派发但尚未结束的分发任务数
    pub fn running_tasks(&self) -> usize {
        self.running.len()
    }

    pub fn registry(&self) -> &HandlerRegistry {
        self.engine.registry()
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn poll_loop(self: Arc<Self>, token: CancellationToken, config: PollingConfig) {
        loop {
            let fetched = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                fetched = self.source.fetch_batch(config.fetch_count) => fetched,
            };

            match fetched {
                Ok(records) => self.dispatch_batch(&token, records),
                Err(err) => {
                    tracing::warn!(error = %err, "event fetch failed, retrying next cycle");
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(config.polling_interval) => {}
            }
        }

        tracing::debug!("polling loop exited");
    }

    fn dispatch_batch(&self, token: &CancellationToken, records: Vec<Value>) {
        if records.is_empty() {
            return;
        }
        tracing::debug!(fetched = records.len(), "fetched event batch");

        for record in records {
            if token.is_cancelled() {
                break;
            }

            let raw = match RawEvent::from_value(record) {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed event record");
                    continue;
                }
            };

            let event = Event::from_raw(raw, self.sink.clone());
            let engine = self.engine.clone();
            self.running.spawn(token.child_token(), async move {
                engine.dispatch(event).await;
            });
        }
    }
}

/// 轮询运行句柄：用于停止与等待循环退出；丢弃时自动停止
///
/// 句柄只控制创建它的那一次运行，之后重新 `start` 的运行不受旧句柄影响。
pub struct PollingHandle {
    polling: Arc<EventPolling>,
    generation: u64,
    join: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// 停止本句柄对应的运行；该运行已结束时返回 `false`
    pub fn stop(&self) -> bool {
        self.polling.stop_run(Some(self.generation))
    }

    /// 等待轮询循环退出（需先调用 `stop`），并清理停止期间残留的任务
    pub async fn join(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
        if self.polling.is_current(self.generation) && self.polling.state() == PollingState::Idle {
            self.polling.running.abort_all();
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.polling.stop_run(Some(self.generation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportResult};
    use crate::event::Reply;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Transport {
        batches: Mutex<Vec<Vec<Value>>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl EventSource for Transport {
        async fn fetch_batch(&self, _fetch_count: usize) -> TransportResult<Vec<Value>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.batches.lock().unwrap().pop().unwrap_or_default())
        }
    }

    #[async_trait]
    impl ReplySink for Transport {
        async fn deliver_reply(&self, _reply: &Reply) -> TransportResult<()> {
            Err(TransportError::network("unused"))
        }
    }

    fn mk_polling(transport: Arc<Transport>, registry: HandlerRegistry) -> Arc<EventPolling> {
        Arc::new(
            EventPolling::builder()
                .transport(transport)
                .handlers(registry)
                .build(),
        )
    }

    #[tokio::test]
    async fn state_machine_transitions() {
        let polling = mk_polling(Arc::new(Transport::default()), HandlerRegistry::new());
        assert_eq!(polling.state(), PollingState::Idle);
        assert!(!polling.stop());

        let handle = polling.start(Duration::from_millis(10), 5).unwrap();
        assert_eq!(polling.state(), PollingState::Polling);
        assert!(matches!(
            polling.start(Duration::from_millis(10), 5),
            Err(ClientError::AlreadyPolling)
        ));

        assert!(handle.stop());
        assert_eq!(polling.state(), PollingState::Idle);
        assert!(!handle.stop());
        handle.join().await;

        // 停止后可以再次启动
        let handle = polling.start(Duration::from_millis(10), 5).unwrap();
        drop(handle);
        assert_eq!(polling.state(), PollingState::Idle);
    }

    #[tokio::test]
    async fn stale_handle_does_not_stop_newer_run() {
        let polling = mk_polling(Arc::new(Transport::default()), HandlerRegistry::new());

        let old = polling.start(Duration::from_millis(10), 5).unwrap();
        assert!(polling.stop());
        let new = polling.start(Duration::from_millis(10), 5).unwrap();

        assert!(!old.stop());
        drop(old);
        assert_eq!(polling.state(), PollingState::Polling);

        assert!(new.stop());
        assert_eq!(polling.state(), PollingState::Idle);
        new.join().await;
    }

    #[tokio::test]
    async fn stale_handle_join_leaves_newer_tasks_alone() {
        let polling = mk_polling(Arc::new(Transport::default()), HandlerRegistry::new());

        let old = polling.start(Duration::from_millis(10), 5).unwrap();
        assert!(polling.stop());
        let new = polling.start(Duration::from_millis(10), 5).unwrap();

        polling
            .running
            .spawn(CancellationToken::new(), std::future::pending::<()>());
        old.join().await;
        assert_eq!(polling.state(), PollingState::Polling);
        assert_eq!(polling.running_tasks(), 1);

        assert!(new.stop());
        assert_eq!(polling.running_tasks(), 0);
        new.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_records_are_skipped() {
        let transport = Arc::new(Transport::default());
        transport.batches.lock().unwrap().push(vec![
            json!({"event_type": "Ping", "identifier": "1", "payload": null}),
            json!({"identifier": "2", "payload": null}),
            json!({"event_type": "Ping", "identifier": 3, "payload": "x"}),
        ]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new();
        let recorder = seen.clone();
        registry.register("Ping", move |event: Event| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(event.identifier().to_string());
                Ok(())
            }
        });

        let polling = mk_polling(transport.clone(), registry);
        let handle = polling.start(Duration::from_millis(100), 10).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        handle.join().await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["1", "3"]);
        assert_eq!(transport.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_after_stop_spawns_nothing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::new();
        let counter = hits.clone();
        registry.register("Ping", move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let polling = mk_polling(Arc::new(Transport::default()), registry);
        let handle = polling.start(Duration::from_secs(60), 5).unwrap();
        let token = polling.control().token.clone().unwrap();
        assert!(handle.stop());

        // 拉取结果在停止之后才返回
        polling.dispatch_batch(
            &token,
            vec![
                json!({"event_type": "Ping", "identifier": "late-1", "payload": null}),
                json!({"event_type": "Ping", "identifier": "late-2", "payload": null}),
            ],
        );
        assert_eq!(polling.running_tasks(), 0);

        handle.join().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(polling.running_tasks(), 0);
    }
}
