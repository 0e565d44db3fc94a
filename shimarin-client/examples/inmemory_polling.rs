/// 轮询分发（内存版）示例
/// 展示 拉取 -> 派发 -> 处理器 -> 回复 的闭环，以及处理器失败时的隔离
use anyhow::Result as AnyResult;
use serde_json::{Value, json};
use shimarin_client::error::TransportResult;
use shimarin_client::{
    DispatchEngine, Event, EventPolling, EventSource, HandlerFailureObserver, HandlerRegistry,
    Reply, ReplySink,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

// ============================================================================
// 内存队列（EventSource + ReplySink）
// ============================================================================

#[derive(Clone, Default)]
struct InMemoryServer {
    queue: Arc<Mutex<Vec<Value>>>,
}

impl InMemoryServer {
    fn push(&self, ty: &str, id: &str, payload: Option<Value>) {
        self.queue.lock().unwrap().push(json!({
            "event_type": ty,
            "identifier": id,
            "payload": payload.map(|p| p.to_string()),
        }));
    }
}

#[async_trait::async_trait]
impl EventSource for InMemoryServer {
    async fn fetch_batch(&self, fetch_count: usize) -> TransportResult<Vec<Value>> {
        let mut g = self.queue.lock().unwrap();
        let n = fetch_count.min(g.len());
        Ok(g.drain(..n).collect())
    }
}

#[async_trait::async_trait]
impl ReplySink for InMemoryServer {
    async fn deliver_reply(&self, reply: &Reply) -> TransportResult<()> {
        println!("reply id={} payload={}", reply.identifier(), reply.payload());
        Ok(())
    }
}

// ============================================================================
// 失败回调
// ============================================================================

struct PrintFailures;

#[async_trait::async_trait]
impl HandlerFailureObserver for PrintFailures {
    async fn on_handler_failed(&self, handler_name: &str, event: &Event, reason: &str) {
        println!("handler={handler_name} failed on {event}: {reason}");
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    println!("=== 轮询分发（内存版）示例 ===\n");
    let server = InMemoryServer::default();
    server.push("Ping", "1", None);
    server.push("UserItems", "2", Some(json!({"limit": 3})));

    // Handlers
    let registry = HandlerRegistry::new();
    registry.register("Ping", |event: Event| async move {
        event.reply("pong").await?;
        Ok(())
    });
    registry.register("UserItems", |event: Event| async move {
        let params: Option<Value> = event.payload_json()?;
        event.reply(&json!({"params": params, "items": []})).await?;
        Ok(())
    });
    registry.register("UserItems", |_event| async {
        anyhow::bail!("media library offline")
    });

    // Polling
    let engine = DispatchEngine::builder()
        .registry(registry)
        .failure_observer(Arc::new(PrintFailures))
        .build();
    let polling = Arc::new(
        EventPolling::builder()
            .transport(Arc::new(server.clone()))
            .engine(engine)
            .build(),
    );

    let handle = polling.start(Duration::from_millis(200), 10)?;
    println!("✅ 轮询已启动");

    // 演示在运行中继续塞入事件
    tokio::time::sleep(Duration::from_millis(300)).await;
    server.push("Ping", "3", None);
    println!("✅ 追加事件: 3(Ping)");

    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.stop();
    handle.join().await;
    println!("\n✅ 优雅关闭完成");
    Ok(())
}
