use anyhow::Result as AnyResult;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use shimarin_client::error::TransportError;
use shimarin_client::{Event, EventPolling, EventSource, HandlerRegistry, Reply, ReplySink};
use shimarin_http::HttpTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Server {
    pending: Arc<Mutex<VecDeque<Value>>>,
    fetch_params: Arc<Mutex<Vec<usize>>>,
    callbacks: Arc<Mutex<Vec<Value>>>,
}

#[derive(Deserialize)]
struct FetchParams {
    fetch: usize,
}

async fn events(State(server): State<Server>, Query(params): Query<FetchParams>) -> Json<Value> {
    server.fetch_params.lock().unwrap().push(params.fetch);
    let mut pending = server.pending.lock().unwrap();
    let n = params.fetch.min(pending.len());
    Json(Value::Array(pending.drain(..n).collect()))
}

async fn callback(State(server): State<Server>, Json(body): Json<Value>) -> StatusCode {
    server.callbacks.lock().unwrap().push(body);
    StatusCode::OK
}

async fn serve(router: Router) -> AnyResult<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}/"))
}

async fn spawn_server(server: Server) -> AnyResult<String> {
    let router = Router::new()
        .route("/events", get(events))
        .route("/callback", get(callback))
        .with_state(server);
    serve(router).await
}

#[tokio::test]
async fn fetch_batch_requests_fetch_count() -> AnyResult<()> {
    let server = Server::default();
    server.pending.lock().unwrap().extend([
        json!({"event_type": "Ping", "identifier": "1", "payload": null}),
        json!({"event_type": "Ping", "identifier": "2", "payload": null}),
        json!({"event_type": "Ping", "identifier": "3", "payload": null}),
    ]);
    let endpoint = spawn_server(server.clone()).await?;

    let transport = HttpTransport::new(&endpoint)?;
    assert!(!transport.endpoint().ends_with('/'));

    let first = transport.fetch_batch(2).await?;
    let second = transport.fetch_batch(2).await?;
    let third = transport.fetch_batch(2).await?;

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert!(third.is_empty());
    assert_eq!(second[0]["identifier"], "3");
    assert_eq!(*server.fetch_params.lock().unwrap(), vec![2, 2, 2]);
    Ok(())
}

#[tokio::test]
async fn non_success_status_is_reported() -> AnyResult<()> {
    let router = Router::new().route(
        "/events",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let endpoint = serve(router).await?;
    let transport = HttpTransport::new(&endpoint)?;

    match transport.fetch_batch(10).await {
        Err(TransportError::Status { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected {other:?}"),
    }

    match transport.deliver_reply(&Reply::new("1", "null")).await {
        Err(TransportError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn fetch_requires_ok_while_reply_accepts_any_success() -> AnyResult<()> {
    let router = Router::new()
        .route("/events", get(|| async { (StatusCode::ACCEPTED, "queued") }))
        .route("/callback", get(|| async { StatusCode::ACCEPTED }));
    let endpoint = serve(router).await?;
    let transport = HttpTransport::new(&endpoint)?;

    match transport.fetch_batch(10).await {
        Err(TransportError::Status { status, message }) => {
            assert_eq!(status, 202);
            assert_eq!(message, "queued");
        }
        other => panic!("unexpected {other:?}"),
    }
    transport.deliver_reply(&Reply::new("1", "null")).await?;
    Ok(())
}

#[tokio::test]
async fn non_array_body_is_a_decode_error() -> AnyResult<()> {
    let router = Router::new().route("/events", get(|| async { Json(json!({"events": []})) }));
    let endpoint = serve(router).await?;
    let transport = HttpTransport::new(&endpoint)?;

    assert!(matches!(
        transport.fetch_batch(1).await,
        Err(TransportError::Decode { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() -> AnyResult<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let transport = HttpTransport::with_timeout(&format!("http://{addr}"), Duration::from_secs(2))?;
    assert!(matches!(
        transport.fetch_batch(1).await,
        Err(TransportError::Network { .. })
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn polling_round_trip_over_http() -> AnyResult<()> {
    let server = Server::default();
    server.pending.lock().unwrap().extend([
        json!({"event_type": "UserItems", "identifier": 7, "payload": "{\"limit\":1}"}),
        json!({"event_type": "Unknown", "identifier": "8", "payload": null}),
    ]);
    let endpoint = spawn_server(server.clone()).await?;

    let registry = HandlerRegistry::new();
    registry.register("UserItems", |event: Event| async move {
        let params: Option<Value> = event.payload_json()?;
        event.reply(&json!({"echo": params})).await?;
        Ok(())
    });

    let polling = Arc::new(
        EventPolling::builder()
            .transport(Arc::new(HttpTransport::new(&endpoint)?))
            .handlers(registry)
            .build(),
    );
    let handle = polling.start(Duration::from_millis(20), 10)?;

    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while server.callbacks.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    handle.stop();
    handle.join().await;

    let callbacks = server.callbacks.lock().unwrap();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0]["identifier"], "7");
    let payload: Value = serde_json::from_str(callbacks[0]["payload"].as_str().unwrap_or_default())?;
    assert_eq!(payload, json!({"echo": {"limit": 1}}));
    Ok(())
}
