use anyhow::Result;
use serde::{Deserialize, Serialize};
use shimarin_client::config::ClientConfig;
use shimarin_client::{Event, EventPolling, HandlerRegistry};
use shimarin_http::HttpTransport;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Deserialize, Serialize)]
struct UserItemsParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UserItems {
    user_id: Option<String>,
    items: Vec<String>,
    total: usize,
}

async fn user_items(event: Event) -> Result<()> {
    let params: UserItemsParams = event.payload_json()?.unwrap_or_default();
    info!(identifier = event.identifier(), ?params, "listing user items");

    // 媒体库客户端不在本仓库范围内，这里只回显查询参数
    let items: Vec<String> = Vec::new();
    event
        .reply(&UserItems {
            user_id: params.user_id,
            total: items.len(),
            items,
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("shimarin=info".parse()?)
                .add_directive("demo=info".parse()?),
        )
        .init();

    let config = ClientConfig::from_env()?;
    info!(endpoint = config.server_endpoint.as_str(), "shimarin client starting");

    let registry = HandlerRegistry::new();
    registry.register("UserItems", user_items);
    registry.register("Ping", |event: Event| async move {
        event.reply("pong").await?;
        Ok(())
    });
    info!(handlers = registry.len(), types = ?registry.event_types(), "handlers registered");

    let transport = Arc::new(HttpTransport::with_timeout(
        &config.server_endpoint,
        config.http_timeout,
    )?);
    let polling = Arc::new(
        EventPolling::builder()
            .transport(transport)
            .handlers(registry)
            .build(),
    );

    polling
        .run_until(config.polling, async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown signal received"),
                Err(err) => warn!(error = %err, "failed to listen for ctrl-c, shutting down"),
            }
        })
        .await?;

    info!("shimarin client stopped");
    Ok(())
}
