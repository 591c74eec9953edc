//! 主应用程序入口
//!
//! 读取配置，选择持久化实现，启动 Axum 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    ConnectionHub, ConnectionRegistry, Dispatcher, DispatcherDependencies, HistoryService,
    InMemoryMessageStore, MessageRepository, RoomMembership, SystemClock,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, run_migrations, PgMessageRepository};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    tracing::info!(config = %config.sanitize(), "配置已加载");

    let repository = message_repository(&config).await?;

    let dispatcher = Dispatcher::new(DispatcherDependencies {
        registry: Arc::new(ConnectionRegistry::new()),
        membership: Arc::new(RoomMembership::new()),
        hub: Arc::new(ConnectionHub::with_capacity(
            config.chat.outbound_queue_capacity,
        )),
        repository: repository.clone(),
        clock: Arc::new(SystemClock),
    });
    let history = HistoryService::new(
        repository,
        config.chat.history_limit,
        config.chat.max_history_limit,
    );

    let state = AppState::new(
        Arc::new(dispatcher),
        Arc::new(history),
        config.server.cors_origins.clone(),
    );

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("无法监听 {address}"))?;

    tracing::info!("聊天服务启动在 http://{}", address);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn message_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn MessageRepository>> {
    match &config.database.url {
        Some(url) => {
            let pool = create_pg_pool(url, config.database.max_connections)
                .await
                .context("连接数据库失败")?;
            run_migrations(&pool).await.context("数据库迁移失败")?;
            Ok(Arc::new(PgMessageRepository::new(pool)))
        }
        None => {
            tracing::warn!("未配置 database.url，消息仅保存在内存中");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
    }
}
