//! Router construction and server lifecycle.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::ServerConfig,
    domain::{ChatStore, MembershipChecker, RoomRegistry},
    error::ServerError,
    infrastructure::repository::{
        AllowAllMembership, InMemoryChatStore, InMemoryRoomRegistry, PgChatStore, PgMembership,
        postgres,
    },
    usecase::IdleWatchdog,
};

use super::{
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the HTTP + WebSocket router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(get_rooms))
        .route("/api/rooms/{room_id}", get(get_room_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Run the relay server until Ctrl+C or SIGTERM
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let state = Arc::new(build_state(&config).await?);

    let watchdog = config.idle_timeout().map(|timeout| {
        tracing::info!("Idle watchdog enabled: {:?}", timeout);
        IdleWatchdog::new(state.registry.clone(), timeout).spawn()
    });

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!("Listening on ws://{}/ws", addr);

    let result = serve(listener, state, shutdown_signal()).await;

    if let Some(handle) = watchdog {
        handle.abort();
    }
    tracing::info!("Server stopped");
    result
}

async fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new());

    let (chat_store, membership): (Arc<dyn ChatStore>, Arc<dyn MembershipChecker>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = postgres::connect(url, config.db_max_connections).await?;
                tracing::info!("Using PostgreSQL chat store and membership");
                (
                    Arc::new(PgChatStore::new(pool.clone())),
                    Arc::new(PgMembership::new(pool)),
                )
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL is not set: chat history is kept in memory and every user may join every room"
                );
                (
                    Arc::new(InMemoryChatStore::new()),
                    Arc::new(AllowAllMembership),
                )
            }
        };

    Ok(AppState::new(
        registry,
        chat_store,
        membership,
        config.history_limit,
    ))
}
