use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use socketioxide::SocketIo;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod identity;
mod matchmaking;
mod models;
mod routes;
mod socket;
mod storage;

use config::AppConfig;
use identity::{AnonymousIdentity, IdentityProvider};
use matchmaking::{ConnectionRegistry, MatchCoordinator, SessionMonitor};
use storage::{InMemoryMessageStore, MessageStore};

pub struct AppState {
    pub config: AppConfig,
    pub registry: Mutex<ConnectionRegistry>,
    pub coordinator: Mutex<MatchCoordinator>,
    pub monitor: SessionMonitor,
    pub io: SocketIo,
    pub messages: Arc<dyn MessageStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mindlink_shared::middleware::init_tracing("mindlink-relay");

    let config = AppConfig::load()?;
    let port = config.port;
    let establish_timeout = Duration::from_secs(config.establish_timeout_secs);
    let max_message_len = config.max_message_len;

    // Build the Socket.IO layer first - we need io in AppState so the
    // session monitor and the chat broadcasts can emit without a socket.
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState {
        config,
        registry: Mutex::new(ConnectionRegistry::new()),
        coordinator: Mutex::new(MatchCoordinator::new()),
        monitor: SessionMonitor::new(establish_timeout),
        io: io.clone(),
        messages: Arc::new(InMemoryMessageStore::new(max_message_len)),
        identity: Arc::new(AnonymousIdentity),
    });

    // Configure the Socket.IO namespace with state via closure
    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect(socket, state).await;
            }
        }
    });

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Chat history
        .route("/api/messages/:room_id", get(routes::messages::get_room_messages))
        .route("/api/rooms", get(routes::messages::list_rooms))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "mindlink-relay starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
