mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hyliya_api::middleware::require_auth;
use hyliya_api::state::{AppState, AppStateInner};
use hyliya_api::{auth, billing, conversations, discovery, friends, matchmaking, messages, posts, profiles};
use hyliya_gateway::connection;
use hyliya_gateway::dispatcher::Dispatcher;
use hyliya_payos::{PayosClient, PayosConfig};

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hyliya=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("HYLIYA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    if jwt_secret == "dev-secret-change-me" {
        warn!("HYLIYA_JWT_SECRET is unset; using the dev placeholder");
    }
    let db_path = std::env::var("HYLIYA_DB_PATH").unwrap_or_else(|_| "hyliya.db".into());
    let host = std::env::var("HYLIYA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("HYLIYA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let sweep_interval: u64 = std::env::var("HYLIYA_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300);

    let payment_return_url = std::env::var("HYLIYA_PAYMENT_RETURN_URL")
        .unwrap_or_else(|_| "https://hyliya.com/payment/success".into());
    let payment_cancel_url = std::env::var("HYLIYA_PAYMENT_CANCEL_URL")
        .unwrap_or_else(|_| "https://hyliya.com/payment/cancel".into());

    let payos = payos_from_env();
    if payos.is_none() {
        warn!("PayOS credentials not configured; billing endpoints disabled");
    }

    // Init database
    let db = hyliya_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
        payos,
        payment_return_url,
        payment_cancel_url,
    });

    // Background sweeps (premium expiry, stale invoices, stale queue
    // entries, expired stories)
    tokio::spawn(sweep::run_sweep_loop(app_state.clone(), sweep_interval));

    let server_state = ServerState {
        dispatcher: dispatcher.clone(),
        jwt_secret: jwt_secret.clone(),
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/billing/webhook", post(billing::payment_webhook))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/profiles/me", get(profiles::get_me))
        .route("/profiles/me", patch(profiles::update_me))
        .route("/profiles/{user_id}", get(profiles::get_profile))
        .route("/discovery", get(discovery::discover))
        .route("/swipes", post(discovery::swipe))
        .route("/stranger/queue", post(matchmaking::join_queue))
        .route("/stranger/queue", delete(matchmaking::leave_queue))
        .route("/stranger/queue/poll", post(matchmaking::poll_queue))
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/{conversation_id}/messages", get(messages::get_messages))
        .route("/conversations/{conversation_id}/messages", post(messages::send_message))
        .route("/conversations/{conversation_id}/messages", delete(conversations::delete_history))
        .route("/posts", get(posts::feed))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}", delete(posts::delete_post))
        .route("/posts/{post_id}/likes", post(posts::toggle_like))
        .route("/posts/{post_id}/comments", get(posts::list_comments))
        .route("/posts/{post_id}/comments", post(posts::create_comment))
        .route("/stories", get(posts::list_stories))
        .route("/stories", post(posts::create_story))
        .route("/friends", get(friends::list_friends))
        .route("/friends/requests", get(friends::list_pending))
        .route("/friends/requests", post(friends::send_request))
        .route("/friends/requests/{user_id}/accept", post(friends::accept_request))
        .route("/friends/requests/{user_id}", delete(friends::remove_request))
        .route("/friends/{user_id}", delete(friends::unfriend))
        .route("/billing/packages", get(billing::list_packages))
        .route("/billing/payments", post(billing::create_payment))
        .route("/billing/payments/{order_code}", get(billing::payment_status))
        .route("/billing/payments/{order_code}/cancel", post(billing::cancel_payment))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(server_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Hyliya server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn payos_from_env() -> Option<PayosClient> {
    let client_id = std::env::var("PAYOS_CLIENT_ID").ok()?;
    let api_key = std::env::var("PAYOS_API_KEY").ok()?;
    let checksum_key = std::env::var("PAYOS_CHECKSUM_KEY").ok()?;

    if client_id.is_empty() || api_key.is_empty() || checksum_key.is_empty() {
        return None;
    }

    Some(PayosClient::new(PayosConfig {
        client_id,
        api_key,
        checksum_key,
        base_url: std::env::var("PAYOS_BASE_URL").ok(),
    }))
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
