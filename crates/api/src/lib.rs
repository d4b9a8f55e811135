pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    extract::State,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Room routes
    let room_routes = Router::new()
        .route("/resolve", post(routes::room::resolve))
        .route("/{room_id}", get(routes::room::get))
        .route("/{room_id}/unread", get(routes::message::unread))
        .route("/{room_id}/read", post(routes::message::mark_all_read));

    // Message routes (under room)
    let message_routes = Router::new()
        .route("/", get(routes::message::list))
        .route("/{message_id}/read", put(routes::message::mark_read));

    // Participant routes
    let participant_routes =
        Router::new().route("/{participant_id}/room", get(routes::room::list_for_participant));

    let api = Router::new()
        .nest("/room", room_routes)
        .nest("/room/{room_id}/message", message_routes)
        .nest("/participant", participant_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.chat.presence.session_count(),
    }))
}
