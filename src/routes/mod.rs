use axum::Router;
use tower_http::services::ServeDir;

use crate::state::SharedState;

pub mod health;
pub mod websocket;

/// Compose all route trees: the JSON/WebSocket API plus the static frontend
/// and audio directories.
pub fn router(state: SharedState) -> Router<()> {
    let public_dir = state.config().public_dir.clone();
    let audio_dir = state.config().audio_dir.clone();

    health::router()
        .merge(websocket::router())
        .with_state(state)
        .nest_service("/audio", ServeDir::new(audio_dir))
        .fallback_service(ServeDir::new(public_dir))
}
