// HTTP surface: router, shared state and error mapping.

pub mod admin;
pub mod api;
pub mod html;
pub mod pages;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::Key;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::chat::ChatService;
use crate::database::Database;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub chat: Arc<ChatService>,
    /// Where /admin/backup writes its JSON snapshots.
    pub backup_dir: PathBuf,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error",
                "message": self.to_string(),
                "status": 500,
            })),
        )
            .into_response()
    }
}

/// Build the full application router with session, trace and CORS layers.
pub fn router(state: AppState, session_secret: &str) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_signed(session_key(session_secret));

    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_form).post(pages::login_submit))
        .route(
            "/register",
            get(pages::register_form).post(pages::register_submit),
        )
        .route("/logout", get(pages::logout))
        .route("/user_form", get(pages::user_form))
        .route("/submit_user_info", post(pages::submit_user_info))
        .route("/ask", post(pages::ask))
        .route("/history", get(pages::history))
        .route("/change_password", post(pages::change_password))
        .route("/export_data", get(pages::export_data))
        .route("/clear_session", post(pages::clear_session))
        .nest("/admin", admin::routes())
        .nest("/api/v1", api::routes())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build the cookie signing key from the configured secret, cycling short
/// secrets up to the minimum key material length.
fn session_key(secret: &str) -> Key {
    let secret = if secret.is_empty() { "dev-secret" } else { secret };
    let mut material = secret.as_bytes().to_vec();
    while material.len() < 64 {
        material.extend_from_slice(secret.as_bytes());
    }
    Key::from(&material)
}
