mod comments;
mod extract;
mod media;
mod posts;
mod social;
mod users;

use crate::config::AgoraConfig;
use crate::database::Database;
use crate::error::AgoraError;
use anyhow::Result;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Room for the non-file multipart fields on top of the upload limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: AgoraConfig,
    pub database: Database,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    /// An extractor refused the request before it reached a handler.
    Rejected(StatusCode, String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { error: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { error: msg }),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse { error: msg }),
            ApiError::Rejected(status, msg) => (status, ErrorResponse { error: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AgoraError>() {
            Ok(AgoraError::NotFound(what)) => ApiError::NotFound(format!("{what} not found")),
            Ok(AgoraError::Invalid(msg)) => ApiError::BadRequest(msg),
            Ok(AgoraError::Conflict(msg)) => ApiError::Conflict(msg),
            Err(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// `limit`/`offset` query shared by every listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl PageParams {
    pub(crate) fn resolve(&self, state: &AppState) -> (usize, usize) {
        (
            state.config.listing.clamp(self.limit),
            self.offset.unwrap_or(0),
        )
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

async fn unknown_route() -> ApiError {
    ApiError::NotFound("route not found".into())
}

pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .media
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/health", get(health_handler))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route(
            "/users/:id/follow",
            post(social::follow_user).delete(social::unfollow_user),
        )
        .route("/users/:id/followers", get(social::list_followers))
        .route("/users/:id/following", get(social::list_following))
        .route("/media", post(media::upload_media))
        .route(
            "/media/:id",
            get(media::get_media).patch(media::update_media_title),
        )
        .route("/media/:id/raw", get(media::download_media))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/:id", get(posts::get_post).delete(posts::delete_post))
        .route(
            "/posts/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/posts/:id/comments/tree", get(comments::comment_tree))
        .route(
            "/posts/:id/like",
            post(social::like_post).delete(social::unlike_post),
        )
        .route("/comments/:id", axum::routing::delete(comments::delete_comment))
        .route(
            "/comments/:id/like",
            post(social::like_comment).delete(social::unlike_comment),
        )
        .route("/feed/:user_id", get(posts::feed))
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: AgoraConfig, database: Database) -> Result<()> {
    let state = AppState {
        config: config.clone(),
        database,
    };
    let router = router(state);

    tracing::info!(
        max_upload_mb = config.media.max_upload_bytes / (1024 * 1024),
        "configured upload limit"
    );

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
