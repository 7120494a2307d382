mod auth;
mod comments;
mod pages;
mod posts;
mod response;
mod search;

pub use auth::{CurrentUser, MaybeUser};
pub use response::{FormOrJson, MutationReply, ResponseMode};

use crate::accounts::AccountService;
use crate::boards::BoardService;
use crate::comments::CommentService;
use crate::config::ForumConfig;
use crate::database::Database;
use crate::error::ServiceError;
use crate::posts::PostService;
use crate::session::SessionKeys;
use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: ForumConfig,
    pub database: Database,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new(config: ForumConfig, database: Database) -> Self {
        let sessions = SessionKeys::from_config(&config.session);
        Self {
            config,
            database,
            sessions,
        }
    }

    pub(crate) fn accounts(&self) -> AccountService {
        AccountService::new(self.database.clone())
    }

    pub(crate) fn boards(&self) -> BoardService {
        BoardService::new(self.database.clone())
    }

    pub(crate) fn posts(&self) -> PostService {
        PostService::new(self.database.clone())
    }

    pub(crate) fn comments(&self) -> CommentService {
        CommentService::new(self.database.clone())
    }
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Missing or invalid session on a JSON request.
    Unauthorized,
    /// Missing session on a browser request; answered with a redirect.
    LoginRequired,
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized | ApiError::LoginRequired => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    message: "authentication required".into(),
                },
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, ErrorResponse { message: msg }),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse { message: msg }),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, ErrorResponse { message: msg })
            }
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: err.to_string(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::LoginRequired = self {
            return Redirect::to("/login").into_response();
        }
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Invalid(msg) => ApiError::BadRequest(msg),
            ServiceError::Unauthorized => ApiError::Unauthorized,
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Store(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Serialize)]
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

/// Builds the full application router: HTML pages, vote links and the JSON API.
pub fn router(state: AppState) -> Result<Router> {
    let origin = HeaderValue::from_str(&state.config.cors_origin)
        .with_context(|| format!("invalid CORS origin {:?}", state.config.cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .allow_credentials(true);
    let max_upload_bytes = state.config.upload.max_upload_bytes;

    let router = Router::new()
        .route("/health", get(health_handler))
        // pages
        .route("/", get(pages::home_page))
        .route("/boards", get(pages::boards_page))
        .route("/board/:slug", get(pages::board_page))
        .route("/post/:id", get(pages::post_page))
        .route("/post/:id/image", get(posts::post_image))
        .route("/post/:id/edit", get(pages::edit_post_page))
        .route("/login", get(pages::login_page))
        .route("/register", get(pages::register_page))
        .route("/create-post", get(pages::create_post_page))
        .route("/search", get(pages::search_page))
        .route("/profile", get(pages::own_profile_page))
        .route("/profile/:id", get(pages::profile_page))
        // vote links
        .route("/post/:id/like", get(posts::like_post))
        .route("/post/:id/dislike", get(posts::dislike_post))
        .route("/comment/:id/like", get(comments::like_comment))
        .route("/comment/:id/dislike", get(comments::dislike_comment))
        // JSON / form API
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/profile", post(auth::update_profile))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/boards", get(search::list_boards))
        .route("/api/post", post(posts::create_post))
        .route(
            "/api/post/:id",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/post/:id/edit", post(posts::edit_post_form))
        .route("/api/post/:id/vote", post(posts::vote_post))
        .route("/api/post/:id/comments", get(comments::list_comments))
        .route("/api/comment", post(comments::create_comment))
        .route("/api/delete_comment", post(comments::delete_comment))
        .route("/api/comment/:id/vote", post(comments::vote_comment))
        .route("/api/search", get(search::search_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(router)
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
                    tracing::debug!(port, error = %e, "port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "could not find available port in range {}-{}",
        start_port,
        start_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
    )
}

pub async fn serve_http(config: ForumConfig, database: Database) -> Result<()> {
    let state = AppState::new(config.clone(), database);
    let router = router(state)?;

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port,
            "configured port was in use, bound to next available port"
        );
    }

    tracing::info!(
        ?addr,
        max_upload_bytes = config.upload.max_upload_bytes,
        "HTTP server listening"
    );
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
