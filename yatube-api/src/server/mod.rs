use crate::server::{cache::FeedCache, json::Json};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHashError, PasswordHashError},
        form::FormErrors,
        group::GroupSlug,
        post::PostMarker,
        user::Username,
    },
    page::Paginator,
    util::PositiveDuration,
};
use yatube_db::{DbError, Store};

pub mod auth;
pub mod cache;
mod json;
mod query;
mod routes;
#[cfg(test)]
mod tests;

pub type ServerRouter = Router<ServerState>;

/// Tunables the handlers read on every request.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Settings {
    pub paginator: Paginator,
    pub auth_token_lifetime: Option<PositiveDuration>,
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub feed_cache: FeedCache,
    pub settings: Settings,
}

impl ServerState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, settings: Settings, index_cache_ttl: Duration) -> Self {
        Self {
            store,
            feed_cache: FeedCache::new(index_cache_ttl),
            settings,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete service, ready to be served.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Login required to access {next}")]
    LoginRequired { next: String },
    #[error("Staff privileges required")]
    Forbidden,
    #[error(transparent)]
    Form(#[from] FormErrors),
    #[error(transparent)]
    Database(#[from] DbError),
    /// Failure of work shared between concurrent requests.
    #[error(transparent)]
    Shared(Arc<ServerError>),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User {0} was not found.")]
    UserByUsernameNotFound(Username),
    #[error("Group {0} was not found.")]
    GroupBySlugNotFound(GroupSlug),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Shared(inner) => inner.status(),
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByUsernameNotFound(_)
            | ServerError::GroupBySlugNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired { .. } => StatusCode::SEE_OTHER,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::Form(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::QueryRejection(_) | ServerError::JsonRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Where anonymous visitors are sent, with the page they wanted in `next`.
pub fn login_url(next: &str) -> String {
    let next = urlencoding::encode(next).replace("%2F", "/");
    format!("{}?next={next}", auth::LOGIN_PATH)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FormErrors>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            ServerError::LoginRequired { next } => {
                debug!(%next, "Redirecting anonymous visitor to login");
                Redirect::to(&login_url(&next)).into_response()
            }
            ServerError::Form(errors) => {
                debug!(?errors, "Rejecting invalid form");
                let error_response = ErrorResponse {
                    status: status.as_u16(),
                    errors: Some(errors),
                };
                (status, Json(error_response)).into_response()
            }
            error => {
                error!(%error, %status, "Replying with error");
                let error_response = ErrorResponse {
                    status: status.as_u16(),
                    errors: None,
                };
                (status, Json(error_response)).into_response()
            }
        }
    }
}
