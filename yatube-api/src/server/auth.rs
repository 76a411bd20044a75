use crate::server::{ServerError, Settings};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, uri::PathAndQuery},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use headers::{Authorization, HeaderMapExt, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::debug;
use yatube_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::{User, UserMarker, Username},
};
use yatube_db::Store;

pub const SESSION_COOKIE: &str = "session";
pub const LOGIN_PATH: &str = "/auth/login/";

/// The user behind a valid, unexpired auth token.
///
/// Extracting it directly redirects anonymous visitors to the login page. Extract
/// `Option<AuthenticatedUser>` where anonymous access is fine.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn id(&self) -> Id<UserMarker> {
        self.user.id
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.user.username
    }

    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

/// An authenticated user with the staff flag set. Everyone else gets 403.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct StaffUser(pub AuthenticatedUser);

/// The bearer header wins over the session cookie.
fn request_token(parts: &Parts) -> Option<String> {
    if let Some(authorization) = parts.headers.typed_get::<Authorization<Bearer>>() {
        return Some(authorization.token().to_owned());
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), PathAndQuery::as_str)
        .to_owned()
}

/// Unknown, malformed or expired tokens make the request anonymous instead of failing it.
async fn authenticate(
    parts: &Parts,
    store: &dyn Store,
) -> Result<Option<AuthenticatedUser>, ServerError> {
    let Some(token) = request_token(parts) else {
        return Ok(None);
    };

    let token: AuthToken = match token.parse() {
        Ok(token) => token,
        Err(err) => {
            debug!(%err, "Ignoring malformed auth token");
            return Ok(None);
        }
    };

    let token_hash = token.hash()?;

    let Some(authentication) = store.fetch_auth(&token_hash).await? else {
        debug!(user = %token.user_id, "Ignoring unknown auth token");
        return Ok(None);
    };

    if authentication.user != token.user_id {
        debug!(user = %token.user_id, "Ignoring auth token issued to another user");
        return Ok(None);
    }

    if authentication.is_expired_at(UtcDateTime::now()) {
        debug!(user = %token.user_id, "Ignoring expired auth token");
        return Ok(None);
    }

    let user = store.fetch_user(authentication.user).await?;

    Ok(user.map(|user| AuthenticatedUser { user, token_hash }))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<dyn Store>::from_ref(state);

        authenticate(parts, store.as_ref())
            .await?
            .ok_or_else(|| ServerError::LoginRequired {
                next: requested_path(parts),
            })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let store = Arc::<dyn Store>::from_ref(state);

        authenticate(parts, store.as_ref()).await
    }
}

impl<S> FromRequestParts<S> for StaffUser
where
    Arc<dyn Store>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = <AuthenticatedUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await?;

        if user.user.is_staff {
            Ok(Self(user))
        } else {
            debug!(user = %user.username(), "Refusing staff route to non-staff user");
            Err(ServerError::Forbidden)
        }
    }
}

/// Carries a freshly issued token. Lives as long as the token when tokens expire.
#[must_use]
pub fn session_cookie(token: &AuthToken, settings: &Settings) -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, token.as_token_str()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if let Some(lifetime) = settings.auth_token_lifetime {
        cookie = cookie.max_age(lifetime.get());
    }

    cookie.build()
}

/// Matches [`session_cookie`] so the browser drops it.
#[must_use]
pub fn session_cookie_removal() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Only local absolute paths are followed after login.
#[must_use]
pub fn is_safe_redirect(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}
