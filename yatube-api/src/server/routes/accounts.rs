use crate::server::{
    Result, ServerRouter, Settings,
    auth::{self, AuthenticatedUser},
    json::Json,
    query::Query,
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};
use axum_extra::{
    extract::cookie::CookieJar,
    routing::{RouterExt, TypedPath},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::{debug, info};
use yatube_common::model::{
    auth::{AuthToken, Authentication, Password},
    form::{FormErrors, NON_FIELD_ERRORS, REQUIRED_MESSAGE},
    user::{CreateUser, Username},
};
use yatube_db::{DbError, Store};

const USERNAME_TAKEN_MESSAGE: &str = "A user with that username already exists.";
const INVALID_LOGIN_MESSAGE: &str = "Please enter a correct username and password. \
    Note that both fields may be case-sensitive.";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(signup)
        .typed_get(login_form)
        .typed_post(login)
        .typed_post(logout)
}

#[derive(TypedPath)]
#[typed_path("/auth/signup/")]
struct SignupPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct SignupForm {
    username: String,
    password: String,
}

impl SignupForm {
    fn validate(self) -> Result<(Username, Password), FormErrors> {
        let mut errors = FormErrors::new();

        let username = if self.username.is_empty() {
            errors.add("username", REQUIRED_MESSAGE);
            None
        } else {
            Username::new(self.username)
                .map_err(|err| errors.add("username", err.to_string()))
                .ok()
        };
        let password = Password::new(self.password)
            .map_err(|err| errors.add("password", err.to_string()))
            .ok();

        match (username, password) {
            (Some(username), Some(password)) => errors.into_result((username, password)),
            _ => Err(errors),
        }
    }
}

async fn signup(
    _: SignupPath,
    State(store): State<Arc<dyn Store>>,
    Json(form): Json<SignupForm>,
) -> Result<Redirect> {
    let (username, password) = form.validate()?;
    let password_hash = password.hash()?;

    let user = match store
        .create_user(&CreateUser {
            username,
            password_hash,
        })
        .await
    {
        Ok(user) => user,
        Err(DbError::UsernameTaken(_)) => {
            return Err(FormErrors::single("username", USERNAME_TAKEN_MESSAGE).into());
        }
        Err(err) => return Err(err.into()),
    };
    info!(user = %user.id, username = %user.username, "User signed up");

    Ok(Redirect::to("/"))
}

#[derive(TypedPath)]
#[typed_path("/auth/login/")]
struct LoginPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct LoginContext {
    next: Option<String>,
}

async fn login_form(
    _: LoginPath,
    Query(NextQuery { next }): Query<NextQuery>,
) -> Json<LoginContext> {
    Json(LoginContext { next })
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

async fn login(
    _: LoginPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    Query(NextQuery { next: query_next }): Query<NextQuery>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<impl IntoResponse> {
    let mut errors = FormErrors::new();
    if form.username.is_empty() {
        errors.add("username", REQUIRED_MESSAGE);
    }
    if form.password.is_empty() {
        errors.add("password", REQUIRED_MESSAGE);
    }
    errors.into_result(())?;

    let credentials = match Username::new(form.username) {
        Ok(username) => store.fetch_credentials(&username).await?,
        Err(_) => None,
    };
    let user = match credentials {
        Some((user, password_hash)) if password_hash.verify(&form.password) => user,
        _ => {
            debug!("Rejecting login with wrong credentials");
            return Err(FormErrors::single(NON_FIELD_ERRORS, INVALID_LOGIN_MESSAGE).into());
        }
    };

    let token = AuthToken::generate_random(user.id);
    store
        .create_auth(&Authentication {
            user: user.id,
            token_hash: token.hash()?,
            created_at: UtcDateTime::now(),
            expires_after: settings.auth_token_lifetime,
        })
        .await?;
    info!(user = %user.id, username = %user.username, "User logged in");

    let jar = jar.add(auth::session_cookie(&token, &settings));
    let next = form
        .next
        .or(query_next)
        .filter(|next| auth::is_safe_redirect(next))
        .unwrap_or_else(|| "/".to_owned());

    Ok((jar, Redirect::to(&next)))
}

#[derive(TypedPath)]
#[typed_path("/auth/logout/")]
struct LogoutPath;

async fn logout(
    _: LogoutPath,
    State(store): State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    if let Some(user) = user {
        store.delete_auth(user.token_hash()).await?;
        info!(user = %user.id(), username = %user.username(), "User logged out");
    }

    Ok((jar.remove(auth::session_cookie_removal()), Redirect::to("/")))
}
