use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    json::Json,
    query::{PageQuery, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yatube_common::{
    model::{
        follow::Follow,
        post::Post,
        user::{User, Username},
    },
    page::Page,
};
use yatube_db::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub(super) struct ProfilePath {
    pub username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct ProfileContext {
    author: User,
    posts_count: u64,
    page: Page<Post>,
    following: bool,
    is_own_profile: bool,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    viewer: Option<AuthenticatedUser>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<ProfileContext>> {
    let author = store
        .fetch_user_by_username(&username)
        .await?
        .ok_or(ServerError::UserByUsernameNotFound(username))?;

    let page = store
        .fetch_post_page(
            PostFilter::Author(author.id),
            settings.paginator,
            page.as_deref(),
        )
        .await?;

    let following = match &viewer {
        Some(viewer) => {
            store
                .is_following(Follow {
                    user: viewer.id(),
                    author: author.id,
                })
                .await?
        }
        None => false,
    };
    let is_own_profile = viewer.is_some_and(|viewer| viewer.id() == author.id);

    Ok(Json(ProfileContext {
        posts_count: page.count,
        author,
        page,
        following,
        is_own_profile,
    }))
}
