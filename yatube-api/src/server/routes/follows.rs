use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    json::Json,
    query::{PageQuery, Query},
    routes::profiles::ProfilePath,
};
use axum::{extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{follow::Follow, post::Post, user::Username},
    page::Page,
};
use yatube_db::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(follow_index)
        .typed_get(profile_follow)
        .typed_post(profile_follow)
        .typed_get(profile_unfollow)
        .typed_post(profile_unfollow)
}

#[derive(TypedPath)]
#[typed_path("/follow/")]
struct FollowIndexPath;

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct FollowContext {
    page: Page<Post>,
}

async fn follow_index(
    _: FollowIndexPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<FollowContext>> {
    let page = store
        .fetch_post_page(
            PostFilter::FollowedBy(user.id()),
            settings.paginator,
            page.as_deref(),
        )
        .await?;

    Ok(Json(FollowContext { page }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct ProfileFollowPath {
    username: Username,
}

async fn follow_edge(
    store: &dyn Store,
    user: &AuthenticatedUser,
    username: Username,
) -> Result<(Follow, ProfilePath)> {
    let author = store
        .fetch_user_by_username(&username)
        .await?
        .ok_or(ServerError::UserByUsernameNotFound(username))?;

    let follow = Follow {
        user: user.id(),
        author: author.id,
    };
    Ok((follow, ProfilePath { username: author.username }))
}

async fn profile_follow(
    ProfileFollowPath { username }: ProfileFollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let (follow, profile) = follow_edge(store.as_ref(), &user, username).await?;

    if store.follow(follow).await? {
        info!(user = %user.username(), author = %profile.username, "Now following");
    }

    Ok(Redirect::to(&profile.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct ProfileUnfollowPath {
    username: Username,
}

async fn profile_unfollow(
    ProfileUnfollowPath { username }: ProfileUnfollowPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let (follow, profile) = follow_edge(store.as_ref(), &user, username).await?;

    if store.unfollow(follow).await? {
        info!(user = %user.username(), author = %profile.username, "No longer following");
    }

    Ok(Redirect::to(&profile.to_string()))
}
