use crate::server::{
    Result, ServerError, ServerRouter,
    auth::StaffUser,
    cache::FeedCache,
    json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{
    Id,
    form::FormErrors,
    group::{CreateGroup, Group, GroupSlug, GroupTitle},
    post::PostMarker,
    user::Username,
};
use yatube_db::{DbError, Store};

const SLUG_TAKEN_MESSAGE: &str = "Group with this Slug already exists.";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_group)
        .typed_delete(delete_group)
        .typed_delete(delete_user)
        .typed_delete(delete_post)
        .typed_post(clear_cache)
}

#[derive(TypedPath)]
#[typed_path("/admin/groups/")]
struct GroupsPath;

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct GroupForm {
    title: String,
    slug: String,
    description: String,
}

impl GroupForm {
    fn validate(self) -> Result<CreateGroup, FormErrors> {
        let mut errors = FormErrors::new();

        let title = GroupTitle::new(self.title)
            .map_err(|err| errors.add("title", err.to_string()))
            .ok();
        let slug = GroupSlug::new(self.slug)
            .map_err(|err| errors.add("slug", err.to_string()))
            .ok();

        match (title, slug) {
            (Some(title), Some(slug)) => errors.into_result(CreateGroup {
                title,
                slug,
                description: self.description,
            }),
            _ => Err(errors),
        }
    }
}

async fn create_group(
    _: GroupsPath,
    State(store): State<Arc<dyn Store>>,
    StaffUser(staff): StaffUser,
    Json(form): Json<GroupForm>,
) -> Result<(StatusCode, Json<Group>)> {
    let group = match store.create_group(&form.validate()?).await {
        Ok(group) => group,
        Err(DbError::GroupSlugTaken(_)) => {
            return Err(FormErrors::single("slug", SLUG_TAKEN_MESSAGE).into());
        }
        Err(err) => return Err(err.into()),
    };
    info!(group = %group.id, slug = %group.slug, staff = %staff.username(), "Group created");

    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/groups/{slug}/", rejection(ServerError))]
struct GroupPath {
    slug: GroupSlug,
}

/// Posts of the group stay, without a group.
async fn delete_group(
    GroupPath { slug }: GroupPath,
    State(store): State<Arc<dyn Store>>,
    StaffUser(staff): StaffUser,
) -> Result<StatusCode> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or_else(|| ServerError::GroupBySlugNotFound(slug.clone()))?;

    if !store.delete_group(group.id).await? {
        return Err(ServerError::GroupBySlugNotFound(slug));
    }
    info!(group = %group.id, %slug, staff = %staff.username(), "Group deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/users/{username}/", rejection(ServerError))]
struct UserPath {
    username: Username,
}

async fn delete_user(
    UserPath { username }: UserPath,
    State(store): State<Arc<dyn Store>>,
    StaffUser(staff): StaffUser,
) -> Result<StatusCode> {
    let user = store
        .fetch_user_by_username(&username)
        .await?
        .ok_or_else(|| ServerError::UserByUsernameNotFound(username.clone()))?;

    if !store.delete_user(user.id).await? {
        return Err(ServerError::UserByUsernameNotFound(username));
    }
    info!(user = %user.id, %username, staff = %staff.username(), "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/posts/{id}/", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    StaffUser(staff): StaffUser,
) -> Result<StatusCode> {
    if !store.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }
    info!(post = %id, staff = %staff.username(), "Post deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath)]
#[typed_path("/admin/cache/clear/")]
struct ClearCachePath;

async fn clear_cache(
    _: ClearCachePath,
    State(feed_cache): State<FeedCache>,
    StaffUser(staff): StaffUser,
) -> StatusCode {
    feed_cache.clear();
    info!(staff = %staff.username(), "Feed cache cleared by staff");

    StatusCode::NO_CONTENT
}
