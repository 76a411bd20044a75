use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    json::Json,
    query::{PageQuery, Query},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yatube_common::{
    model::{
        group::{Group, GroupSlug},
        post::Post,
    },
    page::Page,
};
use yatube_db::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPostsPath {
    slug: GroupSlug,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct GroupContext {
    group: Group,
    page: Page<Post>,
}

async fn group_posts(
    GroupPostsPath { slug }: GroupPostsPath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Settings>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<GroupContext>> {
    let group = store
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(ServerError::GroupBySlugNotFound(slug))?;

    let page = store
        .fetch_post_page(
            PostFilter::Group(group.id),
            settings.paginator,
            page.as_deref(),
        )
        .await?;

    Ok(Json(GroupContext { group, page }))
}
