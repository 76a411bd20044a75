use crate::server::{
    Result, ServerError, ServerRouter, Settings,
    auth::AuthenticatedUser,
    cache::FeedCache,
    json::{Json, RawJson},
    query::{PageQuery, Query},
    routes::profiles::ProfilePath,
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use yatube_common::{
    model::{
        Id,
        comment::{Comment, CommentForm, CreateComment},
        form::{FormErrors, INVALID_CHOICE_MESSAGE},
        group::Group,
        post::{CreatePost, Post, PostContent, PostForm, PostMarker},
    },
    page::Page,
};
use yatube_db::{PostFilter, Store};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(post_detail)
        .typed_post(post_detail_comment)
        .typed_post(add_comment)
        .typed_get(post_create_form)
        .typed_post(post_create)
        .typed_get(post_edit_form)
        .typed_post(post_edit)
}

#[derive(TypedPath)]
#[typed_path("/")]
struct IndexPath;

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct IndexContext {
    page: Page<Post>,
}

/// Replays a cached body when there is one, so new posts show up only once it expires.
async fn index(
    _: IndexPath,
    State(store): State<Arc<dyn Store>>,
    State(feed_cache): State<FeedCache>,
    State(settings): State<Settings>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<RawJson> {
    let cache_key = page.clone().unwrap_or_default();
    let render = async {
        debug!(page = ?page, "Rendering home feed");
        let page = store
            .fetch_post_page(PostFilter::All, settings.paginator, page.as_deref())
            .await?;
        let body = Json(IndexContext { page }).to_bytes()?;
        Ok::<_, ServerError>(body)
    };

    let body = feed_cache
        .get_or_render(cache_key, render)
        .await
        .map_err(ServerError::Shared)?;

    Ok(RawJson(body))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
pub(super) struct PostDetailPath {
    pub id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct PostDetailContext {
    post: Post,
    author_posts_count: u64,
    comments: Vec<Comment>,
    form: CommentForm,
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostDetailContext>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    let author_posts_count = store.count_posts(PostFilter::Author(post.author.id)).await?;
    let comments = store.fetch_post_comments(id).await?;

    Ok(Json(PostDetailContext {
        post,
        author_posts_count,
        comments,
        form: CommentForm::default(),
    }))
}

/// The detail page doubles as a comment form.
async fn post_detail_comment(
    PostDetailPath { id }: PostDetailPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Redirect> {
    store_comment(store.as_ref(), &user, id, form).await
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Redirect> {
    store_comment(store.as_ref(), &user, id, form).await
}

async fn store_comment(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
    form: CommentForm,
) -> Result<Redirect> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;
    let text = form.validate()?;

    let comment = store
        .create_comment(&CreateComment {
            post: post.id,
            author: user.id(),
            text,
        })
        .await?;
    info!(comment = %comment.id, post = %post.id, author = %user.username(), "Comment added");

    Ok(Redirect::to(&PostDetailPath { id: post.id }.to_string()))
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct PostFormContext {
    form: PostForm,
    is_edit: bool,
    post_id: Option<Id<PostMarker>>,
    groups: Vec<Group>,
}

/// Field checks plus the one that needs the store: the chosen group has to exist.
async fn validate_post_form(store: &dyn Store, form: PostForm) -> Result<PostContent> {
    let group_exists = match form.group {
        Some(group_id) => store.fetch_group(group_id).await?.is_some(),
        None => true,
    };

    let content = match form.validate() {
        Ok(content) if group_exists => content,
        Ok(_) => return Err(FormErrors::single("group", INVALID_CHOICE_MESSAGE).into()),
        Err(mut errors) => {
            if !group_exists {
                errors.add("group", INVALID_CHOICE_MESSAGE);
            }
            return Err(errors.into());
        }
    };

    Ok(content)
}

#[derive(TypedPath)]
#[typed_path("/create/")]
struct PostCreatePath;

async fn post_create_form(
    _: PostCreatePath,
    State(store): State<Arc<dyn Store>>,
    _user: AuthenticatedUser,
) -> Result<Json<PostFormContext>> {
    Ok(Json(PostFormContext {
        form: PostForm::default(),
        is_edit: false,
        post_id: None,
        groups: store.fetch_groups().await?,
    }))
}

async fn post_create(
    _: PostCreatePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Redirect> {
    let content = validate_post_form(store.as_ref(), form).await?;

    let post = store
        .create_post(&CreatePost {
            author: user.id(),
            content,
        })
        .await?;
    info!(post = %post.id, author = %user.username(), "Post created");

    let profile = ProfilePath {
        username: post.author.username,
    };
    Ok(Redirect::to(&profile.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct PostEditPath {
    id: Id<PostMarker>,
}

/// Non-authors are sent back to the post instead of being told off.
async fn editable_post(
    store: &dyn Store,
    user: &AuthenticatedUser,
    post_id: Id<PostMarker>,
) -> Result<Result<Post, Redirect>> {
    let post = store
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    if post.author.id == user.id() {
        Ok(Ok(post))
    } else {
        info!(post = %post_id, user = %user.username(), "Refusing edit by non-author");
        Ok(Err(Redirect::to(&PostDetailPath { id: post_id }.to_string())))
    }
}

async fn post_edit_form(
    PostEditPath { id }: PostEditPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Response> {
    let post = match editable_post(store.as_ref(), &user, id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect.into_response()),
    };

    let context = PostFormContext {
        form: PostForm::from(&post),
        is_edit: true,
        post_id: Some(id),
        groups: store.fetch_groups().await?,
    };
    Ok(Json(context).into_response())
}

async fn post_edit(
    PostEditPath { id }: PostEditPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Redirect> {
    let post = match editable_post(store.as_ref(), &user, id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    let keeps_current_image = form.keeps_current_image();
    let mut content = validate_post_form(store.as_ref(), form).await?;
    if keeps_current_image {
        content.image = post.image;
    }
    store
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post = %id, author = %user.username(), "Post edited");

    Ok(Redirect::to(&PostDetailPath { id }.to_string()))
}
