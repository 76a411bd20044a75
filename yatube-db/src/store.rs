use async_trait::async_trait;
use thiserror::Error;
use yatube_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, Post, PostContent, PostMarker},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::{Page, PageWindow, Paginator},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("The username {0} is already taken.")]
    UsernameTaken(Username),
    #[error("A group with the slug {0} already exists.")]
    GroupSlugTaken(GroupSlug),
    #[error("A referenced row does not exist.")]
    MissingReference,
}

/// Which posts a feed shows. Every feed is ordered newest first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by anyone the given user follows.
    FollowedBy(Id<UserMarker>),
}

/// Persistence of the whole data model.
///
/// Implementations enforce the referential rules: deleting a user removes their posts, comments,
/// follows and authentications; deleting a post removes its comments; deleting a group detaches
/// its posts. A follow edge exists at most once per (user, author) pair.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    async fn fetch_credentials(&self, username: &Username)
    -> Result<Option<(User, PasswordHash)>>;

    /// Returns whether the user exists.
    async fn set_staff(&self, user_id: Id<UserMarker>, is_staff: bool) -> Result<bool>;

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    /// All groups, ordered by title.
    async fn fetch_groups(&self) -> Result<Vec<Group>>;

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Author and publication date stay untouched. `None` if the post does not exist.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn fetch_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;

    /// Oldest first.
    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    /// Returns whether a new edge was created.
    async fn follow(&self, follow: Follow) -> Result<bool>;

    /// Returns whether an edge was removed.
    async fn unfollow(&self, follow: Follow) -> Result<bool>;

    async fn is_following(&self, follow: Follow) -> Result<bool>;

    async fn fetch_post_page(
        &self,
        filter: PostFilter,
        paginator: Paginator,
        requested: Option<&str>,
    ) -> Result<Page<Post>> {
        let count = self.count_posts(filter).await?;
        let window = paginator.window(count, requested);
        let posts = self.fetch_posts(filter, window).await?;

        Ok(Page::new(window, count, posts))
    }
}
