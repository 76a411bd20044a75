use crate::{
    record::{
        AuthenticationRecord, CommentRecord, CredentialsRecord, FullPostRecord, GroupRecord,
        UserRecord, to_primitive,
    },
    store::{DbError, PostFilter, Result, Store},
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use time::UtcDateTime;
use tracing::info;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, Post, PostContent, PostMarker},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::PageWindow,
};

const POST_SELECT: &str = "
    SELECT
        p.post_id,
        p.text,
        p.pub_date,
        p.image,
        u.user_id AS author_id,
        u.username AS author_username,
        u.is_staff AS author_is_staff,
        g.group_id,
        g.title AS group_title,
        g.slug AS group_slug,
        g.description AS group_description
    FROM
        posts.posts p
        JOIN users.users u ON u.user_id = p.author_id
        LEFT JOIN posts.groups g ON g.group_id = p.group_id
";

/// Condition on `posts.posts p` selecting the filtered posts, and the value bound to `$1`.
fn filter_condition(filter: PostFilter) -> (&'static str, Option<i64>) {
    match filter {
        PostFilter::All => ("$1::BIGINT IS NULL", None),
        PostFilter::Group(group_id) => ("p.group_id = $1", Some(group_id.get().cast_signed())),
        PostFilter::Author(user_id) => ("p.author_id = $1", Some(user_id.get().cast_signed())),
        PostFilter::FollowedBy(user_id) => (
            "p.author_id IN (SELECT f.author_id FROM posts.follows f WHERE f.user_id = $1)",
            Some(user_id.get().cast_signed()),
        ),
    }
}

/// Maps constraint violations to their domain errors.
fn constraint_error(err: sqlx::Error, on_unique: impl FnOnce() -> DbError) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => on_unique(),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            DbError::MissingReference
        }
        _ => err.into(),
    }
}

/// PostgreSQL backed [`Store`].
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for DbClient {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (username, password_hash)
            VALUES ($1, $2)
            RETURNING user_id, username, is_staff
            ",
        )
        .bind(user.username.get())
        .bind(user.password_hash.as_phc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::UsernameTaken(user.username.clone())))?;

        Ok(User::try_from(record)?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_id, username, is_staff
            FROM users.users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_id, username, is_staff
            FROM users.users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }

    async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, PasswordHash)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT user_id, username, is_staff, password_hash
            FROM users.users
            WHERE username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(<(User, PasswordHash)>::try_from).transpose()?)
    }

    async fn set_staff(&self, user_id: Id<UserMarker>, is_staff: bool) -> Result<bool> {
        let result = query("UPDATE users.users SET is_staff = $2 WHERE user_id = $1")
            .bind(user_id.get().cast_signed())
            .bind(is_staff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users.users WHERE user_id = $1")
            .bind(user_id.get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(authentication.user.get().cast_signed())
        .bind(to_primitive(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|duration| duration.whole_seconds()),
        )
        .execute(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::MissingReference))?;

        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM users.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Authentication::try_from).transpose()?)
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM users.authentications WHERE token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO posts.groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING group_id, title, slug, description
            ",
        )
        .bind(group.title.get())
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::GroupSlugTaken(group.slug.clone())))?;

        Ok(Group::try_from(record)?)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE group_id = $1
            ",
        )
        .bind(group_id.get().cast_signed())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Group::try_from).transpose()?)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            WHERE slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Group::try_from).transpose()?)
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM posts.groups
            ORDER BY title, group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.groups WHERE group_id = $1")
            .bind(group_id.get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = query_scalar::<_, i64>(
            "
            INSERT INTO posts.posts (text, pub_date, author_id, group_id, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_id
            ",
        )
        .bind(post.content.text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .bind(post.author.get().cast_signed())
        .bind(post.content.group.map(|group| group.get().cast_signed()))
        .bind(post.content.image.as_ref().map(|image| image.get()))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::MissingReference))?;

        self.fetch_post(post_id.cast_unsigned().into())
            .await?
            .ok_or(DbError::MissingReference)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("{POST_SELECT} WHERE p.post_id = $1");
        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.get().cast_signed())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Post::try_from).transpose()?)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let result = query(
            "
            UPDATE posts.posts
            SET text = $2, group_id = $3, image = $4
            WHERE post_id = $1
            ",
        )
        .bind(post_id.get().cast_signed())
        .bind(content.text.get())
        .bind(content.group.map(|group| group.get().cast_signed()))
        .bind(content.image.as_ref().map(|image| image.get()))
        .execute(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::MissingReference))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_post(post_id).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_id = $1")
            .bind(post_id.get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let (condition, parameter) = filter_condition(filter);
        let sql = format!("SELECT COUNT(*) FROM posts.posts p WHERE {condition}");
        let count = query_scalar::<_, i64>(&sql)
            .bind(parameter)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.cast_unsigned())
    }

    async fn fetch_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>> {
        let (condition, parameter) = filter_condition(filter);
        let sql = format!(
            "{POST_SELECT}
            WHERE {condition}
            ORDER BY p.pub_date DESC, p.post_id DESC
            LIMIT $2 OFFSET $3"
        );
        let records = query_as::<_, FullPostRecord>(&sql)
            .bind(parameter)
            .bind(window.limit.cast_signed())
            .bind(window.offset.cast_signed())
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let record = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.comments (post_id, author_id, text, created)
                VALUES ($1, $2, $3, $4)
                RETURNING comment_id, post_id, author_id, text, created
            )
            SELECT
                inserted.comment_id,
                inserted.post_id,
                inserted.text,
                inserted.created,
                u.user_id AS author_id,
                u.username AS author_username,
                u.is_staff AS author_is_staff
            FROM inserted JOIN users.users u ON u.user_id = inserted.author_id
            ",
        )
        .bind(comment.post.get().cast_signed())
        .bind(comment.author.get().cast_signed())
        .bind(comment.text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::MissingReference))?;

        Ok(Comment::try_from(record)?)
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                c.comment_id,
                c.post_id,
                c.text,
                c.created,
                u.user_id AS author_id,
                u.username AS author_username,
                u.is_staff AS author_is_staff
            FROM posts.comments c JOIN users.users u ON u.user_id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created, c.comment_id
            ",
        )
        .bind(post_id.get().cast_signed())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        let result = query(
            "
            INSERT INTO posts.follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            ",
        )
        .bind(follow.user.get().cast_signed())
        .bind(follow.author.get().cast_signed())
        .execute(&self.pool)
        .await
        .map_err(|err| constraint_error(err, || DbError::MissingReference))?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follow: Follow) -> Result<bool> {
        let result = query("DELETE FROM posts.follows WHERE user_id = $1 AND author_id = $2")
            .bind(follow.user.get().cast_signed())
            .bind(follow.author.get().cast_signed())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM posts.follows WHERE user_id = $1 AND author_id = $2
            )
            ",
        )
        .bind(follow.user.get().cast_signed())
        .bind(follow.author.get().cast_signed())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
