use crate::store::{DbError, PostFilter, Result, Store};
use async_trait::async_trait;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::UtcDateTime;
use yatube_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{CreatePost, ImageRef, Post, PostContent, PostMarker, PostText},
        user::{CreateUser, User, UserMarker, Username},
    },
    page::PageWindow,
};

#[derive(Clone, Debug)]
struct UserRow {
    user: User,
    password_hash: PasswordHash,
}

#[derive(Clone, Debug)]
struct PostRow {
    text: PostText,
    pub_date: UtcDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<ImageRef>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: PostText,
    created: UtcDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: u64,
    users: BTreeMap<Id<UserMarker>, UserRow>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: BTreeMap<u64, CommentRow>,
    follows: BTreeSet<Follow>,
}

impl Tables {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::new(self.last_id)
    }

    fn user(&self, user_id: Id<UserMarker>) -> Result<User> {
        self.users
            .get(&user_id)
            .map(|row| row.user.clone())
            .ok_or(DbError::MissingReference)
    }

    fn post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let Some(row) = self.posts.get(&post_id) else {
            return Ok(None);
        };

        Ok(Some(Post {
            id: post_id,
            text: row.text.clone(),
            pub_date: row.pub_date,
            author: self.user(row.author)?,
            group: row
                .group
                .and_then(|group_id| self.groups.get(&group_id).cloned()),
            image: row.image.clone(),
        }))
    }

    fn matches(&self, filter: PostFilter, row: &PostRow) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(user_id) => row.author == user_id,
            PostFilter::FollowedBy(user_id) => self.follows.contains(&Follow {
                user: user_id,
                author: row.author,
            }),
        }
    }

    /// Newest first.
    fn feed(&self, filter: PostFilter) -> Vec<(Id<PostMarker>, &PostRow)> {
        let mut rows: Vec<_> = self
            .posts
            .iter()
            .filter(|(_, row)| self.matches(filter, row))
            .map(|(id, row)| (*id, row))
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| (b.pub_date, b_id).cmp(&(a.pub_date, a_id)));
        rows
    }

    fn check_group(&self, group: Option<Id<GroupMarker>>) -> Result<()> {
        match group {
            Some(group_id) if !self.groups.contains_key(&group_id) => {
                Err(DbError::MissingReference)
            }
            _ => Ok(()),
        }
    }
}

/// In-process [`Store`] with the same semantics as the database, for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut tables = self.tables();
        if tables
            .users
            .values()
            .any(|row| row.user.username == user.username)
        {
            return Err(DbError::UsernameTaken(user.username.clone()));
        }

        let created = User {
            id: tables.next_id(),
            username: user.username.clone(),
            is_staff: false,
        };
        tables.users.insert(
            created.id,
            UserRow {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );

        Ok(created)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.tables().users.get(&user_id).map(|row| row.user.clone()))
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|row| &row.user.username == username)
            .map(|row| row.user.clone()))
    }

    async fn fetch_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, PasswordHash)>> {
        Ok(self
            .tables()
            .users
            .values()
            .find(|row| &row.user.username == username)
            .map(|row| (row.user.clone(), row.password_hash.clone())))
    }

    async fn set_staff(&self, user_id: Id<UserMarker>, is_staff: bool) -> Result<bool> {
        let mut tables = self.tables();
        let Some(row) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        row.user.is_staff = is_staff;
        Ok(true)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let mut tables = self.tables();
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        tables.posts.retain(|_, row| row.author != user_id);
        let Tables {
            posts, comments, ..
        } = &mut *tables;
        comments.retain(|_, row| row.author != user_id && posts.contains_key(&row.post));
        tables
            .follows
            .retain(|follow| follow.user != user_id && follow.author != user_id);
        tables
            .authentications
            .retain(|_, authentication| authentication.user != user_id);

        Ok(true)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&authentication.user) {
            return Err(DbError::MissingReference);
        }
        tables
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self.tables().authentications.get(token_hash).cloned())
    }

    async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        Ok(self.tables().authentications.remove(token_hash).is_some())
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut tables = self.tables();
        if tables.groups.values().any(|row| row.slug == group.slug) {
            return Err(DbError::GroupSlugTaken(group.slug.clone()));
        }

        let created = Group {
            id: tables.next_id(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.insert(created.id, created.clone());

        Ok(created)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.tables().groups.get(&group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        Ok(self
            .tables()
            .groups
            .values()
            .find(|group| &group.slug == slug)
            .cloned())
    }

    async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let mut groups: Vec<_> = self.tables().groups.values().cloned().collect();
        groups.sort_by(|a, b| (&a.title, a.id).cmp(&(&b.title, b.id)));
        Ok(groups)
    }

    async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let mut tables = self.tables();
        if tables.groups.remove(&group_id).is_none() {
            return Ok(false);
        }

        for row in tables.posts.values_mut() {
            if row.group == Some(group_id) {
                row.group = None;
            }
        }
        Ok(true)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut tables = self.tables();
        tables.user(post.author)?;
        tables.check_group(post.content.group)?;

        let post_id = tables.next_id();
        tables.posts.insert(
            post_id,
            PostRow {
                text: post.content.text.clone(),
                pub_date: UtcDateTime::now(),
                author: post.author,
                group: post.content.group,
                image: post.content.image.clone(),
            },
        );

        tables.post(post_id)?.ok_or(DbError::MissingReference)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        self.tables().post(post_id)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables();
        tables.check_group(content.group)?;

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.text = content.text.clone();
        row.group = content.group;
        row.image = content.image.clone();

        tables.post(post_id)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables();
        if tables.posts.remove(&post_id).is_none() {
            return Ok(false);
        }

        tables.comments.retain(|_, row| row.post != post_id);
        Ok(true)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let tables = self.tables();
        let count = tables
            .posts
            .values()
            .filter(|row| tables.matches(filter, row))
            .count();

        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn fetch_posts(&self, filter: PostFilter, window: PageWindow) -> Result<Vec<Post>> {
        let tables = self.tables();
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);

        tables
            .feed(filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(post_id, _)| tables.post(post_id).transpose())
            .collect()
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut tables = self.tables();
        if !tables.posts.contains_key(&comment.post) {
            return Err(DbError::MissingReference);
        }
        let author = tables.user(comment.author)?;

        let comment_id = tables.next_id();
        let created = UtcDateTime::now();
        tables.comments.insert(
            comment_id.get(),
            CommentRow {
                post: comment.post,
                author: comment.author,
                text: comment.text.clone(),
                created,
            },
        );

        Ok(Comment {
            id: comment_id,
            post: comment.post,
            author,
            text: comment.text.clone(),
            created,
        })
    }

    async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let tables = self.tables();
        tables
            .comments
            .iter()
            .filter(|(_, row)| row.post == post_id)
            .map(|(comment_id, row)| {
                Ok(Comment {
                    id: Id::new(*comment_id),
                    post: row.post,
                    author: tables.user(row.author)?,
                    text: row.text.clone(),
                    created: row.created,
                })
            })
            .collect()
    }

    async fn follow(&self, follow: Follow) -> Result<bool> {
        let mut tables = self.tables();
        tables.user(follow.user)?;
        tables.user(follow.author)?;

        Ok(tables.follows.insert(follow))
    }

    async fn unfollow(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.remove(&follow))
    }

    async fn is_following(&self, follow: Follow) -> Result<bool> {
        Ok(self.tables().follows.contains(&follow))
    }
}
