use sqlx::FromRow;
use time::{Duration, PrimitiveDateTime, UtcDateTime};
use yatube_common::model::{
    ModelValidationError,
    auth::{Authentication, PasswordHash},
    comment::Comment,
    group::{Group, GroupSlug, GroupTitle},
    post::{ImageRef, Post, PostText},
    user::{User, Username},
};

pub(crate) fn to_primitive(date_time: UtcDateTime) -> PrimitiveDateTime {
    PrimitiveDateTime::new(date_time.date(), date_time.time())
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub username: String,
    pub is_staff: bool,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub text: String,
    pub pub_date: PrimitiveDateTime,
    pub image: Option<String>,
    pub author_id: i64,
    pub author_username: String,
    pub author_is_staff: bool,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created: PrimitiveDateTime,
    pub author_id: i64,
    pub author_username: String,
    pub author_is_staff: bool,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn user(id: i64, username: String, is_staff: bool) -> Result<User, ModelValidationError> {
    Ok(User {
        id: id.cast_unsigned().into(),
        username: Username::new(username)?,
        is_staff,
    })
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        user(value.user_id, value.username, value.is_staff)
    }
}

impl TryFrom<CredentialsRecord> for (User, PasswordHash) {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok((
            user(value.user_id, value.username, value.is_staff)?,
            PasswordHash::from_phc(value.password_hash),
        ))
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.group_id.cast_unsigned().into(),
            title: GroupTitle::new(value.title)?,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_id,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_id), Some(title), Some(slug), Some(description)) => {
                Some(Group::try_from(GroupRecord {
                    group_id,
                    title,
                    slug,
                    description,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            id: value.post_id.cast_unsigned().into(),
            text: PostText::new(value.text)?,
            pub_date: value.pub_date.as_utc(),
            author: user(value.author_id, value.author_username, value.author_is_staff)?,
            group,
            image: value.image.map(ImageRef::new).transpose()?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.cast_unsigned().into(),
            post: value.post_id.cast_unsigned().into(),
            author: user(value.author_id, value.author_username, value.author_is_staff)?,
            text: PostText::new(value.text)?,
            created: value.created.as_utc(),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.cast_unsigned().into(),
            token_hash: value.token_hash.into_boxed_slice().try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{FullPostRecord, to_primitive};
    use time::macros::utc_datetime;
    use yatube_common::model::post::Post;

    fn record() -> FullPostRecord {
        FullPostRecord {
            post_id: 7,
            text: "Тестовый пост".to_owned(),
            pub_date: to_primitive(utc_datetime!(2025-10-24 10:30)),
            image: Some("posts/small.gif".to_owned()),
            author_id: 1,
            author_username: "StasBasov".to_owned(),
            author_is_staff: false,
            group_id: None,
            group_title: None,
            group_slug: None,
            group_description: None,
        }
    }

    #[test]
    fn post_without_group() {
        let post = Post::try_from(record()).unwrap();

        assert_eq!(post.id.get(), 7);
        assert_eq!(post.pub_date, utc_datetime!(2025-10-24 10:30));
        assert_eq!(post.author.username.get(), "StasBasov");
        assert_eq!(post.group, None);
        assert_eq!(post.image.unwrap().get(), "posts/small.gif");
    }

    #[test]
    fn post_with_group() {
        let post = Post::try_from(FullPostRecord {
            group_id: Some(3),
            group_title: Some("Тестовый заголовок".to_owned()),
            group_slug: Some("test-slug".to_owned()),
            group_description: Some("Тестовый текст".to_owned()),
            ..record()
        })
        .unwrap();

        let group = post.group.unwrap();
        assert_eq!(group.id.get(), 3);
        assert_eq!(group.slug.get(), "test-slug");
    }

    #[test]
    fn invalid_username_is_rejected() {
        let result = Post::try_from(FullPostRecord {
            author_username: "no spaces allowed".to_owned(),
            ..record()
        });

        assert!(result.is_err());
    }
}
