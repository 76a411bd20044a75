use crate::model::{
    Id,
    form::{FormErrors, REQUIRED_MESSAGE},
    group::{Group, GroupMarker},
    user::{User, UserMarker},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const IMAGE_REF_MAX_LEN: usize = 100;
pub const IMAGE_UPLOAD_DIR: &str = "posts/";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: PostText,
    pub pub_date: UtcDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<ImageRef>,
}

/// The parts of a post its author controls.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: PostText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ImageRef>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
}

/// Raw post form submission, validated into [`PostContent`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
    /// Drops the stored image on edit.
    pub clear_image: bool,
}

impl PostForm {
    /// An edit that submits no image leaves the stored one alone.
    #[must_use]
    pub fn keeps_current_image(&self) -> bool {
        !self.clear_image
            && self
                .image
                .as_deref()
                .is_none_or(|image| image.trim().is_empty())
    }

    /// Checks everything that does not need the store. Whether `group` exists is up to the caller.
    pub fn validate(self) -> Result<PostContent, FormErrors> {
        let mut errors = FormErrors::new();

        let text = PostText::new(self.text)
            .map_err(|_| errors.add("text", REQUIRED_MESSAGE))
            .ok();

        let image = match self.image {
            Some(image) if !image.trim().is_empty() => ImageRef::new(image)
                .map_err(|err| errors.add("image", err.to_string()))
                .ok(),
            _ => None,
        };

        match text {
            Some(text) => errors.into_result(PostContent {
                text,
                group: self.group,
                image,
            }),
            None => Err(errors),
        }
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            text: post.text.get().to_owned(),
            group: post.group.as_ref().map(|group| group.id),
            image: post.image.as_ref().map(|image| image.get().to_owned()),
            clear_image: false,
        }
    }
}

/// Non-blank text with surrounding whitespace removed.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The text must not be blank.")]
pub struct InvalidPostTextError;

impl PostText {
    pub fn new(text: String) -> Result<Self, InvalidPostTextError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Err(InvalidPostTextError)
        } else if trimmed.len() == text.len() {
            Ok(Self(text))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PostText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostText::new(inner).map_err(|_| Error::invalid_value(Unexpected::Str(""), &"PostText"))
    }
}

/// Relative storage path of an uploaded image, such as `posts/cat.png`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Enter a relative file path of at most 100 characters: {0}")]
pub struct InvalidImageRefError(String);

impl ImageRef {
    /// Bare file names land in the upload directory.
    pub fn new(reference: String) -> Result<Self, InvalidImageRefError> {
        let reference = reference.trim();
        let valid = !reference.is_empty()
            && !reference.starts_with('/')
            && !reference.contains('\\')
            && reference
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "..");
        if !valid {
            return Err(InvalidImageRefError(reference.to_owned()));
        }

        let reference = if reference.contains('/') {
            reference.to_owned()
        } else {
            format!("{IMAGE_UPLOAD_DIR}{reference}")
        };

        if reference.chars().count() > IMAGE_REF_MAX_LEN {
            return Err(InvalidImageRefError(reference));
        }

        Ok(Self(reference))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        ImageRef::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"ImageRef"))
    }
}
