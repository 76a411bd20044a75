use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

/// Subscription of `user` to the posts of `author`. A user may follow themselves.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Follow {
    pub user: Id<UserMarker>,
    pub author: Id<UserMarker>,
}
