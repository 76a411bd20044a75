use crate::server::Settings;
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU64,
    time::Duration,
};
use yatube_common::{
    model::user::Username,
    page::{DEFAULT_PER_PAGE, Paginator},
    util::PositiveDuration,
};

const DEFAULT_INDEX_CACHE_SECONDS: u64 = 20;

fn default_posts_per_page() -> NonZeroU64 {
    DEFAULT_PER_PAGE
}

fn default_index_cache_seconds() -> u64 {
    DEFAULT_INDEX_CACHE_SECONDS
}

/// Process environment, optionally seeded from a `.env` file.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without it everything lives in memory and is lost on shutdown.
    pub database_url: Option<String>,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: NonZeroU64,
    #[serde(default = "default_index_cache_seconds")]
    pub index_cache_seconds: u64,
    pub auth_token_lifetime_seconds: Option<NonZeroU64>,
    pub admin_username: Option<Username>,
}

impl Env {
    #[must_use]
    pub fn server_socket(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        let auth_token_lifetime = self.auth_token_lifetime_seconds.and_then(|seconds| {
            PositiveDuration::try_from(Duration::from_secs(seconds.get())).ok()
        });

        Settings {
            paginator: Paginator::new(self.posts_per_page),
            auth_token_lifetime,
        }
    }

    #[must_use]
    pub fn index_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.index_cache_seconds)
    }
}
