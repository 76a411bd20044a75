use axum::body::Bytes;
use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tracing::info;

const MAX_CACHED_PAGES: u64 = 1_000;

/// Rendered home feed pages, keyed by the raw `page` query value.
///
/// A cached body is replayed byte for byte until it expires or [`FeedCache::clear`] is called,
/// even if posts were created in the meantime.
#[derive(Clone)]
pub struct FeedCache {
    pages: Cache<String, Bytes>,
}

impl FeedCache {
    #[must_use]
    pub fn new(time_to_live: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(MAX_CACHED_PAGES)
            .time_to_live(time_to_live)
            .build();

        Self { pages }
    }

    /// Concurrent misses on one page share a single `render`. A failed render is not cached.
    pub async fn get_or_render<E>(
        &self,
        page: String,
        render: impl Future<Output = Result<Bytes, E>>,
    ) -> Result<Bytes, Arc<E>>
    where
        E: Send + Sync + 'static,
    {
        self.pages.try_get_with(page, render).await
    }

    pub fn clear(&self) {
        self.pages.invalidate_all();
        info!("Feed cache cleared");
    }
}
