//! Fixed-size pagination of feeds.
//!
//! Out-of-range requests are clamped instead of rejected: a missing or non-numeric page number
//! yields the first page and a number past either end yields the last one.

use serde::{Deserialize, Serialize};
use std::num::{IntErrorKind, NonZeroU64};

pub const DEFAULT_PER_PAGE: NonZeroU64 = NonZeroU64::new(10).unwrap();

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Paginator {
    per_page: NonZeroU64,
}

/// Slice of the underlying list a page covers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl Paginator {
    #[must_use]
    pub fn new(per_page: NonZeroU64) -> Self {
        Self { per_page }
    }

    #[must_use]
    pub fn per_page(self) -> u64 {
        self.per_page.get()
    }

    /// An empty list still has one (empty) page.
    #[must_use]
    pub fn num_pages(self, count: u64) -> u64 {
        count.div_ceil(self.per_page()).max(1)
    }

    #[must_use]
    pub fn window(self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = match requested.map(|page| page.trim().parse::<i64>()) {
            None => 1,
            Some(Ok(page)) => u64::try_from(page)
                .ok()
                .filter(|page| (1..=num_pages).contains(page))
                .unwrap_or(num_pages),
            // Still an integer, just far out of range.
            Some(Err(err))
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                num_pages
            }
            Some(Err(_)) => 1,
        };

        PageWindow {
            number,
            num_pages,
            offset: (number - 1) * self.per_page(),
            limit: self.per_page(),
        }
    }
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(window: PageWindow, count: u64, items: Vec<T>) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count,
            has_previous: window.number > 1,
            has_next: window.number < window.num_pages,
        }
    }
}
