//! 1-based paging shared by the gateway and the collaborator clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("page number must be >= 1")]
pub struct InvalidPage;

/// A request for one page of a listing.
///
/// Pages are numbered from 1. A missing size means "everything on one page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u64,
    size: Option<u64>,
}

/// Largest offset or limit sent downstream. Collaborators read both as
/// signed 64-bit integers.
pub const MAX_LIMIT: u64 = i64::MAX as u64;

impl PageRequest {
    /// Creates a page request, rejecting page 0.
    pub fn new(page: u64, size: u64) -> Result<Self, InvalidPage> {
        if page == 0 {
            return Err(InvalidPage);
        }
        Ok(Self {
            page,
            size: Some(size),
        })
    }

    /// A single page holding every item.
    pub fn all() -> Self {
        Self {
            page: 1,
            size: None,
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    /// Requested page size, `None` when every item was asked for.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn is_unbounded(&self) -> bool {
        self.size.is_none()
    }

    /// Number of items to skip downstream, at most [`MAX_LIMIT`].
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit()).min(MAX_LIMIT)
    }

    /// Maximum number of items to return downstream, at most [`MAX_LIMIT`].
    pub fn limit(&self) -> u64 {
        self.size.map_or(MAX_LIMIT, |size| size.min(MAX_LIMIT))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::all()
    }
}

/// One page of results plus the total number of matching items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64) -> Self {
        Self { items, total_count }
    }

    /// The degraded listing: no items, zero total.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_rejected() {
        assert_eq!(PageRequest::new(0, 10), Err(InvalidPage));
    }

    #[test]
    fn offset_is_zero_based() {
        let request = PageRequest::new(3, 10).unwrap();
        assert_eq!(request.offset(), 20);
        assert_eq!(request.limit(), 10);
    }

    #[test]
    fn oversized_pages_stay_within_signed_range() {
        let request = PageRequest::new(2, u64::MAX).unwrap();
        assert_eq!(request.offset(), MAX_LIMIT);
        assert_eq!(request.limit(), MAX_LIMIT);
        assert!(!request.is_unbounded());

        let all = PageRequest::all();
        assert!(all.is_unbounded());
        assert_eq!(all.size(), None);
        assert_eq!(all.offset(), 0);
        assert_eq!(all.limit(), MAX_LIMIT);
    }

    #[test]
    fn empty_page_has_zero_total() {
        let page: Page<u8> = Page::empty();
        assert!(page.is_empty());
        assert_eq!(page.total_count, 0);
    }
}
