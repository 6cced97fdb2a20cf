//! Pagination types for windowed reads with totals.
//!
//! [`PaginationParams`] names a 1-indexed page and a page size;
//! [`Page`] carries one page of items together with the total match count
//! and derived navigation metadata.

use serde::{Deserialize, Serialize};

/// A single page of results with its total count.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total count of matching items across all pages.
    pub total: u64,
    /// The page number these items belong to (1-indexed).
    pub page: usize,
    /// The page size the total was windowed by.
    pub per_page: usize,
    /// Number of pages the total spans (at least 1).
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Returns true when a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Returns true when an earlier page exists.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// The next page number, when one exists.
    pub fn next_page(&self) -> Option<usize> {
        self.has_next().then(|| self.page + 1)
    }

    /// The previous page number, when one exists.
    pub fn previous_page(&self) -> Option<usize> {
        self.has_previous().then(|| self.page - 1)
    }
}

/// Parameters for paginating through large result sets.
///
/// Pages are 1-indexed (page 1 is the first page).
///
/// # Example
///
/// ```ignore
/// use rowlayer_core::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 50);
/// // Retrieves page 2 with 50 items per page
/// assert_eq!(params.offset(), 50);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    /// Creates new pagination parameters.
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Calculates the offset (number of items to skip) for this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.per_page
    }

    /// Wraps one windowed batch of items into a [`Page`] with navigation
    /// metadata derived from the total match count.
    pub fn wrap<T>(&self, items: Vec<T>, total: u64) -> Page<T> {
        let total_pages = if self.per_page > 0 {
            ((total as usize) + self.per_page - 1) / self.per_page
        } else {
            1
        };

        Page {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
            total_pages: total_pages.max(1),
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}
