//! Pagination arithmetic and result containers.

use serde::Serialize;

/// Pagination block of a list response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub count: u64,
}

impl PaginationMeta {
    pub fn new(total_items: u64, current_page: u64, count: u64) -> Self {
        Self {
            total_items,
            total_pages: total_pages(total_items, count),
            current_page,
            count,
        }
    }
}

/// One page of results plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

/// `ceil(total_items / count)`; `0` for no items or a zero page size.
pub fn total_pages(total_items: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    total_items.div_ceil(count)
}

/// Number of rows skipped before `page` (1-based).
///
/// Page `0` is treated as page `1`; callers validate `page >= 1`.
pub fn page_offset(page: u64, count: u64) -> u64 {
    count.saturating_mul(page.saturating_sub(1))
}
