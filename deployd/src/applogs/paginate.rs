//! Newest-first pagination
//!
//! Page 1 holds the newest entries. Within a page entries are returned in
//! chronological order.

use serde::{Deserialize, Serialize};

use crate::models::log::AppLogLine;

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_lines: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

/// A page of log lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub logs: Vec<AppLogLine>,
    pub pagination: Pagination,
}

impl LogPage {
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self {
            logs: Vec::new(),
            pagination: pagination(0, page, page_size),
        }
    }
}

/// Metadata for `total` entries. `page` and `page_size` are clamped to 1.
pub fn pagination(total: usize, page: usize, page_size: usize) -> Pagination {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_pages = total.div_ceil(page_size);

    Pagination {
        page,
        page_size,
        total_lines: total,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    }
}

/// Select one page from newest-first items.
///
/// Returns the page in chronological order, the offset of the page's first
/// newest-first item, and the metadata.
pub fn select_page<T>(newest_first: Vec<T>, page: usize, page_size: usize) -> (Vec<T>, usize, Pagination) {
    let meta = pagination(newest_first.len(), page, page_size);
    let start = (meta.page - 1).saturating_mul(meta.page_size);

    let mut items: Vec<T> = newest_first
        .into_iter()
        .skip(start)
        .take(meta.page_size)
        .collect();
    items.reverse();

    (items, start, meta)
}
