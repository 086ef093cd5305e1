//! Offset/limit slicing over a cache snapshot.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the whole collection, not of this page.
    pub total: usize,
    /// 1-based page actually served.
    pub page: usize,
    /// Effective page size; equals `total` when no limit applied.
    pub limit: usize,
}

/// Slice `items` into 1-based pages.
///
/// `page < 1` is treated as 1, `limit < 1` returns everything, and a page
/// past the end is empty but still reports the true total.
pub fn paginate<T: Clone>(items: &[T], page: i64, limit: i64) -> Page<T> {
    let total = items.len();
    let page = page.max(1) as usize;

    if limit < 1 {
        return Page {
            items: items.to_vec(),
            total,
            page: 1,
            limit: total,
        };
    }

    let limit = limit as usize;
    let start = (page - 1).saturating_mul(limit);
    if start >= total {
        return Page {
            items: Vec::new(),
            total,
            page,
            limit,
        };
    }
    let end = start.saturating_add(limit).min(total);

    Page {
        items: items[start..end].to_vec(),
        total,
        page,
        limit,
    }
}
