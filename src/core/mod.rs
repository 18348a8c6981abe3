//! Business logic, independent of the HTTP and Discord front ends.

pub mod ai;
pub mod category;
pub mod inventory;
pub mod product;
pub mod router;
pub mod sku;
pub mod warehouse;
pub mod whatsapp;

use serde::{Deserialize, Deserializer, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u64 = 100;
/// Highest page number honoured; later pages are always empty anyway.
pub const MAX_PAGE: u64 = 1_000_000;

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u64,
    /// Page size
    pub limit: u64,
    /// Items across all pages
    pub total: u64,
    /// Number of pages
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wraps an already-fetched page.
    #[must_use]
    pub const fn new(items: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            items,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        }
    }

    /// Cuts one page out of a fully materialised list.
    #[must_use]
    pub fn from_vec(all: Vec<T>, page: u64, limit: u64) -> Self {
        let (page, limit) = normalize_paging(page, limit);
        let total = all.len() as u64;
        let skip = usize::try_from(page_offset(page, limit)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(skip).take(take).collect();
        Self::new(items, page, limit, total)
    }
}

/// Clamps page to `1..=MAX_PAGE` and limit to `1..=MAX_PAGE_SIZE` (0 means default).
#[must_use]
pub fn normalize_paging(page: u64, limit: u64) -> (u64, u64) {
    let limit = if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    };
    (page.clamp(1, MAX_PAGE), limit)
}

/// Deserializes a nullable field of a partial update.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, `null` becomes
/// `Some(None)` (clear the value) and anything else `Some(Some(value))`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Rows to skip before a 1-based page.
#[must_use]
pub const fn page_offset(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_vec() {
        let page = Page::from_vec((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);

        let past_end = Page::from_vec(vec![1, 2, 3], 5, 20);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total_pages, 1);
    }

    #[test]
    fn test_normalize_paging() {
        assert_eq!(normalize_paging(0, 0), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(normalize_paging(2, 500), (2, MAX_PAGE_SIZE));
        assert_eq!(normalize_paging(u64::MAX, 20), (MAX_PAGE, 20));
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        brand: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_missing_and_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.brand, None);
        let null: Patch = serde_json::from_str(r#"{"brand": null}"#).unwrap();
        assert_eq!(null.brand, Some(None));
        let set: Patch = serde_json::from_str(r#"{"brand": "Lipigas"}"#).unwrap();
        assert_eq!(set.brand, Some(Some("Lipigas".to_string())));
    }

    #[test]
    fn test_huge_page_is_empty() {
        let page = Page::from_vec(vec![1, 2, 3], u64::MAX, 20);
        assert!(page.items.is_empty());
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page_offset(u64::MAX, u64::MAX), u64::MAX);
    }
}
