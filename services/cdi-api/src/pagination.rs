//! Pagination envelope and query-string helpers.

use serde::Serialize;

use cdi_common::{CdiError, CdiResult};
use storage::{Page, PAGE_SIZE};

/// `{ current, total, total_page, data }`
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub current: i64,
    pub total: i64,
    pub total_page: i64,
    pub data: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn from_page(page: Page<T>) -> Self {
        Self {
            current: page.page,
            total: page.total,
            total_page: page.total_pages(),
            data: page.items,
        }
    }

    /// Envelope around items paged elsewhere (the catalog pages itself).
    pub fn external(current: i64, total: i64, page_size: i64, data: Vec<T>) -> Self {
        let size = if page_size > 0 { page_size } else { PAGE_SIZE };
        Self {
            current,
            total,
            total_page: (total + size - 1) / size,
            data,
        }
    }
}

/// 1-based page number; absent means the first page.
pub fn parse_page(raw: Option<&str>) -> CdiResult<i64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(1),
        Some(s) => s
            .parse::<i64>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| CdiError::invalid("page", "A valid page number is required.")),
    }
}

/// Boolean flag accepting `1/0/true/false`.
pub fn parse_flag(name: &str, raw: Option<&str>) -> CdiResult<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => Err(CdiError::invalid(name, format!("'{}' is not a valid boolean.", other))),
    }
}

pub fn parse_id(name: &str, raw: Option<&str>) -> CdiResult<Option<i64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| CdiError::invalid(name, "A valid integer is required.")),
    }
}
