//! Page-number pagination with permissive bounds handling.
//!
//! Requested page numbers arrive as raw query-string values. Anything that is
//! not an integer resolves to the first page; integers outside `1..=num_pages`
//! resolve to the last page. Nothing here ever fails.

use std::num::IntErrorKind;

use serde::Serialize;

/// A single page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub number: u64,
    pub num_pages: u64,
    /// Total number of items across all pages.
    pub count: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
        }
    }
}

/// Page bounds computed from a total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Number of pages for `count` items. An empty set still has one page.
pub fn num_pages(count: u64, per_page: u64) -> u64 {
    let per_page = per_page.max(1);
    count.div_ceil(per_page).max(1)
}

/// Resolve a raw page parameter against `count` items.
pub fn resolve_page(requested: Option<&str>, count: u64, per_page: u64) -> PageWindow {
    let per_page = per_page.max(1);
    let last = num_pages(count, per_page);

    // Integers too large to parse are still out of range, not garbage.
    let number = match requested.map(str::trim).map(str::parse::<i64>) {
        None => 1,
        Some(Err(e)) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => last,
            _ => 1,
        },
        Some(Ok(n)) if n < 1 => last,
        Some(Ok(n)) => (n as u64).min(last),
    };

    PageWindow {
        number,
        num_pages: last,
        offset: (number - 1) * per_page,
        limit: per_page,
    }
}
