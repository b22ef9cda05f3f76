//! Page-number pagination for list endpoints.
//!
//! Responses carry `{count, next, previous, results}`; `next`/`previous`
//! are the request URL with the `page` parameter swapped, or null at the
//! edges. Page size comes from the `limit` query parameter.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Assemble a page envelope. `path` and `query` come from the request
    /// URI so `next`/`previous` preserve any active filters.
    pub fn new(
        count: i64,
        results: Vec<T>,
        params: &PageParams,
        path: &str,
        query: Option<&str>,
    ) -> Self {
        let page = params.page();
        let limit = params.limit();
        let next = if page * limit < count {
            Some(page_url(path, query, page + 1))
        } else {
            None
        };
        let previous = if page > 1 {
            Some(page_url(path, query, page - 1))
        } else {
            None
        };
        Self { count, next, previous, results }
    }
}

fn page_url(path: &str, query: Option<&str>, page: i64) -> String {
    let mut parts: Vec<String> = query
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("page="))
        .map(str::to_string)
        .collect();
    parts.push(format!("page={}", page));
    format!("{}?{}", path, parts.join("&"))
}
