//! Limit/offset pagination for list endpoints

use serde::Serialize;

/// Page size when the client does not ask for one
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest page a client may request
pub const MAX_LIMIT: i64 = 100;

/// Sanitised page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    /// Build from raw query values
    ///
    /// Missing limit means [`DEFAULT_LIMIT`]; an unparsable value counts as 0
    /// and is then clamped into `1..=MAX_LIMIT`. Offset is floored at 0.
    ///
    /// # Examples
    /// ```
    /// use catalog_api::pagination::PageRequest;
    ///
    /// let p = PageRequest::from_raw(None, None);
    /// assert_eq!((p.limit, p.offset), (50, 0));
    ///
    /// let p = PageRequest::from_raw(Some("500"), Some("-3"));
    /// assert_eq!((p.limit, p.offset), (100, 0));
    /// ```
    pub fn from_raw(limit: Option<&str>, offset: Option<&str>) -> Self {
        let limit = limit.map(lenient_int).unwrap_or(DEFAULT_LIMIT);
        let offset = offset.map(lenient_int).unwrap_or(0);

        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.max(0),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

fn lenient_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

/// Pagination block of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl PageInfo {
    pub fn new(total: i64, page: PageRequest) -> Self {
        Self {
            total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.offset.saturating_add(page.limit) < total,
        }
    }
}
