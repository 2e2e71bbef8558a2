//! Page/limit handling shared by the paginated listings.

use crate::models::Pagination;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_CUSTOMER_LIMIT: u32 = 50;
pub const DEFAULT_CAMPAIGN_LIMIT: u32 = 20;

/// A validated page request: `page >= 1`, `1 <= limit <= max_page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Builds a request from raw query string values.
    ///
    /// Missing, non-numeric or non-positive values are replaced by the
    /// defaults; `limit` is capped at `max_limit`. Never fails.
    pub fn from_query(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u32,
        max_limit: u32,
    ) -> Self {
        let page = parse_positive(page).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(limit)
            .unwrap_or(default_limit)
            .min(max_limit.max(1));

        Self { page, limit }
    }

    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of rows (or groups) to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn paginate(&self, total: u64) -> Pagination {
        Pagination {
            total,
            page: self.page,
            limit: self.limit,
            total_pages: total.div_ceil(u64::from(self.limit)),
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}
