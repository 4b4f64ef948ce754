use serde::Deserialize;

use crate::{config::PaginationConfig, rest::ApiError};

pub const MSG_INVALID_PAGE: &str = "Invalid page parameter";
pub const MSG_INVALID_PER_PAGE: &str = "Invalid per_page parameter";

/// Raw query. Kept as strings so malformed numbers get the envelope instead of a plain rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PageQuery {
    pub fn resolve(&self, cfg: &PaginationConfig) -> Result<Page, ApiError> {
        let page = self
            .page
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .ok_or_else(|| ApiError::bad_request(MSG_INVALID_PAGE))?;

        let per_page = match self.per_page.as_deref() {
            None => 0,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| ApiError::bad_request(MSG_INVALID_PER_PAGE))?,
        };

        let limit = if per_page == 0 || per_page > cfg.max_per_page {
            cfg.default_per_page
        } else {
            per_page
        };

        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| ApiError::bad_request(MSG_INVALID_PAGE))?;

        Ok(Page { limit, offset })
    }
}
