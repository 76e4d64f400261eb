//! Offset pagination for page-numbered REST APIs.
//!
//! Callers describe a window with `first`/`last` (page sizes) and
//! `after`/`before` (integer offsets). Slade 360 REST APIs want one-based
//! `page` and `page_size` query parameters instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::urls::QueryValues;

pub const DEFAULT_REST_API_PAGE_SIZE: u32 = 100;
/// Largest page the REST APIs serve. Requests are not clamped to it.
pub const MAX_REST_API_PAGE_SIZE: u32 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("expected `{field}` to be parseable as an int; got {value}")]
    InvalidOffset { field: &'static str, value: String },
}

/// A requested window over a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationInput {
    #[serde(default)]
    pub first: u32,
    #[serde(default)]
    pub last: u32,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub before: String,
}

impl PaginationInput {
    /// Page size, preferring `first` over `last`.
    pub fn page_size(&self) -> u32 {
        if self.first > 0 {
            self.first
        } else if self.last > 0 {
            self.last
        } else {
            DEFAULT_REST_API_PAGE_SIZE
        }
    }

    /// Offset, preferring `after` over `before`.
    ///
    /// Every non-empty cursor must parse, even the one that loses.
    pub fn offset(&self) -> Result<i64, PaginationError> {
        let mut offset = 0;
        if !self.before.is_empty() {
            offset = parse_offset("before", &self.before)?;
        }
        if !self.after.is_empty() {
            offset = parse_offset("after", &self.after)?;
        }
        Ok(offset)
    }
}

fn parse_offset(field: &'static str, value: &str) -> Result<i64, PaginationError> {
    value.parse().map_err(|_| PaginationError::InvalidOffset {
        field,
        value: value.to_string(),
    })
}

/// Translate a pagination window into `page` and `page_size` parameters.
///
/// No window yields no parameters.
pub fn api_pagination_params(
    pagination: Option<&PaginationInput>,
) -> Result<QueryValues, PaginationError> {
    let mut values = QueryValues::new();
    let Some(pagination) = pagination else {
        return Ok(values);
    };

    let page_size = pagination.page_size();
    let page = pagination.offset()? / i64::from(page_size) + 1;

    values.set("page", page.to_string());
    values.set("page_size", page_size.to_string());
    Ok(values)
}
