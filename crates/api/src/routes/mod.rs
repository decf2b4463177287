//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod rentals;
pub mod vehicles;

use axum::http::HeaderMap;
use common::PageRequest;
use serde::Deserialize;

use crate::error::ApiError;

/// Header naming the caller.
pub const USER_HEADER: &str = "x-user-name";

/// `page` and `size` query parameters, kept as text so bad values get a
/// proper error body.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

impl PageQuery {
    /// Page defaults to 1; a missing size means every item on one page.
    pub fn to_request(&self) -> Result<PageRequest, ApiError> {
        let page = match self.page.as_deref() {
            None | Some("") => 1,
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("invalid page number: {raw}")))?,
        };

        match self.size.as_deref() {
            None | Some("") => {
                if page == 0 {
                    return Err(ApiError::BadRequest(common::InvalidPage.to_string()));
                }
                Ok(PageRequest::all())
            }
            Some(raw) => {
                let size = raw
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid page size: {raw}")))?;
                PageRequest::new(page, size).map_err(|e| ApiError::BadRequest(e.to_string()))
            }
        }
    }
}

/// Name of the caller from the `X-User-Name` header.
pub fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("X-User-Name header is required".to_string()))
}
