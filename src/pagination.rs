//! Paging parameters and the response envelopes shared by every endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;
/// Highest page number accepted; keeps `offset` inside `i64` for any limit.
pub const MAX_PAGE: i64 = i64::MAX / MAX_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Page
///
/// A normalized page request: `page` is clamped to 1..=MAX_PAGE and `limit` to 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Page {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Slices an already filtered and sorted list. Used by the in-memory repository.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let len = usize::try_from(self.limit).unwrap_or(0);
        items.iter().skip(start).take(len).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(page: Page, total_items: i64) -> Self {
        let total_pages = (total_items + page.limit - 1) / page.limit;
        PaginationMeta {
            current_page: page.page,
            total_pages,
            total_items,
            items_per_page: page.limit,
            has_next_page: page.page < total_pages,
            has_prev_page: page.page > 1,
        }
    }
}

/// ApiResponse
///
/// Success envelope: `{ success: true, message, data? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// PaginatedResponse
///
/// List envelope: `{ success: true, message, data: [...], pagination }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(message: impl Into<String>, data: Vec<T>, page: Page, total: i64) -> Self {
        PaginatedResponse {
            success: true,
            message: message.into(),
            data,
            pagination: PaginationMeta::new(page, total),
        }
    }
}

impl<T: Serialize> IntoResponse for PaginatedResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// 200 with data.
pub fn ok<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::OK, message, Some(data))
}

/// 201 with data.
pub fn created<T: Serialize>(message: &str, data: T) -> Response {
    respond(StatusCode::CREATED, message, Some(data))
}

/// 200 without a data field.
pub fn done(message: &str) -> Response {
    respond::<()>(StatusCode::OK, message, None)
}

fn respond<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> Response {
    let body = ApiResponse {
        success: true,
        message: message.to_string(),
        data,
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 10 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, limit: 100 });
        assert_eq!(Page::new(Some(-3), Some(0)), Page { page: 1, limit: 1 });
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn metadata_reports_neighbouring_pages() {
        let meta = PaginationMeta::new(Page::new(Some(2), Some(10)), 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let empty = PaginationMeta::new(Page::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_prev_page);
    }

    #[test]
    fn metadata_serializes_in_camel_case() {
        let json = serde_json::to_value(PaginationMeta::new(Page::default(), 5)).unwrap();
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["itemsPerPage"], 10);
        assert_eq!(json["hasNextPage"], false);
    }

    #[test]
    fn slice_returns_requested_window() {
        let items: Vec<i32> = (1..=25).collect();
        assert_eq!(Page::new(Some(3), Some(10)).slice(&items), vec![21, 22, 23, 24, 25]);
        assert!(Page::new(Some(4), Some(10)).slice(&items).is_empty());
    }

    #[test]
    fn huge_page_number_does_not_overflow_offset() {
        let page = Page::new(Some(i64::MAX), Some(100));
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);

        let items: Vec<i32> = (1..=5).collect();
        assert!(page.slice(&items).is_empty());

        let meta = PaginationMeta::new(page, 5);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }
}
