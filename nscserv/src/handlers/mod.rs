//! HTTP handlers for the `/api` scope.
//!
//! Handlers are thin: they validate input, run the database work on the
//! blocking pool with `web::block`, then dispatch any e-mails the workflow
//! queued once its transaction has committed.

pub mod account;
pub mod admin;
pub mod auth;
pub mod kyc;
pub mod notifications;
pub mod packages;
pub mod withdrawals;

use std::str::FromStr;

use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

use nsccore::validate::{Page, Pagination};

use crate::error::{ApiError, ApiResult};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `?page=&limit=&status=` style query shared by list endpoints
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub search: Option<String>,
    pub unread: Option<bool>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }

    /// Parse the `status` filter, treating an empty value as absent
    pub fn status<T>(&self) -> ApiResult<Option<T>>
    where
        T: FromStr<Err = nsccore::CoreError>,
    {
        parse_filter(self.status.as_deref())
    }

    pub fn kind<T>(&self) -> ApiResult<Option<T>>
    where
        T: FromStr<Err = nsccore::CoreError>,
    {
        parse_filter(self.kind.as_deref())
    }
}

fn parse_filter<T>(raw: Option<&str>) -> ApiResult<Option<T>>
where
    T: FromStr<Err = nsccore::CoreError>,
{
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(Some(value.parse::<T>()?)),
        None => Ok(None),
    }
}

/// Body of review endpoints that accept an optional note
#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    pub note: Option<String>,
}

impl ReviewRequest {
    pub fn note(&self) -> ApiResult<Option<String>> {
        match self.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(note) => Ok(Some(nsccore::validate::required_text("note", note, 500)?)),
            None => Ok(None),
        }
    }
}

pub(crate) fn page_response<T: Serialize>(items: Vec<T>, pagination: Pagination, total: i64) -> HttpResponse {
    HttpResponse::Ok().json(Page::new(items, pagination, total))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App};
    use actix_web::test::{call_and_read_body_json, init_service, TestRequest};
    use nsccore::types::WithdrawalStatus;

    #[actix_web::test]
    async fn test_health() {
        let app = init_service(App::new().route("/api/health", web::get().to(health))).await;
        let req = TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_list_query_filters() {
        let query = ListQuery {
            status: Some("pending".to_string()),
            ..Default::default()
        };
        assert_eq!(query.status::<WithdrawalStatus>().unwrap(), Some(WithdrawalStatus::Pending));

        let blank = ListQuery {
            status: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.status::<WithdrawalStatus>().unwrap(), None);

        let bad = ListQuery {
            status: Some("paid".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad.status::<WithdrawalStatus>(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-a-uuid", "payment").is_err());
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "payment").unwrap(), id);
    }
}
