//! REST API module.
//!
//! Handlers for the `/1.0/{userid}/{collection}` sync protocol. Path
//! segments and conditional headers are checked here; everything else is
//! delegated to the collection façade.

mod collections;
mod items;

pub use collections::*;
pub use items::*;

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

/// Write time of the returned item or collection, in epoch milliseconds.
pub const X_LAST_MODIFIED: &str = "x-last-modified";
/// Answer `304` unless the target changed after this time.
pub const X_IF_MODIFIED_SINCE: &str = "x-if-modified-since";
/// Refuse writes with `412` when the target changed after this time.
pub const X_IF_UNMODIFIED_SINCE: &str = "x-if-unmodified-since";

static USER_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,10}$").expect("valid user id regex"));
static COLLECTION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+$").expect("valid collection regex"));
static ITEM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("valid item id regex"));

/// Parse the `{userid}` segment: 1-10 ASCII digits.
pub fn parse_user_id(raw: &str) -> Result<u64, AppError> {
    if !USER_ID.is_match(raw) {
        return Err(not_found());
    }
    raw.parse().map_err(|_| not_found())
}

pub fn check_collection_name(raw: &str) -> Result<(), AppError> {
    matching(&COLLECTION_NAME, raw)
}

pub fn check_item_id(raw: &str) -> Result<(), AppError> {
    matching(&ITEM_ID, raw)
}

fn matching(pattern: &Regex, raw: &str) -> Result<(), AppError> {
    if pattern.is_match(raw) {
        Ok(())
    } else {
        Err(not_found())
    }
}

/// Read an epoch-millisecond header, rejecting unparseable values.
pub fn timestamp_header(headers: &HeaderMap, name: &str) -> Result<Option<i64>, AppError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| parse_timestamp(v).ok())
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid value for header {}", name)))
}

/// Parse an epoch-millisecond timestamp.
pub fn parse_timestamp(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|ts| *ts >= 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid timestamp '{}'", raw)))
}

/// Headers carrying a write time.
fn last_modified(timestamp: i64) -> [(HeaderName, HeaderValue); 1] {
    [(
        HeaderName::from_static(X_LAST_MODIFIED),
        HeaderValue::from(timestamp),
    )]
}

fn not_modified(timestamp: i64) -> Response {
    (StatusCode::NOT_MODIFIED, last_modified(timestamp)).into_response()
}

fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{Config, StorageKind};
    use crate::facade::CollectionFacade;
    use crate::storage::MemoryStorage;
    use crate::{create_router, AppState};

    fn router() -> axum::Router {
        let config = Config {
            api_psk: None,
            storage: StorageKind::Memory,
            db_path: "unused.sqlite".into(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            ignore_unknown_fields: false,
        };
        create_router(AppState {
            facade: Arc::new(CollectionFacade::new(Arc::new(MemoryStorage::new()), false)),
            config: Arc::new(config),
        })
    }

    async fn send(method: &str, uri: &str, body: &str) -> Response {
        router()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_rejects_bad_segments() {
        for uri in [
            "/1.0/12345678901/apps/",
            "/1.0/abc/apps/",
            "/1.0/1/APPS/",
            "/1.0/1/apps/bad%20id",
        ] {
            let response = send("GET", uri, "").await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_router_error_envelope() {
        let response = send("PUT", "/1.0/1/apps/abc", "NOT JSON").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "MALFORMED_JSON");
    }

    #[test]
    fn test_user_id_segments() {
        assert_eq!(parse_user_id("123").unwrap(), 123);
        assert_eq!(parse_user_id("9999999999").unwrap(), 9_999_999_999);
        assert!(parse_user_id("").is_err());
        assert!(parse_user_id("12345678901").is_err());
        assert!(parse_user_id("12a").is_err());
        assert!(parse_user_id("-1").is_err());
        assert!(parse_user_id("12\n").is_err());
        assert!(parse_user_id("１２").is_err());
    }

    #[test]
    fn test_collection_and_item_segments() {
        assert!(check_collection_name("apps").is_ok());
        assert!(check_collection_name("oops").is_ok());
        assert!(check_collection_name("Apps").is_err());
        assert!(check_collection_name("apps2").is_err());

        assert!(check_item_id("Mnw_2ofOKGhIpXSYLd0LfHSH-BY").is_ok());
        assert!(check_item_id("75B538D8-67AF-44E8-86A0-B1A07BE137C8").is_ok());
        assert!(check_item_id("a.b").is_ok());
        assert!(check_item_id("a b").is_err());
        assert!(check_item_id("a/b").is_err());
        assert!(check_item_id("abc\n").is_err());
        assert!(check_item_id("").is_err());
    }

    #[test]
    fn test_timestamp_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(timestamp_header(&headers, X_IF_MODIFIED_SINCE).unwrap(), None);

        headers.insert(X_IF_MODIFIED_SINCE, HeaderValue::from_static("1234"));
        assert_eq!(
            timestamp_header(&headers, X_IF_MODIFIED_SINCE).unwrap(),
            Some(1234)
        );

        headers.insert(X_IF_MODIFIED_SINCE, HeaderValue::from_static("yesterday"));
        assert!(matches!(
            timestamp_header(&headers, X_IF_MODIFIED_SINCE),
            Err(AppError::BadRequest(_))
        ));

        assert!(parse_timestamp("-5").is_err());
    }
}
