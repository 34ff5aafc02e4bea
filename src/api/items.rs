//! Single item endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::{
    check_collection_name, check_item_id, last_modified, not_modified, parse_user_id,
    timestamp_header, X_IF_MODIFIED_SINCE, X_IF_UNMODIFIED_SINCE,
};
use crate::errors::AppError;
use crate::facade::SetItemRequest;
use crate::AppState;

type ItemPath = Path<(String, String, String)>;

fn parse_item_path(
    (userid, collection, item): &(String, String, String),
) -> Result<u64, AppError> {
    let user_id = parse_user_id(userid)?;
    check_collection_name(collection)?;
    check_item_id(item)?;
    Ok(user_id)
}

/// GET /1.0/:userid/:collection/:item - Fetch one full item.
pub async fn get_item(
    State(state): State<AppState>,
    Path(path): ItemPath,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user_id = parse_item_path(&path)?;
    let (_, collection, item_id) = path;
    let if_modified_since = timestamp_header(&headers, X_IF_MODIFIED_SINCE)?;

    let item = state.facade.get_item(user_id, &collection, &item_id).await?;
    if if_modified_since.is_some_and(|since| item.modified_at <= since) {
        return Ok(not_modified(item.modified_at));
    }

    Ok((last_modified(item.modified_at), Json(item.data)).into_response())
}

/// PUT /1.0/:userid/:collection/:item - Create or replace an item.
pub async fn put_item(
    State(state): State<AppState>,
    Path(path): ItemPath,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let user_id = parse_item_path(&path)?;
    let (_, collection, item_id) = path;

    let content_type = match headers.get(header::CONTENT_TYPE) {
        Some(value) => Some(value.to_str().map_err(|_| {
            AppError::UnsupportedMediaType("unreadable Content-Type".to_string())
        })?),
        None => None,
    }
    .filter(|value| !value.trim().is_empty());

    let request = SetItemRequest {
        body: &body,
        content_type,
        if_unmodified_since: timestamp_header(&headers, X_IF_UNMODIFIED_SINCE)?,
    };
    let outcome = state
        .facade
        .set_item(user_id, &collection, &item_id, request)
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    };
    Ok((status, last_modified(outcome.modified_at)).into_response())
}

/// DELETE /1.0/:userid/:collection/:item - Delete an item.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(path): ItemPath,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user_id = parse_item_path(&path)?;
    let (_, collection, item_id) = path;
    let if_unmodified_since = timestamp_header(&headers, X_IF_UNMODIFIED_SINCE)?;

    state
        .facade
        .delete_item(user_id, &collection, &item_id, if_unmodified_since)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
