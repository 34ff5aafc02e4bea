//! Collection listing endpoint.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::{
    check_collection_name, last_modified, not_modified, parse_timestamp, parse_user_id,
    timestamp_header, X_IF_MODIFIED_SINCE,
};
use crate::errors::AppError;
use crate::AppState;

/// Query parameters accepted on a listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only items modified strictly after this time
    pub after: Option<String>,
    /// Present to return full records instead of abbreviations
    pub full: Option<String>,
}

/// GET /1.0/:userid/:collection/ - List a collection.
pub async fn get_collection(
    State(state): State<AppState>,
    Path((userid, collection)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user_id = parse_user_id(&userid)?;
    check_collection_name(&collection)?;
    let after = query.after.as_deref().map(parse_timestamp).transpose()?;
    let if_modified_since = timestamp_header(&headers, X_IF_MODIFIED_SINCE)?;

    let timestamp = state
        .facade
        .collection_timestamp(user_id, &collection)
        .await?;
    if let (Some(timestamp), Some(since)) = (timestamp, if_modified_since) {
        if timestamp <= since {
            return Ok(not_modified(timestamp));
        }
    }

    let listing = state
        .facade
        .get_collection(user_id, &collection, after, query.full.is_some())
        .await?;

    Ok(match timestamp {
        Some(timestamp) => (last_modified(timestamp), Json(listing)).into_response(),
        None => Json(listing).into_response(),
    })
}
