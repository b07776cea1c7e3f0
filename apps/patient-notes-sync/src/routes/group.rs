//! Group API endpoints
//!
//! `POST /group` creates a group, `GET /group` pulls its current payload and
//! `PUT /group` replaces it under the version check. `GET /group/meta` exposes
//! the version for cheap polling.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::sync::{
    CreateGroupRequest, CreateGroupResponse, GroupMeta, GroupSnapshot, PushRequest, PushResponse,
    PASS_HEADER,
};

/// Create the group router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/group", get(pull_group).post(create_group).put(push_group))
        .route("/group/meta", get(group_meta))
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub id: Option<String>,
}

/// Group id from the query string; an unparsable query counts as a bad id
fn group_id(query: std::result::Result<Query<GroupQuery>, QueryRejection>) -> Result<String> {
    let Query(query) = query.map_err(|_| AppError::BadId)?;
    Ok(query.id.unwrap_or_default())
}

fn pass(headers: &HeaderMap) -> Option<&str> {
    headers.get(PASS_HEADER).and_then(|v| v.to_str().ok())
}

/// Create a new group
async fn create_group(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateGroupResponse>)> {
    // An unreadable body is treated as empty and fails id validation
    let req: CreateGroupRequest = serde_json::from_slice(&body).unwrap_or_default();

    state.groups().create(&req.id, &req.pass).await?;

    Ok((StatusCode::CREATED, Json(CreateGroupResponse { id: req.id })))
}

/// Pull the current group payload
async fn pull_group(
    State(state): State<AppState>,
    query: std::result::Result<Query<GroupQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<GroupSnapshot>> {
    let snapshot = state.groups().pull(&group_id(query)?, pass(&headers)).await?;
    Ok(Json(snapshot))
}

/// Replace the group payload
async fn push_group(
    State(state): State<AppState>,
    query: std::result::Result<Query<GroupQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PushResponse>> {
    // Parse after extraction so that id and password errors win over body errors
    let req = serde_json::from_slice::<PushRequest>(&body).unwrap_or_default();

    let version = state.groups().push(&group_id(query)?, pass(&headers), req).await?;

    Ok(Json(PushResponse { ok: true, version }))
}

/// Version and update time of a group
async fn group_meta(
    State(state): State<AppState>,
    query: std::result::Result<Query<GroupQuery>, QueryRejection>,
) -> Result<Json<GroupMeta>> {
    let meta = state.groups().meta(&group_id(query)?).await?;
    Ok(Json(meta))
}
