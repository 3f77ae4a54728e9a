//! Asset endpoints used alongside the assignment lifecycle

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::asset::{Asset, CreateAsset, UpdateAssetStatus},
    AppState,
};

use super::AuthenticatedUser;

/// Get asset by ID
#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn get_asset(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Asset>> {
    Ok(Json(state.services.assets.get(id).await?))
}

/// Register an asset in stock
#[utoipa::path(
    post,
    path = "/assets",
    tag = "assets",
    security(("bearer_auth" = [])),
    request_body = CreateAsset,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Invalid asset"),
        (status = 409, description = "Asset tag already used")
    )
)]
pub async fn create_asset(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateAsset>,
) -> AppResult<(StatusCode, Json<Asset>)> {
    data.validate()?;
    let asset = state.services.assets.create(&claims.actor(), &data).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// Change an asset's availability by hand
#[utoipa::path(
    put,
    path = "/assets/{id}/status",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    request_body = UpdateAssetStatus,
    responses(
        (status = 200, description = "Status updated", body = Asset),
        (status = 400, description = "Status is owned by the lifecycle"),
        (status = 409, description = "Asset has an open assignment")
    )
)]
pub async fn update_asset_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateAssetStatus>,
) -> AppResult<Json<Asset>> {
    let asset = state
        .services
        .assets
        .set_status(&claims.actor(), id, data.status)
        .await?;
    Ok(Json(asset))
}

/// Permanently delete an asset and its dependent records
#[utoipa::path(
    delete,
    path = "/assets/{id}",
    tag = "assets",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Asset not found")
    )
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.assets.delete(&claims.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
