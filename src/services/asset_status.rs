//! Asset status synchronizer
//!
//! Derives an asset's availability from its open assignments whenever one
//! of them leaves the open set.

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::asset::AssetStatus,
    repository::{assets::AssetsRepository, assignments::AssignmentsRepository},
};

/// Status an asset should have given its current status and open assignment count.
///
/// IN_REPAIR and RETIRED are kept as they are.
pub fn derive_status(current: AssetStatus, open_assignments: i64) -> AssetStatus {
    if current.is_sticky() {
        current
    } else if open_assignments > 0 {
        AssetStatus::Assigned
    } else {
        AssetStatus::InStock
    }
}

/// Recompute and persist the status of `asset_id` from the rows visible in this transaction
pub async fn resync(conn: &mut PgConnection, asset_id: i32) -> AppResult<AssetStatus> {
    let asset = AssetsRepository::lock_for_update(conn, &[asset_id])
        .await?
        .pop()
        .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", asset_id)))?;
    let open = AssignmentsRepository::count_open(conn, asset_id).await?;
    let next = derive_status(asset.status, open);

    if next != asset.status {
        AssetsRepository::update_status(conn, asset_id, next).await?;
        tracing::debug!(asset_id, from = %asset.status, to = %next, open, "Asset status resynced");
    }
    Ok(next)
}

/// Status chosen by an administrator when approving a return
pub fn validate_return_status(next: AssetStatus) -> AppResult<AssetStatus> {
    match next {
        AssetStatus::InStock | AssetStatus::InRepair => Ok(next),
        other => Err(AppError::Validation(format!(
            "A returned asset goes to IN_STOCK or IN_REPAIR, not {}",
            other
        ))),
    }
}
