//! Conflict guard: row locks plus the "one open assignment per asset" check

use sqlx::PgConnection;

use crate::{
    error::{AppError, AppResult},
    models::asset::{Asset, AssetStatus},
    repository::{assets::AssetsRepository, assignments::AssignmentsRepository},
};

/// Deduplicated ids in ascending order, the only order in which asset rows are locked
pub fn lock_order(ids: impl IntoIterator<Item = i32>) -> Vec<i32> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Lock every asset in `ids`, blocking until concurrent holders commit or roll back
pub async fn lock_assets(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Asset>> {
    let ordered = lock_order(ids.iter().copied());
    AssetsRepository::lock_for_update(conn, &ordered).await
}

/// Check locked assets against the open assignments found on them.
///
/// `open` holds (asset_id, assignment_id) pairs. The first offending asset,
/// in ascending id order, is reported.
pub fn check_available(assets: &[Asset], open: &[(i32, i32)]) -> AppResult<()> {
    let mut assets: Vec<&Asset> = assets.iter().collect();
    assets.sort_by_key(|a| a.id);

    for asset in assets {
        if asset.status != AssetStatus::InStock {
            return Err(AppError::Conflict(format!(
                "Asset {} is {}, not IN_STOCK",
                asset.id, asset.status
            )));
        }
        if let Some((_, assignment_id)) = open.iter().find(|(asset_id, _)| *asset_id == asset.id) {
            return Err(AppError::Conflict(format!(
                "Asset {} already has open assignment {}",
                asset.id, assignment_id
            )));
        }
    }
    Ok(())
}

/// Availability check for assets the caller already holds locks on
pub async fn verify_locked(conn: &mut PgConnection, assets: &[Asset]) -> AppResult<()> {
    let ids: Vec<i32> = assets.iter().map(|a| a.id).collect();
    let open = AssignmentsRepository::find_open(conn, &ids, None).await?;
    check_available(assets, &open).inspect_err(|e| {
        tracing::warn!(asset_ids = ?ids, "Assignment refused: {}", e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asset::AssetType;
    use chrono::Utc;

    fn asset(id: i32, status: AssetStatus) -> Asset {
        Asset {
            id,
            asset_tag: format!("TAG-{}", id),
            name: format!("Asset {}", id),
            asset_type: AssetType::Laptop,
            status,
            location: None,
            department: None,
            crea_date: Utc::now(),
            modif_date: Utc::now(),
        }
    }

    #[test]
    fn lock_order_is_ascending_and_unique() {
        assert_eq!(lock_order([9, 3, 9, 1, 3]), vec![1, 3, 9]);
        assert!(lock_order(Vec::new()).is_empty());
    }

    #[test]
    fn free_assets_pass() {
        let assets = [asset(1, AssetStatus::InStock), asset(2, AssetStatus::InStock)];
        assert!(check_available(&assets, &[]).is_ok());
    }

    #[test]
    fn unavailable_status_is_a_conflict() {
        let assets = [asset(1, AssetStatus::InStock), asset(2, AssetStatus::InRepair)];
        let err = check_available(&assets, &[]).unwrap_err();
        match err {
            AppError::Conflict(msg) => assert!(msg.contains("Asset 2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn open_assignment_is_a_conflict_even_in_stock() {
        // pending STAFF assignments leave the asset IN_STOCK
        let assets = [asset(4, AssetStatus::InStock)];
        let err = check_available(&assets, &[(4, 77)]).unwrap_err();
        match err {
            AppError::Conflict(msg) => assert!(msg.contains("open assignment 77")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn lowest_offending_asset_is_reported() {
        let assets = [asset(8, AssetStatus::Retired), asset(5, AssetStatus::Assigned)];
        let err = check_available(&assets, &[]).unwrap_err();
        assert!(err.to_string().contains("Asset 5"));
    }
}
