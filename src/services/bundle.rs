//! Bundle coordinator: a hub asset plus peripherals assigned in one transaction

use sqlx::PgConnection;
use uuid::Uuid;

use super::conflict_guard;
use crate::{
    config::AssignmentsConfig,
    error::{AppError, AppResult},
    models::{
        asset::Asset,
        assignment::{Assignment, AssignmentStatus, AssignmentTarget, Document},
    },
    repository::assignments::{AssignmentsRepository, NewAssignment},
};

/// Locked and validated set of assets for one create request
#[derive(Debug, Clone)]
pub struct BundlePlan {
    pub primary: Asset,
    /// Ascending id order
    pub peripherals: Vec<Asset>,
    /// Present only when there is at least one peripheral
    pub group_id: Option<Uuid>,
}

impl BundlePlan {
    pub fn asset_ids(&self) -> Vec<i32> {
        std::iter::once(self.primary.id)
            .chain(self.peripherals.iter().map(|a| a.id))
            .collect()
    }
}

/// Payloads carried by the primary row only
#[derive(Debug, Clone, Copy, Default)]
pub struct IssuePayload<'a> {
    pub issue_condition: Option<&'a Document>,
    pub accessories_issued: Option<&'a Document>,
    pub notes: Option<&'a str>,
}

/// Peripheral ids with duplicates and the primary removed, ascending
pub fn normalize_candidates(primary_id: i32, bundle_ids: &[i32]) -> Vec<i32> {
    conflict_guard::lock_order(bundle_ids.iter().copied().filter(|id| *id != primary_id))
}

/// Type rules for bundling; `peripherals` may be empty
pub fn validate_types(
    config: &AssignmentsConfig,
    target: &AssignmentTarget,
    primary: &Asset,
    peripherals: &[Asset],
) -> AppResult<()> {
    if peripherals.is_empty() {
        return Ok(());
    }
    if !matches!(target, AssignmentTarget::Staff { .. }) {
        return Err(AppError::Validation(format!(
            "Bundles can only be assigned to staff, not {}",
            target.target_type()
        )));
    }
    if !config.hub_types.contains(&primary.asset_type) {
        return Err(AppError::Validation(format!(
            "Asset {} of type {} cannot carry a bundle",
            primary.id, primary.asset_type
        )));
    }
    if let Some(bad) = peripherals
        .iter()
        .find(|a| !config.peripheral_types.contains(&a.asset_type))
    {
        return Err(AppError::Validation(format!(
            "Asset {} of type {} cannot be bundled",
            bad.id, bad.asset_type
        )));
    }
    Ok(())
}

/// Lock the primary and every candidate, then validate the whole set.
///
/// Locks are taken for all assets before any of them is checked, so a
/// single unavailable member aborts the bundle with nothing written.
pub async fn plan(
    conn: &mut PgConnection,
    config: &AssignmentsConfig,
    target: &AssignmentTarget,
    primary_id: i32,
    bundle_ids: &[i32],
) -> AppResult<BundlePlan> {
    let candidates = normalize_candidates(primary_id, bundle_ids);
    if !candidates.is_empty() && !matches!(target, AssignmentTarget::Staff { .. }) {
        return Err(AppError::Validation(format!(
            "Bundles can only be assigned to staff, not {}",
            target.target_type()
        )));
    }

    let all_ids: Vec<i32> = std::iter::once(primary_id).chain(candidates).collect();
    let mut locked = conflict_guard::lock_assets(conn, &all_ids).await?;

    let primary_idx = locked
        .iter()
        .position(|a| a.id == primary_id)
        .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", primary_id)))?;
    let primary = locked.remove(primary_idx);
    let peripherals = locked;

    validate_types(config, target, &primary, &peripherals)?;

    let mut members = Vec::with_capacity(peripherals.len() + 1);
    members.push(primary.clone());
    members.extend(peripherals.iter().cloned());
    conflict_guard::verify_locked(conn, &members).await?;

    let group_id = (!peripherals.is_empty()).then(Uuid::new_v4);
    Ok(BundlePlan {
        primary,
        peripherals,
        group_id,
    })
}

/// Insert one row per planned asset; only the primary carries the payload
pub async fn insert_rows(
    conn: &mut PgConnection,
    plan: &BundlePlan,
    target: &AssignmentTarget,
    receiver_user_id: Option<i32>,
    status: AssignmentStatus,
    assigned_by: i32,
    payload: IssuePayload<'_>,
) -> AppResult<Vec<Assignment>> {
    let mut rows = Vec::with_capacity(plan.peripherals.len() + 1);

    rows.push(
        AssignmentsRepository::insert(
            conn,
            &NewAssignment {
                asset_id: plan.primary.id,
                group_id: plan.group_id,
                target,
                receiver_user_id,
                status,
                assigned_by,
                issue_condition: payload.issue_condition,
                accessories_issued: payload.accessories_issued,
                notes: payload.notes,
            },
        )
        .await?,
    );

    for peripheral in &plan.peripherals {
        rows.push(
            AssignmentsRepository::insert(
                conn,
                &NewAssignment {
                    asset_id: peripheral.id,
                    group_id: plan.group_id,
                    target,
                    receiver_user_id,
                    status,
                    assigned_by,
                    issue_condition: None,
                    accessories_issued: None,
                    notes: None,
                },
            )
            .await?,
        );
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::asset::{AssetStatus, AssetType};
    use chrono::Utc;

    fn asset(id: i32, asset_type: AssetType) -> Asset {
        Asset {
            id,
            asset_tag: format!("TAG-{}", id),
            name: format!("Asset {}", id),
            asset_type,
            status: AssetStatus::InStock,
            location: None,
            department: None,
            crea_date: Utc::now(),
            modif_date: Utc::now(),
        }
    }

    fn staff() -> AssignmentTarget {
        AssignmentTarget::Staff { staff_id: 3 }
    }

    #[test]
    fn candidates_drop_duplicates_and_the_primary() {
        assert_eq!(normalize_candidates(5, &[7, 5, 6, 7]), vec![6, 7]);
        assert!(normalize_candidates(5, &[5]).is_empty());
    }

    #[test]
    fn desktop_bundles_monitor_and_keyboard() {
        let cfg = AssignmentsConfig::default();
        let peripherals = [asset(2, AssetType::Monitor), asset(3, AssetType::Keyboard)];
        assert!(validate_types(&cfg, &staff(), &asset(1, AssetType::Desktop), &peripherals).is_ok());
    }

    #[test]
    fn laptop_cannot_be_a_hub() {
        let cfg = AssignmentsConfig::default();
        let err = validate_types(
            &cfg,
            &staff(),
            &asset(1, AssetType::Laptop),
            &[asset(2, AssetType::Mouse)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Asset 1")));
    }

    #[test]
    fn disallowed_peripheral_is_named() {
        let cfg = AssignmentsConfig::default();
        let err = validate_types(
            &cfg,
            &staff(),
            &asset(1, AssetType::SystemUnit),
            &[asset(2, AssetType::Monitor), asset(3, AssetType::Phone)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Asset 3")));
    }

    #[test]
    fn bundles_require_a_staff_target() {
        let cfg = AssignmentsConfig::default();
        let target = AssignmentTarget::Location { location: "Lab".into() };
        let err = validate_types(
            &cfg,
            &target,
            &asset(1, AssetType::Desktop),
            &[asset(2, AssetType::Monitor)],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn single_assets_skip_type_rules() {
        let cfg = AssignmentsConfig::default();
        let target = AssignmentTarget::Department { department: "Finance".into() };
        assert!(validate_types(&cfg, &target, &asset(1, AssetType::Phone), &[]).is_ok());
    }
}
