//! Asset catalog operations the lifecycle engine depends on

use crate::{
    error::{AppError, AppResult},
    models::{
        asset::{Asset, AssetStatus, CreateAsset},
        user::Actor,
    },
    repository::{
        assets::{AssetsRepository, CascadeCounts},
        assignments::AssignmentsRepository,
        Repository,
    },
};

#[derive(Clone)]
pub struct AssetsService {
    repository: Repository,
}

impl AssetsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get(&self, id: i32) -> AppResult<Asset> {
        self.repository.assets.get_by_id(id).await
    }

    pub async fn create(&self, actor: &Actor, data: &CreateAsset) -> AppResult<Asset> {
        actor.require_admin()?;
        self.repository.assets.create(data).await
    }

    /// Administrative status change (repair, retirement, back to stock)
    pub async fn set_status(&self, actor: &Actor, id: i32, status: AssetStatus) -> AppResult<Asset> {
        actor.require_admin()?;
        if !status.is_manual() {
            return Err(AppError::Validation(format!(
                "{} is set by the assignment lifecycle, not by hand",
                status
            )));
        }

        let mut tx = self.repository.begin().await?;
        AssetsRepository::lock_for_update(&mut tx, &[id]).await?;

        if status == AssetStatus::InStock {
            let open = AssignmentsRepository::count_open(&mut tx, id).await?;
            if open > 0 {
                return Err(AppError::Conflict(format!(
                    "Asset {} still has an open assignment",
                    id
                )));
            }
        }
        AssetsRepository::update_status(&mut tx, id, status).await?;
        tx.commit().await?;

        tracing::info!(asset_id = id, status = %status, actor_id = actor.user_id, "Asset status set");
        self.get(id).await
    }

    /// Permanently remove an asset together with everything that references it
    pub async fn delete(&self, actor: &Actor, id: i32) -> AppResult<CascadeCounts> {
        actor.require_admin()?;

        let mut tx = self.repository.begin().await?;
        AssetsRepository::lock_for_update(&mut tx, &[id]).await?;
        let removed = AssetsRepository::delete_cascade(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            asset_id = id,
            assignments = removed.assignments,
            issue_tickets = removed.issue_tickets,
            activity_logs = removed.activity_logs,
            notifications = removed.notifications,
            actor_id = actor.user_id,
            "Asset deleted"
        );
        Ok(removed)
    }
}
