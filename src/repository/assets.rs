//! Assets repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::asset::{Asset, AssetStatus, CreateAsset},
};

#[derive(Clone)]
pub struct AssetsRepository {
    pool: Pool<Postgres>,
}

/// Rows removed by [`AssetsRepository::delete_cascade`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CascadeCounts {
    pub notifications: u64,
    pub activity_logs: u64,
    pub issue_tickets: u64,
    pub assignments: u64,
}

impl AssetsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get asset by ID (no lock)
    pub async fn get_by_id(&self, id: i32) -> AppResult<Asset> {
        sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", id)))
    }

    /// Insert a catalog asset in IN_STOCK
    pub async fn create(&self, data: &CreateAsset) -> AppResult<Asset> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (asset_tag, name, asset_type, status, location, department)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&data.asset_tag)
        .bind(&data.name)
        .bind(data.asset_type)
        .bind(AssetStatus::InStock)
        .bind(&data.location)
        .bind(&data.department)
        .fetch_one(&self.pool)
        .await?;
        Ok(asset)
    }

    /// Lock asset rows exclusively, in ascending id order.
    ///
    /// Blocks while another transaction holds any of the rows. Fails with
    /// NotFound naming the first id that does not exist.
    pub async fn lock_for_update(conn: &mut PgConnection, ids: &[i32]) -> AppResult<Vec<Asset>> {
        let assets = sqlx::query_as::<_, Asset>(
            "SELECT * FROM assets WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        if let Some(missing) = ids.iter().find(|id| !assets.iter().any(|a| a.id == **id)) {
            return Err(AppError::NotFound(format!("Asset with id {} not found", missing)));
        }
        Ok(assets)
    }

    /// Set the availability status of an asset
    pub async fn update_status(conn: &mut PgConnection, id: i32, status: AssetStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE assets SET status = $1, modif_date = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset with id {} not found", id)));
        }
        Ok(())
    }

    /// Delete an asset and every record that depends on it.
    ///
    /// The caller must hold the asset row lock and commit or roll back the
    /// whole transaction.
    pub async fn delete_cascade(conn: &mut PgConnection, id: i32) -> AppResult<CascadeCounts> {
        let notifications = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE asset_id = $1
               OR assignment_id IN (SELECT id FROM assignments WHERE asset_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let activity_logs = sqlx::query("DELETE FROM activity_logs WHERE asset_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let issue_tickets = sqlx::query("DELETE FROM issue_tickets WHERE asset_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let assignments = sqlx::query("DELETE FROM assignments WHERE asset_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let result = sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Asset with id {} not found", id)));
        }

        Ok(CascadeCounts {
            notifications,
            activity_logs,
            issue_tickets,
            assignments,
        })
    }
}
