//! Notifications and activity log repository

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::notification::{LifecycleEvent, Notification},
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Unread notifications for a user, newest first
    pub async fn unread_for_user(&self, user_id: i32) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 AND NOT is_read ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Mark every notification about an assignment as read
    pub async fn mark_read_for_assignment(&self, assignment_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE assignment_id = $1 AND NOT is_read",
        )
        .bind(assignment_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn insert(
        &self,
        user_id: i32,
        kind: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notifications (user_id, kind, asset_id, assignment_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(kind)
        .bind(asset_id)
        .bind(assignment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_activity(
        &self,
        actor_id: i32,
        action: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_logs (asset_id, assignment_id, actor_id, action) VALUES ($1, $2, $3, $4)",
        )
        .bind(asset_id)
        .bind(assignment_id)
        .bind(actor_id)
        .bind(action)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
