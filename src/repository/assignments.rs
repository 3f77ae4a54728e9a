//! Assignments repository for database operations

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::assignment::{
        Assignment, AssignmentQuery, AssignmentRow, AssignmentStatus, AssignmentTarget, Document,
        Pagination, Transition,
    },
};

/// Column values for a new assignment row
#[derive(Debug, Clone)]
pub struct NewAssignment<'a> {
    pub asset_id: i32,
    pub group_id: Option<Uuid>,
    pub target: &'a AssignmentTarget,
    pub receiver_user_id: Option<i32>,
    pub status: AssignmentStatus,
    pub assigned_by: i32,
    pub issue_condition: Option<&'a Document>,
    pub accessories_issued: Option<&'a Document>,
    pub notes: Option<&'a str>,
}

/// Columns written by a single lifecycle transition
#[derive(Debug, Clone)]
pub enum TransitionUpdate<'a> {
    Accept { actor_id: i32, terms_version: &'a str },
    Refuse { actor_id: i32, reason: Option<&'a str>, notes: Option<String> },
    RequestReturn {
        actor_id: i32,
        return_condition: Option<&'a Document>,
        accessories_returned: Option<&'a Document>,
    },
    ApproveReturn {
        actor_id: i32,
        final_condition: &'a Document,
        final_accessories: &'a Document,
        notes: Option<String>,
    },
    RejectReturn { actor_id: i32, reason: &'a str, notes: Option<String> },
    Cancel { actor_id: i32 },
    Revert { actor_id: i32, reason: Option<&'a str>, notes: Option<String> },
}

impl TransitionUpdate<'_> {
    /// Lifecycle transition these columns belong to
    pub fn transition(&self) -> Transition {
        match self {
            TransitionUpdate::Accept { .. } => Transition::Accept,
            TransitionUpdate::Refuse { .. } => Transition::Refuse,
            TransitionUpdate::RequestReturn { .. } => Transition::RequestReturn,
            TransitionUpdate::ApproveReturn { .. } => Transition::ApproveReturn,
            TransitionUpdate::RejectReturn { .. } => Transition::RejectReturn,
            TransitionUpdate::Cancel { .. } => Transition::Cancel,
            TransitionUpdate::Revert { .. } => Transition::Revert,
        }
    }
}

#[derive(Clone)]
pub struct AssignmentsRepository {
    pool: Pool<Postgres>,
}

impl AssignmentsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get assignment by ID (no lock)
    pub async fn get_by_id(&self, id: i32) -> AppResult<Assignment> {
        sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Assignment with id {} not found", id)))?
            .try_into()
    }

    /// List assignments with optional filters and pagination
    pub async fn list(
        &self,
        query: &AssignmentQuery,
        pagination: Pagination,
    ) -> AppResult<(Vec<Assignment>, i64)> {

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assignments");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM assignments");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(pagination.per_page)
            .push(" OFFSET ")
            .push_bind(pagination.offset);

        let rows = select
            .build_query_as::<AssignmentRow>()
            .fetch_all(&self.pool)
            .await?;
        let assignments = rows
            .into_iter()
            .map(Assignment::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((assignments, total))
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &AssignmentQuery) {
        let mut sep = " WHERE ";
        if let Some(asset_id) = query.asset_id {
            builder.push(sep).push("asset_id = ").push_bind(asset_id);
            sep = " AND ";
        }
        if let Some(status) = query.status {
            builder.push(sep).push("status = ").push_bind(status);
            sep = " AND ";
        }
        if let Some(receiver) = query.receiver_user_id {
            builder.push(sep).push("receiver_user_id = ").push_bind(receiver);
            sep = " AND ";
        }
        if let Some(group_id) = query.group_id {
            builder.push(sep).push("group_id = ").push_bind(group_id);
            sep = " AND ";
        }
        if query.open_only.unwrap_or(false) {
            builder
                .push(sep)
                .push("status = ANY(")
                .push_bind(AssignmentStatus::open_set())
                .push(")");
        }
    }

    /// All assignments created in one bundle, oldest first
    pub async fn list_group(&self, group_id: Uuid) -> AppResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT * FROM assignments WHERE group_id = $1 ORDER BY id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Assignment::try_from).collect()
    }

    /// Read an assignment inside a transaction (no lock)
    pub async fn fetch(conn: &mut PgConnection, id: i32) -> AppResult<Assignment> {
        sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Assignment with id {} not found", id)))?
            .try_into()
    }

    /// Re-read an assignment under a row lock.
    ///
    /// Callers lock the owning asset first so every transaction acquires
    /// asset then assignment locks in the same order.
    pub async fn fetch_for_update(conn: &mut PgConnection, id: i32) -> AppResult<Assignment> {
        sqlx::query_as::<_, AssignmentRow>("SELECT * FROM assignments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Assignment with id {} not found", id)))?
            .try_into()
    }

    /// Open assignments on any of `asset_ids`, as (asset_id, assignment_id), lowest asset first
    pub async fn find_open(
        conn: &mut PgConnection,
        asset_ids: &[i32],
        excluding: Option<i32>,
    ) -> AppResult<Vec<(i32, i32)>> {
        let rows = sqlx::query_as::<_, (i32, i32)>(
            r#"
            SELECT asset_id, id FROM assignments
            WHERE asset_id = ANY($1)
              AND status = ANY($2)
              AND ($3::INTEGER IS NULL OR id <> $3)
            ORDER BY asset_id, id
            "#,
        )
        .bind(asset_ids)
        .bind(AssignmentStatus::open_set())
        .bind(excluding)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    /// Number of open assignments on an asset
    pub async fn count_open(conn: &mut PgConnection, asset_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assignments WHERE asset_id = $1 AND status = ANY($2)",
        )
        .bind(asset_id)
        .bind(AssignmentStatus::open_set())
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Insert an assignment row
    pub async fn insert(conn: &mut PgConnection, new: &NewAssignment<'_>) -> AppResult<Assignment> {
        let (staff_id, location, department) = new.target.columns();
        sqlx::query_as::<_, AssignmentRow>(
            r#"
            INSERT INTO assignments (
                asset_id, group_id, target_type, staff_id, location, department,
                receiver_user_id, status, assigned_by, assigned_at,
                issue_condition, accessories_issued, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(new.asset_id)
        .bind(new.group_id)
        .bind(new.target.target_type())
        .bind(staff_id)
        .bind(location)
        .bind(department)
        .bind(new.receiver_user_id)
        .bind(new.status)
        .bind(new.assigned_by)
        .bind(new.issue_condition)
        .bind(new.accessories_issued)
        .bind(new.notes)
        .fetch_one(&mut *conn)
        .await?
        .try_into()
    }

    /// Write a transition, guarded by the expected current status.
    ///
    /// Fails with InvalidState when the persisted status is no longer `from`.
    pub async fn apply_transition(
        conn: &mut PgConnection,
        id: i32,
        from: AssignmentStatus,
        update: &TransitionUpdate<'_>,
    ) -> AppResult<Assignment> {
        let to = update.transition().apply(from)?;
        let query = match update {
            TransitionUpdate::Accept { actor_id, terms_version } => sqlx::query_as::<_, AssignmentRow>(
                r#"
                UPDATE assignments
                SET status = $3, accepted_at = NOW(), accepted_by = $4, terms_version = $5,
                    modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*terms_version),
            TransitionUpdate::Refuse { actor_id, reason, notes } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, refused_at = NOW(), refused_by = $4, refuse_reason = $5,
                    notes = $6, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*reason)
            .bind(notes.as_deref()),
            TransitionUpdate::RequestReturn {
                actor_id,
                return_condition,
                accessories_returned,
            } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, return_requested_at = NOW(), return_requested_by = $4,
                    return_condition = $5, accessories_returned = $6, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*return_condition)
            .bind(*accessories_returned),
            TransitionUpdate::ApproveReturn {
                actor_id,
                final_condition,
                final_accessories,
                notes,
            } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, returned_at = NOW(), approved_by = $4,
                    final_condition = $5, final_accessories = $6, notes = $7, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*final_condition)
            .bind(*final_accessories)
            .bind(notes.as_deref()),
            TransitionUpdate::RejectReturn { actor_id, reason, notes } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, rejected_at = NOW(), rejected_by = $4, reject_reason = $5,
                    notes = $6, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*reason)
            .bind(notes.as_deref()),
            TransitionUpdate::Cancel { actor_id } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, cancelled_at = NOW(), cancelled_by = $4, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id),
            TransitionUpdate::Revert { actor_id, reason, notes } => sqlx::query_as(
                r#"
                UPDATE assignments
                SET status = $3, reverted_at = NOW(), reverted_by = $4, revert_reason = $5,
                    notes = $6, modif_date = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(*actor_id)
            .bind(*reason)
            .bind(notes.as_deref()),
        };

        query
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState(format!(
                    "Assignment {} is no longer {}",
                    id, from
                ))
            })?
            .try_into()
    }

    /// Hard-delete an assignment row
    pub async fn delete(conn: &mut PgConnection, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Assignment with id {} not found", id)));
        }
        Ok(())
    }
}
