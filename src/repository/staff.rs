//! Staff directory lookups

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::Staff,
};

#[derive(Clone)]
pub struct StaffRepository {
    pool: Pool<Postgres>,
}

impl StaffRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get staff member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Staff> {
        sqlx::query_as::<_, Staff>("SELECT id, full_name, department, user_id FROM staff WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff member with id {} not found", id)))
    }

    /// Account linked to a staff member, i.e. the receiver of their assignments
    pub async fn linked_user(conn: &mut PgConnection, staff_id: i32) -> AppResult<Option<i32>> {
        sqlx::query_scalar::<_, Option<i32>>("SELECT user_id FROM staff WHERE id = $1")
            .bind(staff_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff member with id {} not found", staff_id)))
    }
}
