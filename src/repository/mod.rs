//! Repository layer for database operations
//!
//! Plain reads go through the pool and never lock. Every mutating statement
//! takes an explicit `&mut PgConnection`, normally borrowed from a
//! transaction opened with [`Repository::begin`], so callers decide the
//! transaction boundaries and tests can drive them directly.

pub mod assets;
pub mod assignments;
pub mod notifications;
pub mod staff;

use sqlx::{Pool, Postgres, Transaction};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub assets: assets::AssetsRepository,
    pub assignments: assignments::AssignmentsRepository,
    pub staff: staff::StaffRepository,
    pub notifications: notifications::NotificationsRepository,
    lock_timeout_ms: Option<u64>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            assets: assets::AssetsRepository::new(pool.clone()),
            assignments: assignments::AssignmentsRepository::new(pool.clone()),
            staff: staff::StaffRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            pool,
            lock_timeout_ms: None,
        }
    }

    /// Bound the time a transaction may wait on a row lock
    pub fn with_lock_timeout(mut self, lock_timeout_ms: Option<u64>) -> Self {
        self.lock_timeout_ms = lock_timeout_ms;
        self
    }

    /// Open a transaction; dropping it without commit rolls everything back
    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        if let Some(ms) = self.lock_timeout_ms {
            // SET does not accept bind parameters
            sqlx::query(&format!("SET LOCAL lock_timeout = {}", ms))
                .execute(&mut *tx)
                .await?;
        }
        Ok(tx)
    }
}
