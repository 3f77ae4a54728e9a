//! Custody Server
//!
//! Assignment lifecycle engine for IT assets: issuing devices to staff,
//! locations and departments, receiver acceptance, returns and
//! administrative reverts, served as a REST JSON API over PostgreSQL.

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: Pool<Postgres>,
}
