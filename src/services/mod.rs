//! Business logic services

pub mod asset_status;
pub mod assets;
pub mod assignments;
pub mod bundle;
pub mod conflict_guard;
pub mod notifications;

use std::sync::Arc;

use crate::{config::AssignmentsConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub assets: assets::AssetsService,
    pub assignments: assignments::AssignmentsService,
}

impl Services {
    /// Create all services with the given repository, publishing to the database
    pub fn new(repository: Repository, assignments_config: AssignmentsConfig) -> Self {
        let publisher = Arc::new(notifications::PgNotificationPublisher::new(repository.clone()));
        Self::with_publisher(repository, assignments_config, publisher)
    }

    /// Create all services with a custom notification publisher
    pub fn with_publisher(
        repository: Repository,
        assignments_config: AssignmentsConfig,
        publisher: Arc<dyn notifications::NotificationPublisher>,
    ) -> Self {
        Self {
            assets: assets::AssetsService::new(repository.clone()),
            assignments: assignments::AssignmentsService::new(repository, assignments_config, publisher),
        }
    }
}
