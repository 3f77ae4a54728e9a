//! Post-commit notification publisher
//!
//! Notifications and activity entries are written after the lifecycle
//! transaction has committed, on a detached task. Failures are logged and
//! dropped: they never undo or delay a committed transition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::notification::{LifecycleEvent, LifecycleNotice},
    repository::Repository,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Mark earlier notifications about an assignment as read
    async fn mark_related_read(&self, assignment_id: i32) -> AppResult<()>;

    /// Notify one user of a lifecycle event
    async fn notify(
        &self,
        user_id: i32,
        event: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()>;

    /// Append to the asset's activity log
    async fn record_activity(
        &self,
        actor_id: i32,
        event: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()>;
}

/// Publisher backed by the `notifications` and `activity_logs` tables
#[derive(Clone)]
pub struct PgNotificationPublisher {
    repository: Repository,
}

impl PgNotificationPublisher {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl NotificationPublisher for PgNotificationPublisher {
    async fn mark_related_read(&self, assignment_id: i32) -> AppResult<()> {
        self.repository
            .notifications
            .mark_read_for_assignment(assignment_id)
            .await?;
        Ok(())
    }

    async fn notify(
        &self,
        user_id: i32,
        event: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()> {
        self.repository
            .notifications
            .insert(user_id, event, asset_id, assignment_id)
            .await
    }

    async fn record_activity(
        &self,
        actor_id: i32,
        event: LifecycleEvent,
        asset_id: i32,
        assignment_id: Option<i32>,
    ) -> AppResult<()> {
        self.repository
            .notifications
            .record_activity(actor_id, event, asset_id, assignment_id)
            .await
    }
}

/// Hand a notice to the publisher without waiting for it
pub fn dispatch(publisher: Arc<dyn NotificationPublisher>, notice: LifecycleNotice) {
    tokio::spawn(async move {
        deliver(publisher.as_ref(), &notice).await;
    });
}

/// Deliver one notice, logging and skipping any step that fails
pub async fn deliver(publisher: &dyn NotificationPublisher, notice: &LifecycleNotice) {
    if let Some(assignment_id) = notice.assignment_id {
        if let Err(e) = publisher.mark_related_read(assignment_id).await {
            tracing::warn!(assignment_id, "Failed to mark notifications read: {}", e);
        }
    }

    for &user_id in notice.recipients.iter().filter(|&&id| id != notice.actor_id) {
        if let Err(e) = publisher
            .notify(user_id, notice.event, notice.asset_id, notice.assignment_id)
            .await
        {
            tracing::warn!(user_id, event = %notice.event, "Failed to notify user: {}", e);
        }
    }

    if let Err(e) = publisher
        .record_activity(notice.actor_id, notice.event, notice.asset_id, notice.assignment_id)
        .await
    {
        tracing::warn!(asset_id = notice.asset_id, "Failed to record activity: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use mockall::predicate::eq;

    fn notice(event: LifecycleEvent, recipients: Vec<i32>) -> LifecycleNotice {
        LifecycleNotice {
            event,
            actor_id: 1,
            asset_id: 10,
            assignment_id: Some(100),
            recipients,
        }
    }

    #[tokio::test]
    async fn delivers_to_recipients_but_not_the_actor() {
        let mut publisher = MockNotificationPublisher::new();
        publisher
            .expect_mark_related_read()
            .with(eq(100))
            .times(1)
            .returning(|_| Ok(()));
        publisher
            .expect_notify()
            .with(eq(7), eq(LifecycleEvent::Assigned), eq(10), eq(Some(100)))
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        publisher
            .expect_record_activity()
            .with(eq(1), eq(LifecycleEvent::Assigned), eq(10), eq(Some(100)))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        deliver(&publisher, &notice(LifecycleEvent::Assigned, vec![7, 1])).await;
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_steps() {
        let mut publisher = MockNotificationPublisher::new();
        publisher
            .expect_mark_related_read()
            .returning(|_| Err(AppError::Internal("down".into())));
        publisher
            .expect_notify()
            .times(2)
            .returning(|_, _, _, _| Err(AppError::Internal("down".into())));
        publisher
            .expect_record_activity()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        deliver(&publisher, &notice(LifecycleEvent::Reverted, vec![7, 8])).await;
    }

    #[tokio::test]
    async fn deleted_assignments_skip_mark_read() {
        let mut publisher = MockNotificationPublisher::new();
        publisher.expect_mark_related_read().never();
        publisher.expect_notify().times(1).returning(|_, _, _, _| Ok(()));
        publisher
            .expect_record_activity()
            .with(eq(1), eq(LifecycleEvent::Deleted), eq(10), eq(None))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut n = notice(LifecycleEvent::Deleted, vec![7]);
        n.assignment_id = None;
        deliver(&publisher, &n).await;
    }
}
