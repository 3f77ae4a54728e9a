//! Notification and activity log types written after a transition commits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// What happened to an assignment, as recorded in notifications and the activity log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    Assigned,
    Accepted,
    Refused,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Cancelled,
    Reverted,
    Deleted,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Assigned => "ASSIGNED",
            LifecycleEvent::Accepted => "ACCEPTED",
            LifecycleEvent::Refused => "REFUSED",
            LifecycleEvent::ReturnRequested => "RETURN_REQUESTED",
            LifecycleEvent::ReturnApproved => "RETURN_APPROVED",
            LifecycleEvent::ReturnRejected => "RETURN_REJECTED",
            LifecycleEvent::Cancelled => "CANCELLED",
            LifecycleEvent::Reverted => "REVERTED",
            LifecycleEvent::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASSIGNED" => Ok(LifecycleEvent::Assigned),
            "ACCEPTED" => Ok(LifecycleEvent::Accepted),
            "REFUSED" => Ok(LifecycleEvent::Refused),
            "RETURN_REQUESTED" => Ok(LifecycleEvent::ReturnRequested),
            "RETURN_APPROVED" => Ok(LifecycleEvent::ReturnApproved),
            "RETURN_REJECTED" => Ok(LifecycleEvent::ReturnRejected),
            "CANCELLED" => Ok(LifecycleEvent::Cancelled),
            "REVERTED" => Ok(LifecycleEvent::Reverted),
            "DELETED" => Ok(LifecycleEvent::Deleted),
            _ => Err(format!("Invalid lifecycle event: {}", s)),
        }
    }
}

text_enum_sqlx!(LifecycleEvent);

/// Post-commit fan-out for one lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotice {
    pub event: LifecycleEvent,
    pub actor_id: i32,
    pub asset_id: i32,
    /// None once the assignment row has been deleted
    pub assignment_id: Option<i32>,
    /// Users to notify
    pub recipients: Vec<i32>,
}

/// Notification row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub kind: LifecycleEvent,
    pub asset_id: Option<i32>,
    pub assignment_id: Option<i32>,
    pub is_read: bool,
    pub crea_date: DateTime<Utc>,
}
