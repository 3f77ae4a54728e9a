//! Assignment (custody record) model and lifecycle types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::asset::AssetStatus;
use crate::error::{AppError, AppResult};

/// Separator between entries of the append-only notes log
pub const NOTE_DELIMITER: &str = "\n---\n";

/// Opaque condition / accessories payload, stored as JSONB and never inspected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(transparent)]
#[sqlx(transparent)]
#[schema(value_type = Object)]
pub struct Document(pub serde_json::Value);

/// Assignment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    PendingAcceptance,
    Active,
    Refused,
    ReturnRequested,
    ReturnApproved,
    ReturnRejected,
    Cancelled,
    Reverted,
}

impl AssignmentStatus {
    /// Statuses that keep the asset spoken for
    pub const OPEN: [AssignmentStatus; 4] = [
        AssignmentStatus::PendingAcceptance,
        AssignmentStatus::Active,
        AssignmentStatus::ReturnRequested,
        AssignmentStatus::ReturnRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::PendingAcceptance => "PENDING_ACCEPTANCE",
            AssignmentStatus::Active => "ACTIVE",
            AssignmentStatus::Refused => "REFUSED",
            AssignmentStatus::ReturnRequested => "RETURN_REQUESTED",
            AssignmentStatus::ReturnApproved => "RETURN_APPROVED",
            AssignmentStatus::ReturnRejected => "RETURN_REJECTED",
            AssignmentStatus::Cancelled => "CANCELLED",
            AssignmentStatus::Reverted => "REVERTED",
        }
    }

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Text form of the open set, for `status = ANY($n)` binds
    pub fn open_set() -> Vec<&'static str> {
        Self::OPEN.iter().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING_ACCEPTANCE" => Ok(AssignmentStatus::PendingAcceptance),
            "ACTIVE" => Ok(AssignmentStatus::Active),
            "REFUSED" => Ok(AssignmentStatus::Refused),
            "RETURN_REQUESTED" => Ok(AssignmentStatus::ReturnRequested),
            "RETURN_APPROVED" => Ok(AssignmentStatus::ReturnApproved),
            "RETURN_REJECTED" => Ok(AssignmentStatus::ReturnRejected),
            "CANCELLED" => Ok(AssignmentStatus::Cancelled),
            "REVERTED" => Ok(AssignmentStatus::Reverted),
            _ => Err(format!("Invalid assignment status: {}", s)),
        }
    }
}

text_enum_sqlx!(AssignmentStatus);

/// Who may perform a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    Receiver,
    Admin,
}

/// Requested state change on an existing assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Refuse,
    Cancel,
    RequestReturn,
    ApproveReturn,
    RejectReturn,
    Revert,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Refuse => "refuse",
            Transition::Cancel => "cancel",
            Transition::RequestReturn => "request_return",
            Transition::ApproveReturn => "approve_return",
            Transition::RejectReturn => "reject_return",
            Transition::Revert => "revert",
        }
    }

    pub fn actor(&self) -> TransitionActor {
        match self {
            Transition::Accept | Transition::Refuse | Transition::RequestReturn => {
                TransitionActor::Receiver
            }
            Transition::Cancel
            | Transition::ApproveReturn
            | Transition::RejectReturn
            | Transition::Revert => TransitionActor::Admin,
        }
    }

    pub fn allowed_from(&self) -> &'static [AssignmentStatus] {
        use AssignmentStatus::*;
        match self {
            Transition::Accept | Transition::Refuse | Transition::Cancel => &[PendingAcceptance],
            Transition::RequestReturn => &[Active, ReturnRejected],
            Transition::ApproveReturn | Transition::RejectReturn => &[ReturnRequested],
            Transition::Revert => &AssignmentStatus::OPEN,
        }
    }

    pub fn target(&self) -> AssignmentStatus {
        match self {
            Transition::Accept => AssignmentStatus::Active,
            Transition::Refuse => AssignmentStatus::Refused,
            Transition::Cancel => AssignmentStatus::Cancelled,
            Transition::RequestReturn => AssignmentStatus::ReturnRequested,
            Transition::ApproveReturn => AssignmentStatus::ReturnApproved,
            Transition::RejectReturn => AssignmentStatus::ReturnRejected,
            Transition::Revert => AssignmentStatus::Reverted,
        }
    }

    /// Validate `current` against this transition, yielding the next status
    pub fn apply(&self, current: AssignmentStatus) -> AppResult<AssignmentStatus> {
        if self.allowed_from().contains(&current) {
            Ok(self.target())
        } else {
            Err(AppError::InvalidState(format!(
                "Cannot {} an assignment in status {}",
                self.name(),
                current
            )))
        }
    }
}

/// Kind of custody target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetType {
    Staff,
    Location,
    Department,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Staff => "STAFF",
            TargetType::Location => "LOCATION",
            TargetType::Department => "DEPARTMENT",
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STAFF" => Ok(TargetType::Staff),
            "LOCATION" => Ok(TargetType::Location),
            "DEPARTMENT" => Ok(TargetType::Department),
            _ => Err(format!("Invalid target type: {}", s)),
        }
    }
}

text_enum_sqlx!(TargetType);

/// Custody target: exactly one of staff member, location or department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "target_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentTarget {
    Staff { staff_id: i32 },
    Location { location: String },
    Department { department: String },
}

impl AssignmentTarget {
    pub fn target_type(&self) -> TargetType {
        match self {
            AssignmentTarget::Staff { .. } => TargetType::Staff,
            AssignmentTarget::Location { .. } => TargetType::Location,
            AssignmentTarget::Department { .. } => TargetType::Department,
        }
    }

    /// Reject blank location / department names
    pub fn validate(&self) -> AppResult<()> {
        match self {
            AssignmentTarget::Staff { staff_id } if *staff_id <= 0 => Err(AppError::Validation(
                format!("Invalid staff id {}", staff_id),
            )),
            AssignmentTarget::Location { location } if location.trim().is_empty() => Err(
                AppError::Validation("Location target requires a location".to_string()),
            ),
            AssignmentTarget::Department { department } if department.trim().is_empty() => Err(
                AppError::Validation("Department target requires a department".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Column values (staff_id, location, department)
    pub fn columns(&self) -> (Option<i32>, Option<&str>, Option<&str>) {
        match self {
            AssignmentTarget::Staff { staff_id } => (Some(*staff_id), None, None),
            AssignmentTarget::Location { location } => (None, Some(location.trim()), None),
            AssignmentTarget::Department { department } => (None, None, Some(department.trim())),
        }
    }
}

/// Internal row structure for assignment queries
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    id: i32,
    asset_id: i32,
    group_id: Option<Uuid>,
    target_type: TargetType,
    staff_id: Option<i32>,
    location: Option<String>,
    department: Option<String>,
    receiver_user_id: Option<i32>,
    status: AssignmentStatus,
    assigned_by: i32,
    assigned_at: DateTime<Utc>,
    terms_version: Option<String>,
    accepted_at: Option<DateTime<Utc>>,
    accepted_by: Option<i32>,
    refused_at: Option<DateTime<Utc>>,
    refused_by: Option<i32>,
    refuse_reason: Option<String>,
    return_requested_at: Option<DateTime<Utc>>,
    return_requested_by: Option<i32>,
    returned_at: Option<DateTime<Utc>>,
    approved_by: Option<i32>,
    rejected_at: Option<DateTime<Utc>>,
    rejected_by: Option<i32>,
    reject_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<i32>,
    reverted_at: Option<DateTime<Utc>>,
    reverted_by: Option<i32>,
    revert_reason: Option<String>,
    issue_condition: Option<Document>,
    accessories_issued: Option<Document>,
    return_condition: Option<Document>,
    accessories_returned: Option<Document>,
    final_condition: Option<Document>,
    final_accessories: Option<Document>,
    notes: Option<String>,
    modif_date: DateTime<Utc>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = AppError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            AppError::Internal(format!("Assignment {} has no {} for its target", row.id, what))
        };
        let target = match row.target_type {
            TargetType::Staff => AssignmentTarget::Staff {
                staff_id: row.staff_id.ok_or_else(|| corrupt("staff_id"))?,
            },
            TargetType::Location => AssignmentTarget::Location {
                location: row.location.clone().ok_or_else(|| corrupt("location"))?,
            },
            TargetType::Department => AssignmentTarget::Department {
                department: row.department.clone().ok_or_else(|| corrupt("department"))?,
            },
        };

        Ok(Assignment {
            id: row.id,
            asset_id: row.asset_id,
            group_id: row.group_id,
            target,
            receiver_user_id: row.receiver_user_id,
            status: row.status,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            terms_version: row.terms_version,
            accepted_at: row.accepted_at,
            accepted_by: row.accepted_by,
            refused_at: row.refused_at,
            refused_by: row.refused_by,
            refuse_reason: row.refuse_reason,
            return_requested_at: row.return_requested_at,
            return_requested_by: row.return_requested_by,
            returned_at: row.returned_at,
            approved_by: row.approved_by,
            rejected_at: row.rejected_at,
            rejected_by: row.rejected_by,
            reject_reason: row.reject_reason,
            cancelled_at: row.cancelled_at,
            cancelled_by: row.cancelled_by,
            reverted_at: row.reverted_at,
            reverted_by: row.reverted_by,
            revert_reason: row.revert_reason,
            issue_condition: row.issue_condition,
            accessories_issued: row.accessories_issued,
            return_condition: row.return_condition,
            accessories_returned: row.accessories_returned,
            final_condition: row.final_condition,
            final_accessories: row.final_accessories,
            notes: row.notes,
            modif_date: row.modif_date,
        })
    }
}

/// Assignment of one asset to one custody target
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    pub id: i32,
    pub asset_id: i32,
    /// Shared by every row created in the same bundle
    pub group_id: Option<Uuid>,
    #[serde(flatten)]
    pub target: AssignmentTarget,
    /// Account that accepts, refuses and returns (STAFF targets only)
    pub receiver_user_id: Option<i32>,
    pub status: AssignmentStatus,
    pub assigned_by: i32,
    pub assigned_at: DateTime<Utc>,
    pub terms_version: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<i32>,
    pub refused_at: Option<DateTime<Utc>>,
    pub refused_by: Option<i32>,
    pub refuse_reason: Option<String>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub return_requested_by: Option<i32>,
    pub returned_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i32>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<i32>,
    pub reject_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i32>,
    pub reverted_at: Option<DateTime<Utc>>,
    pub reverted_by: Option<i32>,
    pub revert_reason: Option<String>,
    pub issue_condition: Option<Document>,
    pub accessories_issued: Option<Document>,
    pub return_condition: Option<Document>,
    pub accessories_returned: Option<Document>,
    pub final_condition: Option<Document>,
    pub final_accessories: Option<Document>,
    pub notes: Option<String>,
    pub modif_date: DateTime<Utc>,
}

/// Result of a create request: the primary assignment and its bundle siblings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedAssignment {
    pub assignment: Assignment,
    /// Peripheral assignments sharing `assignment.group_id`, ascending asset id
    pub bundle: Vec<Assignment>,
}

/// Append `entry` to a notes log, ignoring blank entries
pub fn append_note(existing: Option<&str>, entry: Option<&str>) -> Option<String> {
    let entry = entry.map(str::trim).filter(|e| !e.is_empty());
    match (existing.filter(|e| !e.is_empty()), entry) {
        (Some(log), Some(entry)) => Some(format!("{}{}{}", log, NOTE_DELIMITER, entry)),
        (None, Some(entry)) => Some(entry.to_string()),
        (log, None) => log.map(str::to_string),
    }
}

/// Create assignment request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAssignment {
    pub asset_id: i32,
    pub target: AssignmentTarget,
    /// Peripheral assets bundled with a hub asset (STAFF targets only)
    #[serde(default)]
    pub bundle_asset_ids: Vec<i32>,
    pub issue_condition: Option<Document>,
    pub accessories_issued: Option<Document>,
    pub notes: Option<String>,
}

/// Receiver acceptance request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AcceptAssignment {
    #[validate(length(min = 1, message = "Terms version is required"))]
    pub terms_version: String,
    /// One flag per required term, all of which must be true
    pub accepted_flags: Vec<bool>,
}

/// Receiver refusal request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefuseAssignment {
    pub reason: Option<String>,
}

/// Receiver return request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RequestReturn {
    pub return_condition: Option<Document>,
    pub accessories_returned: Option<Document>,
}

/// Administrator approval of a return
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApproveReturn {
    pub final_condition: Document,
    pub final_accessories: Document,
    /// IN_STOCK or IN_REPAIR
    pub next_asset_status: AssetStatus,
    pub decision_note: Option<String>,
}

impl ApproveReturn {
    /// Both final payloads must be present; JSON null counts as missing
    pub fn validate(&self) -> AppResult<()> {
        for (field, document) in [
            ("final_condition", &self.final_condition),
            ("final_accessories", &self.final_accessories),
        ] {
            if document.0.is_null() {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
        }
        Ok(())
    }
}

/// Administrator rejection of a return
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RejectReturn {
    #[validate(length(min = 1, message = "A rejection reason is required"))]
    pub reason: String,
}

/// Administrator revert request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RevertAssignment {
    pub reason: Option<String>,
}

/// Assignment list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AssignmentQuery {
    pub asset_id: Option<i32>,
    pub status: Option<AssignmentStatus>,
    pub receiver_user_id: Option<i32>,
    pub group_id: Option<Uuid>,
    /// Only assignments in the open set
    pub open_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Default page size for assignment listings
pub const DEFAULT_PER_PAGE: i64 = 50;
/// Largest page size a caller may request
pub const MAX_PER_PAGE: i64 = 500;

/// Resolved page window for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl AssignmentQuery {
    /// Clamp the requested page window; pages whose offset overflows are rejected
    pub fn pagination(&self) -> AppResult<Pagination> {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::Validation(format!("Page {} is out of range", page)))?;
        Ok(Pagination {
            page,
            per_page,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssignmentStatus::*;

    const ALL: [AssignmentStatus; 8] = [
        PendingAcceptance,
        Active,
        Refused,
        ReturnRequested,
        ReturnApproved,
        ReturnRejected,
        Cancelled,
        Reverted,
    ];

    const TRANSITIONS: [Transition; 7] = [
        Transition::Accept,
        Transition::Refuse,
        Transition::Cancel,
        Transition::RequestReturn,
        Transition::ApproveReturn,
        Transition::RejectReturn,
        Transition::Revert,
    ];

    #[test]
    fn terminal_states_never_transition() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for transition in TRANSITIONS {
                let err = transition.apply(*status).unwrap_err();
                assert!(matches!(err, AppError::InvalidState(_)), "{:?} from {}", transition, status);
            }
        }
    }

    #[test]
    fn open_set_matches_non_terminal_states() {
        let open: Vec<_> = ALL.iter().filter(|s| s.is_open()).copied().collect();
        assert_eq!(open, AssignmentStatus::OPEN.to_vec());
        assert_eq!(
            AssignmentStatus::open_set(),
            vec!["PENDING_ACCEPTANCE", "ACTIVE", "RETURN_REQUESTED", "RETURN_REJECTED"]
        );
    }

    #[test]
    fn happy_path_walks_the_table() {
        let s = Transition::Accept.apply(PendingAcceptance).unwrap();
        assert_eq!(s, Active);
        let s = Transition::RequestReturn.apply(s).unwrap();
        assert_eq!(s, ReturnRequested);
        let s = Transition::RejectReturn.apply(s).unwrap();
        assert_eq!(s, ReturnRejected);
        let s = Transition::RequestReturn.apply(s).unwrap();
        let s = Transition::ApproveReturn.apply(s).unwrap();
        assert_eq!(s, ReturnApproved);
    }

    #[test]
    fn revert_is_allowed_from_every_open_state_only() {
        for status in ALL {
            assert_eq!(Transition::Revert.apply(status).is_ok(), status.is_open());
        }
    }

    #[test]
    fn accept_requires_pending() {
        assert!(Transition::Accept.apply(Active).is_err());
        assert!(Transition::Cancel.apply(Active).is_err());
        assert!(Transition::ApproveReturn.apply(Active).is_err());
    }

    #[test]
    fn actors_split_between_receiver_and_admin() {
        assert_eq!(Transition::Refuse.actor(), TransitionActor::Receiver);
        assert_eq!(Transition::RequestReturn.actor(), TransitionActor::Receiver);
        assert_eq!(Transition::Cancel.actor(), TransitionActor::Admin);
        assert_eq!(Transition::Revert.actor(), TransitionActor::Admin);
    }

    #[test]
    fn target_deserializes_as_tagged_union() {
        let target: AssignmentTarget =
            serde_json::from_str(r#"{"target_type":"LOCATION","location":"HQ-2F"}"#).unwrap();
        assert_eq!(target, AssignmentTarget::Location { location: "HQ-2F".into() });
        assert_eq!(target.columns(), (None, Some("HQ-2F"), None));

        let missing = serde_json::from_str::<AssignmentTarget>(r#"{"target_type":"STAFF"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn blank_targets_are_rejected() {
        let target = AssignmentTarget::Department { department: "  ".into() };
        assert!(matches!(target.validate(), Err(AppError::Validation(_))));
        assert!(AssignmentTarget::Staff { staff_id: 7 }.validate().is_ok());
    }

    #[test]
    fn notes_log_appends_with_delimiter() {
        assert_eq!(append_note(None, Some(" first ")), Some("first".to_string()));
        assert_eq!(
            append_note(Some("first"), Some("second")),
            Some(format!("first{}second", NOTE_DELIMITER))
        );
        assert_eq!(append_note(Some("first"), Some("   ")), Some("first".to_string()));
        assert_eq!(append_note(None, None), None);
    }

    #[test]
    fn pagination_clamps_the_window() {
        let window = AssignmentQuery::default().pagination().unwrap();
        assert_eq!(window, Pagination { page: 1, per_page: DEFAULT_PER_PAGE, offset: 0 });

        let query = AssignmentQuery {
            page: Some(3),
            per_page: Some(10_000),
            ..Default::default()
        };
        let window = query.pagination().unwrap();
        assert_eq!(window.per_page, MAX_PER_PAGE);
        assert_eq!(window.offset, 2 * MAX_PER_PAGE);

        let query = AssignmentQuery {
            page: Some(-4),
            per_page: Some(0),
            ..Default::default()
        };
        assert_eq!(query.pagination().unwrap(), Pagination { page: 1, per_page: 1, offset: 0 });
    }

    #[test]
    fn huge_page_is_a_validation_error() {
        let query = AssignmentQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(query.pagination(), Err(AppError::Validation(_))));
    }

    #[test]
    fn approval_requires_final_payloads() {
        let request: ApproveReturn = serde_json::from_str(
            r#"{"final_condition":null,"final_accessories":{"charger":true},"next_asset_status":"IN_STOCK"}"#,
        )
        .unwrap();
        match request.validate() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("final_condition")),
            other => panic!("expected a validation error, got {:?}", other),
        }

        let request: ApproveReturn = serde_json::from_str(
            r#"{"final_condition":{},"final_accessories":null,"next_asset_status":"IN_STOCK"}"#,
        )
        .unwrap();
        match request.validate() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("final_accessories")),
            other => panic!("expected a validation error, got {:?}", other),
        }

        let request: ApproveReturn = serde_json::from_str(
            r#"{"final_condition":{},"final_accessories":[],"next_asset_status":"IN_REPAIR"}"#,
        )
        .unwrap();
        assert!(request.validate().is_ok());
    }
}
