//! Assignment lifecycle engine
//!
//! Every mutating operation runs in one transaction: the owning asset row is
//! locked first, then the assignment row is re-read under lock and its
//! persisted status re-validated before the transition is written. Any error
//! returns early and the dropped transaction rolls back. Notifications go
//! out only after commit.

use std::sync::Arc;

use sqlx::{PgConnection, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::{
    asset_status,
    bundle::{self, IssuePayload},
    conflict_guard,
    notifications::{self, NotificationPublisher},
};
use crate::{
    config::AssignmentsConfig,
    error::{AppError, AppResult},
    models::{
        asset::AssetStatus,
        assignment::{
            append_note, AcceptAssignment, ApproveReturn, Assignment, AssignmentQuery,
            AssignmentStatus, AssignmentTarget, CreateAssignment, CreatedAssignment, Pagination,
            RefuseAssignment, RejectReturn, RequestReturn, RevertAssignment, Transition,
            TransitionActor,
        },
        notification::{LifecycleEvent, LifecycleNotice},
        user::Actor,
    },
    repository::{
        assets::AssetsRepository,
        assignments::{AssignmentsRepository, TransitionUpdate},
        staff::StaffRepository,
        Repository,
    },
};

#[derive(Clone)]
pub struct AssignmentsService {
    repository: Repository,
    config: AssignmentsConfig,
    publisher: Arc<dyn NotificationPublisher>,
}

/// Initial status of a new assignment
pub fn initial_status(config: &AssignmentsConfig, target: &AssignmentTarget) -> AssignmentStatus {
    match target {
        AssignmentTarget::Staff { .. } if config.require_staff_acceptance => {
            AssignmentStatus::PendingAcceptance
        }
        _ => AssignmentStatus::Active,
    }
}

/// Terms acknowledgement rules for accept
pub fn check_terms(config: &AssignmentsConfig, request: &AcceptAssignment) -> AppResult<()> {
    request.validate()?;
    if request.terms_version != config.terms_version {
        return Err(AppError::Validation(format!(
            "Terms version {} is not the current version {}",
            request.terms_version, config.terms_version
        )));
    }
    if request.accepted_flags.len() < config.required_terms {
        return Err(AppError::Validation(format!(
            "{} terms must be accepted, got {}",
            config.required_terms,
            request.accepted_flags.len()
        )));
    }
    if let Some(idx) = request.accepted_flags.iter().position(|accepted| !accepted) {
        return Err(AppError::Validation(format!("Term {} was not accepted", idx + 1)));
    }
    Ok(())
}

fn authorize(actor: &Actor, transition: Transition, assignment: &Assignment) -> AppResult<()> {
    match transition.actor() {
        TransitionActor::Receiver => actor.require_receiver(assignment.id, assignment.receiver_user_id),
        TransitionActor::Admin => actor.require_admin(),
    }
}

impl AssignmentsService {
    pub fn new(
        repository: Repository,
        config: AssignmentsConfig,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            repository,
            config,
            publisher,
        }
    }

    /// Get assignment by ID
    pub async fn get(&self, id: i32) -> AppResult<Assignment> {
        self.repository.assignments.get_by_id(id).await
    }

    /// List assignments, with the page window actually applied
    pub async fn list(
        &self,
        query: &AssignmentQuery,
    ) -> AppResult<(Vec<Assignment>, i64, Pagination)> {
        let pagination = query.pagination()?;
        let (rows, total) = self.repository.assignments.list(query, pagination).await?;
        Ok((rows, total, pagination))
    }

    /// All assignments of a bundle
    pub async fn list_bundle(&self, group_id: Uuid) -> AppResult<Vec<Assignment>> {
        let rows = self.repository.assignments.list_group(group_id).await?;
        if rows.is_empty() {
            return Err(AppError::NotFound(format!("Bundle {} not found", group_id)));
        }
        Ok(rows)
    }

    /// Assign an asset, optionally bundled with peripherals, to a custody target
    pub async fn create_assignment(
        &self,
        actor: &Actor,
        request: &CreateAssignment,
    ) -> AppResult<CreatedAssignment> {
        actor.require_admin()?;
        request.target.validate()?;

        let mut tx = self.repository.begin().await?;

        let receiver_user_id = match &request.target {
            AssignmentTarget::Staff { staff_id } => {
                let user_id = StaffRepository::linked_user(&mut tx, *staff_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "Staff member {} has no linked account to receive the assignment",
                            staff_id
                        ))
                    })?;
                Some(user_id)
            }
            _ => None,
        };

        let plan = bundle::plan(
            &mut tx,
            &self.config,
            &request.target,
            request.asset_id,
            &request.bundle_asset_ids,
        )
        .await?;

        let status = initial_status(&self.config, &request.target);
        let mut rows = bundle::insert_rows(
            &mut tx,
            &plan,
            &request.target,
            receiver_user_id,
            status,
            actor.user_id,
            IssuePayload {
                issue_condition: request.issue_condition.as_ref(),
                accessories_issued: request.accessories_issued.as_ref(),
                notes: request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            },
        )
        .await?;

        if status == AssignmentStatus::Active {
            for asset_id in plan.asset_ids() {
                AssetsRepository::update_status(&mut tx, asset_id, AssetStatus::Assigned).await?;
            }
        }

        tx.commit().await?;

        for row in &rows {
            tracing::info!(
                assignment_id = row.id,
                asset_id = row.asset_id,
                group_id = ?row.group_id,
                status = %row.status,
                actor_id = actor.user_id,
                "Assignment created"
            );
            self.publish(LifecycleEvent::Assigned, actor, row.asset_id, Some(row.id), row.receiver_user_id);
        }

        let assignment = rows.remove(0);
        Ok(CreatedAssignment {
            assignment,
            bundle: rows,
        })
    }

    /// Receiver accepts custody and the required terms
    pub async fn accept_assignment(
        &self,
        id: i32,
        actor: &Actor,
        request: &AcceptAssignment,
    ) -> AppResult<Assignment> {
        check_terms(&self.config, request)?;

        let (mut tx, current) = self.begin_transition(id, actor, Transition::Accept).await?;

        let asset = AssetsRepository::lock_for_update(&mut tx, &[current.asset_id])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Asset with id {} not found", current.asset_id)))?;
        if asset.status.is_sticky() {
            return Err(AppError::Conflict(format!(
                "Asset {} is {} and cannot be taken into custody",
                asset.id, asset.status
            )));
        }
        let others = AssignmentsRepository::find_open(&mut tx, &[current.asset_id], Some(id)).await?;
        if let Some((_, other_id)) = others.first() {
            return Err(AppError::Conflict(format!(
                "Asset {} already has open assignment {}",
                current.asset_id, other_id
            )));
        }

        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::Accept {
                actor_id: actor.user_id,
                terms_version: &request.terms_version,
            },
        )
        .await?;
        AssetsRepository::update_status(&mut tx, current.asset_id, AssetStatus::Assigned).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::Accepted, Some(current.assigned_by))
            .await
    }

    /// Receiver declines custody
    pub async fn refuse_assignment(
        &self,
        id: i32,
        actor: &Actor,
        request: &RefuseAssignment,
    ) -> AppResult<Assignment> {
        let (mut tx, current) = self.begin_transition(id, actor, Transition::Refuse).await?;

        let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::Refuse {
                actor_id: actor.user_id,
                reason,
                notes: append_note(current.notes.as_deref(), reason),
            },
        )
        .await?;
        asset_status::resync(&mut tx, current.asset_id).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::Refused, Some(current.assigned_by))
            .await
    }

    /// Receiver asks to hand the asset back
    pub async fn request_return(
        &self,
        id: i32,
        actor: &Actor,
        request: &RequestReturn,
    ) -> AppResult<Assignment> {
        let (mut tx, current) = self.begin_transition(id, actor, Transition::RequestReturn).await?;

        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::RequestReturn {
                actor_id: actor.user_id,
                return_condition: request.return_condition.as_ref(),
                accessories_returned: request.accessories_returned.as_ref(),
            },
        )
        .await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::ReturnRequested, Some(current.assigned_by))
            .await
    }

    /// Administrator closes a return and chooses where the asset goes next
    pub async fn approve_return(
        &self,
        id: i32,
        actor: &Actor,
        request: &ApproveReturn,
    ) -> AppResult<Assignment> {
        request.validate()?;
        let next = asset_status::validate_return_status(request.next_asset_status)?;

        let (mut tx, current) = self.begin_transition(id, actor, Transition::ApproveReturn).await?;

        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::ApproveReturn {
                actor_id: actor.user_id,
                final_condition: &request.final_condition,
                final_accessories: &request.final_accessories,
                notes: append_note(current.notes.as_deref(), request.decision_note.as_deref()),
            },
        )
        .await?;
        AssetsRepository::update_status(&mut tx, current.asset_id, next).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::ReturnApproved, current.receiver_user_id)
            .await
    }

    /// Administrator refuses a return; the receiver keeps custody
    pub async fn reject_return(
        &self,
        id: i32,
        actor: &Actor,
        request: &RejectReturn,
    ) -> AppResult<Assignment> {
        request.validate()?;
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("A rejection reason is required".to_string()));
        }

        let (mut tx, current) = self.begin_transition(id, actor, Transition::RejectReturn).await?;

        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::RejectReturn {
                actor_id: actor.user_id,
                reason,
                notes: append_note(current.notes.as_deref(), Some(reason)),
            },
        )
        .await?;
        asset_status::resync(&mut tx, current.asset_id).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::ReturnRejected, current.receiver_user_id)
            .await
    }

    /// Administrator withdraws an assignment that was never accepted
    pub async fn cancel_pending(&self, id: i32, actor: &Actor) -> AppResult<Assignment> {
        let (mut tx, current) = self.begin_transition(id, actor, Transition::Cancel).await?;

        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::Cancel {
                actor_id: actor.user_id,
            },
        )
        .await?;
        asset_status::resync(&mut tx, current.asset_id).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::Cancelled, current.receiver_user_id)
            .await
    }

    /// Administrator force-ends an open assignment and frees the asset
    pub async fn revert_assignment(
        &self,
        id: i32,
        actor: &Actor,
        request: &RevertAssignment,
    ) -> AppResult<Assignment> {
        let (mut tx, current) = self.begin_transition(id, actor, Transition::Revert).await?;

        let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let updated = AssignmentsRepository::apply_transition(
            &mut tx,
            id,
            current.status,
            &TransitionUpdate::Revert {
                actor_id: actor.user_id,
                reason,
                notes: append_note(current.notes.as_deref(), reason),
            },
        )
        .await?;
        asset_status::resync(&mut tx, current.asset_id).await?;

        self.finish(tx, &current, updated, actor, LifecycleEvent::Reverted, current.receiver_user_id)
            .await
    }

    /// Remove an assignment row and recompute the freed asset's status
    pub async fn delete_assignment(&self, id: i32, actor: &Actor) -> AppResult<()> {
        actor.require_admin()?;

        let mut tx = self.repository.begin().await?;
        let current = Self::lock_assignment(&mut tx, id).await?;

        AssignmentsRepository::delete(&mut tx, id).await?;
        let asset_status = asset_status::resync(&mut tx, current.asset_id).await?;

        tx.commit().await?;

        tracing::info!(
            assignment_id = id,
            asset_id = current.asset_id,
            status = %current.status,
            asset_status = %asset_status,
            actor_id = actor.user_id,
            "Assignment deleted"
        );
        self.publish(LifecycleEvent::Deleted, actor, current.asset_id, None, current.receiver_user_id);
        Ok(())
    }

    /// Lock the asset, then the assignment, and return the assignment as persisted
    async fn lock_assignment(conn: &mut PgConnection, id: i32) -> AppResult<Assignment> {
        // asset_id never changes, so an unlocked read is enough to find the asset
        let snapshot = AssignmentsRepository::fetch(conn, id).await?;
        conflict_guard::lock_assets(conn, &[snapshot.asset_id]).await?;
        AssignmentsRepository::fetch_for_update(conn, id).await
    }

    /// Open the transaction for `transition` and return the locked, validated row
    async fn begin_transition(
        &self,
        id: i32,
        actor: &Actor,
        transition: Transition,
    ) -> AppResult<(Transaction<'static, Postgres>, Assignment)> {
        let mut tx = self.repository.begin().await?;
        let current = Self::lock_assignment(&mut tx, id).await?;

        authorize(actor, transition, &current)?;
        transition.apply(current.status)?;

        Ok((tx, current))
    }

    async fn finish(
        &self,
        tx: Transaction<'static, Postgres>,
        before: &Assignment,
        after: Assignment,
        actor: &Actor,
        event: LifecycleEvent,
        recipient: Option<i32>,
    ) -> AppResult<Assignment> {
        tx.commit().await?;

        tracing::info!(
            assignment_id = after.id,
            asset_id = after.asset_id,
            from = %before.status,
            to = %after.status,
            actor_id = actor.user_id,
            "Assignment transitioned"
        );
        self.publish(event, actor, after.asset_id, Some(after.id), recipient);
        Ok(after)
    }

    fn publish(
        &self,
        event: LifecycleEvent,
        actor: &Actor,
        asset_id: i32,
        assignment_id: Option<i32>,
        recipient: Option<i32>,
    ) {
        notifications::dispatch(
            self.publisher.clone(),
            LifecycleNotice {
                event,
                actor_id: actor.user_id,
                asset_id,
                assignment_id,
                recipients: recipient.into_iter().collect(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(version: &str, flags: Vec<bool>) -> AcceptAssignment {
        AcceptAssignment {
            terms_version: version.to_string(),
            accepted_flags: flags,
        }
    }

    #[test]
    fn staff_targets_wait_for_acceptance() {
        let cfg = AssignmentsConfig::default();
        let staff = AssignmentTarget::Staff { staff_id: 1 };
        let lab = AssignmentTarget::Location { location: "Lab".into() };
        let finance = AssignmentTarget::Department { department: "Finance".into() };
        assert_eq!(initial_status(&cfg, &staff), AssignmentStatus::PendingAcceptance);
        assert_eq!(initial_status(&cfg, &lab), AssignmentStatus::Active);
        assert_eq!(initial_status(&cfg, &finance), AssignmentStatus::Active);
    }

    #[test]
    fn acceptance_can_be_switched_off() {
        let cfg = AssignmentsConfig {
            require_staff_acceptance: false,
            ..AssignmentsConfig::default()
        };
        let staff = AssignmentTarget::Staff { staff_id: 1 };
        assert_eq!(initial_status(&cfg, &staff), AssignmentStatus::Active);
    }

    #[test]
    fn all_required_terms_must_be_true() {
        let cfg = AssignmentsConfig::default();
        let version = cfg.terms_version.clone();
        tokio_test::assert_ok!(check_terms(&cfg, &accept(&version, vec![true, true, true])));
        tokio_test::assert_ok!(check_terms(&cfg, &accept(&version, vec![true, true, true, true])));

        let err = check_terms(&cfg, &accept(&version, vec![true, false, true])).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Term 2")));

        let err = check_terms(&cfg, &accept(&version, vec![true, true])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn stale_terms_version_is_rejected() {
        let cfg = AssignmentsConfig::default();
        let err = check_terms(&cfg, &accept("1999-01", vec![true; 3])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        tokio_test::assert_err!(check_terms(&cfg, &accept("", vec![true; 3])));
    }

    #[test]
    fn receiver_transitions_check_the_receiver() {
        let assignment_receiver = Some(9);
        let transition = Transition::Accept;
        assert_eq!(transition.actor(), TransitionActor::Receiver);
        assert!(Actor::staff(9).require_receiver(1, assignment_receiver).is_ok());
        // an administrator is not a stand-in for the receiver
        assert!(Actor::admin(2).require_receiver(1, assignment_receiver).is_err());
    }
}
