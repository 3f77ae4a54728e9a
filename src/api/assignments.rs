//! Assignment lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::assignment::{
        AcceptAssignment, ApproveReturn, Assignment, AssignmentQuery, CreateAssignment,
        CreatedAssignment, RefuseAssignment, RejectReturn, RequestReturn, RevertAssignment,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Paginated assignment list
#[derive(Serialize, ToSchema)]
pub struct AssignmentListResponse {
    pub assignments: Vec<Assignment>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// List assignments
#[utoipa::path(
    get,
    path = "/assignments",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(AssignmentQuery),
    responses(
        (status = 200, description = "Assignments", body = AssignmentListResponse)
    )
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<AssignmentQuery>,
) -> AppResult<Json<AssignmentListResponse>> {
    let (assignments, total, pagination) = state.services.assignments.list(&query).await?;
    Ok(Json(AssignmentListResponse {
        assignments,
        total,
        page: pagination.page,
        per_page: pagination.per_page,
    }))
}

/// Get assignment by ID
#[utoipa::path(
    get,
    path = "/assignments/{id}",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment", body = Assignment),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Assignment>> {
    Ok(Json(state.services.assignments.get(id).await?))
}

/// List the assignments of a bundle
#[utoipa::path(
    get,
    path = "/bundles/{group_id}",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("group_id" = Uuid, Path, description = "Bundle group ID")),
    responses(
        (status = 200, description = "Bundle members", body = Vec<Assignment>),
        (status = 404, description = "Bundle not found")
    )
)]
pub async fn get_bundle(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    Ok(Json(state.services.assignments.list_bundle(group_id).await?))
}

/// Assign an asset (and optional bundle) to staff, a location or a department
#[utoipa::path(
    post,
    path = "/assignments",
    tag = "assignments",
    security(("bearer_auth" = [])),
    request_body = CreateAssignment,
    responses(
        (status = 201, description = "Assignment created", body = CreatedAssignment),
        (status = 400, description = "Invalid target or bundle"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Asset or staff member not found"),
        (status = 409, description = "Asset unavailable or already assigned")
    )
)]
pub async fn create_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateAssignment>,
) -> AppResult<(StatusCode, Json<CreatedAssignment>)> {
    let created = state
        .services
        .assignments
        .create_assignment(&claims.actor(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Accept a pending assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/accept",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = AcceptAssignment,
    responses(
        (status = 200, description = "Assignment accepted", body = Assignment),
        (status = 400, description = "Terms not fully accepted"),
        (status = 403, description = "Not the receiver"),
        (status = 409, description = "Asset no longer available"),
        (status = 422, description = "Assignment is not pending")
    )
)]
pub async fn accept_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<AcceptAssignment>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .accept_assignment(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Refuse a pending assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/refuse",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = RefuseAssignment,
    responses(
        (status = 200, description = "Assignment refused", body = Assignment),
        (status = 403, description = "Not the receiver"),
        (status = 422, description = "Assignment is not pending")
    )
)]
pub async fn refuse_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RefuseAssignment>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .refuse_assignment(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Ask to return an active assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/return",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = RequestReturn,
    responses(
        (status = 200, description = "Return requested", body = Assignment),
        (status = 403, description = "Not the receiver"),
        (status = 422, description = "Assignment is not active")
    )
)]
pub async fn request_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RequestReturn>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .request_return(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Approve a requested return
#[utoipa::path(
    post,
    path = "/assignments/{id}/approve-return",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = ApproveReturn,
    responses(
        (status = 200, description = "Return approved", body = Assignment),
        (status = 400, description = "Invalid next asset status"),
        (status = 403, description = "Administrator privileges required"),
        (status = 422, description = "No return was requested")
    )
)]
pub async fn approve_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ApproveReturn>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .approve_return(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Reject a requested return
#[utoipa::path(
    post,
    path = "/assignments/{id}/reject-return",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = RejectReturn,
    responses(
        (status = 200, description = "Return rejected", body = Assignment),
        (status = 400, description = "Missing reason"),
        (status = 403, description = "Administrator privileges required"),
        (status = 422, description = "No return was requested")
    )
)]
pub async fn reject_return(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RejectReturn>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .reject_return(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Cancel a pending assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/cancel",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment cancelled", body = Assignment),
        (status = 403, description = "Administrator privileges required"),
        (status = 422, description = "Assignment is not pending")
    )
)]
pub async fn cancel_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .cancel_pending(id, &claims.actor())
        .await?;
    Ok(Json(assignment))
}

/// Force-end an open assignment
#[utoipa::path(
    post,
    path = "/assignments/{id}/revert",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    request_body = RevertAssignment,
    responses(
        (status = 200, description = "Assignment reverted", body = Assignment),
        (status = 403, description = "Administrator privileges required"),
        (status = 422, description = "Assignment is already closed")
    )
)]
pub async fn revert_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RevertAssignment>,
) -> AppResult<Json<Assignment>> {
    let assignment = state
        .services
        .assignments
        .revert_assignment(id, &claims.actor(), &request)
        .await?;
    Ok(Json(assignment))
}

/// Delete an assignment
#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    tag = "assignments",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Assignment not found")
    )
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .services
        .assignments
        .delete_assignment(id, &claims.actor())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
