//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{assets, assignments, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Custody API",
        version = "1.0.0",
        description = "IT asset assignment lifecycle REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Assignments
        assignments::list_assignments,
        assignments::get_assignment,
        assignments::create_assignment,
        assignments::accept_assignment,
        assignments::refuse_assignment,
        assignments::request_return,
        assignments::approve_return,
        assignments::reject_return,
        assignments::cancel_assignment,
        assignments::revert_assignment,
        assignments::delete_assignment,
        assignments::get_bundle,
        // Assets
        assets::get_asset,
        assets::create_asset,
        assets::update_asset_status,
        assets::delete_asset,
    ),
    components(
        schemas(
            // Assignments
            crate::models::assignment::Assignment,
            crate::models::assignment::AssignmentStatus,
            crate::models::assignment::AssignmentTarget,
            crate::models::assignment::TargetType,
            crate::models::assignment::Document,
            crate::models::assignment::CreatedAssignment,
            crate::models::assignment::CreateAssignment,
            crate::models::assignment::AcceptAssignment,
            crate::models::assignment::RefuseAssignment,
            crate::models::assignment::RequestReturn,
            crate::models::assignment::ApproveReturn,
            crate::models::assignment::RejectReturn,
            crate::models::assignment::RevertAssignment,
            assignments::AssignmentListResponse,
            // Assets
            crate::models::asset::Asset,
            crate::models::asset::AssetType,
            crate::models::asset::AssetStatus,
            crate::models::asset::CreateAsset,
            crate::models::asset::UpdateAssetStatus,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "assignments", description = "Assignment lifecycle"),
        (name = "assets", description = "Asset availability")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
