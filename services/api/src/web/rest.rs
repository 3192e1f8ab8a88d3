//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification. The handlers
//! themselves live in the sibling modules; this only collects them.

use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::update_preferences_handler,
        crate::web::projects::create_project_handler,
        crate::web::projects::list_projects_handler,
        crate::web::projects::get_project_handler,
        crate::web::projects::finish_project_handler,
        crate::web::projects::create_criteria_handler,
        crate::web::projects::list_criteria_handler,
        crate::web::projects::reorder_criteria_handler,
        crate::web::projects::create_invitation_handler,
        crate::web::projects::list_invitations_handler,
        crate::web::projects::redeem_invitation_handler,
        crate::web::visits::create_visit_handler,
        crate::web::visits::list_visits_handler,
        crate::web::visits::get_visit_handler,
        crate::web::visits::update_visit_handler,
        crate::web::visits::upsert_assessments_handler,
        crate::web::visits::upload_photo_handler,
        crate::web::visits::list_photos_handler,
        crate::web::comparison::get_comparison_handler,
        crate::web::comparison::export_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::auth::PreferencesRequest,
            crate::web::projects::CreateProjectRequest,
            crate::web::projects::ProjectResponse,
            crate::web::projects::CreateCriteriaRequest,
            crate::web::projects::CriteriaResponse,
            crate::web::projects::ReorderCriteriaRequest,
            crate::web::projects::CreateInvitationRequest,
            crate::web::projects::InvitationResponse,
            crate::web::visits::VisitRequest,
            crate::web::visits::VisitResponse,
            crate::web::visits::UpsertAssessmentsRequest,
            crate::web::visits::PhotoResponse,
            crate::web::comparison::ComparisonCell,
            crate::web::comparison::ComparisonRow,
            crate::web::comparison::ColumnStatsResponse,
            crate::web::comparison::WeightedScoreResponse,
            crate::web::comparison::ComparisonResponse,
        )
    ),
    tags(
        (name = "Checklist Casa API", description = "API endpoints for logging and comparing property visits.")
    )
)]
pub struct ApiDoc;
