//! services/api/src/web/projects.rs
//!
//! Axum handlers for projects, the criteria registry and the invitation
//! workflow. Every handler receives the authenticated user from the
//! middleware extension and passes it explicitly through the access gate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use casa_core::access;
use casa_core::comparison::validate_reorder;
use casa_core::domain::{Criteria, CriteriaKind, Direction, Invitation, Project, User};
use casa_core::error::CoreError;

use crate::error::core_error_response;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub collaborator_ids: Vec<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            owner_id: project.owner_id,
            collaborator_ids: project.collaborator_ids,
            status: project.status.as_str().to_string(),
            created_at: project.created_at,
            finished_at: project.finished_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCriteriaRequest {
    pub name: String,
    /// One of boolean, numeric, text, rating.
    pub kind: String,
    pub weight: Option<f64>,
    /// higher_is_better (default) or lower_is_better.
    pub direction: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CriteriaResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub weight: Option<f64>,
    pub direction: String,
    pub position: i32,
}

impl From<Criteria> for CriteriaResponse {
    fn from(criteria: Criteria) -> Self {
        Self {
            id: criteria.id,
            name: criteria.name,
            kind: criteria.kind.as_str().to_string(),
            weight: criteria.weight,
            direction: criteria.direction.as_str().to_string(),
            position: criteria.position,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderCriteriaRequest {
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateInvitationRequest {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub email: String,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            project_id: invitation.project_id,
            email: invitation.email,
            accepted: invitation.accepted,
            created_at: invitation.created_at,
        }
    }
}

//=========================================================================================
// Project Handlers
//=========================================================================================

/// Create a new project owned by the current user.
#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 422, description = "Invalid name")
    )
)]
pub async fn create_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let name = req.name.trim();
    if name.len() < 3 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Project name must be at least 3 characters long".to_string(),
        ));
    }
    let project = state
        .db
        .create_project(name, user.user_id)
        .await
        .map_err(core_error_response)?;
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// List all projects the current user owns or collaborates on.
#[utoipa::path(
    get,
    path = "/projects",
    responses((status = 200, description = "Projects", body = [ProjectResponse]))
)]
pub async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let projects = state
        .db
        .list_projects_for_user(user.user_id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<ProjectResponse> = projects.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Fetch one project.
#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = ProjectResponse),
        (status = 404, description = "Unknown or inaccessible project")
    )
)]
pub async fn get_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

/// Finish a project. Owner only; one-way transition.
#[utoipa::path(
    post,
    path = "/projects/{id}/finish",
    params(("id" = Uuid, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project finished", body = ProjectResponse),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Already finished")
    )
)]
pub async fn finish_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut project = readable_project(&state, &user, project_id).await?;
    access::ensure_administer(user.user_id, &project).map_err(core_error_response)?;

    let now = Utc::now();
    project.finish(now).map_err(core_error_response)?;
    state
        .db
        .mark_project_finished(project_id, now)
        .await
        .map_err(core_error_response)?;
    Ok(Json(ProjectResponse::from(project)))
}

//=========================================================================================
// Criteria Handlers
//=========================================================================================

/// Add a criteria to a project, appended at the next position.
#[utoipa::path(
    post,
    path = "/projects/{id}/criteria",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateCriteriaRequest,
    responses(
        (status = 201, description = "Criteria created", body = CriteriaResponse),
        (status = 409, description = "Duplicate criteria name"),
        (status = 422, description = "Invalid type, weight or direction")
    )
)]
pub async fn create_criteria_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateCriteriaRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let kind = CriteriaKind::parse(&req.kind).map_err(core_error_response)?;
    let direction = match &req.direction {
        Some(raw) => Direction::parse(raw).map_err(core_error_response)?,
        None => Direction::default(),
    };
    if let Some(weight) = req.weight {
        if !weight.is_finite() || weight < 0.0 {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                "Criteria weight must be a non-negative number".to_string(),
            ));
        }
    }
    let name = req.name.trim();
    if name.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Criteria name must not be empty".to_string(),
        ));
    }

    let criteria = state
        .db
        .create_criteria(project_id, name, kind, req.weight, direction)
        .await
        .map_err(core_error_response)?;
    Ok((StatusCode::CREATED, Json(CriteriaResponse::from(criteria))))
}

/// List a project's criteria in display order.
#[utoipa::path(
    get,
    path = "/projects/{id}/criteria",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Criteria", body = [CriteriaResponse]))
)]
pub async fn list_criteria_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    readable_project(&state, &user, project_id).await?;
    let criteria = state
        .db
        .list_criteria(project_id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<CriteriaResponse> = criteria.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Atomically rewrite the display order of a project's criteria.
#[utoipa::path(
    put,
    path = "/projects/{id}/criteria/order",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = ReorderCriteriaRequest,
    responses(
        (status = 200, description = "Criteria reordered", body = [CriteriaResponse]),
        (status = 422, description = "Not a permutation of the project's criteria")
    )
)]
pub async fn reorder_criteria_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ReorderCriteriaRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let existing = state
        .db
        .list_criteria(project_id)
        .await
        .map_err(core_error_response)?;
    validate_reorder(&existing, &req.ordered_ids).map_err(core_error_response)?;
    state
        .db
        .reorder_criteria(project_id, &req.ordered_ids)
        .await
        .map_err(core_error_response)?;

    let criteria = state
        .db
        .list_criteria(project_id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<CriteriaResponse> = criteria.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

//=========================================================================================
// Invitation Handlers
//=========================================================================================

/// Invite an email address to collaborate. Owner only.
///
/// The invitation email is fire-and-forget: a delivery failure is logged
/// but never rolls back the token, which stays redeemable out-of-band.
#[utoipa::path(
    post,
    path = "/projects/{id}/invitations",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = CreateInvitationRequest,
    responses(
        (status = 201, description = "Invitation issued", body = InvitationResponse),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Email already invited")
    )
)]
pub async fn create_invitation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    access::ensure_administer(user.user_id, &project).map_err(core_error_response)?;

    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "A valid email address is required".to_string(),
        ));
    }

    let token = Uuid::new_v4();
    let invitation = state
        .db
        .create_invitation(project_id, &email, user.user_id, token)
        .await
        .map_err(core_error_response)?;

    let invitation_url = format!(
        "{}/invitations/{}/redeem",
        state.config.app_base_url, invitation.token
    );
    if let Err(e) = state
        .email
        .send_invitation(&email, &project.name, &invitation_url, &user.email)
        .await
    {
        warn!("Invitation email to {} failed: {}", email, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse::from(invitation)),
    ))
}

/// List a project's invitations. Owner only.
#[utoipa::path(
    get,
    path = "/projects/{id}/invitations",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Invitations", body = [InvitationResponse]))
)]
pub async fn list_invitations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    access::ensure_administer(user.user_id, &project).map_err(core_error_response)?;
    let invitations = state
        .db
        .list_invitations(project_id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<InvitationResponse> = invitations.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Redeem an invitation token, joining the project as a collaborator.
#[utoipa::path(
    post,
    path = "/invitations/{token}/redeem",
    params(("token" = Uuid, Path, description = "Invitation token")),
    responses(
        (status = 200, description = "Joined the project", body = ProjectResponse),
        (status = 404, description = "Unknown token"),
        (status = 409, description = "Token already redeemed")
    )
)]
pub async fn redeem_invitation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invitation = state
        .db
        .redeem_invitation(token, user.user_id)
        .await
        .map_err(core_error_response)?;
    let project = state
        .db
        .get_project(invitation.project_id)
        .await
        .map_err(core_error_response)?;
    Ok(Json(ProjectResponse::from(project)))
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Loads a project and applies the read gate. An inaccessible project is
/// indistinguishable from a missing one.
pub async fn readable_project(
    state: &Arc<AppState>,
    user: &User,
    project_id: Uuid,
) -> Result<Project, (StatusCode, String)> {
    let project = match state.db.get_project(project_id).await {
        Ok(project) => project,
        Err(CoreError::NotFound(_)) => {
            return Err((StatusCode::NOT_FOUND, "Not found".to_string()))
        }
        Err(e) => return Err(core_error_response(e)),
    };
    access::ensure_read(user.user_id, &project).map_err(core_error_response)?;
    Ok(project)
}
