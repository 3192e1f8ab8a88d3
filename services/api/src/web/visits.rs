//! services/api/src/web/visits.rs
//!
//! Axum handlers for the visit ledger: visit CRUD, the assessment batch
//! upsert and the photo upload.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use casa_core::access;
use casa_core::domain::{AssessmentValue, Criteria, Photo, User, Visit, VisitDraft};
use casa_core::error::{CoreError, CoreResult};

use crate::error::core_error_response;
use crate::web::projects::readable_project;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct VisitRequest {
    pub name: String,
    pub address: String,
    pub realtor_name: Option<String>,
    pub realtor_contact: Option<String>,
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

impl VisitRequest {
    fn into_draft(self) -> Result<VisitDraft, (StatusCode, String)> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                "Visit name must not be empty".to_string(),
            ));
        }
        Ok(VisitDraft {
            name,
            address: self.address.trim().to_string(),
            realtor_name: self.realtor_name,
            realtor_contact: self.realtor_contact,
            visit_date: self.visit_date,
            notes: self.notes,
        })
    }
}

#[derive(Serialize, ToSchema)]
pub struct VisitResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub address: String,
    pub realtor_name: Option<String>,
    pub realtor_contact: Option<String>,
    pub visit_date: NaiveDate,
    pub notes: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Visit> for VisitResponse {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id,
            project_id: visit.project_id,
            name: visit.name,
            address: visit.address,
            realtor_name: visit.realtor_name,
            realtor_contact: visit.realtor_contact,
            visit_date: visit.visit_date,
            notes: visit.notes,
            created_by: visit.created_by,
            created_at: visit.created_at,
        }
    }
}

/// Raw assessment values keyed by criteria id. An empty string clears the
/// answer back to "unanswered".
#[derive(Deserialize, ToSchema)]
pub struct UpsertAssessmentsRequest {
    pub values: HashMap<Uuid, String>,
}

#[derive(Serialize, ToSchema)]
pub struct PhotoResponse {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub handle: String,
    pub content_type: String,
    pub caption: Option<String>,
    pub position: i32,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            visit_id: photo.visit_id,
            handle: photo.handle,
            content_type: photo.content_type,
            caption: photo.caption,
            position: photo.position,
        }
    }
}

//=========================================================================================
// Visit Handlers
//=========================================================================================

/// Log a new property visit in a project.
#[utoipa::path(
    post,
    path = "/projects/{id}/visits",
    params(("id" = Uuid, Path, description = "Project id")),
    request_body = VisitRequest,
    responses(
        (status = 201, description = "Visit created", body = VisitResponse),
        (status = 409, description = "Project is finished")
    )
)]
pub async fn create_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<VisitRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let project = readable_project(&state, &user, project_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let draft = req.into_draft()?;
    let visit = state
        .db
        .create_visit(project_id, user.user_id, draft)
        .await
        .map_err(core_error_response)?;

    // Opt-in confirmation email; a failure never fails the request.
    if user.receive_confirmation_emails {
        if let Err(e) = state
            .email
            .send_visit_confirmation(&user.email, &visit.name)
            .await
        {
            warn!("Visit confirmation email to {} failed: {}", user.email, e);
        }
    } else {
        info!("Skipping confirmation email for {} - opted out", user.email);
    }

    Ok((StatusCode::CREATED, Json(VisitResponse::from(visit))))
}

/// List a project's visits, most recent first.
#[utoipa::path(
    get,
    path = "/projects/{id}/visits",
    params(("id" = Uuid, Path, description = "Project id")),
    responses((status = 200, description = "Visits", body = [VisitResponse]))
)]
pub async fn list_visits_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(project_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    readable_project(&state, &user, project_id).await?;
    let visits = state
        .db
        .list_visits(project_id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<VisitResponse> = visits.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

/// Fetch one visit.
#[utoipa::path(
    get,
    path = "/visits/{id}",
    params(("id" = Uuid, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit", body = VisitResponse),
        (status = 404, description = "Unknown or inaccessible visit")
    )
)]
pub async fn get_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (visit, _) = readable_visit(&state, &user, visit_id).await?;
    Ok(Json(VisitResponse::from(visit)))
}

/// Update a visit's details.
#[utoipa::path(
    put,
    path = "/visits/{id}",
    params(("id" = Uuid, Path, description = "Visit id")),
    request_body = VisitRequest,
    responses(
        (status = 200, description = "Visit updated", body = VisitResponse),
        (status = 409, description = "Project is finished")
    )
)]
pub async fn update_visit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
    Json(req): Json<VisitRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (visit, project) = readable_visit(&state, &user, visit_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let draft = req.into_draft()?;
    let updated = state
        .db
        .update_visit(visit.id, draft)
        .await
        .map_err(core_error_response)?;
    Ok(Json(VisitResponse::from(updated)))
}

//=========================================================================================
// Assessment Handlers
//=========================================================================================

/// Parses a raw assessment batch against the project's criteria. Every
/// entry must name a criteria of the project and parse against its type;
/// any failure rejects the whole batch before anything is written.
fn parse_assessment_batch(
    criteria: &[Criteria],
    values: &HashMap<Uuid, String>,
) -> CoreResult<Vec<(Uuid, Option<AssessmentValue>)>> {
    let mut parsed = Vec::with_capacity(values.len());
    for (criteria_id, raw) in values {
        let criteria = criteria.iter().find(|c| c.id == *criteria_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "Criteria {} does not belong to this project",
                criteria_id
            ))
        })?;
        parsed.push((*criteria_id, AssessmentValue::parse(criteria, raw)?));
    }
    Ok(parsed)
}

/// Upsert assessment values for a visit, one per criteria.
///
/// Each raw value is validated against its criteria's type; the whole
/// batch is rejected on the first invalid entry and applied in a single
/// transaction otherwise. Last write wins per (visit, criteria) pair.
#[utoipa::path(
    put,
    path = "/visits/{id}/assessments",
    params(("id" = Uuid, Path, description = "Visit id")),
    request_body = UpsertAssessmentsRequest,
    responses(
        (status = 204, description = "Assessments stored"),
        (status = 422, description = "A value does not match its criteria type")
    )
)]
pub async fn upsert_assessments_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
    Json(req): Json<UpsertAssessmentsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (visit, project) = readable_visit(&state, &user, visit_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let criteria = state
        .db
        .list_criteria(project.id)
        .await
        .map_err(core_error_response)?;

    // Validate everything before touching storage, then apply as one
    // atomic batch.
    let parsed = parse_assessment_batch(&criteria, &req.values).map_err(core_error_response)?;
    state
        .db
        .apply_assessments(visit.id, &parsed)
        .await
        .map_err(core_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Photo Handlers
//=========================================================================================

/// Attach a photo to a visit (multipart, `photo` file part plus optional
/// `caption` text part). A visit holds at most five photos.
#[utoipa::path(
    post,
    path = "/visits/{id}/photos",
    params(("id" = Uuid, Path, description = "Visit id")),
    request_body(content_type = "multipart/form-data", description = "The photo to upload."),
    responses(
        (status = 201, description = "Photo stored", body = PhotoResponse),
        (status = 422, description = "Photo limit reached or unsupported type")
    )
)]
pub async fn upload_photo_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (visit, project) = readable_visit(&state, &user, visit_id).await?;
    access::ensure_write(user.user_id, &project).map_err(core_error_response)?;

    let mut photo_bytes: Option<(Vec<u8>, String)> = None;
    let mut caption: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        match field.name() {
            Some("photo") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read photo bytes: {}", e),
                    )
                })?;
                photo_bytes = Some((data.to_vec(), content_type));
            }
            Some("caption") => {
                let text = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read caption: {}", e),
                    )
                })?;
                if !text.trim().is_empty() {
                    caption = Some(text);
                }
            }
            _ => {}
        }
    }

    let (bytes, content_type) = photo_bytes.ok_or((
        StatusCode::BAD_REQUEST,
        "Multipart form must include a photo part".to_string(),
    ))?;

    let handle = state
        .photos
        .store(&bytes, &content_type)
        .await
        .map_err(core_error_response)?;
    let photo = state
        .db
        .add_photo(visit.id, &handle, &content_type, caption.as_deref())
        .await
        .map_err(core_error_response)?;
    Ok((StatusCode::CREATED, Json(PhotoResponse::from(photo))))
}

/// List a visit's photos in display order.
#[utoipa::path(
    get,
    path = "/visits/{id}/photos",
    params(("id" = Uuid, Path, description = "Visit id")),
    responses((status = 200, description = "Photos", body = [PhotoResponse]))
)]
pub async fn list_photos_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(visit_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (visit, _) = readable_visit(&state, &user, visit_id).await?;
    let photos = state
        .db
        .list_photos(visit.id)
        .await
        .map_err(core_error_response)?;
    let response: Vec<PhotoResponse> = photos.into_iter().map(Into::into).collect();
    Ok(Json(response))
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Loads a visit and its project, applying the read gate. Like projects,
/// an inaccessible visit reads as missing.
async fn readable_visit(
    state: &Arc<AppState>,
    user: &User,
    visit_id: Uuid,
) -> Result<(Visit, casa_core::domain::Project), (StatusCode, String)> {
    let visit = match state.db.get_visit(visit_id).await {
        Ok(visit) => visit,
        Err(CoreError::NotFound(_)) => {
            return Err((StatusCode::NOT_FOUND, "Not found".to_string()))
        }
        Err(e) => return Err(core_error_response(e)),
    };
    let project = readable_project(state, user, visit.project_id).await?;
    Ok((visit, project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use casa_core::domain::{CriteriaKind, Direction};
    use chrono::Utc;

    fn criteria(name: &str, kind: CriteriaKind) -> Criteria {
        Criteria {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            weight: None,
            direction: Direction::default(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn assessment_batch_parses_values_and_blanks() {
        let yard = criteria("Has Yard", CriteriaKind::Boolean);
        let price = criteria("Price", CriteriaKind::Numeric);
        let mut values = HashMap::new();
        values.insert(yard.id, "yes".to_string());
        values.insert(price.id, "".to_string());

        let parsed =
            parse_assessment_batch(&[yard.clone(), price.clone()], &values).unwrap();
        assert_eq!(parsed.len(), 2);
        let by_id = |id| parsed.iter().find(|(c, _)| *c == id).unwrap().1.clone();
        assert_eq!(by_id(yard.id), Some(AssessmentValue::Boolean(true)));
        // The blank clears the answer rather than storing anything.
        assert_eq!(by_id(price.id), None);
    }

    #[test]
    fn assessment_batch_rejects_foreign_criteria() {
        let yard = criteria("Has Yard", CriteriaKind::Boolean);
        let mut values = HashMap::new();
        values.insert(Uuid::new_v4(), "yes".to_string());
        assert!(matches!(
            parse_assessment_batch(&[yard], &values),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn one_bad_value_rejects_the_whole_batch() {
        let yard = criteria("Has Yard", CriteriaKind::Boolean);
        let price = criteria("Price", CriteriaKind::Numeric);
        let mut values = HashMap::new();
        values.insert(yard.id, "yes".to_string());
        values.insert(price.id, "not a number".to_string());

        // Nothing usable comes back; the caller writes all or nothing.
        assert!(matches!(
            parse_assessment_batch(&[yard, price], &values),
            Err(CoreError::Validation(_))
        ));
    }
}
