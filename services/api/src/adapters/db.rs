//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use casa_core::domain::{
    Assessment, AssessmentValue, Criteria, CriteriaKind, Direction, Invitation, Photo, Project,
    ProjectStatus, User, UserCredentials, Visit, VisitDraft, MAX_PHOTOS_PER_VISIT,
};
use casa_core::error::{CoreError, CoreResult};
use casa_core::ports::DatabaseService;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn collaborator_ids(&self, project_id: Uuid) -> CoreResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM project_collaborators WHERE project_id = $1 ORDER BY added_at",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }
}

fn unexpected(e: sqlx::Error) -> CoreError {
    CoreError::Infrastructure(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

fn violated_constraint(e: &sqlx::Error) -> Option<&str> {
    match e {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    receive_confirmation_emails: bool,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            receive_confirmation_emails: self.receive_confirmation_emails,
        }
    }
}

#[derive(FromRow)]
struct UserCredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl UserCredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ProjectRecord {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}
impl ProjectRecord {
    fn to_domain(self, collaborator_ids: Vec<Uuid>) -> CoreResult<Project> {
        Ok(Project {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            collaborator_ids,
            status: ProjectStatus::parse(&self.status)?,
            created_at: self.created_at,
            finished_at: self.finished_at,
        })
    }
}

#[derive(FromRow)]
struct CriteriaRecord {
    id: Uuid,
    project_id: Uuid,
    name: String,
    kind: String,
    weight: Option<f64>,
    direction: String,
    position: i32,
    created_at: DateTime<Utc>,
}
impl CriteriaRecord {
    fn to_domain(self) -> CoreResult<Criteria> {
        // A bad stored kind or direction is corruption, not caller input.
        let kind = CriteriaKind::parse(&self.kind).map_err(|_| {
            CoreError::Infrastructure(format!(
                "Criteria {} has unknown kind '{}'",
                self.id, self.kind
            ))
        })?;
        let direction = Direction::parse(&self.direction).map_err(|_| {
            CoreError::Infrastructure(format!(
                "Criteria {} has unknown direction '{}'",
                self.id, self.direction
            ))
        })?;
        Ok(Criteria {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            kind,
            weight: self.weight,
            direction,
            position: self.position,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct VisitRecord {
    id: Uuid,
    project_id: Uuid,
    name: String,
    address: String,
    realtor_name: Option<String>,
    realtor_contact: Option<String>,
    visit_date: NaiveDate,
    notes: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl VisitRecord {
    fn to_domain(self) -> Visit {
        Visit {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            address: self.address,
            realtor_name: self.realtor_name,
            realtor_contact: self.realtor_contact,
            visit_date: self.visit_date,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// The polymorphic value columns. Exactly one of them is populated, keyed by
// `value_kind`; the tagged domain enum makes any other combination
// unrepresentable once decoded.
#[derive(FromRow)]
struct AssessmentRecord {
    id: Uuid,
    visit_id: Uuid,
    criteria_id: Uuid,
    value_kind: String,
    value_boolean: Option<bool>,
    value_numeric: Option<f64>,
    value_text: Option<String>,
    value_rating: Option<i32>,
    updated_at: DateTime<Utc>,
}
impl AssessmentRecord {
    fn to_domain(self) -> CoreResult<Assessment> {
        let kind = CriteriaKind::parse(&self.value_kind).map_err(|_| {
            CoreError::Infrastructure(format!(
                "Assessment {} has unknown value kind '{}'",
                self.id, self.value_kind
            ))
        })?;
        let value = match kind {
            CriteriaKind::Boolean => AssessmentValue::Boolean(self.value_boolean.ok_or_else(
                || CoreError::Infrastructure(format!("Assessment {} lost its boolean", self.id)),
            )?),
            CriteriaKind::Numeric => AssessmentValue::Numeric(self.value_numeric.ok_or_else(
                || CoreError::Infrastructure(format!("Assessment {} lost its number", self.id)),
            )?),
            CriteriaKind::Text => AssessmentValue::Text(self.value_text.ok_or_else(|| {
                CoreError::Infrastructure(format!("Assessment {} lost its text", self.id))
            })?),
            CriteriaKind::Rating => {
                let rating = self.value_rating.ok_or_else(|| {
                    CoreError::Infrastructure(format!("Assessment {} lost its rating", self.id))
                })?;
                AssessmentValue::Rating(rating as u8)
            }
        };
        Ok(Assessment {
            id: self.id,
            visit_id: self.visit_id,
            criteria_id: self.criteria_id,
            value,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PhotoRecord {
    id: Uuid,
    visit_id: Uuid,
    handle: String,
    content_type: String,
    caption: Option<String>,
    position: i32,
    uploaded_at: DateTime<Utc>,
}
impl PhotoRecord {
    fn to_domain(self) -> Photo {
        Photo {
            id: self.id,
            visit_id: self.visit_id,
            handle: self.handle,
            content_type: self.content_type,
            caption: self.caption,
            position: self.position,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(FromRow)]
struct InvitationRecord {
    id: Uuid,
    project_id: Uuid,
    email: String,
    invited_by: Uuid,
    token: Uuid,
    accepted: bool,
    created_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
}
impl InvitationRecord {
    fn to_domain(self) -> Invitation {
        Invitation {
            id: self.id,
            project_id: self.project_id,
            email: self.email,
            invited_by: self.invited_by,
            token: self.token,
            accepted: self.accepted,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
        }
    }
}

/// Splits a tagged value into the four nullable columns for storage.
fn value_columns(
    value: &AssessmentValue,
) -> (
    &'static str,
    Option<bool>,
    Option<f64>,
    Option<String>,
    Option<i32>,
) {
    match value {
        AssessmentValue::Boolean(b) => ("boolean", Some(*b), None, None, None),
        AssessmentValue::Numeric(n) => ("numeric", None, Some(*n), None, None),
        AssessmentValue::Text(t) => ("text", None, None, Some(t.clone()), None),
        AssessmentValue::Rating(r) => ("rating", None, None, None, Some(*r as i32)),
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> CoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, receive_confirmation_emails",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("An account for {} already exists", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> CoreResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserCredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::NotFound(format!("User {}", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> CoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, receive_confirmation_emails FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::NotFound(format!("User {}", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn set_confirmation_emails(&self, user_id: Uuid, enabled: bool) -> CoreResult<()> {
        sqlx::query("UPDATE users SET receive_confirmation_emails = $1 WHERE user_id = $2")
            .bind(enabled)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> CoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.email, u.receive_confirmation_emails \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_auth_session(&self, session_id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_project(&self, name: &str, owner_id: Uuid) -> CoreResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "INSERT INTO projects (id, name, owner_id) VALUES ($1, $2, $3) \
             RETURNING id, name, owner_id, status, created_at, finished_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain(Vec::new())
    }

    async fn get_project(&self, project_id: Uuid) -> CoreResult<Project> {
        let record = sqlx::query_as::<_, ProjectRecord>(
            "SELECT id, name, owner_id, status, created_at, finished_at \
             FROM projects WHERE id = $1",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::NotFound(format!("Project {}", project_id)),
            _ => unexpected(e),
        })?;
        let collaborators = self.collaborator_ids(project_id).await?;
        record.to_domain(collaborators)
    }

    async fn list_projects_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Project>> {
        let records = sqlx::query_as::<_, ProjectRecord>(
            "SELECT DISTINCT p.id, p.name, p.owner_id, p.status, p.created_at, p.finished_at \
             FROM projects p \
             LEFT JOIN project_collaborators c ON c.project_id = p.id \
             WHERE p.owner_id = $1 OR c.user_id = $1 \
             ORDER BY p.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            let collaborators = self.collaborator_ids(record.id).await?;
            projects.push(record.to_domain(collaborators)?);
        }
        Ok(projects)
    }

    async fn mark_project_finished(
        &self,
        project_id: Uuid,
        finished_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET status = 'finished', finished_at = $1 \
             WHERE id = $2 AND status = 'active'",
        )
        .bind(finished_at)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(
                "Project is already finished".to_string(),
            ));
        }
        Ok(())
    }

    async fn add_collaborator(&self, project_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO project_collaborators (project_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (project_id, user_id) DO NOTHING",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn create_criteria(
        &self,
        project_id: Uuid,
        name: &str,
        kind: CriteriaKind,
        weight: Option<f64>,
        direction: Direction,
    ) -> CoreResult<Criteria> {
        // The subquery appends at the next free position index.
        let record = sqlx::query_as::<_, CriteriaRecord>(
            "INSERT INTO criteria (id, project_id, name, kind, weight, direction, position) \
             SELECT $1, $2, $3, $4, $5, $6, COALESCE(MAX(position) + 1, 0) \
             FROM criteria WHERE project_id = $2 \
             RETURNING id, project_id, name, kind, weight, direction, position, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(name)
        .bind(kind.as_str())
        .bind(weight)
        .bind(direction.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                // Two concurrent inserts can race for the same position;
                // that collision is retryable and not the caller's fault.
                if violated_constraint(&e) == Some("criteria_project_position_key") {
                    CoreError::Infrastructure(
                        "Concurrent criteria creation collided on position".to_string(),
                    )
                } else {
                    CoreError::Conflict(format!(
                        "A criteria named '{}' already exists in this project",
                        name
                    ))
                }
            } else {
                unexpected(e)
            }
        })?;
        record.to_domain()
    }

    async fn list_criteria(&self, project_id: Uuid) -> CoreResult<Vec<Criteria>> {
        let records = sqlx::query_as::<_, CriteriaRecord>(
            "SELECT id, project_id, name, kind, weight, direction, position, created_at \
             FROM criteria WHERE project_id = $1 ORDER BY position, created_at",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn reorder_criteria(&self, project_id: Uuid, ordered_ids: &[Uuid]) -> CoreResult<()> {
        // All-or-nothing rewrite of the position values.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for (position, criteria_id) in ordered_ids.iter().enumerate() {
            sqlx::query("UPDATE criteria SET position = $1 WHERE id = $2 AND project_id = $3")
                .bind(position as i32)
                .bind(criteria_id)
                .bind(project_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn create_visit(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        draft: VisitDraft,
    ) -> CoreResult<Visit> {
        let record = sqlx::query_as::<_, VisitRecord>(
            "INSERT INTO visits \
             (id, project_id, name, address, realtor_name, realtor_contact, visit_date, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, project_id, name, address, realtor_name, realtor_contact, \
                       visit_date, notes, created_by, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.realtor_name)
        .bind(&draft.realtor_contact)
        .bind(draft.visit_date)
        .bind(&draft.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_visit(&self, visit_id: Uuid) -> CoreResult<Visit> {
        let record = sqlx::query_as::<_, VisitRecord>(
            "SELECT id, project_id, name, address, realtor_name, realtor_contact, \
                    visit_date, notes, created_by, created_at, updated_at \
             FROM visits WHERE id = $1",
        )
        .bind(visit_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::NotFound(format!("Visit {}", visit_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_visits(&self, project_id: Uuid) -> CoreResult<Vec<Visit>> {
        let records = sqlx::query_as::<_, VisitRecord>(
            "SELECT id, project_id, name, address, realtor_name, realtor_contact, \
                    visit_date, notes, created_by, created_at, updated_at \
             FROM visits WHERE project_id = $1 ORDER BY visit_date DESC, created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn update_visit(&self, visit_id: Uuid, draft: VisitDraft) -> CoreResult<Visit> {
        let record = sqlx::query_as::<_, VisitRecord>(
            "UPDATE visits SET name = $1, address = $2, realtor_name = $3, \
                    realtor_contact = $4, visit_date = $5, notes = $6, updated_at = now() \
             WHERE id = $7 \
             RETURNING id, project_id, name, address, realtor_name, realtor_contact, \
                       visit_date, notes, created_by, created_at, updated_at",
        )
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.realtor_name)
        .bind(&draft.realtor_contact)
        .bind(draft.visit_date)
        .bind(&draft.notes)
        .bind(visit_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => CoreError::NotFound(format!("Visit {}", visit_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn apply_assessments(
        &self,
        visit_id: Uuid,
        changes: &[(Uuid, Option<AssessmentValue>)],
    ) -> CoreResult<()> {
        // One transaction for the whole batch: a mid-batch failure rolls
        // everything back instead of leaving the visit half-updated.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for (criteria_id, change) in changes {
            match change {
                Some(value) => {
                    let (kind, boolean, numeric, text, rating) = value_columns(value);
                    sqlx::query(
                        "INSERT INTO assessments \
                         (id, visit_id, criteria_id, value_kind, value_boolean, value_numeric, value_text, value_rating) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                         ON CONFLICT (visit_id, criteria_id) DO UPDATE SET \
                            value_kind = EXCLUDED.value_kind, \
                            value_boolean = EXCLUDED.value_boolean, \
                            value_numeric = EXCLUDED.value_numeric, \
                            value_text = EXCLUDED.value_text, \
                            value_rating = EXCLUDED.value_rating, \
                            updated_at = now()",
                    )
                    .bind(Uuid::new_v4())
                    .bind(visit_id)
                    .bind(criteria_id)
                    .bind(kind)
                    .bind(boolean)
                    .bind(numeric)
                    .bind(text)
                    .bind(rating)
                    .execute(&mut *tx)
                    .await
                    .map_err(unexpected)?;
                }
                None => {
                    sqlx::query(
                        "DELETE FROM assessments WHERE visit_id = $1 AND criteria_id = $2",
                    )
                    .bind(visit_id)
                    .bind(criteria_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(unexpected)?;
                }
            }
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_assessments(&self, project_id: Uuid) -> CoreResult<Vec<Assessment>> {
        let records = sqlx::query_as::<_, AssessmentRecord>(
            "SELECT a.id, a.visit_id, a.criteria_id, a.value_kind, a.value_boolean, \
                    a.value_numeric, a.value_text, a.value_rating, a.updated_at \
             FROM assessments a JOIN visits v ON v.id = a.visit_id \
             WHERE v.project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn add_photo(
        &self,
        visit_id: Uuid,
        handle: &str,
        content_type: &str,
        caption: Option<&str>,
    ) -> CoreResult<Photo> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // Lock the visit row so two concurrent uploads serialize on the cap.
        sqlx::query("SELECT id FROM visits WHERE id = $1 FOR UPDATE")
            .bind(visit_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos WHERE visit_id = $1")
            .bind(visit_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
        if count as usize >= MAX_PHOTOS_PER_VISIT {
            return Err(CoreError::Validation(format!(
                "A visit can hold at most {} photos",
                MAX_PHOTOS_PER_VISIT
            )));
        }
        let record = sqlx::query_as::<_, PhotoRecord>(
            "INSERT INTO photos (id, visit_id, handle, content_type, caption, position) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, visit_id, handle, content_type, caption, position, uploaded_at",
        )
        .bind(Uuid::new_v4())
        .bind(visit_id)
        .bind(handle)
        .bind(content_type)
        .bind(caption)
        .bind(count as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_photos(&self, visit_id: Uuid) -> CoreResult<Vec<Photo>> {
        let records = sqlx::query_as::<_, PhotoRecord>(
            "SELECT id, visit_id, handle, content_type, caption, position, uploaded_at \
             FROM photos WHERE visit_id = $1 ORDER BY position, uploaded_at",
        )
        .bind(visit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_invitation(
        &self,
        project_id: Uuid,
        email: &str,
        invited_by: Uuid,
        token: Uuid,
    ) -> CoreResult<Invitation> {
        let record = sqlx::query_as::<_, InvitationRecord>(
            "INSERT INTO invitations (id, project_id, email, invited_by, token) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, project_id, email, invited_by, token, accepted, created_at, accepted_at",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(email)
        .bind(invited_by)
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("{} has already been invited to this project", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn redeem_invitation(&self, token: Uuid, user_id: Uuid) -> CoreResult<Invitation> {
        // Check-then-set runs as a single transaction so two concurrent
        // redemptions cannot both succeed.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let redeemed = sqlx::query_as::<_, InvitationRecord>(
            "UPDATE invitations SET accepted = TRUE, accepted_at = now() \
             WHERE token = $1 AND accepted = FALSE \
             RETURNING id, project_id, email, invited_by, token, accepted, created_at, accepted_at",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let invitation = match redeemed {
            Some(record) => record.to_domain(),
            None => {
                let exists: Option<bool> =
                    sqlx::query_scalar("SELECT accepted FROM invitations WHERE token = $1")
                        .bind(token)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(unexpected)?;
                return match exists {
                    Some(_) => Err(CoreError::Conflict(
                        "Invitation has already been accepted".to_string(),
                    )),
                    None => Err(CoreError::NotFound("Invitation token".to_string())),
                };
            }
        };

        sqlx::query(
            "INSERT INTO project_collaborators (project_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (project_id, user_id) DO NOTHING",
        )
        .bind(invitation.project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        tx.commit().await.map_err(unexpected)?;
        Ok(invitation)
    }

    async fn list_invitations(&self, project_id: Uuid) -> CoreResult<Vec<Invitation>> {
        let records = sqlx::query_as::<_, InvitationRecord>(
            "SELECT id, project_id, email, invited_by, token, accepted, created_at, accepted_at \
             FROM invitations WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria_record(kind: &str, direction: &str) -> CriteriaRecord {
        CriteriaRecord {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "Price".to_string(),
            kind: kind.to_string(),
            weight: None,
            direction: direction.to_string(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn corrupted_criteria_columns_surface_as_infrastructure() {
        // A bad stored enum is storage corruption, never caller input.
        assert!(matches!(
            criteria_record("distance", "higher_is_better").to_domain(),
            Err(CoreError::Infrastructure(_))
        ));
        assert!(matches!(
            criteria_record("numeric", "sideways").to_domain(),
            Err(CoreError::Infrastructure(_))
        ));
        assert!(criteria_record("numeric", "lower_is_better")
            .to_domain()
            .is_ok());
    }

    #[test]
    fn corrupted_assessment_records_surface_as_infrastructure() {
        let record = |kind: &str, boolean: Option<bool>| AssessmentRecord {
            id: Uuid::new_v4(),
            visit_id: Uuid::new_v4(),
            criteria_id: Uuid::new_v4(),
            value_kind: kind.to_string(),
            value_boolean: boolean,
            value_numeric: None,
            value_text: None,
            value_rating: None,
            updated_at: Utc::now(),
        };
        assert!(matches!(
            record("distance", Some(true)).to_domain(),
            Err(CoreError::Infrastructure(_))
        ));
        // A kind whose matching value column is NULL is equally corrupt.
        assert!(matches!(
            record("boolean", None).to_domain(),
            Err(CoreError::Infrastructure(_))
        ));
        assert!(record("boolean", Some(true)).to_domain().is_ok());
    }
}
