//! crates/casa_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! mail providers or file stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::comparison::{ComparisonMatrix, ExportMetadata};
use crate::domain::{
    Assessment, AssessmentValue, Criteria, CriteriaKind, Direction, Invitation, Photo, Project,
    User, UserCredentials, Visit, VisitDraft,
};
use crate::error::CoreResult;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users and Auth ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> CoreResult<User>;

    async fn get_user_by_email(&self, email: &str) -> CoreResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> CoreResult<User>;

    async fn set_confirmation_emails(&self, user_id: Uuid, enabled: bool) -> CoreResult<()>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Resolves a session cookie to the authenticated user.
    async fn validate_auth_session(&self, session_id: &str) -> CoreResult<User>;

    async fn delete_auth_session(&self, session_id: &str) -> CoreResult<()>;

    // --- Projects ---
    async fn create_project(&self, name: &str, owner_id: Uuid) -> CoreResult<Project>;

    /// Fetches a project with its collaborator set loaded.
    async fn get_project(&self, project_id: Uuid) -> CoreResult<Project>;

    async fn list_projects_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Project>>;

    async fn mark_project_finished(
        &self,
        project_id: Uuid,
        finished_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn add_collaborator(&self, project_id: Uuid, user_id: Uuid) -> CoreResult<()>;

    // --- Criteria Registry ---
    /// Appends a criteria at the project's next position index.
    async fn create_criteria(
        &self,
        project_id: Uuid,
        name: &str,
        kind: CriteriaKind,
        weight: Option<f64>,
        direction: Direction,
    ) -> CoreResult<Criteria>;

    /// Ordered by position, then creation time.
    async fn list_criteria(&self, project_id: Uuid) -> CoreResult<Vec<Criteria>>;

    /// Atomically rewrites every position value; all-or-nothing.
    async fn reorder_criteria(&self, project_id: Uuid, ordered_ids: &[Uuid]) -> CoreResult<()>;

    // --- Visits ---
    async fn create_visit(
        &self,
        project_id: Uuid,
        created_by: Uuid,
        draft: VisitDraft,
    ) -> CoreResult<Visit>;

    async fn get_visit(&self, visit_id: Uuid) -> CoreResult<Visit>;

    async fn list_visits(&self, project_id: Uuid) -> CoreResult<Vec<Visit>>;

    async fn update_visit(&self, visit_id: Uuid, draft: VisitDraft) -> CoreResult<Visit>;

    // --- Assessments ---
    /// Applies a validated batch of assessment writes for one visit in a
    /// single transaction: all of them land or none do. `None` clears the
    /// pair back to "unanswered"; last write wins per (visit, criteria).
    async fn apply_assessments(
        &self,
        visit_id: Uuid,
        changes: &[(Uuid, Option<AssessmentValue>)],
    ) -> CoreResult<()>;

    /// All assessments of all visits of the project, the raw input to the
    /// comparison engine.
    async fn list_assessments(&self, project_id: Uuid) -> CoreResult<Vec<Assessment>>;

    // --- Photos ---
    async fn add_photo(
        &self,
        visit_id: Uuid,
        handle: &str,
        content_type: &str,
        caption: Option<&str>,
    ) -> CoreResult<Photo>;

    async fn list_photos(&self, visit_id: Uuid) -> CoreResult<Vec<Photo>>;

    // --- Invitations ---
    async fn create_invitation(
        &self,
        project_id: Uuid,
        email: &str,
        invited_by: Uuid,
        token: Uuid,
    ) -> CoreResult<Invitation>;

    /// Marks the invitation accepted and adds the user as a collaborator,
    /// atomically. Unknown token is NotFound; an already-accepted token is
    /// a Conflict and leaves the collaborator set unchanged.
    async fn redeem_invitation(&self, token: Uuid, user_id: Uuid) -> CoreResult<Invitation>;

    async fn list_invitations(&self, project_id: Uuid) -> CoreResult<Vec<Invitation>>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends the collaboration invitation carrying the redeem link.
    async fn send_invitation(
        &self,
        to_address: &str,
        project_name: &str,
        invitation_url: &str,
        invited_by_email: &str,
    ) -> CoreResult<()>;

    /// Sends the opt-in confirmation after a visit is logged.
    async fn send_visit_confirmation(&self, to_address: &str, visit_name: &str)
        -> CoreResult<()>;
}

#[async_trait]
pub trait PhotoStoreService: Send + Sync {
    /// Stores the raw bytes and returns an opaque handle. The core only
    /// ever references handles, never the bytes themselves.
    async fn store(&self, bytes: &[u8], content_type: &str) -> CoreResult<String>;
}

/// Renders the canonical comparison matrix to one output format. Both the
/// CSV and the PDF renderer implement this against the same structure,
/// which is what keeps the two exports in lockstep.
pub trait MatrixRenderer: Send + Sync {
    fn render(&self, matrix: &ComparisonMatrix, meta: &ExportMetadata) -> CoreResult<Vec<u8>>;

    fn content_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;
}
