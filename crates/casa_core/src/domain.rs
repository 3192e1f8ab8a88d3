//! crates/casa_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format
//! used by the adapters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// A visit holds at most this many photos.
pub const MAX_PHOTOS_PER_VISIT: usize = 5;

// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    /// Whether the user wants a confirmation email after logging a visit.
    pub receive_confirmation_emails: bool,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// Lifecycle status of a project. Transitions Active -> Finished only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Finished,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "finished" => Ok(ProjectStatus::Finished),
            other => Err(CoreError::Infrastructure(format!(
                "Unknown project status '{}'",
                other
            ))),
        }
    }
}

/// A project represents a housing search with criteria and visits.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub collaborator_ids: Vec<Uuid>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the project is finished. Non-null iff
    /// `status == Finished`.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Check if the user is the owner or a collaborator.
    pub fn is_member(&self, user_id: Uuid) -> bool {
        user_id == self.owner_id || self.collaborator_ids.contains(&user_id)
    }

    /// Mark the project as finished. Finishing twice is a conflict.
    pub fn finish(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status == ProjectStatus::Finished {
            return Err(CoreError::Conflict(format!(
                "Project '{}' is already finished",
                self.name
            )));
        }
        self.status = ProjectStatus::Finished;
        self.finished_at = Some(now);
        Ok(())
    }
}

/// The value kind a criteria accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaKind {
    Boolean,
    Numeric,
    Text,
    Rating,
}

impl CriteriaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CriteriaKind::Boolean => "boolean",
            CriteriaKind::Numeric => "numeric",
            CriteriaKind::Text => "text",
            CriteriaKind::Rating => "rating",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "boolean" => Ok(CriteriaKind::Boolean),
            "numeric" => Ok(CriteriaKind::Numeric),
            "text" => Ok(CriteriaKind::Text),
            "rating" => Ok(CriteriaKind::Rating),
            other => Err(CoreError::Validation(format!(
                "Unknown criteria type '{}' (expected boolean, numeric, text or rating)",
                other
            ))),
        }
    }

    /// Text values carry no ordering and are excluded from stats and sort.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, CriteriaKind::Text)
    }
}

/// Which extreme of an orderable column counts as "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::HigherIsBetter => "higher_is_better",
            Direction::LowerIsBetter => "lower_is_better",
        }
    }

    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "higher_is_better" => Ok(Direction::HigherIsBetter),
            "lower_is_better" => Ok(Direction::LowerIsBetter),
            other => Err(CoreError::Validation(format!(
                "Unknown direction '{}' (expected higher_is_better or lower_is_better)",
                other
            ))),
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::HigherIsBetter
    }
}

/// An evaluation dimension of a project. Positions are dense and unique
/// within a project and define the column order of the comparison matrix.
#[derive(Debug, Clone, Serialize)]
pub struct Criteria {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub kind: CriteriaKind,
    /// Descriptive weight. Only used when a weighted score is explicitly
    /// requested; it never rescales or reorders anything on its own.
    pub weight: Option<f64>,
    pub direction: Direction,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// A visit to a specific property for evaluation.
#[derive(Debug, Clone)]
pub struct Visit {
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
    pub updated_at: DateTime<Utc>,
}

/// The fields supplied when creating or updating a visit.
#[derive(Debug, Clone)]
pub struct VisitDraft {
    pub name: String,
    pub address: String,
    pub realtor_name: Option<String>,
    pub realtor_contact: Option<String>,
    pub visit_date: NaiveDate,
    pub notes: String,
}

/// One typed assessment value. Exactly one variant is ever populated,
/// matching the kind of the criteria it answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AssessmentValue {
    Boolean(bool),
    Numeric(f64),
    Text(String),
    Rating(u8),
}

impl AssessmentValue {
    /// Parses raw text input against the kind of the named criteria.
    ///
    /// An empty raw value parses to `None`, meaning "unanswered": the
    /// assessment is cleared rather than stored.
    pub fn parse(criteria: &Criteria, raw: &str) -> CoreResult<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let value = match criteria.kind {
            CriteriaKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => AssessmentValue::Boolean(true),
                "false" | "no" | "0" => AssessmentValue::Boolean(false),
                _ => {
                    return Err(CoreError::Validation(format!(
                        "Criteria '{}' expects a boolean value, got '{}'",
                        criteria.name, raw
                    )))
                }
            },
            CriteriaKind::Numeric => {
                let n: f64 = raw.parse().map_err(|_| {
                    CoreError::Validation(format!(
                        "Criteria '{}' expects a numeric value, got '{}'",
                        criteria.name, raw
                    ))
                })?;
                if !n.is_finite() {
                    return Err(CoreError::Validation(format!(
                        "Criteria '{}' expects a finite numeric value",
                        criteria.name
                    )));
                }
                AssessmentValue::Numeric(n)
            }
            CriteriaKind::Text => AssessmentValue::Text(raw.to_string()),
            CriteriaKind::Rating => {
                let r: i64 = raw.parse().map_err(|_| {
                    CoreError::Validation(format!(
                        "Criteria '{}' expects a rating from 1 to 5, got '{}'",
                        criteria.name, raw
                    ))
                })?;
                if !(1..=5).contains(&r) {
                    return Err(CoreError::Validation(format!(
                        "Criteria '{}' expects a rating from 1 to 5, got {}",
                        criteria.name, r
                    )));
                }
                AssessmentValue::Rating(r as u8)
            }
        };
        Ok(Some(value))
    }

    pub fn kind(&self) -> CriteriaKind {
        match self {
            AssessmentValue::Boolean(_) => CriteriaKind::Boolean,
            AssessmentValue::Numeric(_) => CriteriaKind::Numeric,
            AssessmentValue::Text(_) => CriteriaKind::Text,
            AssessmentValue::Rating(_) => CriteriaKind::Rating,
        }
    }

    /// The comparable key for sorting and min/max stats. Text values are
    /// not orderable and yield `None`. Booleans compare true > false.
    pub fn comparable(&self) -> Option<f64> {
        match self {
            AssessmentValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            AssessmentValue::Numeric(n) => Some(*n),
            AssessmentValue::Rating(r) => Some(*r as f64),
            AssessmentValue::Text(_) => None,
        }
    }

    /// The canonical display text, shared by the interactive view and both
    /// export renderers so that all of them agree on cell content.
    pub fn display(&self) -> String {
        match self {
            AssessmentValue::Boolean(true) => "Yes".to_string(),
            AssessmentValue::Boolean(false) => "No".to_string(),
            AssessmentValue::Numeric(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            AssessmentValue::Text(t) => t.clone(),
            AssessmentValue::Rating(r) => format!("{}", r),
        }
    }
}

/// Assessment of a visit against one criteria of the same project.
/// At most one exists per (visit, criteria) pair.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub criteria_id: Uuid,
    pub value: AssessmentValue,
    pub updated_at: DateTime<Utc>,
}

/// A photo attached to a visit. The binary lives in the photo store; only
/// the opaque handle is kept here.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub handle: String,
    pub content_type: String,
    pub caption: Option<String>,
    pub position: i32,
    pub uploaded_at: DateTime<Utc>,
}

/// An invitation to collaborate on a project, redeemable once via its token.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub id: Uuid,
    pub project_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub token: Uuid,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Marks the invitation accepted. A second acceptance is a conflict,
    /// never silently ignored.
    pub fn accept(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.accepted {
            return Err(CoreError::Conflict(
                "Invitation has already been accepted".to_string(),
            ));
        }
        self.accepted = true;
        self.accepted_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn criteria(kind: CriteriaKind) -> Criteria {
        Criteria {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "Test Criteria".to_string(),
            kind,
            weight: None,
            direction: Direction::default(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn boolean_values_parse_common_spellings() {
        let c = criteria(CriteriaKind::Boolean);
        for raw in ["true", "Yes", "1"] {
            assert_eq!(
                AssessmentValue::parse(&c, raw).unwrap(),
                Some(AssessmentValue::Boolean(true))
            );
        }
        for raw in ["false", "NO", "0"] {
            assert_eq!(
                AssessmentValue::parse(&c, raw).unwrap(),
                Some(AssessmentValue::Boolean(false))
            );
        }
        assert!(matches!(
            AssessmentValue::parse(&c, "maybe"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn numeric_values_parse_reals() {
        let c = criteria(CriteriaKind::Numeric);
        assert_eq!(
            AssessmentValue::parse(&c, "2500.50").unwrap(),
            Some(AssessmentValue::Numeric(2500.50))
        );
        assert!(matches!(
            AssessmentValue::parse(&c, "not a number"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn rating_outside_range_is_rejected() {
        let c = criteria(CriteriaKind::Rating);
        assert_eq!(
            AssessmentValue::parse(&c, "4").unwrap(),
            Some(AssessmentValue::Rating(4))
        );
        for raw in ["0", "6", "-1", "3.5"] {
            assert!(
                matches!(
                    AssessmentValue::parse(&c, raw),
                    Err(CoreError::Validation(_))
                ),
                "rating '{}' should be rejected",
                raw
            );
        }
    }

    #[test]
    fn empty_input_means_unanswered() {
        let c = criteria(CriteriaKind::Text);
        assert_eq!(AssessmentValue::parse(&c, "").unwrap(), None);
        assert_eq!(AssessmentValue::parse(&c, "   ").unwrap(), None);
    }

    #[test]
    fn validation_message_names_the_criteria() {
        let c = criteria(CriteriaKind::Rating);
        let err = AssessmentValue::parse(&c, "9").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Test Criteria"));
        assert!(msg.contains("1 to 5"));
    }

    #[test]
    fn finish_sets_timestamp_once() {
        let mut project = Project {
            id: Uuid::new_v4(),
            name: "Q1 Move".to_string(),
            owner_id: Uuid::new_v4(),
            collaborator_ids: vec![],
            status: ProjectStatus::Active,
            created_at: Utc::now(),
            finished_at: None,
        };
        assert!(project.finished_at.is_none());
        project.finish(Utc::now()).unwrap();
        assert_eq!(project.status, ProjectStatus::Finished);
        assert!(project.finished_at.is_some());
        assert!(matches!(
            project.finish(Utc::now()),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn invitation_accepts_exactly_once() {
        let mut invitation = Invitation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            email: "invite@example.com".to_string(),
            invited_by: Uuid::new_v4(),
            token: Uuid::new_v4(),
            accepted: false,
            created_at: Utc::now(),
            accepted_at: None,
        };
        invitation.accept(Utc::now()).unwrap();
        assert!(invitation.accepted);
        assert!(invitation.accepted_at.is_some());
        assert!(matches!(
            invitation.accept(Utc::now()),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn display_values_are_stable() {
        assert_eq!(AssessmentValue::Boolean(true).display(), "Yes");
        assert_eq!(AssessmentValue::Numeric(450000.0).display(), "450000");
        assert_eq!(AssessmentValue::Numeric(2500.5).display(), "2500.5");
        assert_eq!(AssessmentValue::Rating(4).display(), "4");
        assert_eq!(
            AssessmentValue::Text("Great location".to_string()).display(),
            "Great location"
        );
    }
}
