pub mod access;
pub mod comparison;
pub mod domain;
pub mod error;
pub mod ports;

pub use comparison::{
    ComparisonMatrix, ExportMetadata, Filter, FilterOp, MatrixCell, MatrixRow, SortDirection,
    WeightedScore,
};
pub use domain::{
    Assessment, AssessmentValue, Criteria, CriteriaKind, Direction, Invitation, Photo, Project,
    ProjectStatus, User, UserCredentials, Visit, VisitDraft, MAX_PHOTOS_PER_VISIT,
};
pub use error::{CoreError, CoreResult};
pub use ports::{DatabaseService, EmailService, MatrixRenderer, PhotoStoreService};
