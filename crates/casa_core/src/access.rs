//! crates/casa_core/src/access.rs
//!
//! The access-control gate. Every rule takes the acting user explicitly;
//! there is no ambient "current user" anywhere in the core.

use uuid::Uuid;

use crate::domain::{Project, ProjectStatus};
use crate::error::{CoreError, CoreResult};

/// A user may read a project's data iff they are the owner or a collaborator.
pub fn can_read(user_id: Uuid, project: &Project) -> bool {
    project.is_member(user_id)
}

/// A user may write iff they are a member and the project is still active.
pub fn can_write(user_id: Uuid, project: &Project) -> bool {
    project.is_member(user_id) && project.status == ProjectStatus::Active
}

/// Only the owner may administer: finish the project, manage invitations
/// and collaborators.
pub fn can_administer(user_id: Uuid, project: &Project) -> bool {
    user_id == project.owner_id
}

/// A project invisible to the user is reported as not found, never as a
/// permission failure, so its existence does not leak.
pub fn ensure_read(user_id: Uuid, project: &Project) -> CoreResult<()> {
    if can_read(user_id, project) {
        Ok(())
    } else {
        Err(CoreError::NotFound(format!("Project {}", project.id)))
    }
}

pub fn ensure_write(user_id: Uuid, project: &Project) -> CoreResult<()> {
    ensure_read(user_id, project)?;
    if project.status != ProjectStatus::Active {
        return Err(CoreError::Conflict(format!(
            "Project '{}' is finished and can no longer be modified",
            project.name
        )));
    }
    Ok(())
}

pub fn ensure_administer(user_id: Uuid, project: &Project) -> CoreResult<()> {
    ensure_read(user_id, project)?;
    if can_administer(user_id, project) {
        Ok(())
    } else {
        Err(CoreError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn project(owner: Uuid, collaborators: Vec<Uuid>, status: ProjectStatus) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Test Project".to_string(),
            owner_id: owner,
            collaborator_ids: collaborators,
            status,
            created_at: Utc::now(),
            finished_at: match status {
                ProjectStatus::Active => None,
                ProjectStatus::Finished => Some(Utc::now()),
            },
        }
    }

    #[test]
    fn members_read_and_write_active_projects() {
        let owner = Uuid::new_v4();
        let collaborator = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let p = project(owner, vec![collaborator], ProjectStatus::Active);

        assert!(can_read(owner, &p));
        assert!(can_read(collaborator, &p));
        assert!(!can_read(stranger, &p));

        assert!(can_write(owner, &p));
        assert!(can_write(collaborator, &p));
        assert!(!can_write(stranger, &p));
    }

    #[test]
    fn finished_projects_are_read_only() {
        let owner = Uuid::new_v4();
        let p = project(owner, vec![], ProjectStatus::Finished);

        assert!(can_read(owner, &p));
        assert!(!can_write(owner, &p));
        assert!(matches!(
            ensure_write(owner, &p),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn only_the_owner_administers() {
        let owner = Uuid::new_v4();
        let collaborator = Uuid::new_v4();
        let p = project(owner, vec![collaborator], ProjectStatus::Active);

        assert!(can_administer(owner, &p));
        assert!(!can_administer(collaborator, &p));
        assert!(matches!(
            ensure_administer(collaborator, &p),
            Err(CoreError::Unauthorized)
        ));
    }

    #[test]
    fn invisible_projects_surface_as_not_found() {
        let stranger = Uuid::new_v4();
        let p = project(Uuid::new_v4(), vec![], ProjectStatus::Active);
        assert!(matches!(
            ensure_write(stranger, &p),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            ensure_administer(stranger, &p),
            Err(CoreError::NotFound(_))
        ));
    }
}
