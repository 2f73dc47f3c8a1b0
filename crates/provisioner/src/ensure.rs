//! The describe → create-if-absent → verify pattern shared by every required
//! resource.

use tracing::{info, warn};

use crate::cloud::{CloudError, CloudResult};
use crate::error::ProvisionError;
use crate::outcome::{Outcome, ResourceKind};
use crate::ui;

/// Ensure a required resource exists.
///
/// `exists` is called before creation and again afterwards to verify. A
/// create call rejected with "already exists" counts as success, which covers
/// the window between describe and create.
///
/// # Errors
///
/// Returns [`ProvisionError::RequiredResource`] if the describe or create call
/// fails, or the resource is still absent after creation.
pub fn ensure_required<E, C>(
    kind: ResourceKind,
    name: &str,
    exists: E,
    create: C,
) -> Result<Outcome, ProvisionError>
where
    E: Fn() -> CloudResult<bool>,
    C: FnOnce() -> CloudResult<()>,
{
    if exists().map_err(|e| ProvisionError::required(kind, name, e))? {
        ui::print_warning(&format!("{kind} {name} already exists"));
        info!(resource = %kind, name, "Resource already exists");
        return Ok(Outcome::AlreadyExists);
    }

    ui::print_info(&format!("Creating {kind} {name}..."));
    match create() {
        Ok(()) => {}
        Err(e) if e.is_already_exists() => {
            warn!(resource = %kind, name, "Create reported already exists");
            ui::print_warning(&format!("{kind} {name} already exists"));
            return Ok(Outcome::AlreadyExists);
        }
        Err(e) => return Err(ProvisionError::required(kind, name, e)),
    }

    if !exists().map_err(|e| ProvisionError::required(kind, name, e))? {
        return Err(ProvisionError::required(
            kind,
            name,
            CloudError::Parse {
                command: format!("describe {kind} {name}"),
                message: "resource not visible after creation".to_string(),
            },
        ));
    }

    info!(resource = %kind, name, "Resource created");
    ui::print_success(&format!("Created {kind} {name}"));
    Ok(Outcome::Ensured)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn failure(stderr: &str) -> CloudError {
        CloudError::CommandFailed {
            command: "create".into(),
            status: "exit status: 1".into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_existing_resource_skips_create() {
        let created = Cell::new(false);
        let outcome = ensure_required(
            ResourceKind::Bucket,
            "b",
            || Ok(true),
            || {
                created.set(true);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(outcome, Outcome::AlreadyExists);
        assert!(!created.get());
    }

    #[test]
    fn test_absent_resource_is_created_and_verified() {
        let present = Cell::new(false);
        let outcome = ensure_required(
            ResourceKind::Dataset,
            "d",
            || Ok(present.get()),
            || {
                present.set(true);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Ensured);
    }

    #[test]
    fn test_create_race_is_success() {
        let outcome = ensure_required(
            ResourceKind::Project,
            "p",
            || Ok(false),
            || Err(failure("Project already exists")),
        )
        .unwrap();
        assert_eq!(outcome, Outcome::AlreadyExists);
    }

    #[test]
    fn test_create_failure_is_fatal() {
        let err = ensure_required(
            ResourceKind::Table,
            "t",
            || Ok(false),
            || Err(failure("Access Denied")),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::RequiredResource {
                resource: ResourceKind::Table,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_after_create_is_fatal() {
        let err = ensure_required(ResourceKind::Bucket, "b", || Ok(false), || Ok(())).unwrap_err();
        assert!(err.to_string().contains("not visible after creation"));
    }
}
