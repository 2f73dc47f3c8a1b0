//! Service account, key rotation and role grants.

use tracing::{info, warn};

use crate::cloud::CloudCli;
use crate::ensure::ensure_required;
use crate::error::ProvisionError;
use crate::names::ResourceNames;
use crate::outcome::{Outcome, ResourceKind};
use crate::ui;

/// Display name of the service account.
pub const SERVICE_ACCOUNT_DISPLAY_NAME: &str = "PDF Processor";

/// Roles the application needs.
pub const REQUIRED_ROLES: [&str; 4] = [
    "roles/storage.admin",
    "roles/bigquery.dataEditor",
    "roles/bigquery.jobUser",
    "roles/aiplatform.user",
];

/// Result of a key rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRotation {
    /// User-managed keys removed.
    pub deleted: Vec<String>,
    /// Keys that could not be removed, with the provider error.
    pub failed_deletes: Vec<(String, String)>,
}

/// Ensure the service account exists.
///
/// # Errors
///
/// Fatal if the account cannot be described or created.
pub fn ensure_service_account<C: CloudCli>(
    cloud: &C,
    names: &ResourceNames,
) -> Result<Outcome, ProvisionError> {
    let project = names.project.as_str();
    ensure_required(
        ResourceKind::ServiceAccount,
        &names.service_account_email,
        || cloud.service_account_exists(project, &names.service_account_email),
        || {
            cloud.create_service_account(
                project,
                &names.service_account_name,
                SERVICE_ACCOUNT_DISPLAY_NAME,
            )
        },
    )
}

/// Delete every user-managed key, then write one fresh key to the key path.
///
/// Provider-managed keys are never listed and so never touched. A key that
/// cannot be deleted is reported but does not stop the rotation.
///
/// # Errors
///
/// Fatal if keys cannot be listed, the output directory cannot be created, or
/// the new key cannot be created.
pub fn rotate_keys<C: CloudCli>(
    cloud: &C,
    names: &ResourceNames,
) -> Result<KeyRotation, ProvisionError> {
    let project = names.project.as_str();
    let email = &names.service_account_email;
    let key_name = names.key_path.display().to_string();

    let existing = cloud
        .list_user_managed_keys(project, email)
        .map_err(|e| ProvisionError::required(ResourceKind::CredentialKey, &key_name, e))?;

    let mut rotation = KeyRotation::default();
    for key in existing {
        match cloud.delete_key(project, email, &key) {
            Ok(()) => {
                info!(key = %key, "Deleted user-managed key");
                rotation.deleted.push(key);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Could not delete key");
                ui::print_warning(&format!("Could not delete key {key}: {e}"));
                rotation.failed_deletes.push((key, e.to_string()));
            }
        }
    }
    if !rotation.deleted.is_empty() {
        ui::print_info(&format!(
            "Deleted {} existing user-managed key(s)",
            rotation.deleted.len()
        ));
    }

    if let Some(parent) = names.key_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| ProvisionError::Artifact {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    cloud
        .create_key(project, email, &names.key_path)
        .map_err(|e| ProvisionError::required(ResourceKind::CredentialKey, &key_name, e))?;
    info!(path = %key_name, "Created service account key");
    ui::print_success(&format!("Wrote new key to {key_name}"));

    Ok(rotation)
}

/// Bind each role in [`REQUIRED_ROLES`] independently. Never fatal.
pub fn grant_roles<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Vec<(&'static str, Outcome)> {
    let project = names.project.as_str();
    let member = names.member();

    REQUIRED_ROLES
        .iter()
        .map(|&role| match cloud.add_role_binding(project, &member, role) {
            Ok(()) => {
                ui::print_success(&format!("Granted {role}"));
                (role, Outcome::Ensured)
            }
            Err(e) => {
                let reason = e
                    .provider_message()
                    .map_or_else(|| e.to_string(), str::to_string);
                warn!(role, %reason, "Role grant failed");
                ui::print_warning(&format!("Could not grant {role}: {reason}"));
                (role, Outcome::Failed(reason))
            }
        })
        .collect()
}
