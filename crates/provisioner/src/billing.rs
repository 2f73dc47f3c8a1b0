//! Billing account linkage.

use tracing::{info, warn};

use crate::cloud::{CloudCli, CloudError};
use crate::config::{BillingPolicy, ProvisionConfig};
use crate::error::ProvisionError;
use crate::names::ProjectId;
use crate::outcome::{Outcome, ResourceKind};
use crate::prompt::Prompter;
use crate::ui;

/// Ensure the project has a billing account attached.
///
/// Returns `None` when the policy skips the check.
///
/// # Errors
///
/// Under [`BillingPolicy::Require`], fails when billing status cannot be read,
/// no account can be chosen, or linking fails.
pub fn ensure<C: CloudCli, P: Prompter>(
    cloud: &C,
    prompter: &P,
    config: &ProvisionConfig,
    project: &ProjectId,
) -> Result<Option<Outcome>, ProvisionError> {
    if config.billing == BillingPolicy::Skip {
        warn!(project = %project, "Billing check skipped");
        ui::print_warning(
            "Skipping billing check; storage and BigQuery calls fail if the project has no billing account",
        );
        return Ok(None);
    }

    let id = project.as_str();
    let required = |e: CloudError| ProvisionError::required(ResourceKind::BillingLink, id, e);

    if cloud.billing_enabled(id).map_err(required)? {
        ui::print_warning(&format!("Billing already enabled for {project}"));
        return Ok(Some(Outcome::AlreadyExists));
    }

    let account = match &config.billing_account {
        Some(account) => account.clone(),
        None => {
            let open: Vec<_> = cloud
                .list_billing_accounts()
                .map_err(required)?
                .into_iter()
                .filter(|a| a.open)
                .collect();
            if open.is_empty() {
                return Err(ProvisionError::Validation(format!(
                    "project {project} has no billing account and none is available to link"
                )));
            }
            let Some(idx) = prompter.choose_billing_account(&open)? else {
                return Err(ProvisionError::Validation(
                    "a billing account is required; pass --billing-account".to_string(),
                ));
            };
            open.get(idx)
                .map(|a| a.id.clone())
                .ok_or_else(|| ProvisionError::Validation("billing selection out of range".to_string()))?
        }
    };

    ui::print_info(&format!("Linking billing account {account}..."));
    cloud.link_billing(id, &account).map_err(required)?;
    info!(project = %project, billing_account = %account, "Billing linked");
    ui::print_success(&format!("Linked billing account {account}"));
    Ok(Some(Outcome::Ensured))
}
