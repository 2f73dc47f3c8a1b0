//! Provider API enablement.

use std::collections::HashSet;

use tracing::info;

use crate::cloud::CloudCli;
use crate::error::ProvisionError;
use crate::names::ProjectId;
use crate::outcome::{Outcome, ResourceKind};
use crate::ui;

/// Services the PDF pipeline depends on.
pub const REQUIRED_APIS: [&str; 6] = [
    "cloudresourcemanager.googleapis.com",
    "iam.googleapis.com",
    "storage.googleapis.com",
    "bigquery.googleapis.com",
    "bigquerystorage.googleapis.com",
    "aiplatform.googleapis.com",
];

/// Enable every API in [`REQUIRED_APIS`] that is not already enabled.
///
/// The enabled set is fetched once. Returns one outcome per API, in order.
///
/// # Errors
///
/// The first failed listing or enable call aborts the step; downstream steps
/// assume every API is active.
pub fn ensure<C: CloudCli>(
    cloud: &C,
    project: &ProjectId,
) -> Result<Vec<(&'static str, Outcome)>, ProvisionError> {
    let id = project.as_str();
    let enabled: HashSet<String> = cloud
        .enabled_services(id)
        .map_err(|e| ProvisionError::required(ResourceKind::Api, "services list", e))?
        .into_iter()
        .collect();

    let mut outcomes = Vec::with_capacity(REQUIRED_APIS.len());
    for api in REQUIRED_APIS {
        if enabled.contains(api) {
            ui::print_warning(&format!("{api} already enabled"));
            outcomes.push((api, Outcome::AlreadyExists));
            continue;
        }

        ui::print_info(&format!("Enabling {api}..."));
        cloud
            .enable_service(id, api)
            .map_err(|e| ProvisionError::required(ResourceKind::Api, api, e))?;
        info!(project = %project, api, "API enabled");
        ui::print_success(&format!("Enabled {api}"));
        outcomes.push((api, Outcome::Ensured));
    }

    Ok(outcomes)
}
