//! Read-only status report.
//!
//! Runs only the describe side of every step. Nothing is created, deleted or
//! bound.

use std::collections::HashSet;
use std::fmt;

use colored::Colorize;
use tracing::debug;

use crate::apis::REQUIRED_APIS;
use crate::cloud::{CloudCli, CloudResult, IndexKind};
use crate::names::ResourceNames;
use crate::outcome::ResourceKind;
use crate::schema::TableSchema;
use crate::ui;

/// Observed state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    Present,
    Missing,
    /// Present but not as expected, e.g. a schema drift.
    Drifted(String),
    /// The lookup itself failed.
    Unknown(String),
}

impl ResourceState {
    fn from_lookup(result: CloudResult<bool>) -> Self {
        match result {
            Ok(true) => Self::Present,
            Ok(false) => Self::Missing,
            Err(e) => Self::Unknown(e.to_string()),
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present | Self::Drifted(_))
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Missing => f.write_str("missing"),
            Self::Drifted(detail) => write!(f, "drifted ({detail})"),
            Self::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// One line of the status report.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub resource: ResourceKind,
    pub name: String,
    pub state: ResourceState,
}

/// Collected status of every resource.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub entries: Vec<StatusEntry>,
    /// Number of user-managed keys on the service account, when known.
    pub user_managed_keys: Option<usize>,
}

impl StatusReport {
    fn push(&mut self, resource: ResourceKind, name: impl Into<String>, state: ResourceState) {
        self.entries.push(StatusEntry {
            resource,
            name: name.into(),
            state,
        });
    }

    /// State recorded for a resource, if it was inspected.
    #[must_use]
    pub fn state_of(&self, resource: ResourceKind, name: &str) -> Option<&ResourceState> {
        self.entries
            .iter()
            .find(|e| e.resource == resource && e.name == name)
            .map(|e| &e.state)
    }

    /// Whether every inspected resource is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.state.is_present())
    }
}

/// Inspect every resource for `names.project`.
///
/// A missing project short-circuits: nothing inside it can exist.
pub fn collect<C: CloudCli>(cloud: &C, names: &ResourceNames) -> StatusReport {
    let project = names.project.as_str();
    let mut report = StatusReport::default();

    let project_state = ResourceState::from_lookup(cloud.project_exists(project));
    let project_missing = project_state == ResourceState::Missing;
    report.push(ResourceKind::Project, project, project_state);
    if project_missing {
        return report;
    }

    report.push(
        ResourceKind::BillingLink,
        project,
        ResourceState::from_lookup(cloud.billing_enabled(project)),
    );

    match cloud.enabled_services(project) {
        Ok(enabled) => {
            let enabled: HashSet<String> = enabled.into_iter().collect();
            for api in REQUIRED_APIS {
                let state = if enabled.contains(api) {
                    ResourceState::Present
                } else {
                    ResourceState::Missing
                };
                report.push(ResourceKind::Api, api, state);
            }
        }
        Err(e) => {
            for api in REQUIRED_APIS {
                report.push(ResourceKind::Api, api, ResourceState::Unknown(e.to_string()));
            }
        }
    }

    report.push(
        ResourceKind::Bucket,
        &names.bucket,
        ResourceState::from_lookup(cloud.bucket_exists(project, &names.bucket)),
    );
    report.push(
        ResourceKind::Dataset,
        &names.dataset,
        ResourceState::from_lookup(cloud.dataset_exists(project, &names.dataset)),
    );

    let mut table = ResourceState::from_lookup(cloud.table_exists(project, &names.dataset, &names.table));
    if table == ResourceState::Present {
        match cloud.table_schema(project, &names.dataset, &names.table) {
            Ok(actual) => {
                let diffs = TableSchema::pdf_chunks().differences(&actual);
                if !diffs.is_empty() {
                    table = ResourceState::Drifted(diffs.join("; "));
                }
            }
            Err(e) => debug!(error = %e, "Schema lookup failed"),
        }
    }
    let table_present = table.is_present();
    report.push(ResourceKind::Table, &names.table, table);

    for (kind, resource, index) in [
        (IndexKind::Search, ResourceKind::TextIndex, &names.text_index),
        (IndexKind::Vector, ResourceKind::VectorIndex, &names.vector_index),
    ] {
        let state = if table_present {
            ResourceState::from_lookup(cloud.index_exists(
                project,
                &names.region,
                &names.dataset,
                &names.table,
                kind,
                index,
            ))
        } else {
            ResourceState::Missing
        };
        report.push(resource, index, state);
    }

    let account = ResourceState::from_lookup(
        cloud.service_account_exists(project, &names.service_account_email),
    );
    if account == ResourceState::Present {
        match cloud.list_user_managed_keys(project, &names.service_account_email) {
            Ok(keys) => report.user_managed_keys = Some(keys.len()),
            Err(e) => debug!(error = %e, "Key listing failed"),
        }
    }
    report.push(ResourceKind::ServiceAccount, &names.service_account_email, account);

    let key_state = if names.key_path.is_file() {
        ResourceState::Present
    } else {
        ResourceState::Missing
    };
    report.push(
        ResourceKind::CredentialKey,
        names.key_path.display().to_string(),
        key_state,
    );

    report
}

/// Print the report.
pub fn print(report: &StatusReport) {
    for entry in &report.entries {
        let state = match &entry.state {
            ResourceState::Present => entry.state.to_string().green(),
            ResourceState::Missing => entry.state.to_string().red(),
            ResourceState::Drifted(_) | ResourceState::Unknown(_) => {
                entry.state.to_string().yellow()
            }
        };
        println!(
            "  {:<18} {:<48} {}",
            entry.resource.to_string().bright_black(),
            entry.name,
            state
        );
    }
    if let Some(count) = report.user_managed_keys {
        println!();
        ui::print_kv("User-managed keys", &count.to_string());
    }
    println!();
    if report.is_complete() {
        ui::print_success("All resources present");
    } else {
        ui::print_warning("Some resources are missing; run `pdf-provision provision` to create them");
    }
}
