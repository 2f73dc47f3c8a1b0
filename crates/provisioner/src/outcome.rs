//! Per-step outcomes and the run report.

use std::fmt;

use serde::Serialize;

use crate::state::ProvisionStep;

/// Kind of cloud resource an ensure step acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    BillingLink,
    Api,
    Bucket,
    Dataset,
    Table,
    TextIndex,
    VectorIndex,
    ServiceAccount,
    CredentialKey,
    RoleGrant,
}

impl ResourceKind {
    /// Whether a failure on this resource aborts the run.
    #[must_use]
    pub fn is_required(self) -> bool {
        !matches!(self, Self::TextIndex | Self::VectorIndex | Self::RoleGrant)
    }

    /// Console steps an operator can follow when the CLI path fails.
    #[must_use]
    pub fn console_fallback(self) -> &'static str {
        match self {
            Self::Project => {
                "Create the project in the Cloud Console: IAM & Admin > Create a Project."
            }
            Self::BillingLink => {
                "Attach a billing account in the Cloud Console: Billing > Link a billing account."
            }
            Self::Api => "Enable the API in the Cloud Console: APIs & Services > Library.",
            Self::Bucket => {
                "Create the bucket in the Cloud Console: Cloud Storage > Buckets > Create."
            }
            Self::Dataset => {
                "Create the dataset in the Cloud Console: BigQuery > Create dataset."
            }
            Self::Table => {
                "Run the CREATE TABLE statement from setup-summary.txt in the BigQuery editor."
            }
            Self::TextIndex => {
                "Search falls back to unindexed keyword matching until the index exists."
            }
            Self::VectorIndex => {
                "Vector search runs without acceleration. Vector indexes need a populated table;\n\
                 re-run after loading documents."
            }
            Self::ServiceAccount => {
                "Create the service account in the Cloud Console: IAM & Admin > Service Accounts."
            }
            Self::CredentialKey => {
                "Create a JSON key in the Cloud Console: Service Accounts > Keys > Add key."
            }
            Self::RoleGrant => {
                "Grant the role in the Cloud Console: IAM & Admin > IAM > Grant access."
            }
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::BillingLink => "billing link",
            Self::Api => "API",
            Self::Bucket => "bucket",
            Self::Dataset => "dataset",
            Self::Table => "table",
            Self::TextIndex => "text search index",
            Self::VectorIndex => "vector index",
            Self::ServiceAccount => "service account",
            Self::CredentialKey => "credential key",
            Self::RoleGrant => "role grant",
        };
        f.write_str(name)
    }
}

/// Result of a single ensure operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// The resource was created (or the action performed) by this run.
    Ensured,
    /// The resource was already in the desired state.
    AlreadyExists,
    /// The action failed; only recorded for non-fatal resources.
    Failed(String),
}

impl Outcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One line of the run report.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: ProvisionStep,
    pub resource: ResourceKind,
    pub name: String,
    pub outcome: Outcome,
}

/// Ordered record of everything a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvisionReport {
    pub project_id: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub records: Vec<StepRecord>,
    /// Key ids removed during rotation.
    pub deleted_keys: Vec<String>,
    /// Key ids that could not be removed, with the provider error.
    pub failed_key_deletes: Vec<(String, String)>,
}

impl ProvisionReport {
    /// Start an empty report stamped with the current time.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    /// Append a record.
    pub fn record(
        &mut self,
        step: ProvisionStep,
        resource: ResourceKind,
        name: impl Into<String>,
        outcome: Outcome,
    ) {
        self.records.push(StepRecord {
            step,
            resource,
            name: name.into(),
            outcome,
        });
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Outcome recorded for a named resource, if any.
    #[must_use]
    pub fn outcome_for(&self, resource: ResourceKind, name: &str) -> Option<&Outcome> {
        self.records
            .iter()
            .rev()
            .find(|r| r.resource == resource && r.name == name)
            .map(|r| &r.outcome)
    }

    /// Number of records where this run created something.
    #[must_use]
    pub fn ensured_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == Outcome::Ensured)
            .count()
    }

    /// Records that failed without aborting the run.
    pub fn warnings(&self) -> impl Iterator<Item = &StepRecord> {
        self.records.iter().filter(|r| r.outcome.is_failed())
    }
}
