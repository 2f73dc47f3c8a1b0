//! Provisioning step sequence.

use serde::Serialize;

/// Steps of a provisioning run, in execution order.
///
/// The order is fixed: later steps assume the resources of earlier steps exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    /// Checking CLI tools and authentication.
    Preflight,
    /// Selecting or creating the project.
    ResolvingProject,
    /// Ensuring a billing account is attached.
    LinkingBilling,
    /// Enabling provider APIs.
    EnablingApis,
    /// Ensuring the chunk bucket.
    EnsuringBucket,
    /// Ensuring the dataset.
    EnsuringDataset,
    /// Ensuring the chunk table.
    EnsuringTable,
    /// Creating search and vector indexes (best-effort).
    EnsuringIndexes,
    /// Ensuring the service account.
    EnsuringIdentity,
    /// Replacing user-managed keys with a fresh one.
    RotatingKeys,
    /// Binding roles to the service account (best-effort).
    GrantingRoles,
    /// Writing env file, summary and helpers.
    EmittingArtifacts,
    /// Run finished.
    Complete,
}

impl ProvisionStep {
    /// Total number of steps, used for progress display.
    pub const TOTAL_STEPS: u8 = 12;

    /// Get the next step in the sequence.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Preflight => Self::ResolvingProject,
            Self::ResolvingProject => Self::LinkingBilling,
            Self::LinkingBilling => Self::EnablingApis,
            Self::EnablingApis => Self::EnsuringBucket,
            Self::EnsuringBucket => Self::EnsuringDataset,
            Self::EnsuringDataset => Self::EnsuringTable,
            Self::EnsuringTable => Self::EnsuringIndexes,
            Self::EnsuringIndexes => Self::EnsuringIdentity,
            Self::EnsuringIdentity => Self::RotatingKeys,
            Self::RotatingKeys => Self::GrantingRoles,
            Self::GrantingRoles => Self::EmittingArtifacts,
            Self::EmittingArtifacts | Self::Complete => Self::Complete,
        }
    }

    /// Get a human-readable description of the step.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Preflight => "Checking gcloud and authentication",
            Self::ResolvingProject => "Resolving project",
            Self::LinkingBilling => "Checking billing account",
            Self::EnablingApis => "Enabling APIs",
            Self::EnsuringBucket => "Ensuring storage bucket",
            Self::EnsuringDataset => "Ensuring BigQuery dataset",
            Self::EnsuringTable => "Ensuring BigQuery table",
            Self::EnsuringIndexes => "Creating search and vector indexes",
            Self::EnsuringIdentity => "Ensuring service account",
            Self::RotatingKeys => "Rotating service account key",
            Self::GrantingRoles => "Granting roles",
            Self::EmittingArtifacts => "Writing environment file and summary",
            Self::Complete => "Complete",
        }
    }

    /// Get the step number (1-based, `Complete` equals the total).
    #[must_use]
    pub fn step_number(self) -> u8 {
        match self {
            Self::Preflight => 1,
            Self::ResolvingProject => 2,
            Self::LinkingBilling => 3,
            Self::EnablingApis => 4,
            Self::EnsuringBucket => 5,
            Self::EnsuringDataset => 6,
            Self::EnsuringTable => 7,
            Self::EnsuringIndexes => 8,
            Self::EnsuringIdentity => 9,
            Self::RotatingKeys => 10,
            Self::GrantingRoles => 11,
            Self::EmittingArtifacts | Self::Complete => 12,
        }
    }
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
