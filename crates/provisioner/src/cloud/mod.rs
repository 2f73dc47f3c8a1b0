//! Cloud CLI boundary.
//!
//! The provisioner never calls provider APIs directly. Every interaction goes
//! through [`CloudCli`], implemented for the real `gcloud`/`bq` tools by
//! [`GcloudCli`] and by in-memory fakes in tests.

mod gcloud;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldSpec;

pub use gcloud::GcloudCli;

/// Errors raised by a cloud CLI invocation.
#[derive(Error, Debug)]
pub enum CloudError {
    /// The CLI binary is not on `PATH`.
    #[error("{tool} not found on PATH")]
    ToolMissing { tool: String },

    /// The process could not be spawned.
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero.
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The command succeeded but its output was not understood.
    #[error("Unexpected output from `{command}`: {message}")]
    Parse { command: String, message: String },
}

impl CloudError {
    /// Whether the provider reported that the resource already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => {
                let lower = stderr.to_lowercase();
                lower.contains("already exists") || lower.contains("alreadyexists")
            }
            _ => false,
        }
    }

    /// Provider error text, when the command actually ran.
    #[must_use]
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }
}

/// Result type for cloud CLI calls.
pub type CloudResult<T> = Result<T, CloudError>;

/// A billing account visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAccount {
    /// Account id, e.g. `0123AB-4567CD-89EF01`.
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub open: bool,
}

/// Which warehouse index catalogue to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Search,
    Vector,
}

impl IndexKind {
    /// `INFORMATION_SCHEMA` view listing indexes of this kind.
    #[must_use]
    pub fn information_schema_view(self) -> &'static str {
        match self {
            Self::Search => "SEARCH_INDEXES",
            Self::Vector => "VECTOR_INDEXES",
        }
    }
}

/// Operations the provisioner needs from the cloud provider.
///
/// Existence checks return `Ok(false)` for absent resources; only genuine
/// failures (permissions, transport, unparseable output) are `Err`.
pub trait CloudCli {
    /// Whether a CLI binary can be found.
    fn tool_available(&self, tool: &str) -> bool;

    /// Accounts currently authenticated and active.
    fn active_accounts(&self) -> CloudResult<Vec<String>>;

    /// Project ids visible to the active account.
    fn list_projects(&self) -> CloudResult<Vec<String>>;
    /// Project configured as the CLI default, if any.
    fn active_project(&self) -> CloudResult<Option<String>>;
    fn project_exists(&self, project: &str) -> CloudResult<bool>;
    fn create_project(&self, project: &str, display_name: &str) -> CloudResult<()>;
    fn set_active_project(&self, project: &str) -> CloudResult<()>;

    fn billing_enabled(&self, project: &str) -> CloudResult<bool>;
    fn list_billing_accounts(&self) -> CloudResult<Vec<BillingAccount>>;
    fn link_billing(&self, project: &str, account: &str) -> CloudResult<()>;

    /// Names of every enabled service, fetched in a single call.
    fn enabled_services(&self, project: &str) -> CloudResult<Vec<String>>;
    fn enable_service(&self, project: &str, service: &str) -> CloudResult<()>;

    fn bucket_exists(&self, project: &str, bucket: &str) -> CloudResult<bool>;
    fn create_bucket(&self, project: &str, bucket: &str, region: &str) -> CloudResult<()>;

    fn dataset_exists(&self, project: &str, dataset: &str) -> CloudResult<bool>;
    fn create_dataset(
        &self,
        project: &str,
        dataset: &str,
        region: &str,
        description: &str,
    ) -> CloudResult<()>;

    fn table_exists(&self, project: &str, dataset: &str, table: &str) -> CloudResult<bool>;
    /// Current columns of a table.
    fn table_schema(&self, project: &str, dataset: &str, table: &str)
        -> CloudResult<Vec<FieldSpec>>;

    /// Run a standard-SQL statement (DDL or query) and return raw output.
    fn run_query(&self, project: &str, region: &str, sql: &str) -> CloudResult<String>;
    /// Whether an index of `kind` named `index` exists on the table.
    fn index_exists(
        &self,
        project: &str,
        region: &str,
        dataset: &str,
        table: &str,
        kind: IndexKind,
        index: &str,
    ) -> CloudResult<bool>;

    fn service_account_exists(&self, project: &str, email: &str) -> CloudResult<bool>;
    fn create_service_account(
        &self,
        project: &str,
        name: &str,
        display_name: &str,
    ) -> CloudResult<()>;
    /// Ids of user-managed keys; provider-managed keys are never returned.
    fn list_user_managed_keys(&self, project: &str, email: &str) -> CloudResult<Vec<String>>;
    fn delete_key(&self, project: &str, email: &str, key_id: &str) -> CloudResult<()>;
    /// Create a key and write its JSON to `path`.
    fn create_key(&self, project: &str, email: &str, path: &Path) -> CloudResult<()>;

    fn add_role_binding(&self, project: &str, member: &str, role: &str) -> CloudResult<()>;
}
