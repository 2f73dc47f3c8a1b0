//! Provisioning configuration types.
//!
//! `ProvisionConfig` carries every input of a run. It is built from CLI flags,
//! environment variables and an optional TOML file, and then passed explicitly
//! to each step.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Default region for the bucket and dataset.
pub const DEFAULT_REGION: &str = "us-central1";

/// Default service account name (the part before `@`).
pub const DEFAULT_SERVICE_ACCOUNT: &str = "pdf-processor";

/// Default embedding model advertised to the application.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Provisioning flavour.
///
/// The two flavours differ in the credential file name and in whether a
/// billing account is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Project-scoped key file, billing linkage required.
    Keyed,
    /// Fixed `credentials.json` key file, billing left to the operator.
    #[default]
    Standard,
}

impl Variant {
    /// File name of the credential key written for this variant.
    #[must_use]
    pub fn key_file_name(self, project: &str) -> String {
        match self {
            Self::Keyed => format!("{project}-pdf-processor-key.json"),
            Self::Standard => "credentials.json".to_string(),
        }
    }

    /// Billing policy applied when none is given explicitly.
    #[must_use]
    pub fn default_billing_policy(self) -> BillingPolicy {
        match self {
            Self::Keyed => BillingPolicy::Require,
            Self::Standard => BillingPolicy::Skip,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyed => write!(f, "keyed"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyed" => Ok(Self::Keyed),
            "standard" => Ok(Self::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown variant: {s}. Supported: keyed, standard"
            )),
        }
    }
}

/// Whether the run insists on an attached billing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPolicy {
    /// Link an account if none is attached; fail if none can be found.
    Require,
    /// Do not inspect billing at all.
    Skip,
}

/// Full provisioning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Explicit project id. `None` triggers interactive resolution.
    pub project_id: Option<String>,
    /// Region for the bucket and dataset.
    pub region: String,
    /// Provisioning flavour.
    pub variant: Variant,
    /// Billing policy.
    pub billing: BillingPolicy,
    /// Billing account to link when the project has none.
    pub billing_account: Option<String>,
    /// Service account name (before `@`).
    pub service_account: String,
    /// Directory receiving the key file and emitted artifacts.
    pub output_dir: PathBuf,
    /// Embedding model written to the env file.
    pub embedding_model: String,
    /// Take every default instead of prompting.
    pub non_interactive: bool,
}

impl ProvisionConfig {
    /// Create a configuration with built-in defaults for the given variant.
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            project_id: None,
            region: DEFAULT_REGION.to_string(),
            variant,
            billing: variant.default_billing_policy(),
            billing_account: None,
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            output_dir: PathBuf::from("."),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            non_interactive: false,
        }
    }

    /// Set the project id.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_id = Some(project.into());
        self
    }

    /// Set the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the billing policy.
    #[must_use]
    pub fn with_billing(mut self, policy: BillingPolicy) -> Self {
        self.billing = policy;
        self
    }

    /// Set the billing account to link.
    #[must_use]
    pub fn with_billing_account(mut self, account: impl Into<String>) -> Self {
        self.billing_account = Some(account.into());
        self
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Disable prompts.
    #[must_use]
    pub fn non_interactive(mut self) -> Self {
        self.non_interactive = true;
        self
    }

    /// Overlay values from a config file onto this configuration.
    ///
    /// Every value present in the file replaces the current one. Callers apply
    /// the file before flags and environment variables so those win.
    #[must_use]
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(project) = file.project_id {
            self.project_id = Some(project);
        }
        if let Some(region) = file.region {
            self.region = region;
        }
        if let Some(account) = file.billing_account {
            self.billing_account = Some(account);
        }
        if let Some(sa) = file.service_account {
            self.service_account = sa;
        }
        if let Some(model) = file.embedding_model {
            self.embedding_model = model;
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        self
    }
}

/// Optional TOML configuration file.
///
/// ```toml
/// project_id = "pdf-processing-demo"
/// region = "europe-west1"
/// billing_account = "0123AB-4567CD-89EF01"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub project_id: Option<String>,
    pub region: Option<String>,
    pub billing_account: Option<String>,
    pub service_account: Option<String>,
    pub embedding_model: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Load a config file from disk.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Validation(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            ProvisionError::Validation(format!(
                "cannot parse config file {}: {e}",
                path.display()
            ))
        })
    }
}
