//! Error taxonomy for a provisioning run.

use std::path::PathBuf;

use thiserror::Error;

use crate::cloud::CloudError;
use crate::outcome::ResourceKind;

/// Errors that abort a provisioning run.
///
/// Every variant except [`ProvisionError::Cancelled`] maps to exit code 1.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Local environment is not usable (tool missing, not authenticated).
    #[error("Environment check failed: {message}")]
    Environment {
        message: String,
        remediation: String,
    },

    /// Malformed input or missing required configuration.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// A required resource could not be created or verified.
    #[error("Failed to ensure {resource} '{name}': {source}")]
    RequiredResource {
        resource: ResourceKind,
        name: String,
        #[source]
        source: CloudError,
    },

    /// The operator declined to continue.
    #[error("Provisioning cancelled")]
    Cancelled,

    /// Reading operator input failed.
    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// An output artifact could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact template failed to render.
    #[error("Failed to render {template}: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

impl ProvisionError {
    /// Build a required-resource error.
    pub fn required(resource: ResourceKind, name: impl Into<String>, source: CloudError) -> Self {
        Self::RequiredResource {
            resource,
            name: name.into(),
            source,
        }
    }

    /// Manual fallback the operator can follow after this failure.
    #[must_use]
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::Environment { remediation, .. } => Some(remediation.clone()),
            Self::Validation(_) => Some(
                "Correct the value and re-run. Project ids must be 6-30 characters of\n\
                 lowercase letters, digits and hyphens, starting with a letter."
                    .to_string(),
            ),
            Self::RequiredResource { resource, .. } => Some(format!(
                "{}\nEvery step is idempotent, so re-running after the fix is safe.",
                resource.console_fallback()
            )),
            Self::Cancelled | Self::Prompt(_) | Self::Template { .. } => None,
            Self::Artifact { path, .. } => Some(format!(
                "Check that {} is writable and re-run.",
                path.display()
            )),
        }
    }

    /// Whether this error should produce a non-zero exit status.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_fatal() {
        assert!(!ProvisionError::Cancelled.is_fatal());
        assert!(ProvisionError::Validation("x".into()).is_fatal());
    }

    #[test]
    fn test_required_resource_mentions_console_fallback() {
        let err = ProvisionError::required(
            ResourceKind::Bucket,
            "demo-project-chunks",
            CloudError::ToolMissing {
                tool: "gcloud".into(),
            },
        );
        let text = err.remediation().unwrap();
        assert!(text.contains("Cloud Storage"));
        assert!(err.to_string().contains("demo-project-chunks"));
    }
}
