//! Local environment checks run before any cloud mutation.

use colored::Colorize;
use tracing::{debug, info};

use crate::cloud::CloudCli;
use crate::error::ProvisionError;
use crate::ui;

/// One prerequisite and how to satisfy it.
struct Requirement {
    name: &'static str,
    passed: bool,
    detail: Option<String>,
    install_instructions: &'static str,
}

/// Verify the CLI tools are installed and an account is authenticated.
///
/// Returns the active accounts on success.
///
/// # Errors
///
/// Returns [`ProvisionError::Environment`] when any critical requirement fails.
pub fn check<C: CloudCli>(cloud: &C) -> Result<Vec<String>, ProvisionError> {
    let gcloud = cloud.tool_available("gcloud");
    let bq = cloud.tool_available("bq");

    let accounts = if gcloud {
        match cloud.active_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                debug!(error = %e, "Listing active accounts failed");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let requirements = [
        Requirement {
            name: "gcloud CLI",
            passed: gcloud,
            detail: None,
            install_instructions: "Install the Google Cloud SDK from https://cloud.google.com/sdk/docs/install",
        },
        Requirement {
            name: "bq CLI",
            passed: bq,
            detail: None,
            install_instructions: "Run `gcloud components install bq`",
        },
        Requirement {
            name: "Active gcloud account",
            passed: !accounts.is_empty(),
            detail: (!accounts.is_empty()).then(|| accounts.join(", ")),
            install_instructions: "Run `gcloud auth login` and select an account",
        },
    ];

    for requirement in &requirements {
        ui::print_check_result(
            requirement.name,
            requirement.passed,
            requirement.detail.as_deref(),
        );
    }

    let failures: Vec<_> = requirements.iter().filter(|r| !r.passed).collect();
    if failures.is_empty() {
        info!(accounts = ?accounts, "Preflight passed");
        ui::print_success("All prerequisites met");
        return Ok(accounts);
    }

    let remediation = failures
        .iter()
        .map(|f| format!("{} - {}", f.name, f.install_instructions))
        .collect::<Vec<_>>()
        .join("\n");

    for failure in &failures {
        println!(
            "  {} {} - {}",
            "✗".red(),
            failure.name.red(),
            failure.install_instructions.bright_black()
        );
    }

    let names = failures
        .iter()
        .map(|f| f.name)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ProvisionError::Environment {
        message: format!("missing prerequisites: {names}"),
        remediation,
    })
}
