//! Status command - report which resources exist without changing anything.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use pdf_provision::cloud::GcloudCli;
use pdf_provision::config::{ProvisionConfig, Variant};
use pdf_provision::names::{ProjectId, ResourceNames};
use pdf_provision::{preflight, status, ui};

/// Show existing and missing resources for a project.
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Project id to inspect.
    #[arg(short, long, env = "PDF_PROVISION_PROJECT")]
    project: String,

    /// Region the resources were created in.
    #[arg(short, long, env = "PDF_PROVISION_REGION", default_value = pdf_provision::config::DEFAULT_REGION)]
    region: String,

    /// Provisioning variant, which determines the key file name.
    #[arg(long, env = "PDF_PROVISION_VARIANT", default_value = "standard")]
    variant: String,

    /// Service account name (before the `@`).
    #[arg(long, env = "PDF_PROVISION_SERVICE_ACCOUNT")]
    service_account: Option<String>,

    /// Directory holding the key file.
    #[arg(short, long, env = "PDF_PROVISION_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
}

impl StatusCommand {
    /// Run the status command.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid project id or a failed preflight.
    pub async fn run(&self) -> Result<()> {
        let project = ProjectId::parse(&self.project)?;
        let variant: Variant = self.variant.parse()?;

        let mut config = ProvisionConfig::new(variant)
            .with_region(self.region.clone())
            .with_output_dir(self.output_dir.clone());
        if let Some(name) = &self.service_account {
            config.service_account.clone_from(name);
        }

        let cloud = GcloudCli::new();
        ui::print_section(&format!("Status of {project}"));
        preflight::check(&cloud)?;
        println!();

        let names = ResourceNames::derive(&project, &config);
        let report = status::collect(&cloud, &names);
        status::print(&report);
        Ok(())
    }
}
