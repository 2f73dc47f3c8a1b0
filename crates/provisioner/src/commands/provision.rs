//! Provision command - bring every resource into its desired state.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use pdf_provision::cloud::GcloudCli;
use pdf_provision::config::{BillingPolicy, FileConfig, ProvisionConfig, Variant};
use pdf_provision::orchestrator::Provisioner;
use pdf_provision::prompt::{DialoguerPrompter, NonInteractivePrompter, Prompter};
use pdf_provision::ui;

/// Provision the Google Cloud resources for the PDF pipeline.
#[derive(Args, Debug)]
pub struct ProvisionCommand {
    /// Project id to use or create. Prompts when omitted.
    #[arg(short, long, env = "PDF_PROVISION_PROJECT")]
    project: Option<String>,

    /// Region for the bucket and dataset.
    #[arg(short, long, env = "PDF_PROVISION_REGION")]
    region: Option<String>,

    /// Provisioning variant (keyed, standard).
    #[arg(long, env = "PDF_PROVISION_VARIANT", default_value = "standard")]
    variant: String,

    /// Billing account to link when the project has none.
    #[arg(long, env = "PDF_PROVISION_BILLING_ACCOUNT")]
    billing_account: Option<String>,

    /// Do not check or link billing.
    #[arg(long, conflicts_with = "require_billing")]
    skip_billing: bool,

    /// Require an attached billing account, linking one if needed.
    #[arg(long)]
    require_billing: bool,

    /// Service account name (before the `@`).
    #[arg(long, env = "PDF_PROVISION_SERVICE_ACCOUNT")]
    service_account: Option<String>,

    /// Directory for the key file and generated artifacts.
    #[arg(short, long, env = "PDF_PROVISION_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Embedding model written to the env file.
    #[arg(long, env = "PDF_PROVISION_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// TOML configuration file.
    #[arg(short, long, env = "PDF_PROVISION_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip interactive prompts (use defaults)
    #[arg(short, long, alias = "non-interactive")]
    yes: bool,
}

impl ProvisionCommand {
    /// Assemble the run configuration. Built-in defaults are overlaid by the
    /// config file, which is overlaid by any flag or env var that was given.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown variant or an unreadable config file.
    pub fn build_config(&self) -> Result<ProvisionConfig> {
        let variant: Variant = self.variant.parse()?;
        let mut config = ProvisionConfig::new(variant);

        if let Some(path) = &self.config {
            let file = FileConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            config = config.merge_file(file);
        }

        if let Some(project) = &self.project {
            config = config.with_project(project.clone());
        }
        if let Some(region) = &self.region {
            config = config.with_region(region.clone());
        }
        if let Some(account) = &self.billing_account {
            config = config.with_billing_account(account.clone());
        }
        if let Some(name) = &self.service_account {
            config.service_account.clone_from(name);
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        if let Some(model) = &self.embedding_model {
            config.embedding_model.clone_from(model);
        }
        if self.skip_billing {
            config = config.with_billing(BillingPolicy::Skip);
        } else if self.require_billing {
            config = config.with_billing(BillingPolicy::Require);
        }
        if self.yes {
            config = config.non_interactive();
        }

        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    /// Run the provision command.
    ///
    /// # Errors
    ///
    /// Returns the first fatal provisioning error.
    pub async fn run(&self) -> Result<()> {
        ui::print_banner();
        let config = self.build_config()?;

        if config.non_interactive {
            provision(config, NonInteractivePrompter)
        } else {
            provision(config, DialoguerPrompter)
        }
    }
}

fn provision<P: Prompter>(config: ProvisionConfig, prompter: P) -> Result<()> {
    let mut provisioner = Provisioner::new(GcloudCli::new(), prompter, config);
    provisioner.run()?;
    Ok(())
}
