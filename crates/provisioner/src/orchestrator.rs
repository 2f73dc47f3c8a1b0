//! Provisioning orchestration.
//!
//! [`Provisioner`] walks the [`ProvisionStep`] sequence once, in order:
//! - required steps return early on failure, so nothing after them runs
//! - best-effort steps record a failed outcome and continue
//!
//! Every run starts from scratch. Idempotency comes from each step checking
//! for existing resources, not from persisted state.

use tracing::{info, warn};

use crate::apis;
use crate::artifacts::{self, ArtifactContext, EmittedArtifacts};
use crate::billing;
use crate::cloud::CloudCli;
use crate::config::{BillingPolicy, ProvisionConfig};
use crate::error::ProvisionError;
use crate::identity;
use crate::names::{ProjectId, ResourceNames};
use crate::outcome::{Outcome, ProvisionReport, ResourceKind};
use crate::preflight;
use crate::project;
use crate::prompt::Prompter;
use crate::state::ProvisionStep;
use crate::storage;
use crate::ui;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ProvisionSummary {
    pub names: ResourceNames,
    pub report: ProvisionReport,
    pub use_vector_search: bool,
    pub artifacts: EmittedArtifacts,
}

/// Drives a single provisioning run.
pub struct Provisioner<C, P> {
    cloud: C,
    prompter: P,
    config: ProvisionConfig,
    step: ProvisionStep,
    report: ProvisionReport,
}

impl<C: CloudCli, P: Prompter> Provisioner<C, P> {
    /// Create a provisioner for `config`.
    pub fn new(cloud: C, prompter: P, config: ProvisionConfig) -> Self {
        Self {
            cloud,
            prompter,
            config,
            step: ProvisionStep::Preflight,
            report: ProvisionReport::start(),
        }
    }

    /// Current step, for diagnostics after a failure.
    #[must_use]
    pub fn step(&self) -> ProvisionStep {
        self.step
    }

    /// Records gathered so far.
    #[must_use]
    pub fn report(&self) -> &ProvisionReport {
        &self.report
    }

    fn announce(&self) {
        info!(step = %self.step, "Entering step");
        ui::print_progress_step(
            self.step.step_number(),
            ProvisionStep::TOTAL_STEPS,
            self.step.description(),
        );
    }

    /// Move to the next step in the sequence and announce it.
    fn advance(&mut self) {
        self.step = self.step.next();
        if self.step != ProvisionStep::Complete {
            self.announce();
        }
    }

    /// Run every step.
    ///
    /// # Errors
    ///
    /// Returns the error of the first required step that fails, or
    /// [`ProvisionError::Cancelled`] when the operator declines to proceed.
    /// [`Provisioner::step`] then names the step that stopped the run.
    pub fn run(&mut self) -> Result<ProvisionSummary, ProvisionError> {
        if let Some(id) = &self.config.project_id {
            ProjectId::parse(id)?;
        }

        self.step = ProvisionStep::Preflight;
        self.announce();
        preflight::check(&self.cloud)?;

        self.print_plan();
        if !self
            .prompter
            .confirm("Proceed with provisioning?", true)?
        {
            return Err(ProvisionError::Cancelled);
        }

        self.advance();
        let (project, outcome) =
            project::resolve(&self.cloud, &self.prompter, self.config.project_id.as_deref())?;
        self.report.project_id = Some(project.to_string());
        self.report
            .record(self.step, ResourceKind::Project, project.as_str(), outcome);
        let names = ResourceNames::derive(&project, &self.config);

        self.advance();
        if let Some(outcome) = billing::ensure(&self.cloud, &self.prompter, &self.config, &project)? {
            self.report
                .record(self.step, ResourceKind::BillingLink, project.as_str(), outcome);
        }

        self.advance();
        for (api, outcome) in apis::ensure(&self.cloud, &project)? {
            self.report.record(self.step, ResourceKind::Api, api, outcome);
        }

        self.advance();
        let outcome = storage::ensure_bucket(&self.cloud, &names)?;
        self.report
            .record(self.step, ResourceKind::Bucket, &names.bucket, outcome);

        self.advance();
        let outcome = storage::ensure_dataset(&self.cloud, &names)?;
        self.report
            .record(self.step, ResourceKind::Dataset, &names.dataset, outcome);

        self.advance();
        let outcome = storage::ensure_table(&self.cloud, &names)?;
        self.report
            .record(self.step, ResourceKind::Table, &names.table, outcome);

        self.advance();
        let text = storage::ensure_text_index(&self.cloud, &names);
        self.report
            .record(self.step, ResourceKind::TextIndex, &names.text_index, text);
        let vector = storage::ensure_vector_index(&self.cloud, &names);
        let use_vector_search = !vector.is_failed();
        self.report
            .record(self.step, ResourceKind::VectorIndex, &names.vector_index, vector);

        self.advance();
        let outcome = identity::ensure_service_account(&self.cloud, &names)?;
        self.report.record(
            self.step,
            ResourceKind::ServiceAccount,
            &names.service_account_email,
            outcome,
        );

        self.advance();
        let rotation = identity::rotate_keys(&self.cloud, &names)?;
        self.report.deleted_keys = rotation.deleted;
        self.report.failed_key_deletes = rotation.failed_deletes;
        self.report.record(
            self.step,
            ResourceKind::CredentialKey,
            names.key_path.display().to_string(),
            Outcome::Ensured,
        );

        self.advance();
        for (role, outcome) in identity::grant_roles(&self.cloud, &names) {
            self.report
                .record(self.step, ResourceKind::RoleGrant, role, outcome);
        }

        self.advance();
        self.report.finish();
        let ctx = ArtifactContext::new(&names, &self.config, &self.report, use_vector_search);
        let emitted = artifacts::emit(&ctx, &self.report, &names.key_path, &self.config.output_dir)?;

        self.advance();
        let warnings = self.report.warnings().count() + self.report.failed_key_deletes.len();
        if warnings > 0 {
            warn!(warnings, "Provisioning finished with warnings");
        }
        info!(project = %project, created = self.report.ensured_count(), "Provisioning complete");

        let summary = ProvisionSummary {
            names,
            report: self.report.clone(),
            use_vector_search,
            artifacts: emitted,
        };
        print_summary(&summary);
        Ok(summary)
    }

    fn print_plan(&self) {
        ui::print_section("Provisioning plan");
        ui::print_kv(
            "Project",
            self.config.project_id.as_deref().unwrap_or("(choose or create)"),
        );
        ui::print_kv("Region", &self.config.region);
        ui::print_kv("Variant", &self.config.variant.to_string());
        ui::print_kv(
            "Billing",
            match self.config.billing {
                BillingPolicy::Require => "require a linked account",
                BillingPolicy::Skip => "not checked",
            },
        );
        ui::print_kv("Service account", &self.config.service_account);
        ui::print_kv("Output directory", &self.config.output_dir.display().to_string());
        println!();
    }
}

fn print_summary(summary: &ProvisionSummary) {
    let names = &summary.names;
    ui::print_section("Provisioning complete");
    ui::print_kv("Project", names.project.as_str());
    ui::print_kv("Bucket", &names.bucket_uri());
    ui::print_kv("Table", &names.table_ref());
    ui::print_kv("Service account", &names.service_account_email);
    ui::print_kv("Key file", &names.key_path.display().to_string());
    ui::print_kv(
        "Vector search",
        if summary.use_vector_search {
            "enabled"
        } else {
            "disabled"
        },
    );

    let failed: Vec<_> = summary.report.warnings().collect();
    if !failed.is_empty() {
        println!();
        ui::print_warning(&format!("{} best-effort step(s) failed:", failed.len()));
        for record in failed {
            ui::print_remediation(&format!(
                "{} {}\n{}",
                record.resource,
                record.name,
                record.resource.console_fallback()
            ));
        }
    }

    println!();
    ui::print_info("Next steps:");
    ui::print_numbered_step(
        1,
        &format!("Load {}: set -a; source .env; set +a", summary.artifacts.env_file.display()),
    );
    ui::print_numbered_step(2, "Add your GEMINI_API_KEY to the env file");
    ui::print_numbered_step(
        3,
        &format!("Read {} for the full walkthrough", summary.artifacts.quickstart.display()),
    );
}
