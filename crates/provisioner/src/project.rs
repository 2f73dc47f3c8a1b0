//! Project resolution.
//!
//! [`plan_resolution`] and [`decide`] are pure: given the supplied id, the
//! visible projects and the active project they say what to do. [`resolve`]
//! wraps them with the cloud calls and operator prompts.

use tracing::{info, warn};

use crate::cloud::CloudCli;
use crate::ensure::ensure_required;
use crate::error::ProvisionError;
use crate::names::{generate_project_id, ProjectId};
use crate::outcome::{Outcome, ResourceKind};
use crate::prompt::{Answer, Prompter};
use crate::ui;

/// Display name given to created projects.
pub const PROJECT_DISPLAY_NAME: &str = "PDF Processing";

/// What the resolver needs from the operator, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPlan {
    /// An id was supplied; no prompt.
    Supplied(String),
    /// Offer the active project, the listed ones, or a new one.
    Choose {
        default: Option<String>,
        candidates: Vec<String>,
    },
    /// Nothing visible; a new project is the only option.
    ForceCreate,
}

/// Final decision of the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectChoice {
    /// Picked from the visible projects; known to exist.
    Existing(String),
    /// Supplied by the operator or taken from an unlisted active project;
    /// describe and create when absent.
    EnsureExists(String),
    /// Generate a fresh id and create the project.
    Generate,
}

/// Decide whether a prompt is needed.
#[must_use]
pub fn plan_resolution(
    supplied: Option<&str>,
    existing: &[String],
    active: Option<&str>,
) -> ResolutionPlan {
    if let Some(id) = supplied {
        return ResolutionPlan::Supplied(id.to_string());
    }
    if existing.is_empty() {
        return ResolutionPlan::ForceCreate;
    }
    ResolutionPlan::Choose {
        default: active.map(str::to_string),
        candidates: existing.to_vec(),
    }
}

/// Turn a plan and the operator's answer into a choice.
///
/// # Errors
///
/// Returns a validation error if the answer does not fit the plan (a default
/// accepted when none was offered, or an out-of-range pick).
pub fn decide(plan: &ResolutionPlan, answer: Option<Answer>) -> Result<ProjectChoice, ProvisionError> {
    match plan {
        ResolutionPlan::Supplied(id) => Ok(ProjectChoice::EnsureExists(id.clone())),
        ResolutionPlan::ForceCreate => Ok(ProjectChoice::Generate),
        ResolutionPlan::Choose {
            default,
            candidates,
        } => match answer {
            None | Some(Answer::CreateNew) => Ok(ProjectChoice::Generate),
            // The active project comes from local gcloud config and may be
            // stale, so it only counts as existing when it was also listed.
            Some(Answer::AcceptDefault) => default
                .clone()
                .map(|id| {
                    if candidates.contains(&id) {
                        ProjectChoice::Existing(id)
                    } else {
                        ProjectChoice::EnsureExists(id)
                    }
                })
                .ok_or_else(|| {
                    ProvisionError::Validation("no active project to use as default".to_string())
                }),
            Some(Answer::Pick(idx)) => candidates
                .get(idx)
                .cloned()
                .map(ProjectChoice::Existing)
                .ok_or_else(|| {
                    ProvisionError::Validation(format!("project selection {} is out of range", idx + 1))
                }),
        },
    }
}

/// Resolve, validate and ensure the project for this run.
///
/// # Errors
///
/// Returns a validation error for a malformed id and a required-resource
/// error if the project cannot be created.
pub fn resolve<C: CloudCli, P: Prompter>(
    cloud: &C,
    prompter: &P,
    supplied: Option<&str>,
) -> Result<(ProjectId, Outcome), ProvisionError> {
    let plan = if let Some(id) = supplied {
        // Reject malformed ids before touching the cloud.
        ProjectId::parse(id)?;
        plan_resolution(Some(id), &[], None)
    } else {
        let existing = cloud.list_projects().unwrap_or_else(|e| {
            warn!(error = %e, "Could not list projects");
            ui::print_warning(&format!("Could not list projects: {e}"));
            Vec::new()
        });
        let active = cloud.active_project().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read active project");
            None
        });
        plan_resolution(None, &existing, active.as_deref())
    };

    let answer = match &plan {
        ResolutionPlan::Choose {
            default,
            candidates,
        } => Some(prompter.choose_project(default.as_deref(), candidates)?),
        ResolutionPlan::Supplied(_) | ResolutionPlan::ForceCreate => None,
    };

    let (raw, known_to_exist) = match decide(&plan, answer)? {
        ProjectChoice::Existing(id) => (id, true),
        ProjectChoice::EnsureExists(id) => (id, false),
        ProjectChoice::Generate => {
            let generated = generate_project_id();
            ui::print_info(&format!("Generated project id: {generated}"));
            (prompter.edit_project_id(&generated)?, false)
        }
    };

    let project = ProjectId::parse(&raw)?;
    info!(project = %project, "Resolved project");

    let outcome = if known_to_exist {
        ui::print_success(&format!("Using existing project {project}"));
        Outcome::AlreadyExists
    } else {
        let id = project.as_str();
        ensure_required(
            ResourceKind::Project,
            id,
            || cloud.project_exists(id),
            || cloud.create_project(id, PROJECT_DISPLAY_NAME),
        )?
    };

    if let Err(e) = cloud.set_active_project(project.as_str()) {
        warn!(error = %e, "Could not set active project");
        ui::print_warning(&format!("Could not set {project} as the active gcloud project: {e}"));
    }

    Ok((project, outcome))
}
