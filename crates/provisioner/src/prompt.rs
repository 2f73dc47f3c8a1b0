//! Operator interaction.
//!
//! Decisions are made by pure functions elsewhere; this module only gathers
//! answers. [`DialoguerPrompter`] talks to the terminal and
//! [`NonInteractivePrompter`] always takes the default.

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::cloud::BillingAccount;
use crate::error::ProvisionError;

/// Operator answer to the project selection prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Use the active project offered as default.
    AcceptDefault,
    /// Use the candidate at this index.
    Pick(usize),
    /// Generate a new project id.
    CreateNew,
}

/// Source of operator decisions.
pub trait Prompter {
    /// Choose between the active project, a listed project, or a new one.
    fn choose_project(
        &self,
        default: Option<&str>,
        candidates: &[String],
    ) -> Result<Answer, ProvisionError>;

    /// Let the operator replace a generated project id.
    fn edit_project_id(&self, generated: &str) -> Result<String, ProvisionError>;

    /// Pick a billing account; `None` means the operator declined.
    fn choose_billing_account(
        &self,
        accounts: &[BillingAccount],
    ) -> Result<Option<usize>, ProvisionError>;

    /// Yes/no confirmation.
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, ProvisionError>;
}

/// Terminal prompts via `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn choose_project(
        &self,
        default: Option<&str>,
        candidates: &[String],
    ) -> Result<Answer, ProvisionError> {
        let mut items = Vec::with_capacity(candidates.len() + 2);
        if let Some(active) = default {
            items.push(format!("Use active project ({active})"));
        }
        items.extend(candidates.iter().cloned());
        items.push("Create a new project".to_string());

        let offset = usize::from(default.is_some());
        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a project")
            .default(0)
            .items(&items)
            .interact()?;

        Ok(if default.is_some() && idx == 0 {
            Answer::AcceptDefault
        } else if idx == items.len() - 1 {
            Answer::CreateNew
        } else {
            Answer::Pick(idx - offset)
        })
    }

    fn edit_project_id(&self, generated: &str) -> Result<String, ProvisionError> {
        let id: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Project id")
            .default(generated.to_string())
            .interact_text()?;
        Ok(id)
    }

    fn choose_billing_account(
        &self,
        accounts: &[BillingAccount],
    ) -> Result<Option<usize>, ProvisionError> {
        let items: Vec<String> = accounts
            .iter()
            .map(|a| format!("{} ({})", a.display_name, a.id))
            .collect();
        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a billing account")
            .default(0)
            .items(&items)
            .interact_opt()?;
        Ok(idx)
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, ProvisionError> {
        Ok(Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }
}

/// Takes every default without asking.
///
/// Project selection accepts the active project when there is one and
/// otherwise creates a new project with the generated id.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn choose_project(
        &self,
        default: Option<&str>,
        _candidates: &[String],
    ) -> Result<Answer, ProvisionError> {
        Ok(if default.is_some() {
            Answer::AcceptDefault
        } else {
            Answer::CreateNew
        })
    }

    fn edit_project_id(&self, generated: &str) -> Result<String, ProvisionError> {
        Ok(generated.to_string())
    }

    fn choose_billing_account(
        &self,
        accounts: &[BillingAccount],
    ) -> Result<Option<usize>, ProvisionError> {
        Ok((accounts.len() == 1).then_some(0))
    }

    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool, ProvisionError> {
        Ok(default)
    }
}
