//! [`CloudCli`] backed by the `gcloud` and `bq` command line tools.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::{BillingAccount, CloudCli, CloudError, CloudResult, IndexKind};
use crate::schema::{self, FieldSpec};

/// Shells out to `gcloud` and `bq`.
#[derive(Debug, Clone)]
pub struct GcloudCli {
    gcloud: String,
    bq: String,
}

impl Default for GcloudCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GcloudCli {
    /// Use the tools found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gcloud: "gcloud".to_string(),
            bq: "bq".to_string(),
        }
    }

    /// Override the binaries (e.g. absolute paths or wrappers).
    #[must_use]
    pub fn with_binaries(gcloud: impl Into<String>, bq: impl Into<String>) -> Self {
        Self {
            gcloud: gcloud.into(),
            bq: bq.into(),
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> CloudResult<String> {
        let command = render_command(program, args);
        debug!(%command, "Running cloud CLI");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    CloudError::ToolMissing {
                        tool: program.to_string(),
                    }
                } else {
                    CloudError::Spawn {
                        command: command.clone(),
                        source,
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(%command, %stderr, "Cloud CLI call failed");
            return Err(CloudError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn gcloud(&self, args: &[&str]) -> CloudResult<String> {
        self.run(&self.gcloud, args)
    }

    fn bq(&self, args: &[&str]) -> CloudResult<String> {
        self.run(&self.bq, args)
    }

    /// Run a describe-style command; "not found" maps to `Ok(false)`.
    fn exists(&self, program: &str, args: &[&str]) -> CloudResult<bool> {
        match self.run(program, args) {
            Ok(_) => Ok(true),
            Err(CloudError::CommandFailed { ref stderr, .. }) if is_not_found(stderr) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        if arg.contains(char::is_whitespace) {
            rendered.push('\'');
            rendered.push_str(arg);
            rendered.push('\'');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    ["not found", "not_found", "notfound", "does not exist", "may not exist", "404"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Billing account as printed by `gcloud billing accounts list --format=json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBillingAccount {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    open: bool,
}

fn parse_billing_accounts(json: &str) -> Result<Vec<BillingAccount>, serde_json::Error> {
    let raw: Vec<RawBillingAccount> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .map(|a| BillingAccount {
            id: a
                .name
                .strip_prefix("billingAccounts/")
                .unwrap_or(&a.name)
                .to_string(),
            display_name: a.display_name,
            open: a.open,
        })
        .collect())
}

/// `bq query --format=json` prints `[]` or nothing for zero rows.
fn query_returned_rows(output: &str) -> Result<bool, serde_json::Error> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(false);
    }
    let rows: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
    Ok(!rows.is_empty())
}

impl CloudCli for GcloudCli {
    fn tool_available(&self, tool: &str) -> bool {
        let binary = match tool {
            "gcloud" => self.gcloud.as_str(),
            "bq" => self.bq.as_str(),
            other => other,
        };
        which::which(binary).is_ok()
    }

    fn active_accounts(&self) -> CloudResult<Vec<String>> {
        let out = self.gcloud(&[
            "auth",
            "list",
            "--filter=status:ACTIVE",
            "--format=value(account)",
        ])?;
        Ok(lines(&out))
    }

    fn list_projects(&self) -> CloudResult<Vec<String>> {
        let out = self.gcloud(&["projects", "list", "--format=value(projectId)"])?;
        Ok(lines(&out))
    }

    fn active_project(&self) -> CloudResult<Option<String>> {
        let out = self.gcloud(&["config", "get-value", "project"])?;
        let value = out.trim();
        if value.is_empty() || value == "(unset)" {
            Ok(None)
        } else {
            Ok(Some(value.to_string()))
        }
    }

    fn project_exists(&self, project: &str) -> CloudResult<bool> {
        self.exists(
            &self.gcloud,
            &["projects", "describe", project, "--format=value(projectId)"],
        )
    }

    fn create_project(&self, project: &str, display_name: &str) -> CloudResult<()> {
        let name = format!("--name={display_name}");
        self.gcloud(&["projects", "create", project, &name])?;
        Ok(())
    }

    fn set_active_project(&self, project: &str) -> CloudResult<()> {
        self.gcloud(&["config", "set", "project", project])?;
        Ok(())
    }

    fn billing_enabled(&self, project: &str) -> CloudResult<bool> {
        let out = self.gcloud(&[
            "billing",
            "projects",
            "describe",
            project,
            "--format=value(billingEnabled)",
        ])?;
        Ok(out.trim().eq_ignore_ascii_case("true"))
    }

    fn list_billing_accounts(&self) -> CloudResult<Vec<BillingAccount>> {
        let args = ["billing", "accounts", "list", "--format=json"];
        let out = self.gcloud(&args)?;
        parse_billing_accounts(&out).map_err(|e| CloudError::Parse {
            command: render_command(&self.gcloud, &args),
            message: e.to_string(),
        })
    }

    fn link_billing(&self, project: &str, account: &str) -> CloudResult<()> {
        let account = format!("--billing-account={account}");
        self.gcloud(&["billing", "projects", "link", project, &account])?;
        Ok(())
    }

    fn enabled_services(&self, project: &str) -> CloudResult<Vec<String>> {
        let project = format!("--project={project}");
        let out = self.gcloud(&[
            "services",
            "list",
            "--enabled",
            &project,
            "--format=value(config.name)",
        ])?;
        Ok(lines(&out))
    }

    fn enable_service(&self, project: &str, service: &str) -> CloudResult<()> {
        let project = format!("--project={project}");
        self.gcloud(&["services", "enable", service, &project])?;
        Ok(())
    }

    fn bucket_exists(&self, project: &str, bucket: &str) -> CloudResult<bool> {
        let uri = format!("gs://{bucket}");
        let project = format!("--project={project}");
        self.exists(
            &self.gcloud,
            &["storage", "buckets", "describe", &uri, &project, "--format=value(name)"],
        )
    }

    fn create_bucket(&self, project: &str, bucket: &str, region: &str) -> CloudResult<()> {
        let uri = format!("gs://{bucket}");
        let project = format!("--project={project}");
        let location = format!("--location={region}");
        self.gcloud(&[
            "storage",
            "buckets",
            "create",
            &uri,
            &project,
            &location,
            "--uniform-bucket-level-access",
        ])?;
        Ok(())
    }

    fn dataset_exists(&self, project: &str, dataset: &str) -> CloudResult<bool> {
        let project_flag = format!("--project_id={project}");
        let target = format!("{project}:{dataset}");
        self.exists(&self.bq, &[&project_flag, "show", "--format=json", &target])
    }

    fn create_dataset(
        &self,
        project: &str,
        dataset: &str,
        region: &str,
        description: &str,
    ) -> CloudResult<()> {
        let project_flag = format!("--project_id={project}");
        let location = format!("--location={region}");
        let description = format!("--description={description}");
        let target = format!("{project}:{dataset}");
        self.bq(&[
            &project_flag,
            &location,
            "mk",
            "--dataset",
            &description,
            &target,
        ])?;
        Ok(())
    }

    fn table_exists(&self, project: &str, dataset: &str, table: &str) -> CloudResult<bool> {
        let project_flag = format!("--project_id={project}");
        let target = format!("{project}:{dataset}.{table}");
        self.exists(&self.bq, &[&project_flag, "show", "--format=json", &target])
    }

    fn table_schema(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> CloudResult<Vec<FieldSpec>> {
        let project_flag = format!("--project_id={project}");
        let target = format!("{project}:{dataset}.{table}");
        let args = [
            project_flag.as_str(),
            "show",
            "--schema",
            "--format=json",
            target.as_str(),
        ];
        let out = self.bq(&args)?;
        schema::parse_bq_schema(&out).map_err(|message| CloudError::Parse {
            command: render_command(&self.bq, &args),
            message,
        })
    }

    fn run_query(&self, project: &str, region: &str, sql: &str) -> CloudResult<String> {
        let project_flag = format!("--project_id={project}");
        let location = format!("--location={region}");
        self.bq(&[
            &project_flag,
            &location,
            "query",
            "--use_legacy_sql=false",
            "--format=json",
            "--quiet",
            sql,
        ])
    }

    fn index_exists(
        &self,
        project: &str,
        region: &str,
        dataset: &str,
        table: &str,
        kind: IndexKind,
        index: &str,
    ) -> CloudResult<bool> {
        let sql = format!(
            "SELECT index_name FROM `{project}.{dataset}.INFORMATION_SCHEMA.{}` \
             WHERE table_name = '{table}' AND index_name = '{index}'",
            kind.information_schema_view()
        );
        let out = self.run_query(project, region, &sql)?;
        query_returned_rows(&out).map_err(|e| CloudError::Parse {
            command: sql,
            message: e.to_string(),
        })
    }

    fn service_account_exists(&self, project: &str, email: &str) -> CloudResult<bool> {
        let project = format!("--project={project}");
        self.exists(
            &self.gcloud,
            &[
                "iam",
                "service-accounts",
                "describe",
                email,
                &project,
                "--format=value(email)",
            ],
        )
    }

    fn create_service_account(
        &self,
        project: &str,
        name: &str,
        display_name: &str,
    ) -> CloudResult<()> {
        let project = format!("--project={project}");
        let display = format!("--display-name={display_name}");
        self.gcloud(&["iam", "service-accounts", "create", name, &display, &project])?;
        Ok(())
    }

    fn list_user_managed_keys(&self, project: &str, email: &str) -> CloudResult<Vec<String>> {
        let project = format!("--project={project}");
        let account = format!("--iam-account={email}");
        let out = self.gcloud(&[
            "iam",
            "service-accounts",
            "keys",
            "list",
            &account,
            &project,
            "--managed-by=user",
            "--format=value(name)",
        ])?;
        Ok(lines(&out)
            .into_iter()
            .map(|name| name.rsplit('/').next().unwrap_or(&name).to_string())
            .collect())
    }

    fn delete_key(&self, project: &str, email: &str, key_id: &str) -> CloudResult<()> {
        let project = format!("--project={project}");
        let account = format!("--iam-account={email}");
        self.gcloud(&[
            "iam",
            "service-accounts",
            "keys",
            "delete",
            key_id,
            &account,
            &project,
            "--quiet",
        ])?;
        Ok(())
    }

    fn create_key(&self, project: &str, email: &str, path: &Path) -> CloudResult<()> {
        let project = format!("--project={project}");
        let account = format!("--iam-account={email}");
        let path = path.to_string_lossy();
        self.gcloud(&[
            "iam",
            "service-accounts",
            "keys",
            "create",
            &path,
            &account,
            &project,
        ])?;
        Ok(())
    }

    fn add_role_binding(&self, project: &str, member: &str, role: &str) -> CloudResult<()> {
        let member = format!("--member={member}");
        let role = format!("--role={role}");
        self.gcloud(&[
            "projects",
            "add-iam-policy-binding",
            project,
            &member,
            &role,
            "--condition=None",
            "--quiet",
            "--format=none",
        ])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("BigQuery error in show operation: Not found: Dataset p:d"));
        assert!(is_not_found(
            "ERROR: (gcloud.projects.describe) User [a@b] does not have permission to access projects instance [x] (or it may not exist)"
        ));
        assert!(is_not_found("ERROR: (gcloud.storage.buckets.describe) gs://x not found: 404."));
        assert!(!is_not_found("ERROR: PERMISSION_DENIED: caller lacks iam.serviceAccounts.get"));
    }

    #[test]
    fn test_parse_billing_accounts() {
        let json = r#"[
            {"name":"billingAccounts/0123AB-4567CD-89EF01","displayName":"Main","open":true},
            {"name":"billingAccounts/FFFFFF-000000-111111","displayName":"Closed","open":false}
        ]"#;
        let accounts = parse_billing_accounts(json).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "0123AB-4567CD-89EF01");
        assert!(accounts[0].open);
        assert!(!accounts[1].open);
    }

    #[test]
    fn test_query_returned_rows() {
        assert!(!query_returned_rows("").unwrap());
        assert!(!query_returned_rows("[]\n").unwrap());
        assert!(query_returned_rows(r#"[{"index_name":"pdf_chunks_text_index"}]"#).unwrap());
        assert!(query_returned_rows("garbage").is_err());
    }

    #[test]
    fn test_render_command_quotes_whitespace() {
        assert_eq!(
            render_command("bq", &["query", "SELECT 1"]),
            "bq query 'SELECT 1'"
        );
    }

    #[test]
    fn test_lines_skips_blanks() {
        assert_eq!(lines("a\n\n  b  \n"), vec!["a".to_string(), "b".to_string()]);
    }
}
