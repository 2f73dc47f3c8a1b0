//! Output artifacts: env file, summary, quick-start guide, credential helper
//! and the JSON run report.
//!
//! Everything here is a projection of names that are already known; no cloud
//! calls are made. Files are overwritten on every run.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;
use crate::identity::REQUIRED_ROLES;
use crate::names::ResourceNames;
use crate::outcome::ProvisionReport;
use crate::schema::TableSchema;

/// Env file consumed by the PDF application.
pub const ENV_FILE: &str = ".env";
/// Prose summary of the run.
pub const SUMMARY_FILE: &str = "setup-summary.txt";
/// Getting-started guide.
pub const QUICKSTART_FILE: &str = "QUICKSTART.md";
/// Shell helper serving the key on loopback.
pub const HELPER_SCRIPT_FILE: &str = "download-credentials.sh";
/// Machine-readable run report.
pub const REPORT_FILE: &str = "provision-report.json";

/// Name under which the key is exposed for download.
pub const SERVED_FILE_NAME: &str = "credentials.json";
/// Default loopback port for serving the key.
pub const DEFAULT_SERVE_PORT: u16 = 8765;

/// Keys written to the env file, in order.
pub const ENV_KEYS: [&str; 8] = [
    "BQ_PROJECT_ID",
    "BQ_DATASET",
    "BQ_TABLE",
    "GCS_BUCKET_NAME",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "USE_VECTOR_SEARCH",
    "EMBEDDING_MODEL",
    "GEMINI_API_KEY",
];

const ENV_TEMPLATE: &str = r"# Generated by pdf-provision at {{generated_at}}
# Load with: set -a; source .env; set +a
BQ_PROJECT_ID={{project}}
BQ_DATASET={{dataset}}
BQ_TABLE={{table}}
GCS_BUCKET_NAME={{bucket}}
GOOGLE_APPLICATION_CREDENTIALS={{key_path}}
USE_VECTOR_SEARCH={{use_vector_search}}
EMBEDDING_MODEL={{embedding_model}}
# Supply your own key from Google AI Studio.
GEMINI_API_KEY=
";

const SUMMARY_TEMPLATE: &str = r"PDF processing setup summary
Generated: {{generated_at}}
Variant:   {{variant}}

Project
  id:                {{project}}
  region:            {{region}}

Storage
  bucket:            {{bucket_uri}}

BigQuery
  dataset:           {{project}}:{{dataset}}
  table:             {{table_ref}}
  search index:      {{text_index}}
  vector index:      {{vector_index}} ({{#if use_vector_search}}active{{else}}not created, keyword search only{{/if}})

Service account
  email:             {{service_account_email}}
  key file:          {{key_path}}
  roles:
{{#each roles}}    - {{this}}
{{/each}}
Steps
{{#each records}}  [{{this.status}}] {{this.resource}} {{this.name}}{{#if this.reason}} - {{this.reason}}{{/if}}
{{/each}}
{{#if warnings}}Warnings
{{#each warnings}}  - {{this}}
{{/each}}
{{/if}}Table definition
{{ddl}}
";

const QUICKSTART_TEMPLATE: &str = r"# Quick start

The Google Cloud resources for project `{{project}}` are ready.

1. Load the environment:

   ```bash
   set -a; source {{env_file}}; set +a
   ```

2. Set `GEMINI_API_KEY` in `{{env_file}}`.

3. Start the PDF processing application with these variables exported.
   It reads chunks from `{{table_ref}}` and stores files in `{{bucket_uri}}`.

4. Working in a remote shell? Pull the key to your machine with one of:

   ```bash
   pdf-provision serve-key --key {{key_path}}
   ./{{helper_script}}
   ```

   then download `http://127.0.0.1:{{port}}/{{served_file}}` through your tunnel
   or web preview.

{{#unless use_vector_search}}
Vector search is disabled because the vector index could not be created.
Load documents, then re-run `pdf-provision provision --project {{project}}`.
{{/unless}}
Re-running provisioning is safe: existing resources are kept and a fresh key
replaces the previous one.
";

const HELPER_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Serve the service account key on loopback so it can be pulled out of a
# remote shell session. Regenerated by every pdf-provision run.
set -euo pipefail

KEY_PATH="{{key_path}}"
FILE_NAME="{{file_name}}"
PORT="{{port}}"
PORT="${1:-$PORT}"

if [ ! -f "$KEY_PATH" ]; then
  echo "Key file not found: $KEY_PATH" >&2
  exit 1
fi

SERVE_DIR="$(mktemp -d)"
ln -sf "$(realpath "$KEY_PATH")" "$SERVE_DIR/$FILE_NAME"
cd "$SERVE_DIR"

python3 -m http.server "$PORT" --bind 127.0.0.1 >/dev/null 2>&1 &
SERVER_PID=$!

for _ in $(seq 1 20); do
  if curl -fsS -o /dev/null "http://127.0.0.1:$PORT/$FILE_NAME"; then
    echo "Serving $FILE_NAME at http://127.0.0.1:$PORT/$FILE_NAME (pid $SERVER_PID)"
    echo "Stop the server with: kill $SERVER_PID"
    exit 0
  fi
  sleep 0.5
done

echo "Server did not respond on port $PORT" >&2
kill "$SERVER_PID" 2>/dev/null || true
exit 1
"#;

fn engine() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);
    handlebars
}

fn render<T: Serialize>(name: &'static str, template: &str, data: &T) -> Result<String, ProvisionError> {
    engine()
        .render_template(template, data)
        .map_err(|source| ProvisionError::Template {
            template: name,
            source: Box::new(source),
        })
}

/// Flattened step record for templates.
#[derive(Debug, Clone, Serialize)]
struct RecordView {
    status: &'static str,
    resource: String,
    name: String,
    reason: Option<String>,
}

/// Everything the templates can reference.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactContext {
    generated_at: String,
    variant: String,
    project: String,
    region: String,
    bucket: String,
    bucket_uri: String,
    dataset: String,
    table: String,
    table_ref: String,
    text_index: String,
    vector_index: String,
    service_account_email: String,
    key_path: String,
    use_vector_search: bool,
    embedding_model: String,
    roles: Vec<&'static str>,
    records: Vec<RecordView>,
    warnings: Vec<String>,
    ddl: String,
    env_file: &'static str,
    helper_script: &'static str,
    served_file: &'static str,
    port: u16,
}

impl ArtifactContext {
    /// Build the template context for a finished run.
    #[must_use]
    pub fn new(
        names: &ResourceNames,
        config: &ProvisionConfig,
        report: &ProvisionReport,
        use_vector_search: bool,
    ) -> Self {
        let records = report
            .records
            .iter()
            .map(|r| {
                let (status, reason) = match &r.outcome {
                    crate::outcome::Outcome::Ensured => ("created", None),
                    crate::outcome::Outcome::AlreadyExists => ("exists", None),
                    crate::outcome::Outcome::Failed(reason) => ("failed", Some(reason.clone())),
                };
                RecordView {
                    status,
                    resource: r.resource.to_string(),
                    name: r.name.clone(),
                    reason,
                }
            })
            .collect();

        let mut warnings: Vec<String> = report
            .warnings()
            .map(|r| format!("{} {}: {}", r.resource, r.name, r.resource.console_fallback()))
            .collect();
        warnings.extend(
            report
                .failed_key_deletes
                .iter()
                .map(|(key, reason)| format!("old key {key} was not deleted: {reason}")),
        );

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            variant: config.variant.to_string(),
            project: names.project.to_string(),
            region: names.region.clone(),
            bucket: names.bucket.clone(),
            bucket_uri: names.bucket_uri(),
            dataset: names.dataset.clone(),
            table: names.table.clone(),
            table_ref: names.table_ref(),
            text_index: names.text_index.clone(),
            vector_index: names.vector_index.clone(),
            service_account_email: names.service_account_email.clone(),
            key_path: names.key_path.display().to_string(),
            use_vector_search,
            embedding_model: config.embedding_model.clone(),
            roles: REQUIRED_ROLES.to_vec(),
            records,
            warnings,
            ddl: TableSchema::pdf_chunks().create_table_ddl(&names.table_ref()),
            env_file: ENV_FILE,
            helper_script: HELPER_SCRIPT_FILE,
            served_file: SERVED_FILE_NAME,
            port: DEFAULT_SERVE_PORT,
        }
    }
}

/// Render the env file.
///
/// # Errors
///
/// Returns a template error if rendering fails.
pub fn render_env_file(ctx: &ArtifactContext) -> Result<String, ProvisionError> {
    render("env file", ENV_TEMPLATE, ctx)
}

/// Render the prose summary.
///
/// # Errors
///
/// Returns a template error if rendering fails.
pub fn render_summary(ctx: &ArtifactContext) -> Result<String, ProvisionError> {
    render("summary", SUMMARY_TEMPLATE, ctx)
}

/// Render the quick-start guide.
///
/// # Errors
///
/// Returns a template error if rendering fails.
pub fn render_quickstart(ctx: &ArtifactContext) -> Result<String, ProvisionError> {
    render("quick-start guide", QUICKSTART_TEMPLATE, ctx)
}

/// Shell script that serves `key_path` on `127.0.0.1:port` as `file_name`.
///
/// # Errors
///
/// Returns a template error if rendering fails.
pub fn credential_helper_script(
    key_path: &Path,
    port: u16,
    file_name: &str,
) -> Result<String, ProvisionError> {
    #[derive(Serialize)]
    struct HelperData<'a> {
        key_path: String,
        port: u16,
        file_name: &'a str,
    }

    render(
        "credential helper",
        HELPER_TEMPLATE,
        &HelperData {
            key_path: key_path.display().to_string(),
            port,
            file_name,
        },
    )
}

/// Paths written by [`emit`].
#[derive(Debug, Clone)]
pub struct EmittedArtifacts {
    pub env_file: PathBuf,
    pub summary: PathBuf,
    pub quickstart: PathBuf,
    pub helper_script: PathBuf,
    pub report: PathBuf,
}

fn write_file(path: &Path, content: &str) -> Result<(), ProvisionError> {
    std::fs::write(path, content).map_err(|source| ProvisionError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        ProvisionError::Artifact {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

/// Write every artifact into `output_dir`, overwriting previous runs.
///
/// # Errors
///
/// Returns an error if a template fails to render or a file cannot be written.
pub fn emit(
    ctx: &ArtifactContext,
    report: &ProvisionReport,
    key_path: &Path,
    output_dir: &Path,
) -> Result<EmittedArtifacts, ProvisionError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ProvisionError::Artifact {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let emitted = EmittedArtifacts {
        env_file: output_dir.join(ENV_FILE),
        summary: output_dir.join(SUMMARY_FILE),
        quickstart: output_dir.join(QUICKSTART_FILE),
        helper_script: output_dir.join(HELPER_SCRIPT_FILE),
        report: output_dir.join(REPORT_FILE),
    };

    write_file(&emitted.env_file, &render_env_file(ctx)?)?;
    write_file(&emitted.summary, &render_summary(ctx)?)?;
    write_file(&emitted.quickstart, &render_quickstart(ctx)?)?;
    write_file(
        &emitted.helper_script,
        &credential_helper_script(key_path, DEFAULT_SERVE_PORT, SERVED_FILE_NAME)?,
    )?;
    make_executable(&emitted.helper_script)?;

    let json = serde_json::to_string_pretty(report).map_err(|e| ProvisionError::Artifact {
        path: emitted.report.clone(),
        source: std::io::Error::other(e),
    })?;
    write_file(&emitted.report, &json)?;

    info!(dir = %output_dir.display(), "Artifacts written");
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::Variant;
    use crate::names::ProjectId;
    use crate::outcome::{Outcome, ResourceKind};
    use crate::state::ProvisionStep;

    fn names_and_config() -> (ResourceNames, ProvisionConfig) {
        let config = ProvisionConfig::new(Variant::Standard).with_output_dir("/work/out");
        let project = ProjectId::parse("demo-project").unwrap();
        (ResourceNames::derive(&project, &config), config)
    }

    fn parse_env(content: &str) -> BTreeMap<String, String> {
        content
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_file_contains_every_key() {
        let (names, config) = names_and_config();
        let ctx = ArtifactContext::new(&names, &config, &ProvisionReport::start(), true);
        let env = parse_env(&render_env_file(&ctx).unwrap());

        for key in ENV_KEYS {
            assert!(env.contains_key(key), "missing {key}");
        }
        assert_eq!(env["BQ_PROJECT_ID"], "demo-project");
        assert_eq!(env["GCS_BUCKET_NAME"], "demo-project-chunks");
        assert_eq!(env["GOOGLE_APPLICATION_CREDENTIALS"], "/work/out/credentials.json");
        assert_eq!(env["USE_VECTOR_SEARCH"], "true");
        assert_eq!(env["EMBEDDING_MODEL"], "text-embedding-004");
        assert_eq!(env["GEMINI_API_KEY"], "");
    }

    #[test]
    fn test_summary_lists_failures_with_fallback() {
        let (names, config) = names_and_config();
        let mut report = ProvisionReport::start();
        report.record(
            ProvisionStep::EnsuringIndexes,
            ResourceKind::VectorIndex,
            "pdf_chunks_vector_index",
            Outcome::Failed("Table is empty".into()),
        );
        let ctx = ArtifactContext::new(&names, &config, &report, false);
        let summary = render_summary(&ctx).unwrap();

        assert!(summary.contains("[failed] vector index pdf_chunks_vector_index - Table is empty"));
        assert!(summary.contains("keyword search only"));
        assert!(summary.contains("Warnings"));
        assert!(summary.contains("roles/aiplatform.user"));
        assert!(summary.contains("CREATE TABLE IF NOT EXISTS"));
    }

    #[test]
    fn test_quickstart_mentions_vector_fallback_only_when_disabled() {
        let (names, config) = names_and_config();
        let report = ProvisionReport::start();
        let enabled = render_quickstart(&ArtifactContext::new(&names, &config, &report, true)).unwrap();
        let disabled = render_quickstart(&ArtifactContext::new(&names, &config, &report, false)).unwrap();
        assert!(!enabled.contains("Vector search is disabled"));
        assert!(disabled.contains("Vector search is disabled"));
    }

    #[test]
    fn test_helper_script_binds_loopback_and_probes() {
        let script =
            credential_helper_script(Path::new("/keys/demo.json"), 9001, "credentials.json").unwrap();
        assert!(script.starts_with("#!/usr/bin/env bash"));
        assert!(script.contains(r#"KEY_PATH="/keys/demo.json""#));
        assert!(script.contains(r#"FILE_NAME="credentials.json""#));
        assert!(script.contains(r#"PORT="9001""#));
        assert!(script.contains("--bind 127.0.0.1"));
        assert!(script.contains("ln -sf"));
        assert!(script.contains("curl -fsS"));
    }

    #[test]
    fn test_emit_overwrites_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let (names, config) = names_and_config();
        let report = ProvisionReport::start();
        let ctx = ArtifactContext::new(&names, &config, &report, false);

        std::fs::write(dir.path().join(ENV_FILE), "STALE=1\n").unwrap();
        let emitted = emit(&ctx, &report, &names.key_path, dir.path()).unwrap();

        let env = std::fs::read_to_string(&emitted.env_file).unwrap();
        assert!(!env.contains("STALE"));
        assert!(emitted.summary.exists());
        assert!(emitted.quickstart.exists());
        assert!(emitted.report.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&emitted.helper_script)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
