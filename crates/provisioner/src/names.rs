//! Project id validation and deterministic resource naming.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;

/// Dataset holding the chunk table.
pub const DATASET: &str = "pdf_processing";

/// Chunk table name.
pub const TABLE: &str = "pdf_chunks";

/// Prefix of generated project ids.
pub const GENERATED_PREFIX: &str = "pdf-processing";

static PROJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{5,29}$").expect("project id pattern"));

/// A validated project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Validate a project id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `raw` does not match
    /// `^[a-z][a-z0-9-]{5,29}$`.
    pub fn parse(raw: &str) -> Result<Self, ProvisionError> {
        let trimmed = raw.trim();
        if PROJECT_ID_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ProvisionError::Validation(format!(
                "'{trimmed}' is not a valid project id"
            )))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Modulus applied to the unix timestamp so generated ids stay within 30 characters.
const TIMESTAMP_MODULUS: u64 = 100_000_000;

/// Generate a fresh project id: `pdf-processing-{last 8 digits of unix seconds}-{6 hex}`.
///
/// The full ten-digit timestamp would push the id to 32 characters, past the
/// 30-character limit of a project id.
#[must_use]
pub fn generate_project_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{GENERATED_PREFIX}-{:08}-{}",
        now.as_secs() % TIMESTAMP_MODULUS,
        random_hex(now.subsec_nanos())
    )
}

/// Six lowercase hex characters from a v4 UUID.
///
/// A nil UUID means the generator produced nothing usable, in which case the
/// clock nanoseconds provide the suffix instead.
fn random_hex(fallback_seed: u32) -> String {
    let id = uuid::Uuid::new_v4();
    if id.is_nil() {
        return format!("{:06x}", fallback_seed & 0x00ff_ffff);
    }
    id.simple().to_string()[..6].to_string()
}

/// Every resource name derived from a project id.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceNames {
    pub project: ProjectId,
    pub region: String,
    pub bucket: String,
    pub dataset: String,
    pub table: String,
    pub text_index: String,
    pub vector_index: String,
    pub service_account_name: String,
    pub service_account_email: String,
    pub key_path: PathBuf,
}

impl ResourceNames {
    /// Derive all names for `project` under `config`.
    ///
    /// The key path is made absolute against the current directory so the
    /// emitted `GOOGLE_APPLICATION_CREDENTIALS` works from anywhere.
    #[must_use]
    pub fn derive(project: &ProjectId, config: &ProvisionConfig) -> Self {
        let key_file = config.variant.key_file_name(project.as_str());
        let key_path = config.output_dir.join(key_file);
        Self {
            project: project.clone(),
            region: config.region.clone(),
            bucket: format!("{project}-chunks"),
            dataset: DATASET.to_string(),
            table: TABLE.to_string(),
            text_index: format!("{TABLE}_text_index"),
            vector_index: format!("{TABLE}_vector_index"),
            service_account_name: config.service_account.clone(),
            service_account_email: format!(
                "{}@{project}.iam.gserviceaccount.com",
                config.service_account
            ),
            key_path: std::path::absolute(&key_path).unwrap_or(key_path),
        }
    }

    /// Fully-qualified table reference, `project.dataset.table`.
    #[must_use]
    pub fn table_ref(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }

    /// `gs://` URI of the bucket.
    #[must_use]
    pub fn bucket_uri(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    /// IAM member string for the service account.
    #[must_use]
    pub fn member(&self) -> String {
        format!("serviceAccount:{}", self.service_account_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;

    #[test]
    fn test_valid_project_ids() {
        for id in ["valid-id-123", "abcdef", "a-----", "pdf-processing-00000000-abc123"] {
            assert!(ProjectId::parse(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_invalid_project_ids() {
        for id in [
            "AB",
            "abc12",
            "1abcdef",
            "-abcdef",
            "Valid-id-123",
            "valid_id_123",
            "a234567890123456789012345678901",
            "",
        ] {
            assert!(ProjectId::parse(id).is_err(), "{id} should be rejected");
        }
    }

    #[test]
    fn test_max_length_boundary() {
        let thirty = format!("a{}", "b".repeat(29));
        assert!(ProjectId::parse(&thirty).is_ok());
        let thirty_one = format!("a{}", "b".repeat(30));
        assert!(ProjectId::parse(&thirty_one).is_err());
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_project_id();
        assert!(id.starts_with("pdf-processing-"));
        assert!(id.len() <= 30, "{id} is {} characters", id.len());
        let stamp = id.split('-').nth(2).unwrap();
        assert_eq!(stamp.len(), 8);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        let suffix = id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(ProjectId::parse(&id).is_ok());
    }

    #[test]
    fn test_derived_names() {
        let project = ProjectId::parse("demo-project").unwrap();
        let config = ProvisionConfig::new(Variant::Keyed).with_output_dir("/tmp/out");
        let names = ResourceNames::derive(&project, &config);

        assert_eq!(names.bucket, "demo-project-chunks");
        assert_eq!(names.dataset, "pdf_processing");
        assert_eq!(names.table, "pdf_chunks");
        assert_eq!(names.text_index, "pdf_chunks_text_index");
        assert_eq!(names.vector_index, "pdf_chunks_vector_index");
        assert_eq!(
            names.service_account_email,
            "pdf-processor@demo-project.iam.gserviceaccount.com"
        );
        assert_eq!(
            names.key_path,
            PathBuf::from("/tmp/out/demo-project-pdf-processor-key.json")
        );
        assert_eq!(names.table_ref(), "demo-project.pdf_processing.pdf_chunks");
    }

    #[test]
    fn test_generated_ids_are_valid_repeatedly() {
        for _ in 0..50 {
            let id = generate_project_id();
            assert!(ProjectId::parse(&id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn test_key_path_is_absolute_for_relative_output_dir() {
        let project = ProjectId::parse("demo-project").unwrap();
        let config = ProvisionConfig::new(Variant::Standard);
        assert_eq!(config.output_dir, PathBuf::from("."));

        let names = ResourceNames::derive(&project, &config);

        assert!(names.key_path.is_absolute(), "{}", names.key_path.display());
        assert!(names.key_path.ends_with("credentials.json"));
        assert_eq!(
            names.key_path,
            std::env::current_dir().unwrap().join("credentials.json")
        );
    }

    #[test]
    fn test_fallback_hex_is_six_chars() {
        assert_eq!(random_hex(0).len(), 6);
        assert_eq!(format!("{:06x}", 0xffff_ffff_u32 & 0x00ff_ffff), "ffffff");
    }
}
