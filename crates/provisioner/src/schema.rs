//! Chunk table schema and the DDL statements derived from it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::names::ResourceNames;

/// Column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    /// `ARRAY<FLOAT64>`; materialised as a repeated `FLOAT` column.
    Float64Array,
}

impl FieldType {
    fn ddl(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Float64Array => "ARRAY<FLOAT64>",
        }
    }
}

/// Column mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    Required,
    Nullable,
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub mode: FieldMode,
}

impl FieldSpec {
    fn new(name: &str, ty: FieldType, mode: FieldMode) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode,
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.ty.ddl())?;
        if self.mode == FieldMode::Required {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Schema of the chunk table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSpec>,
}

impl TableSchema {
    /// The fixed eight-column schema consumed by the PDF application.
    #[must_use]
    pub fn pdf_chunks() -> Self {
        use FieldMode::{Nullable, Required};
        use FieldType::{Float64Array, String};

        Self {
            fields: vec![
                FieldSpec::new("chunk_id", String, Required),
                FieldSpec::new("doc_id", String, Required),
                FieldSpec::new("filename", String, Required),
                FieldSpec::new("gcs_path", String, Required),
                FieldSpec::new("original_pdf_ipfs_path", String, Required),
                FieldSpec::new("text", String, Required),
                FieldSpec::new("embedding", Float64Array, Nullable),
                FieldSpec::new("pdf_metadata", String, Nullable),
            ],
        }
    }

    /// `CREATE TABLE` statement for `table_ref` (`project.dataset.table`).
    #[must_use]
    pub fn create_table_ddl(&self, table_ref: &str) -> String {
        let columns = self
            .fields
            .iter()
            .map(|f| format!("  {f}"))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE IF NOT EXISTS `{table_ref}` (\n{columns}\n)")
    }

    /// Columns that are missing or differ in `actual`, compared by name.
    ///
    /// Column order is ignored. Extra columns in `actual` are reported too.
    #[must_use]
    pub fn differences(&self, actual: &[FieldSpec]) -> Vec<String> {
        let by_name: HashMap<&str, &FieldSpec> =
            actual.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut diffs = Vec::new();
        for expected in &self.fields {
            match by_name.get(expected.name.as_str()) {
                None => diffs.push(format!("missing column {}", expected.name)),
                Some(found) if *found != expected => {
                    diffs.push(format!("column {} is `{found}`, expected `{expected}`", expected.name));
                }
                Some(_) => {}
            }
        }
        for extra in actual {
            if !self.fields.iter().any(|f| f.name == extra.name) {
                diffs.push(format!("unexpected column {}", extra.name));
            }
        }
        diffs
    }

    /// Whether `actual` has exactly this schema, ignoring column order.
    #[must_use]
    pub fn matches(&self, actual: &[FieldSpec]) -> bool {
        self.differences(actual).is_empty()
    }
}

/// Column as reported by `bq show --schema --format=json`.
#[derive(Debug, Deserialize)]
struct BqField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    mode: Option<String>,
}

/// Parse the JSON schema printed by `bq show --schema`.
///
/// # Errors
///
/// Returns a message if the JSON is malformed or uses a column type this
/// tool never creates.
pub fn parse_bq_schema(json: &str) -> Result<Vec<FieldSpec>, String> {
    let raw: Vec<BqField> = serde_json::from_str(json).map_err(|e| e.to_string())?;
    raw.into_iter()
        .map(|f| {
            let mode = f.mode.unwrap_or_else(|| "NULLABLE".to_string());
            let (ty, mode) = match (f.ty.as_str(), mode.as_str()) {
                ("STRING", "REQUIRED") => (FieldType::String, FieldMode::Required),
                ("STRING", "NULLABLE") => (FieldType::String, FieldMode::Nullable),
                ("FLOAT" | "FLOAT64", "REPEATED") => (FieldType::Float64Array, FieldMode::Nullable),
                (ty, mode) => {
                    return Err(format!("column {} has unsupported type {ty} {mode}", f.name));
                }
            };
            Ok(FieldSpec { name: f.name, ty, mode })
        })
        .collect()
}

/// `CREATE SEARCH INDEX` statement over the `text` column.
#[must_use]
pub fn text_index_ddl(names: &ResourceNames) -> String {
    format!(
        "CREATE SEARCH INDEX IF NOT EXISTS {} ON `{}`(text)",
        names.text_index,
        names.table_ref()
    )
}

/// `CREATE VECTOR INDEX` statement over the `embedding` column.
///
/// With `ivf_options` this is the primary statement; without it, the
/// fallback tried when the provider rejects the IVF tuning.
#[must_use]
pub fn vector_index_ddl(names: &ResourceNames, ivf_options: bool) -> String {
    let mut options = String::from("distance_type='COSINE', index_type='IVF'");
    if ivf_options {
        options.push_str(r#", ivf_options='{"num_lists": 100}'"#);
    }
    format!(
        "CREATE OR REPLACE VECTOR INDEX {} ON {}(embedding) OPTIONS({options})",
        names.vector_index,
        names.table_ref()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProvisionConfig, Variant};
    use crate::names::ProjectId;

    fn names() -> ResourceNames {
        let project = ProjectId::parse("demo-project").unwrap();
        ResourceNames::derive(&project, &ProvisionConfig::new(Variant::Standard))
    }

    #[test]
    fn test_schema_has_eight_fields() {
        let schema = TableSchema::pdf_chunks();
        assert_eq!(schema.fields.len(), 8);
        let required: Vec<_> = schema
            .fields
            .iter()
            .filter(|f| f.mode == FieldMode::Required)
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            required,
            ["chunk_id", "doc_id", "filename", "gcs_path", "original_pdf_ipfs_path", "text"]
        );
    }

    #[test]
    fn test_create_table_ddl() {
        let ddl = TableSchema::pdf_chunks().create_table_ddl("p.d.t");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `p.d.t` ("));
        assert!(ddl.contains("  chunk_id STRING NOT NULL,"));
        assert!(ddl.contains("  embedding ARRAY<FLOAT64>,"));
        assert!(ddl.trim_end().ends_with("pdf_metadata STRING\n)"));
    }

    #[test]
    fn test_matches_ignores_order() {
        let schema = TableSchema::pdf_chunks();
        let mut reversed = schema.fields.clone();
        reversed.reverse();
        assert!(schema.matches(&reversed));
    }

    #[test]
    fn test_differences_report_mode_and_missing() {
        let schema = TableSchema::pdf_chunks();
        let mut actual = schema.fields.clone();
        actual.retain(|f| f.name != "gcs_path");
        actual[0].mode = FieldMode::Nullable;
        actual.push(FieldSpec::new("extra", FieldType::String, FieldMode::Nullable));

        let diffs = schema.differences(&actual);
        assert_eq!(diffs.len(), 3, "{diffs:?}");
        assert!(diffs.iter().any(|d| d.contains("missing column gcs_path")));
        assert!(diffs.iter().any(|d| d.starts_with("column chunk_id")));
        assert!(diffs.iter().any(|d| d.contains("unexpected column extra")));
    }

    #[test]
    fn test_parse_bq_schema() {
        let json = r#"[
            {"name":"chunk_id","type":"STRING","mode":"REQUIRED"},
            {"name":"doc_id","type":"STRING","mode":"REQUIRED"},
            {"name":"filename","type":"STRING","mode":"REQUIRED"},
            {"name":"gcs_path","type":"STRING","mode":"REQUIRED"},
            {"name":"original_pdf_ipfs_path","type":"STRING","mode":"REQUIRED"},
            {"name":"text","type":"STRING","mode":"REQUIRED"},
            {"name":"embedding","type":"FLOAT","mode":"REPEATED"},
            {"name":"pdf_metadata","type":"STRING"}
        ]"#;
        let fields = parse_bq_schema(json).unwrap();
        assert!(TableSchema::pdf_chunks().matches(&fields));
    }

    #[test]
    fn test_parse_bq_schema_rejects_unknown_type() {
        let json = r#"[{"name":"n","type":"INTEGER","mode":"NULLABLE"}]"#;
        assert!(parse_bq_schema(json).is_err());
    }

    #[test]
    fn test_index_statements() {
        let names = names();
        assert_eq!(
            text_index_ddl(&names),
            "CREATE SEARCH INDEX IF NOT EXISTS pdf_chunks_text_index ON `demo-project.pdf_processing.pdf_chunks`(text)"
        );
        assert_eq!(
            vector_index_ddl(&names, true),
            r#"CREATE OR REPLACE VECTOR INDEX pdf_chunks_vector_index ON demo-project.pdf_processing.pdf_chunks(embedding) OPTIONS(distance_type='COSINE', index_type='IVF', ivf_options='{"num_lists": 100}')"#
        );
        assert!(!vector_index_ddl(&names, false).contains("ivf_options"));
    }
}
