//! Bucket, dataset, table and index ensures.

use tracing::{info, warn};

use crate::cloud::{CloudCli, CloudError, CloudResult, IndexKind};
use crate::ensure::ensure_required;
use crate::error::ProvisionError;
use crate::names::ResourceNames;
use crate::outcome::{Outcome, ResourceKind};
use crate::schema::{self, TableSchema};
use crate::ui;

/// Description set on the dataset.
pub const DATASET_DESCRIPTION: &str = "PDF chunks, embeddings and metadata";

/// Ensure the chunk bucket exists.
///
/// # Errors
///
/// Fatal if the bucket cannot be described or created.
pub fn ensure_bucket<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Result<Outcome, ProvisionError> {
    let project = names.project.as_str();
    ensure_required(
        ResourceKind::Bucket,
        &names.bucket,
        || cloud.bucket_exists(project, &names.bucket),
        || cloud.create_bucket(project, &names.bucket, &names.region),
    )
}

/// Ensure the dataset exists.
///
/// # Errors
///
/// Fatal if the dataset cannot be described or created.
pub fn ensure_dataset<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Result<Outcome, ProvisionError> {
    let project = names.project.as_str();
    ensure_required(
        ResourceKind::Dataset,
        &names.dataset,
        || cloud.dataset_exists(project, &names.dataset),
        || cloud.create_dataset(project, &names.dataset, &names.region, DATASET_DESCRIPTION),
    )
}

/// Ensure the chunk table exists with the fixed schema.
///
/// An existing table is never altered; a schema drift on it is reported as a
/// warning.
///
/// # Errors
///
/// Fatal if the table cannot be created, or a freshly created table does not
/// carry the expected schema.
pub fn ensure_table<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Result<Outcome, ProvisionError> {
    let project = names.project.as_str();
    let expected = TableSchema::pdf_chunks();
    let ddl = expected.create_table_ddl(&names.table_ref());

    let outcome = ensure_required(
        ResourceKind::Table,
        &names.table,
        || cloud.table_exists(project, &names.dataset, &names.table),
        || cloud.run_query(project, &names.region, &ddl).map(|_| ()),
    )?;

    let actual = match cloud.table_schema(project, &names.dataset, &names.table) {
        Ok(actual) => actual,
        Err(e) => {
            warn!(error = %e, "Could not read table schema");
            ui::print_warning(&format!("Could not verify schema of {}: {e}", names.table));
            return Ok(outcome);
        }
    };

    let diffs = expected.differences(&actual);
    if diffs.is_empty() {
        info!(table = %names.table_ref(), "Table schema verified");
        return Ok(outcome);
    }

    let summary = diffs.join("; ");
    if outcome == Outcome::Ensured {
        return Err(ProvisionError::required(
            ResourceKind::Table,
            &names.table,
            CloudError::Parse {
                command: format!("bq show --schema {}", names.table_ref()),
                message: format!("schema mismatch after creation: {summary}"),
            },
        ));
    }

    warn!(table = %names.table_ref(), %summary, "Existing table schema differs");
    ui::print_warning(&format!(
        "Existing table {} differs from the expected schema: {summary}",
        names.table
    ));
    Ok(outcome)
}

fn index_present<C: CloudCli>(
    cloud: &C,
    names: &ResourceNames,
    kind: IndexKind,
    index: &str,
) -> CloudResult<bool> {
    cloud.index_exists(
        names.project.as_str(),
        &names.region,
        &names.dataset,
        &names.table,
        kind,
        index,
    )
}

/// Outcome for an index whose lookup failed. Nothing is created, since the
/// index may already exist and `CREATE OR REPLACE` would rebuild it.
fn lookup_failed(resource: ResourceKind, index: &str, e: &CloudError) -> Outcome {
    let reason = format!("index lookup failed: {}", describe_failure(e));
    warn!(index, %reason, "Skipping index creation");
    ui::print_warning(&format!("{resource} {index} not checked: {reason}"));
    ui::print_info(resource.console_fallback());
    Outcome::Failed(reason)
}

fn describe_failure(e: &CloudError) -> String {
    e.provider_message().map_or_else(|| e.to_string(), str::to_string)
}

/// Create the text search index over `text`. Never fatal.
pub fn ensure_text_index<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Outcome {
    match index_present(cloud, names, IndexKind::Search, &names.text_index) {
        Ok(true) => {
            ui::print_warning(&format!("Search index {} already exists", names.text_index));
            return Outcome::AlreadyExists;
        }
        Ok(false) => {}
        Err(e) => return lookup_failed(ResourceKind::TextIndex, &names.text_index, &e),
    }

    ui::print_info(&format!("Creating search index {}...", names.text_index));
    match cloud.run_query(names.project.as_str(), &names.region, &schema::text_index_ddl(names)) {
        Ok(_) => {
            ui::print_success(&format!("Created search index {}", names.text_index));
            Outcome::Ensured
        }
        Err(e) => {
            let reason = describe_failure(&e);
            warn!(index = %names.text_index, %reason, "Search index creation failed");
            ui::print_warning(&format!("Search index not created: {reason}"));
            ui::print_info(ResourceKind::TextIndex.console_fallback());
            Outcome::Failed(reason)
        }
    }
}

/// Create the vector index over `embedding`. Never fatal.
///
/// Tries the IVF-tuned statement first, then the same statement without
/// `ivf_options`. The provider's error text for each attempt is kept.
pub fn ensure_vector_index<C: CloudCli>(cloud: &C, names: &ResourceNames) -> Outcome {
    match index_present(cloud, names, IndexKind::Vector, &names.vector_index) {
        Ok(true) => {
            ui::print_warning(&format!("Vector index {} already exists", names.vector_index));
            return Outcome::AlreadyExists;
        }
        Ok(false) => {}
        Err(e) => return lookup_failed(ResourceKind::VectorIndex, &names.vector_index, &e),
    }

    let project = names.project.as_str();
    ui::print_info(&format!("Creating vector index {}...", names.vector_index));

    let first = match cloud.run_query(project, &names.region, &schema::vector_index_ddl(names, true)) {
        Ok(_) => {
            ui::print_success(&format!("Created vector index {}", names.vector_index));
            return Outcome::Ensured;
        }
        Err(e) => describe_failure(&e),
    };
    warn!(index = %names.vector_index, reason = %first, "Vector index with ivf_options failed");
    ui::print_warning(&format!("Vector index with ivf_options rejected: {first}"));

    match cloud.run_query(project, &names.region, &schema::vector_index_ddl(names, false)) {
        Ok(_) => {
            ui::print_success(&format!(
                "Created vector index {} without ivf_options",
                names.vector_index
            ));
            Outcome::Ensured
        }
        Err(e) => {
            let second = describe_failure(&e);
            warn!(index = %names.vector_index, reason = %second, "Vector index fallback failed");
            ui::print_warning(&format!("Vector index not created: {second}"));
            ui::print_info(ResourceKind::VectorIndex.console_fallback());
            Outcome::Failed(format!("with ivf_options: {first}; without: {second}"))
        }
    }
}
