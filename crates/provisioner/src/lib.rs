//! Idempotent Google Cloud provisioning for the PDF processing pipeline.
//!
//! Brings a project, its APIs, a chunk bucket, a BigQuery dataset, table and
//! indexes, a service account with a fresh key and its role grants into the
//! desired state, then writes the env file and guides the application needs.
//!
//! # Example
//!
//! ```ignore
//! use pdf_provision::cloud::GcloudCli;
//! use pdf_provision::config::{ProvisionConfig, Variant};
//! use pdf_provision::orchestrator::Provisioner;
//! use pdf_provision::prompt::NonInteractivePrompter;
//!
//! let config = ProvisionConfig::new(Variant::Standard)
//!     .with_project("pdf-processing-demo")
//!     .non_interactive();
//! let mut provisioner = Provisioner::new(GcloudCli::new(), NonInteractivePrompter, config);
//! let summary = provisioner.run()?;
//! println!("{}", summary.names.table_ref());
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]
// Allow async functions that don't use await
#![allow(clippy::unused_async)]
// Allow imports after statements in functions
#![allow(clippy::items_after_statements)]

pub mod apis;
pub mod artifacts;
pub mod billing;
pub mod cloud;
pub mod config;
pub mod ensure;
pub mod error;
pub mod identity;
pub mod names;
pub mod orchestrator;
pub mod outcome;
pub mod preflight;
pub mod project;
pub mod prompt;
pub mod schema;
pub mod serve;
pub mod state;
pub mod status;
pub mod storage;
pub mod ui;

pub use config::{BillingPolicy, ProvisionConfig, Variant};
pub use error::ProvisionError;
pub use orchestrator::{ProvisionSummary, Provisioner};
pub use outcome::{Outcome, ProvisionReport, ResourceKind};
