//! pdf-provision CLI.
//!
//! Provisions the Google Cloud project, storage, BigQuery table and service
//! account used by the PDF processing application.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]
// Allow async functions that don't use await
#![allow(clippy::unused_async)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pdf_provision::{ui, ProvisionError};

mod commands;

use commands::provision::ProvisionCommand;
use commands::serve_key::ServeKeyCommand;
use commands::status::StatusCommand;

/// PDF processing infrastructure provisioner.
#[derive(Parser)]
#[command(
    name = "pdf-provision",
    version,
    about = "Provision Google Cloud resources for the PDF processing pipeline",
    long_about = "Create or reuse a Google Cloud project and bring its APIs, storage bucket,\n\
                  BigQuery dataset, table and indexes, service account, key and role grants\n\
                  into the state the PDF processing application expects.\n\n\
                  All operations are idempotent - re-running only creates what is missing\n\
                  and replaces the service account key."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every resource and write the env file.
    ///
    /// Existing resources are kept; only missing ones are created.
    Provision(ProvisionCommand),

    /// Report which resources exist, without changing anything.
    Status(StatusCommand),

    /// Serve the key file on 127.0.0.1 for download from a remote shell.
    ServeKey(ServeKeyCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,pdf_provision=debug")
    } else {
        EnvFilter::new("warn,pdf_provision=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Provision(cmd) => cmd.run().await,
        Commands::Status(cmd) => cmd.run().await,
        Commands::ServeKey(cmd) => cmd.run().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn report_failure(err: &anyhow::Error) -> ExitCode {
    let Some(provision_err) = err.downcast_ref::<ProvisionError>() else {
        ui::print_error(&format!("{err:#}"));
        return ExitCode::FAILURE;
    };

    if !provision_err.is_fatal() {
        ui::print_warning(&provision_err.to_string());
        return ExitCode::SUCCESS;
    }

    ui::print_error(&format!("{err:#}"));
    if let Some(remediation) = provision_err.remediation() {
        ui::print_remediation(&remediation);
    }
    ExitCode::FAILURE
}
