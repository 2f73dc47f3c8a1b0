//! Serve-key command - expose the key file on loopback for download.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use pdf_provision::artifacts::DEFAULT_SERVE_PORT;
use pdf_provision::serve;

/// Serve the service account key on 127.0.0.1 until interrupted.
#[derive(Args, Debug)]
pub struct ServeKeyCommand {
    /// Key file to serve.
    #[arg(short, long, env = "PDF_PROVISION_KEY", default_value = "credentials.json")]
    key: PathBuf,

    /// Loopback port to listen on. 0 picks a free port.
    #[arg(short, long, env = "PDF_PROVISION_SERVE_PORT", default_value_t = DEFAULT_SERVE_PORT)]
    port: u16,
}

impl ServeKeyCommand {
    /// Run the serve-key command.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is missing or the server cannot start.
    pub async fn run(&self) -> Result<()> {
        serve::serve_key(self.key.clone(), self.port, async {
            tokio::signal::ctrl_c().await.ok();
            info!("Interrupt received, shutting down");
        })
        .await
    }
}
