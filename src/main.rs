//! locale-mgmt - locale bundle service behind an OpenID Connect login
//!
#![doc = "Main entry point for the locale-mgmt gateway."]

use anyhow::Result;

use locale_mgmt::auth::discovery::fetch_provider_metadata;
use locale_mgmt::cli::{Cli, Commands};
use locale_mgmt::config::Config;
use locale_mgmt::LocaleMgmtError;
use locale_mgmt::{logging, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    logging::init_tracing(&config.logging)?;

    match cli.command {
        Commands::Serve { .. } => {
            config.validate()?;
            tracing::info!(issuer = %config.auth.issuer_url, "Starting locale-mgmt gateway");
            server::serve(config).await
        }
        Commands::Discover => {
            tracing::info!(issuer = %config.auth.issuer_url, "Running provider discovery");
            let http = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(
                    config.auth.http_timeout_seconds,
                ))
                .build()
                .map_err(|e| LocaleMgmtError::Provider(e.to_string()))?;
            let metadata = fetch_provider_metadata(&http, &config.auth.issuer_url)
                .await
                .map_err(|e| LocaleMgmtError::Provider(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
    }
}
