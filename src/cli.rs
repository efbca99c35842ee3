//! Command-line interface definition for locale-mgmt
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for running the gateway and probing the provider.

use clap::{Parser, Subcommand};

/// locale-mgmt - locale bundle service behind an OpenID Connect login
#[derive(Parser, Debug, Clone)]
#[command(name = "locale-mgmt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for locale-mgmt
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Override the bind address from config (e.g. 127.0.0.1:8080)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch the identity provider's discovery document and print it
    Discover,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Bind address override carried by the `serve` command, if any
    pub fn bind_override(&self) -> Option<&str> {
        match &self.command {
            Commands::Serve { bind } => bind.as_deref(),
            Commands::Discover => None,
        }
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Serve { bind: None },
        }
    }
}
