//! locale-mgmt - locale bundle service behind an OpenID Connect login
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: OpenID Connect login flow, identity claims and server-side sessions
//! - `server`: axum router, login handlers, session middleware and the locale API
//! - `locale`: locale items and their SQLite storage
//! - `config`: Configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use locale_mgmt::{cli::Cli, server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Cli::default())?;
//!     config.validate()?;
//!     server::serve(config).await
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod locale;
pub mod logging;
pub mod server;

pub use auth::AuthError;
pub use config::Config;
pub use error::{LocaleMgmtError, Result};
pub use server::{build_router, AppState};

#[cfg(test)]
pub mod test_utils;
