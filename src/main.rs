//! genca CLI application.
//!
//! Reads `config.yml` from the working directory and writes the authority
//! and leaf certificates below `./ssl`. Takes no arguments.

use genca::config::{Config, CONFIG_FILENAME};
use genca::error::{GenCaError, Result};
use genca::issuer::Issuer;
use genca::storage::writer::OutputWriter;
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genca=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        // Each leaf failure has already been logged by the issuer
        Ok(false) => ExitCode::FAILURE,
        Err(err) if err.is_fatal() => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!("CA issuance failed, no leaf certificates written: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every configured certificate was issued.
fn run() -> Result<bool> {
    let working_dir = env::current_dir().map_err(|e| {
        GenCaError::Config(format!("Cannot determine working directory: {}", e))
    })?;

    tracing::info!("Loading config...");
    let config = Config::load(&working_dir.join(CONFIG_FILENAME))?;

    let writer = OutputWriter::for_working_directory(&working_dir);
    let report = Issuer::new(config, writer).run()?;

    Ok(report.is_success())
}
