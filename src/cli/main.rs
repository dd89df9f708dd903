//! Keyward admin tool.
//!
//! Generates key pairs and license keys, signs license records with the
//! configured material, and checks signed records the way a client would.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use keyward::config::get_config;
use keyward::keys::generate_key_pair;
use keyward::license_key::{generate_license_key, generate_trial_key};
use keyward::logging::init_logging;
use keyward::{KeywardResult, LicenseRecord, LicenseSigner, LicenseVerifier, SigningStats};

#[derive(Debug, Parser)]
#[command(name = "keyward", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a self-tested P-256 key pair
    Keygen,
    /// Sign a license record read from a JSON file
    Sign {
        /// Unsigned record
        record: PathBuf,
    },
    /// Verify a signed license record (exit code 0 if trusted)
    Verify {
        /// Signed record
        record: PathBuf,
    },
    /// Generate a license key using the configured format
    NewKey {
        /// Generate a trial key instead
        #[arg(long)]
        trial: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(command: Commands) -> KeywardResult<ExitCode> {
    let config = get_config()?;
    init_logging(&config.logging);

    match command {
        Commands::Keygen => {
            let pair = generate_key_pair()?;
            println!("private_key={}", pair.private_key);
            println!("public_key={}", pair.public_key);
        }
        Commands::Sign { record } => {
            let raw = tokio::fs::read_to_string(&record).await?;
            let unsigned: LicenseRecord = serde_json::from_str(&raw)?;

            let signer = LicenseSigner::from_config(&config.signing, SigningStats::new())?;
            let signed = signer.sign(&unsigned)?;
            if !signed.is_signed() {
                eprintln!("warning: no signing material configured, record is unsigned");
            }

            println!("{}", serde_json::to_string_pretty(&signed)?);
            tracing::info!(
                mode = ?signer.mode(),
                stats = ?signer.stats().snapshot(),
                "signed record"
            );
        }
        Commands::Verify { record } => {
            let raw = tokio::fs::read_to_string(&record).await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;

            let verifier = LicenseVerifier::from_config(&config.verification)?;
            tracing::debug!(environment = ?verifier.environment(), "verifying record");
            if verifier.verify_value(&value) {
                println!("trusted");
            } else {
                println!("untrusted");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::NewKey { trial } => {
            let key = if trial {
                generate_trial_key(&config.license)
            } else {
                generate_license_key(&config.license)
            };
            println!("{key}");
        }
    }

    Ok(ExitCode::SUCCESS)
}
