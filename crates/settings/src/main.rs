use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use sitessl_common::SiteSslError;
use sitessl_common::config::AppConfig;
use sitessl_settings::SslSettings;
use sitessl_settings::db::init_db;
use sitessl_settings::state::build_validator;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// 被拒绝的上传使用的退出码
const EXIT_REJECTED: u8 = 2;

/// Custom-domain SSL key and certificate checks
#[derive(Parser, Debug)]
#[command(name = "sitessl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a key and certificate without touching any site
    Check {
        /// PEM private key file
        #[arg(long)]
        key: PathBuf,

        /// PEM certificate file, optionally followed by intermediates
        #[arg(long)]
        cert: PathBuf,

        /// Domain the certificate has to cover
        #[arg(long)]
        domain: String,
    },

    /// Validate and store a key and certificate on a site
    Install {
        #[arg(long)]
        site: Uuid,

        #[arg(long)]
        key: PathBuf,

        #[arg(long)]
        cert: PathBuf,
    },

    /// Show whether a site has SSL installed
    Status {
        #[arg(long)]
        site: Uuid,
    },

    /// Remove the stored key and certificate from a site
    Remove {
        #[arg(long)]
        site: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let validator = build_validator(&config)?;

    match cli.command {
        Commands::Check { key, cert, domain } => {
            let key_bytes = read_upload(&key, config.max_upload_bytes)?;
            let cert_bytes = read_upload(&cert, config.max_upload_bytes)?;
            let outcome = validator.validate_upload(&key_bytes, &cert_bytes, &domain);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.is_accepted() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_REJECTED))
            }
        }
        Commands::Install { site, key, cert } => {
            let settings = connect(&config, validator).await?;
            let key_bytes = std::fs::read(&key)
                .with_context(|| format!("failed to read {}", key.display()))?;
            let cert_bytes = std::fs::read(&cert)
                .with_context(|| format!("failed to read {}", cert.display()))?;
            match settings.upload(site, &key_bytes, &cert_bytes).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(SiteSslError::Rejected(rejection)) => {
                    eprintln!("{}: {}", rejection.message(), rejection.detail);
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
                Err(err) if err.is_client_error() => {
                    eprintln!("{err}");
                    Ok(ExitCode::from(EXIT_REJECTED))
                }
                Err(err) => Err(err.into()),
            }
        }
        Commands::Status { site } => {
            let settings = connect(&config, validator).await?;
            let status = settings.status(site).await?;
            println!("status: {status}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Remove { site } => {
            let settings = connect(&config, validator).await?;
            let status = settings.remove(site).await?;
            println!("status: {status}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(
    config: &AppConfig,
    validator: sitessl_validator::UploadValidator,
) -> Result<SslSettings> {
    let db = init_db(config.require_database_url()?).await?;
    info!("connected to site database");
    Ok(SslSettings::new(Arc::new(db), validator, config.max_upload_bytes))
}

/// 读取上传文件，超过上限直接报错
fn read_upload(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if len > limit {
        return Err(anyhow!(
            "{} is {len} bytes, the limit is {limit}",
            path.display()
        ));
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
