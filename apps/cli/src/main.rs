mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ferryload_transfer::{HashMode, UploadOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commands::Target;
use config::CliConfig;

const EXIT_STOPPED: u8 = 2;

#[derive(Parser)]
#[command(name = "ferryload", version)]
#[command(about = "Resumable chunked file uploads")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging for ferryload crates (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct TargetArgs {
    /// Upload server base URL
    #[arg(long, value_name = "URL", conflicts_with = "store")]
    server: Option<String>,

    /// Local store directory instead of a server
    #[arg(long, value_name = "DIR")]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file, resuming any earlier partial upload
    Upload {
        file: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        /// Fingerprint mode: sample or all
        #[arg(long)]
        hash: Option<HashMode>,
        /// Name to store the file under (defaults to its file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Show what the server already holds for a file
    Check {
        file: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        hash: Option<HashMode>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Merge the uploaded chunks of NAME into the final file
    Merge {
        name: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info,ferryload=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let cfg = CliConfig::load(&config_path)?;

    match cli.command {
        Command::Upload {
            file,
            target,
            hash,
            name,
        } => {
            let target = Target::resolve(target.server, target.store, &cfg)?;
            let backend = target.backend().await?;
            let mut transfer = cfg.transfer.clone();
            if let Some(mode) = hash {
                transfer.hash_mode = mode;
            }

            let shutdown = CancellationToken::new();
            tokio::spawn({
                let shutdown = shutdown.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupt received, stopping upload");
                        shutdown.cancel();
                    }
                }
            });

            let outcome =
                commands::upload(&file, name, backend, transfer, &cfg.retry, shutdown).await?;
            match outcome {
                UploadOutcome::Instant => {
                    info!(file = %file.display(), "already on the server, nothing to send");
                    Ok(ExitCode::SUCCESS)
                }
                UploadOutcome::Completed => Ok(ExitCode::SUCCESS),
                UploadOutcome::Stopped => {
                    warn!(file = %file.display(), "upload stopped; run again to resume");
                    Ok(ExitCode::from(EXIT_STOPPED))
                }
            }
        }
        Command::Check {
            file,
            target,
            hash,
            name,
        } => {
            let target = Target::resolve(target.server, target.store, &cfg)?;
            let backend = target.backend().await?;
            let mode = hash.unwrap_or(cfg.transfer.hash_mode);
            let (identity, outcome) =
                commands::check(&file, name, backend.as_ref(), mode).await?;
            println!("{}", commands::describe(&identity, &outcome));
            Ok(ExitCode::SUCCESS)
        }
        Command::Merge { name, target } => {
            let target = Target::resolve(target.server, target.store, &cfg)?;
            let backend = target.backend().await?;
            commands::merge(&name, backend.as_ref()).await?;
            println!("{name} merged successfully");
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                CliConfig::default().save(&config_path)?;
                println!("wrote {}", config_path.display());
                Ok(ExitCode::SUCCESS)
            }
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload_flags() {
        let cli = Cli::try_parse_from([
            "ferryload",
            "upload",
            "movie.mkv",
            "--server",
            "http://nas:3000",
            "--hash",
            "all",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Upload {
                file, target, hash, ..
            } => {
                assert_eq!(file, PathBuf::from("movie.mkv"));
                assert_eq!(target.server.as_deref(), Some("http://nas:3000"));
                assert_eq!(hash, Some(HashMode::All));
            }
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn server_and_store_conflict() {
        let res = Cli::try_parse_from([
            "ferryload", "upload", "a", "--server", "http://x", "--store", "/tmp",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_unknown_hash_mode() {
        let res = Cli::try_parse_from(["ferryload", "check", "a", "--hash", "sha1"]);
        assert!(res.is_err());
    }
}
