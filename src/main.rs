//! CLI entry point for cscguard.
//!
//! Loads the endpoint config and preferences, resolves secrets through the
//! 1Password CLI, then runs one subcommand and prints its JSON result.
//!
//! Exit codes:
//! - 0: success (including an empty `data` envelope, printed as `null`)
//! - 1: runtime error (config, secret backend, HTTP outcome, missing token)
//! - 2: argument validation error (clap handles this automatically)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cscguard::audit::{AuditLogQuery, DEFAULT_AUDIT_LIMIT};
use cscguard::client::SecureEndpointClient;
use cscguard::config::{ClientSettings, DEFAULT_CONFIG_PATH, DEFAULT_PREFERENCES_PATH};
use cscguard::credentials::CredentialManager;
use cscguard::error::{CscError, Result};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Region to target: nam, emea or apjc. Unknown values fall back to nam.
    #[arg(long, env = "CSC_REGION", default_value = "nam")]
    region: String,

    /// Endpoint URL map.
    #[arg(long, env = "CSC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Preferences document declaring which secrets to load.
    #[arg(long, env = "CSC_PREFERENCES", default_value = DEFAULT_PREFERENCES_PATH)]
    preferences: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum TokenTarget {
    Securex,
    Endpoint,
    Umbrella,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch an OAuth2 access token and print it.
    Token {
        #[arg(value_enum)]
        target: TokenTarget,
    },
    #[command(flatten)]
    Api(ApiCommand),
}

/// Secure Endpoint v1 calls; each prints the envelope's `data`.
#[derive(Subcommand)]
enum ApiCommand {
    /// List computers.
    Computers {
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Raw query fragment, e.g. "hostname[]=host1".
        #[arg(long)]
        query: Option<String>,
    },
    /// Show one computer.
    Computer { uuid: String },
    /// Move a computer into another group.
    Move { uuid: String, group: String },
    /// Delete a computer.
    Delete { uuid: String },
    /// Computers that have observed a hash, IP, URL or file name.
    Activity {
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Audit log entries.
    AuditLog {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        event: Option<String>,
        #[arg(long = "type")]
        log_type: Option<String>,
        #[arg(long, default_value_t = DEFAULT_AUDIT_LIMIT)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Device trajectory for one computer.
    Trajectory {
        uuid: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Raw query fragment, e.g. "q=10.0.0.1".
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 500)]
        limit: u32,
    },
    /// Computers on which a user has been observed.
    UserActivity {
        username: String,
        #[arg(long, default_value_t = 500)]
        limit: u32,
    },
    /// Trajectory of one user on one computer.
    UserTrajectory {
        username: String,
        uuid: String,
        #[arg(long, default_value_t = 500)]
        limit: u32,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Vulnerable applications on a computer.
    Vulns {
        uuid: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 500)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Operating system vulnerabilities on a computer.
    OsVulns {
        uuid: String,
        #[arg(long, default_value_t = 500)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Isolation status of a computer.
    Isolation { uuid: String },
    /// Whether a computer may be isolated under its policy; prints true or false.
    CanIsolate { uuid: String },
}

fn print_data(data: Option<Value>) {
    let data = data.unwrap_or(Value::Null);
    match serde_json::to_string_pretty(&data) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{data}"),
    }
}

async fn fetch_token(settings: &ClientSettings, target: TokenTarget) -> Result<Option<String>> {
    let manager = CredentialManager::new(settings).await?;
    Ok(match target {
        TokenTarget::Securex => manager.fetch_securex_token().await,
        TokenTarget::Endpoint => manager.fetch_endpoint_token().await,
        TokenTarget::Umbrella => manager.fetch_umbrella_token().await,
    })
}

async fn call(client: &SecureEndpointClient, command: ApiCommand) -> Result<Option<Value>> {
    let data = match command {
        ApiCommand::Computers {
            offset,
            limit,
            query,
        } => client.list_computers(offset, limit, query.as_deref()).await?,
        ApiCommand::Computer { uuid } => client.get_computer(&uuid).await?,
        ApiCommand::Move { uuid, group } => client.move_computer(&uuid, &group).await?,
        ApiCommand::Delete { uuid } => client.delete_computer(&uuid).await?,
        ApiCommand::Activity {
            query,
            limit,
            offset,
        } => client.get_computer_activity(&query, limit, offset).await?,
        ApiCommand::AuditLog {
            user,
            start,
            end,
            event,
            log_type,
            limit,
            offset,
        } => {
            let filter = AuditLogQuery {
                user,
                start,
                end,
                event,
                log_type,
                limit,
                offset,
            };
            client.get_audit_log(&filter).await?
        }
        ApiCommand::Trajectory {
            uuid,
            start,
            end,
            query,
            limit,
        } => {
            client
                .get_device_trajectory(
                    &uuid,
                    start.as_deref(),
                    end.as_deref(),
                    query.as_deref(),
                    limit,
                )
                .await?
        }
        ApiCommand::UserActivity { username, limit } => {
            client.get_user_activity(&username, limit).await?
        }
        ApiCommand::UserTrajectory {
            username,
            uuid,
            limit,
            start,
            end,
        } => {
            client
                .get_user_trajectory(&username, &uuid, limit, start.as_deref(), end.as_deref())
                .await?
        }
        ApiCommand::Vulns {
            uuid,
            start,
            end,
            limit,
            offset,
        } => {
            client
                .get_vulnerabilities(&uuid, start.as_deref(), end.as_deref(), limit, offset)
                .await?
        }
        ApiCommand::OsVulns {
            uuid,
            limit,
            offset,
        } => client.get_os_vulnerabilities(&uuid, limit, offset).await?,
        ApiCommand::Isolation { uuid } => client.get_isolation_status(&uuid).await?,
        ApiCommand::CanIsolate { uuid } => {
            Some(Value::Bool(client.check_isolation_availability(&uuid).await?))
        }
    };
    Ok(data)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = ClientSettings {
        region: cli.region,
        config_path: cli.config,
        preferences_path: cli.preferences,
    };

    match cli.command {
        Command::Token { target } => Ok(match fetch_token(&settings, target).await? {
            Some(token) => {
                println!("{token}");
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("Error: token request failed; see log output for details");
                ExitCode::FAILURE
            }
        }),
        Command::Api(command) => {
            let client = SecureEndpointClient::new(&settings).await?;
            print_data(call(&client, command).await?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e @ CscError::Http(_)) => {
            eprintln!("Request failed: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
