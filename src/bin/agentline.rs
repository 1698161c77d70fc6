//! Command-line entry point for agent provisioning.
//!
//! Usage:
//!
//! ```text
//! agentline [--config <path>] register --company-id <id> [--agent-type LoadBoard]
//! agentline [--config <path>] orphans list
//! agentline [--config <path>] orphans reconcile <orphan-id>
//! ```
//!
//! Configuration is read from `agentline.toml` (or the given path) and
//! `AGENTLINE_*` environment variables. Logs go to stderr; command output
//! goes to stdout.

use agentline::config::{AppConfig, ConfigError, LoadOptions};
use agentline::provisioning::{
    adapters::{
        TracingEventSink,
        http::{HttpAgentProvider, HttpTelephonyProvider, TelephonyAccount},
        postgres::{
            PostgresAgentDirectory, PostgresCompanyDirectory, PostgresLeaseManager,
            PostgresOrphanLedger, ProvisioningPgPool, build_pool as build_pg_pool,
        },
    },
    domain::{OrphanId, OrphanedResource},
    ports::{AgentProviderError, TelephonyError},
    services::{
        ProvisioningError, ProvisioningPorts, ProvisioningReceipt, ProvisioningRequest,
        ProvisioningService, ReconciliationError, ReconciliationService,
    },
};
use agentline::telemetry::{self, TelemetryError};
use clap::{Parser, Subcommand};
use diesel::r2d2::PoolError;
use mockable::DefaultClock;
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "agentline", version, about = "Provision AI agents and phone numbers")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision an agent and phone number for a company.
    Register {
        /// Company to provision.
        #[arg(long)]
        company_id: i64,
        /// Agent type to provision.
        #[arg(long, default_value = "LoadBoard")]
        agent_type: String,
    },
    /// Inspect and reconcile resources left behind by failed runs.
    Orphans {
        #[command(subcommand)]
        command: OrphanCommand,
    },
}

#[derive(Debug, Subcommand)]
enum OrphanCommand {
    /// List unresolved orphaned resources.
    List,
    /// Undo an orphaned resource and mark it resolved.
    Reconcile {
        /// Ledger entry identifier.
        id: Uuid,
    },
}

/// Errors that end the process with a failure status.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to build database pool: {0}")]
    Pool(#[source] PoolError),
    #[error("failed to build agent provider client: {0}")]
    AgentProvider(#[source] AgentProviderError),
    #[error("failed to build telephony client: {0}")]
    Telephony(#[source] TelephonyError),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

impl CliError {
    /// Process exit status: the HTTP status class for provisioning failures.
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Provisioning(err) => match err.status_code() {
                400 | 404 => ExitCode::from(2),
                409 => ExitCode::from(3),
                502 => ExitCode::from(4),
                _ => ExitCode::FAILURE,
            },
            _ => ExitCode::FAILURE,
        }
    }
}

struct Runtime {
    ports: ProvisioningPorts,
    clock: Arc<DefaultClock>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
    }) {
        Ok(config) => config,
        Err(err) => return report(&CliError::Config(err)),
    };
    if let Err(err) = telemetry::init_logging(&config.logging) {
        return report(&CliError::Telemetry(err));
    }

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
        .and_then(|runtime| runtime.block_on(run(cli.command, &config)));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// Reports a failure on stderr. Logging may not be installed yet, so the
/// message is written directly as well as emitted as an event.
fn report(err: &CliError) -> ExitCode {
    error!(event_name = "cli.command.failed", error = %err, "command failed");
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "error: {err}").ok();
    if let CliError::Provisioning(failure) = err {
        for orphan in failure.orphans() {
            writeln!(
                stderr,
                "orphaned: {} {} (reconcile with `agentline orphans reconcile {}`)",
                orphan.kind(),
                orphan.reason(),
                orphan.id()
            )
            .ok();
        }
    }
    err.exit_code()
}

async fn run(command: Command, config: &AppConfig) -> Result<(), CliError> {
    let runtime = build_runtime(config)?;
    let mut stdout = io::stdout().lock();
    match command {
        Command::Register {
            company_id,
            agent_type,
        } => {
            let settings = config.provisioning_settings()?;
            let service =
                ProvisioningService::new(runtime.ports.clone(), settings, Arc::clone(&runtime.clock));
            let receipt = service
                .register(ProvisioningRequest::new(company_id, agent_type))
                .await?;
            info!(
                event_name = "cli.register.completed",
                run_id = %receipt.run_id,
                company_id = receipt.company_id.value(),
                "agent provisioned"
            );
            write_receipt(&mut stdout, &receipt)?;
        }
        Command::Orphans { command } => {
            let service = ReconciliationService::new(&runtime.ports, Arc::clone(&runtime.clock));
            match command {
                OrphanCommand::List => {
                    for orphan in service.list_unresolved().await? {
                        write_orphan(&mut stdout, &orphan)?;
                    }
                }
                OrphanCommand::Reconcile { id } => {
                    let resolved = service.reconcile(OrphanId::from_uuid(id)).await?;
                    write_orphan(&mut stdout, &resolved)?;
                }
            }
        }
    }
    stdout.flush()?;
    Ok(())
}

fn build_runtime(config: &AppConfig) -> Result<Runtime, CliError> {
    let clock = Arc::new(DefaultClock);
    let pool = build_pool(config)?;

    let agent_provider = HttpAgentProvider::new(
        config.agent_provider.url()?,
        SecretString::from(config.agent_provider.api_key.expose_secret().to_owned()),
        config.agent_provider.request_timeout(),
    )
    .map_err(CliError::AgentProvider)?;
    let telephony = HttpTelephonyProvider::new(
        config.telephony.url()?,
        TelephonyAccount {
            account_sid: config.telephony.account_sid.clone(),
            auth_token: SecretString::from(
                config.telephony.auth_token.expose_secret().to_owned(),
            ),
        },
        config.telephony.request_timeout(),
    )
    .map_err(CliError::Telephony)?;

    let ports = ProvisioningPorts {
        companies: Arc::new(PostgresCompanyDirectory::new(pool.clone())),
        agents: Arc::new(PostgresAgentDirectory::new(pool.clone())),
        agent_provider: Arc::new(agent_provider),
        telephony: Arc::new(telephony),
        leases: Arc::new(PostgresLeaseManager::new(pool.clone(), Arc::clone(&clock))),
        orphans: Arc::new(PostgresOrphanLedger::new(pool)),
        events: Arc::new(TracingEventSink::new()),
    };
    Ok(Runtime { ports, clock })
}

/// Store statements share the step bound that provider calls get from the
/// service.
fn build_pool(config: &AppConfig) -> Result<ProvisioningPgPool, CliError> {
    build_pg_pool(
        config.database.url.expose_secret(),
        config.database.max_connections,
        Duration::from_secs(config.database.timeout_secs),
        Duration::from_secs(config.provisioning.step_timeout_secs),
    )
    .map_err(CliError::Pool)
}

fn write_receipt(out: &mut impl Write, receipt: &ProvisioningReceipt) -> io::Result<()> {
    writeln!(out, "run_id\t{}", receipt.run_id)?;
    writeln!(out, "company_id\t{}", receipt.company_id)?;
    writeln!(out, "agent_id\t{}", receipt.agent_id)?;
    writeln!(out, "provider_agent_id\t{}", receipt.provider_agent_id)?;
    writeln!(out, "telephony_number\t{}", receipt.telephony_number)
}

fn write_orphan(out: &mut impl Write, orphan: &OrphanedResource) -> io::Result<()> {
    let status = orphan
        .resolved_at()
        .map_or_else(|| "unresolved".to_owned(), |at| format!("resolved {}", at.to_rfc3339()));
    writeln!(
        out,
        "{}\t{}\t{}\tcompany={}\trecorded={}\t{}\t{}",
        orphan.id(),
        orphan.kind().as_str(),
        orphan.kind().reference(),
        orphan.company_id(),
        orphan.recorded_at().to_rfc3339(),
        status,
        orphan.reason(),
    )
}
