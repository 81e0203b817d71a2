//! netfleet - run commands across a network device fleet
//!
//! ## Commands
//!
//! - `run`: send one command to every device and print the raw output
//! - `inactive-peers`: BGP sessions down for a week or more
//! - `peer-addresses`: peer addresses per device
//! - `troubleshoot`: summary, log, ping and capture for one BGP neighbor
//! - `versions`: firmware `VERSION=` line per device
//! - `descriptions`: plan (and with `--apply`, push) description prefixes

mod config;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use netfleet_core::{
    long_inactive_peers, plan_by_device_role, ApplyResult, DeviceDescriptor, Dispatcher, Grammar,
    MutationBatch, SessionConnector, BGP_SUMMARY_COMMAND, DEFAULT_INTERFACE_PREFIX,
    INTERFACE_DESCRIPTION_COMMAND,
};
use netfleet_transport::{OpenSshConnector, ReplayConnector};

use crate::config::LoadedConfig;
use crate::render::OutputFormat;

const HOSTNAME_NOTE: &str = "Over ssh the device prompt is not read: results are keyed by the \
inventory name. With --replay, a fixture's `prompt` supplies the hostname.";

#[derive(Parser)]
#[command(name = "netfleet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrent inspection and remediation of network devices", long_about = None)]
#[command(after_long_help = HOSTNAME_NOTE)]
struct Cli {
    /// Config file (default: ./netfleet.toml when present)
    #[arg(long, global = true, env = "NETFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Answer from a JSON fixture instead of connecting over ssh
    #[arg(long, global = true)]
    replay: Option<PathBuf>,

    /// Maximum devices contacted at once (overrides the config file)
    #[arg(long, global = true, env = "NETFLEET_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a command to every device and print its output
    Run {
        /// Command to execute
        command: String,
    },

    /// List BGP peers that have been down for a long time
    InactivePeers {
        /// Minimum days down (default: config `inactive_after_days`)
        #[arg(long)]
        threshold_days: Option<u32>,

        #[arg(long, default_value = BGP_SUMMARY_COMMAND)]
        command: String,
    },

    /// Collect peer addresses from every device, keyed by hostname
    PeerAddresses {
        #[arg(long, default_value = BGP_SUMMARY_COMMAND)]
        command: String,
    },

    /// Gather troubleshooting data for one BGP neighbor
    Troubleshoot {
        /// Device name from the inventory (or a host to contact directly)
        #[arg(long)]
        device: String,

        /// Neighbor address
        #[arg(long)]
        peer: String,
    },

    /// Report the software version of every device
    Versions {
        /// Command whose output carries a `VERSION=` line
        #[arg(long)]
        command: String,
    },

    /// Prefix interface descriptions according to the remediation policy
    Descriptions {
        /// Role used for devices without one in the inventory
        #[arg(long)]
        role: String,

        #[arg(long, default_value = INTERFACE_DESCRIPTION_COMMAND)]
        command: String,

        #[arg(long, default_value = DEFAULT_INTERFACE_PREFIX)]
        interface_prefix: String,

        /// Push the plan to the devices (default: only print it)
        #[arg(long)]
        apply: bool,
    },
}

/// Everything a subcommand needs.
struct Fleet {
    dispatcher: Dispatcher,
    devices: Vec<DeviceDescriptor>,
    loaded: LoadedConfig,
    concurrency: usize,
    output: OutputFormat,
}

impl Fleet {
    fn emit(
        &self,
        operation: &str,
        data: impl serde::Serialize,
        text: impl FnOnce() -> String,
    ) -> Result<()> {
        match self.output {
            OutputFormat::Json => println!("{}", render::to_json(operation, data)?),
            OutputFormat::Text => print!("{}", text()),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    netfleet_core::telemetry::init_tracing(cli.json, level);

    let fleet = setup(&cli)?;

    match cli.command {
        Commands::Run { command } => cmd_run(&fleet, &command).await,
        Commands::InactivePeers {
            threshold_days,
            command,
        } => cmd_inactive_peers(&fleet, &command, threshold_days).await,
        Commands::PeerAddresses { command } => cmd_peer_addresses(&fleet, &command).await,
        Commands::Troubleshoot { device, peer } => cmd_troubleshoot(&fleet, &device, &peer).await,
        Commands::Versions { command } => cmd_versions(&fleet, &command).await,
        Commands::Descriptions {
            role,
            command,
            interface_prefix,
            apply,
        } => cmd_descriptions(&fleet, &role, &command, &interface_prefix, apply).await,
    }
}

fn setup(cli: &Cli) -> Result<Fleet> {
    let config_path = config::locate(cli.config.as_deref());
    let loaded = config::load(config_path.as_deref())?;
    let mut devices = loaded.devices()?;

    let connector: Arc<dyn SessionConnector> = match &cli.replay {
        Some(path) => {
            let replay = ReplayConnector::from_path(path)?;
            if devices.is_empty() {
                devices = replay.devices();
            }
            Arc::new(replay)
        }
        None => Arc::new(OpenSshConnector::new(loaded.config.ssh.clone())),
    };

    let concurrency = cli.concurrency.unwrap_or(loaded.config.concurrency);
    info!(
        devices = devices.len(),
        concurrency,
        config = ?config_path,
        "fleet loaded"
    );
    Ok(Fleet {
        dispatcher: Dispatcher::new(connector),
        devices,
        loaded,
        concurrency,
        output: cli.output,
    })
}

/// Send one command everywhere
async fn cmd_run(fleet: &Fleet, command: &str) -> Result<()> {
    let results = fleet
        .dispatcher
        .dispatch(&fleet.devices, command, fleet.concurrency)
        .await?;
    fleet.emit("run", &results, || render::command_results(&results))
}

async fn cmd_inactive_peers(fleet: &Fleet, command: &str, threshold: Option<u32>) -> Result<()> {
    let threshold = threshold.unwrap_or(fleet.loaded.config.inactive_after_days);
    let report = fleet
        .dispatcher
        .scan(&fleet.devices, command, &Grammar::BgpSummary, fleet.concurrency)
        .await?;
    let inactive = long_inactive_peers(&report.records, threshold);
    fleet.emit(
        "inactive_peers",
        serde_json::json!({ "threshold_days": threshold, "devices": &inactive, "failures": &report.failures }),
        || render::inactive_peers(&inactive, &report.failures, threshold),
    )
}

async fn cmd_peer_addresses(fleet: &Fleet, command: &str) -> Result<()> {
    let (lists, failures) = fleet
        .dispatcher
        .peer_addresses(&fleet.devices, command, fleet.concurrency)
        .await?;
    fleet.emit(
        "peer_addresses",
        serde_json::json!({ "devices": &lists, "failures": &failures }),
        || render::peer_addresses(&lists, &failures),
    )
}

async fn cmd_troubleshoot(fleet: &Fleet, device: &str, peer: &str) -> Result<()> {
    let target = fleet
        .devices
        .iter()
        .find(|d| d.name == device)
        .cloned()
        .unwrap_or_else(|| DeviceDescriptor::new(device));

    match fleet.dispatcher.troubleshoot_peer(&target, peer).await {
        Ok(report) => fleet.emit("troubleshoot", &report, || render::peer_report(&report)),
        Err(e) => {
            let message = format!("{target}: ERROR [{}] {e}\n", e.kind());
            fleet.emit(
                "troubleshoot",
                serde_json::json!({ "device": &target, "status": e.kind(), "error": e.to_string() }),
                || message,
            )
        }
    }
}

async fn cmd_versions(fleet: &Fleet, command: &str) -> Result<()> {
    let results = fleet
        .dispatcher
        .software_versions(&fleet.devices, command, fleet.concurrency)
        .await?;
    fleet.emit("versions", &results, || render::versions(&results))
}

async fn cmd_descriptions(
    fleet: &Fleet,
    role: &str,
    command: &str,
    interface_prefix: &str,
    apply: bool,
) -> Result<()> {
    let policy = &fleet.loaded.config.policy;
    if policy.is_empty() {
        anyhow::bail!("no [policy] table in the config; nothing to plan against");
    }

    let report = fleet
        .dispatcher
        .scan(
            &fleet.devices,
            command,
            &Grammar::interfaces(interface_prefix),
            fleet.concurrency,
        )
        .await?;
    let batch = plan_by_device_role(&report.records, policy, role);

    if !apply {
        return fleet.emit(
            "descriptions.plan",
            serde_json::json!({ "plan": &batch, "failures": &report.failures }),
            || format!("{}{}", render::plan(&batch), render::failures(&report.failures)),
        );
    }

    let results = apply_plan(fleet, &batch).await?;
    fleet.emit(
        "descriptions.apply",
        serde_json::json!({ "plan": &batch, "results": &results, "failures": &report.failures }),
        || render::applied_plan(&batch, &results, &report.failures),
    )
}

/// Push `batch`; a scan that reached no device leaves nothing to push.
async fn apply_plan(fleet: &Fleet, batch: &MutationBatch) -> Result<Vec<ApplyResult>> {
    if batch.is_empty() {
        info!("no reachable devices, nothing to apply");
        return Ok(Vec::new());
    }
    fleet
        .dispatcher
        .remediate(batch, fleet.concurrency)
        .await
        .context("failed to apply description plan")
}
