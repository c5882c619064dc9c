//! Subcommands of the `chunkmap` binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chunkmap_core::MemberId;
use chunkmap_registry::{spawn_sweeper, NodeRegistry, ResolutionPolicy};
use chunkmap_transport::{ErrorKind, MembershipClient, MembershipServer, TransportError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(
    name = "chunkmap",
    version,
    about = "Membership and chunk placement for a distributed file store"
)]
pub struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "CHUNKMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tracker address used by client subcommands.
    #[arg(
        short,
        long,
        global = true,
        env = "CHUNKMAP_TRACKER",
        default_value = "127.0.0.1:50051"
    )]
    pub tracker: String,

    /// Connect and per-call timeout, in seconds.
    #[arg(long, global = true, env = "CHUNKMAP_TIMEOUT_SECS", default_value_t = 5)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the tracker.
    Serve {
        /// Override `[server] listen_addr`.
        #[arg(short, long, env = "CHUNKMAP_LISTEN_ADDR")]
        listen_addr: Option<String>,

        /// Answer best effort instead of reporting unsatisfiable requests.
        #[arg(long)]
        lenient: bool,
    },

    /// Register a storage node.
    Register {
        id: MemberId,
        /// Address clients use to reach the storage node.
        address: String,
        #[arg(long, default_value_t = 0)]
        capacity: u64,
    },

    /// Send a heartbeat, once or repeatedly.
    Heartbeat {
        id: MemberId,
        #[arg(long, default_value_t = 0)]
        capacity: u64,
        /// Number of chunks the node currently stores.
        #[arg(long, default_value_t = 0)]
        chunks: u64,
        /// Keep sending every N seconds until interrupted.
        #[arg(long)]
        interval_secs: Option<u64>,
        /// Register again with this address if the tracker has no record of
        /// the node (e.g. after a tracker restart).
        #[arg(long)]
        address: Option<String>,
    },

    /// Assign storage nodes to the chunks of a new file.
    Placement { file_id: String, chunk_count: u32 },

    /// List registered nodes.
    Nodes,

    /// Show one node.
    Node { id: MemberId },

    /// Show a file's recorded chunk placement.
    File {
        file_id: String,
        /// Print the current records of the holding nodes instead.
        #[arg(long)]
        locate: bool,
    },

    /// Remove a node from the tracker.
    Deregister { id: MemberId },
}

impl Cli {
    pub async fn run(self, mut config: CliConfig) -> Result<()> {
        let timeout = Duration::from_secs(self.timeout_secs);

        match self.command {
            Command::Serve {
                listen_addr,
                lenient,
            } => {
                // Flags override the config file.
                if let Some(addr) = listen_addr {
                    config.server.listen_addr = addr;
                }
                if lenient {
                    config.registry.policy = ResolutionPolicy::Lenient;
                }
                serve(config).await
            }
            command => {
                let mut client = MembershipClient::connect(self.tracker.as_str(), timeout)
                    .await
                    .with_context(|| format!("failed to reach tracker at {}", self.tracker))?;
                run_client(&mut client, command).await
            }
        }
    }
}

async fn serve(config: CliConfig) -> Result<()> {
    info!(
        listen_addr = %config.server.listen_addr,
        replica_factor = config.registry.replica_factor,
        policy = ?config.registry.policy,
        liveness = config.registry.liveness.is_some(),
        "starting tracker"
    );

    let registry = Arc::new(NodeRegistry::new(config.registry).context("invalid registry config")?);
    let server = MembershipServer::bind(config.server.listen_addr.as_str(), Arc::clone(&registry))
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(Arc::clone(&registry), shutdown_rx.clone());
    let mut server_task = tokio::spawn(server.serve(shutdown_rx));

    tokio::select! {
        finished = &mut server_task => {
            finished.context("server task panicked")??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal.context("failed to listen for ctrl-c")?,
    }

    info!("shutting down");
    // Receivers may already be gone if the server stopped on its own.
    let _ = shutdown_tx.send(true);
    server_task.await.context("server task panicked")??;
    if let Some(sweeper) = sweeper {
        sweeper.await.context("sweeper task panicked")?;
    }
    Ok(())
}

async fn run_client(client: &mut MembershipClient, command: Command) -> Result<()> {
    match command {
        Command::Serve { .. } => anyhow::bail!("serve runs the tracker itself"),
        Command::Register {
            id,
            address,
            capacity,
        } => {
            let message = client.register(id.into_inner(), address, capacity).await?;
            println!("{message}");
        }
        Command::Heartbeat {
            id,
            capacity,
            chunks,
            interval_secs,
            address,
        } => {
            let id = id.into_inner();
            let address = address.as_deref();
            let Some(secs) = interval_secs else {
                send_heartbeat(client, &id, address, capacity, chunks).await?;
                return Ok(());
            };

            let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
                // The client redials on the next tick after a transport error.
                if let Err(e) = send_heartbeat(client, &id, address, capacity, chunks).await {
                    warn!(%e, "heartbeat failed");
                }
            }
        }
        Command::Placement {
            file_id,
            chunk_count,
        } => print_json(&client.upload_nodes(file_id, chunk_count).await?)?,
        Command::Nodes => print_json(&client.list_nodes().await?)?,
        Command::Node { id } => match client.get_node(id.as_str()).await? {
            Some(member) => print_json(&member)?,
            None => anyhow::bail!("node {id} is not registered"),
        },
        Command::File { file_id, locate } => {
            if locate {
                print_json(&client.locate_file(file_id).await?)?;
            } else {
                match client.file_metadata(file_id.as_str()).await? {
                    Some(metadata) => print_json(&metadata)?,
                    None => anyhow::bail!("no placement recorded for {file_id}"),
                }
            }
        }
        Command::Deregister { id } => print_json(&client.deregister(id.into_inner()).await?)?,
    }
    Ok(())
}

/// Heartbeat once. If the tracker doesn't know the node and `address` is
/// given, register instead.
pub async fn send_heartbeat(
    client: &mut MembershipClient,
    id: &str,
    address: Option<&str>,
    capacity: u64,
    chunks: u64,
) -> Result<(), TransportError> {
    match client.heartbeat(id, capacity, chunks).await {
        Err(e) if e.remote_kind() == Some(ErrorKind::UnknownMember) => {
            let Some(address) = address else {
                return Err(e);
            };
            info!(member = id, "tracker has no record, registering again");
            client.register(id, address, capacity).await?;
            Ok(())
        }
        other => other.map(|_| ()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
