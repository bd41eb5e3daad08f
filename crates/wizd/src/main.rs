// # wizd - WiZ bulb daemon and command line
//
// A thin integration layer over wiz-core:
// 1. Reading configuration from environment variables
// 2. Building the store, the UDP connector and discovery
// 3. Running one caller-facing operation, or the poll loop (`serve`)
//
// Bulb records are printed to stdout as JSON; logs go to stderr.
//
// ## Configuration
//
// ### Store
// - `WIZ_STORE_TYPE`: Type of bulb store (file, memory). Default: file
// - `WIZ_STORE_PATH`: Path to the store file (required for file)
//
// ### Device transport
// - `WIZ_DEVICE_PORT`: Bulb UDP port. Default: 38899
// - `WIZ_DEVICE_TIMEOUT_MS`: Per-call timeout. Default: 2000
// - `WIZ_DEVICE_SEND_ATTEMPTS`: Datagrams sent within the timeout. Default: 3
//
// ### Discovery
// - `WIZ_DISCOVERY_RANGE`: Default scan range (empty, broadcast address or CIDR)
// - `WIZ_DISCOVERY_WAIT_MS`: How long replies are collected. Default: 3000
//
// ### Engine
// - `WIZ_POLL_INTERVAL_SECS`: Poll interval for `serve`. Default: 30
// - `WIZ_MAX_CONCURRENT_REFRESHES`: Refresh fan-out bound. Default: 16
// - `WIZ_DEFAULT_SCENE_ID`: Scene for bulbs with no known scene. Default: 11
// - `WIZ_DEFAULT_BRIGHTNESS`: Brightness for bulbs with no known one. Default: 255
// - `WIZ_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export WIZ_STORE_PATH=/var/lib/wiz/bulbs.json
// export WIZ_DISCOVERY_RANGE=192.168.1.0/24
//
// wizd scan
// wizd on 192.168.1.42
// wizd serve
// ```

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;
use wiz_core::scenes;
use wiz_core::traits::BulbStore;
use wiz_core::{BulbEvent, FileBulbStore, MemoryBulbStore, Reconciler, StoreConfig};
use wiz_udp::{WizUdpConnector, WizUdpDiscovery};

use config::Config;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Upper bound for the poll loop to stop after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WizExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<WizExitCode> for ExitCode {
    fn from(code: WizExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan once, then refresh every bulb periodically until interrupted
    Serve {
        /// Range to scan at startup (default: WIZ_DISCOVERY_RANGE)
        #[arg(short, long)]
        range: Option<String>,
    },
    /// Discover bulbs, register new ones and refresh all
    Scan {
        /// Empty, a broadcast address (192.168.1.255) or CIDR (192.168.1.0/24)
        range: Option<String>,
    },
    /// Print registered bulbs without contacting them
    List,
    /// Refresh one bulb, or every bulb when no address is given
    Refresh { address: Option<String> },
    /// Switch a bulb on with its last known scene and brightness
    On { address: String },
    /// Switch a bulb off
    Off { address: String },
    /// Switch a bulb to a scene
    Scene { address: String, scene_id: u32 },
    /// Switch a bulb to a scene at a brightness (0-255)
    Dim {
        address: String,
        brightness: u8,
        scene_id: u32,
    },
    /// Give a bulb a display name
    Rename { address: String, name: String },
    /// Remove a bulb from the store
    Forget { address: String },
    /// List the scenes bulbs accept
    Scenes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve { range: None });

    // The scene catalogue needs neither configuration nor a store
    if let Commands::Scenes = command {
        return match print_json(&scene_listing()) {
            Ok(()) => WizExitCode::CleanShutdown.into(),
            Err(e) => {
                eprintln!("{:#}", e);
                WizExitCode::RuntimeError.into()
            }
        };
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return WizExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return WizExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WizExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WizExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(config, command).await {
            error!("{:#}", e);
            WizExitCode::RuntimeError
        } else {
            WizExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the reconciler and run one command
async fn run(config: Config, command: Commands) -> Result<()> {
    let wiz_config = config.to_wiz_config();

    let store: Box<dyn BulbStore> = match &wiz_config.store {
        StoreConfig::File { path } => {
            info!("Using file store at {}", path);
            Box::new(FileBulbStore::new(path).await?)
        }
        StoreConfig::Memory => {
            info!("Using in-memory store");
            Box::new(MemoryBulbStore::new())
        }
    };

    let (reconciler, events) = Reconciler::new(
        Box::new(WizUdpConnector::from_config(&wiz_config.device)),
        Box::new(WizUdpDiscovery::from_config(
            &wiz_config.device,
            &wiz_config.discovery,
        )),
        store,
        &wiz_config,
    )?;
    spawn_event_logger(events);

    match command {
        Commands::Serve { range } => return serve(reconciler, range).await,
        Commands::Scan { range } => {
            print_json(&reconciler.scan(range.as_deref().unwrap_or("")).await?)?
        }
        Commands::List => print_json(&reconciler.store().get_all_bulbs().await?)?,
        Commands::Refresh { address: None } => print_json(&reconciler.refresh_all().await?)?,
        Commands::Refresh {
            address: Some(address),
        } => print_json(&reconciler.refresh_one(&address).await?)?,
        Commands::On { address } => print_json(&reconciler.power_on(&address).await?)?,
        Commands::Off { address } => print_json(&reconciler.power_off(&address).await?)?,
        Commands::Scene { address, scene_id } => {
            print_json(&reconciler.set_scene(&address, scene_id).await?)?
        }
        Commands::Dim {
            address,
            brightness,
            scene_id,
        } => print_json(&reconciler.set_dim(&address, brightness, scene_id).await?)?,
        Commands::Rename { address, name } => {
            print_json(&reconciler.rename(&address, &name).await?)?
        }
        Commands::Forget { address } => {
            let deleted = reconciler.store().delete_bulb(&address).await?;
            if !deleted {
                anyhow::bail!("Bulb not found: {}", address);
            }
            print_json(&json!({ "address": address, "deleted": true }))?
        }
        Commands::Scenes => print_json(&scene_listing())?,
    }

    reconciler.store().flush().await?;
    Ok(())
}

/// Scan, then poll until SIGTERM or SIGINT
async fn serve(reconciler: Reconciler, range: Option<String>) -> Result<()> {
    info!("Starting wizd");
    let mut signals = ShutdownSignals::install()?;

    let bulbs = tokio::select! {
        scanned = reconciler.scan(range.as_deref().unwrap_or("")) => scanned?,
        signal = signals.recv() => {
            info!("Received shutdown signal during startup scan: {}", signal);
            reconciler.store().flush().await?;
            return Ok(());
        }
    };
    let up = bulbs.iter().filter(|b| b.reachable.is_up()).count();
    info!("{} bulb(s) registered, {} up", bulbs.len(), up);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let poller = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.run_with_shutdown(shutdown_rx).await })
    };

    let signal = signals.recv().await;
    info!("Received shutdown signal: {}", signal);
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, poller).await {
        Ok(joined) => joined??,
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    info!("wizd stopped");
    Ok(())
}

/// Selectable scenes as `{id, name}` objects
fn scene_listing() -> Vec<serde_json::Value> {
    scenes::SCENES
        .iter()
        .filter(|(id, _)| scenes::is_selectable(*id))
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect()
}

/// Log engine events
fn spawn_event_logger(mut events: mpsc::Receiver<BulbEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Bulb event: {:?}", event);
        }
    });
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shutdown signal listeners (SIGTERM, SIGINT)
///
/// Handlers are registered by `install`, so a signal that arrives before
/// `recv` is first awaited is still delivered.
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Shutdown signal listener (CTRL-C only)
///
/// Fallback implementation for Windows.
#[cfg(windows)]
struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let ctrl_c = tokio::signal::windows::ctrl_c()
            .map_err(|e| anyhow::anyhow!("Failed to setup CTRL-C handler: {}", e))?;
        Ok(Self { ctrl_c })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "SIGINT"
    }
}
