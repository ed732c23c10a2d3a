//! # HAB Link
//!
//! Request/response image transfer for a high-altitude balloon payload over a
//! narrowband, half-duplex LoRa link.
//!
//! One binary serves both endpoints. The ground `controller` role reads
//! operator commands from stdin (`pic`, `ping`) and persists completed image
//! transfers; the airborne `remote` role answers requests, capturing and
//! streaming images back.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod error;
mod protocol;
mod link;
mod capture;
mod storage;
mod remote;
mod indicator;

use capture::FileImageSource;
use config::Config;
use link::SerialRadioLink;
use protocol::session::{SessionConfig, SessionOutcome, SessionStateMachine};
use remote::RemoteService;
use storage::DirectoryStore;

/// Main entry point for HAB Link
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse role and optional config path from the command line
///    - Set up logging: stdout plus a rotating on-disk datalog
///    - Open the modem serial port and prepare storage
///
/// 2. **Main Loop** (role-dependent)
///    - Controller: read operator commands, drive request sessions, persist
///      completed images
///    - Remote: answer requests until shutdown
///
/// 3. **Graceful Shutdown** on Ctrl+C
///
/// Hardware bring-up failures are fatal: the process enters the permanent
/// failure-signaling state and performs no protocol activity.
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let role = args.next().unwrap_or_default();
    let config_path = args.next();

    let config = match &config_path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path))?,
        None => Config::default_values(),
    };

    // Log to stdout and to a daily-rotated datalog under the data directory
    std::fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating {}", config.storage.data_dir))?;
    let datalog = tracing_appender::rolling::daily(&config.storage.data_dir, "datalog.txt");
    let (datalog_writer, _datalog_guard) = tracing_appender::non_blocking(datalog);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(datalog_writer))
        .init();

    info!("HAB Link v{} starting as {}", env!("CARGO_PKG_VERSION"), role);

    match role.as_str() {
        "controller" => run_controller(config).await,
        "remote" => run_remote(config).await,
        other => bail!("unknown role {:?}: expected 'controller' or 'remote'", other),
    }
}

/// Ground controller loop: stdin commands drive request sessions
async fn run_controller(config: Config) -> Result<()> {
    let link = match SerialRadioLink::open(&config.link, &config.radio) {
        Ok(link) => link,
        Err(e) => indicator::signal_failure(&e.to_string()).await,
    };
    let mut store = match DirectoryStore::init(&config.storage.data_dir).await {
        Ok(store) => store,
        Err(e) => indicator::signal_failure(&e.to_string()).await,
    };

    let session_config = SessionConfig {
        reply_timeout: config.reply_timeout(),
        max_transfer_bytes: config.link.max_transfer_bytes,
    };
    let mut session = SessionStateMachine::new(link, session_config);

    info!("Controller ready; commands: 'pic', 'ping'");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "pic" => match session.request_picture().await? {
                        SessionOutcome::Completed(image) => {
                            let name = store.persist_next(&image).await?;
                            info!("Picture {} saved ({} bytes)", name, image.len());
                        }
                        SessionOutcome::Failed(error) => {
                            warn!("Picture request failed: {}", error);
                        }
                    },
                    "ping" => match session.request_ping().await? {
                        SessionOutcome::Completed(_) => info!("Remote is alive"),
                        SessionOutcome::Failed(error) => {
                            warn!("Ping failed: {}", error);
                        }
                    },
                    "" => {}
                    other => warn!("Unknown command {:?}; try 'pic' or 'ping'", other),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Pictures saved this run: {}", store.picture_count());
    Ok(())
}

/// Remote payload loop: answer requests until shutdown
async fn run_remote(config: Config) -> Result<()> {
    let link = match SerialRadioLink::open(&config.link, &config.radio) {
        Ok(link) => link,
        Err(e) => indicator::signal_failure(&e.to_string()).await,
    };
    let store = match DirectoryStore::init(&config.storage.data_dir).await {
        Ok(store) => store,
        Err(e) => indicator::signal_failure(&e.to_string()).await,
    };
    let camera = FileImageSource::new(&config.capture.source_path);

    let mut service = RemoteService::new(link, camera, store, config.max_chunk());
    info!("Remote ready, listening for requests");

    tokio::select! {
        result = service.run() => {
            // run() only returns on a link or collaborator error
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
