use std::path::PathBuf;

use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use micro_ota_receiver::{FileFlash, ProcessRestart, ReceiverConfig, Supervisor};

const DEFAULT_SLOT_DIR: &str = "/var/lib/micro-ota";

// one connection, one transfer: there is no work to schedule across threads
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut builder = ReceiverConfig::builder();
    if let Some(port) = env_port() {
        builder = builder.port(port);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            error!(cause = %e, "invalid configuration");
            return;
        }
    };

    let slot_dir = std::env::var_os("OTA_SLOT_DIR").map_or_else(|| PathBuf::from(DEFAULT_SLOT_DIR), PathBuf::from);
    let flash = match FileFlash::open(&slot_dir) {
        Ok(flash) => flash,
        Err(e) => {
            error!(cause = %e, slot_dir = %slot_dir.display(), "can't open slot directory");
            return;
        }
    };

    info!(port = config.port(), "starting update receiver");
    let supervisor = Supervisor::new(config, flash, ProcessRestart);
    match supervisor.run().await {
        Ok(outcome) => {
            // only reachable when the restart policy withheld the restart
            info!(success = outcome.is_success(), "update attempt finished without restart");
        }
        Err(e) => {
            error!(cause = %e, "update attempt aborted");
        }
    }
}

fn env_port() -> Option<u16> {
    let raw = std::env::var("OTA_PORT").ok()?;
    match raw.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            error!(value = %raw, "ignoring unparseable OTA_PORT");
            None
        }
    }
}
