//! # ridecast CLI
//!
//! Replays FIT ride files in real time into a JSON snapshot file.
//!
//! ## Usage
//!
//! ```sh
//! # Replay one ride into ./focus.json
//! ridecast ride.fit
//!
//! # Replay several rides back to back into a custom location
//! ridecast -o /srv/overlay/focus.json warmup.fit race.fit
//!
//! # More detail
//! RUST_LOG=ridecast=debug ridecast ride.fit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ridecast::config::DEFAULT_OUTPUT;
use ridecast::{PlaybackOutcome, ReplayConfig, ReplayError, replay};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit status for a run stopped by Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Replay recorded FIT ride files as a live-updating broadcast snapshot
#[derive(Parser, Debug)]
#[command(name = "ridecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about, long_about = None)]
struct Cli {
    /// FIT files to replay, in order
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Path of the published snapshot
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Skip header and file checksum verification
    #[arg(long)]
    no_crc_check: bool,
}

impl Cli {
    fn config(&self) -> ReplayConfig {
        ReplayConfig::new(self.files.iter().cloned())
            .with_output(self.output.clone())
            .with_crc_check(!self.no_crc_check)
    }
}

fn print_error(e: &ReplayError) {
    eprintln!("Error: {e}");
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("  Caused by: {cause}");
        source = cause.source();
    }
    for suggestion in e.recovery_suggestions() {
        eprintln!("  - {suggestion}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping playback");
            on_signal.cancel();
        }
    });

    match replay(&cli.config(), cancel).await {
        Ok(PlaybackOutcome::Completed(_)) => ExitCode::SUCCESS,
        Ok(PlaybackOutcome::Cancelled(summary)) => {
            info!("Stopped after {} samples", summary.samples);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("Playback failed: {}", e);
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}
