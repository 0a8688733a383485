//! Replay recorded FIT ride files as a live-updating broadcast snapshot.
//!
//! ridecast decodes FIT activity recordings (power, cadence, heart rate, speed, distance and
//! elevation samples) and republishes them, paced in real time, as a JSON document that a
//! display or bridge process polls from disk.
//!
//! # Features
//!
//! - **Streaming decoder**: definition-driven FIT record decoding with CRC verification,
//!   compressed timestamps and scale/offset handling
//! - **Real-time pacing**: samples are emitted at their recorded cadence across any number of
//!   back-to-back files
//! - **Atomic publish**: readers never observe a partially written snapshot
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ridecast::{PlaybackOutcome, ReplayConfig, replay};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReplayConfig::new(["morning.fit", "afternoon.fit"]).with_output("focus.json");
//!     match replay(&config, CancellationToken::new()).await? {
//!         PlaybackOutcome::Completed(summary) => println!("Published {} samples", summary.samples),
//!         PlaybackOutcome::Cancelled(_) => println!("Interrupted"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding only
//!
//! ```rust,no_run
//! use ridecast::adapters::RecordAdapter;
//! use ridecast::fit::{DecodeOptions, FitDecoder};
//! use ridecast::RideSample;
//!
//! # fn main() -> ridecast::Result<()> {
//! let mut decoder = FitDecoder::open("ride.fit", DecodeOptions::default())?;
//! while let Some(record) = decoder.next_record()? {
//!     if let Some(sample) = RideSample::adapt(&record) {
//!         println!("{}: {:?} W", sample.timestamp, sample.power);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod adapters;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod fit;

// Playback pipeline
pub mod broadcast;
pub mod config;
pub mod playback;
pub mod provider;
pub mod providers;

// Core exports
pub use adapters::*;
pub use error::*;
pub use types::*;

// Pipeline exports
pub use broadcast::{BroadcastSnapshot, BroadcastWriter};
pub use config::ReplayConfig;
pub use playback::{
    Broadcaster, PlaybackOutcome, PlaybackState, PlaybackSummary, Scheduler, replay,
};
pub use provider::SampleProvider;
pub use providers::{FitFileProvider, RideInput};
