//! Real-time paced playback of one or more ride files
//!
//! The [`Scheduler`] walks its inputs in order, opening a fresh [`FitFileProvider`] for each,
//! and hands every sample to a [`Broadcaster`] at the moment it is due. Pacing is 1:1 with the
//! recorded timestamps: a sample recorded `n` seconds after its predecessor is emitted `n`
//! seconds after it. Deadlines are accumulated rather than re-measured, so time spent decoding
//! and publishing does not drift the schedule.
//!
//! The first sample of every file is emitted immediately; files are played back to back with
//! no gap between them. Cancellation is observed while waiting and again right before each
//! emission, never in the middle of a publish.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ReplayConfig;
use crate::fit::DecodeOptions;
use crate::provider::SampleProvider;
use crate::providers::{FitFileProvider, RideInput};
use crate::{BroadcastWriter, Result, RideSample};

#[cfg(test)]
mod tests;

/// Receiver of due samples.
pub trait Broadcaster {
    /// Publish `sample`, `elapsed` of virtual playback time after the first emission.
    fn publish(&mut self, sample: &RideSample, elapsed: Duration) -> Result<()>;
}

impl<B: Broadcaster + ?Sized> Broadcaster for &mut B {
    fn publish(&mut self, sample: &RideSample, elapsed: Duration) -> Result<()> {
        (**self).publish(sample, elapsed)
    }
}

/// Progress of a playback run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    /// Most recently emitted sample
    pub last_sample: Option<RideSample>,
    /// Sum of the paced deltas emitted so far
    pub elapsed: Duration,
    /// Index of the input being played
    pub file_index: usize,
    /// Samples handed to the broadcaster
    pub published: u64,
}

/// Totals reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Inputs played to exhaustion
    pub files: usize,
    pub samples: u64,
    pub elapsed: Duration,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every sample of every input was published
    Completed(PlaybackSummary),
    /// The cancellation token fired first
    Cancelled(PlaybackSummary),
}

impl PlaybackOutcome {
    pub fn summary(&self) -> &PlaybackSummary {
        match self {
            PlaybackOutcome::Completed(summary) | PlaybackOutcome::Cancelled(summary) => summary,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlaybackOutcome::Cancelled(_))
    }
}

/// How playback of a single provider ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Provider ran dry after yielding this many samples
    Exhausted(u64),
    Cancelled,
}

/// Paces samples from a sequence of inputs into a [`Broadcaster`].
pub struct Scheduler<B> {
    broadcaster: B,
    cancel: CancellationToken,
    options: DecodeOptions,
    state: PlaybackState,
}

impl<B: Broadcaster> Scheduler<B> {
    pub fn new(broadcaster: B, cancel: CancellationToken) -> Self {
        Self { broadcaster, cancel, options: DecodeOptions::default(), state: PlaybackState::default() }
    }

    /// Decode options used for every input opened by [`Scheduler::run`].
    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub fn into_broadcaster(self) -> B {
        self.broadcaster
    }

    /// Play every input in order.
    ///
    /// Any decode or publish error aborts the run; samples already published stay published.
    pub async fn run(&mut self, inputs: &[RideInput]) -> Result<PlaybackOutcome> {
        info!("Starting playback of {} file(s)", inputs.len());
        let mut files = 0;

        for (index, input) in inputs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Playback cancelled before {}", input);
                return Ok(PlaybackOutcome::Cancelled(self.summary(files)));
            }

            self.state.file_index = index;
            let mut provider = FitFileProvider::open(input, self.options)?;

            match self.play_provider(&mut provider).await? {
                ProviderOutcome::Exhausted(0) => {
                    warn!("{} contains no ride samples, skipping", input);
                    files += 1;
                }
                ProviderOutcome::Exhausted(samples) => {
                    info!("Finished {} ({} samples)", input, samples);
                    files += 1;
                }
                ProviderOutcome::Cancelled => {
                    info!("Playback cancelled during {}", input);
                    return Ok(PlaybackOutcome::Cancelled(self.summary(files)));
                }
            }
        }

        let summary = self.summary(files);
        info!(
            "Playback complete: {} file(s), {} samples, {}s",
            summary.files,
            summary.samples,
            summary.elapsed.as_secs()
        );
        Ok(PlaybackOutcome::Completed(summary))
    }

    /// Pace every sample of one provider into the broadcaster.
    ///
    /// The provider's first sample is due immediately; each later one is due `delta` after its
    /// predecessor's deadline. Timestamps that go backwards are emitted without delay.
    pub async fn play_provider<P: SampleProvider>(&mut self, provider: &mut P) -> Result<ProviderOutcome> {
        debug!("Playing {}", provider.name());
        let mut deadline = Instant::now();
        let mut previous: Option<RideSample> = None;
        let mut samples = 0u64;

        while let Some(sample) = provider.next_sample().await? {
            let delta = match &previous {
                None => Duration::ZERO,
                Some(prev) => match sample.seconds_since(prev) {
                    Some(secs) => Duration::from_secs(u64::from(secs)),
                    None => {
                        warn!(
                            "Timestamp went backwards in {} ({} -> {}), emitting without delay",
                            provider.name(),
                            prev.timestamp,
                            sample.timestamp
                        );
                        Duration::ZERO
                    }
                },
            };
            deadline += delta;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(ProviderOutcome::Cancelled),
                _ = sleep_until(deadline) => {}
            }
            if self.cancel.is_cancelled() {
                return Ok(ProviderOutcome::Cancelled);
            }

            self.state.elapsed += delta;
            self.broadcaster.publish(&sample, self.state.elapsed)?;
            self.state.published += 1;
            self.state.last_sample = Some(sample);
            samples += 1;
            previous = Some(sample);

            trace!("Emitted t={} at +{}s", sample.timestamp, self.state.elapsed.as_secs());
        }

        Ok(ProviderOutcome::Exhausted(samples))
    }

    fn summary(&self, files: usize) -> PlaybackSummary {
        PlaybackSummary { files, samples: self.state.published, elapsed: self.state.elapsed }
    }
}

/// Validate `config` and play its inputs into a [`BroadcastWriter`] on the configured output.
pub async fn replay(config: &ReplayConfig, cancel: CancellationToken) -> Result<PlaybackOutcome> {
    config.validate()?;
    let inputs: Vec<RideInput> = config.inputs.iter().cloned().map(RideInput::File).collect();
    let mut scheduler = Scheduler::new(BroadcastWriter::new(&config.output), cancel)
        .with_decode_options(config.decode);
    scheduler.run(&inputs).await
}
