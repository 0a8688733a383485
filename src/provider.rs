//! Provider trait for ride sample sources

use crate::{RideSample, Result};

/// Trait for ride sample sources
///
/// A provider yields the samples of one input in recording order. It is single-pass: once
/// it returns `Ok(None)` it is exhausted and cannot be restarted. Providers do no pacing;
/// the scheduler decides when each sample is due.
#[async_trait::async_trait]
pub trait SampleProvider: Send {
    /// Get the next ride sample
    ///
    /// Returns:
    /// - `Ok(Some(sample))` - Next sample in recording order
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - The source is unusable; playback must stop
    async fn next_sample(&mut self) -> Result<Option<RideSample>>;

    /// Human-readable name of the source for logging
    fn name(&self) -> &str;
}
