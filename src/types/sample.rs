//! Normalized ride sample

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: u64 = 631_065_600;

/// One normalized set of ride metrics at a point in time.
///
/// Every metric is optional: a missing sensor and an invalid reading both surface as `None`,
/// never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RideSample {
    /// Seconds since the FIT epoch
    pub timestamp: u32,
    /// Watts
    pub power: Option<u16>,
    /// Revolutions per minute
    pub cadence: Option<u8>,
    /// Beats per minute
    pub heart_rate: Option<u8>,
    /// Metres per second
    pub speed: Option<f64>,
    /// Cumulative metres
    pub distance: Option<f64>,
    /// Metres above sea level
    pub elevation: Option<f64>,
    /// Percent
    pub grade: Option<f64>,
}

impl RideSample {
    /// A sample with a timestamp and no metrics.
    pub fn at(timestamp: u32) -> Self {
        Self { timestamp, ..Self::default() }
    }

    /// Timestamp as seconds since the Unix epoch.
    pub fn unix_timestamp(&self) -> u64 {
        self.timestamp as u64 + FIT_EPOCH_OFFSET
    }

    /// Seconds elapsed since `earlier`, or `None` if `earlier` is later than this sample.
    pub fn seconds_since(&self, earlier: &RideSample) -> Option<u32> {
        self.timestamp.checked_sub(earlier.timestamp)
    }
}
