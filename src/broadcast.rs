//! Broadcast writer
//!
//! The consumer polls a single JSON file. Every emission regenerates the whole document and
//! replaces the file through a temporary sibling and an atomic rename, so a reader opening the
//! target at any moment sees either the previous snapshot or the new one in full.
//!
//! The document is an array holding one object in the shape the display bridge expects:
//!
//! ```json
//! [{"name":"--","country":"--","team":"--","teamCode":"--","power":250,"avgPower":231, ...}]
//! ```
//!
//! Live metrics the sample does not carry are omitted rather than written as zero.

use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use crate::playback::Broadcaster;
use crate::{ReplayError, Result, RideSample};

/// Placeholder used for the rider identity fields.
const UNKNOWN: &str = "--";
/// Display speed units per m/s (km/h scaled by 275).
const SPEED_FACTOR: f64 = 3.6 * 275.0;
/// Added to the elevation in metres to form the display height.
const HEIGHT_OFFSET: u32 = 450;

/// Published JSON shape of one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSnapshot {
    pub name: String,
    pub country: String,
    pub team: String,
    pub team_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<u32>,
    pub avg_power: u32,
    pub nrm_power: u32,
    pub max_power: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence: Option<u32>,
    pub avg_cadence: u32,
    pub max_cadence: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartrate: Option<u32>,
    pub avg_heartrate: u32,
    pub max_heartrate: u32,
    /// Virtual elapsed seconds since playback start
    pub time: u32,
    /// Metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<u32>,
    /// Elevation in metres plus 450, floored at 450
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// m/s × 3.6 × 275
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    pub tss: u32,
    pub calories: u32,
    pub draft: u32,
    pub wind_speed: u32,
    pub wind_angle: u32,
    /// Percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<i32>,
    pub event_laps_total: u32,
    pub event_laps_done: i32,
    pub event_distance_total: u32,
    pub event_distance_done: u32,
    pub event_distance_to_next_location: u32,
    pub event_next_location: u32,
    pub event_position: u32,
}

impl BroadcastSnapshot {
    /// Build the document for `sample`, `elapsed` into playback, with the given running totals.
    pub fn from_sample(sample: &RideSample, elapsed: Duration, totals: &RideTotals) -> Self {
        Self {
            name: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            team: UNKNOWN.to_string(),
            team_code: UNKNOWN.to_string(),
            power: sample.power.map(u32::from),
            avg_power: totals.power.average(),
            nrm_power: 0,
            max_power: totals.power.max,
            cadence: sample.cadence.map(u32::from),
            avg_cadence: totals.cadence.average(),
            max_cadence: totals.cadence.max,
            heartrate: sample.heart_rate.map(u32::from),
            avg_heartrate: totals.heart_rate.average(),
            max_heartrate: totals.heart_rate.max,
            time: u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
            distance: sample.distance.map(|m| m as u32),
            height: sample.elevation.map(|m| HEIGHT_OFFSET.saturating_add(m as u32)),
            speed: sample.speed.map(|mps| (mps * SPEED_FACTOR) as u32),
            tss: 0,
            calories: 0,
            draft: 0,
            wind_speed: 0,
            wind_angle: 0,
            slope: sample.grade.map(|pct| pct as i32),
            event_laps_total: 0,
            event_laps_done: 0,
            event_distance_total: 0,
            event_distance_done: 0,
            event_distance_to_next_location: 0,
            event_next_location: 0,
            event_position: 0,
        }
    }

    /// Serialized document as written to disk.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&[self])
    }
}

/// Running average and maximum of one metric. Absent readings are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregate {
    sum: u64,
    count: u64,
    pub max: u32,
}

impl Aggregate {
    pub fn observe(&mut self, value: Option<u32>) {
        if let Some(value) = value {
            self.sum += u64::from(value);
            self.count += 1;
            self.max = self.max.max(value);
        }
    }

    /// Rounded mean of the observed readings, 0 before the first one.
    pub fn average(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        ((self.sum + self.count / 2) / self.count) as u32
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Aggregates over every sample published so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RideTotals {
    pub power: Aggregate,
    pub cadence: Aggregate,
    pub heart_rate: Aggregate,
}

impl RideTotals {
    pub fn observe(&mut self, sample: &RideSample) {
        self.power.observe(sample.power.map(u32::from));
        self.cadence.observe(sample.cadence.map(u32::from));
        self.heart_rate.observe(sample.heart_rate.map(u32::from));
    }
}

/// Stateful writer owning the published file.
#[derive(Debug)]
pub struct BroadcastWriter {
    target: PathBuf,
    totals: RideTotals,
    published: u64,
}

impl BroadcastWriter {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self { target: target.into(), totals: RideTotals::default(), published: 0 }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn totals(&self) -> &RideTotals {
        &self.totals
    }

    /// Snapshots successfully written.
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Broadcaster for BroadcastWriter {
    fn publish(&mut self, sample: &RideSample, elapsed: Duration) -> Result<()> {
        self.totals.observe(sample);
        let snapshot = BroadcastSnapshot::from_sample(sample, elapsed, &self.totals);
        publish_snapshot(&snapshot, &self.target)?;
        self.published += 1;
        trace!("Published snapshot {} (t={}s)", self.published, snapshot.time);
        Ok(())
    }
}

/// Publish a single sample with no playback history.
pub fn publish(sample: &RideSample, target: &Path) -> Result<()> {
    let mut totals = RideTotals::default();
    totals.observe(sample);
    publish_snapshot(&BroadcastSnapshot::from_sample(sample, Duration::ZERO, &totals), target)
}

/// Serialize `snapshot` and atomically replace `target` with it.
pub fn publish_snapshot(snapshot: &BroadcastSnapshot, target: &Path) -> Result<()> {
    let json = snapshot
        .to_json()
        .map_err(|e| ReplayError::publish_error(target.to_path_buf(), io::Error::other(e)))?;
    write_atomic(target, &json)
}

/// Write `content` to a temporary file next to `target`, flush it to disk, then rename it
/// over `target`. On failure the previous content of `target` is left untouched.
fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let publish_error = |e: io::Error| ReplayError::publish_error(target.to_path_buf(), e);
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(publish_error)?;
    temp.write_all(content).map_err(publish_error)?;
    temp.as_file().sync_all().map_err(publish_error)?;
    temp.persist(target).map_err(|e| publish_error(e.error))?;

    debug!("Replaced {} ({} bytes)", target.display(), content.len());
    Ok(())
}
