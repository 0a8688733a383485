//! Typed adapters over decoded FIT records.
//!
//! The decoder hands out generic [`RawRecord`](crate::fit::RawRecord)s keyed by field number.
//! Adapters turn the records they care about into domain types; everything else is ignored.
//! [`RideSample`](crate::RideSample) is the adapter used by playback: it accepts `record`
//! messages and pulls timestamp, power, cadence, heart rate, speed, distance, elevation and
//! grade by their well-known field keys.
//!
//! # Example Usage
//!
//! ```rust
//! use ridecast::adapters::RecordAdapter;
//! use ridecast::fit::RawRecord;
//! use ridecast::types::Value;
//! use ridecast::RideSample;
//! use std::collections::BTreeMap;
//!
//! let mut fields = BTreeMap::new();
//! fields.insert(253, Some(Value::UInt32(1_000)));
//! fields.insert(7, Some(Value::UInt16(240)));
//! fields.insert(3, None); // heart rate sentinel
//!
//! let record = RawRecord { mesg_num: 20, local_id: 0, fields };
//! let sample = RideSample::adapt(&record).expect("record message with a timestamp");
//! assert_eq!(sample.power, Some(240));
//! assert_eq!(sample.heart_rate, None);
//! ```

mod record_adapter;
mod ride_sample;

pub use record_adapter::RecordAdapter;
