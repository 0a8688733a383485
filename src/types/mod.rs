//! Core types for decoded ride data.
//!
//! - [`BaseType`] maps to the FIT base type byte with size and invalid-sentinel information
//! - [`Value`] holds one decoded, already scaled field value
//! - [`RideSample`] is the normalized unit handed from the extractor to playback

mod sample;
mod value;

pub use sample::{FIT_EPOCH_OFFSET, RideSample};
pub use value::{BaseType, Value};
