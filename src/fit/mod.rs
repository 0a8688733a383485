//! FIT file decoding
//!
//! This module decodes FIT activity files incrementally: [`stream`] provides the bounded,
//! CRC-tracking byte cursor, [`format`] the header and record structures, [`profile`] the
//! well-known message numbers and scale/offset rules, and [`decoder`] the record state machine
//! that ties them together.

pub mod crc;
pub mod decoder;
pub mod format;
pub mod profile;
pub mod stream;

pub use decoder::{DecodeOptions, DecoderState, FitDecoder, RawRecord, TimestampTracker};
pub use format::{FieldDefinition, FileHeader, RecordHeader, RecordLayout};
pub use stream::{Endian, StreamReader};
