//! Test utilities for building synthetic FIT files
//!
//! Real activity recordings are large and device specific, so tests and benchmarks build
//! their inputs here: [`FitFileBuilder`] assembles definition and data records, frames them
//! with a 12- or 14-byte header and appends a valid file CRC.

#![cfg(any(test, feature = "benchmark"))]

use crate::fit::crc;
use crate::fit::profile::{TIMESTAMP_FIELD, mesg, record};
use crate::fit::stream::Endian;
use crate::types::BaseType;
use std::collections::HashMap;

/// Profile version written into synthetic headers.
const PROFILE_VERSION: u16 = 2132;
/// Protocol version 2.0.
const PROTOCOL_VERSION: u8 = 0x20;

#[derive(Debug, Clone)]
struct BuilderLayout {
    endian: Endian,
    /// (size, base type) per field, developer fields last
    fields: Vec<(u8, BaseType)>,
}

/// Assembles a FIT file record by record.
#[derive(Debug, Clone)]
pub struct FitFileBuilder {
    header_size: u8,
    records: Vec<u8>,
    layouts: HashMap<u8, BuilderLayout>,
}

impl Default for FitFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitFileBuilder {
    /// Builder producing a 14-byte header with header CRC.
    pub fn new() -> Self {
        Self { header_size: 14, records: Vec::new(), layouts: HashMap::new() }
    }

    /// Produce a 12-byte header without header CRC.
    pub fn with_short_header(mut self) -> Self {
        self.header_size = 12;
        self
    }

    /// Little-endian definition where every field holds one element of its base type.
    pub fn define(&mut self, local_id: u8, mesg_num: u16, fields: &[(u8, BaseType)]) -> &mut Self {
        let sized: Vec<_> = fields.iter().map(|&(key, base)| (key, base.size() as u8, base)).collect();
        self.define_fields(local_id, mesg_num, Endian::Little, &sized)
    }

    /// Definition with explicit sizes and byte order.
    pub fn define_fields(
        &mut self,
        local_id: u8,
        mesg_num: u16,
        endian: Endian,
        fields: &[(u8, u8, BaseType)],
    ) -> &mut Self {
        self.write_definition(local_id, mesg_num, endian, fields, &[])
    }

    /// Little-endian definition followed by developer fields given as (key, size).
    pub fn define_developer(
        &mut self,
        local_id: u8,
        mesg_num: u16,
        fields: &[(u8, BaseType)],
        developer: &[(u8, u8)],
    ) -> &mut Self {
        let sized: Vec<_> = fields.iter().map(|&(key, base)| (key, base.size() as u8, base)).collect();
        self.write_definition(local_id, mesg_num, Endian::Little, &sized, developer)
    }

    fn write_definition(
        &mut self,
        local_id: u8,
        mesg_num: u16,
        endian: Endian,
        fields: &[(u8, u8, BaseType)],
        developer: &[(u8, u8)],
    ) -> &mut Self {
        let dev_flag = if developer.is_empty() { 0 } else { 0x20 };
        self.records.push(0x40 | dev_flag | (local_id & 0x0F));
        self.records.push(0);
        self.records.push(match endian {
            Endian::Little => 0,
            Endian::Big => 1,
        });
        let mesg_bytes = match endian {
            Endian::Little => mesg_num.to_le_bytes(),
            Endian::Big => mesg_num.to_be_bytes(),
        };
        self.records.extend_from_slice(&mesg_bytes);
        self.records.push(fields.len() as u8);
        for &(key, size, base) in fields {
            self.records.extend_from_slice(&[key, size, base.to_byte()]);
        }
        if !developer.is_empty() {
            self.records.push(developer.len() as u8);
            for &(key, size) in developer {
                self.records.extend_from_slice(&[key, size, 0]);
            }
        }

        let mut layout_fields: Vec<_> = fields.iter().map(|&(_, size, base)| (size, base)).collect();
        layout_fields.extend(developer.iter().map(|&(_, size)| (size, BaseType::Byte)));
        self.layouts.insert(local_id & 0x0F, BuilderLayout { endian, fields: layout_fields });
        self
    }

    /// Normal data record; one raw value per field, in layout order.
    pub fn data(&mut self, local_id: u8, values: &[u64]) -> &mut Self {
        self.records.push(local_id & 0x0F);
        self.write_values(local_id & 0x0F, values)
    }

    /// Compressed-timestamp data record for local IDs 0..=3.
    pub fn compressed(&mut self, local_id: u8, time_offset: u8, values: &[u64]) -> &mut Self {
        self.records.push(0x80 | ((local_id & 0x03) << 5) | (time_offset & 0x1F));
        self.write_values(local_id & 0x03, values)
    }

    /// Append bytes verbatim to the record section.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.records.extend_from_slice(bytes);
        self
    }

    fn write_values(&mut self, local_id: u8, values: &[u64]) -> &mut Self {
        let layout = self
            .layouts
            .get(&local_id)
            .unwrap_or_else(|| panic!("local {local_id} has no definition in this builder"))
            .clone();
        assert_eq!(layout.fields.len(), values.len(), "one value per field");
        for (&(size, base), &value) in layout.fields.iter().zip(values) {
            let width = if base.is_variable_length() { size as usize } else { base.size() };
            let elements = (size as usize / width).max(1);
            for _ in 0..elements {
                let le = value.to_le_bytes();
                match layout.endian {
                    Endian::Little => self.records.extend_from_slice(&le[..width]),
                    Endian::Big => self.records.extend(le[..width].iter().rev()),
                }
            }
        }
        self
    }

    /// Frame the record section with header and file CRC.
    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![self.header_size, PROTOCOL_VERSION];
        bytes.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        if self.header_size == 14 {
            let header_crc = crc::compute(&bytes);
            bytes.extend_from_slice(&header_crc.to_le_bytes());
        }
        bytes.extend_from_slice(&self.records);
        let file_crc = crc::compute(&bytes);
        bytes.extend_from_slice(&file_crc.to_le_bytes());
        bytes
    }
}

/// Field layout of the `record` messages written by [`ride_file`] and [`full_ride_file`].
pub const RIDE_FIELDS: [(u8, BaseType); 7] = [
    (TIMESTAMP_FIELD, BaseType::UInt32),
    (record::POWER, BaseType::UInt16),
    (record::CADENCE, BaseType::UInt8),
    (record::HEART_RATE, BaseType::UInt8),
    (record::SPEED, BaseType::UInt16),
    (record::DISTANCE, BaseType::UInt32),
    (record::ALTITUDE, BaseType::UInt16),
];

/// One `record` message worth of raw values for [`full_ride_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRide {
    pub timestamp: u32,
    pub power: Option<u16>,
    pub cadence: Option<u8>,
    pub heart_rate: Option<u8>,
    /// mm/s
    pub speed: Option<u16>,
    /// cm
    pub distance: Option<u32>,
    /// (m + 500) * 5
    pub altitude: Option<u16>,
}

impl RawRide {
    pub fn at(timestamp: u32) -> Self {
        Self {
            timestamp,
            power: None,
            cadence: None,
            heart_rate: None,
            speed: None,
            distance: None,
            altitude: None,
        }
    }
}

/// Ride file with a `file_id` message and one `record` per (timestamp, power) pair.
/// Absent power is written as the uint16 sentinel; the other metrics are fixed.
pub fn ride_file(samples: &[(u32, Option<u16>)]) -> Vec<u8> {
    let rides: Vec<_> = samples
        .iter()
        .map(|&(timestamp, power)| RawRide {
            power,
            cadence: Some(90),
            heart_rate: Some(140),
            speed: Some(8_000),
            distance: Some(timestamp * 800),
            altitude: Some(3_000),
            ..RawRide::at(timestamp)
        })
        .collect();
    full_ride_file(&rides)
}

/// Ride file with full control over every `record` value.
pub fn full_ride_file(rides: &[RawRide]) -> Vec<u8> {
    let mut builder = FitFileBuilder::new();
    // file_id: type (enum) = activity (4)
    builder.define(0, mesg::FILE_ID, &[(0, BaseType::Enum)]).data(0, &[4]);
    builder.define(1, mesg::RECORD, &RIDE_FIELDS);
    for ride in rides {
        builder.data(
            1,
            &[
                ride.timestamp as u64,
                ride.power.map_or(0xFFFF, u64::from),
                ride.cadence.map_or(0xFF, u64::from),
                ride.heart_rate.map_or(0xFF, u64::from),
                ride.speed.map_or(0xFFFF, u64::from),
                ride.distance.map_or(0xFFFF_FFFF, u64::from),
                ride.altitude.map_or(0xFFFF, u64::from),
            ],
        );
    }
    builder.build()
}
