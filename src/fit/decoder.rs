//! Streaming FIT record decoder
//!
//! [`FitDecoder`] walks a FIT file one record at a time. Definition records update the
//! decoder's local definition table; data records are decoded against the active layout and
//! returned as [`RawRecord`]s. Nothing is buffered beyond the record being decoded, so large
//! files are handled in constant memory.
//!
//! A stream may hold several FIT files back to back (chained files). After each file CRC the
//! decoder starts over with a new header, an empty definition table and a fresh timestamp
//! reference, so nothing defined in one file is visible in the next.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ridecast::fit::{DecodeOptions, FitDecoder};
//!
//! fn count_records(path: &str) -> ridecast::Result<u64> {
//!     let mut decoder = FitDecoder::open(path, DecodeOptions::default())?;
//!     let mut count = 0;
//!     while let Some(record) = decoder.next_record()? {
//!         println!("message {} with {} fields", record.mesg_num, record.fields.len());
//!         count += 1;
//!     }
//!     Ok(count)
//! }
//! ```

use super::format::{FieldDefinition, FileHeader, HEADER_SIZE_NO_CRC, RecordHeader, RecordLayout};
use super::profile::{FieldScale, TIMESTAMP_FIELD, field_scale};
use super::stream::{Endian, StreamReader, open_file};
use crate::types::{BaseType, Value};
use crate::{CrcSection, ReplayError, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Decoder behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Verify the header CRC and the trailing file CRC
    pub verify_crc: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { verify_crc: true }
    }
}

/// Decoder lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingFileHeader,
    DecodingRecords,
    Done,
    Failed,
}

/// A decoded data record.
///
/// Field values are already scaled. A key mapped to `None` was present in the layout but
/// carried the base type's invalid sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub mesg_num: u16,
    pub local_id: u8,
    pub fields: BTreeMap<u8, Option<Value>>,
}

impl RawRecord {
    /// Value of a field, or `None` when it is missing from the layout or invalid.
    pub fn get(&self, key: u8) -> Option<&Value> {
        self.fields.get(&key).and_then(Option::as_ref)
    }

    /// Full timestamp of the record, explicit or reconstructed from a compressed header.
    pub fn timestamp(&self) -> Option<u32> {
        self.get(TIMESTAMP_FIELD).and_then(Value::as_u64).and_then(|ts| u32::try_from(ts).ok())
    }
}

/// Rolling reference for compressed timestamp headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampTracker {
    last: Option<u32>,
}

impl TimestampTracker {
    /// Most recent full or reconstructed timestamp.
    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// A record carried an explicit timestamp field; it becomes the new reference.
    pub fn observe_full(&mut self, timestamp: u32) {
        self.last = Some(timestamp);
    }

    /// Reconstruct a full timestamp from a 5-bit offset.
    ///
    /// The offset replaces the low five bits of the reference; when it is smaller than the
    /// reference's low bits the 32-second window has rolled over. With no reference yet the
    /// reconstruction starts from zero.
    pub fn resolve_compressed(&mut self, time_offset: u8) -> u32 {
        let last = self.last.unwrap_or(0);
        let offset = (time_offset & 0x1F) as u32;
        let mut timestamp = (last & !0x1F).wrapping_add(offset);
        if offset < (last & 0x1F) {
            timestamp = timestamp.wrapping_add(0x20);
        }
        self.last = Some(timestamp);
        timestamp
    }
}

/// Single-use decoder for one FIT file
pub struct FitDecoder<R> {
    reader: StreamReader<R>,
    options: DecodeOptions,
    state: DecoderState,
    header: Option<FileHeader>,
    layouts: HashMap<u8, RecordLayout>,
    timestamps: TimestampTracker,
    records_decoded: u64,
    /// Offset of the current file's header within the stream
    segment_start: u64,
    segments: u32,
}

impl FitDecoder<BufReader<File>> {
    /// Open a FIT file from disk.
    pub fn open<P: AsRef<Path>>(path: P, options: DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        let (file, len) = open_file(path)?;
        Ok(Self::from_stream(StreamReader::new(file, len).with_source(path), options))
    }
}

impl<R: Read> FitDecoder<R> {
    /// Decode `len` bytes from any reader.
    pub fn new(inner: R, len: u64, options: DecodeOptions) -> Self {
        Self::from_stream(StreamReader::new(inner, len), options)
    }

    pub fn from_stream(reader: StreamReader<R>, options: DecodeOptions) -> Self {
        Self {
            reader,
            options,
            state: DecoderState::AwaitingFileHeader,
            header: None,
            layouts: HashMap::new(),
            timestamps: TimestampTracker::default(),
            records_decoded: 0,
            segment_start: 0,
            segments: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// File header, once it has been read.
    pub fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    /// Active layout for a local definition ID.
    pub fn layout(&self, local_id: u8) -> Option<&RecordLayout> {
        self.layouts.get(&local_id)
    }

    /// Chained FIT files whose header has been read, including the current one.
    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// Data records returned so far.
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }

    /// Decode up to and including the next data record.
    ///
    /// Returns:
    /// - `Ok(Some(record))` - a data record of any message type
    /// - `Ok(None)` - the record section and file CRC have been consumed
    /// - `Err(e)` - the file is unusable; the decoder is now `Failed`
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        match self.state {
            DecoderState::Done | DecoderState::Failed => return Ok(None),
            DecoderState::AwaitingFileHeader | DecoderState::DecodingRecords => {}
        }

        match self.step() {
            Ok(record) => Ok(record),
            Err(e) => {
                self.state = DecoderState::Failed;
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<Option<RawRecord>> {
        let mut data_end = match &self.header {
            Some(header) => self.segment_start + header.data_end(),
            None => self.read_header()?,
        };

        loop {
            if self.reader.position() >= data_end {
                if self.finish_segment()? {
                    data_end = self.read_header()?;
                    continue;
                }
                return Ok(None);
            }

            let offset = self.reader.position();
            let record_header = RecordHeader::parse(self.reader.read_u8()?);
            let record = match record_header {
                RecordHeader::Definition { local_id, developer } => {
                    let layout = RecordLayout::parse_from_reader(&mut self.reader, developer)?;
                    trace!(
                        "Definition at {}: local {} -> mesg {} ({} fields, {:?})",
                        offset,
                        local_id,
                        layout.mesg_num,
                        layout.fields.len(),
                        layout.endian
                    );
                    if let Some(previous) = self.layouts.insert(local_id, layout) {
                        trace!("Local {} redefined (was mesg {})", local_id, previous.mesg_num);
                    }
                    None
                }
                RecordHeader::Data { local_id } => Some(self.read_data(local_id, None, offset)?),
                RecordHeader::CompressedTimestamp { local_id, time_offset } => {
                    Some(self.read_data(local_id, Some(time_offset), offset)?)
                }
            };

            let end = self.reader.position();
            if end > data_end {
                return Err(ReplayError::TruncatedStream {
                    offset,
                    needed: end - offset,
                    remaining: data_end.saturating_sub(offset),
                });
            }

            if let Some(record) = record {
                self.records_decoded += 1;
                return Ok(Some(record));
            }
        }
    }

    fn read_header(&mut self) -> Result<u64> {
        self.segment_start = self.reader.position();
        self.reader.reset_crc();
        let header = FileHeader::parse_from_reader(&mut self.reader, self.options.verify_crc)?;
        let needed = header.data_size as u64 + 2;
        let remaining = self.reader.remaining();
        if remaining < needed {
            return Err(ReplayError::TruncatedStream {
                offset: self.reader.position(),
                needed,
                remaining,
            });
        }

        let data_end = self.segment_start + header.data_end();
        self.header = Some(header);
        self.segments += 1;
        self.state = DecoderState::DecodingRecords;
        Ok(data_end)
    }

    fn read_data(
        &mut self,
        local_id: u8,
        time_offset: Option<u8>,
        offset: u64,
    ) -> Result<RawRecord> {
        let layout = self
            .layouts
            .get(&local_id)
            .ok_or(ReplayError::UnknownDefinition { local_id, offset })?;
        let mut fields = decode_fields(&mut self.reader, layout)?;
        let mesg_num = layout.mesg_num;

        match time_offset {
            Some(time_offset) => {
                let timestamp = self.timestamps.resolve_compressed(time_offset);
                fields.insert(TIMESTAMP_FIELD, Some(Value::UInt32(timestamp)));
            }
            None => {
                let full = fields
                    .get(&TIMESTAMP_FIELD)
                    .and_then(Option::as_ref)
                    .and_then(Value::as_u64)
                    .and_then(|ts| u32::try_from(ts).ok());
                if let Some(timestamp) = full {
                    self.timestamps.observe_full(timestamp);
                }
            }
        }

        trace!("Data at {}: local {} mesg {} ({} fields)", offset, local_id, mesg_num, fields.len());
        Ok(RawRecord { mesg_num, local_id, fields })
    }

    /// Check the file CRC. Returns `true` when another chained file follows.
    fn finish_segment(&mut self) -> Result<bool> {
        let computed = self.reader.crc();
        let stored = self.reader.read_u16(Endian::Little)?;
        if self.options.verify_crc && stored != computed {
            return Err(ReplayError::CrcMismatch { section: CrcSection::File, stored, computed });
        }

        let trailing = self.reader.remaining();
        if trailing >= HEADER_SIZE_NO_CRC as u64 {
            debug!(
                "Chained FIT file at offset {} ({} data records so far)",
                self.reader.position(),
                self.records_decoded
            );
            self.header = None;
            self.layouts.clear();
            self.timestamps = TimestampTracker::default();
            self.state = DecoderState::AwaitingFileHeader;
            return Ok(true);
        }
        if trailing > 0 {
            warn!("Ignoring {} trailing bytes after the file CRC", trailing);
        }

        debug!("Decoded {} data records from {} file(s)", self.records_decoded, self.segments);
        self.state = DecoderState::Done;
        Ok(false)
    }
}

fn decode_fields<R: Read>(
    reader: &mut StreamReader<R>,
    layout: &RecordLayout,
) -> Result<BTreeMap<u8, Option<Value>>> {
    let mut fields = BTreeMap::new();
    for field in &layout.fields {
        if field.developer {
            reader.skip(field.size as u64)?;
            continue;
        }
        let scale = field_scale(layout.mesg_num, field.key);
        let value = read_field(reader, field, layout.endian, scale)?;
        fields.insert(field.key, value);
    }
    Ok(fields)
}

fn read_field<R: Read>(
    reader: &mut StreamReader<R>,
    field: &FieldDefinition,
    endian: Endian,
    scale: Option<FieldScale>,
) -> Result<Option<Value>> {
    match field.base_type {
        BaseType::String => {
            let bytes = reader.read_bytes(field.size as usize)?;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            if end == 0 {
                return Ok(None);
            }
            Ok(Some(Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())))
        }
        BaseType::Byte => {
            let bytes = reader.read_bytes(field.size as usize)?;
            if bytes.iter().all(|&b| b == 0xFF) {
                return Ok(None);
            }
            Ok(Some(Value::Bytes(bytes)))
        }
        base => {
            let count = field.element_count();
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                if let Some(value) = read_element(reader, base, endian)? {
                    values.push(apply_scale(value, scale));
                }
            }
            // Invalid array elements are dropped; a field with no valid element is absent.
            Ok(match (count, values.len()) {
                (_, 0) => None,
                (1, _) => values.pop(),
                _ => Some(Value::Array(values)),
            })
        }
    }
}

fn read_element<R: Read>(
    reader: &mut StreamReader<R>,
    base: BaseType,
    endian: Endian,
) -> Result<Option<Value>> {
    let raw = reader.read_uint(base.size(), endian)?;
    if raw == base.invalid_raw() {
        return Ok(None);
    }

    let value = match base {
        BaseType::Enum => Value::Enum(raw as u8),
        BaseType::SInt8 => Value::SInt8(raw as u8 as i8),
        BaseType::UInt8 | BaseType::UInt8z => Value::UInt8(raw as u8),
        BaseType::SInt16 => Value::SInt16(raw as u16 as i16),
        BaseType::UInt16 | BaseType::UInt16z => Value::UInt16(raw as u16),
        BaseType::SInt32 => Value::SInt32(raw as u32 as i32),
        BaseType::UInt32 | BaseType::UInt32z => Value::UInt32(raw as u32),
        BaseType::SInt64 => Value::SInt64(raw as i64),
        BaseType::UInt64 | BaseType::UInt64z => Value::UInt64(raw),
        BaseType::Float32 => Value::Float32(f32::from_bits(raw as u32)),
        BaseType::Float64 => Value::Float64(f64::from_bits(raw)),
        BaseType::String | BaseType::Byte => unreachable!("byte runs are read whole"),
    };
    Ok(Some(value))
}

fn apply_scale(value: Value, scale: Option<FieldScale>) -> Value {
    match scale {
        Some(scale) if !scale.is_identity() => match value.as_f64() {
            Some(raw) => Value::Float64(scale.apply(raw)),
            None => value,
        },
        _ => value,
    }
}
