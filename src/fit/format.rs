//! FIT file format structures and parsing
//!
//! Defines the binary structures of the FIT (Flexible and Interoperable Data Transfer)
//! activity format and the parsing of its fixed-size pieces.
//!
//! ## FIT File Structure
//!
//! 1. **File Header** (12 or 14 bytes) - size, protocol/profile versions, data size, `.FIT`
//!    tag and, for 14-byte headers, a header CRC
//! 2. **Records** - interleaved definition and data records, each introduced by a one-byte
//!    record header
//! 3. **File CRC** (2 bytes) - CRC-16 over every preceding byte of the file
//!
//! Definition records describe the field layout that later data records with the same local
//! definition ID follow. Local IDs are reused: a new definition replaces the old layout.

use super::stream::{Endian, StreamReader};
use crate::types::BaseType;
use crate::{CrcSection, ReplayError, Result};
use std::io::Read;
use tracing::{debug, trace, warn};

const FIT_TAG: &[u8; 4] = b".FIT";
/// Length of the shortest file header, which carries no header CRC.
pub const HEADER_SIZE_NO_CRC: u8 = 12;
const HEADER_SIZE_WITH_CRC: u8 = 14;
/// Highest protocol major version this decoder understands.
const MAX_PROTOCOL_MAJOR: u8 = 2;

/// FIT file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub header_size: u8,
    pub protocol_version: u8,
    pub profile_version: u16,
    /// Length of the record section in bytes, excluding header and file CRC
    pub data_size: u32,
    pub header_crc: Option<u16>,
}

impl FileHeader {
    /// Parse the header from the start of the stream.
    ///
    /// The header CRC is verified when present and non-zero, unless `verify_crc` is false.
    pub fn parse_from_reader<R: Read>(
        reader: &mut StreamReader<R>,
        verify_crc: bool,
    ) -> Result<Self> {
        trace!("Reading FIT file header");
        let header_size = reader.read_u8()?;
        if header_size != HEADER_SIZE_NO_CRC && header_size != HEADER_SIZE_WITH_CRC {
            return Err(ReplayError::invalid_header(format!(
                "header length {} is not {} or {}",
                header_size, HEADER_SIZE_NO_CRC, HEADER_SIZE_WITH_CRC
            )));
        }

        let protocol_version = reader.read_u8()?;
        let profile_version = reader.read_u16(Endian::Little)?;
        let data_size = reader.read_u32(Endian::Little)?;
        let tag = reader.read_bytes(FIT_TAG.len())?;
        if tag.as_slice() != FIT_TAG {
            return Err(ReplayError::invalid_header(format!(
                "format tag {:?} is not \".FIT\"",
                String::from_utf8_lossy(&tag)
            )));
        }

        if protocol_version >> 4 > MAX_PROTOCOL_MAJOR {
            return Err(ReplayError::invalid_header(format!(
                "unsupported protocol version {}.{}",
                protocol_version >> 4,
                protocol_version & 0x0F
            )));
        }

        let header_crc = if header_size == HEADER_SIZE_WITH_CRC {
            let computed = reader.crc();
            let stored = reader.read_u16(Endian::Little)?;
            // A zero header CRC means the encoder did not compute one.
            if verify_crc && stored != 0 && stored != computed {
                return Err(ReplayError::CrcMismatch {
                    section: CrcSection::Header,
                    stored,
                    computed,
                });
            }
            Some(stored)
        } else {
            None
        };

        debug!(
            "Parsed FIT header: size={}, protocol={:#04x}, profile={}, data_size={}",
            header_size, protocol_version, profile_version, data_size
        );

        Ok(Self { header_size, protocol_version, profile_version, data_size, header_crc })
    }

    /// Offset of the first byte after the record section.
    pub fn data_end(&self) -> u64 {
        self.header_size as u64 + self.data_size as u64
    }
}

/// One-byte header introducing every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordHeader {
    /// Field layout for `local_id`; `developer` announces developer field definitions.
    Definition { local_id: u8, developer: bool },
    /// Field values following the layout of `local_id`.
    Data { local_id: u8 },
    /// Data record whose timestamp is a 5-bit offset against the last full timestamp.
    CompressedTimestamp { local_id: u8, time_offset: u8 },
}

impl RecordHeader {
    pub const fn parse(byte: u8) -> Self {
        if byte & 0x80 != 0 {
            RecordHeader::CompressedTimestamp {
                local_id: (byte >> 5) & 0x03,
                time_offset: byte & 0x1F,
            }
        } else if byte & 0x40 != 0 {
            RecordHeader::Definition { local_id: byte & 0x0F, developer: byte & 0x20 != 0 }
        } else {
            RecordHeader::Data { local_id: byte & 0x0F }
        }
    }

    pub const fn local_id(&self) -> u8 {
        match self {
            RecordHeader::Definition { local_id, .. }
            | RecordHeader::Data { local_id }
            | RecordHeader::CompressedTimestamp { local_id, .. } => *local_id,
        }
    }
}

/// One field within a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub key: u8,
    /// Size in bytes of the whole field (element size times element count)
    pub size: u8,
    pub base_type: BaseType,
    /// Developer fields are read for cursor and CRC purposes but never interpreted
    pub developer: bool,
}

impl FieldDefinition {
    /// Build a field definition from its on-disk triple.
    ///
    /// Unknown base types and sizes that are not a multiple of the base type width are
    /// degraded to byte runs so the field is still consumed correctly.
    pub fn new(key: u8, size: u8, base_type_byte: u8) -> Self {
        let base_type = match BaseType::from_byte(base_type_byte) {
            Some(base) if size as usize % base.size() == 0 => base,
            Some(base) => {
                warn!(
                    "Field {} declares {} bytes for {:?} ({} byte elements); reading as bytes",
                    key,
                    size,
                    base,
                    base.size()
                );
                BaseType::Byte
            }
            None => {
                debug!("Field {} has unknown base type {:#04x}; reading as bytes", key, base_type_byte);
                BaseType::Byte
            }
        };
        Self { key, size, base_type, developer: false }
    }

    /// A developer field: `size` opaque bytes.
    pub fn developer(key: u8, size: u8) -> Self {
        Self { key, size, base_type: BaseType::Byte, developer: true }
    }

    /// Number of elements in the field (1 for scalars).
    pub fn element_count(&self) -> usize {
        if self.base_type.is_variable_length() {
            1
        } else {
            self.size as usize / self.base_type.size()
        }
    }
}

/// Field layout declared by a definition record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub mesg_num: u16,
    pub endian: Endian,
    pub fields: Vec<FieldDefinition>,
}

impl RecordLayout {
    /// Parse the body of a definition record (everything after the record header).
    pub fn parse_from_reader<R: Read>(
        reader: &mut StreamReader<R>,
        developer: bool,
    ) -> Result<Self> {
        let start = reader.position();
        let _reserved = reader.read_u8()?;
        let endian = match reader.read_u8()? {
            0 => Endian::Little,
            1 => Endian::Big,
            other => {
                return Err(ReplayError::malformed(
                    start + 1,
                    format!("architecture byte {other} is neither 0 nor 1"),
                ));
            }
        };
        let mesg_num = reader.read_u16(endian)?;
        let field_count = reader.read_u8()? as usize;

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let key = reader.read_u8()?;
            let size = reader.read_u8()?;
            let base_type = reader.read_u8()?;
            fields.push(FieldDefinition::new(key, size, base_type));
        }

        if developer {
            let dev_count = reader.read_u8()? as usize;
            for _ in 0..dev_count {
                let key = reader.read_u8()?;
                let size = reader.read_u8()?;
                let _developer_index = reader.read_u8()?;
                fields.push(FieldDefinition::developer(key, size));
            }
        }

        Ok(Self { mesg_num, endian, fields })
    }

    /// Total size in bytes of a data record following this layout (excluding its header).
    pub fn record_size(&self) -> u64 {
        self.fields.iter().map(|f| f.size as u64).sum()
    }

    pub fn has_field(&self, key: u8) -> bool {
        self.fields.iter().any(|f| !f.developer && f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::crc;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> StreamReader<Cursor<Vec<u8>>> {
        StreamReader::new(Cursor::new(bytes.to_vec()), bytes.len() as u64)
    }

    fn header_bytes(size: u8, data_size: u32, tag: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![size, 0x20];
        bytes.extend_from_slice(&2132u16.to_le_bytes());
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.extend_from_slice(tag);
        if size == 14 {
            let crc = crc::compute(&bytes);
            bytes.extend_from_slice(&crc.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn parses_fourteen_byte_header() {
        let bytes = header_bytes(14, 1234, b".FIT");
        let mut r = reader(&bytes);
        let header = FileHeader::parse_from_reader(&mut r, true).unwrap();
        assert_eq!(header.header_size, 14);
        assert_eq!(header.profile_version, 2132);
        assert_eq!(header.data_size, 1234);
        assert!(header.header_crc.is_some());
        assert_eq!(header.data_end(), 14 + 1234);
        assert_eq!(r.position(), 14);
    }

    #[test]
    fn parses_twelve_byte_header() {
        let bytes = header_bytes(12, 0, b".FIT");
        let header = FileHeader::parse_from_reader(&mut reader(&bytes), true).unwrap();
        assert_eq!(header.header_crc, None);
    }

    #[test]
    fn rejects_bad_tag() {
        let bytes = header_bytes(12, 0, b".TIF");
        let err = FileHeader::parse_from_reader(&mut reader(&bytes), true).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidHeader { .. }), "{err:?}");
    }

    #[test]
    fn rejects_unsupported_protocol_major() {
        let mut bytes = header_bytes(12, 0, b".FIT");
        bytes[1] = 0x30;
        let err = FileHeader::parse_from_reader(&mut reader(&bytes), true).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidHeader { .. }), "{err:?}");

        bytes[1] = 0x2F;
        assert!(FileHeader::parse_from_reader(&mut reader(&bytes), true).is_ok());
    }

    #[test]
    fn rejects_bad_header_length() {
        let mut bytes = header_bytes(12, 0, b".FIT");
        bytes[0] = 13;
        let err = FileHeader::parse_from_reader(&mut reader(&bytes), true).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidHeader { .. }), "{err:?}");
    }

    #[test]
    fn header_crc_is_checked_unless_disabled() {
        let mut bytes = header_bytes(14, 0, b".FIT");
        bytes[12] ^= 0x01;
        let err = FileHeader::parse_from_reader(&mut reader(&bytes), true).unwrap_err();
        assert!(
            matches!(err, ReplayError::CrcMismatch { section: CrcSection::Header, .. }),
            "{err:?}"
        );
        assert!(FileHeader::parse_from_reader(&mut reader(&bytes), false).is_ok());
    }

    #[test]
    fn zero_header_crc_is_not_checked() {
        let mut bytes = header_bytes(14, 0, b".FIT");
        bytes[12] = 0;
        bytes[13] = 0;
        assert!(FileHeader::parse_from_reader(&mut reader(&bytes), true).is_ok());
    }

    #[test]
    fn record_header_classes() {
        assert_eq!(RecordHeader::parse(0x40), RecordHeader::Definition { local_id: 0, developer: false });
        assert_eq!(RecordHeader::parse(0x6F), RecordHeader::Definition { local_id: 15, developer: true });
        assert_eq!(RecordHeader::parse(0x03), RecordHeader::Data { local_id: 3 });
        assert_eq!(
            RecordHeader::parse(0b1011_0101),
            RecordHeader::CompressedTimestamp { local_id: 1, time_offset: 0b1_0101 }
        );
    }

    #[test]
    fn parses_big_endian_definition_with_developer_fields() {
        let bytes = [
            0x00, 0x01, 0x00, 0x14, // reserved, big endian, mesg 20
            0x02, // two fields
            253, 4, 0x86, // timestamp uint32
            7, 2, 0x84, // power uint16
            0x01, // one developer field
            0, 3, 0, // key 0, 3 bytes, developer index 0
        ];
        let layout = RecordLayout::parse_from_reader(&mut reader(&bytes), true).unwrap();
        assert_eq!(layout.mesg_num, 20);
        assert_eq!(layout.endian, Endian::Big);
        assert_eq!(layout.fields.len(), 3);
        assert_eq!(layout.record_size(), 9);
        assert!(layout.has_field(7));
        assert!(!layout.has_field(0));
        assert!(layout.fields[2].developer);
    }

    #[test]
    fn rejects_unknown_architecture() {
        let bytes = [0x00, 0x02, 0x14, 0x00, 0x00];
        let err = RecordLayout::parse_from_reader(&mut reader(&bytes), false).unwrap_err();
        assert!(matches!(err, ReplayError::MalformedRecord { offset: 1, .. }), "{err:?}");
    }

    #[test]
    fn inconsistent_size_degrades_to_bytes() {
        let field = FieldDefinition::new(7, 3, 0x84);
        assert_eq!(field.base_type, BaseType::Byte);
        assert_eq!(field.element_count(), 1);

        let array = FieldDefinition::new(7, 6, 0x84);
        assert_eq!(array.base_type, BaseType::UInt16);
        assert_eq!(array.element_count(), 3);
    }
}
