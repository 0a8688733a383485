//! FIT base types and decoded field values

/// Base type of a FIT field.
/// Maps to the low five bits of the base type byte in a field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    /// Enumerated byte (0x00)
    Enum,
    /// 8-bit signed integer (0x01)
    SInt8,
    /// 8-bit unsigned integer (0x02)
    UInt8,
    /// 16-bit signed integer (0x83)
    SInt16,
    /// 16-bit unsigned integer (0x84)
    UInt16,
    /// 32-bit signed integer (0x85)
    SInt32,
    /// 32-bit unsigned integer (0x86)
    UInt32,
    /// NUL-terminated UTF-8 string (0x07)
    String,
    /// 32-bit float (0x88)
    Float32,
    /// 64-bit float (0x89)
    Float64,
    /// 8-bit unsigned integer, zero invalid (0x0A)
    UInt8z,
    /// 16-bit unsigned integer, zero invalid (0x8B)
    UInt16z,
    /// 32-bit unsigned integer, zero invalid (0x8C)
    UInt32z,
    /// Opaque byte run (0x0D)
    Byte,
    /// 64-bit signed integer (0x8E)
    SInt64,
    /// 64-bit unsigned integer (0x8F)
    UInt64,
    /// 64-bit unsigned integer, zero invalid (0x90)
    UInt64z,
}

impl BaseType {
    /// Decode a base type byte. Unknown base type numbers are `None`.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte & 0x1F {
            0 => BaseType::Enum,
            1 => BaseType::SInt8,
            2 => BaseType::UInt8,
            3 => BaseType::SInt16,
            4 => BaseType::UInt16,
            5 => BaseType::SInt32,
            6 => BaseType::UInt32,
            7 => BaseType::String,
            8 => BaseType::Float32,
            9 => BaseType::Float64,
            10 => BaseType::UInt8z,
            11 => BaseType::UInt16z,
            12 => BaseType::UInt32z,
            13 => BaseType::Byte,
            14 => BaseType::SInt64,
            15 => BaseType::UInt64,
            16 => BaseType::UInt64z,
            _ => return None,
        })
    }

    /// The on-disk base type byte, including the endian-ability bit.
    pub const fn to_byte(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::SInt8 => 0x01,
            BaseType::UInt8 => 0x02,
            BaseType::SInt16 => 0x83,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::String => 0x07,
            BaseType::Float32 => 0x88,
            BaseType::Float64 => 0x89,
            BaseType::UInt8z => 0x0A,
            BaseType::UInt16z => 0x8B,
            BaseType::UInt32z => 0x8C,
            BaseType::Byte => 0x0D,
            BaseType::SInt64 => 0x8E,
            BaseType::UInt64 => 0x8F,
            BaseType::UInt64z => 0x90,
        }
    }

    /// Width in bytes of one element of this type.
    pub const fn size(&self) -> usize {
        match self {
            BaseType::Enum
            | BaseType::SInt8
            | BaseType::UInt8
            | BaseType::UInt8z
            | BaseType::String
            | BaseType::Byte => 1,
            BaseType::SInt16 | BaseType::UInt16 | BaseType::UInt16z => 2,
            BaseType::SInt32 | BaseType::UInt32 | BaseType::UInt32z | BaseType::Float32 => 4,
            BaseType::Float64 | BaseType::SInt64 | BaseType::UInt64 | BaseType::UInt64z => 8,
        }
    }

    /// Strings and byte runs have no fixed element interpretation.
    pub const fn is_variable_length(&self) -> bool {
        matches!(self, BaseType::String | BaseType::Byte)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, BaseType::SInt8 | BaseType::SInt16 | BaseType::SInt32 | BaseType::SInt64)
    }

    /// Raw bit pattern that marks a numeric element as absent.
    pub const fn invalid_raw(&self) -> u64 {
        match self {
            BaseType::Enum | BaseType::UInt8 | BaseType::Byte => 0xFF,
            BaseType::SInt8 => 0x7F,
            BaseType::SInt16 => 0x7FFF,
            BaseType::UInt16 => 0xFFFF,
            BaseType::SInt32 => 0x7FFF_FFFF,
            BaseType::UInt32 | BaseType::Float32 => 0xFFFF_FFFF,
            BaseType::SInt64 => 0x7FFF_FFFF_FFFF_FFFF,
            BaseType::UInt64 | BaseType::Float64 => u64::MAX,
            BaseType::UInt8z
            | BaseType::UInt16z
            | BaseType::UInt32z
            | BaseType::UInt64z
            | BaseType::String => 0,
        }
    }
}

/// A decoded field value. Absent values never reach this type; they are `None` upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Enum(u8),
    SInt8(i8),
    UInt8(u8),
    SInt16(i16),
    UInt16(u16),
    SInt32(i32),
    UInt32(u32),
    SInt64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
}

impl Value {
    /// Numeric view of a scalar value. Arrays yield their first element.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Enum(v) | Value::UInt8(v) => Some(*v as f64),
            Value::SInt8(v) => Some(*v as f64),
            Value::SInt16(v) => Some(*v as f64),
            Value::UInt16(v) => Some(*v as f64),
            Value::SInt32(v) => Some(*v as f64),
            Value::UInt32(v) => Some(*v as f64),
            Value::SInt64(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Array(values) => values.first().and_then(Value::as_f64),
            Value::String(_) | Value::Bytes(_) => None,
        }
    }

    /// Unsigned integer view. Negative or fractional values yield `None`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Enum(v) | Value::UInt8(v) => Some(*v as u64),
            Value::UInt16(v) => Some(*v as u64),
            Value::UInt32(v) => Some(*v as u64),
            Value::UInt64(v) => Some(*v),
            Value::SInt8(v) => u64::try_from(*v).ok(),
            Value::SInt16(v) => u64::try_from(*v).ok(),
            Value::SInt32(v) => u64::try_from(*v).ok(),
            Value::SInt64(v) => u64::try_from(*v).ok(),
            Value::Float32(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as u64),
            Value::Float64(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as u64),
            Value::Array(values) => values.first().and_then(Value::as_u64),
            _ => None,
        }
    }
}
