//! Well-known message numbers, field keys and scale/offset rules
//!
//! Only the slice of the FIT profile that ride replay needs is described here. Messages and
//! fields outside this table are still decoded, just without scaling.

/// Global message numbers.
pub mod mesg {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
}

/// Field keys of the `record` message.
pub mod record {
    pub const POSITION_LAT: u8 = 0;
    pub const POSITION_LONG: u8 = 1;
    pub const ALTITUDE: u8 = 2;
    pub const HEART_RATE: u8 = 3;
    pub const CADENCE: u8 = 4;
    pub const DISTANCE: u8 = 5;
    pub const SPEED: u8 = 6;
    pub const POWER: u8 = 7;
    pub const GRADE: u8 = 9;
    pub const TEMPERATURE: u8 = 13;
    pub const ENHANCED_SPEED: u8 = 73;
    pub const ENHANCED_ALTITUDE: u8 = 78;
}

/// Field key shared by every message that carries a full timestamp.
pub const TIMESTAMP_FIELD: u8 = 253;

/// Linear transform applied to a raw field value: `raw / scale - offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldScale {
    pub scale: f64,
    pub offset: f64,
    pub units: &'static str,
}

impl FieldScale {
    const fn new(scale: f64, offset: f64, units: &'static str) -> Self {
        Self { scale, offset, units }
    }

    /// Identity transforms keep the value's integer type.
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.offset == 0.0
    }

    pub fn apply(&self, raw: f64) -> f64 {
        raw / self.scale - self.offset
    }
}

/// Scale/offset for a field of a given message, if the profile knows it.
pub fn field_scale(mesg_num: u16, field_key: u8) -> Option<FieldScale> {
    if mesg_num != mesg::RECORD {
        return None;
    }
    let scale = match field_key {
        record::POWER => FieldScale::new(1.0, 0.0, "watts"),
        record::CADENCE => FieldScale::new(1.0, 0.0, "rpm"),
        record::HEART_RATE => FieldScale::new(1.0, 0.0, "bpm"),
        record::SPEED | record::ENHANCED_SPEED => FieldScale::new(1000.0, 0.0, "m/s"),
        record::DISTANCE => FieldScale::new(100.0, 0.0, "m"),
        record::ALTITUDE | record::ENHANCED_ALTITUDE => FieldScale::new(5.0, 500.0, "m"),
        record::GRADE => FieldScale::new(100.0, 0.0, "%"),
        record::TEMPERATURE => FieldScale::new(1.0, 0.0, "C"),
        _ => return None,
    };
    Some(scale)
}
