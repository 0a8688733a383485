//! `record` message → [`RideSample`]

use super::RecordAdapter;
use crate::RideSample;
use crate::fit::RawRecord;
use crate::fit::profile::{mesg, record};
use crate::types::Value;

impl RecordAdapter for RideSample {
    fn accepts(mesg_num: u16) -> bool {
        mesg_num == mesg::RECORD
    }

    fn adapt(record: &RawRecord) -> Option<Self> {
        if !Self::accepts(record.mesg_num) {
            return None;
        }
        let timestamp = record.timestamp()?;

        Some(RideSample {
            timestamp,
            power: integer(record, record::POWER),
            cadence: integer(record, record::CADENCE),
            heart_rate: integer(record, record::HEART_RATE),
            speed: preferred(record, record::ENHANCED_SPEED, record::SPEED),
            distance: float(record, record::DISTANCE),
            elevation: preferred(record, record::ENHANCED_ALTITUDE, record::ALTITUDE),
            grade: float(record, record::GRADE),
        })
    }
}

fn integer<T: TryFrom<u64>>(record: &RawRecord, key: u8) -> Option<T> {
    record.get(key).and_then(Value::as_u64).and_then(|v| T::try_from(v).ok())
}

fn float(record: &RawRecord, key: u8) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

/// Enhanced (32-bit) fields win over their 16-bit counterparts when both are present.
fn preferred(record: &RawRecord, enhanced: u8, legacy: u8) -> Option<f64> {
    float(record, enhanced).or_else(|| float(record, legacy))
}
