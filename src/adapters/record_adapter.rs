//! Record adapter trait for typed extraction from decoded records

use crate::fit::RawRecord;

/// Projection of a decoded FIT data record into a strongly-typed value.
///
/// Adapters are pure: they never look at other records, never invent values and never
/// smooth or interpolate. One accepted record yields at most one value.
pub trait RecordAdapter: Sized {
    /// Whether records of this global message number are relevant to the adapter.
    fn accepts(mesg_num: u16) -> bool;

    /// Project a record. Returns `None` for records of other message types, or when a field
    /// the adapter cannot do without is absent.
    fn adapt(record: &RawRecord) -> Option<Self>;
}
