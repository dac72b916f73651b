//! Numeric-sortable value slots (spec §3, §6).

use chrono::{DateTime, Utc};

/// `YYYYMMDD` date.
pub const SLOT_DATE: usize = 0;
/// Reserved (checksum).
pub const SLOT_CHECKSUM: usize = 1;
/// Size, sortable numeric form.
pub const SLOT_SIZE: usize = 2;
/// `HHMMSS` time.
pub const SLOT_TIME: usize = 3;
/// `YYYYMMDDHHMMSS`, the canonical sort key for date-ordered queries.
pub const SLOT_DATE_TIME: usize = 4;

/// Five value slots, indexed as above.
pub type ValueSlots = [i64; 5];

/// Derives all value slots from a document's timestamp and size.
pub fn compute(timestamp: i64, size: u64) -> ValueSlots {
    let dt: DateTime<Utc> = DateTime::from_timestamp(timestamp, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap());
    let date = dt.format("%Y%m%d").to_string().parse().unwrap_or(0);
    let time = dt.format("%H%M%S").to_string().parse().unwrap_or(0);
    let date_time = dt.format("%Y%m%d%H%M%S").to_string().parse().unwrap_or(0);

    let mut slots: ValueSlots = [0; 5];
    slots[SLOT_DATE] = date;
    slots[SLOT_CHECKSUM] = 0;
    slots[SLOT_SIZE] = size as i64;
    slots[SLOT_TIME] = time;
    slots[SLOT_DATE_TIME] = date_time;
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_date_and_time_slots() {
        // 2024-01-02T03:04:05Z
        let ts = 1_704_168_245;
        let slots = compute(ts, 123);
        assert_eq!(slots[SLOT_DATE], 20240102);
        assert_eq!(slots[SLOT_TIME], 30405);
        assert_eq!(slots[SLOT_DATE_TIME], 20240102030405);
        assert_eq!(slots[SLOT_SIZE], 123);
    }
}
