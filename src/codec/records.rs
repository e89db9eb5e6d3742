//! `DATA_RECORDS` payload decoding.
//!
//! Sub-record layout (offsets relative to the sub-record start):
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────┬──────────────────┐
//! │ Length   │ Sequence  │ Timestamp│ Log code │ Fields ...       │
//! │ uint16 LE│ 4 bytes   │ uint32 LE│ 1 byte   │ [id][len][data]  │
//! │ 0..2     │ 2..6      │ 6..10    │ 10       │ 11..Length       │
//! └──────────┴───────────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! `Length` counts the whole sub-record, itself and the 11-byte header included.

use super::fields::{
    decode_analog16, decode_analog32, decode_gps, AnalogReading, FieldId, GpsReading,
};

/// Fixed sub-record header size, length prefix included.
pub const RECORD_HEADER_SIZE: usize = 11;

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataRecord {
    /// Sample time, protocol epoch seconds.
    pub timestamp: u32,
    /// Last GPS field in the record; `None` if it was too short.
    pub gps: Option<GpsReading>,
    /// Last analog field in the record.
    pub analog: Option<AnalogReading>,
}

impl DataRecord {
    /// Battery voltage from the record's analog reading, if reported.
    pub fn battery_volts(&self) -> Option<f64> {
        self.analog.and_then(|a| a.battery_volts)
    }
}

/// Decode every sub-record in a `DATA_RECORDS` payload, in payload order.
///
/// A sub-record with a declared length under 11 bytes, or one that runs past
/// the payload, ends decoding for the rest of the payload.
pub fn decode_records(payload: &[u8]) -> Vec<DataRecord> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset + RECORD_HEADER_SIZE <= payload.len() {
        let record_len = u16::from_le_bytes([payload[offset], payload[offset + 1]]) as usize;
        if record_len < RECORD_HEADER_SIZE || offset + record_len > payload.len() {
            tracing::debug!(offset, record_len, "malformed sub-record, dropping rest of frame");
            break;
        }

        let ts = &payload[offset + 6..offset + 10];
        let mut record = DataRecord {
            timestamp: u32::from_le_bytes([ts[0], ts[1], ts[2], ts[3]]),
            ..DataRecord::default()
        };

        decode_fields(payload, offset + RECORD_HEADER_SIZE, offset + record_len, &mut record);

        records.push(record);
        offset += record_len;
    }

    records
}

/// Walk the fields in `payload[start..end]` into `record`.
///
/// A field whose data would run past the payload stops the walk; fields
/// already decoded stay in the record.
fn decode_fields(payload: &[u8], start: usize, end: usize, record: &mut DataRecord) {
    let mut cursor = start;

    while cursor < end {
        if cursor + 2 > payload.len() {
            break;
        }

        let id = payload[cursor];
        let len = payload[cursor + 1] as usize;
        let data_start = cursor + 2;
        let data_end = data_start + len;

        if data_end > payload.len() {
            tracing::debug!(field_id = id, len, "field overruns payload, truncating record");
            break;
        }

        let data = &payload[data_start..data_end];
        match FieldId::from_code(id) {
            Some(FieldId::Gps) => record.gps = decode_gps(data),
            Some(FieldId::Analog16) => record.analog = Some(decode_analog16(data)),
            Some(FieldId::Analog32) => record.analog = Some(decode_analog32(data)),
            None => {}
        }

        cursor = data_end;
    }
}
