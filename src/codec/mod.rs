//! Codec module - decoding frame payloads into typed values.
//!
//! - [`decode_records`] - `DATA_RECORDS` payloads into [`DataRecord`]s
//! - [`extract_identity`] - device IMEI from `HELLO` frames
//!
//! Decoders never fail. Malformed input truncates the smallest scope it
//! touches (field, then sub-record) and everything decoded before it is kept.
//!
//! # Example
//!
//! ```
//! use dm_gateway::codec::decode_records;
//!
//! // One sub-record: 11-byte header, no fields
//! let mut payload = vec![11, 0, 0, 0, 0, 0];
//! payload.extend(42u32.to_le_bytes());
//! payload.push(0);
//!
//! let records = decode_records(&payload);
//! assert_eq!(records[0].timestamp, 42);
//! assert!(records[0].gps.is_none());
//! ```

mod fields;
mod identity;
mod records;

pub use fields::{
    decode_analog16, decode_analog32, decode_gps, AnalogReading, FieldId, GpsReading,
    BATTERY_CHANNEL, GPS_FIELD_MIN_LEN, HEADING_SCALE,
};
pub use identity::{extract_identity, DeviceIdentity, IDENTITY_OFFSET};
pub use records::{decode_records, DataRecord, RECORD_HEADER_SIZE};
