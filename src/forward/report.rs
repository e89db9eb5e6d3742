//! Position update handed to a [`PositionSink`](super::PositionSink).

use chrono::{DateTime, Utc};

use crate::codec::{DataRecord, GpsReading};
use crate::protocol::PROTOCOL_EPOCH;

/// km/h to knots.
pub const KMH_TO_KNOTS: f64 = 0.539957;

const BATTERY_EMPTY_VOLTS: f64 = 3.0;
const BATTERY_FULL_VOLTS: f64 = 4.5;

/// One position update. Optional attributes are `None` when the device
/// reported zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    /// Device identifier (IMEI).
    pub device_id: String,
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
    /// Record time as calendar time.
    pub fix_time: DateTime<Utc>,
    /// Meters.
    pub altitude: Option<i16>,
    /// Knots.
    pub speed_knots: Option<f64>,
    /// Degrees in `[0, 360)`.
    pub bearing: Option<f64>,
    /// Meters.
    pub accuracy: Option<u8>,
    /// Position dilution of precision.
    pub pdop: Option<f64>,
    /// Percent in `[0, 100]`.
    pub battery_percent: Option<f64>,
}

impl PositionReport {
    /// Build a report from a decoded record.
    ///
    /// Returns `None` when the record has no valid GPS reading.
    pub fn from_record(device_id: &str, record: &DataRecord) -> Option<Self> {
        let gps = record.gps.filter(|g| g.valid)?;
        Some(Self::from_gps(
            device_id,
            &gps,
            record.timestamp,
            record.battery_volts(),
        ))
    }

    /// Build a report from a GPS reading and its record's timestamp.
    pub fn from_gps(
        device_id: &str,
        gps: &GpsReading,
        record_timestamp: u32,
        battery_volts: Option<f64>,
    ) -> Self {
        let fix_time = DateTime::from_timestamp(PROTOCOL_EPOCH + i64::from(record_timestamp), 0)
            .unwrap_or(DateTime::UNIX_EPOCH);

        Self {
            device_id: device_id.to_string(),
            latitude: gps.latitude,
            longitude: gps.longitude,
            fix_time,
            altitude: (gps.altitude != 0).then_some(gps.altitude),
            speed_knots: (gps.ground_speed != 0)
                .then(|| f64::from(gps.ground_speed) * KMH_TO_KNOTS),
            bearing: (gps.heading != 0).then(|| normalize_bearing(gps.heading_degrees())),
            accuracy: (gps.position_accuracy != 0).then_some(gps.position_accuracy),
            pdop: (gps.pdop != 0).then(|| gps.pdop_value()),
            battery_percent: battery_volts.and_then(battery_percent),
        }
    }
}

/// Wrap a bearing into `[0, 360)`.
pub fn normalize_bearing(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}

/// Battery charge from voltage, linear between 3.0 V and 4.5 V.
///
/// Non-positive voltages mean "not reported" and yield `None`.
pub fn battery_percent(volts: f64) -> Option<f64> {
    if volts <= 0.0 {
        return None;
    }
    let span = BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS;
    let percent = (volts - BATTERY_EMPTY_VOLTS) / span * 100.0;
    Some(percent.clamp(0.0, 100.0))
}
