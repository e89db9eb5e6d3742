//! Field decoders for `DATA_RECORDS` sub-records.
//!
//! A field is `[id:1][len:1][data:len]`. Only GPS and analog fields carry
//! anything the gateway forwards; other ids are skipped by the record decoder.

/// Minimum GPS field length that holds every attribute below.
pub const GPS_FIELD_MIN_LEN: usize = 21;

/// Analog channel that reports battery voltage.
pub const BATTERY_CHANNEL: u8 = 1;

/// Degrees per heading unit.
pub const HEADING_SCALE: f64 = 5.625;

const COORD_DIVISOR: f64 = 10_000_000.0;

/// Field identifiers the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    /// GPS fix.
    Gps,
    /// Analog inputs, 16-bit values.
    Analog16,
    /// Analog inputs, 32-bit values.
    Analog32,
}

impl FieldId {
    /// Map a wire field id; unknown ids yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Gps),
            0x06 => Some(Self::Analog16),
            0x07 => Some(Self::Analog32),
            _ => None,
        }
    }
}

/// One GPS fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsReading {
    /// Fix time, protocol epoch seconds.
    pub timestamp: u32,
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64,
    /// Meters.
    pub altitude: i16,
    /// km/h as reported by the device.
    pub ground_speed: u16,
    /// Units of 5.625°.
    pub heading: u8,
    /// Position dilution of precision, tenths.
    pub pdop: u8,
    /// Meters.
    pub position_accuracy: u8,
    /// Always set for decoded fields.
    pub valid: bool,
}

impl GpsReading {
    /// Heading in degrees, unnormalized (`64` gives `360.0`).
    pub fn heading_degrees(&self) -> f64 {
        f64::from(self.heading) * HEADING_SCALE
    }

    /// PDOP as a float.
    pub fn pdop_value(&self) -> f64 {
        f64::from(self.pdop) / 10.0
    }
}

/// Analog inputs surfaced from a record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnalogReading {
    /// Battery voltage in volts, when channel 1 was present.
    pub battery_volts: Option<f64>,
}

/// Decode a GPS field. Fields shorter than 21 bytes yield `None`.
pub fn decode_gps(data: &[u8]) -> Option<GpsReading> {
    if data.len() < GPS_FIELD_MIN_LEN {
        return None;
    }

    let i32_at =
        |at: usize| i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

    Some(GpsReading {
        timestamp: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
        latitude: f64::from(i32_at(4)) / COORD_DIVISOR,
        longitude: f64::from(i32_at(8)) / COORD_DIVISOR,
        altitude: i16::from_le_bytes([data[12], data[13]]),
        ground_speed: u16::from_le_bytes([data[14], data[15]]),
        // data[16] is speed accuracy
        heading: data[17],
        pdop: data[18],
        position_accuracy: data[19],
        valid: true,
    })
}

/// Decode a 16-bit analog field: repeated `[channel:1][value:i16 LE]`.
///
/// Values are millivolts. A trailing partial entry is ignored.
pub fn decode_analog16(data: &[u8]) -> AnalogReading {
    let mut reading = AnalogReading::default();

    for entry in data.chunks_exact(3) {
        if entry[0] == BATTERY_CHANNEL {
            let millivolts = i16::from_le_bytes([entry[1], entry[2]]);
            reading.battery_volts = Some(f64::from(millivolts) / 1000.0);
        }
    }

    reading
}

/// Decode a 32-bit analog field.
///
/// No 32-bit channel maps to a forwarded attribute yet, so the reading is empty.
pub fn decode_analog32(_data: &[u8]) -> AnalogReading {
    AnalogReading::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gps_field(lat: i32, lon: i32, alt: i16, speed: u16, heading: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity(GPS_FIELD_MIN_LEN);
        data.extend(1000u32.to_le_bytes());
        data.extend(lat.to_le_bytes());
        data.extend(lon.to_le_bytes());
        data.extend(alt.to_le_bytes());
        data.extend(speed.to_le_bytes());
        data.push(3); // speed accuracy
        data.push(heading);
        data.push(12); // pdop
        data.push(5); // accuracy
        data.push(0x03); // status
        data
    }

    #[test]
    fn test_decode_gps() {
        let data = gps_field(500_000_000, -1_234_567_890, -42, 88, 64);
        let gps = decode_gps(&data).unwrap();

        assert_eq!(gps.timestamp, 1000);
        assert_eq!(gps.latitude, 50.0);
        assert!((gps.longitude - -123.456789).abs() < 1e-9);
        assert_eq!(gps.altitude, -42);
        assert_eq!(gps.ground_speed, 88);
        assert_eq!(gps.heading, 64);
        assert_eq!(gps.heading_degrees(), 360.0);
        assert_eq!(gps.pdop, 12);
        assert!((gps.pdop_value() - 1.2).abs() < 1e-9);
        assert_eq!(gps.position_accuracy, 5);
        assert!(gps.valid);
    }

    #[test]
    fn test_decode_gps_is_deterministic() {
        let data = gps_field(-337_000_000, 1_512_000_000, 15, 0, 3);
        let first = decode_gps(&data).unwrap();
        let second = decode_gps(&data).unwrap();

        assert_eq!(first.latitude.to_bits(), second.latitude.to_bits());
        assert_eq!(first.longitude.to_bits(), second.longitude.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_gps_field_is_absent() {
        let data = gps_field(1, 1, 1, 1, 1);
        assert!(decode_gps(&data[..20]).is_none());
        assert!(decode_gps(&[]).is_none());
    }

    #[test]
    fn test_decode_analog16_battery() {
        let mut data = vec![0x03];
        data.extend(1200i16.to_le_bytes());
        data.push(BATTERY_CHANNEL);
        data.extend(3750i16.to_le_bytes());
        data.push(0x04); // partial entry

        let reading = decode_analog16(&data);
        assert_eq!(reading.battery_volts, Some(3.75));
    }

    #[test]
    fn test_decode_analog16_without_battery() {
        let mut data = vec![0x02];
        data.extend(500i16.to_le_bytes());
        assert_eq!(decode_analog16(&data).battery_volts, None);
        assert_eq!(decode_analog16(&[]), AnalogReading::default());
    }

    #[test]
    fn test_decode_analog32_is_empty() {
        assert_eq!(decode_analog32(&[1, 2, 3, 4, 5]), AnalogReading::default());
    }

    #[test]
    fn test_field_ids() {
        assert_eq!(FieldId::from_code(0x00), Some(FieldId::Gps));
        assert_eq!(FieldId::from_code(0x06), Some(FieldId::Analog16));
        assert_eq!(FieldId::from_code(0x07), Some(FieldId::Analog32));
        assert_eq!(FieldId::from_code(0x02), None);
    }
}
