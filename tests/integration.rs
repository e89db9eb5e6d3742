//! Integration tests for dm-gateway.
//!
//! These tests drive whole sessions, from raw device bytes to replies and
//! position reports, and one live server over loopback TCP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use dm_gateway::forward::OsmAndQuery;
use dm_gateway::protocol::{build_frame, FrameBuffer, PROTOCOL_EPOCH};
use dm_gateway::{PositionReport, PositionSink, Server, Session};

const IMEI: &str = "356173060000001";

#[derive(Default)]
struct CollectingSink(Mutex<Vec<PositionReport>>);

impl PositionSink for CollectingSink {
    fn submit(&self, report: PositionReport) {
        self.0.lock().unwrap().push(report);
    }
}

fn hello(imei: &str) -> Vec<u8> {
    let mut payload = 0x1234_5678u32.to_le_bytes().to_vec();
    payload.extend_from_slice(imei.as_bytes());
    payload.push(0);
    build_frame(0x00, &payload)
}

fn gps_field(lat: i32, lon: i32, speed: u16, heading: u8) -> Vec<u8> {
    let mut data = vec![0u8; 21];
    data[4..8].copy_from_slice(&lat.to_le_bytes());
    data[8..12].copy_from_slice(&lon.to_le_bytes());
    data[12..14].copy_from_slice(&35i16.to_le_bytes());
    data[14..16].copy_from_slice(&speed.to_le_bytes());
    data[17] = heading;
    data[18] = 12;
    data[19] = 5;

    let mut field = vec![0x00, data.len() as u8];
    field.extend(data);
    field
}

fn battery_field(millivolts: i16) -> Vec<u8> {
    let mut field = vec![0x06, 3, 1];
    field.extend(millivolts.to_le_bytes());
    field
}

fn record(timestamp: u32, fields: &[Vec<u8>]) -> Vec<u8> {
    let body = fields.concat();
    let mut out = ((11 + body.len()) as u16).to_le_bytes().to_vec();
    out.extend(1u32.to_le_bytes());
    out.extend(timestamp.to_le_bytes());
    out.push(0x0B);
    out.extend(body);
    out
}

fn data_frame() -> Vec<u8> {
    let mut payload = record(
        86_400,
        &[gps_field(500_000_000, -1_234_567, 100, 64), battery_field(3750)],
    );
    payload.extend(record(86_460, &[battery_field(4000)]));
    build_frame(0x04, &payload)
}

/// A device conversation: HELLO, telemetry, commit.
fn conversation() -> Vec<u8> {
    let mut wire = hello(IMEI);
    wire.extend(data_frame());
    wire.extend(build_frame(0x05, &[]));
    wire
}

#[test]
fn test_session_conversation() {
    let mut session = Session::new();
    let out = session.ingest(&conversation(), Utc::now()).unwrap();

    assert_eq!(session.identity(), Some(IMEI));
    assert_eq!(out.records.len(), 2);
    assert_eq!(out.reports.len(), 1);

    let types: Vec<u8> = out.responses.iter().map(|f| f.msg_type()).collect();
    assert_eq!(types, vec![0x01, 0x06]);

    let report = &out.reports[0];
    assert_eq!(report.latitude, 50.0);
    assert_eq!(report.fix_time.timestamp(), PROTOCOL_EPOCH + 86_400);
    assert_eq!(report.battery_percent, Some(50.0));

    let query = OsmAndQuery::from(report);
    assert_eq!(query.lat, "50.000000");
    assert_eq!(query.lon, "-0.123457");
    assert_eq!(query.speed.as_deref(), Some("54.00"));
    assert_eq!(query.bearing.as_deref(), Some("0.0"));
    assert_eq!(query.hdop.as_deref(), Some("1.2"));
    assert_eq!(query.altitude, Some(35));
    assert_eq!(query.accuracy, Some(5));
    assert_eq!(query.batt.as_deref(), Some("50.0"));
}

/// Byte-at-a-time delivery gives the same result as one read.
#[test]
fn test_fragmented_delivery_matches_single_read() {
    let wire = conversation();
    let now = Utc::now();

    let mut whole = Session::new();
    let expected = whole.ingest(&wire, now).unwrap();

    let mut split = Session::new();
    let mut records = Vec::new();
    let mut reports = Vec::new();
    let mut responses = Vec::new();
    for byte in &wire {
        let out = split.ingest(std::slice::from_ref(byte), now).unwrap();
        records.extend(out.records);
        reports.extend(out.reports);
        responses.extend(out.responses);
    }

    assert_eq!(records, expected.records);
    assert_eq!(reports, expected.reports);
    assert_eq!(responses, expected.responses);
    assert_eq!(split.buffered(), 0);
}

/// Line noise between frames is stepped over.
#[test]
fn test_noise_between_frames() {
    let mut wire = vec![0xFF, 0x02, 0x00, 0x55];
    wire.extend(hello(IMEI));
    wire.extend([0x02, 0x02]);
    wire.extend(build_frame(0x22, &[]));

    let mut session = Session::new();
    let out = session.ingest(&wire, Utc::now()).unwrap();

    let types: Vec<u8> = out.responses.iter().map(|f| f.msg_type()).collect();
    assert_eq!(types, vec![0x01, 0x23]);
    assert_eq!(session.identity(), Some(IMEI));
}

/// The HELLO reply parses as a frame carrying the current protocol time.
#[test]
fn test_hello_response_round_trip() {
    let mut session = Session::new();
    let out = session.ingest(&hello(IMEI), Utc::now()).unwrap();

    let mut buffer = FrameBuffer::new();
    let frames = buffer.push(&out.responses[0].to_wire()).unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].msg_type(), 0x01);
    assert_eq!(frames[0].payload().len(), 8);

    let p = frames[0].payload();
    let stamp = i64::from(u32::from_le_bytes([p[0], p[1], p[2], p[3]]));
    let expected = Utc::now().timestamp() - PROTOCOL_EPOCH;
    assert!((expected - stamp).abs() <= 2);
    assert_eq!(&p[4..], &[0, 0, 0, 0]);
}

/// A sub-record declaring 10 bytes ends decoding of the frame.
#[test]
fn test_short_record_length_yields_nothing() {
    let mut payload = 10u16.to_le_bytes().to_vec();
    payload.extend([0u8; 9]);
    payload.extend(record(5, &[gps_field(1, 1, 0, 0)]));

    let mut session = Session::new();
    session.ingest(&hello(IMEI), Utc::now()).unwrap();
    let out = session.ingest(&build_frame(0x04, &payload), Utc::now()).unwrap();

    assert!(out.records.is_empty());
    assert!(out.reports.is_empty());
    assert!(out.responses.is_empty());
}

#[tokio::test]
async fn test_live_server_round_trip() {
    let sink = Arc::new(CollectingSink::default());
    let server = Server::builder()
        .listen_addr("127.0.0.1:0".parse().unwrap())
        .sink(sink.clone())
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.run_until(async {
        stop_rx.await.ok();
    }));

    let mut device = TcpStream::connect(addr).await.unwrap();
    let wire = conversation();
    let (first, rest) = wire.split_at(7);
    device.write_all(first).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    device.write_all(rest).await.unwrap();

    // HELLO_RESPONSE (13 bytes) then COMMIT_RESPONSE (6 bytes)
    let mut replies = [0u8; 19];
    tokio::time::timeout(Duration::from_secs(5), device.read_exact(&mut replies))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&replies[..5], &[0x02, 0x55, 0x01, 0x08, 0x00]);
    assert_eq!(&replies[13..], &[0x02, 0x55, 0x06, 0x01, 0x00, 0x01]);

    drop(device);
    stop_tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();

    let reports = sink.0.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].device_id, IMEI);
    assert_eq!(reports[0].bearing, Some(0.0));
}
