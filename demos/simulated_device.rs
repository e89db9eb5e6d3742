//! Simulated device - drives a running gateway like a tracker would.
//!
//! Connects, introduces itself with a HELLO, uploads a batch of GPS records
//! walking north from a start point, and commits. Every reply is decoded and
//! printed.
//!
//! # Running
//!
//! ```text
//! cargo run --bin dm-gateway -- --traccar-enabled false
//! cargo run --example simulated_device -- --records 5
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use dm_gateway::protocol::{
    build_frame, protocol_time, FrameBuffer, MessageType, PROTOCOL_EPOCH,
};

/// Bytes per uploaded record: header, GPS field, analog field.
const RECORD_LEN: usize = 11 + 2 + 21 + 2 + 3;

/// Most records that fit one `DATA_RECORDS` payload.
const MAX_RECORDS: u16 = (u16::MAX as usize / RECORD_LEN) as u16;

#[derive(Debug, Parser)]
struct Args {
    /// Gateway address
    #[arg(long, default_value = "127.0.0.1:20200")]
    addr: SocketAddr,

    /// IMEI to announce
    #[arg(long, default_value = "356173060000001")]
    imei: String,

    /// GPS records to upload
    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_RECORDS)),
    )]
    records: u16,
}

fn hello_payload(imei: &str) -> Vec<u8> {
    let mut payload = 0x0000_BEEFu32.to_le_bytes().to_vec();
    payload.extend_from_slice(imei.as_bytes());
    payload.push(0);
    payload
}

fn gps_record(seq: u32, timestamp: u32, lat: i32, lon: i32) -> Vec<u8> {
    let mut gps = [0u8; 21];
    gps[0..4].copy_from_slice(&timestamp.to_le_bytes());
    gps[4..8].copy_from_slice(&lat.to_le_bytes());
    gps[8..12].copy_from_slice(&lon.to_le_bytes());
    gps[12..14].copy_from_slice(&42i16.to_le_bytes());
    gps[14..16].copy_from_slice(&36u16.to_le_bytes());
    gps[17] = 0; // heading north
    gps[18] = 11;
    gps[19] = 4;

    let analog = [0x01, 0xA6, 0x0E]; // channel 1, 3750 mV

    let mut record = (RECORD_LEN as u16).to_le_bytes().to_vec();
    record.extend(seq.to_le_bytes());
    record.extend(timestamp.to_le_bytes());
    record.push(0x0B);
    record.extend([0x00, gps.len() as u8]);
    record.extend(gps);
    record.extend([0x06, analog.len() as u8]);
    record.extend(analog);
    record
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let mut socket = TcpStream::connect(args.addr).await?;
    tracing::info!(addr = %args.addr, imei = %args.imei, "connected");

    let now = protocol_time(Utc::now());
    let mut payload = Vec::new();
    for i in 0..args.records {
        let timestamp = now - u32::from(args.records - i) * 60;
        let lat = 515_000_000 + i32::from(i) * 1_000;
        payload.extend(gps_record(u32::from(i), timestamp, lat, -1_270_000));
    }

    let mut wire = build_frame(MessageType::Hello.code(), &hello_payload(&args.imei));
    wire.extend(build_frame(MessageType::DataRecords.code(), &payload));
    wire.extend(build_frame(MessageType::CommitRequest.code(), &[]));
    wire.extend(build_frame(MessageType::SocketClose.code(), &[]));
    socket.write_all(&wire).await?;

    let mut buffer = FrameBuffer::new();
    let mut buf = [0u8; 256];
    let mut replies = 0;

    while replies < 2 {
        let n = tokio::time::timeout(Duration::from_secs(5), socket.read(&mut buf)).await??;
        if n == 0 {
            break;
        }
        for frame in buffer.push(&buf[..n])? {
            replies += 1;
            match frame.message_type() {
                Some(MessageType::HelloResponse) => {
                    let p = frame.payload();
                    let secs = u32::from_le_bytes([p[0], p[1], p[2], p[3]]);
                    let server_time = chrono::DateTime::from_timestamp(
                        PROTOCOL_EPOCH + i64::from(secs),
                        0,
                    );
                    tracing::info!(?server_time, "hello acknowledged");
                }
                Some(MessageType::CommitResponse) => {
                    tracing::info!(accepted = frame.payload() == [0x01], "commit acknowledged");
                }
                other => tracing::info!(?other, "unexpected reply"),
            }
        }
    }

    tracing::info!(replies, "done");
    Ok(())
}
