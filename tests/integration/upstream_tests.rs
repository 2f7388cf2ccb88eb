//! Upstream API channel: framing across arbitrary read boundaries and a
//! live TCP session against `ApiServer`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use halo::adapters::api_server::ApiServer;
use halo::app::dispatch::UpstreamEvent;
use halo::app::ports::UpstreamPort;
use halo::error::TransportError;
use halo::relay::messages::{AddressType, RawAdvertisement, UpstreamMessage};
use halo::relay::subscribers::SubscriberId;
use halo::upstream::codec::{FrameDecoder, HEADER_SIZE, encode_frame};
use halo::upstream::messages::{DownstreamRequest, decode_message, encode_message, encode_request};

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_SIZE + payload.len()];
    encode_frame(payload, &mut out).unwrap();
    out
}

fn sample_batch() -> UpstreamMessage {
    let mut batch = heapless::Vec::new();
    for n in 0..3u8 {
        batch
            .push(RawAdvertisement {
                address: 0x0000_AABB_CCDD_EE00 | u64::from(n),
                rssi: -40 - n as i8,
                address_type: AddressType::Public,
                data: heapless::Vec::from_slice(&[0x02, 0x01, 0x06, n]).unwrap(),
            })
            .unwrap();
    }
    UpstreamMessage::Advertisements(batch)
}

#[test]
fn batch_survives_byte_by_byte_delivery() {
    let message = sample_batch();
    let mut stream = frame(&encode_message(&message).unwrap());
    stream.extend(frame(&encode_request(&DownstreamRequest::Subscribe).unwrap()));

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for byte in &stream {
        decoder.feed(std::slice::from_ref(byte), |f| frames.push(f.to_vec()));
    }
    assert_eq!(frames.len(), 2);
    assert_eq!(decode_message(&frames[0]).unwrap(), message);
    assert_eq!(frames[1], vec![0]);
}

fn poll_until(server: &mut ApiServer, want: usize) -> Vec<UpstreamEvent> {
    let mut events = Vec::new();
    for _ in 0..400 {
        events.extend(server.poll());
        if events.len() >= want {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    events
}

#[test]
fn tcp_client_subscribes_receives_and_disconnects() {
    let mut server = ApiServer::bind(0, 2).unwrap();
    let port = server.local_addr().unwrap().port();
    let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    client
        .write_all(&frame(&encode_request(&DownstreamRequest::Subscribe).unwrap()))
        .unwrap();
    let events = poll_until(&mut server, 1);
    assert_eq!(events, vec![UpstreamEvent::Subscribed(SubscriberId(1))]);

    let message = sample_batch();
    server.send(SubscriberId(1), &message).unwrap();

    let mut header = [0u8; HEADER_SIZE];
    client.read_exact(&mut header).unwrap();
    let mut payload = vec![0u8; u16::from_le_bytes(header) as usize];
    client.read_exact(&mut payload).unwrap();
    assert_eq!(decode_message(&payload).unwrap(), message);

    drop(client);
    let events = poll_until(&mut server, 1);
    assert_eq!(events, vec![UpstreamEvent::Unsubscribed(SubscriberId(1))]);
    assert_eq!(server.client_count(), 0);
}

#[test]
fn send_to_unknown_subscriber_fails() {
    let mut server = ApiServer::bind(0, 1).unwrap();
    assert!(server.send(SubscriberId(42), &sample_batch()).is_err());
}

#[test]
fn stalled_subscriber_is_dropped_without_blocking() {
    let mut server = ApiServer::bind(0, 2).unwrap();
    let port = server.local_addr().unwrap().port();
    let subscribe = frame(&encode_request(&DownstreamRequest::Subscribe).unwrap());

    let mut stalled = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stalled.write_all(&subscribe).unwrap();
    assert_eq!(poll_until(&mut server, 1), vec![UpstreamEvent::Subscribed(SubscriberId(1))]);

    let mut reader = TcpStream::connect(("127.0.0.1", port)).unwrap();
    reader.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    reader.write_all(&subscribe).unwrap();
    assert_eq!(poll_until(&mut server, 1), vec![UpstreamEvent::Subscribed(SubscriberId(2))]);

    // `stalled` never reads; its socket buffers fill and the next write fails.
    let message = sample_batch();
    let mut sends = 0u32;
    let result = loop {
        match server.send(SubscriberId(1), &message) {
            Ok(()) if sends < 10_000_000 => sends += 1,
            other => break other,
        }
    };
    assert_eq!(result, Err(TransportError::Send));

    assert_eq!(poll_until(&mut server, 1), vec![UpstreamEvent::Unsubscribed(SubscriberId(1))]);
    assert_eq!(server.client_count(), 1);
    assert_eq!(server.send(SubscriberId(1), &message), Err(TransportError::NotConnected));

    server.send(SubscriberId(2), &message).unwrap();
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).unwrap();
    let mut payload = vec![0u8; u16::from_le_bytes(header) as usize];
    reader.read_exact(&mut payload).unwrap();
    assert_eq!(decode_message(&payload).unwrap(), message);
    drop(stalled);
}
