//! Full session over loopback sockets
//!
//! A small in-test server answers control requests over TCP and streams
//! media packets over UDP to the port announced on SETUP.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use rstream_client_core::{ClientConfig, FrameSink, ReceiverStatus, RtspSession, SessionState};
use rstream_rtp_core::{RtpHeader, RtpPacket, END_OF_FRAME_MARKER};

type Frames = Arc<Mutex<Vec<(u16, Bytes)>>>;

fn media_packet(seq: u16) -> Vec<u8> {
    let mut payload = BytesMut::from(&format!("jpeg-{}", seq)[..]);
    payload.extend_from_slice(&END_OF_FRAME_MARKER);
    RtpPacket::new(RtpHeader::new(26, false, seq, seq as u32 * 3000), payload.freeze())
        .serialize()
        .to_vec()
}

fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request
        .lines()
        .find_map(|line| line.strip_prefix(name))
        .map(|value| value.trim_start_matches(':').trim())
}

async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).ok()
}

/// Serve one control connection; on PLAY, stream `order` to the client
async fn serve(listener: TcpListener, order: Vec<u16>) {
    let (mut stream, peer) = listener.accept().await.unwrap();
    let media = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let mut client_port = 0u16;

    while let Some(request) = read_request(&mut stream).await {
        let cseq = header(&request, "CSeq").unwrap().to_string();

        if request.starts_with("SETUP") {
            let transport = header(&request, "Transport").unwrap();
            client_port = transport
                .rsplit("client_port=")
                .next()
                .and_then(|port| port.parse().ok())
                .unwrap();
        }

        let response = format!("RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: 424242\r\n\r\n", cseq);
        stream.write_all(response.as_bytes()).await.unwrap();

        if request.starts_with("PLAY") {
            let target = std::net::SocketAddr::new(peer.ip(), client_port);
            for seq in &order {
                let packet = media_packet(*seq);
                // Split each packet over two datagrams
                let (head, tail) = packet.split_at(packet.len() / 2);
                media.send_to(head, target).await.unwrap();
                media.send_to(tail, target).await.unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }
    }
}

async fn wait_for(frames: &Frames, count: usize) {
    for _ in 0..400 {
        if frames.lock().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} frames, got {}", count, frames.lock().len());
}

async fn start_session(order: Vec<u16>) -> (RtspSession, Frames) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, order));

    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let sink_frames = frames.clone();
    let sink: Arc<dyn FrameSink> =
        Arc::new(move |_pt: u8, _marker: bool, seq: u16, _ts: u32, payload: Bytes| {
            sink_frames.lock().push((seq, payload));
        });

    let config =
        ClientConfig::new(server_addr).with_media_bind_addr("127.0.0.1:0".parse().unwrap());
    let session = RtspSession::connect(config, sink).await.unwrap();
    (session, frames)
}

#[tokio::test]
async fn test_play_delivers_frames_in_order() {
    let (mut session, frames) = start_session((1..=10).collect()).await;

    session.setup("movie.mjpeg").await.unwrap();
    assert_eq!(session.session_id(), Some("424242"));

    session.play().await.unwrap();
    assert_eq!(session.receiver_status(), ReceiverStatus::Running);

    wait_for(&frames, 10).await;
    session.pause().await.unwrap();
    assert_eq!(session.receiver_status(), ReceiverStatus::Idle);

    {
        let frames = frames.lock();
        let seqs: Vec<u16> = frames.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(seqs, (1..=10).collect::<Vec<u16>>());

        let mut expected = b"jpeg-3".to_vec();
        expected.extend_from_slice(&END_OF_FRAME_MARKER);
        assert_eq!(&frames[2].1[..], &expected[..]);
    }

    let stats = session.stats();
    assert_eq!(stats.packets_received, 10);
    assert_eq!(stats.frames_delivered, 10);
    assert_eq!(stats.out_of_order, 0);
    assert_eq!(stats.packets_lost(), 0);
    assert!(stats.frame_rate() > 0.0);

    session.teardown().await.unwrap();
    assert_eq!(session.state(), SessionState::Init);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_gap_is_counted_once_and_stream_continues() {
    let (mut session, frames) = start_session(vec![1, 2, 3, 4, 6, 7, 8]).await;

    session.setup("movie.mjpeg").await.unwrap();
    session.play().await.unwrap();

    wait_for(&frames, 7).await;
    session.pause().await.unwrap();

    // 7 may overtake 6 while 6 waits out its reorder delay
    let mut seqs: Vec<u16> = frames.lock().iter().map(|(seq, _)| *seq).collect();
    seqs.sort_unstable();
    assert_eq!(seqs, vec![1, 2, 3, 4, 6, 7, 8]);

    let stats = session.stats();
    assert_eq!(stats.out_of_order, 1);
    assert_eq!(stats.packets_lost(), 1);
    assert!(stats.loss_rate() > 0.0);

    session.close().await.unwrap();
}
