//! End-to-end flows over real sockets: guest channels on TCP, controller
//! on WebSocket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use vmm_serial::protocol::FRAME_SIZE;
use vmm_serial::{
    Command, ControlReply, ControlServer, ControlSurface, Dispatcher, Frame, GuestListener,
    HostConfig, Injector, SessionOptions, SessionRegistry,
};

// ============================================================================
// Harness
// ============================================================================

struct Host {
    guest_addr: SocketAddr,
    control_url: String,
    registry: Arc<SessionRegistry>,
    config: Arc<HostConfig>,
}

async fn start_host() -> Host {
    let any_port = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
    let config = Arc::new(
        HostConfig::builder()
            .host_serial("HOSTSN0000001")
            .build()
            .expect("valid config"),
    );

    let registry = Arc::new(SessionRegistry::new());
    let dispatcher = Arc::new(Dispatcher::standard(Arc::clone(&config)));
    let injector = Arc::new(Injector::new(Arc::clone(&registry), &config));

    let listener = GuestListener::bind(any_port).await.expect("bind guest");
    let control = ControlServer::bind(any_port).await.expect("bind control");
    let guest_addr = listener.local_addr();
    let control_url = control.ws_url();

    tokio::spawn(listener.serve(dispatcher, Arc::clone(&registry), SessionOptions::new()));
    tokio::spawn(control.serve(Arc::new(ControlSurface::new(injector))));

    Host {
        guest_addr,
        control_url,
        registry,
        config,
    }
}

async fn wait_for_sessions(registry: &SessionRegistry, count: usize) {
    for _ in 0..400 {
        if registry.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("registry never reached {count} sessions");
}

async fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut buf = vec![0u8; FRAME_SIZE];
    timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
        .await
        .expect("frame within deadline")
        .expect("read");
    Frame::decode(&buf).expect("decode")
}

async fn ask(stream: &mut TcpStream, command: Command) -> Frame {
    let mut query = Frame::request(Uuid::nil(), command.id(), 0);
    query.header.need_response = 1;
    stream
        .write_all(&query.encode().expect("encode"))
        .await
        .expect("write");
    read_frame(stream).await
}

async fn trigger(url: &str, request: &str) -> ControlReply {
    let (mut ws, _) = connect_async(url).await.expect("connect control");
    ws.send(Message::Text(request.to_string().into()))
        .await
        .expect("send");

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("reply parses");
            }
            Some(Ok(_)) => continue,
            other => panic!("unexpected control message: {other:?}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_guest_queries_are_answered() {
    let host = start_host().await;
    let mut guest = TcpStream::connect(host.guest_addr).await.expect("connect");

    let response = ask(&mut guest, Command::HostSerial).await;
    assert_eq!(response.header.is_resp, 1);
    assert_eq!(response.header.is_req, 0);
    assert_eq!(response.header.resp_length, 14);
    assert_eq!(response.payload_text(), "HOSTSN0000001");

    let response = ask(&mut guest, Command::HostVersion).await;
    assert_eq!(
        response.payload_text(),
        r#"{"buildnumber":42962,"smallfixnumber":0}"#
    );
}

#[tokio::test]
async fn test_trigger_before_any_guest_fails() {
    let host = start_host().await;
    let reply = trigger(&host.control_url, r#"{"id":"1","command":11}"#).await;
    assert!(!reply.is_success());
    assert_eq!(reply.id.as_deref(), Some("1"));
    assert_eq!(reply.message.as_deref(), Some("No active session"));
}

#[tokio::test]
async fn test_trigger_reaches_most_recent_guest() {
    let host = start_host().await;

    let mut first = TcpStream::connect(host.guest_addr).await.expect("connect");
    wait_for_sessions(&host.registry, 1).await;
    let mut second = TcpStream::connect(host.guest_addr).await.expect("connect");
    wait_for_sessions(&host.registry, 2).await;

    let reply = trigger(&host.control_url, r#"{"command":"11"}"#).await;
    assert!(reply.is_success(), "{reply:?}");

    let injected = read_frame(&mut second).await;
    assert_eq!(injected.header.is_req, 1);
    assert_eq!(injected.header.need_response, 0);
    assert_eq!(injected.header.command_id, 11);
    assert_eq!(injected.header.sub_command, 1);
    assert_eq!(injected.header.guest_uuid, host.config.guest_uuid);

    let mut buf = [0u8; 1];
    let nothing = timeout(Duration::from_millis(100), first.read(&mut buf)).await;
    assert!(nothing.is_err(), "first guest must not receive the injection");

    // Once the newest guest leaves, the survivor takes over.
    drop(second);
    wait_for_sessions(&host.registry, 1).await;

    let reply = trigger(&host.control_url, r#"{"command":8}"#).await;
    assert!(reply.is_success(), "{reply:?}");
    assert_eq!(read_frame(&mut first).await.header.command_id, 8);
}

#[tokio::test]
async fn test_short_read_closes_session() {
    let host = start_host().await;
    let mut guest = TcpStream::connect(host.guest_addr).await.expect("connect");
    wait_for_sessions(&host.registry, 1).await;

    guest.write_all(&[0u8; 100]).await.expect("write");
    guest.shutdown().await.expect("shutdown");
    wait_for_sessions(&host.registry, 0).await;

    let reply = trigger(&host.control_url, r#"{"command":11}"#).await;
    assert_eq!(reply.message.as_deref(), Some("No active session"));
}

#[tokio::test]
async fn test_unanswered_request_produces_nothing() {
    let host = start_host().await;
    let mut guest = TcpStream::connect(host.guest_addr).await.expect("connect");

    let silent = Frame::request(Uuid::nil(), Command::GuestUuid.id(), 0);
    guest
        .write_all(&silent.encode().expect("encode"))
        .await
        .expect("write");

    let response = ask(&mut guest, Command::ClusterUuid).await;
    assert_eq!(response.header.command_id, Command::ClusterUuid.id());
    assert_eq!(
        response.payload_text(),
        "3bdea92b-68f4-4fe9-aa4b-d645c3c63864"
    );
}
