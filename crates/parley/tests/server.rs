//! Integration tests for the Parley server, handler, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley::prelude::*;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(3);

struct TestServer {
    addr: String,
    channels: Arc<dyn Component>,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    fn channels(&self) -> &ChannelComponent {
        downcast_component::<ChannelComponent>(&self.channels).expect("channel component")
    }
}

/// Starts a server on a random port.
async fn start_server(config: ServerConfig) -> TestServer {
    let server = ParleyServer::builder()
        .config(config)
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let channels = server
        .component(ComponentType::Channel)
        .expect("channel component registered");

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async {
                let _ = stopped.await;
            })
            .await;
    });

    TestServer {
        addr,
        channels,
        stop: Some(stop),
    }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_frame(ws: &mut ClientWs, component: ComponentType, message_type: u16, payload: TypedBuffer) {
    let frame = Frame::new(component, message_type, payload);
    ws.send(Message::binary(frame.encode())).await.expect("send frame");
}

async fn send_name(ws: &mut ClientWs, message_type: ChannelMessageType, name: &str) {
    let mut payload = TypedBuffer::new();
    payload.write_string(name);
    send_frame(ws, ComponentType::Channel, message_type.into(), payload).await;
}

/// Receives the next binary frame, skipping control messages.
async fn recv_frame(ws: &mut ClientWs) -> Frame {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("frame within timeout")
            .expect("stream still open")
            .expect("recv ok");
        if let Message::Binary(data) = msg {
            return Frame::decode(&data).expect("server frames decode");
        }
    }
}

/// Waits until the server closes the connection.
async fn assert_closed(ws: &mut ClientWs) {
    loop {
        let next = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("server should close the connection");
        match next {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Binary(data))) => {
                panic!("unexpected frame before close: {:?}", Frame::decode(&data))
            }
            Some(Ok(_)) => continue,
        }
    }
}

/// Connects and identifies as `username`.
async fn login(addr: &str, username: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    let mut payload = TypedBuffer::new();
    payload.write_string(username);
    payload.write_string("secret");
    send_frame(&mut ws, ComponentType::User, UserMessageType::Identify.into(), payload).await;

    let mut reply = recv_frame(&mut ws).await;
    assert_eq!(reply.component, ComponentType::User);
    assert_eq!(reply.message_type, u16::from(UserMessageType::IdentifyComplete));
    assert_eq!(UserResult::try_from(reply.payload.read_u16().unwrap()).unwrap(), UserResult::Ok);
    assert_eq!(reply.payload.read_string().unwrap(), username);
    ws
}

fn channel_result(frame: &mut Frame) -> ChannelResult {
    assert_eq!(frame.component, ComponentType::Channel);
    ChannelResult::try_from(frame.payload.read_u16().unwrap()).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_join_broadcast_leave_flow() {
    let server = start_server(ServerConfig::default()).await;
    let mut alice = login(&server.addr, "alice").await;
    let mut bob = login(&server.addr, "bob").await;

    send_name(&mut alice, ChannelMessageType::JoinChannel, "#rust").await;
    let mut created = recv_frame(&mut alice).await;
    assert_eq!(created.message_type, u16::from(ChannelMessageType::JoinChannelComplete));
    assert_eq!(channel_result(&mut created), ChannelResult::ChannelCreated);

    send_name(&mut bob, ChannelMessageType::JoinChannel, "#rust").await;
    let mut joined = recv_frame(&mut bob).await;
    assert_eq!(channel_result(&mut joined), ChannelResult::Ok);
    assert_eq!(joined.payload.read_u32().unwrap(), 1);
    assert_eq!(joined.payload.read_string().unwrap(), "alice");
    assert_eq!(joined.payload.read_string().unwrap(), "127.0.0.1");
    assert_eq!(joined.payload.read_u32().unwrap(), 2);

    let mut announce = recv_frame(&mut alice).await;
    assert_eq!(announce.message_type, u16::from(ChannelMessageType::JoinChannel));
    assert_eq!(channel_result(&mut announce), ChannelResult::UserJoined);
    assert_eq!(announce.payload.read_string().unwrap(), "bob");
    assert_eq!(announce.payload.read_string().unwrap(), "127.0.0.1");

    send_name(&mut bob, ChannelMessageType::LeaveChannel, "#rust").await;
    let mut left = recv_frame(&mut bob).await;
    assert_eq!(left.message_type, u16::from(ChannelMessageType::LeaveChannel));
    assert_eq!(channel_result(&mut left), ChannelResult::UserLeft);
    let mut done = recv_frame(&mut bob).await;
    assert_eq!(done.message_type, u16::from(ChannelMessageType::LeaveChannelComplete));
    assert_eq!(channel_result(&mut done), ChannelResult::Ok);
    assert_eq!(done.payload.read_string().unwrap(), "#rust");

    let mut seen = recv_frame(&mut alice).await;
    assert_eq!(channel_result(&mut seen), ChannelResult::UserLeft);
    assert_eq!(seen.payload.read_string().unwrap(), "bob");

    let info = server.channels().channel_info("#rust").unwrap();
    assert_eq!(info.member_count, 1);
    assert_eq!(info.operators, vec!["alice".to_string()]);
}

#[tokio::test]
async fn test_rejection_keeps_connection_open() {
    let server = start_server(ServerConfig::default()).await;
    let mut guest = connect(&server.addr).await;

    send_name(&mut guest, ChannelMessageType::JoinChannel, "#rust").await;
    let mut reply = recv_frame(&mut guest).await;
    assert_eq!(channel_result(&mut reply), ChannelResult::NotIdentified);

    // Still connected: a second request is answered too.
    send_name(&mut guest, ChannelMessageType::LeaveChannel, "#rust").await;
    let mut reply = recv_frame(&mut guest).await;
    assert_eq!(reply.message_type, u16::from(ChannelMessageType::LeaveChannelComplete));
    assert_eq!(channel_result(&mut reply), ChannelResult::NotIdentified);
}

#[tokio::test]
async fn test_disconnect_notifies_remaining_members() {
    let server = start_server(ServerConfig::default()).await;
    let mut alice = login(&server.addr, "alice").await;
    let mut bob = login(&server.addr, "bob").await;

    send_name(&mut alice, ChannelMessageType::JoinChannel, "#rust").await;
    recv_frame(&mut alice).await;
    send_name(&mut bob, ChannelMessageType::JoinChannel, "#rust").await;
    recv_frame(&mut bob).await;
    recv_frame(&mut alice).await;

    alice.close(None).await.expect("close");

    let mut left = recv_frame(&mut bob).await;
    assert_eq!(left.message_type, u16::from(ChannelMessageType::LeaveChannel));
    assert_eq!(channel_result(&mut left), ChannelResult::UserLeft);
    assert_eq!(left.payload.read_string().unwrap(), "alice");

    let info = server.channels().channel_info("#rust").unwrap();
    assert_eq!(info.member_count, 1);
    assert!(info.operators.is_empty());
}

#[tokio::test]
async fn test_last_disconnect_destroys_channel() {
    let server = start_server(ServerConfig::default()).await;
    let mut alice = login(&server.addr, "alice").await;
    send_name(&mut alice, ChannelMessageType::JoinChannel, "#solo").await;
    recv_frame(&mut alice).await;
    assert_eq!(server.channels().channel_count(), 1);

    drop(alice);

    tokio::time::timeout(RECV_TIMEOUT, async {
        while server.channels().channel_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("channel removed after disconnect");

    let mut bob = login(&server.addr, "bob").await;
    send_name(&mut bob, ChannelMessageType::JoinChannel, "#solo").await;
    let mut reply = recv_frame(&mut bob).await;
    assert_eq!(channel_result(&mut reply), ChannelResult::ChannelCreated);
}

#[tokio::test]
async fn test_unknown_component_disconnects() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    let mut raw = Vec::new();
    raw.extend_from_slice(&99u16.to_le_bytes());
    raw.extend_from_slice(&0u16.to_le_bytes());
    ws.send(Message::binary(raw)).await.expect("send");

    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_short_frame_disconnects() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    ws.send(Message::binary(vec![2u8, 0])).await.expect("send");

    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_unknown_message_type_disconnects() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = login(&server.addr, "alice").await;

    send_name(&mut ws, ChannelMessageType::Max, "#rust").await;

    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_malformed_payload_disconnects() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = login(&server.addr, "alice").await;

    let mut payload = TypedBuffer::new();
    payload.write_u8(7);
    send_frame(&mut ws, ComponentType::Channel, ChannelMessageType::JoinChannel.into(), payload).await;

    assert_closed(&mut ws).await;
    assert_eq!(server.channels().channel_count(), 0);
}

#[tokio::test]
async fn test_idle_timeout_disconnects() {
    let config = ServerConfig {
        idle_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let server = start_server(config).await;
    let mut ws = connect(&server.addr).await;

    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_silent_socket_does_not_block_other_clients() {
    let server = start_server(ServerConfig::default()).await;

    // Connects at the TCP level but never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(&server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = tokio::time::timeout(RECV_TIMEOUT, connect(&server.addr))
        .await
        .expect("second client should connect while the first stalls");
    send_name(&mut ws, ChannelMessageType::JoinChannel, "#rust").await;
    let mut reply = recv_frame(&mut ws).await;
    assert_eq!(channel_result(&mut reply), ChannelResult::NotIdentified);
}

#[tokio::test]
async fn test_handshake_timeout_drops_silent_socket() {
    use tokio::io::AsyncReadExt;

    let config = ServerConfig {
        handshake_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let server = start_server(config).await;
    let mut silent = tokio::net::TcpStream::connect(&server.addr).await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(RECV_TIMEOUT, silent.read(&mut buf))
        .await
        .expect("server should close the socket");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(server.channels().channel_count(), 0);
}

#[tokio::test]
async fn test_case_insensitive_config_applies() {
    let mut config = ServerConfig::default();
    config.channel.case_sensitive = false;
    let server = start_server(config).await;
    let mut alice = login(&server.addr, "alice").await;
    let mut bob = login(&server.addr, "bob").await;

    send_name(&mut alice, ChannelMessageType::JoinChannel, "#General").await;
    recv_frame(&mut alice).await;
    send_name(&mut bob, ChannelMessageType::JoinChannel, "#GENERAL").await;
    let mut reply = recv_frame(&mut bob).await;
    assert_eq!(channel_result(&mut reply), ChannelResult::Ok);
    assert_eq!(server.channels().channel_count(), 1);
}

#[tokio::test]
async fn test_shutdown_clears_channels() {
    let mut server = start_server(ServerConfig::default()).await;
    let mut alice = login(&server.addr, "alice").await;
    send_name(&mut alice, ChannelMessageType::JoinChannel, "#rust").await;
    recv_frame(&mut alice).await;
    assert_eq!(server.channels().channel_count(), 1);

    server.stop.take().unwrap().send(()).unwrap();

    tokio::time::timeout(RECV_TIMEOUT, async {
        while server.channels().channel_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry cleared on stop");

    // The connection outlives the accept loop, but the components no
    // longer serve it.
    send_name(&mut alice, ChannelMessageType::JoinChannel, "#rust").await;
    assert_closed(&mut alice).await;
}

#[tokio::test]
async fn test_builder_rejects_duplicate_components() {
    let result = ParleyServer::builder()
        .bind("127.0.0.1:0")
        .component(Arc::new(ChannelComponent::new(ChannelConfig::default())))
        .component(Arc::new(ChannelComponent::new(ChannelConfig::default())))
        .build()
        .await;
    assert!(matches!(result, Err(ParleyError::Component(_))));
}

#[tokio::test]
async fn test_builder_keeps_custom_user_component() {
    struct DenyAll;

    #[async_trait]
    impl Authenticator for DenyAll {
        async fn authenticate(&self, _username: &str, _password: &str) -> Result<(), UserError> {
            Err(UserError::AuthFailed("closed".into()))
        }
    }

    let server = ParleyServer::builder()
        .bind("127.0.0.1:0")
        .component(Arc::new(UserComponent::new(UserConfig::default(), DenyAll)))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().unwrap().to_string();
    assert!(server.component(ComponentType::Channel).is_some());
    tokio::spawn(server.run());

    let mut ws = connect(&addr).await;
    let mut payload = TypedBuffer::new();
    payload.write_string("alice");
    payload.write_string("wrong");
    send_frame(&mut ws, ComponentType::User, UserMessageType::Identify.into(), payload).await;

    let mut reply = recv_frame(&mut ws).await;
    assert_eq!(
        UserResult::try_from(reply.payload.read_u16().unwrap()).unwrap(),
        UserResult::AuthFailed
    );
}
