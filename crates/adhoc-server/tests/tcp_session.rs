// crates/adhoc-server/tests/tcp_session.rs
use std::net::SocketAddr;
use std::time::Duration;

use adhoc_protocol::{
    decode_server, encode_client, ChatMessage, ClientPacket, GroupName, LoginRequest, MacAddress,
    Nickname, Opcode, ProductCode, ServerPacket,
};
use adhoc_server::{Config, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(user_timeout: Duration) -> Self {
        let config = Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            user_timeout,
            sweep_interval: Duration::from_millis(50),
            product_db: None,
            status_path: None,
            shutdown_message: "BYE".to_string(),
            ..Config::default()
        };
        let server = Server::bind(config).await.expect("bind");
        let addr = server.local_addr().expect("local addr");
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(server.run(rx));
        TestServer {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.send(true).expect("server still running");
        timeout(WAIT, self.handle)
            .await
            .expect("server stops")
            .expect("join")
            .expect("run ok");
    }
}

fn mac(n: u8) -> MacAddress {
    MacAddress([0x00, 0x1D, 0xD9, 0x00, 0x00, n])
}

async fn send(stream: &mut TcpStream, packet: ClientPacket) {
    let mut buf = Vec::new();
    encode_client(&packet, &mut buf);
    stream.write_all(&buf).await.expect("write");
}

async fn login(stream: &mut TcpStream, n: u8, nick: &str) {
    send(
        stream,
        ClientPacket::Login(LoginRequest {
            mac: mac(n),
            nickname: Nickname::new(nick),
            product: ProductCode::parse("ULUS10041").unwrap(),
        }),
    )
    .await;
}

async fn read_packet(stream: &mut TcpStream) -> ServerPacket {
    let mut op = [0u8; 1];
    timeout(WAIT, stream.read_exact(&mut op))
        .await
        .expect("frame in time")
        .expect("read opcode");
    let len = Opcode::from_u8(op[0])
        .and_then(Opcode::server_frame_len)
        .expect("server opcode");
    let mut frame = vec![0u8; len];
    frame[0] = op[0];
    timeout(WAIT, stream.read_exact(&mut frame[1..]))
        .await
        .expect("body in time")
        .expect("read body");
    decode_server(&frame).expect("decode")
}

/// The server closed the connection without sending anything more.
async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let n = timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("close in time")
        .unwrap_or(0);
    assert_eq!(n, 0, "unexpected bytes: {:?}", &buf[..n]);
}

#[tokio::test]
async fn founder_gets_own_mac_as_bssid() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    login(&mut client, 1, "Solo").await;
    send(&mut client, ClientPacket::Scan).await;
    assert_eq!(read_packet(&mut client).await, ServerPacket::ScanComplete);

    send(
        &mut client,
        ClientPacket::Connect {
            group: GroupName::new("LOBBY01"),
        },
    )
    .await;
    assert_eq!(
        read_packet(&mut client).await,
        ServerPacket::ConnectBssid { host: mac(1) }
    );

    server.stop().await;
}

#[tokio::test]
async fn login_split_across_writes() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    let mut buf = Vec::new();
    encode_client(
        &ClientPacket::Login(LoginRequest {
            mac: mac(3),
            nickname: Nickname::new("Slow"),
            product: ProductCode::parse("ULUS10041").unwrap(),
        }),
        &mut buf,
    );
    encode_client(&ClientPacket::Scan, &mut buf);
    for chunk in buf.chunks(7) {
        client.write_all(chunk).await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert_eq!(read_packet(&mut client).await, ServerPacket::ScanComplete);

    server.stop().await;
}

#[tokio::test]
async fn second_connection_from_same_ip_is_refused() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut first = TcpStream::connect(server.addr).await.unwrap();
    login(&mut first, 1, "First").await;
    send(&mut first, ClientPacket::Scan).await;
    assert_eq!(read_packet(&mut first).await, ServerPacket::ScanComplete);

    let mut second = TcpStream::connect(server.addr).await.unwrap();
    expect_closed(&mut second).await;

    // The first session is unaffected.
    send(&mut first, ClientPacket::Scan).await;
    assert_eq!(read_packet(&mut first).await, ServerPacket::ScanComplete);

    server.stop().await;
}

#[tokio::test]
async fn protocol_violation_closes_connection() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    // Scan before login.
    send(&mut client, ClientPacket::Scan).await;
    expect_closed(&mut client).await;

    server.stop().await;
}

#[tokio::test]
async fn invalid_mac_closes_connection() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();

    send(
        &mut client,
        ClientPacket::Login(LoginRequest {
            mac: MacAddress::BROADCAST,
            nickname: Nickname::new("Bcast"),
            product: ProductCode::parse("ULUS10041").unwrap(),
        }),
    )
    .await;
    expect_closed(&mut client).await;

    server.stop().await;
}

#[tokio::test]
async fn idle_connection_times_out() {
    let server = TestServer::start(Duration::from_millis(300)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    expect_closed(&mut client).await;

    // The address is free again once the session is gone.
    let mut again = TcpStream::connect(server.addr).await.unwrap();
    login(&mut again, 2, "Again").await;
    send(&mut again, ClientPacket::Scan).await;
    assert_eq!(read_packet(&mut again).await, ServerPacket::ScanComplete);

    server.stop().await;
}

#[tokio::test]
async fn shutdown_sends_notice_then_closes() {
    let server = TestServer::start(Duration::from_secs(15)).await;
    let mut client = TcpStream::connect(server.addr).await.unwrap();
    login(&mut client, 1, "Stayer").await;
    send(
        &mut client,
        ClientPacket::Connect {
            group: GroupName::new("ROOM"),
        },
    )
    .await;
    assert!(matches!(
        read_packet(&mut client).await,
        ServerPacket::ConnectBssid { .. }
    ));

    server.stop().await;

    assert_eq!(
        read_packet(&mut client).await,
        ServerPacket::Chat {
            sender: Nickname::EMPTY,
            message: ChatMessage::new("BYE"),
        }
    );
    expect_closed(&mut client).await;
}

#[cfg(target_os = "linux")]
mod multi_address {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpSocket;

    async fn connect_from(local: Ipv4Addr, server: SocketAddr) -> TcpStream {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind(SocketAddr::new(IpAddr::V4(local), 0)).unwrap();
        socket.connect(server).await.unwrap()
    }

    #[tokio::test]
    async fn two_players_meet_in_a_lobby() {
        let server = TestServer::start(Duration::from_secs(15)).await;
        let first_ip = Ipv4Addr::new(127, 0, 0, 1);
        let second_ip = Ipv4Addr::new(127, 0, 0, 2);
        let mut first = connect_from(first_ip, server.addr).await;
        let mut second = connect_from(second_ip, server.addr).await;

        login(&mut first, 1, "First").await;
        login(&mut second, 2, "Second").await;

        let lobby = ClientPacket::Connect {
            group: GroupName::new("LOBBY01"),
        };
        send(&mut first, lobby.clone()).await;
        assert_eq!(
            read_packet(&mut first).await,
            ServerPacket::ConnectBssid { host: mac(1) }
        );

        send(&mut second, lobby).await;
        assert_eq!(
            read_packet(&mut first).await,
            ServerPacket::PeerJoined {
                nickname: Nickname::new("Second"),
                mac: mac(2),
                ip: second_ip,
            }
        );
        assert_eq!(
            read_packet(&mut second).await,
            ServerPacket::PeerJoined {
                nickname: Nickname::new("First"),
                mac: mac(1),
                ip: first_ip,
            }
        );
        assert_eq!(
            read_packet(&mut second).await,
            ServerPacket::ConnectBssid { host: mac(1) }
        );

        send(
            &mut first,
            ClientPacket::Chat {
                message: ChatMessage::new("ready?"),
            },
        )
        .await;
        assert_eq!(
            read_packet(&mut second).await,
            ServerPacket::Chat {
                sender: Nickname::new("First"),
                message: ChatMessage::new("ready?"),
            }
        );

        send(&mut second, ClientPacket::Disconnect).await;
        assert_eq!(
            read_packet(&mut first).await,
            ServerPacket::PeerLeft { ip: second_ip }
        );

        // Second is ungrouped now and sees the surviving group.
        send(&mut second, ClientPacket::Scan).await;
        assert_eq!(
            read_packet(&mut second).await,
            ServerPacket::ScanEntry {
                group: GroupName::new("LOBBY01"),
                host: mac(1),
            }
        );
        assert_eq!(read_packet(&mut second).await, ServerPacket::ScanComplete);

        // Dropping the first connection cleans up its group.
        drop(first);
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut second, ClientPacket::Scan).await;
        assert_eq!(read_packet(&mut second).await, ServerPacket::ScanComplete);

        server.stop().await;
    }
}
