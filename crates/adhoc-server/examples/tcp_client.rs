//! Minimal console stand-in for poking at a running hub.
//!
//! Logs in, lists groups, joins one, says hello and then prints whatever
//! the hub sends while pinging to stay alive.
//!
//! ```text
//! ADHOC_CLIENT_ADDR=127.0.0.1:27312 ADHOC_CLIENT_NICK=Tester \
//!     cargo run -p adhoc-server --example tcp_client
//! ```

use std::env;
use std::time::Duration;

use adhoc_protocol::{
    decode_server, encode_client, ChatMessage, ClientPacket, GroupName, LoginRequest, MacAddress,
    Nickname, Opcode, ProductCode, ServerPacket,
};
use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::interval;

#[tokio::main]
async fn main() -> Result<()> {
    let addr = env::var("ADHOC_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:27312".to_string());
    let nick = env::var("ADHOC_CLIENT_NICK").unwrap_or_else(|_| "Tester".to_string());
    let product = env::var("ADHOC_CLIENT_PRODUCT").unwrap_or_else(|_| "ULUS10041".to_string());
    let group = env::var("ADHOC_CLIENT_GROUP").unwrap_or_else(|_| "LOBBY01".to_string());

    let product = ProductCode::parse(&product)
        .ok_or_else(|| anyhow!("product code must be 9 characters of A-Z0-9"))?;

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    let (mut reader, mut writer) = stream.into_split();
    println!("Connected.");

    let mut out = Vec::new();
    encode_client(
        &ClientPacket::Login(LoginRequest {
            mac: MacAddress([0x02, 0x00, 0x00, 0x12, 0x34, 0x56]),
            nickname: Nickname::new(&nick),
            product,
        }),
        &mut out,
    );
    encode_client(&ClientPacket::Scan, &mut out);
    encode_client(
        &ClientPacket::Connect {
            group: GroupName::new(&group),
        },
        &mut out,
    );
    encode_client(
        &ClientPacket::Chat {
            message: ChatMessage::new(&format!("{} says hi", nick)),
        },
        &mut out,
    );
    writer.write_all(&out).await?;

    let mut ping = interval(Duration::from_secs(1));
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let mut frame = Vec::new();
                encode_client(&ClientPacket::Ping, &mut frame);
                writer.write_all(&frame).await?;
            }

            read = reader.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    println!("Server closed the connection.");
                    return Ok(());
                }
                pending.extend_from_slice(&chunk[..n]);
                while let Some(packet) = take_frame(&mut pending)? {
                    print_packet(&packet);
                }
            }
        }
    }
}

/// Split one server frame off the front of `pending`, if complete.
fn take_frame(pending: &mut Vec<u8>) -> Result<Option<ServerPacket>> {
    let Some(&raw) = pending.first() else {
        return Ok(None);
    };
    let len = Opcode::from_u8(raw)
        .and_then(Opcode::server_frame_len)
        .ok_or_else(|| anyhow!("unexpected opcode {} from server", raw))?;
    if pending.len() < len {
        return Ok(None);
    }
    let frame: Vec<u8> = pending.drain(..len).collect();
    Ok(Some(decode_server(&frame)?))
}

fn print_packet(packet: &ServerPacket) {
    match packet {
        ServerPacket::PeerJoined { nickname, mac, ip } => {
            println!("<< peer joined: {} ({} @ {})", nickname, mac, ip)
        }
        ServerPacket::PeerLeft { ip } => println!("<< peer left: {}", ip),
        ServerPacket::ScanEntry { group, host } => println!("<< group {} hosted by {}", group, host),
        ServerPacket::ScanComplete => println!("<< scan complete"),
        ServerPacket::ConnectBssid { host } => println!("<< joined, host is {}", host),
        ServerPacket::Chat { sender, message } if !sender.is_present() => {
            println!("<< [server] {}", message)
        }
        ServerPacket::Chat { sender, message } => println!("<< <{}> {}", sender, message),
    }
}
