//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use totp_gate::auth::FixedClock;
use totp_gate::config::{parse_config, Directory, EndpointId, SharedConfig};
use totp_gate::lifecycle::Shutdown;
use totp_gate::proxy::{ProxyContext, ProxyServer, ProxySettings};

/// Base32 secret whose code at [`INSTANT`] is `123456`.
pub const TOTP_SECRET: &str = "JBSWY3DPEHPK3PXP";
pub const INSTANT: u64 = 1_508_613_180;
pub const SIGNING_SECRET: &str = "integration-secret";

/// Start a mock backend that answers every request with a fixed body and closes.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a backend that writes back every byte it receives.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A running gate with a fixed clock.
pub struct Gate {
    pub server_addrs: Vec<(EndpointId, SocketAddr)>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl Gate {
    pub fn addr(&self, endpoint: EndpointId) -> SocketAddr {
        self.server_addrs
            .iter()
            .find(|(id, _)| *id == endpoint)
            .map(|(_, addr)| *addr)
            .unwrap()
    }
}

/// Start the gate from TOML text. Listen addresses should use port 0.
pub async fn start_gate(config_text: &str) -> Gate {
    let config = parse_config(config_text).unwrap();
    let directory = Directory::from_config(&config).unwrap();
    let ctx = ProxyContext::new(SharedConfig::new(directory), ProxySettings::from_config(&config))
        .with_clock(Arc::new(FixedClock(INSTANT)));

    let server = ProxyServer::bind(ctx).await.unwrap();
    let server_addrs = server.local_addrs();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(shutdown.clone()));

    Gate {
        server_addrs,
        shutdown,
        handle,
    }
}

/// Send `request` and read until the gate closes the connection.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("gate did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

/// Read from `stream` until `needle` has been seen, or panic after a timeout.
pub async fn read_until<R>(stream: &mut R, needle: &[u8]) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !out.windows(needle.len()).any(|w| w == needle) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before expected data arrived");
            out.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("expected data did not arrive");
    out
}

/// Value of the hidden CSRF input in a rendered login page.
pub fn csrf_from_page(page: &str) -> String {
    let marker = r#"name="csrf" value=""#;
    let start = page.find(marker).expect("no csrf field") + marker.len();
    let end = start + page[start..].find('"').unwrap();
    page[start..end].to_string()
}

/// Value of a response header, matched case-insensitively.
pub fn header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response
        .split("\r\n\r\n")
        .next()?
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(": "))
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}
