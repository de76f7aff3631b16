//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dev_proxy::{DevProxy, ProxyConfig};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Start a backend that answers every request with a JSON description of
/// what it received: `{server, method, url, host, body}`.
pub async fn start_echo_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        let _ = echo(socket, name).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn echo(socket: tokio::net::TcpStream, name: &'static str) -> std::io::Result<()> {
    let mut reader = BufReader::new(socket);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let url = parts.next().unwrap_or_default().to_string();

    let mut host = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" {
            break;
        }
        if let Some((key, value)) = line.trim_end().split_once(':') {
            match key.to_ascii_lowercase().as_str() {
                "host" => host = value.trim().to_string(),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    let payload = json!({
        "server": name,
        "method": method,
        "url": url,
        "host": host,
        "body": String::from_utf8_lossy(&body),
    })
    .to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        payload.len(),
        payload
    );

    let mut socket = reader.into_inner();
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

/// Start a backend that writes a fixed plain-HTTP response as soon as a
/// connection opens, without reading anything.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            response.len(),
                            response
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that reads the request head, then writes `chunks` as
/// raw bytes with `pause` after each one and closes the connection.
pub async fn start_raw_backend(chunks: &'static [&'static str], pause: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(async move {
                        let _ = write_raw(socket, chunks, pause).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn write_raw(
    socket: tokio::net::TcpStream,
    chunks: &[&str],
    pause: Duration,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(socket);
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" {
            break;
        }
    }

    let mut socket = reader.into_inner();
    for chunk in chunks {
        socket.write_all(chunk.as_bytes()).await?;
        socket.flush().await?;
        tokio::time::sleep(pause).await;
    }
    socket.shutdown().await
}

/// A local port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Write `serverless.yml` under `dir/relative`.
pub fn write_descriptor(dir: &Path, relative: &str, yaml: &str) {
    let dir = dir.join(relative);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("serverless.yml"), yaml).unwrap();
}

/// A descriptor with one function per `(method, path)` pair.
pub fn descriptor(port: u16, debug: bool, extra_custom: &str, events: &[(&str, &str)]) -> String {
    let mut yaml = format!("custom:\n  localDevPort: {port}\n  debug: {debug}\n{extra_custom}functions:\n");
    for (i, (method, path)) in events.iter().enumerate() {
        yaml.push_str(&format!(
            "  fn{i}:\n    events:\n      - http:\n          method: {method}\n          path: '{path}'\n"
        ));
    }
    yaml
}

pub fn proxy_config(service_path: &Path, target: &str, watch: bool) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.port = 0;
    config.upstream.target = target.to_string();
    config.upstream.read_timeout_secs = 5;
    config.descriptors.service_path = service_path.display().to_string();
    config.descriptors.watch = watch;
    config.descriptors.debounce_ms = 100;
    config
}

/// Run a proxy over `service_path` and wait for its first route load.
pub async fn start_proxy(config: ProxyConfig) -> (Arc<DevProxy>, SocketAddr) {
    let proxy = Arc::new(DevProxy::new(config).unwrap());
    let addr = proxy.run().await.unwrap();
    proxy.routes().current().await;
    (proxy, addr)
}

/// GET `path` through the proxy and decode the JSON body.
pub async fn get_json(proxy: SocketAddr, path: &str) -> (u16, Value) {
    let response = client()
        .get(format!("http://{proxy}{path}"))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
