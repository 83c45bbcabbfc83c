//! Exit address probe
//!
//! Issues a plain HTTP GET to an IP-echo endpoint through the Tor SOCKS port so
//! the current exit address shows up in the logs.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONNECTION, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ProxifyError, Result};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Reports the exit address currently used by the SOCKS proxy
pub struct ExitProbe {
    proxy_addr: String,
    url: Url,
}

impl ExitProbe {
    pub fn new(socks_host: &str, socks_port: u16, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if url.scheme() != "http" {
            return Err(ProxifyError::InvalidConfig(format!(
                "IP echo URL must use http, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ProxifyError::InvalidUrl("IP echo URL has no host".into()));
        }

        Ok(Self {
            proxy_addr: format!("{}:{}", socks_host, socks_port),
            url,
        })
    }

    /// Fetch the IP-echo body through the proxy
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn exit_address(&self) -> Result<String> {
        let host = self.url.host_str().unwrap_or_default().to_string();
        let port = self.url.port_or_known_default().unwrap_or(80);

        let stream = timeout(PROBE_TIMEOUT, connect_via_socks5(&self.proxy_addr, &host, port))
            .await
            .map_err(|_| ProxifyError::Timeout)?
            .map_err(|e| {
                ProxifyError::SocksConnectionFailed(format!(
                    "{} -> {}:{}: {}",
                    self.proxy_addr, host, port, e
                ))
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!("Probe connection ended: {}", e);
            }
        });

        let path = match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        };

        let host_header = match self.url.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.clone(),
        };

        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(HOST, host_header)
            .header(USER_AGENT, concat!("proxify/", env!("CARGO_PKG_VERSION")))
            .header(CONNECTION, "close")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProxifyError::Internal(format!("Failed to build probe request: {}", e)))?;

        let response = timeout(PROBE_TIMEOUT, sender.send_request(request))
            .await
            .map_err(|_| ProxifyError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxifyError::Http(format!("IP echo returned {}", status)));
        }

        let body = response.into_body().collect().await?.to_bytes();
        Ok(String::from_utf8_lossy(&body).trim().to_string())
    }
}

async fn connect_via_socks5(
    proxy_addr: &str,
    target_host: &str,
    target_port: u16,
) -> std::result::Result<TcpStream, anyhow::Error> {
    let socket = TcpStream::connect(proxy_addr).await?;
    let stream = Socks5Stream::connect_with_socket(socket, (target_host, target_port)).await?;
    Ok(stream.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// SOCKS5 server that answers the tunnelled HTTP request itself
    async fn spawn_fake_socks(body: &'static str) -> (u16, tokio::task::JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Greeting: VER NMETHODS METHODS...
            let mut head = [0u8; 2];
            socket.read_exact(&mut head).await.unwrap();
            let mut methods = vec![0u8; head[1] as usize];
            socket.read_exact(&mut methods).await.unwrap();
            socket.write_all(&[5, 0]).await.unwrap();

            // CONNECT with a domain name target
            let mut req = [0u8; 4];
            socket.read_exact(&mut req).await.unwrap();
            assert_eq!(req[3], 3, "expected domain address type");
            let mut len = [0u8; 1];
            socket.read_exact(&mut len).await.unwrap();
            let mut domain = vec![0u8; len[0] as usize];
            socket.read_exact(&mut domain).await.unwrap();
            let mut port = [0u8; 2];
            socket.read_exact(&mut port).await.unwrap();
            socket
                .write_all(&[5, 0, 0, 1, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();

            // Tunnelled HTTP request
            let mut buf = Vec::new();
            let mut chunk = [0u8; 512];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();

            (
                format!("{}:{}", String::from_utf8_lossy(&domain), u16::from_be_bytes(port)),
                String::from_utf8_lossy(&buf).to_string(),
            )
        });

        (port, handle)
    }

    #[test]
    fn test_probe_rejects_https() {
        let err = ExitProbe::new("127.0.0.1", 9050, "https://httpbin.org/ip").err().unwrap();
        assert!(matches!(err, ProxifyError::InvalidConfig(_)));
    }

    #[test]
    fn test_probe_rejects_garbage_url() {
        assert!(ExitProbe::new("127.0.0.1", 9050, "not a url").is_err());
    }

    #[tokio::test]
    async fn test_exit_address_through_socks() {
        let (port, server) = spawn_fake_socks("{\n  \"origin\": \"185.220.101.4\"\n}\n").await;
        let probe = ExitProbe::new("127.0.0.1", port, "http://httpbin.org/ip").unwrap();

        let body = probe.exit_address().await.unwrap();
        assert!(body.contains("185.220.101.4"));

        let (target, request) = server.await.unwrap();
        assert_eq!(target, "httpbin.org:80");
        assert!(request.starts_with("GET /ip HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("host: httpbin.org\r\n"));
    }

    #[tokio::test]
    async fn test_exit_address_proxy_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = ExitProbe::new("127.0.0.1", port, "http://httpbin.org/ip").unwrap();
        let err = probe.exit_address().await.unwrap_err();
        assert!(matches!(err, ProxifyError::SocksConnectionFailed(_)));
    }
}
