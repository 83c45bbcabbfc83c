//! Tor control-port client
//!
//! Implements the subset of the control protocol needed to rotate the exit
//! identity: PROTOCOLINFO, AUTHENTICATE, SIGNAL NEWNYM and QUIT.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::error::{ProxifyError, Result};

/// A complete reply to one control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl ControlReply {
    pub fn is_ok(&self) -> bool {
        self.code == 250
    }

    /// Text of the final reply line
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    fn into_result(self, context: &str) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ProxifyError::TorControl(format!(
                "{} rejected: {} {}",
                context,
                self.code,
                self.message()
            )))
        }
    }
}

/// Authentication methods advertised by PROTOCOLINFO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Null,
    HashedPassword,
    Cookie,
    SafeCookie,
}

impl AuthMethod {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "NULL" => Some(Self::Null),
            "HASHEDPASSWORD" => Some(Self::HashedPassword),
            "COOKIE" => Some(Self::Cookie),
            "SAFECOOKIE" => Some(Self::SafeCookie),
            _ => None,
        }
    }
}

/// Parsed PROTOCOLINFO reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub methods: Vec<AuthMethod>,
    pub cookie_file: Option<PathBuf>,
}

impl ProtocolInfo {
    pub fn parse(reply: &ControlReply) -> Self {
        let mut info = ProtocolInfo::default();

        for line in &reply.lines {
            let Some(rest) = line.strip_prefix("AUTH ") else {
                continue;
            };

            if let Some(methods) = rest
                .split_whitespace()
                .find_map(|token| token.strip_prefix("METHODS="))
            {
                info.methods = methods.split(',').filter_map(AuthMethod::parse).collect();
            }

            if let Some(idx) = rest.find("COOKIEFILE=") {
                info.cookie_file =
                    parse_quoted(&rest[idx + "COOKIEFILE=".len()..]).map(PathBuf::from);
            }
        }

        info
    }

    pub fn supports(&self, method: AuthMethod) -> bool {
        self.methods.contains(&method)
    }
}

/// Parse a control-protocol QuotedString, returning the unescaped content
fn parse_quoted(s: &str) -> Option<String> {
    let mut chars = s.strip_prefix('"')?.chars();
    let mut out = String::new();

    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => out.push(chars.next()?),
            other => out.push(other),
        }
    }

    None
}

fn quote(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// A single control-port session
pub struct ControlConnection<S> {
    stream: BufReader<S>,
}

impl ControlConnection<TcpStream> {
    /// Open a TCP session to the control port
    #[instrument]
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            ProxifyError::TorControl(format!("connect to {} failed: {}", addr, e))
        })?;

        debug!("Connected to Tor control port");
        Ok(Self::new(stream))
    }
}

impl<S> ControlConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Send one command line and read its reply
    pub async fn send_command(&mut self, command: &str) -> Result<ControlReply> {
        self.stream
            .write_all(format!("{}\r\n", command).as_bytes())
            .await?;
        self.stream.flush().await?;
        self.read_reply().await
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(ProxifyError::TorControl(
                "control connection closed unexpectedly".into(),
            ));
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn read_reply(&mut self) -> Result<ControlReply> {
        let mut lines = Vec::new();

        loop {
            let line = self.read_line().await?;

            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| ProxifyError::TorControl(format!("malformed reply: {:?}", line)))?;
            let separator = line.as_bytes().get(3).copied().unwrap_or(b' ');
            let text = line.get(4..).unwrap_or("").to_string();

            match separator {
                b' ' => {
                    lines.push(text);
                    return Ok(ControlReply { code, lines });
                }
                b'-' => lines.push(text),
                b'+' => {
                    lines.push(text);
                    loop {
                        let data = self.read_line().await?;
                        if data == "." {
                            break;
                        }
                        let data = data.strip_prefix('.').map(str::to_string).unwrap_or(data);
                        lines.push(data);
                    }
                }
                _ => {
                    return Err(ProxifyError::TorControl(format!(
                        "malformed reply: {:?}",
                        line
                    )))
                }
            }
        }
    }

    pub async fn protocol_info(&mut self) -> Result<ProtocolInfo> {
        let reply = self
            .send_command("PROTOCOLINFO 1")
            .await?
            .into_result("PROTOCOLINFO")?;
        Ok(ProtocolInfo::parse(&reply))
    }

    /// Authenticate using the best method the router offers
    pub async fn authenticate(
        &mut self,
        password: Option<&str>,
        cookie_override: Option<&Path>,
    ) -> Result<()> {
        let info = self.protocol_info().await?;
        debug!(methods = ?info.methods, "Tor control authentication methods");

        let command = if info.supports(AuthMethod::Null) {
            "AUTHENTICATE".to_string()
        } else if let (true, Some(password)) = (info.supports(AuthMethod::HashedPassword), password)
        {
            format!("AUTHENTICATE {}", quote(password))
        } else if info.supports(AuthMethod::Cookie) {
            let path = cookie_override
                .map(Path::to_path_buf)
                .or(info.cookie_file.clone())
                .ok_or_else(|| {
                    ProxifyError::TorControl("cookie authentication without a cookie file".into())
                })?;
            let cookie = tokio::fs::read(&path).await.map_err(|e| {
                ProxifyError::TorControl(format!(
                    "failed to read cookie file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            format!("AUTHENTICATE {}", hex::encode(cookie))
        } else if info.supports(AuthMethod::HashedPassword) {
            return Err(ProxifyError::TorControl(
                "control port requires a password (TOR_CONTROL_PASSWORD)".into(),
            ));
        } else {
            return Err(ProxifyError::TorControl(
                "no supported authentication method".into(),
            ));
        };

        self.send_command(&command)
            .await?
            .into_result("AUTHENTICATE")?;
        Ok(())
    }

    /// Ask the router for a fresh exit identity
    pub async fn new_identity(&mut self) -> Result<()> {
        self.send_command("SIGNAL NEWNYM")
            .await?
            .into_result("SIGNAL NEWNYM")?;
        Ok(())
    }

    /// Close the session politely; errors are irrelevant at this point
    pub async fn quit(mut self) {
        if let Err(e) = self.send_command("QUIT").await {
            debug!("QUIT failed: {}", e);
        }
    }
}
