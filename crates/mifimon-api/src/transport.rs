// ── Raw socket transport ──
//
// One TCP connection per request. A hand-built HTTP/1.1 request is
// written, bytes are accumulated until the router closes the stream,
// and the raw response text is handed back for parsing. The stream is
// dropped (and therefore closed) on every exit path.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::Error;

const DEFAULT_HOST: &str = "192.168.1.1";
const DEFAULT_PORT: u16 = 80;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Where the router lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Bound applied separately to connect and to the write/read exchange.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// `host:port` socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Value for the `Host` header (port omitted when it is 80).
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            self.addr()
        }
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs().max(1)
    }
}

// ── Request construction ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A request ready to be serialized onto the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpRequest {
    /// Header-only GET.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST with an urlencoded body. `Content-Length` is added on render.
    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach `Cookie: <token>` when a session token is available.
    pub fn cookie(self, token: Option<&str>) -> Self {
        match token {
            Some(token) if !token.is_empty() => self.header("Cookie", token),
            _ => self,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Serialize to HTTP/1.1 text. The connection is always marked
    /// `close` so the router terminates the stream after replying.
    pub fn render(&self, host_header: &str) -> String {
        use std::fmt::Write;

        let mut out = String::with_capacity(256);
        let _ = write!(out, "{} {} HTTP/1.1\r\n", self.method, self.path);
        let _ = write!(out, "Host: {host_header}\r\n");
        for (name, value) in &self.headers {
            let _ = write!(out, "{name}: {value}\r\n");
        }
        if let Some(ref body) = self.body {
            let _ = write!(out, "Content-Length: {}\r\n", body.len());
        }
        out.push_str("Connection: close\r\n\r\n");
        if let Some(ref body) = self.body {
            out.push_str(body);
        }
        out
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// Bare TCP HTTP/1.1 transport.
#[derive(Debug, Clone)]
pub struct Transport {
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Send `request` and return the full raw response text.
    pub async fn send(&self, request: &HttpRequest) -> Result<String, Error> {
        let mut stream = self.connect(request).await?;
        let addr = self.config.addr();
        let wire = request.render(&self.config.host_header());

        let exchange = async {
            stream.write_all(wire.as_bytes()).await?;
            stream.flush().await?;
            read_until_close(&mut stream).await
        };

        let bytes = timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| Error::ReadTimeout {
                addr,
                timeout_secs: self.config.timeout_secs(),
            })??;

        trace!(bytes = bytes.len(), "response received");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send `request` where only delivery matters.
    ///
    /// Connect and write failures are errors. Once the request is on the
    /// wire, a read failure or timeout yields `Ok(None)`: the peer may
    /// legitimately drop off right after accepting it.
    pub async fn deliver(&self, request: &HttpRequest) -> Result<Option<String>, Error> {
        let mut stream = self.connect(request).await?;
        let wire = request.render(&self.config.host_header());

        timeout(self.config.timeout, async {
            stream.write_all(wire.as_bytes()).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::ReadTimeout {
            addr: self.config.addr(),
            timeout_secs: self.config.timeout_secs(),
        })??;

        match timeout(self.config.timeout, read_until_close(&mut stream)).await {
            Ok(Ok(bytes)) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Ok(Err(e)) => {
                debug!(error = %e, "peer dropped after request was delivered");
                Ok(None)
            }
            Err(_) => {
                debug!("no reply after request was delivered");
                Ok(None)
            }
        }
    }

    async fn connect(&self, request: &HttpRequest) -> Result<TcpStream, Error> {
        let addr = self.config.addr();
        debug!("{} {}", request.method(), request.path());

        match timeout(self.config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                trace!(%addr, "connected");
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::Socket(e)),
            Err(_) => Err(Error::ConnectTimeout {
                addr,
                timeout_secs: self.config.timeout_secs(),
            }),
        }
    }
}

async fn read_until_close(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(READ_BUFFER_SIZE);
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}
