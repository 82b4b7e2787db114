#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_postgres::NoTls;

use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use pgembed::config::TlsFiles;
use pgembed::{
    EmbeddedEngine, EngineError, EngineFactory, GatewayConfig, MigrationError, MigrationMode,
    MigrationRunner,
};

// -----------------------------------------------------------------------------
// ----- ScriptedEngine --------------------------------------------------------

/// Answers simple queries from a fixed script and records every frame it is
/// handed, in order.
#[derive(Default)]
pub struct ScriptedEngine {
    forwarded: Mutex<Vec<Vec<u8>>>,
    never_ready: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarded(&self) -> Vec<Vec<u8>> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn forwarded_queries(&self) -> Vec<String> {
        self.forwarded()
            .iter()
            .filter(|frame| frame.first() == Some(&b'Q'))
            .map(|frame| query_text(frame))
            .collect()
    }

    /// What the engine answers for `frame`, without recording it.
    pub fn script(frame: &[u8]) -> Result<Bytes, EngineError> {
        let mut out = BytesMut::new();

        match frame.first() {
            Some(b'Q') => {
                let sql = query_text(frame);
                if sql == "select 1" {
                    out.extend_from_slice(&row_description("?column?"));
                    out.extend_from_slice(&data_row("1"));
                    out.extend_from_slice(&command_complete("SELECT 1"));
                } else if sql.starts_with("fail") {
                    out.extend_from_slice(&error_response("42601", "syntax error at or near \"fail\""));
                } else if sql.starts_with("boom") {
                    return Err(EngineError::exec("engine crashed"));
                } else {
                    let tag = sql.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
                    out.extend_from_slice(&command_complete(&tag.to_uppercase()));
                }
                out.extend_from_slice(&ready_for_query());
            }
            Some(b'S') => out.extend_from_slice(&ready_for_query()),
            _ => {}
        }

        Ok(out.freeze())
    }
}

#[async_trait]
impl EmbeddedEngine for ScriptedEngine {
    async fn wait_ready(&self) -> Result<(), EngineError> {
        if self.never_ready {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn exec_protocol_raw(&self, message: &[u8]) -> Result<Bytes, EngineError> {
        self.forwarded.lock().unwrap().push(message.to_vec());
        Self::script(message)
    }
}

// -----------------------------------------------------------------------------
// ----- ScriptedEngines -------------------------------------------------------

/// Engine factory that keeps every engine it creates for later inspection.
#[derive(Default)]
pub struct ScriptedEngines {
    created: Mutex<Vec<Arc<ScriptedEngine>>>,
    never_ready: bool,
    fail_create: bool,
}

impl ScriptedEngines {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn never_ready() -> Arc<Self> {
        Arc::new(Self {
            never_ready: true,
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_create: true,
            ..Default::default()
        })
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn engine(&self, index: usize) -> Arc<ScriptedEngine> {
        self.created.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl EngineFactory for ScriptedEngines {
    async fn create(&self) -> Result<Arc<dyn EmbeddedEngine>, EngineError> {
        if self.fail_create {
            return Err(EngineError::create("out of memory"));
        }

        let engine = Arc::new(ScriptedEngine {
            never_ready: self.never_ready,
            ..Default::default()
        });
        self.created.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

// -----------------------------------------------------------------------------
// ----- RecordingMigrations ---------------------------------------------------

/// Records every `apply`. Optionally sleeps first, fails the first N calls,
/// or runs one statement through the connection string.
#[derive(Default)]
pub struct RecordingMigrations {
    calls: Mutex<Vec<(String, MigrationMode)>>,
    failures_left: AtomicUsize,
    delay: Duration,
    statement: Option<&'static str>,
}

impl RecordingMigrations {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn failing_first(failures: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            delay,
            ..Default::default()
        })
    }

    pub fn executing(statement: &'static str) -> Arc<Self> {
        Arc::new(Self {
            statement: Some(statement),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<(String, MigrationMode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationRunner for RecordingMigrations {
    async fn apply(
        &self,
        connection_string: &str,
        _migrations_folder: &Path,
        mode: MigrationMode,
    ) -> Result<(), MigrationError> {
        self.calls
            .lock()
            .unwrap()
            .push((connection_string.to_string(), mode));

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(MigrationError::Failed {
                name: "000001.sql".to_string(),
                message: "relation \"users\" already exists".to_string(),
            });
        }

        if let Some(statement) = self.statement {
            let client = connect(connection_string)
                .await
                .map_err(|source| MigrationError::Connect { source })?;
            client
                .simple_query(statement)
                .await
                .map_err(|e| MigrationError::Other(e.to_string()))?;
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Clients ---------------------------------------------------------------

pub async fn connect(connection_string: &str) -> Result<tokio_postgres::Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Ok(client)
}

/// Gateway settings with a short readiness timeout so failing tests end fast.
pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        ready_timeout: Duration::from_secs(5),
        ..GatewayConfig::default()
    }
}

// -----------------------------------------------------------------------------
// ----- TLS -------------------------------------------------------------------

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

/// Gateway settings with the fixture certificate for `localhost`.
pub fn tls_gateway_config() -> GatewayConfig {
    GatewayConfig {
        tls: Some(TlsFiles {
            cert: fixture("server.crt"),
            key: fixture("server.key"),
        }),
        ..gateway_config()
    }
}

/// The single unframed byte, `S` or `N`, that answers an `SSLRequest`.
pub async fn read_ssl_answer<S: AsyncRead + Unpin>(stream: &mut S) -> u8 {
    let mut answer = [0u8; 1];
    timeout(Duration::from_secs(5), stream.read_exact(&mut answer))
        .await
        .expect("ssl answer timed out")
        .expect("read ssl answer");
    answer[0]
}

/// Send `SSLRequest`, expect `S`, then run the client side of the handshake
/// trusting only the fixture CA.
pub async fn tls_connect(mut stream: TcpStream) -> TlsStream<TcpStream> {
    send(&mut stream, &ssl_request()).await;
    assert_eq!(read_ssl_answer(&mut stream).await, b'S', "gateway should accept the SSLRequest");

    let pem = std::fs::read(fixture("ca.crt")).expect("read fixture ca");
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.expect("parse fixture ca")).expect("trust fixture ca");
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let server_name = ServerName::try_from("localhost").expect("valid server name");
    TlsConnector::from(Arc::new(config))
        .connect(server_name, stream)
        .await
        .expect("tls handshake with gateway")
}

// -----------------------------------------------------------------------------
// ----- Raw Frames ------------------------------------------------------------

pub fn startup_packet(params: &[(&str, &str)]) -> Vec<u8> {
    startup_packet_with_version(196608, params)
}

pub fn startup_packet_with_version(version: i32, params: &[(&str, &str)]) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_i32(version);
    for (key, value) in params {
        body.extend_from_slice(key.as_bytes());
        body.put_u8(0);
        body.extend_from_slice(value.as_bytes());
        body.put_u8(0);
    }
    body.put_u8(0);

    let mut out = BytesMut::new();
    out.put_u32(body.len() as u32 + 4);
    out.extend_from_slice(&body);
    out.to_vec()
}

pub fn ssl_request() -> Vec<u8> {
    let mut out = BytesMut::new();
    out.put_u32(8);
    out.put_i32(80877103);
    out.to_vec()
}

pub fn cancel_request(pid: i32, secret: i32) -> Vec<u8> {
    let mut out = BytesMut::new();
    out.put_u32(16);
    out.put_i32(80877102);
    out.put_i32(pid);
    out.put_i32(secret);
    out.to_vec()
}

pub fn query(sql: &str) -> Vec<u8> {
    let mut out = BytesMut::new();
    out.put_u8(b'Q');
    out.put_u32((4 + sql.len() + 1) as u32);
    out.extend_from_slice(sql.as_bytes());
    out.put_u8(0);
    out.to_vec()
}

pub fn terminate() -> Vec<u8> {
    b"X\0\0\0\x04".to_vec()
}

pub fn query_text(frame: &[u8]) -> String {
    let body = &frame[5..];
    let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
    String::from_utf8_lossy(&body[..end]).into_owned()
}

fn row_description(column: &str) -> Bytes {
    let mut body = BytesMut::new();
    body.put_i16(1);
    body.extend_from_slice(column.as_bytes());
    body.put_u8(0);
    body.put_i32(0); // table oid
    body.put_i16(0); // attnum
    body.put_i32(23); // int4
    body.put_i16(4);
    body.put_i32(-1);
    body.put_i16(0); // text
    frame(b'T', &body)
}

fn data_row(value: &str) -> Bytes {
    let mut body = BytesMut::new();
    body.put_i16(1);
    body.put_i32(value.len() as i32);
    body.extend_from_slice(value.as_bytes());
    frame(b'D', &body)
}

fn command_complete(tag: &str) -> Bytes {
    let mut body = BytesMut::new();
    body.extend_from_slice(tag.as_bytes());
    body.put_u8(0);
    frame(b'C', &body)
}

fn error_response(code: &str, message: &str) -> Bytes {
    let mut body = BytesMut::new();
    for (field, value) in [(b'S', "ERROR"), (b'V', "ERROR"), (b'C', code), (b'M', message)] {
        body.put_u8(field);
        body.extend_from_slice(value.as_bytes());
        body.put_u8(0);
    }
    body.put_u8(0);
    frame(b'E', &body)
}

fn ready_for_query() -> Bytes {
    Bytes::from_static(b"Z\0\0\0\x05I")
}

fn frame(tag: u8, body: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(5 + body.len());
    out.put_u8(tag);
    out.put_u32(body.len() as u32 + 4);
    out.extend_from_slice(body);
    out.freeze()
}

// -----------------------------------------------------------------------------
// ----- Raw Socket ------------------------------------------------------------

pub async fn raw_connect(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port))
        .await
        .expect("connect to gateway")
}

pub async fn send<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) {
    stream.write_all(bytes).await.expect("write to gateway");
}

/// Read backend frames until `stop_tag` arrives or the server closes.
/// Returns the raw bytes read.
pub async fn read_until<S: AsyncRead + Unpin>(stream: &mut S, stop_tag: u8) -> Vec<u8> {
    read_until_count(stream, stop_tag, 1).await
}

/// Like `read_until`, but waits for `count` frames tagged `stop_tag`.
pub async fn read_until_count<S: AsyncRead + Unpin>(
    stream: &mut S,
    stop_tag: u8,
    count: usize,
) -> Vec<u8> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    timeout(Duration::from_secs(5), async {
        loop {
            let seen = split_frames(&raw)
                .iter()
                .filter(|(tag, _)| *tag == stop_tag)
                .count();
            if seen >= count {
                return;
            }
            let n = stream.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            raw.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("gateway reply timed out");

    raw
}

/// `true` once the server has closed its side and sent nothing more.
pub async fn closed_without_reply<S: AsyncRead + Unpin>(stream: &mut S) -> bool {
    let mut buf = [0u8; 64];
    matches!(
        timeout(Duration::from_secs(5), stream.read(&mut buf)).await,
        Ok(Ok(0)) | Ok(Err(_))
    )
}

/// Complete backend frames as (tag, body). A trailing partial frame is ignored.
pub fn split_frames(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    while bytes.len() >= 5 {
        let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if bytes.len() < 1 + len {
            break;
        }
        out.push((bytes[0], bytes[5..1 + len].to_vec()));
        bytes = &bytes[1 + len..];
    }
    out
}

/// Field `code` of an ErrorResponse body.
pub fn error_field(body: &[u8], code: u8) -> Option<String> {
    let mut rest = body;
    while let Some((&field, tail)) = rest.split_first() {
        if field == 0 {
            break;
        }
        let end = tail.iter().position(|b| *b == 0)?;
        if field == code {
            return Some(String::from_utf8_lossy(&tail[..end]).into_owned());
        }
        rest = &tail[end + 1..];
    }
    None
}

/// Value of a ParameterStatus body if its name is `name`.
pub fn parameter(body: &[u8], name: &str) -> Option<String> {
    let mut parts = body.split(|b| *b == 0);
    let key = parts.next()?;
    let value = parts.next()?;
    (key == name.as_bytes()).then(|| String::from_utf8_lossy(value).into_owned())
}
