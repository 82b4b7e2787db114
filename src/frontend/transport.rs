use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;

// -----------------------------------------------------------------------------
// ----- FrontendTransport -----------------------------------------------------

/// The client socket, before or after an `SSLRequest` upgrade.
#[derive(Debug)]
pub(crate) enum FrontendTransport {
    /// `None` only transiently, while the stream is being handed to the TLS acceptor.
    Plain(Option<TcpStream>),
    Tls(Box<TlsStream<TcpStream>>),
}

impl FrontendTransport {
    pub(crate) fn new(stream: TcpStream) -> Self {
        FrontendTransport::Plain(Some(stream))
    }

    pub(crate) fn is_tls(&self) -> bool {
        matches!(self, FrontendTransport::Tls(_))
    }

    pub(crate) async fn read_buf(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        match self {
            FrontendTransport::Plain(Some(stream)) => stream.read_buf(buf).await,
            FrontendTransport::Plain(None) => Err(missing_stream()),
            FrontendTransport::Tls(stream) => stream.read_buf(buf).await,
        }
    }

    pub(crate) async fn write_all_buf(&mut self, buf: &mut BytesMut) -> io::Result<()> {
        match self {
            FrontendTransport::Plain(Some(stream)) => stream.write_all_buf(buf).await,
            FrontendTransport::Plain(None) => Err(missing_stream()),
            FrontendTransport::Tls(stream) => {
                stream.write_all_buf(buf).await?;
                // rustls holds encrypted records until flushed
                stream.flush().await
            }
        }
    }

    pub(crate) async fn upgrade_to_tls(&mut self, acceptor: &TlsAcceptor) -> io::Result<()> {
        let FrontendTransport::Plain(stream) = self else {
            return Ok(());
        };

        let stream = stream.take().ok_or_else(missing_stream)?;

        let tls_stream = acceptor.accept(stream).await?;
        *self = FrontendTransport::Tls(Box::new(tls_stream));

        Ok(())
    }
}

fn missing_stream() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "missing plaintext stream")
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
