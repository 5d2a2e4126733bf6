//! Stream establishment and inbound line buffering.
//!
//! [`open`] produces a boxed plain or TLS stream; the [`Connection`] splits it
//! into a read half and a write half guarded by separate locks.
//!
//! [`Connection`]: crate::irc::connection::Connection

use crate::irc::error::{IrcError, Result};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Bytes requested from the stream per read.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Anything the connection can speak IRC over.
pub trait IrcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> IrcStream for T {}

pub type BoxedStream = Box<dyn IrcStream>;

/// Open a TCP stream to `host:port`, upgrading to TLS when `tls` is set.
///
/// Both the TCP connect and the handshake are bounded by `timeout`; failures
/// of either surface as [`IrcError::Connect`].
pub async fn open(
    host: &str,
    port: u16,
    tls: bool,
    accept_invalid_certs: bool,
    timeout: Duration,
) -> Result<BoxedStream> {
    let addr = format!("{host}:{port}");
    let connect_err = |source: io::Error| IrcError::Connect {
        addr: addr.clone(),
        source,
    };

    let tcp = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(tcp)) => tcp,
        Ok(Err(e)) => return Err(connect_err(e)),
        Err(_) => {
            return Err(connect_err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            )))
        }
    };
    if let Err(e) = tcp.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    if !tls {
        tracing::debug!(%addr, "TCP connected (plain)");
        return Ok(Box::new(tcp));
    }

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| IrcError::InvalidServerName(host.to_string()))?;
    let connector = TlsConnector::from(Arc::new(tls_config(accept_invalid_certs)));
    let stream = match tokio::time::timeout(timeout, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(connect_err(e)),
        Err(_) => {
            return Err(connect_err(io::Error::new(
                io::ErrorKind::TimedOut,
                "TLS handshake timed out",
            )))
        }
    };
    tracing::debug!(%addr, "TLS handshake complete");
    Ok(Box::new(stream))
}

fn tls_config(accept_invalid_certs: bool) -> ClientConfig {
    if accept_invalid_certs {
        return ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth();
    }

    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        tracing::warn!("Error loading native certs: {}", e);
    }
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            tracing::warn!("Failed to add root cert: {}", e);
        }
    }
    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// Certificate verifier for self-signed servers. Only installed when the
/// server is configured with `accept_invalid_certs`.
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Inbound byte buffer. Grows until a `\n` arrives; bytes after the last
/// delimiter are kept for the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn has_line(&self) -> bool {
        self.buf.contains(&b'\n')
    }

    /// Split off the first complete line, without its terminator and any
    /// trailing `\r`. Invalid UTF-8 is replaced, never rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        while line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
