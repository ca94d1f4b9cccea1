//! Low-level SMTP stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;

/// SMTP stream (TCP or TLS).
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<StreamOwned<ClientConnection, TcpStream>>>),
}

impl SmtpStream {
    /// Reads a line from the stream, without its line ending.
    ///
    /// Returns `None` when the peer has closed the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let count = match self {
            Self::Tcp(reader) => reader.read_line(&mut line)?,
            Self::Tls(reader) => reader.read_line(&mut line)?,
        };
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end().to_string()))
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data)?;
                reader.get_mut().flush()?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data)?;
                reader.get_mut().flush()?;
            }
        }
        Ok(())
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// Must only be called once the server has acknowledged STARTTLS, so
    /// that no buffered plaintext is discarded along with the reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS handshake fails.
    pub fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self {
            Self::Tcp(reader) => reader.into_inner(),
            Self::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

        let connection = ClientConnection::new(tls_client_config(), server_name)?;
        let tls_stream = StreamOwned::new(connection, tcp_stream);
        Ok(Self::Tls(Box::new(BufReader::new(tls_stream))))
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let stream = TcpStream::connect((hostname, port))?;
    Ok(SmtpStream::Tcp(BufReader::new(stream)))
}

/// Connects to an SMTP server over TLS (implicit TLS on port 465).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    connect(hostname, port)?.upgrade_to_tls(hostname)
}

/// Builds a TLS client configuration trusting the bundled web roots.
fn tls_client_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}
