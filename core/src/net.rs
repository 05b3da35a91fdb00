/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Mailsift, a filtered mailbox retrieval service.
 *
 * Mailsift is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Mailsift is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Mailsift.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TLS connection helpers: wrap TcpStream with rustls (implicit TLS, STARTTLS).
//!
//! A mail session runs over `MailStream`, which is either plain TCP or TLS. Implicit TLS
//! handshakes immediately on connect; STARTTLS upgrades a plain stream after the server
//! accepts the command.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::client::ClientConfig;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::RootCertStore;
use tokio_rustls::TlsConnector;

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = root_store.add(cert);
        }
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static DEFAULT_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

fn default_connector() -> &'static TlsConnector {
    DEFAULT_CONNECTOR.get_or_init(|| {
        let config = ClientConfig::builder()
            .with_root_certificates(build_root_store())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    })
}

fn server_name(host: &str) -> io::Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host name"))
}

async fn handshake(host: &str, tcp: TcpStream) -> io::Result<TokioTlsStream<TcpStream>> {
    default_connector()
        .connect(server_name(host)?, tcp)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))
}

/// Plain or TLS byte stream carrying one mail session.
pub enum MailStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl MailStream {
    /// Connect with implicit TLS (e.g. IMAPS 993): TCP connect then immediate handshake.
    pub async fn connect_implicit_tls(host: &str, port: u16) -> io::Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        Ok(MailStream::Tls(Box::new(handshake(host, tcp).await?)))
    }

    /// Connect without TLS (plain sessions, or the first leg of STARTTLS).
    pub async fn connect_plain(host: &str, port: u16) -> io::Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        Ok(MailStream::Plain(tcp))
    }

    /// Upgrade a plain stream to TLS after the server accepted STARTTLS.
    /// An already-secure stream is returned unchanged.
    pub async fn upgrade_to_tls(self, host: &str) -> io::Result<Self> {
        match self {
            MailStream::Plain(tcp) => Ok(MailStream::Tls(Box::new(handshake(host, tcp).await?))),
            tls @ MailStream::Tls(_) => Ok(tls),
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, MailStream::Tls(_))
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_flush(cx),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            MailStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            MailStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
