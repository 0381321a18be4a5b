//! Optional mutual-TLS listener: validates the client certificate against a
//! configured CA bundle, or serves plain HTTP when TLS is not configured
//! (development only).
//!
//! No retrieved example repo implements a server-side TLS listener, so this
//! is hand-written against the `rustls`/`tokio-rustls` versions the rest of
//! the workspace already pins.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// Paths to the server's mTLS material: the client-CA bundle and the
/// server's own certificate and private key, each referenced by path.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    /// CA bundle used to validate client certificates.
    pub ca_cert: PathBuf,
    /// Server certificate chain (PEM).
    pub server_cert: PathBuf,
    /// Server private key (PEM).
    pub server_key: PathBuf,
}

/// Errors building or running the TLS listener.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Reading a PEM file or binding the listener failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// No certificate found in a PEM file.
    #[error("no certificate found in {0}")]
    NoCertificate(String),
    /// No private key found in a PEM file.
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    /// `rustls` rejected the built configuration.
    #[error("tls configuration error: {0}")]
    Rustls(#[from] rustls::Error),
    /// Building the client certificate verifier failed.
    #[error("client certificate verifier error: {0}")]
    Verifier(String),
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let bytes = std::fs::read(path)?;
    let certs = rustls_pemfile::certs(&mut bytes.as_slice()).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(path.display().to_string()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let bytes = std::fs::read(path)?;
    rustls_pemfile::private_key(&mut bytes.as_slice())?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}

fn server_config(paths: &TlsPaths) -> Result<ServerConfig, TlsError> {
    // Idempotent: a later call (e.g. from a test) finding the provider
    // already installed is not an error for our purposes.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut roots = RootCertStore::empty();
    for cert in load_certs(&paths.ca_cert)? {
        roots
            .add(cert)
            .map_err(|err| TlsError::Verifier(err.to_string()))?;
    }
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|err| TlsError::Verifier(err.to_string()))?;

    let certs = load_certs(&paths.server_cert)?;
    let key = load_key(&paths.server_key)?;

    Ok(ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?)
}

/// A [`TcpListener`] that terminates TLS (with client-certificate
/// verification) on every accepted connection before handing it to `axum`.
struct TlsListener {
    tcp: TcpListener,
    acceptor: TlsAcceptor,
}

impl axum::serve::Listener for TlsListener {
    type Io = tokio_rustls::server::TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            let (stream, addr) = match self.tcp.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "tcp accept failed");
                    continue;
                }
            };
            match self.acceptor.accept(stream).await {
                Ok(tls_stream) => return (tls_stream, addr),
                Err(err) => {
                    tracing::warn!(error = %err, peer = %addr, "tls handshake failed");
                    continue;
                }
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.tcp.local_addr()
    }
}

/// Serve `router` over mutual TLS at `addr`, honoring `shutdown` for
/// graceful drain.
pub async fn serve_tls(
    addr: SocketAddr,
    paths: &TlsPaths,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), TlsError> {
    let config = server_config(paths)?;
    let tcp = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening (mutual TLS)");
    let listener = TlsListener {
        tcp,
        acceptor: TlsAcceptor::from(Arc::new(config)),
    };
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serve `router` over plain HTTP at `addr` (development only).
pub async fn serve_plain(
    addr: SocketAddr,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), TlsError> {
    let tcp = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening (no TLS - development mode)");
    axum::serve(tcp, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
