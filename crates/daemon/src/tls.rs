//! Mutual-TLS configuration and synchronous per-connection handshakes.
//!
//! TLS connections are handled on a dedicated thread per connection rather
//! than through the main `mio` loop: a handshake is fundamentally a
//! blocking back-and-forth, and the daemon accepts few enough concurrent
//! TLS clients that a thread-per-connection model is simpler than driving
//! `rustls`'s non-blocking state machine through `mio` readiness events.

use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};

/// Errors building the server's TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} contains no certificates")]
    NoCertificates { path: String },
    #[error("{path} contains no private key")]
    NoPrivateKey { path: String },
    #[error("building client certificate verifier: {0}")]
    Verifier(String),
    #[error("building TLS server config: {0}")]
    Config(#[from] rustls::Error),
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let file = File::open(path).map_err(|source| TlsConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|source| TlsConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificates {
            path: path.display().to_string(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let file = File::open(path).map_err(|source| TlsConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|source| TlsConfigError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsConfigError::NoPrivateKey {
            path: path.display().to_string(),
        })
}

fn load_root_store(cacert: &Path) -> Result<RootCertStore, TlsConfigError> {
    let mut store = RootCertStore::empty();
    for cert in load_certs(cacert)? {
        store.add(cert).map_err(TlsConfigError::Config)?;
    }
    Ok(store)
}

/// Builds the server-side TLS config requiring a valid client certificate
/// signed by `cacert`, matching `ssl.CERT_REQUIRED` in the reference
/// implementation.
pub fn build_server_config(pemfile: &Path, cacert: &Path) -> Result<Arc<ServerConfig>, TlsConfigError> {
    let certs = load_certs(pemfile)?;
    let key = load_private_key(pemfile)?;
    let roots = Arc::new(load_root_store(cacert)?);

    let verifier = WebPkiClientVerifier::builder(roots)
        .build()
        .map_err(|e| TlsConfigError::Verifier(e.to_string()))?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// Performs a blocking TLS handshake on `stream`, returning a stream that
/// transparently encrypts/decrypts on read/write. A short read timeout is
/// applied so the caller can periodically check a shutdown flag once the
/// handshake is complete.
pub fn accept(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    idle_timeout: Duration,
) -> std::io::Result<StreamOwned<ServerConnection, TcpStream>> {
    stream.set_nodelay(true).ok();
    let conn = ServerConnection::new(config).map_err(std::io::Error::other)?;
    let mut tls_stream = StreamOwned::new(conn, stream);

    // Force the handshake by issuing an empty write and reading until
    // `is_handshaking()` clears; rustls drives the handshake internally on
    // the first real read/write.
    while tls_stream.conn.is_handshaking() {
        tls_stream.conn.complete_io(&mut tls_stream.sock)?;
    }

    tls_stream.sock.set_read_timeout(Some(idle_timeout))?;
    Ok(tls_stream)
}
