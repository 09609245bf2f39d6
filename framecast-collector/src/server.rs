//! Collector HTTP server assembly.
//!
//! The ingest listener terminates TLS itself when `[server.tls]` is
//! enabled, using an OpenSSL acceptor over the configured PEM files.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslFiletype, SslMethod};
use tracing::{info, warn};

use framecast_core::FrameQueue;

use crate::config::{ServerConfig, TlsConfig};
use crate::ingest::{self, IngestState};

/// Build a TLS acceptor from a PEM certificate chain and private key.
pub fn tls_acceptor(tls: &TlsConfig) -> io::Result<SslAcceptorBuilder> {
    let context = |what: &str, path: &Path| {
        let path = path.display().to_string();
        let what = what.to_owned();
        move |e: openssl::error::ErrorStack| io::Error::other(format!("{what} {path}: {e}"))
    };

    let mut builder =
        SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).map_err(io::Error::other)?;
    builder
        .set_certificate_chain_file(&tls.cert)
        .map_err(context("loading certificate", &tls.cert))?;
    builder
        .set_private_key_file(&tls.key, SslFiletype::PEM)
        .map_err(context("loading private key", &tls.key))?;
    builder
        .check_private_key()
        .map_err(context("private key does not match", &tls.cert))?;
    Ok(builder)
}

/// Bind the ingest server. Frames from every request land in `queue`.
///
/// Returns the running server future and the addresses it listens on.
pub fn bind(
    config: &ServerConfig,
    queue: Arc<FrameQueue>,
) -> io::Result<(Server, Vec<SocketAddr>)> {
    let state = web::Data::new(IngestState {
        queue,
        payload: config.payload,
    });
    let path = config.path.clone();
    let max_body_bytes = config.max_body_bytes;

    let server = HttpServer::new(move || {
        let state = state.clone();
        let path = path.clone();
        App::new().configure(move |cfg| ingest::configure(cfg, state, &path, max_body_bytes))
    });

    let addr = (config.bind.as_str(), config.port);
    let (server, scheme) = if config.tls.enabled {
        (server.bind_openssl(addr, tls_acceptor(&config.tls)?)?, "https")
    } else {
        warn!("TLS disabled; accepting plaintext HTTP");
        (server.bind(addr)?, "http")
    };

    let addrs = server.addrs();
    for addr in &addrs {
        info!(%addr, scheme, path = %config.path, payload = ?config.payload, "collector listening");
    }
    Ok((server.run(), addrs))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn acceptor_loads_matching_pair() {
        let tls = TlsConfig {
            enabled: true,
            cert: fixture("cert.pem"),
            key: fixture("key.pem"),
        };
        assert!(tls_acceptor(&tls).is_ok());
    }

    #[test]
    fn missing_certificate_is_reported() {
        let tls = TlsConfig {
            enabled: true,
            cert: PathBuf::from("/nonexistent/cert.pem"),
            key: fixture("key.pem"),
        };
        let err = tls_acceptor(&tls).err().unwrap();
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }
}
