//! HTTPS listener.
//!
//! PEM material from [`ServerConfig`](crate::ServerConfig) is turned into a
//! rustls acceptor; every accepted connection is served by hyper's HTTP/1
//! connection builder with the axum router as its service. Connections are
//! tracked so shutdown can drain them.

use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;

use crate::error::{Error, Result};

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a TLS acceptor from a PEM private key and certificate chain
///
/// With `verify_clients`, clients may present a certificate, which is then
/// verified against the same chain. Clients without one are still accepted.
pub fn build_acceptor(private_key_pem: &str, cert_chain_pem: &str, verify_clients: bool) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_chain_pem)?;
    let key = load_key(private_key_pem)?;

    let builder = rustls::ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls(format!("Unsupported protocol versions: {}", e)))?;

    let builder = if verify_clients {
        let mut roots = RootCertStore::empty();
        for cert in &certs {
            roots
                .add(cert.clone())
                .map_err(|e| Error::tls(format!("Failed to add certificate to client roots: {}", e)))?;
        }

        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider())
            .allow_unauthenticated()
            .build()
            .map_err(|e| Error::tls(format!("Failed to build client verifier: {}", e)))?;
        builder.with_client_cert_verifier(verifier)
    } else {
        builder.with_no_client_auth()
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(|e| Error::tls(format!("Invalid certificate or key: {}", e)))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem.as_bytes()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::tls(format!("Failed to parse certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::tls("No certificates found in ssl_public_cert"));
    }

    Ok(certs)
}

fn load_key(pem: &str) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut BufReader::new(pem.as_bytes()))
        .map_err(|e| Error::tls(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| Error::tls("No private key found in ssl_private_key"))
}

/// Accept TLS connections on `listener` until `shutdown` changes
///
/// Open connections are then asked to close gracefully, and the loop returns
/// once every one of them has finished.
pub(crate) async fn serve(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        let (stream, remote_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            _ = shutdown.changed() => break,
        };

        connections.spawn(serve_connection(
            stream,
            remote_addr,
            acceptor.clone(),
            router.clone(),
            shutdown.clone(),
        ));
    }

    drop(listener);
    tracing::debug!(open = connections.len(), "HTTPS listener stopped, draining connections");
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) {
    let stream = tokio::select! {
        accepted = acceptor.accept(stream) => match accepted {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!(%remote_addr, error = %e, "TLS handshake failed");
                return;
            }
        },
        _ = shutdown.changed() => return,
    };

    let service = service_fn(move |req: hyper::Request<Incoming>| router.clone().oneshot(req));
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    if let Err(e) = result {
        tracing::debug!(%remote_addr, error = %e, "HTTPS connection error");
    }
}
