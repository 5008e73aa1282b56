//! TLS acceptor construction from configured PEM material.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::setup::Port;

/// Error type for TLS setup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no private key found in {0}")]
    MissingKey(PathBuf),

    #[error("invalid TLS material: {0}")]
    Rustls(#[from] tokio_rustls::rustls::Error),
}

/// Build the acceptor for a secure port.
///
/// Returns `None` when the port either does not expect TLS or carries no
/// key/certificate paths; the caller then serves plain TCP.
pub fn build_acceptor(port: &Port) -> Result<Option<TlsAcceptor>, TlsError> {
    if !port.secure() {
        return Ok(None);
    }
    let (Some(key_path), Some(cert_path)) = (&port.ssl_key, &port.ssl_cert) else {
        tracing::warn!(
            port = %port.name,
            "secure port has no TLS material configured; serving plain TCP"
        );
        return Ok(None);
    };

    let mut chain = load_certs(cert_path)?;
    if let Some(chain_path) = &port.ssl_chain {
        chain.extend(load_certs(chain_path)?);
    }
    let key = load_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)?;

    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::MissingKey(path.to_path_buf()))
}
