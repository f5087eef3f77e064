use std::fs::File;
use std::io::{BufRead, BufReader};

use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {0}: {1}")]
    Parse(&'static str, std::io::Error),

    #[error("no private key found")]
    MissingKey,

    #[error("no certificate found")]
    MissingCert,

    #[error("bad certificate/key: {0}")]
    Rustls(#[from] rustls::Error),
}

fn open(path: &str) -> Result<BufReader<File>, TlsError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsError::Open {
        path: path.to_string(),
        source,
    })
}

/// Build a server config from PEM readers
pub fn init_rustls_config(
    cert_reader: &mut dyn BufRead,
    key_reader: &mut dyn BufRead,
) -> Result<ServerConfig, TlsError> {
    let cert_chain_der: Vec<CertificateDer<'static>> = certs(cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Parse("certificate chain", e))?;
    if cert_chain_der.is_empty() {
        return Err(TlsError::MissingCert);
    }

    let key = private_key(key_reader)
        .map_err(|e| TlsError::Parse("private key", e))?
        .ok_or(TlsError::MissingKey)?;

    Ok(ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain_der, key)?)
}

pub fn load(cert_path: &str, key_path: &str) -> Result<ServerConfig, TlsError> {
    init_rustls_config(&mut open(cert_path)?, &mut open(key_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pem_is_rejected() {
        let mut cert: &[u8] = b"";
        let mut key: &[u8] = b"";
        assert!(matches!(
            init_rustls_config(&mut cert, &mut key),
            Err(TlsError::MissingCert)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load("/nonexistent/cert.pem", "/nonexistent/key.pem"),
            Err(TlsError::Open { .. })
        ));
    }
}
