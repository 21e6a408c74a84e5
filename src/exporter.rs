use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use rustls::RootCertStore;
use thiserror::Error;
use url::Url;

use crate::bulk::BulkBody;
use crate::config::{BackendConfig, Credentials};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read CA certificate {path}: {source}")]
    ReadCa {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("elasticsearch rejected bulk request: HTTP {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Posts bulk bodies to `{path}{index}/_bulk`.
#[derive(Debug, Clone)]
pub struct BulkExporter {
    client: Client,
    endpoint: Url,
    credentials: Option<Credentials>,
}

impl BulkExporter {
    pub fn new(config: &BackendConfig) -> Result<Self, TlsError> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let mut builder = Client::builder().timeout(config.timeout);
        if config.secure {
            builder = builder.use_preconfigured_tls(tls_config(config.ca.as_deref())?);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one POST. Statuses of 400 and above come back as
    /// [`ExportError::Rejected`] carrying the response body.
    pub async fn send(&self, body: BulkBody) -> Result<StatusCode, ExportError> {
        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .header(CONTENT_LENGTH, body.len());

        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }

        let resp = req.body(body.into_bytes()).send().await?;
        let status = resp.status();

        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::Rejected { status, body });
        }

        Ok(status)
    }
}

/// A configured CA replaces the trust roots; otherwise the bundled web PKI
/// roots are used.
fn tls_config(ca: Option<&Path>) -> Result<rustls::ClientConfig, TlsError> {
    let roots = match ca {
        Some(path) => load_ca(path)?,
        None => RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        },
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

fn load_ca(path: &Path) -> Result<RootCertStore, TlsError> {
    let read_err = |source| TlsError::ReadCa {
        path: path.to_owned(),
        source,
    };

    let pem = std::fs::read(path).map_err(read_err)?;
    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
        roots.add(cert.map_err(read_err)?)?;
    }

    if roots.is_empty() {
        return Err(TlsError::NoCertificates(path.to_owned()));
    }
    Ok(roots)
}
