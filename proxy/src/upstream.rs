use crate::config::ComponentProxyConfig;
use crate::errors::ProxyError;
use bytes::Bytes;
use http::Method;
use http_body_util::combinators::BoxBody;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::RootCertStore;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Body of requests sent to backends.
pub type RequestBody = BoxBody<Bytes, hyper::Error>;

/// Body of every response the gateway produces.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, RequestBody>;

/// Connection settings for one backend.
#[derive(Clone, Debug)]
pub struct UpstreamOptions {
    pub keepalive: bool,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub tls_enabled: bool,
    pub tls_ca_path: Option<std::path::PathBuf>,
    pub mask_unauthorized: bool,
    /// Idle connections kept per host
    pub max_idle_per_host: usize,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        UpstreamOptions::from(&ComponentProxyConfig::default())
    }
}

impl From<&ComponentProxyConfig> for UpstreamOptions {
    fn from(config: &ComponentProxyConfig) -> Self {
        Self {
            keepalive: config.keepalive,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            tls_enabled: config.tls_enabled,
            tls_ca_path: config.tls_ca_path.clone(),
            mask_unauthorized: config.mask_unauthorized,
            max_idle_per_host: usize::MAX,
        }
    }
}

/// A backend connection pool together with the policies applied to requests
/// sent through it.
#[derive(Clone, Debug)]
pub struct Upstream {
    name: String,
    client: UpstreamClient,
    read_timeout: Duration,
    write_timeout: Duration,
    mask_unauthorized: bool,
}

impl Upstream {
    pub fn new(name: impl Into<String>, options: &UpstreamOptions) -> Result<Self, ProxyError> {
        Ok(Self {
            name: name.into(),
            client: build_client(options)?,
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
            mask_unauthorized: options.mask_unauthorized,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn mask_unauthorized(&self) -> bool {
        self.mask_unauthorized
    }

    /// Reads get the read timeout, everything else the write timeout.
    pub fn timeout_for(&self, method: &Method) -> Duration {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            self.read_timeout
        } else {
            self.write_timeout
        }
    }
}

pub fn build_client(options: &UpstreamOptions) -> Result<UpstreamClient, ProxyError> {
    let builder = match &options.tls_ca_path {
        Some(path) => {
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(tls_config(load_roots(path)?)?)
        }
        None => match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                // plain http keeps working, https fails verification
                tracing::warn!(error = %e, "no native root certificates available");
                hyper_rustls::HttpsConnectorBuilder::new()
                    .with_tls_config(tls_config(RootCertStore::empty())?)
            }
        },
    };
    let builder = if options.tls_enabled {
        builder.https_only()
    } else {
        builder.https_or_http()
    };
    let connector = builder.enable_http1().enable_http2().build();

    let idle = if options.keepalive {
        options.max_idle_per_host
    } else {
        0
    };

    Ok(Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(idle)
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_timer(TokioTimer::new())
        .build(connector))
}

fn load_roots(path: &Path) -> Result<RootCertStore, ProxyError> {
    let file = File::open(path)
        .map_err(|e| ProxyError::Tls(format!("cannot open {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProxyError::Tls(format!("error reading certs: {e}")))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(ProxyError::Tls(format!(
            "no usable certificate in {}",
            path.display()
        )));
    }
    tracing::debug!(added, ignored, path = %path.display(), "loaded root certificates");
    Ok(roots)
}

fn tls_config(roots: RootCertStore) -> Result<rustls::ClientConfig, ProxyError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ProxyError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}
