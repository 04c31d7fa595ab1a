use http::Method;
use routing::components::{
    ADMIN_API, ALERT_MANAGER, COMPACTOR, DISTRIBUTOR, INGESTER, QUERY_FRONTEND, RULER,
    STORE_GATEWAY,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Placeholder substituted with the instance name in `instance.pattern`.
pub const INSTANCE_PLACEHOLDER: &str = "{instance}";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("The default component needs a url")]
    MissingDefaultUrl,

    #[error("Instance pattern {0:?} must contain {{instance}} and form a valid url")]
    InvalidInstancePattern(String),

    #[error("Tenant label cannot be empty")]
    EmptyTenantLabel,

    #[error("Unknown scope {scope:?} in route {pattern:?} of component {component}")]
    UnknownScope {
        component: &'static str,
        pattern: String,
        scope: String,
    },

    #[error("Invalid method {method:?} in route {pattern:?} of component {component}")]
    InvalidMethod {
        component: &'static str,
        pattern: String,
        method: String,
    },

    #[error("Empty token configured for {0:?}")]
    EmptyToken(String),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for proxied traffic
    pub listener: Listener,
    /// Admin listener for health and readiness
    pub admin_listener: Listener,
    /// Log every proxied request at info level
    #[serde(default)]
    pub proxy_logging: bool,
    /// Forward the principal name in `X-Scope-User`
    #[serde(default)]
    pub send_user_header: bool,
    /// Backend components
    pub components: ComponentsConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.components.validate()?;
        self.instance.validate()?;

        if self.tenant.enabled && self.tenant.tenant_label.is_empty() {
            return Err(ValidationError::EmptyTenantLabel);
        }

        for token in &self.auth.tokens {
            if token.token.is_empty() {
                return Err(ValidationError::EmptyToken(token.name.clone()));
            }
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComponentsConfig {
    /// Fallback for requests no other component claims
    pub default: ComponentProxyConfig,
    pub ingester: ComponentProxyConfig,
    pub distributor: ComponentProxyConfig,
    pub admin_api: ComponentProxyConfig,
    pub query_frontend: ComponentProxyConfig,
    pub store_gateway: ComponentProxyConfig,
    pub ruler: ComponentProxyConfig,
    pub alertmanager: ComponentProxyConfig,
    pub compactor: ComponentProxyConfig,
}

impl ComponentsConfig {
    /// Every named component, in lookup order.
    pub fn all(&self) -> [(&'static str, &ComponentProxyConfig); 8] {
        [
            (INGESTER, &self.ingester),
            (DISTRIBUTOR, &self.distributor),
            (ADMIN_API, &self.admin_api),
            (QUERY_FRONTEND, &self.query_frontend),
            (STORE_GATEWAY, &self.store_gateway),
            (RULER, &self.ruler),
            (ALERT_MANAGER, &self.alertmanager),
            (COMPACTOR, &self.compactor),
        ]
    }

    /// Components with a url, in lookup order.
    pub fn enabled(&self) -> impl Iterator<Item = (&'static str, &ComponentProxyConfig)> {
        self.all().into_iter().filter(|(_, c)| c.url.is_some())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.default.url.is_none() {
            return Err(ValidationError::MissingDefaultUrl);
        }
        for (name, component) in self.all() {
            for route in &component.routes {
                route.validate(name)?;
            }
        }
        Ok(())
    }
}

/// Per backend settings
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComponentProxyConfig {
    /// Base url. Components without one are disabled.
    pub url: Option<Url>,
    /// Keep idle connections to the backend
    pub keepalive: bool,
    /// Timeout for GET, HEAD and OPTIONS requests
    pub read_timeout_secs: u64,
    /// Timeout for every other method
    pub write_timeout_secs: u64,
    /// Only talk https to this backend
    pub tls_enabled: bool,
    /// PEM bundle with extra root certificates
    pub tls_ca_path: Option<PathBuf>,
    /// Turn backend 401 responses into 400
    pub mask_unauthorized: bool,
    /// Extra routes claimed by this component
    pub routes: Vec<RouteConfig>,
}

impl Default for ComponentProxyConfig {
    fn default() -> Self {
        Self {
            url: None,
            keepalive: true,
            read_timeout_secs: 120,
            write_timeout_secs: 30,
            tls_enabled: false,
            tls_ca_path: None,
            mask_unauthorized: true,
            routes: Vec::new(),
        }
    }
}

impl ComponentProxyConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Additional route registered for a component at startup
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RouteConfig {
    pub pattern: String,
    /// Empty means any method
    #[serde(default)]
    pub methods: Vec<String>,
    /// Scopes, one of which is required unless `restrict` is set
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Require every scope
    #[serde(default)]
    pub restrict: bool,
}

impl RouteConfig {
    pub fn parsed_methods(&self, component: &'static str) -> Result<Vec<Method>, ValidationError> {
        self.methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes()).map_err(|_| {
                    ValidationError::InvalidMethod {
                        component,
                        pattern: self.pattern.clone(),
                        method: m.clone(),
                    }
                })
            })
            .collect()
    }

    /// Maps the configured scopes onto the known scope names.
    pub fn parsed_scopes(
        &self,
        component: &'static str,
    ) -> Result<Vec<&'static str>, ValidationError> {
        self.permissions
            .iter()
            .map(|scope| {
                routing::scopes::ALL
                    .iter()
                    .copied()
                    .find(|known| *known == scope.as_str())
                    .ok_or_else(|| ValidationError::UnknownScope {
                        component,
                        pattern: self.pattern.clone(),
                        scope: scope.clone(),
                    })
            })
            .collect()
    }

    fn validate(&self, component: &'static str) -> Result<(), ValidationError> {
        self.parsed_methods(component)?;
        self.parsed_scopes(component)?;
        Ok(())
    }
}

/// Proxying to single named instances under `/dynamic/{instance}/...`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstanceConfig {
    pub enabled: bool,
    /// Target url, e.g. `http://{instance}:8080`
    pub pattern: String,
    /// Connection settings shared by every instance
    #[serde(flatten)]
    pub upstream: InstanceUpstreamConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstanceUpstreamConfig {
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for InstanceUpstreamConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 120,
            write_timeout_secs: 30,
        }
    }
}

impl InstanceConfig {
    /// Target url for one instance.
    pub fn target(&self, instance: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.pattern.replace(INSTANCE_PLACEHOLDER, instance))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }
        if !self.pattern.contains(INSTANCE_PLACEHOLDER) || self.target("instance").is_err() {
            return Err(ValidationError::InvalidInstancePattern(
                self.pattern.clone(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TenantMatchType {
    /// Split only requests flagged with `X-Scope-Tenants-Data: true`
    #[default]
    Header,
    /// Never split, forward every push unchanged
    Off,
}

/// Multi-tenant remote write splitting
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TenantConfig {
    pub enabled: bool,
    pub match_type: TenantMatchType,
    /// Label carrying the tenant of a series
    pub tenant_label: String,
    /// Answer 204 whatever the tenant dispatches return
    pub accept_all: bool,
    /// Largest accepted payload, compressed or not
    pub max_recv_msg_size: usize,
    /// Concurrent dispatches to the distributor
    pub max_conns_per_host: usize,
    /// How long a dispatch waits for a free connection slot
    pub conn_wait_timeout_ms: u64,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            match_type: TenantMatchType::Header,
            tenant_label: "__tenant__".to_owned(),
            accept_all: false,
            max_recv_msg_size: 100 << 20,
            max_conns_per_host: 128,
            conn_wait_timeout_ms: 1000,
        }
    }
}

impl TenantConfig {
    pub fn conn_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.conn_wait_timeout_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Identity comes from a trusted header, every scope granted
    Trust,
    /// Basic or bearer credentials checked against the token verifier
    #[default]
    Token,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub r#type: AuthType,
    /// Also protect `/metrics`
    pub required_for_metrics: bool,
    pub header: HeaderAuthConfig,
    pub tokens: Vec<TokenConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeaderAuthConfig {
    pub enabled: bool,
    pub header_name: String,
    /// Tenants used when the header is absent
    pub default_tenants: Vec<String>,
}

impl Default for HeaderAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "X-Scope-OrgID".to_owned(),
            default_tenants: Vec::new(),
        }
    }
}

/// Statically configured credential
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TokenConfig {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Tenants this token may act for, `*` for any
    #[serde(default)]
    pub tenants: Vec<String>,
}
