use crate::auth::principal::Principal;
use crate::auth::{AuthError, Authenticator};
use crate::config::Config;
use crate::dispatch::{Inbound, Proxy, ResolvingProxy, canonical_path};
use crate::errors::ProxyError;
use crate::evaluator::PermissionEvaluator;
use crate::factory::{ComponentFactory, register_config_routes};
use crate::forward::{Forwarder, track_aborts};
use crate::metrics_defs::{AUTH_FAILURES, REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::resolvers::{ComponentResolver, InstanceResolver};
use crate::tenants::TenantsPushProxy;
use crate::upstream::{ProxyBody, RequestBody};
use http::{Request, Response};
use hyper::body::Incoming;
use hyper::service::Service;
use routing::RegistryError;
use routing::build_registry;
use routing::components::{DEFAULT, DYNAMIC_INSTANCE_PREFIX};
use shared::http::make_json_error_response;
use shared::{counter, gauge, histogram};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Authenticates, authorizes and dispatches requests to the first proxy
/// that takes them.
pub struct Gateway {
    authenticator: Authenticator,
    evaluator: PermissionEvaluator,
    proxies: Vec<Box<dyn Proxy>>,
}

impl Gateway {
    pub fn new(
        authenticator: Authenticator,
        evaluator: PermissionEvaluator,
        proxies: Vec<Box<dyn Proxy>>,
    ) -> Self {
        Self {
            authenticator,
            evaluator,
            proxies,
        }
    }

    /// Proxies are asked in this order: tenant split pushes, dynamic
    /// instances, then components.
    pub fn from_config(config: &Config) -> Result<Self, ProxyError> {
        let mut registry = build_registry()?;
        register_config_routes(&mut registry, &config.components)?;

        let instance_enabled = config.instance.enabled;
        let evaluator = if instance_enabled {
            PermissionEvaluator::with_prefix(&registry, DYNAMIC_INSTANCE_PREFIX)
                .map_err(RegistryError::from)?
        } else {
            PermissionEvaluator::new(&registry)
        };
        let authenticator = Authenticator::from_config(&config.auth, instance_enabled)
            .map_err(RegistryError::from)?;

        let forwarder = Forwarder::new(config.send_user_header, config.proxy_logging);
        let factory = ComponentFactory::from_config(Arc::new(registry), &config.components)?;

        let mut proxies: Vec<Box<dyn Proxy>> = Vec::new();
        if config.tenant.enabled {
            proxies.push(Box::new(TenantsPushProxy::from_config(
                &config.tenant,
                &config.components,
                forwarder.clone(),
            )?));
        }
        if instance_enabled {
            let resolver = InstanceResolver::new(config.instance.clone())?;
            proxies.push(Box::new(ResolvingProxy::new(resolver, forwarder.clone())));
        }
        proxies.push(Box::new(ResolvingProxy::new(
            ComponentResolver::new(Arc::new(factory)),
            forwarder,
        )));

        tracing::info!(
            proxies = ?proxies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "gateway configured"
        );
        Ok(Self::new(authenticator, evaluator, proxies))
    }

    pub async fn handle(&self, request: Request<RequestBody>) -> Response<ProxyBody> {
        let (_, response) = self.route(request).await;
        response
    }

    /// Returns the name of the proxy that took the request next to the
    /// response.
    async fn route(&self, request: Request<RequestBody>) -> (&'static str, Response<ProxyBody>) {
        let raw_path = request.uri().path().to_owned();
        let path = match canonical_path(&raw_path) {
            Ok(path) => path,
            Err(e) => return ("none", error_response(&e)),
        };

        let principal = match self.authorize(&request, &path) {
            Ok(principal) => principal,
            Err(e) => {
                counter!(AUTH_FAILURES, "reason" => e.reason()).increment(1);
                tracing::debug!(path = %path, error = %e, "request rejected");
                return ("auth", make_json_error_response(e.status(), e.message()));
            }
        };

        let inbound = Inbound {
            method: request.method(),
            path: &path,
            raw_path: &raw_path,
            headers: request.headers(),
        };
        let Some(proxy) = self.proxies.iter().find(|p| p.handles(&inbound)) else {
            return ("none", error_response(&ProxyError::NoUpstream(DEFAULT.to_owned())));
        };

        let handler = proxy.name();
        match proxy.proxy(request, &path, &principal).await {
            Ok(response) => (handler, response),
            Err(e) => (handler, error_response(&e)),
        }
    }

    fn authorize<B>(&self, request: &Request<B>, path: &str) -> Result<Principal, AuthError> {
        if self.authenticator.is_public(path) {
            return Ok(Principal::anonymous());
        }

        let principal = self.authenticator.authenticate(request.headers())?;
        if !self.evaluator.evaluate(request.method(), path, &principal) {
            tracing::debug!(
                method = %request.method(),
                path,
                principal = principal.name(),
                "access denied"
            );
            return Err(AuthError::AccessDenied);
        }
        Ok(principal)
    }
}

fn error_response(error: &ProxyError) -> Response<ProxyBody> {
    let status = error.status();
    if status.is_server_error() {
        tracing::error!(error = %error, "request failed");
    } else {
        tracing::debug!(error = %error, "request failed");
    }

    match error {
        ProxyError::Auth(e) => make_json_error_response(status, e.message()),
        e => make_json_error_response(status, &e.to_string()),
    }
}

struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

/// hyper service in front of a [`Gateway`].
#[derive(Clone)]
pub struct GatewayService {
    gateway: Arc<Gateway>,
}

impl GatewayService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<ProxyBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.gateway.clone();

        Box::pin(async move {
            let _inflight = InflightGuard::new();
            let start = Instant::now();

            let (mut parts, body) = req.into_parts();
            let (body, abort) = track_aborts(body);
            parts.extensions.insert(abort);
            // fires when hyper drops this future, e.g. on a reset stream
            let cancel = CancellationToken::new();
            parts.extensions.insert(cancel.clone());
            let _cancel_on_drop = cancel.drop_guard();

            let (handler, response) = gateway.route(Request::from_parts(parts, body)).await;
            histogram!(
                REQUEST_DURATION,
                "status" => response.status().as_u16().to_string(),
                "handler" => handler
            )
            .record(start.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}
