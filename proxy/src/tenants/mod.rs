//! Splitting of multi-tenant remote write requests.
//!
//! A push flagged with `X-Scope-Tenants-Data: true` carries series of many
//! tenants, told apart by a label. The payload is decoded, split per tenant
//! and every part is pushed to the distributor on behalf of its tenant.
//! Unflagged pushes are forwarded unchanged.
//!
//! A [`CancellationToken`] in the request extensions stops the tenant
//! dispatches of a split push still running once it fires.

pub mod codec;
pub mod executor;
pub mod merge;
pub mod protocol;
pub mod splitter;

use crate::auth::principal::Principal;
use crate::config::{ComponentsConfig, TenantConfig, TenantMatchType};
use crate::dispatch::{Inbound, Proxy};
use crate::errors::ProxyError;
use crate::forward::{Forwarder, Target};
use crate::upstream::{ProxyBody, RequestBody, Upstream, UpstreamOptions};
use async_trait::async_trait;
use bytes::Bytes;
use codec::DecodeError;
use executor::{ParentRequest, TenantExecutor};
use http::{HeaderMap, Method, Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use routing::components::{DEFAULT, DISTRIBUTOR};
use shared::http::full_body;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TENANTS_DATA_HEADER: &str = "x-scope-tenants-data";
const TENANTS_DATA_VALUE: &str = "true";

const PUSH_PATHS: [&str; 2] = ["/api/v1/push", "/api/prom/push"];

pub struct TenantsPushProxy {
    config: TenantConfig,
    forwarder: Forwarder,
    executor: TenantExecutor,
    distributor: Target,
}

impl TenantsPushProxy {
    pub fn new(config: TenantConfig, forwarder: Forwarder, distributor: Target) -> Self {
        let executor = TenantExecutor::new(
            forwarder.clone(),
            distributor.clone(),
            config.max_conns_per_host,
            config.conn_wait_timeout(),
        );
        Self {
            config,
            forwarder,
            executor,
            distributor,
        }
    }

    /// Pushes go to the distributor, or to the default component when no
    /// distributor is configured.
    pub fn from_config(
        config: &TenantConfig,
        components: &ComponentsConfig,
        forwarder: Forwarder,
    ) -> Result<Self, ProxyError> {
        let (name, component) = if components.distributor.url.is_some() {
            (DISTRIBUTOR, &components.distributor)
        } else {
            (DEFAULT, &components.default)
        };
        let base = component
            .url
            .clone()
            .ok_or_else(|| ProxyError::NoUpstream(name.to_owned()))?;

        let options = UpstreamOptions {
            max_idle_per_host: config.max_conns_per_host,
            ..UpstreamOptions::from(component)
        };
        let distributor = Target {
            name: name.to_owned(),
            base,
            path: String::new(),
            upstream: Arc::new(Upstream::new(name, &options)?),
        };
        Ok(Self::new(config.clone(), forwarder, distributor))
    }

    fn is_tenants_data(&self, headers: &HeaderMap) -> bool {
        if self.config.match_type != TenantMatchType::Header {
            return false;
        }
        headers
            .get(TENANTS_DATA_HEADER)
            .is_some_and(|v| v.as_bytes() == TENANTS_DATA_VALUE.as_bytes())
    }

    fn target(&self, raw_path: &str) -> Target {
        Target {
            path: raw_path.to_owned(),
            ..self.distributor.clone()
        }
    }

    async fn split(
        &self,
        request: Request<RequestBody>,
        principal: &Principal,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        let max = self.config.max_recv_msg_size;

        let payload = read_body(body, max).await?;
        let write_request = codec::decode(&payload, max).inspect_err(|e| {
            tracing::error!(error = %e, "failed to decode tenants data");
        })?;

        self.forwarder.apply_identity(&mut parts.headers, principal);
        let groups = splitter::split_by_tenant(write_request, &self.config.tenant_label);
        tracing::debug!(tenants = groups.len(), "split write request");

        let cancel = parts
            .extensions
            .get::<CancellationToken>()
            .cloned()
            .unwrap_or_default();
        let parent = ParentRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
        };
        let results = self.executor.dispatch(&parent, groups, &cancel).await;
        let (status, body) = merge::aggregate(results, self.config.accept_all)?;

        let mut response = Response::new(full_body(body));
        *response.status_mut() = status;
        Ok(response)
    }
}

async fn read_body(body: RequestBody, max: usize) -> Result<Bytes, ProxyError> {
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(DecodeError::BodyTooLarge { max }.into()),
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            Err(ProxyError::ClientCancelled)
        }
    }
}

#[async_trait]
impl Proxy for TenantsPushProxy {
    fn name(&self) -> &'static str {
        "tenants"
    }

    fn handles(&self, inbound: &Inbound<'_>) -> bool {
        self.config.enabled
            && *inbound.method == Method::POST
            && PUSH_PATHS.contains(&inbound.path)
    }

    async fn proxy(
        &self,
        request: Request<RequestBody>,
        _path: &str,
        principal: &Principal,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let target = self.target(request.uri().path());
        if !self.is_tenants_data(request.headers()) {
            return self.forwarder.forward(&target, request, principal).await;
        }
        self.split(request, principal).await
    }
}
