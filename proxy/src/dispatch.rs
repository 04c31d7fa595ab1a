use crate::auth::principal::Principal;
use crate::errors::ProxyError;
use crate::forward::{Forwarder, Target};
use crate::upstream::{ProxyBody, RequestBody};
use async_trait::async_trait;
use http::{HeaderMap, Method, Request, Response};
use std::borrow::Cow;

/// What a proxy gets to see when deciding whether it takes a request.
#[derive(Debug, Clone, Copy)]
pub struct Inbound<'a> {
    pub method: &'a Method,
    /// Percent-decoded path used for matching
    pub path: &'a str,
    /// Path as sent by the client
    pub raw_path: &'a str,
    pub headers: &'a HeaderMap,
}

/// Percent-decodes a request path for matching.
///
/// Paths a backend would resolve to a different location are refused: dot
/// segments (also percent-encoded, once or twice), encoded slashes and
/// backslashes. The raw path of an accepted request names the same location
/// as the decoded one.
pub fn canonical_path(raw_path: &str) -> Result<String, ProxyError> {
    let invalid = || ProxyError::InvalidPath(raw_path.to_owned());

    let lowered = raw_path.to_ascii_lowercase();
    if lowered.contains("%2f") || lowered.contains("%5c") {
        return Err(invalid());
    }

    let path = urlencoding::decode(raw_path)
        .map(Cow::into_owned)
        .map_err(|_| invalid())?;
    if path.contains('\\') || has_dot_segments(&path) {
        return Err(invalid());
    }
    Ok(path)
}

/// True when any segment is `.` or `..`, spelled literally or with `%2e`.
pub fn has_dot_segments(path: &str) -> bool {
    path.split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

/// A way of handling authorized requests. The gateway asks each proxy in
/// turn and hands the request to the first one that takes it.
#[async_trait]
pub trait Proxy: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self, inbound: &Inbound<'_>) -> bool;

    async fn proxy(
        &self,
        request: Request<RequestBody>,
        path: &str,
        principal: &Principal,
    ) -> Result<Response<ProxyBody>, ProxyError>;
}

/// Picks the target of a request.
pub trait Resolve: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self, inbound: &Inbound<'_>) -> bool;

    fn resolve(&self, method: &Method, path: &str, raw_path: &str) -> Result<Target, ProxyError>;
}

/// Resolves a target then hands the request to the forwarder.
pub struct ResolvingProxy<R> {
    resolver: R,
    forwarder: Forwarder,
}

impl<R: Resolve> ResolvingProxy<R> {
    pub fn new(resolver: R, forwarder: Forwarder) -> Self {
        Self {
            resolver,
            forwarder,
        }
    }
}

#[async_trait]
impl<R: Resolve> Proxy for ResolvingProxy<R> {
    fn name(&self) -> &'static str {
        self.resolver.name()
    }

    fn handles(&self, inbound: &Inbound<'_>) -> bool {
        self.resolver.handles(inbound)
    }

    async fn proxy(
        &self,
        request: Request<RequestBody>,
        path: &str,
        principal: &Principal,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let target = self
            .resolver
            .resolve(request.method(), path, request.uri().path())?;
        tracing::debug!(target = %target.name, path = %target.path, "resolved");
        self.forwarder.forward(&target, request, principal).await
    }
}
