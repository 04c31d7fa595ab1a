use crate::auth::principal::Principal;
use crate::dispatch::has_dot_segments;
use crate::errors::ProxyError;
use crate::upstream::{ProxyBody, RequestBody, Upstream};
use http::header::{
    CONTENT_LENGTH, HOST, HeaderName, HeaderValue, ORIGIN, REFERER, SET_COOKIE, USER_AGENT,
};
use http::request::Parts;
use http::{HeaderMap, Request, Response, StatusCode, Uri, Version};
use http_body_util::BodyExt;
use hyper::body::{Body, Frame, Incoming, SizeHint};
use shared::http::{add_via_header, filter_hop_by_hop, make_json_error_response};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::time::timeout;
use url::Url;

pub const ORG_ID_HEADER: HeaderName = HeaderName::from_static("x-scope-orgid");
pub const USER_HEADER: HeaderName = HeaderName::from_static("x-scope-user");

const PROXY_USER_AGENT: &str = "Gateway/proxy";
const MASKED_UNAUTHORIZED: &str = "Authentication to data source failed";

/// Where a request goes.
#[derive(Clone, Debug)]
pub struct Target {
    /// Component or instance name, used in errors and logs
    pub name: String,
    pub base: Url,
    /// Path appended to the base url
    pub path: String,
    pub upstream: Arc<Upstream>,
}

/// Set once the client stopped sending the request body.
#[derive(Clone, Debug, Default)]
pub struct ClientAbort(Arc<AtomicBool>);

impl ClientAbort {
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn mark(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Inbound body that records read errors in a [`ClientAbort`].
pub struct AbortTracking<B> {
    inner: B,
    abort: ClientAbort,
}

impl<B> Body for AbortTracking<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        if let Poll::Ready(Some(Err(_))) = &polled {
            self.abort.mark();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Boxes an inbound body, returning the flag its read errors end up in.
pub fn track_aborts(body: Incoming) -> (RequestBody, ClientAbort) {
    let abort = ClientAbort::default();
    let tracked = AbortTracking {
        inner: body,
        abort: abort.clone(),
    };
    (tracked.boxed(), abort)
}

/// Sends requests to backends with the gateway's header hygiene and error
/// mapping.
#[derive(Clone, Debug, Default)]
pub struct Forwarder {
    send_user_header: bool,
    proxy_logging: bool,
}

impl Forwarder {
    pub fn new(send_user_header: bool, proxy_logging: bool) -> Self {
        Self {
            send_user_header,
            proxy_logging,
        }
    }

    /// Forwards a client request on behalf of `principal` and streams the
    /// response back.
    pub async fn forward(
        &self,
        target: &Target,
        request: Request<RequestBody>,
        principal: &Principal,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        self.apply_identity(&mut parts.headers, principal);

        let method = parts.method.clone();
        let response = self.send(target, Request::from_parts(parts, body)).await?;

        if self.proxy_logging {
            tracing::info!(
                %method,
                target = %target.name,
                path = %target.path,
                status = response.status().as_u16(),
                "proxied request"
            );
        }

        if response.status() == StatusCode::UNAUTHORIZED && target.upstream.mask_unauthorized() {
            tracing::warn!(target = %target.name, "upstream rejected credentials");
            return Ok(make_json_error_response(
                StatusCode::BAD_REQUEST,
                MASKED_UNAUTHORIZED,
            ));
        }

        Ok(response)
    }

    /// Replaces client supplied identity headers with the principal's.
    pub fn apply_identity(&self, headers: &mut HeaderMap, principal: &Principal) {
        for name in [ORIGIN, REFERER, SET_COOKIE, USER_HEADER] {
            headers.remove(name);
        }

        match principal
            .org_id()
            .and_then(|org_id| HeaderValue::from_str(&org_id).ok())
        {
            Some(value) => {
                headers.insert(ORG_ID_HEADER, value);
            }
            None => {
                headers.remove(ORG_ID_HEADER);
            }
        }

        if self.send_user_header
            && !principal.name().is_empty()
            && let Ok(value) = HeaderValue::from_str(principal.name())
        {
            headers.insert(USER_HEADER, value);
        }
    }

    /// Sends the request as is to the target, without touching identity
    /// headers. Only response headers are awaited under the timeout, the body
    /// streams afterwards.
    pub async fn send(
        &self,
        target: &Target,
        request: Request<RequestBody>,
    ) -> Result<Response<ProxyBody>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        let abort = parts.extensions.get::<ClientAbort>().cloned();

        parts.uri = upstream_uri(target, parts.uri.query())?;
        prepare_request_headers(&mut parts);
        parts.version = Version::HTTP_11;

        let upstream = &target.upstream;
        let request = Request::from_parts(parts, body);
        let method = request.method().clone();

        let response = match timeout(
            upstream.timeout_for(&method),
            upstream.client().request(request),
        )
        .await
        {
            Err(_) => {
                tracing::warn!(target = %target.name, %method, "upstream timeout");
                return Err(ProxyError::UpstreamTimeout(target.name.clone()));
            }
            Ok(Err(e)) => {
                if abort.is_some_and(|a| a.is_aborted()) {
                    tracing::debug!(target = %target.name, "client went away mid request");
                    return Err(ProxyError::ClientCancelled);
                }
                tracing::warn!(target = %target.name, error = %e, "upstream request failed");
                return Err(ProxyError::UpstreamRequestFailed(
                    target.name.clone(),
                    e.to_string(),
                ));
            }
            Ok(Ok(response)) => response,
        };

        let (mut parts, body) = response.into_parts();
        let version = parts.version;
        filter_hop_by_hop(&mut parts.headers, version);
        add_via_header(&mut parts.headers, version);
        parts.headers.remove(SET_COOKIE);

        Ok(Response::from_parts(parts, body.boxed()))
    }
}

fn prepare_request_headers(parts: &mut Parts) {
    let version = parts.version;
    filter_hop_by_hop(&mut parts.headers, version);
    add_via_header(&mut parts.headers, version);
    // hyper derives Host from the upstream uri
    parts.headers.remove(HOST);
    parts
        .headers
        .insert(USER_AGENT, HeaderValue::from_static(PROXY_USER_AGENT));
}

/// Joins the target path onto the base url path and keeps the query.
///
/// Paths with dot segments are refused, the url parser would resolve them.
fn upstream_uri(target: &Target, query: Option<&str>) -> Result<Uri, ProxyError> {
    if has_dot_segments(&target.path) {
        return Err(ProxyError::InvalidPath(target.path.clone()));
    }

    let mut url = target.base.clone();
    let base_path = url.path().trim_end_matches('/');
    let path = if target.path.starts_with('/') {
        format!("{base_path}{}", target.path)
    } else {
        format!("{base_path}/{}", target.path)
    };
    url.set_path(&path);
    url.set_query(query);

    url.as_str()
        .parse()
        .map_err(|e| ProxyError::Internal(format!("invalid upstream uri {url}: {e}")))
}

/// Drops a stale length before a body is replaced.
pub fn reset_content_length(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamOptions;
    use crate::testutils::{body_of, full_request_body, start_upstream};
    use std::time::Duration;

    fn target(base: &str, path: &str, options: UpstreamOptions) -> Target {
        Target {
            name: "distributor".to_owned(),
            base: Url::parse(base).unwrap(),
            path: path.to_owned(),
            upstream: Arc::new(Upstream::new("distributor", &options).unwrap()),
        }
    }

    #[test]
    fn test_upstream_uri() {
        let t = target("http://mimir:8080", "/distributor/ring", UpstreamOptions::default());
        assert_eq!(
            upstream_uri(&t, Some("a=b")).unwrap(),
            "http://mimir:8080/distributor/ring?a=b"
        );

        let t = target("http://mimir:8080/prefix/", "/x/y", UpstreamOptions::default());
        assert_eq!(upstream_uri(&t, None).unwrap(), "http://mimir:8080/prefix/x/y");

        for path in ["/rules/../../ingester/shutdown", "/rules/%2e%2E/ingester/shutdown"] {
            let t = target("http://mimir:8080/ruler", path, UpstreamOptions::default());
            assert!(matches!(
                upstream_uri(&t, None),
                Err(ProxyError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn test_identity_headers() {
        let forwarder = Forwarder::new(true, false);
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("http://evil"));
        headers.insert(REFERER, HeaderValue::from_static("http://evil/page"));
        headers.insert(SET_COOKIE, HeaderValue::from_static("a=b"));
        headers.insert(USER_HEADER, HeaderValue::from_static("forged"));
        headers.insert(ORG_ID_HEADER, HeaderValue::from_static("forged"));

        let principal = Principal::new("ops", vec!["t1".into(), "t2".into()], vec![]);
        forwarder.apply_identity(&mut headers, &principal);

        assert!(headers.get(ORIGIN).is_none());
        assert!(headers.get(REFERER).is_none());
        assert!(headers.get(SET_COOKIE).is_none());
        assert_eq!(headers.get(ORG_ID_HEADER).unwrap(), "t1|t2");
        assert_eq!(headers.get(USER_HEADER).unwrap(), "ops");

        let mut headers = HeaderMap::new();
        headers.insert(ORG_ID_HEADER, HeaderValue::from_static("forged"));
        Forwarder::new(false, false).apply_identity(&mut headers, &Principal::anonymous());
        assert!(headers.get(ORG_ID_HEADER).is_none());
        assert!(headers.get(USER_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_forward_to_echo() {
        let port = start_upstream().await;
        let t = target(
            &format!("http://127.0.0.1:{port}"),
            "/distributor/ring",
            UpstreamOptions::default(),
        );

        let request = Request::builder()
            .method("POST")
            .uri("http://gateway/ignored?x=1")
            .header("connection", "keep-alive")
            .header("x-custom", "value")
            .body(full_request_body("payload"))
            .unwrap();
        let principal = Principal::new("ops", vec!["t1".into()], vec![]);

        let response = Forwarder::default()
            .forward(&t, request, &principal)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers.get("x-echo-path").unwrap(), "/distributor/ring?x=1");
        assert_eq!(headers.get("x-custom").unwrap(), "value");
        assert_eq!(headers.get(ORG_ID_HEADER).unwrap(), "t1");
        assert_eq!(headers.get(USER_AGENT).unwrap(), PROXY_USER_AGENT);
        assert!(headers.get("via").is_some());
        assert_eq!(body_of(response).await, "payload");
    }

    #[tokio::test]
    async fn test_unauthorized_masked() {
        let port = start_upstream().await;
        let base = format!("http://127.0.0.1:{port}");
        let principal = Principal::anonymous();

        let masked = target(&base, "/status/401", UpstreamOptions::default());
        let request = Request::get("/").body(full_request_body("")).unwrap();
        let response = Forwarder::default()
            .forward(&masked, request, &principal)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_of(response).await.contains(MASKED_UNAUTHORIZED));

        let unmasked = target(
            &base,
            "/status/401",
            UpstreamOptions {
                mask_unauthorized: false,
                ..Default::default()
            },
        );
        let request = Request::get("/").body(full_request_body("")).unwrap();
        let response = Forwarder::default()
            .forward(&unmasked, request, &principal)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_transport_errors() {
        let port = start_upstream().await;
        let slow = target(
            &format!("http://127.0.0.1:{port}"),
            "/sleep",
            UpstreamOptions {
                read_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let request = Request::get("/").body(full_request_body("")).unwrap();
        let result = Forwarder::default().send(&slow, request).await;
        assert!(matches!(result, Err(ProxyError::UpstreamTimeout(_))));

        // nothing listens on port 1
        let refused = target("http://127.0.0.1:1", "/", UpstreamOptions::default());
        let request = Request::get("/").body(full_request_body("")).unwrap();
        let err = Forwarder::default().send(&refused, request).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamRequestFailed(..)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
