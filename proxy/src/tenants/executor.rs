use crate::errors::ProxyError;
use crate::forward::{Forwarder, ORG_ID_HEADER, Target, reset_content_length};
use crate::metrics_defs::TENANT_DISPATCHES;
use crate::tenants::codec;
use crate::tenants::merge::TenantResult;
use crate::tenants::protocol::WriteRequest;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::BodyExt;
use indexmap::IndexMap;
use shared::counter;
use shared::http::full_body;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Sends the per tenant sub-requests of a split push concurrently.
///
/// Concurrency towards the distributor is capped by a shared pool of
/// permits. A dispatch that cannot get one within the wait timeout fails
/// like a refused connection would.
#[derive(Clone, Debug)]
pub struct TenantExecutor {
    forwarder: Forwarder,
    target: Target,
    permits: Arc<Semaphore>,
    permit_wait: Duration,
}

/// Parent request data every sub-request starts from.
#[derive(Clone, Debug)]
pub struct ParentRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl TenantExecutor {
    pub fn new(
        forwarder: Forwarder,
        target: Target,
        max_concurrent: usize,
        permit_wait: Duration,
    ) -> Self {
        Self {
            forwarder,
            target,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            permit_wait,
        }
    }

    /// Dispatches every group and waits for all of them.
    ///
    /// Once `cancel` fires the dispatches still running stop and report
    /// [`ProxyError::ClientCancelled`]. Dropping the returned future cancels
    /// them as well.
    pub async fn dispatch(
        &self,
        parent: &ParentRequest,
        groups: IndexMap<String, WriteRequest>,
        cancel: &CancellationToken,
    ) -> Vec<TenantResult> {
        let token = cancel.child_token();
        let _cancel_on_drop = token.clone().drop_guard();

        let mut join_set = JoinSet::new();
        for (tenant, request) in groups {
            let executor = self.clone();
            let parent = parent.clone();
            let token = token.clone();
            let span = tracing::info_span!("tenant_dispatch", tenant = %tenant);

            join_set.spawn(
                async move {
                    let outcome = tokio::select! {
                        _ = token.cancelled() => Err(ProxyError::ClientCancelled),
                        outcome = executor.send(&parent, &tenant, &request) => outcome,
                    };
                    counter!(TENANT_DISPATCHES, "status" => status_tag(&outcome)).increment(1);
                    TenantResult { tenant, outcome }
                }
                .instrument(span),
            );
        }

        let mut results = Vec::with_capacity(join_set.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!("Task panicked: {}", e);
                    results.push(TenantResult {
                        tenant: String::new(),
                        outcome: Err(ProxyError::Internal(e.to_string())),
                    });
                }
            }
        }
        results
    }

    async fn send(
        &self,
        parent: &ParentRequest,
        tenant: &str,
        request: &WriteRequest,
    ) -> Result<(StatusCode, Bytes), ProxyError> {
        let body = codec::encode(request)
            .map_err(|e| ProxyError::Internal(format!("failed to encode write request: {e}")))?;

        let mut headers = parent.headers.clone();
        reset_content_length(&mut headers);
        if !tenant.is_empty() {
            let value = HeaderValue::from_str(tenant)
                .map_err(|_| ProxyError::Internal(format!("invalid tenant {tenant:?}")))?;
            headers.insert(ORG_ID_HEADER, value);
        }

        let _permit = timeout(self.permit_wait, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| {
                ProxyError::UpstreamRequestFailed(
                    self.target.name.clone(),
                    "no free connection available".to_owned(),
                )
            })?
            .map_err(|e| ProxyError::Internal(e.to_string()))?;

        let mut sub_request = Request::builder()
            .method(parent.method.clone())
            .uri(parent.uri.clone())
            .body(full_body(body))
            .map_err(|e| ProxyError::Internal(format!("Failed to build request: {e}")))?;
        *sub_request.headers_mut() = headers;

        let target = Target {
            path: parent.uri.path().to_owned(),
            ..self.target.clone()
        };
        let response = self.forwarder.send(&target, sub_request).await?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ProxyError::UpstreamRequestFailed(target.name.clone(), e.to_string()))?
            .to_bytes();

        tracing::debug!(status = status.as_u16(), "tenant data sent");
        Ok((status, body))
    }
}

fn status_tag(outcome: &Result<(StatusCode, Bytes), ProxyError>) -> String {
    match outcome {
        Ok((status, _)) => status.as_u16().to_string(),
        Err(e) => e.status().as_u16().to_string(),
    }
}
