use crate::errors::ProxyError;
use bytes::Bytes;
use http::StatusCode;

/// Outcome of one tenant dispatch.
#[derive(Debug)]
pub struct TenantResult {
    pub tenant: String,
    pub outcome: Result<(StatusCode, Bytes), ProxyError>,
}

/// Folds the tenant dispatch outcomes into one response.
///
/// With `accept_all` the answer is always 204. Otherwise the highest status
/// wins together with its body, and any transport error turns the whole
/// request into a 500 listing every error. A cancelled dispatch cancels the
/// whole request.
pub fn aggregate(
    results: Vec<TenantResult>,
    accept_all: bool,
) -> Result<(StatusCode, Bytes), ProxyError> {
    if accept_all {
        return Ok((StatusCode::NO_CONTENT, Bytes::new()));
    }

    let mut best: Option<(StatusCode, Bytes)> = None;
    let mut errors = Vec::new();

    for TenantResult { tenant, outcome } in results {
        match outcome {
            Ok((status, body)) => {
                if !status.is_success() {
                    tracing::warn!(
                        tenant = %tenant,
                        status = status.as_u16(),
                        body = %String::from_utf8_lossy(&body),
                        "tenant push rejected"
                    );
                }
                if best.as_ref().is_none_or(|(code, _)| status > *code) {
                    best = Some((status, body));
                }
            }
            Err(ProxyError::ClientCancelled) => return Err(ProxyError::ClientCancelled),
            Err(e) => {
                tracing::error!(tenant = %tenant, error = %e, "send tenant data error");
                errors.push(format!("tenant {tenant:?}: {e}"));
            }
        }
    }

    if !errors.is_empty() {
        return Err(ProxyError::TenantDispatch(errors.join("; ")));
    }

    best.ok_or_else(|| ProxyError::Internal("no tenant dispatch took place".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(tenant: &str, code: u16, body: &'static str) -> TenantResult {
        TenantResult {
            tenant: tenant.to_owned(),
            outcome: Ok((StatusCode::from_u16(code).unwrap(), Bytes::from_static(body.as_bytes()))),
        }
    }

    fn failed(tenant: &str, error: ProxyError) -> TenantResult {
        TenantResult {
            tenant: tenant.to_owned(),
            outcome: Err(error),
        }
    }

    #[test]
    fn test_highest_status_wins() {
        let (status, body) =
            aggregate(vec![ok("t1", 200, "ok"), ok("t2", 429, "throttled")], false).unwrap();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, "throttled");

        // order independent
        let (status, body) =
            aggregate(vec![ok("t2", 429, "throttled"), ok("t1", 200, "ok")], false).unwrap();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, "throttled");
    }

    #[test]
    fn test_accept_all() {
        let (status, body) =
            aggregate(vec![ok("t1", 200, "ok"), ok("t2", 200, "ok")], true).unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, _) = aggregate(
            vec![failed("t1", ProxyError::UpstreamTimeout("distributor".into()))],
            true,
        )
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_transport_errors_combined() {
        let err = aggregate(
            vec![
                ok("t1", 500, "boom"),
                failed("t2", ProxyError::UpstreamTimeout("distributor".into())),
                failed(
                    "t3",
                    ProxyError::UpstreamRequestFailed("distributor".into(), "refused".into()),
                ),
            ],
            false,
        )
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = err.to_string();
        assert!(message.contains("\"t2\""));
        assert!(message.contains("refused"));
    }

    #[test]
    fn test_cancelled() {
        let err = aggregate(
            vec![ok("t1", 200, "ok"), failed("t2", ProxyError::ClientCancelled)],
            false,
        )
        .unwrap_err();
        assert_eq!(err.status().as_u16(), 499);
    }
}
