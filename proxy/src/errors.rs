use crate::auth::AuthError;
use crate::config::ValidationError;
use crate::tenants::codec::DecodeError;
use hyper::StatusCode;
use routing::RegistryError;
use shared::http::STATUS_CLIENT_CLOSED_REQUEST;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("client closed request")]
    ClientCancelled,

    #[error("upstream timeout for {0}")]
    UpstreamTimeout(String),

    #[error("upstream request failed for {0}: {1}")]
    UpstreamRequestFailed(String, String),

    #[error("failed to decode write request: {0}")]
    Decode(#[from] DecodeError),

    #[error("tenant dispatch failed: {0}")]
    TenantDispatch(String),

    #[error("no upstream for {0}")]
    NoUpstream(String),

    #[error("invalid instance {0:?}")]
    InvalidInstance(String),

    #[error("invalid request path {0:?}")]
    InvalidPath(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid routing table: {0}")]
    Registry(#[from] RegistryError),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Status code reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::ClientCancelled => StatusCode::from_u16(STATUS_CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::BAD_REQUEST),
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamRequestFailed(..) | ProxyError::NoUpstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::Decode(_)
            | ProxyError::InvalidInstance(_)
            | ProxyError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            ProxyError::Auth(e) => e.status(),
            ProxyError::TenantDispatch(_)
            | ProxyError::Internal(_)
            | ProxyError::Validation(_)
            | ProxyError::Registry(_)
            | ProxyError::Tls(_)
            | ProxyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::ClientCancelled.status().as_u16(), 499);
        assert_eq!(
            ProxyError::UpstreamTimeout("distributor".into()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::UpstreamRequestFailed("distributor".into(), "refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::Decode(DecodeError::TooLarge { size: 2, max: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::Auth(AuthError::AccessDenied).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ProxyError::Auth(AuthError::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::InvalidPath("/a/../b".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::TenantDispatch("a; b".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
