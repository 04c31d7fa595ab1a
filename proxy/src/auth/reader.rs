use crate::auth::AuthError;
use crate::auth::principal::Principal;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use http::header::AUTHORIZATION;

const BASIC_PREFIX: &str = "Basic ";
const BEARER_PREFIX: &str = "Bearer ";

/// Identity found on a request, before verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Credential still to be verified, with the tenants it asks for.
    Token { token: String, tenants: Vec<String> },
    /// Already trusted.
    Trusted(Principal),
}

/// Extracts an identity from request headers.
pub trait PrincipalReader: Send + Sync {
    fn can_process(&self, headers: &HeaderMap) -> bool;

    /// `Ok(None)` lets the next reader try.
    fn read(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError>;
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

fn strip_scheme<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

/// Splits `base64("user:secret")`.
fn decode_pair(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, secret) = decoded.split_once(':')?;
    Some((user.to_owned(), secret.to_owned()))
}

/// `Authorization: Basic`, user is the requested tenant and password the token.
#[derive(Debug, Default)]
pub struct BasicReader;

impl PrincipalReader for BasicReader {
    fn can_process(&self, headers: &HeaderMap) -> bool {
        authorization(headers).is_some_and(|v| strip_scheme(v, BASIC_PREFIX).is_some())
    }

    fn read(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let (tenant, token) = authorization(headers)
            .and_then(|v| strip_scheme(v, BASIC_PREFIX))
            .and_then(decode_pair)
            .ok_or(AuthError::Malformed("basic"))?;

        Ok(Some(Identity::Token {
            token,
            tenants: vec![tenant],
        }))
    }
}

/// `Authorization: Bearer base64("tenant:token")`.
#[derive(Debug, Default)]
pub struct BearerReader;

impl PrincipalReader for BearerReader {
    fn can_process(&self, headers: &HeaderMap) -> bool {
        authorization(headers).is_some_and(|v| strip_scheme(v, BEARER_PREFIX).is_some())
    }

    fn read(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let (tenant, token) = authorization(headers)
            .and_then(|v| strip_scheme(v, BEARER_PREFIX))
            .and_then(decode_pair)
            .ok_or(AuthError::Malformed("bearer"))?;

        Ok(Some(Identity::Token {
            token,
            tenants: vec![tenant],
        }))
    }
}

/// Takes tenants from a trusted header, falling back to fixed tenants.
#[derive(Debug)]
pub struct HeaderReader {
    header: String,
    default_tenants: Vec<String>,
}

impl HeaderReader {
    pub fn new(header: &str, default_tenants: Vec<String>) -> Self {
        Self {
            header: header.to_owned(),
            default_tenants,
        }
    }
}

impl PrincipalReader for HeaderReader {
    fn can_process(&self, headers: &HeaderMap) -> bool {
        !authorization(headers).is_some_and(|v| strip_scheme(v, BEARER_PREFIX).is_some())
    }

    fn read(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let tenants: Vec<String> = headers
            .get_all(self.header.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect();

        let tenants = if tenants.is_empty() {
            self.default_tenants.clone()
        } else {
            tenants
        };
        Ok(Some(Identity::Trusted(Principal::trusted(tenants))))
    }
}
