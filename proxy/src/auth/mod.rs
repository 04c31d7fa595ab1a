//! Authentication in front of the permission evaluator.
//!
//! Readers are tried in order: basic credentials, bearer credentials, then
//! the trusted header when enabled. The first reader that can process the
//! request decides.

pub mod principal;
pub mod public;
pub mod reader;
pub mod verifier;

use crate::config::{AuthConfig, AuthType};
use http::{HeaderMap, StatusCode};
use principal::{Principal, merge_tenants};
use public::PublicRoutes;
use reader::{BasicReader, BearerReader, HeaderReader, Identity, PrincipalReader};
use routing::CompileError;
use std::sync::Arc;
use verifier::{StaticTokenVerifier, TokenVerifier};

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    Missing,
    #[error("malformed {0} credentials")]
    Malformed(&'static str),
    #[error("Invalid Authentication")]
    InvalidToken,
    #[error("Access Denied")]
    AccessDenied,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::AccessDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message shown to the client.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::Missing | AuthError::Malformed(_) => "Authentication required",
            AuthError::InvalidToken => "Invalid Authentication",
            AuthError::AccessDenied => "Access Denied",
        }
    }

    /// Metric tag.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Malformed(_) => "malformed",
            AuthError::InvalidToken => "invalid",
            AuthError::AccessDenied => "denied",
        }
    }
}

pub struct Authenticator {
    public: PublicRoutes,
    readers: Vec<Box<dyn PrincipalReader>>,
    verifier: Arc<dyn TokenVerifier>,
}

impl Authenticator {
    pub fn new(
        public: PublicRoutes,
        readers: Vec<Box<dyn PrincipalReader>>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            public,
            readers,
            verifier,
        }
    }

    pub fn from_config(config: &AuthConfig, instance_enabled: bool) -> Result<Self, CompileError> {
        let public = PublicRoutes::new(config.required_for_metrics, instance_enabled)?;

        let mut readers: Vec<Box<dyn PrincipalReader>> = Vec::new();
        if config.r#type == AuthType::Token {
            readers.push(Box::new(BasicReader));
            readers.push(Box::new(BearerReader));
        }
        if config.r#type == AuthType::Trust || config.header.enabled {
            readers.push(Box::new(HeaderReader::new(
                &config.header.header_name,
                config.header.default_tenants.clone(),
            )));
        }

        let verifier = Arc::new(StaticTokenVerifier::new(&config.tokens));
        Ok(Self::new(public, readers, verifier))
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.matches(path)
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        match self.identify(headers)? {
            Identity::Trusted(principal) => Ok(principal),
            Identity::Token { token, tenants } => {
                let claims = self.verifier.verify(&token)?;
                let tenants = merge_tenants(&tenants, &claims.tenants);
                Ok(Principal::new(claims.name, tenants, claims.scopes))
            }
        }
    }

    fn identify(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        for reader in self.readers.iter().filter(|r| r.can_process(headers)) {
            match reader.read(headers) {
                Ok(Some(identity)) => return Ok(identity),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read principal");
                    return Err(e);
                }
            }
        }
        Err(AuthError::Missing)
    }
}
