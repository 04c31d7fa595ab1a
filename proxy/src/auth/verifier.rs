use crate::auth::AuthError;
use crate::config::TokenConfig;
use std::collections::HashMap;

/// What a verified credential grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub name: String,
    pub scopes: Vec<String>,
    /// Tenants the credential may act for, `*` for any.
    pub tenants: Vec<String>,
}

/// Checks a credential presented by a client.
///
/// Signed token schemes plug in here; the gateway itself ships with a
/// static list.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Verifier backed by the tokens listed in the configuration.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Claims>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: &[TokenConfig]) -> Self {
        let tokens = tokens
            .iter()
            .map(|t| {
                let claims = Claims {
                    name: t.name.clone(),
                    scopes: t.scopes.clone(),
                    tenants: t.tenants.clone(),
                };
                (t.token.clone(), claims)
            })
            .collect();
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
