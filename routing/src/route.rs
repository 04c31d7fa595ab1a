use crate::errors::CompileError;
use crate::pattern::Pattern;
use http::{Method, Request};

/// A pattern bound to a set of methods. An empty method set matches any
/// method.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: Pattern,
    methods: Vec<Method>,
    auth_required: bool,
    compression_allowed: bool,
}

impl Route {
    pub fn new(pattern: &str, methods: &[Method]) -> Result<Self, CompileError> {
        Ok(Self {
            pattern: Pattern::compile(pattern)?,
            methods: methods.to_vec(),
            auth_required: true,
            compression_allowed: false,
        })
    }

    pub fn any_method(pattern: &str) -> Result<Self, CompileError> {
        Self::new(pattern, &[])
    }

    pub fn with_auth(mut self, auth_required: bool) -> Self {
        self.auth_required = auth_required;
        self
    }

    pub fn with_compression(mut self, compression_allowed: bool) -> Self {
        self.compression_allowed = compression_allowed;
        self
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn auth_required(&self) -> bool {
        self.auth_required
    }

    pub fn compression_allowed(&self) -> bool {
        self.compression_allowed
    }

    /// Matches on the request path only, the query string is ignored.
    pub fn matches<B>(&self, request: &Request<B>) -> bool {
        self.matches_parts(request.method(), request.uri().path())
    }

    pub fn matches_parts(&self, method: &Method, path: &str) -> bool {
        if !self.methods.is_empty() && !self.methods.contains(method) {
            return false;
        }
        self.pattern.matches(path)
    }

    /// Same route shifted under `prefix`. Methods and flags are kept.
    pub fn with_prefix(&self, prefix: &str) -> Result<Self, CompileError> {
        Ok(Self {
            pattern: Pattern::compile(&format!("{prefix}{}", self.pattern.as_str()))?,
            methods: self.methods.clone(),
            auth_required: self.auth_required,
            compression_allowed: self.compression_allowed,
        })
    }

    /// Comma separated methods, `*` for any.
    pub fn methods_label(&self) -> String {
        if self.methods.is_empty() {
            return "*".to_owned();
        }
        self.methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}
