use crate::errors::CompileError;
use crate::route::Route;
use http::{Method, Request};

/// Scope predicates of an authenticated identity.
///
/// Both predicates hold for an empty scope list.
pub trait ScopeMatcher {
    /// Holds every scope.
    fn has_scopes(&self, scopes: &[&str]) -> bool;
    /// Holds at least one scope.
    fn has_any_scope(&self, scopes: &[&str]) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePolicy {
    AllOf,
    AnyOf,
}

impl ScopePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopePolicy::AllOf => "all-of",
            ScopePolicy::AnyOf => "any-of",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutePermission {
    route: Route,
    scopes: Vec<&'static str>,
    policy: ScopePolicy,
}

impl RoutePermission {
    pub fn any_of(route: Route, scopes: &[&'static str]) -> Self {
        Self {
            route,
            scopes: scopes.to_vec(),
            policy: ScopePolicy::AnyOf,
        }
    }

    pub fn all_of(route: Route, scopes: &[&'static str]) -> Self {
        Self {
            route,
            scopes: scopes.to_vec(),
            policy: ScopePolicy::AllOf,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn scopes(&self) -> &[&'static str] {
        &self.scopes
    }

    pub fn policy(&self) -> ScopePolicy {
        self.policy
    }

    pub fn is_strict(&self) -> bool {
        self.policy == ScopePolicy::AllOf
    }

    pub fn matches<B>(&self, request: &Request<B>) -> bool {
        self.route.matches(request)
    }

    pub fn matches_parts(&self, method: &Method, path: &str) -> bool {
        self.route.matches_parts(method, path)
    }

    pub fn has_permission<P: ScopeMatcher + ?Sized>(&self, principal: &P) -> bool {
        if self.scopes.is_empty() {
            return true;
        }
        match self.policy {
            ScopePolicy::AllOf => principal.has_scopes(&self.scopes),
            ScopePolicy::AnyOf => principal.has_any_scope(&self.scopes),
        }
    }

    pub fn copy_with_prefix(&self, prefix: &str) -> Result<Self, CompileError> {
        Ok(Self {
            route: self.route.with_prefix(prefix)?,
            scopes: self.scopes.clone(),
            policy: self.policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Holder(Vec<&'static str>);

    impl ScopeMatcher for Holder {
        fn has_scopes(&self, scopes: &[&str]) -> bool {
            scopes.iter().all(|s| self.0.contains(s))
        }

        fn has_any_scope(&self, scopes: &[&str]) -> bool {
            scopes.is_empty() || scopes.iter().any(|s| self.0.contains(s))
        }
    }

    fn route() -> Route {
        Route::new("/purger/*", &[Method::POST]).unwrap()
    }

    #[test]
    fn test_strict_requires_all() {
        let permission = RoutePermission::all_of(route(), &["admin", "metrics:delete"]);
        assert!(!permission.has_permission(&Holder(vec!["admin"])));
        assert!(permission.has_permission(&Holder(vec!["admin", "metrics:delete"])));
    }

    #[test]
    fn test_any_of_requires_one() {
        let permission = RoutePermission::any_of(route(), &["admin", "metrics:delete"]);
        assert!(permission.has_permission(&Holder(vec!["admin"])));
        assert!(!permission.has_permission(&Holder(vec!["metrics:read"])));
    }

    #[test]
    fn test_empty_scopes_grant() {
        let permission = RoutePermission::all_of(route(), &[]);
        assert!(permission.has_permission(&Holder(vec![])));
    }

    #[test]
    fn test_copy_with_prefix_keeps_policy() {
        let permission = RoutePermission::all_of(route(), &["admin", "metrics:delete"]);
        let copy = permission.copy_with_prefix("/dynamic/*").unwrap();

        assert!(copy.is_strict());
        assert_eq!(copy.scopes(), permission.scopes());
        assert_eq!(copy.route().pattern().as_str(), "/dynamic/*/purger/*");
        assert!(copy.matches_parts(&Method::POST, "/dynamic/purger-0/purger/delete_tenant"));
        assert!(!copy.matches_parts(&Method::GET, "/dynamic/purger-0/purger/delete_tenant"));
    }
}
