use http::Method;
use routing::{CompileError, Registry, RoutePermission, ScopeMatcher};

/// Decides whether a principal may perform a request.
///
/// The first permission whose route matches decides. Requests matching no
/// permission are denied.
#[derive(Debug, Clone)]
pub struct PermissionEvaluator {
    permissions: Vec<RoutePermission>,
}

impl PermissionEvaluator {
    pub fn new(registry: &Registry) -> Self {
        Self {
            permissions: registry.all_permissions().to_vec(),
        }
    }

    /// Every permission is also checked under `prefix`, the prefixed copies
    /// first.
    pub fn with_prefix(registry: &Registry, prefix: &str) -> Result<Self, CompileError> {
        let mut permissions = registry
            .all_permissions()
            .iter()
            .map(|p| p.copy_with_prefix(prefix))
            .collect::<Result<Vec<_>, _>>()?;
        permissions.extend_from_slice(registry.all_permissions());
        Ok(Self { permissions })
    }

    pub fn evaluate<P: ScopeMatcher + ?Sized>(
        &self,
        method: &Method,
        path: &str,
        principal: &P,
    ) -> bool {
        match self
            .permissions
            .iter()
            .find(|p| p.matches_parts(method, path))
        {
            Some(permission) => permission.has_permission(principal),
            None => {
                tracing::debug!(%method, path, "no permission registered");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Principal;
    use routing::build_registry;
    use routing::components::DYNAMIC_INSTANCE_PREFIX;

    fn holding(scopes: &[&str]) -> Principal {
        Principal::new(
            "test",
            vec!["t1".into()],
            scopes.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_fail_closed() {
        let evaluator = PermissionEvaluator::new(&build_registry().unwrap());
        let trusted = Principal::trusted(vec![]);
        assert!(!evaluator.evaluate(&Method::GET, "/not/registered", &trusted));
        assert!(!evaluator.evaluate(&Method::GET, "/api/v1/push", &trusted));
    }

    #[test]
    fn test_distributor_ring() {
        let evaluator = PermissionEvaluator::new(&build_registry().unwrap());
        assert!(!evaluator.evaluate(
            &Method::GET,
            "/distributor/ring",
            &holding(&["metrics:write"])
        ));
        assert!(evaluator.evaluate(&Method::GET, "/distributor/ring", &holding(&["admin:read"])));
    }

    #[test]
    fn test_push_and_query() {
        let evaluator = PermissionEvaluator::new(&build_registry().unwrap());
        let writer = holding(&["metrics:write"]);
        assert!(evaluator.evaluate(&Method::POST, "/api/v1/push", &writer));
        assert!(!evaluator.evaluate(&Method::GET, "/prometheus/api/v1/query", &writer));
        assert!(evaluator.evaluate(
            &Method::GET,
            "/prometheus/api/v1/query",
            &holding(&["metrics:read"])
        ));
    }

    #[test]
    fn test_prefixed() {
        let registry = build_registry().unwrap();
        let evaluator = PermissionEvaluator::with_prefix(&registry, DYNAMIC_INSTANCE_PREFIX).unwrap();
        let admin = holding(&["admin"]);

        assert!(evaluator.evaluate(&Method::POST, "/dynamic/ingester-1/ingester/flush", &admin));
        assert!(evaluator.evaluate(&Method::POST, "/ingester/flush", &admin));
        assert!(!evaluator.evaluate(
            &Method::POST,
            "/dynamic/ingester-1/ingester/flush",
            &holding(&["admin:read"])
        ));
        assert!(!evaluator.evaluate(&Method::GET, "/dynamic/ingester-1/unknown", &admin));
    }
}
