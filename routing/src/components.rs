//! Route catalogue of the backend components.

use crate::errors::RegistryError;
use crate::registry::Registry;
use crate::scopes::{
    ADMIN, ADMIN_READ, ALERTS_READ, ALERTS_WRITE, METRICS_DELETE, METRICS_READ, METRICS_WRITE,
    RULES_READ, RULES_WRITE,
};
use http::Method;

pub const INGESTER: &str = "ingester";
pub const DISTRIBUTOR: &str = "distributor";
pub const ADMIN_API: &str = "admin-api";
pub const QUERY_FRONTEND: &str = "query-frontend";
pub const STORE_GATEWAY: &str = "store-gateway";
pub const RULER: &str = "ruler";
pub const QUERIER: &str = "querier";
pub const COMPACTOR: &str = "compactor";
pub const ALERT_MANAGER: &str = "alert-manager";
pub const PURGER: &str = "purger";
pub const INSTANCE: &str = "instance";
pub const DEFAULT: &str = "default";

/// Prefix under which every permission is duplicated for the instance proxy.
pub const DYNAMIC_INSTANCE_PREFIX: &str = "/dynamic/*";

const QUERY_API: &[&str] = &[
    "query",
    "query_range",
    "query_exemplars",
    "series",
    "labels",
    "label/{name}/values",
    "metadata",
    "read",
    "cardinality/label_names",
    "cardinality/label_values",
];

/// Builds the full routing table. Fails only when an entry does not compile.
pub fn build_registry() -> Result<Registry, RegistryError> {
    let mut r = Registry::new();

    r.register(ADMIN_API, "/admin/api/**", &[Method::GET], &[ADMIN_READ, ADMIN])?;
    r.register(ADMIN_API, "/admin/api/**", &[Method::POST, Method::PUT], &[ADMIN_READ, ADMIN])?;

    for pattern in [
        "/node/api/**",
        "/",
        "/config",
        "/runtime_config",
        "/services",
        "/ready",
        "/metrics",
        "/debug/*",
    ] {
        r.register_all(INSTANCE, pattern, &[ADMIN, ADMIN_READ])?;
    }

    r.register(DISTRIBUTOR, "/api/v1/push", &[Method::POST], &[METRICS_WRITE])?;
    r.register(DISTRIBUTOR, "/api/prom/push", &[Method::POST], &[METRICS_WRITE])?;
    r.register_all(DISTRIBUTOR, "/distributor/**", &[ADMIN, ADMIN_READ])?;

    r.register_all(INGESTER, "/ingester/flush", &[ADMIN])?;
    r.register_all(INGESTER, "/ingester/shutdown", &[ADMIN])?;
    r.register(INGESTER, "/ingester/ring", &[Method::GET], &[ADMIN, ADMIN_READ])?;

    for endpoint in QUERY_API {
        let pattern = format!("/{{promPrefix}}/api/v1/{endpoint}");
        r.register_all(QUERY_FRONTEND, &pattern, &[METRICS_READ])?;
    }
    r.register(
        QUERY_FRONTEND,
        "/{promPrefix}/api/v1/status/buildinfo",
        &[Method::GET],
        &[METRICS_READ],
    )?;

    r.register(QUERIER, "/api/v1/user_stats", &[Method::GET], &[METRICS_READ])?;

    r.register(STORE_GATEWAY, "/store-gateway/**", &[Method::GET], &[ADMIN_READ, ADMIN])?;

    r.register_all(RULER, "/ruler/*", &[ADMIN, ADMIN_READ])?;
    r.register(RULER, "/{promPrefix}/api/v1/rules", &[Method::GET], &[RULES_READ])?;
    r.register(RULER, "/{promPrefix}/api/v1/alerts", &[Method::GET], &[RULES_READ])?;
    r.register(RULER, "/{promPrefix}/config/v1/rules**", &[Method::GET], &[RULES_READ])?;
    r.register(
        RULER,
        "/{promPrefix}/config/v1/rules**",
        &[Method::POST, Method::DELETE],
        &[RULES_WRITE],
    )?;
    r.register(RULER, "/api/v1/rules**", &[Method::GET], &[RULES_READ])?;
    r.register(
        RULER,
        "/api/v1/rules**",
        &[Method::POST, Method::DELETE],
        &[RULES_WRITE],
    )?;
    r.register_rewrite(
        RULER,
        "/api/v1/rules**",
        &[],
        "/api/v1/rules(.*)",
        "/prometheus/config/v1/rules$1",
    )?;

    r.register(COMPACTOR, "/compactor/*", &[Method::GET], &[ADMIN, ADMIN_READ])?;

    r.register(ALERT_MANAGER, "/multitenant_alertmanager/*", &[Method::GET], &[ADMIN_READ])?;
    r.register(
        ALERT_MANAGER,
        "/multitenant_alertmanager/*",
        &[Method::POST],
        &[ADMIN_READ, ADMIN],
    )?;
    r.register(ALERT_MANAGER, "/api/v1/alerts", &[Method::GET], &[ALERTS_READ])?;
    r.register(
        ALERT_MANAGER,
        "/api/v1/alerts",
        &[Method::POST, Method::DELETE],
        &[ALERTS_WRITE],
    )?;
    r.register(ALERT_MANAGER, "/alertmanager/**", &[Method::POST], &[ALERTS_WRITE])?;
    r.register(ALERT_MANAGER, "/alertmanager/**", &[Method::GET], &[ALERTS_READ])?;

    r.register(PURGER, "/purger/*", &[Method::GET], &[ADMIN_READ, ADMIN])?;
    r.register_strict(PURGER, "/purger/*", &[Method::POST], &[ADMIN, METRICS_DELETE])?;

    r.register_link(DISTRIBUTOR, "Distributor ring status", "/distributor/ring");
    r.register_link(DISTRIBUTOR, "HA tracker status", "/distributor/ha_tracker");
    r.register_link(INGESTER, "Ingester ring status", "/ingester/ring");
    r.register_dangerous_link(INGESTER, "Trigger a flush of data", "/ingester/flush");
    r.register_dangerous_link(INGESTER, "Trigger ingester shutdown", "/ingester/shutdown");
    r.register_link(STORE_GATEWAY, "Store-gateway ring status", "/store-gateway/ring");
    r.register_link(STORE_GATEWAY, "Store-gateway tenants", "/store-gateway/tenants");
    r.register_link(RULER, "Ruler ring status", "/ruler/ring");
    r.register_link(COMPACTOR, "Compactor ring status", "/compactor/ring");
    r.register_link(
        ALERT_MANAGER,
        "Alertmanager status",
        "/multitenant_alertmanager/status",
    );
    r.register_link(INSTANCE, "Runtime configuration", "/runtime_config");
    r.register_link(INSTANCE, "Services status", "/services");

    tracing::debug!(
        permissions = r.all_permissions().len(),
        "routing table built"
    );
    Ok(r)
}
