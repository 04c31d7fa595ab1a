pub const ADMIN: &str = "admin";
pub const ADMIN_READ: &str = "admin:read";
pub const ALERTS_READ: &str = "alerts:read";
pub const ALERTS_WRITE: &str = "alerts:write";
pub const METRICS_DELETE: &str = "metrics:delete";
pub const METRICS_READ: &str = "metrics:read";
pub const METRICS_WRITE: &str = "metrics:write";
pub const RULES_READ: &str = "rules:read";
pub const RULES_WRITE: &str = "rules:write";

pub const ALL: &[&str] = &[
    ADMIN,
    ADMIN_READ,
    ALERTS_READ,
    ALERTS_WRITE,
    METRICS_DELETE,
    METRICS_READ,
    METRICS_WRITE,
    RULES_READ,
    RULES_WRITE,
];
