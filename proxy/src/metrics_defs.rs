use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, handler.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const AUTH_FAILURES: MetricDef = MetricDef {
    name: "auth.failures",
    metric_type: MetricType::Counter,
    description: "Rejected requests. Tagged with reason.",
};

pub const TENANT_DISPATCHES: MetricDef = MetricDef {
    name: "tenant.dispatches",
    metric_type: MetricType::Counter,
    description: "Per tenant sub-requests of split pushes. Tagged with status.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    AUTH_FAILURES,
    TENANT_DISPATCHES,
];
