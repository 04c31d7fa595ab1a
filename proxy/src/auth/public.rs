use routing::components::DYNAMIC_INSTANCE_PREFIX;
use routing::{CompileError, Pattern};

const PUBLIC_PATHS: &[&str] = &["/", "/config", "/runtime_config", "/services", "/debug/*"];
const METRICS_PATH: &str = "/metrics";

/// Paths served without authentication.
#[derive(Debug, Clone)]
pub struct PublicRoutes {
    patterns: Vec<Pattern>,
}

impl PublicRoutes {
    pub fn new(required_for_metrics: bool, instance_enabled: bool) -> Result<Self, CompileError> {
        let mut paths: Vec<&str> = PUBLIC_PATHS.to_vec();
        if !required_for_metrics {
            paths.push(METRICS_PATH);
        }

        let mut patterns = Vec::with_capacity(paths.len() * 2);
        for path in paths {
            patterns.push(Pattern::compile(path)?);
            if instance_enabled {
                patterns.push(Pattern::compile(&format!("{DYNAMIC_INSTANCE_PREFIX}{path}"))?);
            }
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}
