use crate::config::InstanceConfig;
use crate::dispatch::{Inbound, Resolve};
use crate::errors::ProxyError;
use crate::factory::ComponentFactory;
use crate::forward::Target;
use crate::upstream::{Upstream, UpstreamOptions};
use http::Method;
use routing::components::INSTANCE;
use std::sync::Arc;

const DYNAMIC_PATH_PREFIX: &str = "/dynamic/";

/// Routes to the component owning the path, applying that component's
/// first matching rewrite.
pub struct ComponentResolver {
    factory: Arc<ComponentFactory>,
}

impl ComponentResolver {
    pub fn new(factory: Arc<ComponentFactory>) -> Self {
        Self { factory }
    }
}

impl Resolve for ComponentResolver {
    fn name(&self) -> &'static str {
        "component"
    }

    fn handles(&self, _inbound: &Inbound<'_>) -> bool {
        true
    }

    fn resolve(&self, method: &Method, path: &str, raw_path: &str) -> Result<Target, ProxyError> {
        let component = self.factory.component_for(method, path);

        let rewritten = self
            .factory
            .registry()
            .group_rewrites(component.name())
            .iter()
            .find_map(|rewriter| rewriter.rewrite(method, path));
        if let Some(rewritten) = &rewritten {
            tracing::debug!(from = path, to = %rewritten, "path rewritten");
        }

        Ok(Target {
            name: component.name().to_owned(),
            base: component.base().clone(),
            path: rewritten.unwrap_or_else(|| raw_path.to_owned()),
            upstream: component.upstream().clone(),
        })
    }
}

/// Routes `/dynamic/{instance}/{path...}` to a single named instance.
pub struct InstanceResolver {
    config: InstanceConfig,
    upstream: Arc<Upstream>,
}

impl InstanceResolver {
    pub fn new(config: InstanceConfig) -> Result<Self, ProxyError> {
        let options = UpstreamOptions {
            read_timeout: std::time::Duration::from_secs(config.upstream.read_timeout_secs),
            write_timeout: std::time::Duration::from_secs(config.upstream.write_timeout_secs),
            ..Default::default()
        };
        let upstream = Arc::new(Upstream::new(INSTANCE, &options)?);
        Ok(Self { config, upstream })
    }
}

/// Splits `/dynamic/{instance}/rest` into the instance and `/rest`.
fn split_instance_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(DYNAMIC_PATH_PREFIX)?;
    let (instance, remainder) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if instance.is_empty() {
        return None;
    }
    Some((instance, remainder))
}

/// Instance names end up in a host name.
fn valid_instance(instance: &str) -> bool {
    instance
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

impl Resolve for InstanceResolver {
    fn name(&self) -> &'static str {
        INSTANCE
    }

    fn handles(&self, inbound: &Inbound<'_>) -> bool {
        self.config.enabled && split_instance_path(inbound.raw_path).is_some()
    }

    fn resolve(&self, _method: &Method, _path: &str, raw_path: &str) -> Result<Target, ProxyError> {
        let (instance, remainder) = split_instance_path(raw_path)
            .ok_or_else(|| ProxyError::InvalidInstance(raw_path.to_owned()))?;
        if !valid_instance(instance) {
            return Err(ProxyError::InvalidInstance(instance.to_owned()));
        }

        let base = self
            .config
            .target(instance)
            .map_err(|_| ProxyError::InvalidInstance(instance.to_owned()))?;

        Ok(Target {
            name: instance.to_owned(),
            base,
            path: remainder.to_owned(),
            upstream: self.upstream.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ComponentProxyConfig, ComponentsConfig};
    use http::HeaderMap;
    use routing::build_registry;
    use url::Url;

    fn inbound<'a>(method: &'a Method, path: &'a str, headers: &'a HeaderMap) -> Inbound<'a> {
        Inbound {
            method,
            path,
            raw_path: path,
            headers,
        }
    }

    #[test]
    fn test_split_instance_path() {
        assert_eq!(
            split_instance_path("/dynamic/ingester-1/ingester/flush"),
            Some(("ingester-1", "/ingester/flush"))
        );
        assert_eq!(split_instance_path("/dynamic/ingester-1"), Some(("ingester-1", "/")));
        assert_eq!(split_instance_path("/dynamic/ingester-1/"), Some(("ingester-1", "/")));
        assert_eq!(split_instance_path("/dynamic/"), None);
        assert_eq!(split_instance_path("/ingester/flush"), None);
    }

    #[test]
    fn test_instance_resolver() {
        let resolver = InstanceResolver::new(InstanceConfig {
            enabled: true,
            pattern: "http://{instance}:8080".to_owned(),
            ..Default::default()
        })
        .unwrap();

        let headers = HeaderMap::new();
        assert!(resolver.handles(&inbound(&Method::GET, "/dynamic/ingester-1/config", &headers)));
        assert!(!resolver.handles(&inbound(&Method::GET, "/config", &headers)));

        let target = resolver
            .resolve(&Method::GET, "", "/dynamic/ingester-1/config")
            .unwrap();
        assert_eq!(target.name, "ingester-1");
        assert_eq!(target.base.as_str(), "http://ingester-1:8080/");
        assert_eq!(target.path, "/config");

        assert!(matches!(
            resolver.resolve(&Method::GET, "", "/dynamic/evil@host/config"),
            Err(ProxyError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_disabled_instance_resolver() {
        let resolver = InstanceResolver::new(InstanceConfig::default()).unwrap();
        let headers = HeaderMap::new();
        assert!(!resolver.handles(&inbound(&Method::GET, "/dynamic/ingester-1/config", &headers)));
    }

    #[test]
    fn test_component_resolver_rewrites() {
        let url = |u: &str| ComponentProxyConfig {
            url: Some(Url::parse(u).unwrap()),
            ..Default::default()
        };
        let config = ComponentsConfig {
            default: url("http://mimir:8080"),
            ruler: url("http://ruler:8080"),
            ..Default::default()
        };
        let factory =
            ComponentFactory::from_config(Arc::new(build_registry().unwrap()), &config).unwrap();
        let resolver = ComponentResolver::new(Arc::new(factory));

        let target = resolver
            .resolve(&Method::GET, "/api/v1/rules/team-a", "/api/v1/rules/team-a")
            .unwrap();
        assert_eq!(target.name, "ruler");
        assert_eq!(target.path, "/prometheus/config/v1/rules/team-a");

        // no rewrite, the raw path goes through untouched
        let target = resolver
            .resolve(&Method::GET, "/some path", "/some%20path")
            .unwrap();
        assert_eq!(target.name, "default");
        assert_eq!(target.path, "/some%20path");
    }
}
