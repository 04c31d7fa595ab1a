use crate::config::ComponentsConfig;
use crate::errors::ProxyError;
use crate::upstream::{Upstream, UpstreamOptions};
use http::Method;
use routing::Registry;
use routing::components::DEFAULT;
use std::sync::Arc;
use url::Url;

/// A configured backend group.
#[derive(Clone, Debug)]
pub struct Component {
    name: &'static str,
    base: Url,
    upstream: Arc<Upstream>,
}

impl Component {
    pub fn new(name: &'static str, base: Url, upstream: Arc<Upstream>) -> Self {
        Self {
            name,
            base,
            upstream,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }
}

/// Finds the component owning a request.
///
/// Components are tried in configuration order; the first one with any
/// registered route matching method and path wins. Scopes play no part here.
#[derive(Debug)]
pub struct ComponentFactory {
    registry: Arc<Registry>,
    components: Vec<Component>,
    default: Component,
}

impl ComponentFactory {
    pub fn new(registry: Arc<Registry>, components: Vec<Component>, default: Component) -> Self {
        Self {
            registry,
            components,
            default,
        }
    }

    /// One upstream pool per enabled component.
    pub fn from_config(
        registry: Arc<Registry>,
        config: &ComponentsConfig,
    ) -> Result<Self, ProxyError> {
        let default_url = config
            .default
            .url
            .clone()
            .ok_or_else(|| ProxyError::NoUpstream(DEFAULT.to_owned()))?;
        let default = Component::new(
            DEFAULT,
            default_url,
            Arc::new(Upstream::new(DEFAULT, &UpstreamOptions::from(&config.default))?),
        );

        let mut components = Vec::new();
        for (name, component) in config.enabled() {
            let Some(url) = component.url.clone() else {
                continue;
            };
            let upstream = Upstream::new(name, &UpstreamOptions::from(component))?;
            tracing::info!(component = name, url = %url, "component enabled");
            components.push(Component::new(name, url, Arc::new(upstream)));
        }

        Ok(Self::new(registry, components, default))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Configured component owning the request, if any.
    pub fn find(&self, method: &Method, path: &str) -> Option<&Component> {
        self.components.iter().find(|component| {
            self.registry
                .group_permissions(component.name)
                .any(|permission| permission.matches_parts(method, path))
        })
    }

    /// Owning component, falling back to the default one.
    pub fn component_for(&self, method: &Method, path: &str) -> &Component {
        self.find(method, path).unwrap_or(&self.default)
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn default_component(&self) -> &Component {
        &self.default
    }
}

/// Registers the extra routes listed in the component configuration under
/// each component's group. They rank after the built-in routes.
pub fn register_config_routes(
    registry: &mut Registry,
    config: &ComponentsConfig,
) -> Result<(), ProxyError> {
    for (name, component) in config.all() {
        for route in &component.routes {
            let methods = route.parsed_methods(name)?;
            let scopes = route.parsed_scopes(name)?;
            if route.restrict {
                registry.register_strict(name, &route.pattern, &methods, &scopes)?;
            } else {
                registry.register(name, &route.pattern, &methods, &scopes)?;
            }
        }
    }
    Ok(())
}
