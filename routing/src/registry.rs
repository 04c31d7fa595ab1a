use crate::errors::RegistryError;
use crate::links::Link;
use crate::permission::RoutePermission;
use crate::rewrite::Rewriter;
use crate::route::Route;
use http::Method;
use indexmap::IndexMap;

/// Route permissions, rewrites and index links grouped by component.
///
/// Registration order is match priority: the first permission whose route
/// matches wins, both inside a group and across groups. Register specific
/// patterns before the catch-alls that would shadow them.
#[derive(Debug, Default)]
pub struct Registry {
    permissions: Vec<RoutePermission>,
    groups: IndexMap<String, Vec<usize>>,
    rewrites: IndexMap<String, Vec<Rewriter>>,
    links: IndexMap<String, Vec<Link>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any-of scopes on the given methods.
    pub fn register(
        &mut self,
        group: &str,
        pattern: &str,
        methods: &[Method],
        scopes: &[&'static str],
    ) -> Result<(), RegistryError> {
        let route = Route::new(pattern, methods)?;
        self.register_permission(group, RoutePermission::any_of(route, scopes));
        Ok(())
    }

    /// All-of scopes on the given methods.
    pub fn register_strict(
        &mut self,
        group: &str,
        pattern: &str,
        methods: &[Method],
        scopes: &[&'static str],
    ) -> Result<(), RegistryError> {
        let route = Route::new(pattern, methods)?;
        self.register_permission(group, RoutePermission::all_of(route, scopes));
        Ok(())
    }

    /// Any-of scopes on every method.
    pub fn register_all(
        &mut self,
        group: &str,
        pattern: &str,
        scopes: &[&'static str],
    ) -> Result<(), RegistryError> {
        self.register(group, pattern, &[], scopes)
    }

    pub fn register_permission(&mut self, group: &str, permission: RoutePermission) {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .push(self.permissions.len());
        self.permissions.push(permission);
    }

    pub fn register_rewrite(
        &mut self,
        group: &str,
        pattern: &str,
        methods: &[Method],
        expr: &str,
        replacement: &str,
    ) -> Result<(), RegistryError> {
        let rewriter = Rewriter::new(Route::new(pattern, methods)?, expr, replacement)?;
        self.rewrites
            .entry(group.to_owned())
            .or_default()
            .push(rewriter);
        Ok(())
    }

    pub fn register_link(&mut self, group: &str, desc: &str, path: &str) {
        self.links
            .entry(group.to_owned())
            .or_default()
            .push(Link::new(desc, path));
    }

    pub fn register_dangerous_link(&mut self, group: &str, desc: &str, path: &str) {
        self.links
            .entry(group.to_owned())
            .or_default()
            .push(Link::dangerous(desc, path));
    }

    /// Permissions of one group in registration order. Unknown groups yield
    /// nothing.
    pub fn group_permissions<'a>(
        &'a self,
        group: &str,
    ) -> impl Iterator<Item = &'a RoutePermission> + use<'a> {
        self.groups
            .get(group)
            .into_iter()
            .flatten()
            .map(|&idx| &self.permissions[idx])
    }

    /// Every permission in registration order.
    pub fn all_permissions(&self) -> &[RoutePermission] {
        &self.permissions
    }

    pub fn group_rewrites(&self, group: &str) -> &[Rewriter] {
        self.rewrites.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn group_routes<'a>(&'a self, group: &str) -> impl Iterator<Item = &'a Route> + use<'a> {
        self.group_permissions(group).map(RoutePermission::route)
    }

    /// Group names in the order they were first registered.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn links(&self) -> impl Iterator<Item = (&str, &[Link])> {
        self.links
            .iter()
            .map(|(group, links)| (group.as_str(), links.as_slice()))
    }

    /// Group owning the first permission that matches, ignoring scopes.
    pub fn owning_group(&self, method: &Method, path: &str) -> Option<&str> {
        let idx = self
            .permissions
            .iter()
            .position(|p| p.matches_parts(method, path))?;
        self.groups
            .iter()
            .find(|(_, indices)| indices.contains(&idx))
            .map(|(group, _)| group.as_str())
    }
}
