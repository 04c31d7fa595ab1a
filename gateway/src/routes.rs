use routing::Registry;
use std::fmt::{self, Write};

/// Renders the routing table: one line per permission in match order,
/// followed by the index page links of every group.
pub fn render(registry: &Registry, out: &mut impl Write) -> fmt::Result {
    for group in registry.groups() {
        for permission in registry.group_permissions(group) {
            let route = permission.route();
            writeln!(
                out,
                "{group:<16} {:<18} {:<48} {:<40} {} ({})",
                route.methods_label(),
                route.pattern().as_str(),
                route.pattern().router_path(),
                permission.scopes().join(","),
                permission.policy().as_str(),
            )?;
        }
    }

    for (group, links) in registry.links() {
        for link in links {
            let marker = if link.dangerous { " [dangerous]" } else { "" };
            writeln!(out, "{group:<16} {} -> {}{marker}", link.desc, link.path)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing::build_registry;

    #[test]
    fn renders_permissions_and_links() {
        let registry = build_registry().unwrap();
        let mut rendered = String::new();
        render(&registry, &mut rendered).unwrap();

        let push = rendered
            .lines()
            .find(|line| line.contains("/api/v1/push"))
            .expect("push route");
        assert!(push.starts_with("distributor"));
        assert!(push.contains("metrics:write"));

        let purger = rendered
            .lines()
            .find(|line| line.starts_with("purger") && line.contains("POST"))
            .expect("purger route");
        assert!(purger.contains("admin,metrics:delete"));

        assert!(rendered.contains("Trigger a flush of data -> /ingester/flush [dangerous]"));
    }
}
