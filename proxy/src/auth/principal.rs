use routing::ScopeMatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scopes {
    /// Trusted identities hold every scope.
    All,
    Only(Vec<String>),
}

impl Scopes {
    fn contains(&self, scope: &str) -> bool {
        match self {
            Scopes::All => true,
            Scopes::Only(held) => held.iter().any(|s| s == scope),
        }
    }
}

/// Authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
    tenants: Vec<String>,
    scopes: Scopes,
}

impl Principal {
    pub fn new(name: impl Into<String>, tenants: Vec<String>, scopes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tenants,
            scopes: Scopes::Only(scopes),
        }
    }

    /// Identity asserted by a trusted header.
    pub fn trusted(tenants: Vec<String>) -> Self {
        Self {
            name: String::new(),
            tenants,
            scopes: Scopes::All,
        }
    }

    /// Caller of a public route.
    pub fn anonymous() -> Self {
        Self::new("", Vec::new(), Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tenants(&self) -> &[String] {
        &self.tenants
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    /// Value of the tenant header, tenants joined with `|`.
    pub fn org_id(&self) -> Option<String> {
        if self.tenants.is_empty() {
            return None;
        }
        Some(self.tenants.join("|"))
    }
}

impl ScopeMatcher for Principal {
    fn has_scopes(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|s| self.scopes.contains(s))
    }

    fn has_any_scope(&self, scopes: &[&str]) -> bool {
        scopes.is_empty() || scopes.iter().any(|s| self.scopes.contains(s))
    }
}

/// Tenants a principal acts for, given the tenants it asked for and the
/// tenants its credential permits.
///
/// A wildcard on the requested side yields the permitted list, a wildcard on
/// the permitted side yields the requested list, anything else intersects
/// in requested order. Either side empty yields nothing.
pub fn merge_tenants(requested: &[String], permitted: &[String]) -> Vec<String> {
    if requested.is_empty() || permitted.is_empty() {
        return Vec::new();
    }

    let requested = normalize(requested);
    let permitted = normalize(permitted);

    if requested == [WILDCARD] {
        permitted
    } else if permitted == [WILDCARD] {
        requested
    } else {
        requested
            .into_iter()
            .filter(|r| permitted.contains(r))
            .collect()
    }
}

const WILDCARD: &str = "*";

fn normalize(tenants: &[String]) -> Vec<String> {
    if tenants.iter().any(|t| t == WILDCARD) {
        return vec![WILDCARD.to_owned()];
    }
    tenants.to_vec()
}
