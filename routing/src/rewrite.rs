use crate::errors::RegistryError;
use crate::route::Route;
use http::Method;
use regex::Regex;

/// Regex path rewrite gated by a route.
#[derive(Debug, Clone)]
pub struct Rewriter {
    route: Route,
    regex: Regex,
    replacement: String,
}

impl Rewriter {
    /// The expression is anchored on both ends before compiling.
    pub fn new(route: Route, expr: &str, replacement: &str) -> Result<Self, RegistryError> {
        let regex =
            Regex::new(&format!("^(?:{expr})$")).map_err(|source| RegistryError::RewriteRegex {
                expr: expr.to_owned(),
                source,
            })?;

        Ok(Self {
            route,
            regex,
            replacement: replacement.to_owned(),
        })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Returns the rewritten path, or `None` when the path stays as it is.
    ///
    /// `$1`, `${name}` style references expand to the captured groups.
    pub fn rewrite(&self, method: &Method, path: &str) -> Option<String> {
        if !self.route.matches_parts(method, path) {
            return None;
        }

        let captures = self.regex.captures(path)?;
        let mut rewritten = String::new();
        captures.expand(&self.replacement, &mut rewritten);

        if rewritten.is_empty() {
            return None;
        }
        Some(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_rules() -> Rewriter {
        let route = Route::any_method("/api/v1/rules**").unwrap();
        Rewriter::new(route, "/api/v1/rules(.*)", "/prometheus/config/v1/rules$1").unwrap()
    }

    #[test]
    fn test_rewrite_with_backreference() {
        let rewriter = legacy_rules();
        assert_eq!(
            rewriter.rewrite(&Method::GET, "/api/v1/rules/namespace"),
            Some("/prometheus/config/v1/rules/namespace".to_owned())
        );
        assert_eq!(
            rewriter.rewrite(&Method::GET, "/api/v1/rules"),
            Some("/prometheus/config/v1/rules".to_owned())
        );
    }

    #[test]
    fn test_gate_mismatch_is_noop() {
        let rewriter = legacy_rules();
        assert_eq!(rewriter.rewrite(&Method::GET, "/api/v1/alerts"), None);

        let gated = Rewriter::new(
            Route::new("/api/v1/rules**", &[Method::POST]).unwrap(),
            "/api/v1/rules(.*)",
            "/prometheus/config/v1/rules$1",
        )
        .unwrap();
        assert_eq!(gated.rewrite(&Method::GET, "/api/v1/rules/x"), None);
    }

    #[test]
    fn test_regex_is_anchored() {
        let rewriter = Rewriter::new(Route::any_method("/**").unwrap(), "/a(.*)", "/b$1").unwrap();
        assert_eq!(rewriter.rewrite(&Method::GET, "/xa/c"), None);
        assert_eq!(rewriter.rewrite(&Method::GET, "/a/c"), Some("/b/c".to_owned()));
    }

    #[test]
    fn test_empty_expansion_is_noop() {
        let rewriter = Rewriter::new(Route::any_method("/**").unwrap(), "/(.*)", "$1").unwrap();
        assert_eq!(rewriter.rewrite(&Method::GET, "/"), None);
    }

    #[test]
    fn test_invalid_regex() {
        let result = Rewriter::new(Route::any_method("/**").unwrap(), "/(", "/");
        assert!(matches!(result, Err(RegistryError::RewriteRegex { .. })));
    }
}
