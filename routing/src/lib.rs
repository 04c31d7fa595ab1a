//! Path patterns, routes and the scope requirements attached to them.
//!
//! Everything here is built once at startup and only read afterwards.

pub mod components;
pub mod errors;
pub mod links;
pub mod pattern;
pub mod permission;
pub mod registry;
pub mod rewrite;
pub mod route;
pub mod scopes;

pub use components::build_registry;
pub use errors::{CompileError, RegistryError};
pub use links::Link;
pub use pattern::Pattern;
pub use permission::{RoutePermission, ScopeMatcher, ScopePolicy};
pub use registry::Registry;
pub use rewrite::Rewriter;
pub use route::Route;
