//! Route patterns and the route table.
//!
//! Patterns are literal paths where a whole segment may be a parameter
//! prefixed with `:`, e.g. `/users/:id/posts/:post_id`. A pattern is
//! compiled once at registration into a segment matcher with one capture per
//! parameter; matching is anchored over the entire path and a parameter
//! matches exactly one non-empty segment (it can never contain `/`).

use crate::request::Method;
use std::fmt;

/// Error produced when a pattern fails to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Patterns must begin with `/`.
    MissingLeadingSlash,
    /// A `:name` segment whose name is empty or contains characters outside
    /// `[A-Za-z_][A-Za-z0-9_]*`.
    InvalidParamName(String),
    /// The same parameter name appears twice in one pattern.
    DuplicateParam(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLeadingSlash => write!(f, "route pattern must start with '/'"),
            Self::InvalidParamName(name) => {
                write!(f, "invalid route parameter name: ':{name}'")
            }
            Self::DuplicateParam(name) => {
                write!(f, "duplicate route parameter name: ':{name}'")
            }
        }
    }
}

impl std::error::Error for PatternError {}

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Must equal this text exactly.
    Literal(String),
    /// Captures one non-empty path segment under this name.
    Param(String),
}

/// A route pattern compiled at registration time.
///
/// Compilation happens exactly once; matching reuses the compiled segments.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    pattern: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

fn is_valid_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl RoutePattern {
    /// Compile a registration pattern.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash);
        };

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();
        for raw in rest.split('/') {
            if let Some(name) = raw.strip_prefix(':') {
                if !is_valid_param_name(name) {
                    return Err(PatternError::InvalidParamName(name.to_string()));
                }
                if param_names.iter().any(|existing| existing == name) {
                    return Err(PatternError::DuplicateParam(name.to_string()));
                }
                param_names.push(name.to_string());
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            param_names,
        })
    }

    /// The pattern text as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Parameter names in left-to-right order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a request path, returning the captured parameter values in the
    /// same order as [`param_names`](Self::param_names).
    ///
    /// The match is anchored: every segment of the path must be consumed.
    /// Captures are exactly as many as there are parameters in the pattern.
    #[must_use]
    pub fn match_path<'a>(&self, path: &'a str) -> Option<Vec<&'a str>> {
        let rest = path.strip_prefix('/')?;
        let mut path_segments = rest.split('/');
        let mut captures = Vec::with_capacity(self.param_names.len());

        for segment in &self.segments {
            let candidate = path_segments.next()?;
            match segment {
                Segment::Literal(expected) => {
                    if candidate != expected {
                        return None;
                    }
                }
                Segment::Param(_) => {
                    if candidate.is_empty() {
                        return None;
                    }
                    captures.push(candidate);
                }
            }
        }

        // Anchored: nothing of the path may remain.
        if path_segments.next().is_some() {
            return None;
        }
        Some(captures)
    }

    /// Captured values paired with their parameter names.
    #[must_use]
    pub fn match_params(&self, path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.match_path(path)?;
        debug_assert_eq!(captures.len(), self.param_names.len());
        Some(
            self.param_names
                .iter()
                .zip(captures)
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
        )
    }
}

/// A registered route.
#[derive(Debug)]
pub struct Route<T> {
    /// Method this entry serves.
    pub method: Method,
    /// The compiled pattern.
    pub pattern: RoutePattern,
    /// The handler payload.
    pub handler: T,
}

/// Route table with first-registered-wins matching.
///
/// Entries are scanned in registration order; the first entry whose method
/// and pattern both match the request wins. Overlapping patterns are
/// therefore resolved by registration order, and that order is observable.
#[derive(Debug)]
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RouteTable<T> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a route. The pattern is compiled here, once.
    pub fn add(&mut self, method: Method, pattern: &str, handler: T) -> Result<(), PatternError> {
        let pattern = RoutePattern::compile(pattern)?;
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(())
    }

    /// Find the first route matching `(method, path)` and extract its
    /// parameters. HEAD requests are served by GET routes.
    #[must_use]
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&T, Vec<(String, String)>)> {
        for route in &self.routes {
            let method_matches =
                route.method == method || (method == Method::Head && route.method == Method::Get);
            if !method_matches {
                continue;
            }
            if let Some(params) = route.pattern.match_params(path) {
                return Some((&route.handler, params));
            }
        }
        None
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_requires_leading_slash() {
        assert_eq!(
            RoutePattern::compile("users/:id").unwrap_err(),
            PatternError::MissingLeadingSlash
        );
    }

    #[test]
    fn compile_extracts_param_names_in_order() {
        let pattern = RoutePattern::compile("/users/:user_id/posts/:post_id").unwrap();
        assert_eq!(pattern.param_names(), ["user_id", "post_id"]);
    }

    #[test]
    fn compile_rejects_invalid_names() {
        assert!(matches!(
            RoutePattern::compile("/users/:"),
            Err(PatternError::InvalidParamName(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/users/:9id"),
            Err(PatternError::InvalidParamName(_))
        ));
        assert!(matches!(
            RoutePattern::compile("/files/:file-name"),
            Err(PatternError::InvalidParamName(_))
        ));
    }

    #[test]
    fn compile_accepts_underscore_names() {
        let pattern = RoutePattern::compile("/x/:_private/:name2").unwrap();
        assert_eq!(pattern.param_names(), ["_private", "name2"]);
    }

    #[test]
    fn compile_rejects_duplicate_params() {
        assert_eq!(
            RoutePattern::compile("/a/:id/b/:id").unwrap_err(),
            PatternError::DuplicateParam("id".to_string())
        );
    }

    #[test]
    fn match_literal_path() {
        let pattern = RoutePattern::compile("/users").unwrap();
        assert_eq!(pattern.match_path("/users"), Some(vec![]));
        assert_eq!(pattern.match_path("/items"), None);
        assert_eq!(pattern.match_path("/users/1"), None);
    }

    #[test]
    fn match_root() {
        let pattern = RoutePattern::compile("/").unwrap();
        assert_eq!(pattern.match_path("/"), Some(vec![]));
        assert_eq!(pattern.match_path("/x"), None);
    }

    #[test]
    fn match_captures_one_segment_per_param() {
        let pattern = RoutePattern::compile("/users/:id").unwrap();
        assert_eq!(pattern.match_path("/users/42"), Some(vec!["42"]));
        assert_eq!(pattern.match_path("/users/42/posts"), None);
        assert_eq!(pattern.match_path("/users/a/b"), None);
    }

    #[test]
    fn match_param_must_be_nonempty() {
        let pattern = RoutePattern::compile("/users/:id").unwrap();
        assert_eq!(pattern.match_path("/users/"), None);
    }

    #[test]
    fn match_is_anchored_against_trailing_slash() {
        let pattern = RoutePattern::compile("/users/:id").unwrap();
        assert_eq!(pattern.match_path("/users/42/"), None);
    }

    #[test]
    fn capture_count_equals_param_count() {
        let pattern = RoutePattern::compile("/a/:x/b/:y/:z").unwrap();
        let captures = pattern.match_path("/a/1/b/2/3").unwrap();
        assert_eq!(captures.len(), pattern.param_names().len());
    }

    #[test]
    fn match_params_pairs_names_with_values() {
        let pattern = RoutePattern::compile("/users/:user_id/posts/:post_id").unwrap();
        let params = pattern.match_params("/users/42/posts/99").unwrap();
        assert_eq!(
            params,
            vec![
                ("user_id".to_string(), "42".to_string()),
                ("post_id".to_string(), "99".to_string()),
            ]
        );
    }

    #[test]
    fn table_lookup_matches_method_and_path() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.add(Method::Get, "/users/:id", "get_user").unwrap();
        table.add(Method::Post, "/users", "create_user").unwrap();

        let (handler, params) = table.lookup(Method::Get, "/users/42").unwrap();
        assert_eq!(*handler, "get_user");
        assert_eq!(params[0], ("id".to_string(), "42".to_string()));

        assert!(table.lookup(Method::Delete, "/users/42").is_none());
        assert!(table.lookup(Method::Get, "/items").is_none());
    }

    #[test]
    fn table_first_registered_wins() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.add(Method::Get, "/users/:id", "first").unwrap();
        table.add(Method::Get, "/users/:name", "second").unwrap();

        let (handler, _) = table.lookup(Method::Get, "/users/42").unwrap();
        assert_eq!(*handler, "first");
    }

    #[test]
    fn table_head_matches_get_routes() {
        let mut table: RouteTable<&str> = RouteTable::new();
        table.add(Method::Get, "/page", "page").unwrap();

        let (handler, _) = table.lookup(Method::Head, "/page").unwrap();
        assert_eq!(*handler, "page");
    }
}
