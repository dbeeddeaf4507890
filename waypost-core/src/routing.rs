// Route table: ordered routes folded into one combined matcher

use crate::pattern::{self, CompiledTemplate};
use crate::{Error, PathParams};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;

/// Methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Methods {
    /// Any method; used for resources, which dispatch on the verb themselves.
    Any,
    /// Only the listed methods, compared ignoring case.
    Only(Vec<String>),
}

impl Methods {
    pub fn only<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Methods::Only(
            methods
                .into_iter()
                .map(|m| m.as_ref().trim().to_ascii_uppercase())
                .collect(),
        )
    }

    pub fn allows(&self, method: &str) -> bool {
        match self {
            Methods::Any => true,
            Methods::Only(methods) => methods
                .iter()
                .any(|m| m.trim().eq_ignore_ascii_case(method.trim())),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let Methods::Only(methods) = self else {
            return Ok(());
        };
        if methods.is_empty() {
            return Err("route accepts no methods".to_string());
        }
        let malformed = |m: &&String| {
            let m = m.trim();
            m.is_empty() || !m.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        match methods.iter().find(malformed) {
            Some(bad) => Err(format!("invalid method `{}`", bad)),
            None => Ok(()),
        }
    }

    /// Method guard prefix, matched against the upper-cased `[METHOD]` tag.
    fn guard(&self) -> String {
        match self {
            Methods::Any => r"\[[^\]]+\]".to_string(),
            Methods::Only(methods) => {
                let alternatives: Vec<String> = methods
                    .iter()
                    .map(|m| regex::escape(&m.trim().to_ascii_uppercase()))
                    .collect();
                format!(r"\[(?:{})\]", alternatives.join("|"))
            }
        }
    }
}

impl Default for Methods {
    fn default() -> Self {
        Methods::only(["GET"])
    }
}

impl<const N: usize> From<[&str; N]> for Methods {
    fn from(methods: [&str; N]) -> Self {
        Methods::only(methods)
    }
}

impl From<&[&str]> for Methods {
    fn from(methods: &[&str]) -> Self {
        Methods::only(methods)
    }
}

/// A registered route. Immutable once built.
pub struct Route<E> {
    endpoint: E,
    template: CompiledTemplate,
    methods: Methods,
}

impl<E> Route<E> {
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    pub fn methods(&self) -> &Methods {
        &self.methods
    }
}

impl<E> fmt::Debug for Route<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("template", &self.template.template())
            .field("methods", &self.methods)
            .finish()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, E> {
    pub route: &'a Route<E>,
    /// Registration index of the winning route.
    pub index: usize,
    pub params: PathParams,
}

impl<'a, E> RouteMatch<'a, E> {
    pub fn endpoint(&self) -> &'a E {
        &self.route.endpoint
    }
}

/// Ordered route collection.
///
/// Every route is folded into a single alternation
/// `^(?:(<guard0><route0>)|(<guard1><route1>)|...)$` which is matched
/// against `"[METHOD]" + path`, so a lookup is one regex evaluation however
/// many routes exist. Alternatives are tried in registration order and the
/// first one that matches wins.
///
/// The combined matcher is built lazily on the first lookup and thrown away
/// by [`RouteTable::add`]. Lookups only need `&self` and are safe to run
/// concurrently; adding routes needs `&mut self`, so a table shared between
/// serving threads cannot change underneath them.
///
/// Because method and path are matched together, a path registered only
/// under other methods is reported as [`Error::RouteNotFound`], exactly like
/// a path that was never registered. There is no 405 at this level.
pub struct RouteTable<E> {
    routes: Vec<Route<E>>,
    matcher: OnceCell<Regex>,
}

impl<E> RouteTable<E> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            matcher: OnceCell::new(),
        }
    }

    /// Register a route. The template is compiled here, so malformed
    /// templates fail at registration time.
    pub fn add(
        &mut self,
        endpoint: E,
        template: &str,
        methods: impl Into<Methods>,
    ) -> Result<&Route<E>, Error> {
        let methods = methods.into();
        methods.validate().map_err(|reason| Error::InvalidRoute {
            template: template.to_string(),
            reason,
        })?;
        let compiled = pattern::compile(template)?;

        if self.matcher.take().is_some() {
            tracing::debug!(template, "Route added after first use, combined matcher invalidated");
        }

        self.routes.push(Route {
            endpoint,
            template: compiled,
            methods,
        });
        tracing::debug!(template, routes = self.routes.len(), "Registered route");

        Ok(&self.routes[self.routes.len() - 1])
    }

    pub fn routes(&self) -> &[Route<E>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Build the combined matcher now instead of on the first lookup.
    pub fn build(&self) -> Result<&Regex, Error> {
        self.matcher.get_or_try_init(|| {
            let source = self.combined_source();
            let matcher = Regex::new(&source).map_err(|e| Error::InvalidRoute {
                template: "<combined>".to_string(),
                reason: e.to_string(),
            })?;
            tracing::debug!(routes = self.routes.len(), "Built combined route matcher");
            Ok(matcher)
        })
    }

    /// Source text of the combined matcher.
    pub fn combined_source(&self) -> String {
        let alternatives: Vec<String> = self
            .routes
            .iter()
            .map(|route| {
                format!(
                    "({}{})",
                    route.methods.guard(),
                    route.template.adapted_pattern()
                )
            })
            .collect();
        format!("^(?:{})$", alternatives.join("|"))
    }

    /// Resolve `(path, method)` to a route and its typed path parameters.
    pub fn match_route(&self, path: &str, method: &str) -> Result<RouteMatch<'_, E>, Error> {
        let not_found = || Error::RouteNotFound(format!("{} {}", method, path));

        // A bracket in the method would let it forge the tag boundary.
        if self.routes.is_empty() || method.contains(['[', ']']) {
            return Err(not_found());
        }

        let matcher = self.build()?;
        let tagged = format!("[{}]{}", method.to_ascii_uppercase(), path);
        let captures = matcher.captures(&tagged).ok_or_else(not_found)?;

        // Group i + 1 wraps route i; adapted fragments add no groups of their own.
        let index = (1..captures.len())
            .find(|&group| captures.get(group).is_some())
            .map(|group| group - 1)
            .ok_or_else(not_found)?;

        let route = &self.routes[index];
        let params = route.template.extract(path)?.ok_or_else(not_found)?;

        tracing::trace!(
            path,
            method,
            template = route.template.template(),
            "Matched route"
        );

        Ok(RouteMatch {
            route,
            index,
            params,
        })
    }
}

impl<E> Default for RouteTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for RouteTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .field("built", &self.matcher.get().is_some())
            .finish()
    }
}
