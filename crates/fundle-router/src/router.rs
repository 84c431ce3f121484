//! Ordered route table driving navigation callbacks.
//!
//! # Invariants
//!
//! 1. Routes are tried in registration order; the first match wins, so a
//!    parameterized pattern registered early shadows a literal one.
//! 2. An unmatched path replaces the current history entry with the
//!    configured default path and navigates there instead. The fallback is
//!    tried once.
//! 3. The current route is recorded before its callback runs, and no
//!    `RefCell` borrow is held while it runs, so a callback may navigate.
//!
//! # Failure Modes
//!
//! - Neither the path nor the default path matches: [`RouterError::NoRoute`],
//!   callbacks are not invoked and the current route is unchanged.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;

use crate::history::{History, MemoryHistory};
use crate::matching::{Params, QueryParams, match_path};

type RouteFn = Rc<dyn Fn(&Params, &QueryParams)>;

/// Router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Where unmatched paths are redirected.
    pub default_path: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_path: "/".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("no route matches `{path}` or the default path `{fallback}`")]
    NoRoute { path: String, fallback: String },
}

/// A resolved navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Pattern of the route that matched.
    pub pattern: String,
    /// Path that was navigated to, including its query.
    pub path: String,
    pub params: Params,
    pub query: QueryParams,
}

struct Route {
    pattern: String,
    callback: RouteFn,
}

pub struct Router<H: History = MemoryHistory> {
    config: RouterConfig,
    history: H,
    routes: RefCell<Vec<Route>>,
    current: RefCell<Option<RouteMatch>>,
}

impl<H: History> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<String> = self
            .routes
            .borrow()
            .iter()
            .map(|route| route.pattern.clone())
            .collect();
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("routes", &patterns)
            .field("current", &self.current.borrow())
            .finish_non_exhaustive()
    }
}

impl<H: History> Router<H> {
    pub fn new(history: H) -> Self {
        Self::with_config(RouterConfig::default(), history)
    }

    pub fn with_config(config: RouterConfig, history: H) -> Self {
        Self {
            config,
            history,
            routes: RefCell::new(Vec::new()),
            current: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Register `callback` for `pattern`, after every existing route.
    pub fn route(
        &self,
        pattern: impl Into<String>,
        callback: impl Fn(&Params, &QueryParams) + 'static,
    ) -> &Self {
        self.routes.borrow_mut().push(Route {
            pattern: pattern.into(),
            callback: Rc::new(callback),
        });
        self
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.borrow().len()
    }

    /// First route matching `path`, without navigating.
    #[must_use]
    pub fn match_route(&self, path: &str) -> Option<RouteMatch> {
        self.find(path).map(|(found, _)| found)
    }

    fn find(&self, path: &str) -> Option<(RouteMatch, RouteFn)> {
        self.routes.borrow().iter().find_map(|route| {
            match_path(path, &route.pattern).map(|found| {
                (
                    RouteMatch {
                        pattern: route.pattern.clone(),
                        path: path.to_owned(),
                        params: found.params,
                        query: found.query,
                    },
                    Rc::clone(&route.callback),
                )
            })
        })
    }

    /// Resolve `path` and run its callback, falling back to the default
    /// path when nothing matches. History is only touched by the fallback.
    pub fn navigate(&self, path: &str) -> Result<RouteMatch, RouterError> {
        if let Some(found) = self.find(path) {
            return Ok(self.enter(found));
        }

        let fallback = self.config.default_path.clone();
        tracing::debug!(path, fallback = %fallback, "no route matched, redirecting");
        self.history.replace(&fallback);
        match self.find(&fallback) {
            Some(found) => Ok(self.enter(found)),
            None => Err(RouterError::NoRoute {
                path: path.to_owned(),
                fallback,
            }),
        }
    }

    /// Push a history entry for `path`, then navigate.
    pub fn go(&self, path: &str) -> Result<RouteMatch, RouterError> {
        self.history.push(path);
        self.navigate(path)
    }

    /// Replace the current history entry with `path`, then navigate.
    pub fn replace(&self, path: &str) -> Result<RouteMatch, RouterError> {
        self.history.replace(path);
        self.navigate(path)
    }

    /// Navigate to the history's current entry. Hosts call this on
    /// back/forward notifications and once at startup.
    pub fn on_pop_state(&self) -> Result<RouteMatch, RouterError> {
        let path = self.history.current_path();
        self.navigate(&path)
    }

    #[must_use]
    pub fn current_route(&self) -> Option<RouteMatch> {
        self.current.borrow().clone()
    }

    fn enter(&self, (found, callback): (RouteMatch, RouteFn)) -> RouteMatch {
        tracing::debug!(pattern = %found.pattern, path = %found.path, "route entered");
        *self.current.borrow_mut() = Some(found.clone());
        callback(&found.params, &found.query);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Weak;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging(log: &Log, name: &'static str) -> impl Fn(&Params, &QueryParams) + 'static {
        let log = Rc::clone(log);
        move |params, query| {
            let params: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let mut entry = format!("{name}({})", params.join(","));
            if !query.is_empty() {
                entry.push_str(&format!("?{query}"));
            }
            log.borrow_mut().push(entry);
        }
    }

    #[test]
    fn first_registration_wins() {
        let log = Log::default();
        let router = Router::new(MemoryHistory::default());
        router
            .route("/users/:id", logging(&log, "user"))
            .route("/users/new", logging(&log, "new"));

        let found = router.navigate("/users/new").unwrap();
        assert_eq!(found.pattern, "/users/:id");
        assert_eq!(found.params["id"], "new");
        assert_eq!(*log.borrow(), ["user(id=new)"]);
    }

    #[test]
    fn unmatched_path_falls_back_via_replace() {
        let log = Log::default();
        let router = Router::new(MemoryHistory::new("/start"));
        router.route("/", logging(&log, "home"));

        let found = router.go("/nowhere").unwrap();
        assert_eq!(found.path, "/");
        assert_eq!(router.history().entries(), ["/start", "/"]);
        assert_eq!(*log.borrow(), ["home()"]);
    }

    #[test]
    fn failing_fallback_is_an_error_not_a_loop() {
        let config = RouterConfig {
            default_path: "/home".into(),
        };
        let router = Router::with_config(config, MemoryHistory::default());
        router.route("/about", |_, _| {});

        let err = router.navigate("/missing").unwrap_err();
        assert_eq!(
            err,
            RouterError::NoRoute {
                path: "/missing".into(),
                fallback: "/home".into()
            }
        );
        assert!(router.current_route().is_none());
    }

    #[test]
    fn query_reaches_the_callback() {
        let log = Log::default();
        let router = Router::new(MemoryHistory::default());
        router.route("/search", logging(&log, "search"));
        router.go("/search?q=rust+lang").unwrap();
        assert_eq!(*log.borrow(), ["search()?q=rust+lang"]);
        assert_eq!(
            router.current_route().unwrap().query.get("q"),
            Some("rust lang")
        );
    }

    #[test]
    fn pop_state_follows_history() {
        let log = Log::default();
        let router = Router::new(MemoryHistory::new("/a"));
        router
            .route("/a", logging(&log, "a"))
            .route("/b", logging(&log, "b"));

        router.on_pop_state().unwrap();
        router.go("/b").unwrap();
        router.history().back();
        router.on_pop_state().unwrap();
        assert_eq!(*log.borrow(), ["a()", "b()", "a()"]);
    }

    #[test]
    fn replace_does_not_grow_history() {
        let router = Router::new(MemoryHistory::default());
        router.route("/x", |_, _| {});
        router.replace("/x").unwrap();
        assert_eq!(router.history().entries(), ["/x"]);
    }

    #[test]
    fn callbacks_may_redirect() {
        let router = Rc::new(Router::new(MemoryHistory::default()));
        let landed = Rc::new(Cell::new(false));

        let weak: Weak<Router> = Rc::downgrade(&router);
        router.route("/old", move |_, _| {
            if let Some(router) = weak.upgrade() {
                router.replace("/new").unwrap();
            }
        });
        let flag = Rc::clone(&landed);
        router.route("/new", move |_, _| flag.set(true));

        router.go("/old").unwrap();
        assert!(landed.get());
        assert_eq!(router.current_route().unwrap().pattern, "/new");
        assert_eq!(router.history().entries(), ["/", "/new"]);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: RouterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_path, "/");
        let config: RouterConfig = serde_json::from_str(r#"{"default_path": "/home"}"#).unwrap();
        assert_eq!(config.default_path, "/home");
    }
}
