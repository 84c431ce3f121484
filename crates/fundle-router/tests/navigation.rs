//! End-to-end navigation through a router and its history.

use std::cell::RefCell;
use std::rc::Rc;

use fundle_router::{History, MemoryHistory, Router, RouterConfig};
use pretty_assertions::assert_eq;

// =============================================================================
// Fixtures
// =============================================================================

type Visits = Rc<RefCell<Vec<String>>>;

fn app(visits: &Visits) -> Router {
    let config = RouterConfig {
        default_path: "/home".into(),
    };
    let router = Router::with_config(config, MemoryHistory::new("/home"));

    let log = Rc::clone(visits);
    router.route("/home", move |_, _| log.borrow_mut().push("home".into()));

    let log = Rc::clone(visits);
    router.route("/users/:id", move |params, query| {
        let tab = query.get("tab").unwrap_or("profile");
        log.borrow_mut().push(format!("user {} {tab}", params["id"]));
    });

    let log = Rc::clone(visits);
    router.route("/users/:id/posts/:post", move |params, _| {
        log.borrow_mut()
            .push(format!("post {}/{}", params["id"], params["post"]));
    });
    router
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn browsing_session() {
    let visits = Visits::default();
    let router = app(&visits);

    router.on_pop_state().unwrap();
    router.go("/users/3?tab=friends").unwrap();
    router.go("/users/3/posts/11").unwrap();
    router.history().back();
    router.on_pop_state().unwrap();
    router.history().forward();
    router.on_pop_state().unwrap();

    assert_eq!(
        *visits.borrow(),
        [
            "home",
            "user 3 friends",
            "post 3/11",
            "user 3 friends",
            "post 3/11",
        ]
    );
    assert_eq!(router.history().len(), 3);
}

#[test]
fn unknown_location_lands_on_default() {
    let visits = Visits::default();
    let router = app(&visits);

    router.go("/users").unwrap();
    assert_eq!(*visits.borrow(), ["home"]);
    assert_eq!(router.history().current_path(), "/home");
    assert_eq!(router.history().entries(), ["/home", "/home"]);
    assert_eq!(router.current_route().unwrap().pattern, "/home");
}

#[test]
fn match_route_has_no_side_effects() {
    let visits = Visits::default();
    let router = app(&visits);

    let found = router.match_route("/users/9/posts/1?x=y").unwrap();
    assert_eq!(found.pattern, "/users/:id/posts/:post");
    assert_eq!(found.query.get("x"), Some("y"));
    assert!(router.match_route("/nope").is_none());
    assert!(visits.borrow().is_empty());
    assert_eq!(router.history().entries(), ["/home"]);
    assert!(router.current_route().is_none());
}

/// A history that only records, standing in for a host-provided one.
#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<String>>,
    current: RefCell<String>,
}

impl History for Recorder {
    fn current_path(&self) -> String {
        self.current.borrow().clone()
    }

    fn push(&self, path: &str) {
        self.calls.borrow_mut().push(format!("push {path}"));
        *self.current.borrow_mut() = path.to_owned();
    }

    fn replace(&self, path: &str) {
        self.calls.borrow_mut().push(format!("replace {path}"));
        *self.current.borrow_mut() = path.to_owned();
    }
}

#[test]
fn custom_history_sees_push_then_fallback_replace() {
    let router = Router::new(Recorder::default());
    router.route("/", |_, _| {});

    router.go("/a").unwrap();
    router.replace("/").unwrap();
    assert_eq!(
        *router.history().calls.borrow(),
        ["push /a", "replace /", "replace /"]
    );
}
