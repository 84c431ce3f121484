#![forbid(unsafe_code)]

//! Client-side router for fundle.
//!
//! Routes are `/`-separated patterns with `:name` parameters, tried in
//! registration order against the current location. Navigation is driven
//! through a [`History`] implementation; [`MemoryHistory`] keeps the stack
//! in process.
//!
//! ```
//! use fundle_router::{MemoryHistory, Router};
//!
//! let router = Router::new(MemoryHistory::default());
//! router.route("/users/:id", |params, _query| {
//!     assert_eq!(params["id"], "7");
//! });
//! let found = router.go("/users/7").unwrap();
//! assert_eq!(found.pattern, "/users/:id");
//! ```

pub mod history;
pub mod matching;
pub mod router;

pub use history::{History, MemoryHistory};
pub use matching::{Params, PathMatch, QueryParams, match_path, split_query};
pub use router::{RouteMatch, Router, RouterConfig, RouterError};
