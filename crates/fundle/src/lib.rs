#![forbid(unsafe_code)]

//! fundle: reactive models, declarative DOM bindings and client routing.
//!
//! This crate is the facade over the workspace:
//!
//! - `fundle-core`: models, collections, the event bus and REST persistence.
//! - `fundle-dom`: the element tree, selector engine and [`Templater`].
//! - `fundle-router`: path-pattern routing over a [`History`] (feature
//!   `router`, on by default).
//!
//! It also owns [`Component`], the glue that re-renders an element's
//! bindings whenever its model or collection publishes a change.
//!
//! ```
//! use fundle::prelude::*;
//! use serde_json::json;
//!
//! let registry = Registry::new();
//! let users = registry
//!     .define(ModelSchema::new("User").field("id", FieldKind::Number).field("name", FieldKind::String))
//!     .unwrap();
//!
//! let components = ComponentRegistry::new();
//! components
//!     .define(ComponentDef::new("user-card", |card| {
//!         let model = card.model();
//!         Bindings::new().with(":this", move |el, _| {
//!             if let Some(name) = model.as_ref().and_then(|m| m.get("name")) {
//!                 el.set_text(name.to_string());
//!             }
//!         })
//!     }))
//!     .unwrap();
//!
//! let user = users.create(json!({"id": 1, "name": "Ada"})).unwrap();
//! let card = components.create("user-card").unwrap();
//! card.set_model(Some(user.clone()));
//! card.connected();
//! assert_eq!(card.element().text(), "Ada");
//!
//! user.assign(json!({"name": "Grace"})).unwrap();
//! assert_eq!(card.element().text(), "Grace");
//! ```

pub mod component;

pub use component::{Component, ComponentDef, ComponentError, ComponentRegistry, WeakComponent};

pub use fundle_core as data;
pub use fundle_core::{
    ApiClient, ApiConfig, ApiError, ChangeEvent, ChangeKind, Collection, DefinitionError, Entry,
    EventBus, FieldKind, FieldSpec, Model, ModelClass, ModelError, ModelSchema, Registry,
    Subscription, Value,
};

pub use fundle_dom as dom;
pub use fundle_dom::{
    BindReport, BindingWarning, Bindings, DomEvent, Element, SelectorError, TemplateError,
    Templater,
};

#[cfg(feature = "router")]
pub use fundle_router as router;
#[cfg(feature = "router")]
pub use fundle_router::{History, MemoryHistory, Router, RouterConfig, RouterError};

/// Everything an application typically needs, in one import.
pub mod prelude {
    pub use crate::component::{Component, ComponentDef, ComponentRegistry};
    pub use fundle_core::{
        ChangeEvent, ChangeKind, Collection, FieldKind, Model, ModelClass, ModelSchema, Registry,
        Value,
    };
    pub use fundle_dom::{Bindings, DomEvent, Element, Templater};
    #[cfg(feature = "router")]
    pub use fundle_router::{MemoryHistory, Router};
}
