#![forbid(unsafe_code)]

//! Reactive data layer for fundle.
//!
//! This crate provides the data half of the framework:
//!
//! - [`ModelSchema`] / [`Registry`]: declare record types and register them
//!   into an isolated set of classes.
//! - [`Model`]: a typed record with batched change tracking, identity
//!   reconciliation and optional REST persistence through [`ApiClient`].
//! - [`Collection`]: a live, de-duplicated list of models of one class.
//! - [`EventBus`] / [`Subscription`]: the publish/subscribe primitive every
//!   layer above builds on.
//!
//! # Architecture
//!
//! Everything is single-threaded: handles are `Rc` based, state sits behind
//! `RefCell`, and every listener registration returns a [`Subscription`]
//! that detaches on drop. Collections and bindings hold only weak
//! references to themselves from inside their callbacks, so dropping the
//! last handle releases every listener they registered.
//!
//! # Invariants
//!
//! 1. One live instance per (class, primary key) inside a registry.
//! 2. One `Changed` event per flushed batch, none for empty batches.
//! 3. Listeners run in registration order on a snapshot of the listener
//!    list; a listener removed mid-dispatch is not invoked afterwards.

pub mod api;
pub mod change;
pub mod collection;
pub mod error;
pub mod event;
pub mod model;
pub mod registry;
pub mod schema;
pub mod value;

pub use api::{ApiClient, ApiConfig, ApiRequest, ApiResponse, Method, Transport};
pub use change::{ChangeEvent, ChangeKind, Delta};
pub use collection::{Collection, Entry};
pub use error::{ApiError, DefinitionError, ModelError};
pub use event::{EventBus, Subscription, Topic};
pub use model::{FieldChange, Model, ModelClass, Record};
pub use registry::Registry;
pub use schema::{ModelSchema, interpolate_endpoint};
pub use value::{FieldKind, FieldSpec, IdentityKey, Value, format_number};
