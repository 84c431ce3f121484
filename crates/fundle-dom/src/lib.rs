#![forbid(unsafe_code)]

//! Element tree and declarative bindings for fundle.
//!
//! This crate provides:
//! - [`Element`] / [`DomEvent`]: an in-memory element tree with bubbling
//!   events, standing in for the host document
//! - [`SelectorList`]: the CSS selector subset used for queries
//! - [`Templater`] / [`Bindings`]: idempotent selector → callback binding and
//!   `<template>` cloning

pub mod error;
pub mod node;
pub mod selector;
pub mod templater;

pub use error::{SelectorError, TemplateError};
pub use node::{DomEvent, Element, FRAGMENT_TAG, ListenerId, WeakElement};
pub use selector::SelectorList;
pub use templater::{
    BindReport, BindingFn, BindingWarning, Bindings, THIS, Templater, split_selector_list,
};
