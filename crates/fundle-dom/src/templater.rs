//! Declarative selector → callback bindings over an element subtree.
//!
//! [`Templater::bind`] walks a [`Bindings`] table in insertion order. Each
//! key is a comma-separated list of sub-selectors, and each sub-selector is
//! one of:
//!
//! | Form | Effect |
//! |------|--------|
//! | `:this` | callback runs on the root |
//! | plain selector | callback runs on every matching descendant |
//! | `:this > li` | leading `:this` scopes the selector to the root |
//! | `target::event callbackEl` | listener on every `target`; on dispatch the callback gets the first `callbackEl` inside that target (or the target itself) |
//!
//! Render callbacks receive `(element, None)`; event callbacks receive
//! `(element, Some(event))`.
//!
//! # Invariants
//!
//! 1. Re-binding is idempotent for events: each node records the
//!    (binding key, event sub-selector) pairs attached to it and never
//!    attaches one twice. Distinct keys sharing a sub-selector each attach.
//! 2. Render callbacks re-run on every pass.
//! 3. No element borrow is held while a callback runs, so callbacks may
//!    restructure the subtree.
//! 4. The callback element is looked up under the listening node on every
//!    dispatch, so render callbacks may replace it between events.
//!
//! # Failure Modes
//!
//! Bindings degrade instead of failing: a sub-selector that matches nothing,
//! or does not parse, is logged at warn and recorded in the returned
//! [`BindReport`]; the remaining bindings still apply.

use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::error::{SelectorError, TemplateError};
use crate::node::{DomEvent, Element};
use crate::selector::SelectorList;

/// Selector prefix naming the bound root.
pub const THIS: &str = ":this";

static EVENT_BINDING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.*?)::([a-zA-Z]+)\s*(.*)$").ok());

/// Callback stored in a [`Bindings`] table.
pub type BindingFn = Rc<dyn Fn(&Element, Option<&DomEvent>)>;

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Ordered selector → callback table.
#[derive(Clone, Default)]
pub struct Bindings {
    rules: Vec<(String, BindingFn)>,
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.selectors()).finish()
    }
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Bindings::insert`].
    #[must_use]
    pub fn with(
        mut self,
        selector: impl Into<String>,
        callback: impl Fn(&Element, Option<&DomEvent>) + 'static,
    ) -> Self {
        self.insert(selector, callback);
        self
    }

    /// Add a rule. Re-inserting a selector replaces its callback in place.
    pub fn insert(
        &mut self,
        selector: impl Into<String>,
        callback: impl Fn(&Element, Option<&DomEvent>) + 'static,
    ) {
        let selector = selector.into();
        let callback: BindingFn = Rc::new(callback);
        match self.rules.iter_mut().find(|(key, _)| *key == selector) {
            Some((_, slot)) => *slot = callback,
            None => self.rules.push((selector, callback)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(selector, _)| selector.as_str())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A binding that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingWarning {
    #[error("binding target not found for selector `{selector}`")]
    NoMatch { selector: String },
    #[error("event target not found for selector `{selector}` (event `{event}`)")]
    NoEventTarget { selector: String, event: String },
    #[error("invalid binding selector `{selector}`")]
    InvalidSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },
}

/// What one [`Templater::bind`] pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindReport {
    /// Render callbacks invoked.
    pub applied: usize,
    /// Event listeners attached.
    pub attached: usize,
    /// Event listeners already present and left alone.
    pub skipped: usize,
    pub warnings: Vec<BindingWarning>,
}

impl BindReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, warning: BindingWarning) {
        tracing::warn!(%warning, "binding skipped");
        self.warnings.push(warning);
    }
}

// ---------------------------------------------------------------------------
// Templater
// ---------------------------------------------------------------------------

/// Binding and template-cloning entry points.
#[derive(Debug)]
pub struct Templater;

impl Templater {
    /// Apply every rule of `bindings` under `root`.
    pub fn bind(root: &Element, bindings: &Bindings) -> BindReport {
        let mut report = BindReport::default();
        for (raw, callback) in &bindings.rules {
            for part in split_selector_list(raw) {
                match EventBinding::parse(part) {
                    Some(event) => bind_event(root, raw, part, &event, callback, &mut report),
                    None => apply(root, part, callback, &mut report),
                }
            }
        }
        tracing::trace!(
            root = ?root,
            applied = report.applied,
            attached = report.attached,
            skipped = report.skipped,
            "bind pass"
        );
        report
    }

    /// Deep clone of the content of the first `<template>` under `host`
    /// matching `selector`, wrapped in a fragment.
    pub fn clone_template(host: &Element, selector: &str) -> Result<Element, TemplateError> {
        let template = host
            .query_selector(selector)?
            .ok_or_else(|| TemplateError::NotFound(selector.to_owned()))?;
        Self::clone(&template)
    }

    /// Deep clone of `template`'s content, wrapped in a fragment.
    pub fn clone(template: &Element) -> Result<Element, TemplateError> {
        if !template.is_template() {
            return Err(TemplateError::NotATemplate(template.tag().to_owned()));
        }
        let fragment = Element::fragment();
        for child in template.children() {
            fragment.append_child(&child.deep_clone());
        }
        Ok(fragment)
    }
}

fn apply(root: &Element, selector: &str, callback: &BindingFn, report: &mut BindReport) {
    let targets = match resolve(root, selector) {
        Ok(targets) => targets,
        Err(source) => {
            report.warn(BindingWarning::InvalidSelector {
                selector: selector.to_owned(),
                source,
            });
            return;
        }
    };
    if targets.is_empty() {
        report.warn(BindingWarning::NoMatch {
            selector: selector.to_owned(),
        });
        return;
    }
    for target in targets {
        callback(&target, None);
        report.applied += 1;
    }
}

fn bind_event(
    root: &Element,
    key: &str,
    part: &str,
    event: &EventBinding<'_>,
    callback: &BindingFn,
    report: &mut BindReport,
) {
    let targets = match resolve(root, event.target) {
        Ok(targets) => targets,
        Err(source) => {
            report.warn(BindingWarning::InvalidSelector {
                selector: event.target.trim().to_owned(),
                source,
            });
            return;
        }
    };
    if targets.is_empty() {
        report.warn(BindingWarning::NoEventTarget {
            selector: event.target.trim().to_owned(),
            event: event.kind.to_owned(),
        });
        return;
    }

    let lookup = match callback_selector(event.callback) {
        Ok(lookup) => lookup,
        Err(source) => {
            report.warn(BindingWarning::InvalidSelector {
                selector: event.callback.trim().to_owned(),
                source,
            });
            None
        }
    };

    for target in targets {
        if !target.mark_bound(key, part) {
            report.skipped += 1;
            continue;
        }
        let lookup = lookup.clone();
        let callback = Rc::clone(callback);
        target.add_event_listener(event.kind, move |dom_event| {
            let Some(current) = dom_event.current_target() else {
                return;
            };
            let element = lookup
                .as_ref()
                .and_then(|list| current.select_all(list).into_iter().next())
                .unwrap_or(current);
            callback(&element, Some(dom_event));
        });
        report.attached += 1;
    }
}

/// Elements a render or event-target selector designates under `root`.
fn resolve(root: &Element, selector: &str) -> Result<Vec<Element>, SelectorError> {
    let selector = selector.trim();
    if selector.is_empty() || selector == THIS {
        return Ok(vec![root.clone()]);
    }
    match selector.strip_prefix(THIS) {
        Some(rest) => root.query_selector_all(&format!(":scope{rest}")),
        None => root.query_selector_all(selector),
    }
}

/// Parsed callback-element selector, scoped to the listening node. `None`
/// designates the listening node itself.
fn callback_selector(selector: &str) -> Result<Option<SelectorList>, SelectorError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Ok(None);
    }
    let scoped = match selector.strip_prefix(THIS) {
        Some(rest) => format!(":scope{rest}"),
        None => format!(":scope {selector}"),
    };
    SelectorList::parse(&scoped).map(Some)
}

/// `target::event callbackEl`, split into its three parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventBinding<'a> {
    target: &'a str,
    kind: &'a str,
    callback: &'a str,
}

impl<'a> EventBinding<'a> {
    fn parse(selector: &'a str) -> Option<Self> {
        let captures = EVENT_BINDING.as_ref()?.captures(selector)?;
        Some(Self {
            target: captures.get(1)?.as_str(),
            kind: captures.get(2)?.as_str(),
            callback: captures.get(3)?.as_str(),
        })
    }
}

/// Split a binding key on commas outside parentheses, brackets and quotes.
///
/// Parts are trimmed; empty parts are dropped.
#[must_use]
pub fn split_selector_list(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (at, c) in raw.char_indices() {
        match (quote, c) {
            (Some(open), _) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(raw[start..at].trim());
                start = at + 1;
            }
            _ => {}
        }
    }
    parts.push(raw[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}
