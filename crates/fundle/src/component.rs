//! Components: host elements kept in sync with a model or a collection.
//!
//! A [`ComponentDef`] names a tag, an optional `<template>` and a function
//! producing the [`Bindings`] for an instance. A [`Component`] owns one host
//! element and re-runs [`Templater::bind`] over it whenever its data source
//! publishes a change.
//!
//! # Invariants
//!
//! 1. A component holds at most one model and one collection; replacing
//!    either drops every subscription taken on the previous one.
//! 2. Bus listeners reach the component through a weak handle, so a data
//!    source never keeps a component alive.
//! 3. No `RefCell` borrow is held while bindings run; a binding may swap
//!    the component's model or collection.
//!
//! # Failure Modes
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | `define` with a tag already registered | [`ComponentError::DuplicateTag`] |
//! | `create` with an unknown tag | [`ComponentError::UnknownTag`] |
//! | binding matches nothing | warning in the returned [`BindReport`] |
//! | model deleted | host element is detached from its parent |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use fundle_core::{ChangeEvent, ChangeKind, Collection, Model, Subscription, Topic};
use fundle_dom::{BindReport, Bindings, Element, Templater};
use thiserror::Error;

type BindingsFn = Rc<dyn Fn(&Component) -> Bindings>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("component tag `{0}` is already defined")]
    DuplicateTag(String),
    #[error("no component is defined for tag `{0}`")]
    UnknownTag(String),
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Blueprint shared by every instance of one tag.
#[derive(Clone)]
pub struct ComponentDef {
    tag: String,
    template: Option<Element>,
    bindings: BindingsFn,
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("tag", &self.tag)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl ComponentDef {
    /// Define `tag` with a bindings factory. Tags are lowercased.
    pub fn new(tag: impl Into<String>, bindings: impl Fn(&Component) -> Bindings + 'static) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            template: None,
            bindings: Rc::new(bindings),
        }
    }

    /// Content stamped into the host on [`Component::connected`].
    #[must_use]
    pub fn with_template(mut self, template: Element) -> Self {
        self.template = Some(template);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn template(&self) -> Option<&Element> {
        self.template.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Tag → definition table; the in-process counterpart of a custom-element
/// registry.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    defs: RefCell<AHashMap<String, Rc<ComponentDef>>>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, def: ComponentDef) -> Result<(), ComponentError> {
        let mut defs = self.defs.borrow_mut();
        if defs.contains_key(def.tag()) {
            return Err(ComponentError::DuplicateTag(def.tag));
        }
        tracing::debug!(tag = %def.tag, "component defined");
        defs.insert(def.tag.clone(), Rc::new(def));
        Ok(())
    }

    #[must_use]
    pub fn is_defined(&self, tag: &str) -> bool {
        self.defs.borrow().contains_key(&tag.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.borrow().is_empty()
    }

    /// New instance of `tag` on a fresh host element.
    pub fn create(&self, tag: &str) -> Result<Component, ComponentError> {
        let def = self.lookup(tag)?;
        Ok(Component::new(def, Element::new(tag)))
    }

    /// New instance of `tag` taking over an existing host element.
    pub fn upgrade(&self, tag: &str, element: Element) -> Result<Component, ComponentError> {
        let def = self.lookup(tag)?;
        Ok(Component::new(def, element))
    }

    /// New instance of `tag` fed by `model`, or by `collection` when no
    /// model is given.
    pub fn instantiate(
        &self,
        tag: &str,
        model: Option<Model>,
        collection: Option<Collection>,
    ) -> Result<Component, ComponentError> {
        let component = self.create(tag)?;
        if model.is_some() {
            component.set_model(model);
        } else if collection.is_some() {
            component.set_collection(collection);
        }
        Ok(component)
    }

    fn lookup(&self, tag: &str) -> Result<Rc<ComponentDef>, ComponentError> {
        self.defs
            .borrow()
            .get(&tag.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ComponentError::UnknownTag(tag.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

struct ComponentInner {
    def: Rc<ComponentDef>,
    element: Element,
    model: RefCell<Option<Model>>,
    collection: RefCell<Option<Collection>>,
    model_subs: RefCell<Vec<Subscription>>,
    collection_subs: RefCell<Vec<Subscription>>,
}

/// Shared handle to one component instance.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

/// Non-owning handle, for bindings that need to reach their component.
#[derive(Clone)]
pub struct WeakComponent {
    inner: Weak<ComponentInner>,
}

impl WeakComponent {
    #[must_use]
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(|inner| Component { inner })
    }
}

impl fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakComponent")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("tag", &self.inner.def.tag)
            .field("model", &self.inner.model.borrow().is_some())
            .field("collection", &self.inner.collection.borrow().is_some())
            .finish()
    }
}

impl Component {
    fn new(def: Rc<ComponentDef>, element: Element) -> Self {
        Self {
            inner: Rc::new(ComponentInner {
                def,
                element,
                model: RefCell::new(None),
                collection: RefCell::new(None),
                model_subs: RefCell::new(Vec::new()),
                collection_subs: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The host element.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.inner.element
    }

    #[must_use]
    pub fn def(&self) -> &ComponentDef {
        &self.inner.def
    }

    #[must_use]
    pub fn model(&self) -> Option<Model> {
        self.inner.model.borrow().clone()
    }

    #[must_use]
    pub fn collection(&self) -> Option<Collection> {
        self.inner.collection.borrow().clone()
    }

    /// Swap the model. A `Changed` on the new model re-renders; a `Deleted`
    /// detaches the host element.
    pub fn set_model(&self, model: Option<Model>) {
        let old = self.inner.model_subs.take();
        drop(old);

        let subs = model
            .as_ref()
            .map(|model| {
                let weak = Rc::downgrade(&self.inner);
                let on_change = model.on(ChangeKind::Changed, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        Component { inner }.render();
                    }
                });
                let weak = Rc::downgrade(&self.inner);
                let on_delete = model.on(ChangeKind::Deleted, move |event| {
                    if let Some(inner) = weak.upgrade() {
                        tracing::debug!(
                            tag = %inner.def.tag,
                            model = event.target().class().name(),
                            "model deleted, detaching component"
                        );
                        inner.element.remove();
                    }
                });
                vec![on_change, on_delete]
            })
            .unwrap_or_default();

        *self.inner.model.borrow_mut() = model;
        *self.inner.model_subs.borrow_mut() = subs;
    }

    /// Swap the collection and render. Admissions, member changes and
    /// removals all re-render.
    pub fn set_collection(&self, collection: Option<Collection>) -> BindReport {
        let old = self.inner.collection_subs.take();
        drop(old);

        let subs = collection
            .as_ref()
            .map(|collection| {
                let weak = Rc::downgrade(&self.inner);
                vec![collection.subscribe(move |event: &ChangeEvent| {
                    if let Some(inner) = weak.upgrade() {
                        tracing::trace!(tag = %inner.def.tag, kind = ?event.kind(), "collection event");
                        Component { inner }.render();
                    }
                })]
            })
            .unwrap_or_default();

        *self.inner.collection.borrow_mut() = collection;
        *self.inner.collection_subs.borrow_mut() = subs;
        self.render()
    }

    /// Re-apply this component's bindings over its host element.
    pub fn render(&self) -> BindReport {
        let bindings = (self.inner.def.bindings)(self);
        Templater::bind(&self.inner.element, &bindings)
    }

    /// Host attached: stamp the template (replacing any children) and render.
    pub fn connected(&self) -> BindReport {
        let def = &self.inner.def;
        if let Some(template) = &def.template {
            match Templater::clone(template) {
                Ok(content) => {
                    self.inner.element.clear_children();
                    self.inner.element.append_child(&content);
                }
                Err(err) => tracing::warn!(tag = %def.tag, error = %err, "template not stamped"),
            }
        }
        tracing::debug!(tag = %def.tag, "component connected");
        self.render()
    }

    /// Host detached: release the model and the collection.
    pub fn disconnected(&self) {
        self.set_model(None);
        let old = self.inner.collection_subs.take();
        drop(old);
        *self.inner.collection.borrow_mut() = None;
        tracing::debug!(tag = %self.inner.def.tag, "component disconnected");
    }
}
