//! Live, ordered, de-duplicated views over models of one class.
//!
//! A [`Collection`] re-publishes its members' `Changed` events, drops a
//! member when that member publishes `Deleted`, and admits every record its
//! class publishes as `Created` for as long as the collection is alive.
//!
//! # Invariants
//!
//! 1. A model appears at most once (identity comparison).
//! 2. Every member holds exactly two listeners on its instance bus
//!    (`Deleted`, `Changed`); they are released when the member leaves or
//!    the collection is dropped.
//! 3. Admission publishes exactly one `Created`; removal exactly one
//!    `Deleted`, on the collection bus.
//! 4. Derived views (`map`, `filter`, `flat_map`, `splice`) are new
//!    collections with their own listeners; they share nothing with the
//!    source.
//!
//! # Failure Modes
//!
//! - Pushing a model of another class: `ModelError::WrongModel`.
//! - Pushing data that is not an object: `ModelError::NotARecord`.
//! - Removing a non-member: returns `false`, no event.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value as Json;

use crate::change::{ChangeEvent, ChangeKind};
use crate::error::ModelError;
use crate::event::{EventBus, Subscription};
use crate::model::{Model, ModelClass};

/// Something that can be pushed into a collection.
#[derive(Debug, Clone)]
pub enum Entry {
    /// An existing record.
    Model(Model),
    /// Record data, turned into a model (or reconciled) on push.
    Data(Json),
}

impl From<Model> for Entry {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

impl From<&Model> for Entry {
    fn from(model: &Model) -> Self {
        Self::Model(model.clone())
    }
}

impl From<Json> for Entry {
    fn from(data: Json) -> Self {
        Self::Data(data)
    }
}

struct Member {
    model: Model,
    _listeners: [Subscription; 2],
}

struct CollectionInner {
    class: ModelClass,
    members: RefCell<Vec<Member>>,
    bus: EventBus<ChangeEvent>,
    auto_admit: RefCell<Option<Subscription>>,
}

/// Shared handle to a live collection. Clones see the same members.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("class", &self.inner.class.name())
            .field("len", &self.len())
            .finish()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Collection {
    /// Empty collection that admits every record `class` creates from now on.
    #[must_use]
    pub fn new(class: &ModelClass) -> Self {
        let inner = Rc::new(CollectionInner {
            class: class.clone(),
            members: RefCell::new(Vec::new()),
            bus: EventBus::new(),
            auto_admit: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let auto_admit = class.on(ChangeKind::Created, move |event| {
            if let Some(collection) = Self::upgrade(&weak) {
                collection.admit(event.target().clone());
            }
        });
        *inner.auto_admit.borrow_mut() = Some(auto_admit);

        Self { inner }
    }

    /// Collection seeded by pushing each entry in order.
    pub fn with_entries<I, E>(class: &ModelClass, entries: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let collection = Self::new(class);
        for entry in entries {
            collection.push(entry)?;
        }
        Ok(collection)
    }

    fn upgrade(weak: &Weak<CollectionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    #[must_use]
    pub fn class(&self) -> &ModelClass {
        &self.inner.class
    }

    /// Collection bus: `Created` on admission, `Changed` re-published from
    /// members, `Deleted` on removal.
    #[must_use]
    pub fn bus(&self) -> &EventBus<ChangeEvent> {
        &self.inner.bus
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.inner.bus.subscribe(callback)
    }

    pub fn on(&self, kind: ChangeKind, callback: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.inner.bus.on(kind, callback)
    }

    /// Add a record, creating it from data if needed. Returns the member.
    ///
    /// Pushing a model that is already a member does nothing.
    pub fn push(&self, entry: impl Into<Entry>) -> Result<Model, ModelError> {
        let model = match entry.into() {
            Entry::Model(model) => {
                if model.class() != &self.inner.class {
                    return Err(ModelError::WrongModel {
                        expected: self.inner.class.name().to_owned(),
                        found: model.class().name().to_owned(),
                    });
                }
                model
            }
            // Creation may already admit the record through the class bus.
            Entry::Data(data) => self.inner.class.create(data)?,
        };
        self.admit(model.clone());
        Ok(model)
    }

    fn admit(&self, model: Model) -> bool {
        if self.contains(&model) {
            return false;
        }

        let weak = Rc::downgrade(&self.inner);
        let on_deleted = model.on(ChangeKind::Deleted, {
            let weak = weak.clone();
            move |event| {
                if let Some(collection) = Self::upgrade(&weak) {
                    collection.remove(event.target());
                }
            }
        });
        let on_changed = model.on(ChangeKind::Changed, move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.bus.emit(event);
            }
        });

        self.inner.members.borrow_mut().push(Member {
            model: model.clone(),
            _listeners: [on_deleted, on_changed],
        });
        tracing::trace!(model = self.inner.class.name(), len = self.len(), "collection admit");
        self.inner.bus.emit(&ChangeEvent::Created(model));
        true
    }

    /// Remove `model`. Returns `false` if it was not a member.
    pub fn remove(&self, model: &Model) -> bool {
        let member = {
            let mut members = self.inner.members.borrow_mut();
            match members.iter().position(|member| &member.model == model) {
                Some(index) => members.remove(index),
                None => return false,
            }
        };
        drop(member);
        self.inner.bus.emit(&ChangeEvent::Deleted(model.clone()));
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.members.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, model: &Model) -> bool {
        self.index_of(model).is_some()
    }

    #[must_use]
    pub fn index_of(&self, model: &Model) -> Option<usize> {
        self.inner
            .members
            .borrow()
            .iter()
            .position(|member| &member.model == model)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Model> {
        self.inner
            .members
            .borrow()
            .get(index)
            .map(|member| member.model.clone())
    }

    /// Snapshot of the members in order.
    #[must_use]
    pub fn models(&self) -> Vec<Model> {
        self.inner
            .members
            .borrow()
            .iter()
            .map(|member| member.model.clone())
            .collect()
    }

    /// Visit a snapshot of the members; `f` may mutate the collection.
    pub fn for_each(&self, mut f: impl FnMut(&Model)) {
        for model in self.models() {
            f(&model);
        }
    }

    /// Reorder members in place. Publishes nothing.
    pub fn sort_by(&self, mut compare: impl FnMut(&Model, &Model) -> Ordering) {
        self.inner
            .members
            .borrow_mut()
            .sort_by(|a, b| compare(&a.model, &b.model));
    }

    /// New collection from `f` applied to every member.
    pub fn map<E: Into<Entry>>(&self, f: impl FnMut(&Model) -> E) -> Result<Self, ModelError> {
        let mapped: Vec<E> = self.models().iter().map(f).collect();
        Self::with_entries(&self.inner.class, mapped)
    }

    /// New collection of the members matching `predicate`.
    #[must_use]
    pub fn filter(&self, mut predicate: impl FnMut(&Model) -> bool) -> Self {
        let view = Self::new(&self.inner.class);
        for model in self.models() {
            if predicate(&model) {
                view.admit(model);
            }
        }
        view
    }

    /// New collection from the flattened results of `f`.
    pub fn flat_map<I, E>(&self, f: impl FnMut(&Model) -> I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Entry>,
    {
        let flattened: Vec<E> = self.models().iter().flat_map(f).collect();
        Self::with_entries(&self.inner.class, flattened)
    }

    /// Cut `delete_count` members starting at `start` out of this collection
    /// and return them as a new collection.
    ///
    /// Each removed member is published as `Deleted` on this collection.
    pub fn splice(&self, start: usize, delete_count: usize) -> Self {
        let removed: Vec<Member> = {
            let mut members = self.inner.members.borrow_mut();
            let start = start.min(members.len());
            let end = start.saturating_add(delete_count).min(members.len());
            members.drain(start..end).collect()
        };

        let view = Self::new(&self.inner.class);
        for member in removed {
            let Member { model, _listeners } = member;
            drop(_listeners);
            self.inner.bus.emit(&ChangeEvent::Deleted(model.clone()));
            view.admit(model);
        }
        view
    }
}
