//! Change events published by models and collections.

use std::collections::BTreeMap;

use crate::event::Topic;
use crate::model::Model;
use crate::value::Value;

/// Field → new value for one flushed batch.
pub type Delta = BTreeMap<String, Value>;

/// Discriminant of a [`ChangeEvent`], used for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

/// What happened to a record.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// On a class bus: the record entered the identity cache.
    /// On a collection bus: the record was admitted.
    Created(Model),
    /// A batch of field changes was flushed.
    Changed { target: Model, delta: Delta },
    /// On instance and class buses: the record was deleted.
    /// On a collection bus: the record left the collection.
    Deleted(Model),
}

impl ChangeEvent {
    /// The record this event is about.
    #[must_use]
    pub fn target(&self) -> &Model {
        match self {
            Self::Created(model) | Self::Deleted(model) => model,
            Self::Changed { target, .. } => target,
        }
    }

    /// The delta of a `Changed` event.
    #[must_use]
    pub fn delta(&self) -> Option<&Delta> {
        match self {
            Self::Changed { delta, .. } => Some(delta),
            _ => None,
        }
    }
}

impl Topic for ChangeEvent {
    type Kind = ChangeKind;

    fn kind(&self) -> ChangeKind {
        match self {
            Self::Created(_) => ChangeKind::Created,
            Self::Changed { .. } => ChangeKind::Changed,
            Self::Deleted(_) => ChangeKind::Deleted,
        }
    }
}
