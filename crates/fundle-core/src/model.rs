//! Typed records with change tracking and identity reconciliation.
//!
//! A [`ModelClass`] is the runtime form of a [`ModelSchema`]: it owns the
//! identity cache and the class-wide event bus. A [`Model`] is a shared
//! handle to one record of that class.
//!
//! # Batching
//!
//! Field setters only *stage* a change into the record's batch. The batch is
//! flushed (and a single `Changed` event published) by [`Model::assign`],
//! by construction, by [`Model::save`] and by [`Model::revert`].
//!
//! # Invariants
//!
//! 1. At most one cached instance per (class, identity key). Creating a
//!    record whose key is cached updates and returns the cached instance.
//! 2. Writing a value equal to the live (cast) value stages nothing.
//! 3. A staged entry keeps the value from before the *first* write of the
//!    batch, so reverting undoes the whole batch for that field.
//! 4. `Created` is published on the class bus before the `Changed` of the
//!    same flush.
//! 5. No `RefCell` borrow is held while an event is being published.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Result |
//! |---------|-------|--------|
//! | Unknown field | `set` / `get` on an undeclared name | `ModelError::UnknownField` / `None` |
//! | Non-object data | `create` / `assign` with a scalar | `ModelError::NotARecord` |
//! | REST failure | `save` / `delete` / `all` | `ModelError::Api`, no event |
//!
//! The identity cache lives as long as its class. Classes are never torn
//! down during a UI session, so cached records stay reachable until deleted.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value as Json;

use crate::api::ApiClient;
use crate::change::{ChangeEvent, ChangeKind, Delta};
use crate::collection::Collection;
use crate::error::{ModelError, json_type_name};
use crate::event::{EventBus, Subscription};
use crate::schema::{ModelSchema, interpolate_endpoint};
use crate::value::{FieldKind, IdentityKey, Value};

/// Record data as received from callers or the server.
pub type Record = serde_json::Map<String, Json>;

/// One staged field change.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Value before the first write of the batch.
    pub old_value: Value,
    /// Latest written value.
    pub new_value: Value,
}

// ---------------------------------------------------------------------------
// ModelClass
// ---------------------------------------------------------------------------

struct ClassInner {
    schema: ModelSchema,
    primary_index: usize,
    cache: RefCell<AHashMap<IdentityKey, Model>>,
    bus: EventBus<ChangeEvent>,
    api: Option<Rc<ApiClient>>,
    next_seq: Cell<u64>,
}

/// Runtime handle for a registered model schema.
///
/// Obtained from [`Registry::define`](crate::Registry::define). Clones share
/// the same cache and bus.
#[derive(Clone)]
pub struct ModelClass {
    inner: Rc<ClassInner>,
}

impl PartialEq for ModelClass {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ModelClass {}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name())
            .field("primary_field", &self.primary_field())
            .field("cached", &self.inner.cache.borrow().len())
            .finish()
    }
}

impl ModelClass {
    pub(crate) fn new(
        schema: ModelSchema,
        primary_index: usize,
        api: Option<Rc<ApiClient>>,
    ) -> Self {
        Self {
            inner: Rc::new(ClassInner {
                schema,
                primary_index,
                cache: RefCell::new(AHashMap::new()),
                bus: EventBus::new(),
                api,
                next_seq: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.schema.name()
    }

    #[must_use]
    pub fn schema(&self) -> &ModelSchema {
        &self.inner.schema
    }

    /// Name of the primary-key field, resolved at definition time.
    #[must_use]
    pub fn primary_field(&self) -> &str {
        self.inner
            .schema
            .field_at(self.inner.primary_index)
            .map_or("id", |(name, _)| name)
    }

    /// Class-wide bus: `Created` when a record enters the cache, `Deleted`
    /// when one is deleted.
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

    #[must_use]
    pub fn api(&self) -> Option<&ApiClient> {
        self.inner.api.as_deref()
    }

    /// Build a record from `data`, reconciling with the identity cache.
    ///
    /// When `data` carries a primary key that is already cached, the cached
    /// instance is updated with `data` and returned instead of a new one.
    pub fn create(&self, data: impl Into<Json>) -> Result<Model, ModelError> {
        let data = data.into();
        let record = self.expect_record(&data)?;

        if let Some(existing) = self
            .identity_from(record)
            .and_then(|key| self.find_key(&key))
        {
            tracing::debug!(
                model = self.name(),
                key = %existing.primary_key(),
                "reconciling with cached record"
            );
            existing.assign_record(record);
            return Ok(existing);
        }

        let model = Model::blank(self.clone());
        model.assign_record(record);
        Ok(model)
    }

    /// Cached record whose primary key equals `key` after casting.
    #[must_use]
    pub fn find(&self, key: impl Into<Json>) -> Option<Model> {
        let kind = self.primary_spec_kind();
        Value::cast(&key.into(), kind)
            .identity_key()
            .and_then(|key| self.find_key(&key))
    }

    /// All cached records in creation order.
    #[must_use]
    pub fn cached(&self) -> Vec<Model> {
        let mut models: Vec<Model> = self.inner.cache.borrow().values().cloned().collect();
        models.sort_by_key(|model| model.inner.seq);
        models
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    /// Every record of this class as a live collection.
    ///
    /// Without an endpoint (or API client) this is the identity cache. With
    /// one, `:param` tokens in the endpoint are filled from `params` and the
    /// listing is fetched.
    pub fn all(&self, params: &[(&str, &str)]) -> Result<Collection, ModelError> {
        let (Some(template), Some(api)) = (self.inner.schema.endpoint_template(), self.api())
        else {
            return Collection::with_entries(self, self.cached());
        };

        let endpoint = interpolate_endpoint(template, |name| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_owned())
        });
        match api.get(&endpoint)? {
            Json::Array(items) => Collection::with_entries(self, items),
            other => Err(ModelError::NotAList {
                model: self.name().to_owned(),
                found: json_type_name(&other),
            }),
        }
    }

    fn primary_spec_kind(&self) -> FieldKind {
        self.inner
            .schema
            .field_at(self.inner.primary_index)
            .map_or(FieldKind::Opaque, |(_, spec)| spec.kind)
    }

    fn expect_record<'a>(&self, data: &'a Json) -> Result<&'a Record, ModelError> {
        data.as_object().ok_or_else(|| ModelError::NotARecord {
            model: self.name().to_owned(),
            found: json_type_name(data),
        })
    }

    fn identity_from(&self, record: &Record) -> Option<IdentityKey> {
        record
            .get(self.primary_field())
            .map(|raw| Value::cast(raw, self.primary_spec_kind()))
            .and_then(|value| value.identity_key())
    }

    fn find_key(&self, key: &IdentityKey) -> Option<Model> {
        self.inner.cache.borrow().get(key).cloned()
    }

    /// Cache `model` under its key if the key is free; publish `Created`.
    fn admit(&self, model: &Model) {
        let Some(key) = model.identity_key() else {
            return;
        };
        {
            let mut cache = self.inner.cache.borrow_mut();
            if cache.contains_key(&key) {
                return;
            }
            cache.insert(key, model.clone());
        }
        tracing::debug!(model = self.name(), key = %model.primary_key(), "record cached");
        self.inner.bus.emit(&ChangeEvent::Created(model.clone()));
    }

    /// Drop `model` from the cache if it is the instance cached under `key`.
    fn evict(&self, key: &IdentityKey, model: &Model) {
        let mut cache = self.inner.cache.borrow_mut();
        if cache.get(key).is_some_and(|cached| cached == model) {
            cache.remove(key);
        }
    }

    fn next_seq(&self) -> u64 {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        seq
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

struct ModelInner {
    class: ModelClass,
    seq: u64,
    values: RefCell<Vec<Value>>,
    changes: RefCell<BTreeMap<String, FieldChange>>,
    bus: EventBus<ChangeEvent>,
}

/// Shared handle to one record. Equality is identity.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.inner.values.borrow();
        let mut map = f.debug_map();
        for ((name, _), value) in self.inner.class.schema().fields().zip(values.iter()) {
            map.entry(&name, value);
        }
        map.finish()?;
        write!(f, " @{}#{}", self.inner.class.name(), self.inner.seq)
    }
}

impl Model {
    fn blank(class: ModelClass) -> Self {
        let seq = class.next_seq();
        let values = vec![Value::Undefined; class.schema().field_count()];
        Self {
            inner: Rc::new(ModelInner {
                class,
                seq,
                values: RefCell::new(values),
                changes: RefCell::new(BTreeMap::new()),
                bus: EventBus::new(),
            }),
        }
    }

    #[must_use]
    pub fn class(&self) -> &ModelClass {
        &self.inner.class
    }

    /// Instance bus: `Changed` on flush, `Deleted` on delete.
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

    /// Live value of `field`, `None` if the field is not declared.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        let index = self.inner.class.schema().field_index(field)?;
        self.inner.values.borrow().get(index).cloned()
    }

    /// Stage a write of raw `value` into `field`.
    ///
    /// The value is cast per the field kind first; an equal value stages
    /// nothing. Nothing is published until the next flush.
    pub fn set(&self, field: &str, value: impl Into<Json>) -> Result<(), ModelError> {
        let (index, kind) = self.field_slot(field)?;
        self.stage(index, Value::cast(&value.into(), kind));
        Ok(())
    }

    /// Stage a write of an already typed value into `field`.
    pub fn set_value(&self, field: &str, value: Value) -> Result<(), ModelError> {
        let (index, kind) = self.field_slot(field)?;
        self.stage(index, value.coerce(kind));
        Ok(())
    }

    fn field_slot(&self, field: &str) -> Result<(usize, FieldKind), ModelError> {
        let schema = self.inner.class.schema();
        schema
            .field_index(field)
            .and_then(|index| schema.field_at(index).map(|(_, spec)| (index, spec.kind)))
            .ok_or_else(|| ModelError::UnknownField {
                model: schema.name().to_owned(),
                field: field.to_owned(),
            })
    }

    fn stage(&self, index: usize, value: Value) {
        let Some((name, _)) = self.inner.class.schema().field_at(index) else {
            return;
        };
        let previous = {
            let mut values = self.inner.values.borrow_mut();
            if values[index] == value {
                return;
            }
            std::mem::replace(&mut values[index], value.clone())
        };

        let mut changes = self.inner.changes.borrow_mut();
        match changes.get_mut(name) {
            Some(entry) => entry.new_value = value,
            None => {
                changes.insert(
                    name.to_owned(),
                    FieldChange {
                        old_value: previous,
                        new_value: value,
                    },
                );
            }
        }
    }

    /// Merge `data` into the record and flush the batch.
    ///
    /// Declared fields present in `data` go through their setters; unknown
    /// keys are ignored.
    pub fn assign(&self, data: impl Into<Json>) -> Result<(), ModelError> {
        let data = data.into();
        let record = self.inner.class.expect_record(&data)?;
        self.assign_record(record);
        Ok(())
    }

    fn assign_record(&self, record: &Record) {
        let class = &self.inner.class;
        for (index, (name, spec)) in class.schema().fields().enumerate() {
            if let Some(raw) = record.get(name) {
                self.stage(index, Value::cast(raw, spec.kind));
            }
        }

        if record.contains_key(class.primary_field()) {
            class.admit(self);
        }

        let delta = self.change_delta();
        if !delta.is_empty() {
            self.inner.bus.emit(&ChangeEvent::Changed {
                target: self.clone(),
                delta,
            });
        }
        self.inner.changes.borrow_mut().clear();
    }

    /// Restore staged fields to their pre-batch values.
    ///
    /// With an empty `fields` every staged field is reverted. Publishes a
    /// `Changed` event carrying whatever is still staged afterwards.
    pub fn revert(&self, fields: &[&str]) {
        let pending: Vec<(String, Value)> = {
            let changes = self.inner.changes.borrow();
            if changes.is_empty() {
                return;
            }
            changes
                .iter()
                .filter(|(name, _)| fields.is_empty() || fields.contains(&name.as_str()))
                .map(|(name, change)| (name.clone(), change.old_value.clone()))
                .collect()
        };

        for (name, old_value) in pending {
            if let Ok((index, kind)) = self.field_slot(&name) {
                self.stage(index, old_value.coerce(kind));
            }
            self.inner.changes.borrow_mut().remove(&name);
        }

        let delta = self.change_delta();
        self.inner.bus.emit(&ChangeEvent::Changed {
            target: self.clone(),
            delta,
        });
    }

    /// Staged changes since the last flush.
    #[must_use]
    pub fn field_changes(&self) -> BTreeMap<String, FieldChange> {
        self.inner.changes.borrow().clone()
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.inner.changes.borrow().is_empty()
    }

    /// Staged changes projected to field → new value.
    #[must_use]
    pub fn change_delta(&self) -> Delta {
        self.inner
            .changes
            .borrow()
            .iter()
            .map(|(name, change)| (name.clone(), change.new_value.clone()))
            .collect()
    }

    /// Value of the primary-key field.
    #[must_use]
    pub fn primary_key(&self) -> Value {
        self.inner
            .values
            .borrow()
            .get(self.inner.class.inner.primary_index)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn identity_key(&self) -> Option<IdentityKey> {
        self.primary_key().identity_key()
    }

    /// Whether this instance is the one cached for its key.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.identity_key()
            .and_then(|key| self.inner.class.find_key(&key))
            .is_some_and(|cached| &cached == self)
    }

    /// REST endpoint with `:field` tokens filled from this record.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        let template = self.inner.class.schema().endpoint_template()?;
        Some(interpolate_endpoint(template, |name| {
            self.get(name).map(|value| value.to_string())
        }))
    }

    /// Defined, non-null fields as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Json {
        let values = self.inner.values.borrow();
        let object: Record = self
            .inner
            .class
            .schema()
            .fields()
            .zip(values.iter())
            .filter(|(_, value)| !value.is_nullish())
            .filter_map(|((name, _), value)| value.to_json().map(|json| (name.to_owned(), json)))
            .collect();
        Json::Object(object)
    }

    /// Persist the record and flush its batch.
    ///
    /// Without an endpoint this is a local flush. A record without a
    /// primary key is `POST`ed; a keyed record with staged changes is
    /// `PATCH`ed with its delta. The server response is assigned back.
    pub fn save(&self) -> Result<(), ModelError> {
        let class = &self.inner.class;
        let (Some(api), Some(endpoint)) = (class.api(), self.endpoint()) else {
            self.assign_record(&Record::new());
            return Ok(());
        };

        let response = if self.identity_key().is_none() {
            Some(api.post(&endpoint, self.to_json())?)
        } else if self.has_changes() {
            let delta: Record = self
                .change_delta()
                .into_iter()
                .filter_map(|(name, value)| value.to_json().map(|json| (name, json)))
                .collect();
            let url = format!("{endpoint}/{}", self.primary_key());
            Some(api.patch(&url, Json::Object(delta))?)
        } else {
            None
        };

        match response {
            Some(Json::Object(record)) => self.assign_record(&record),
            Some(Json::Null) | None => self.assign_record(&Record::new()),
            Some(other) => {
                return Err(ModelError::NotARecord {
                    model: class.name().to_owned(),
                    found: json_type_name(&other),
                });
            }
        }
        Ok(())
    }

    /// Delete the record.
    ///
    /// Issues `DELETE endpoint/pk` when the class has an endpoint, then
    /// evicts the record from the identity cache and publishes `Deleted` on
    /// the instance bus and the class bus. A failed request leaves the cache
    /// untouched and publishes nothing.
    pub fn delete(&self) -> Result<(), ModelError> {
        let class = &self.inner.class;
        if let Some(key) = self.identity_key() {
            if let (Some(api), Some(endpoint)) = (class.api(), self.endpoint()) {
                api.delete(&format!("{endpoint}/{}", self.primary_key()))?;
            }
            class.evict(&key, self);
        }

        tracing::debug!(model = class.name(), key = %self.primary_key(), "record deleted");
        let event = ChangeEvent::Deleted(self.clone());
        self.inner.bus.emit(&event);
        class.bus().emit(&event);
        Ok(())
    }
}
