//! Explicit home for model classes.
//!
//! Each [`Registry`] owns its own classes, identity caches and class buses,
//! so two registries never see each other's records. An application keeps
//! one registry for its session; tests build a fresh one per case.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::api::ApiClient;
use crate::error::DefinitionError;
use crate::model::ModelClass;
use crate::schema::ModelSchema;

/// Set of model classes sharing one optional API client.
#[derive(Default)]
pub struct Registry {
    classes: RefCell<AHashMap<String, ModelClass>>,
    api: Option<Rc<ApiClient>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.classes.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("classes", &names)
            .field("api", &self.api.is_some())
            .finish()
    }
}

impl Registry {
    /// Registry without REST access; `save` and `delete` stay local.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose classes persist through `api`.
    #[must_use]
    pub fn with_api(api: ApiClient) -> Self {
        Self {
            classes: RefCell::new(AHashMap::new()),
            api: Some(Rc::new(api)),
        }
    }

    /// Validate `schema` and register it.
    ///
    /// The primary key is resolved here, once per class.
    pub fn define(&self, schema: ModelSchema) -> Result<ModelClass, DefinitionError> {
        let primary_index = schema.validate()?;
        let mut classes = self.classes.borrow_mut();
        if classes.contains_key(schema.name()) {
            return Err(DefinitionError::DuplicateModel(schema.name().to_owned()));
        }

        let name = schema.name().to_owned();
        let class = ModelClass::new(schema, primary_index, self.api.clone());
        tracing::debug!(model = %name, primary = class.primary_field(), "model defined");
        classes.insert(name, class.clone());
        Ok(class)
    }

    /// Look up a class by name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<ModelClass> {
        self.classes.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }

    #[must_use]
    pub fn api(&self) -> Option<&ApiClient> {
        self.api.as_deref()
    }
}
