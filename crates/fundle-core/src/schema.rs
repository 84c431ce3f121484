//! Declarative model schemas.
//!
//! A [`ModelSchema`] is the per-class descriptor table: an ordered list of
//! field names with their [`FieldSpec`], an optional REST endpoint template,
//! and the class name. It is immutable once handed to a
//! [`Registry`](crate::Registry).

use crate::error::DefinitionError;
use crate::value::FieldSpec;

/// Field table and endpoint for one model class.
///
/// # Example
///
/// ```
/// use fundle_core::{FieldKind, FieldSpec, ModelSchema};
///
/// let schema = ModelSchema::new("User")
///     .field("id", FieldKind::Number)
///     .field("name", FieldKind::String)
///     .endpoint("/users");
///
/// assert_eq!(schema.primary_field().unwrap(), "id");
/// assert_eq!(schema.field_spec("name"), Some(FieldSpec::new(FieldKind::String)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    name: String,
    fields: Vec<(String, FieldSpec)>,
    endpoint: Option<String>,
}

impl ModelSchema {
    /// Start a schema for the class `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            endpoint: None,
        }
    }

    /// Declare a field. Declaration order is assignment order.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        self.fields.push((name.into(), spec.into()));
        self
    }

    /// REST endpoint template, e.g. `"/teams/:team/users"`.
    #[must_use]
    pub fn endpoint(mut self, template: impl Into<String>) -> Self {
        self.endpoint = Some(template.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn endpoint_template(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), *spec))
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    #[must_use]
    pub fn field_spec(&self, name: &str) -> Option<FieldSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| *spec)
    }

    #[must_use]
    pub(crate) fn field_at(&self, index: usize) -> Option<(&str, FieldSpec)> {
        self.fields
            .get(index)
            .map(|(name, spec)| (name.as_str(), *spec))
    }

    /// The field marked primary, else the field named `id`.
    pub fn primary_field(&self) -> Result<&str, DefinitionError> {
        self.validate()
            .map(|index| self.fields[index].0.as_str())
    }

    /// Check the schema and return the index of its primary field.
    pub(crate) fn validate(&self) -> Result<usize, DefinitionError> {
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|(earlier, _)| earlier == name) {
                return Err(DefinitionError::DuplicateField {
                    model: self.name.clone(),
                    field: name.clone(),
                });
            }
        }

        let mut marked = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, (_, spec))| spec.primary_key);
        match (marked.next(), marked.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some((_, (first, _))), Some((_, (second, _)))) => {
                Err(DefinitionError::AmbiguousPrimaryKey {
                    model: self.name.clone(),
                    first: first.clone(),
                    second: second.clone(),
                })
            }
            (None, _) => self
                .field_index("id")
                .ok_or_else(|| DefinitionError::MissingPrimaryKey {
                    model: self.name.clone(),
                }),
        }
    }
}

/// Replace `:name` tokens in `template` with `lookup(name)`.
///
/// Tokens without a value are left in place. A token runs over ASCII
/// alphanumerics and `_`, so `:id` never matches inside `:identity`.
#[must_use]
pub fn interpolate_endpoint(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(colon) = rest.find(':') {
        out.push_str(&rest[..colon]);
        let after = &rest[colon + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];
        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => {
                out.push(':');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}
