//! Field descriptors, typed field values and primitive coercion.
//!
//! Incoming data is JSON. Each declared field casts what it receives
//! according to its [`FieldKind`] before comparing against the live value,
//! so `"42"` written into a `Number` field equals `42` already stored there.
//!
//! # Failure Modes
//!
//! | Input | Kind | Result |
//! |-------|------|--------|
//! | unparsable string | `Number` | `NaN` (never equal to anything) |
//! | unparsable string | `Date` | `Null`, logged at warn |
//! | `null` | any | `Null` |
//! | array / object | `String` | compact JSON text |

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Primitive type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    String,
    Boolean,
    Date,
    /// Stored as given, no coercion.
    Opaque,
}

/// Declaration of one model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    #[serde(default)]
    pub primary_key: bool,
}

impl FieldSpec {
    /// A plain field of `kind`.
    #[must_use]
    pub const fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            primary_key: false,
        }
    }

    /// A field of `kind` marked as the primary key.
    #[must_use]
    pub const fn primary(kind: FieldKind) -> Self {
        Self {
            kind,
            primary_key: true,
        }
    }
}

impl From<FieldKind> for FieldSpec {
    fn from(kind: FieldKind) -> Self {
        Self::new(kind)
    }
}

/// The live value of a model field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Never assigned.
    #[default]
    Undefined,
    Null,
    Number(f64),
    String(String),
    Boolean(bool),
    Date(DateTime<Utc>),
    Opaque(Json),
}

impl Value {
    /// Cast raw JSON input according to `kind`.
    #[must_use]
    pub fn cast(input: &Json, kind: FieldKind) -> Self {
        if input.is_null() {
            return Self::Null;
        }
        match kind {
            FieldKind::Number => Self::Number(json_to_number(input)),
            FieldKind::String => Self::String(json_to_string(input)),
            FieldKind::Boolean => Self::Boolean(json_truthy(input)),
            FieldKind::Date => json_to_date(input).map_or(Self::Null, Self::Date),
            FieldKind::Opaque => Self::Opaque(input.clone()),
        }
    }

    /// Re-cast an already typed value for a field of `kind`.
    ///
    /// Values that already have the right shape pass through untouched, so a
    /// date keeps its full precision.
    #[must_use]
    pub fn coerce(self, kind: FieldKind) -> Self {
        let keeps_shape = matches!(
            (&self, kind),
            (Self::Undefined | Self::Null, _)
                | (Self::Number(_), FieldKind::Number)
                | (Self::String(_), FieldKind::String)
                | (Self::Boolean(_), FieldKind::Boolean)
                | (Self::Date(_), FieldKind::Date)
                | (Self::Opaque(_), FieldKind::Opaque)
        );
        if keeps_shape {
            return self;
        }
        match self.to_json() {
            Some(json) => Self::cast(&json, kind),
            None => Self::Undefined,
        }
    }

    /// Wire form of the value. `Undefined` has none.
    #[must_use]
    pub fn to_json(&self) -> Option<Json> {
        match self {
            Self::Undefined => None,
            Self::Null => Some(Json::Null),
            Self::Number(n) => Some(number_to_json(*n)),
            Self::String(s) => Some(Json::String(s.clone())),
            Self::Boolean(b) => Some(Json::Bool(*b)),
            Self::Date(d) => Some(Json::String(
                d.to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
            Self::Opaque(v) => Some(v.clone()),
        }
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `Undefined` or `Null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Identity-cache key for this value, if it can serve as one.
    ///
    /// Falsy values (`0`, `NaN`, `""`, `false`, null, undefined) never
    /// identify a record.
    #[must_use]
    pub fn identity_key(&self) -> Option<IdentityKey> {
        match self {
            Self::Undefined | Self::Null => None,
            Self::Number(n) if *n == 0.0 || n.is_nan() => None,
            Self::Number(n) => Some(IdentityKey::Number(n.to_bits())),
            Self::String(s) if s.is_empty() => None,
            Self::String(s) => Some(IdentityKey::Text(s.clone())),
            Self::Boolean(false) => None,
            Self::Boolean(true) => Some(IdentityKey::Flag),
            Self::Date(d) => Some(IdentityKey::Instant(d.timestamp_millis())),
            Self::Opaque(json) => opaque_identity(json),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined | Self::Null => Ok(()),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Opaque(Json::String(s)) => f.write_str(s),
            Self::Opaque(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

/// Hashable form of a primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// IEEE bits of a non-zero, non-NaN number.
    Number(u64),
    Text(String),
    /// Epoch milliseconds.
    Instant(i64),
    Flag,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(bits) => f.write_str(&format_number(f64::from_bits(*bits))),
            Self::Text(s) => f.write_str(s),
            Self::Instant(ms) => write!(f, "{ms}"),
            Self::Flag => f.write_str("true"),
        }
    }
}

fn opaque_identity(json: &Json) -> Option<IdentityKey> {
    match json {
        Json::Null | Json::Bool(false) => None,
        Json::Bool(true) => Some(IdentityKey::Flag),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)).identity_key(),
        Json::String(s) if s.is_empty() => None,
        Json::String(s) => Some(IdentityKey::Text(s.clone())),
        other => Some(IdentityKey::Text(other.to_string())),
    }
}

/// Render a number the way a text node shows it: `1`, `1.5`, `NaN`, `-Infinity`.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i128)
    } else {
        format!("{n}")
    }
}

fn number_to_json(n: f64) -> Json {
    if n.is_finite() && n == n.trunc() && n.abs() < 9.007_199_254_740_992e15 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

fn json_to_number(input: &Json) -> f64 {
    match input {
        Json::Null => 0.0,
        Json::Bool(b) => f64::from(u8::from(*b)),
        Json::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Json::String(s) => parse_number(s),
        Json::Array(_) | Json::Object(_) => f64::NAN,
    }
}

fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf" and "nan" spellings that a text field should not.
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn json_to_string(input: &Json) -> String {
    match input {
        Json::Null => "null".to_owned(),
        Json::Bool(b) => b.to_string(),
        Json::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_truthy(input: &Json) -> bool {
    match input {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

fn json_to_date(input: &Json) -> Option<DateTime<Utc>> {
    let parsed = match input {
        Json::Number(n) => n
            .as_f64()
            .filter(|ms| ms.is_finite())
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single()),
        Json::String(s) => parse_date(s.trim()),
        _ => None,
    };
    if parsed.is_none() {
        tracing::warn!(input = %input, "unparsable date, storing null");
    }
    parsed
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
