//! Shared parsing and validation skeleton for stored records.
//!
//! Records are accepted first and validated later: construction only sorts
//! the submitted keys into typed slots, and `validate()` reports anything
//! that landed in the wrong shape. Wrong-typed values are kept verbatim so
//! a record always re-serializes to what the client sent.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Field name of the mutation timestamp shared by every record type.
pub const MODIFIED_AT: &str = "modifiedAt";

/// JSON object form of a record.
pub type Fields = Map<String, Value>;

/// Options applied while constructing a record from client data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOptions {
    /// Keep keys outside the declared field set instead of rejecting them.
    pub ignore_unknown_fields: bool,
}

impl RecordOptions {
    /// Options used when reading data back out of storage.
    pub fn lenient() -> Self {
        Self {
            ignore_unknown_fields: true,
        }
    }
}

/// Errors raised while constructing a record or deriving its id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{kind} data must be an object, not {found}")]
    NotAnObject {
        kind: &'static str,
        found: &'static str,
    },

    #[error("unknown {kind} field '{field}'")]
    UnknownField { kind: &'static str, field: String },

    #[error("{kind} has no usable '{field}' to derive an id from")]
    MissingIdentity {
        kind: &'static str,
        field: &'static str,
    },
}

/// A field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn missing(field: &str) -> Self {
        Self(format!("missing field '{}'", field))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Conversion between a declared field's Rust type and its JSON value.
pub trait JsonField: Sized {
    fn from_json(value: &Value) -> Option<Self>;
    fn to_json(&self) -> Value;
}

impl JsonField for String {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }

    fn to_json(&self) -> Value {
        Value::String(self.clone())
    }
}

impl JsonField for i64 {
    // Only integral JSON numbers qualify; floats and booleans do not.
    fn from_json(value: &Value) -> Option<Self> {
        value.as_i64()
    }

    fn to_json(&self) -> Value {
        Value::from(*self)
    }
}

impl JsonField for bool {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn to_json(&self) -> Value {
        Value::Bool(*self)
    }
}

impl JsonField for Vec<String> {
    fn from_json(value: &Value) -> Option<Self> {
        value
            .as_array()?
            .iter()
            .map(|item| item.as_str().map(str::to_owned))
            .collect()
    }

    fn to_json(&self) -> Value {
        Value::Array(self.iter().cloned().map(Value::String).collect())
    }
}

impl JsonField for Fields {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_object().cloned()
    }

    fn to_json(&self) -> Value {
        Value::Object(self.clone())
    }
}

/// Storage slot for one declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Missing,
    Valid(T),
    /// Present, but not of the declared type.
    Mistyped(Value),
}

impl<T: JsonField> Slot<T> {
    /// Move `name` out of `fields` into a slot.
    pub fn take(fields: &mut Fields, name: &str) -> Self {
        match fields.remove(name) {
            None => Slot::Missing,
            Some(value) => match T::from_json(&value) {
                Some(typed) => Slot::Valid(typed),
                None => Slot::Mistyped(value),
            },
        }
    }

    /// Write the slot back into `out` under `name`, if present.
    pub fn emit(&self, name: &str, out: &mut Fields) {
        match self {
            Slot::Missing => {}
            Slot::Valid(value) => {
                out.insert(name.to_string(), value.to_json());
            }
            Slot::Mistyped(raw) => {
                out.insert(name.to_string(), raw.clone());
            }
        }
    }

    /// The typed value, or the validation error for a missing/mistyped field.
    pub fn require(&self, name: &str, wrong_type: &str) -> Result<&T, ValidationError> {
        match self {
            Slot::Valid(value) => Ok(value),
            Slot::Missing => Err(ValidationError::missing(name)),
            Slot::Mistyped(_) => Err(ValidationError::new(wrong_type)),
        }
    }
}

impl<T> Slot<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            Slot::Valid(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }
}

/// Capability interface implemented by every record variant.
pub trait Record: Sized {
    /// Human-readable variant name used in error messages.
    const KIND: &'static str;
    /// Declared field set.
    const FIELDS: &'static [&'static str];

    /// Build from the declared fields (already checked against `FIELDS`)
    /// plus any tolerated extras.
    fn from_fields(fields: Fields, extra: Fields) -> Self;

    /// Canonical external identifier.
    fn id(&self) -> Result<String, RecordError>;

    /// Creation timestamp slot (`installedAt` / `addedAt`).
    fn created_at(&self) -> &Slot<i64>;

    /// Mutable `(created, modified)` timestamp slots.
    fn timestamps_mut(&mut self) -> (&mut Slot<i64>, &mut Slot<i64>);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Reduced view used in collection listings.
    fn abbreviate(&self) -> Fields;

    /// Full, lossless JSON form.
    fn to_json(&self) -> Fields;

    /// Construct from untyped client or stored data.
    fn from_json(data: Value, options: RecordOptions) -> Result<Self, RecordError> {
        let (fields, extra) = split_fields(Self::KIND, Self::FIELDS, data, options)?;
        Ok(Self::from_fields(fields, extra))
    }

    /// Stamp `modifiedAt` and fill the creation timestamp when absent,
    /// inheriting it from `previous` if there is one.
    fn populate(&mut self, server_time: i64, previous: Option<&Self>) {
        let inherited = previous.and_then(|p| p.created_at().valid().copied());
        let (created, modified) = self.timestamps_mut();
        *modified = Slot::Valid(server_time);
        if created.is_missing() {
            *created = Slot::Valid(inherited.unwrap_or(server_time));
        }
    }
}

/// Split an object into declared fields and tolerated extras, dropping nulls.
fn split_fields(
    kind: &'static str,
    declared: &[&str],
    data: Value,
    options: RecordOptions,
) -> Result<(Fields, Fields), RecordError> {
    let object = match data {
        Value::Object(object) => object,
        other => {
            return Err(RecordError::NotAnObject {
                kind,
                found: json_type_name(&other),
            })
        }
    };

    let mut fields = Fields::new();
    let mut extra = Fields::new();
    for (name, value) in object {
        let known = declared.contains(&name.as_str());
        if !known && !options.ignore_unknown_fields {
            return Err(RecordError::UnknownField { kind, field: name });
        }
        if value.is_null() {
            continue;
        }
        if known {
            fields.insert(name, value);
        } else {
            extra.insert(name, value);
        }
    }
    Ok((fields, extra))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_take_sorts_by_type() {
        let mut fields = json!({"a": "text", "b": 42, "c": 1.5})
            .as_object()
            .cloned()
            .unwrap();

        assert_eq!(
            Slot::<String>::take(&mut fields, "a"),
            Slot::Valid("text".to_string())
        );
        assert_eq!(Slot::<i64>::take(&mut fields, "b"), Slot::Valid(42));
        assert_eq!(Slot::<i64>::take(&mut fields, "c"), Slot::Mistyped(json!(1.5)));
        assert_eq!(Slot::<String>::take(&mut fields, "d"), Slot::Missing);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_booleans_are_not_integers() {
        let mut fields = json!({"ts": true}).as_object().cloned().unwrap();
        assert_eq!(Slot::<i64>::take(&mut fields, "ts"), Slot::Mistyped(json!(true)));
    }

    #[test]
    fn test_mistyped_slot_round_trips_verbatim() {
        let slot: Slot<Vec<String>> = Slot::Mistyped(json!(["a", 1]));
        let mut out = Fields::new();
        slot.emit("receipts", &mut out);
        assert_eq!(out["receipts"], json!(["a", 1]));
    }

    #[test]
    fn test_split_fields_drops_nulls_and_rejects_unknown() {
        let declared = ["name"];
        let (fields, extra) = split_fields(
            "Test",
            &declared,
            json!({"name": "x", "other": null}),
            RecordOptions::lenient(),
        )
        .unwrap();
        assert_eq!(fields.len(), 1);
        assert!(extra.is_empty());

        let err = split_fields(
            "Test",
            &declared,
            json!({"name": "x", "other": 1}),
            RecordOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RecordError::UnknownField {
                kind: "Test",
                field: "other".to_string()
            }
        );
    }

    #[test]
    fn test_split_fields_requires_object() {
        for data in [json!(42), json!("text"), json!(["a"]), json!(null)] {
            let err = split_fields("Test", &[], data, RecordOptions::default()).unwrap_err();
            assert!(matches!(err, RecordError::NotAnObject { .. }));
        }
    }
}
