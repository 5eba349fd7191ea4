//! JSON interchange form of a control.
//!
//! A control object carries `oid`, an informational `control-name`,
//! `criticality`, and at most one of `value-base64` (raw BER value) or
//! `value-json` (a structured object defined per control type).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::error::DecodeError;

pub const JSON_FIELD_OID: &str = "oid";
pub const JSON_FIELD_CONTROL_NAME: &str = "control-name";
pub const JSON_FIELD_CRITICALITY: &str = "criticality";
pub const JSON_FIELD_VALUE_BASE64: &str = "value-base64";
pub const JSON_FIELD_VALUE_JSON: &str = "value-json";

const CONTROL_OBJECT_FIELDS: [&str; 5] = [
    JSON_FIELD_OID,
    JSON_FIELD_CONTROL_NAME,
    JSON_FIELD_CRITICALITY,
    JSON_FIELD_VALUE_BASE64,
    JSON_FIELD_VALUE_JSON,
];

/// Field validation mode for JSON decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonDecodeOptions {
    /// Reject unrecognized fields inside the `value-json` object.
    pub strict: bool,
    /// Reject unrecognized fields at the top level of the control object.
    pub strict_top_level: bool,
}

impl JsonDecodeOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            strict_top_level: false,
        }
    }

    pub fn lenient() -> Self {
        Self::default()
    }
}

/// Whether a control type defines a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePolicy {
    Forbidden,
    Optional,
    Required,
}

/// The value part of a control object; the two representations are exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonControlValue {
    Absent,
    Raw(Vec<u8>),
    Structured(Map<String, Value>),
}

/// A validated control object.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonControl {
    oid: String,
    control_name: Option<String>,
    criticality: bool,
    value: JsonControlValue,
}

impl JsonControl {
    pub fn new(
        oid: impl Into<String>,
        control_name: Option<String>,
        criticality: bool,
        value: JsonControlValue,
    ) -> Self {
        Self {
            oid: oid.into(),
            control_name,
            criticality,
            value,
        }
    }

    /// Validates the envelope fields of `object` against `policy`.
    ///
    /// The structured value is returned as-is; its fields are checked by the
    /// control type that owns it.
    pub fn parse(
        object: &Value,
        options: &JsonDecodeOptions,
        policy: ValuePolicy,
    ) -> Result<Self, DecodeError> {
        let fields = object
            .as_object()
            .ok_or_else(|| DecodeError::type_mismatch("control", "a JSON object"))?;

        let oid = match fields.get(JSON_FIELD_OID) {
            None => return Err(DecodeError::missing_field(JSON_FIELD_OID)),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(DecodeError::type_mismatch(JSON_FIELD_OID, "a non-empty string")),
        };

        let control_name = match fields.get(JSON_FIELD_CONTROL_NAME) {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(DecodeError::type_mismatch(JSON_FIELD_CONTROL_NAME, "a string")),
        };

        let criticality = match fields.get(JSON_FIELD_CRITICALITY) {
            None => return Err(DecodeError::missing_field(JSON_FIELD_CRITICALITY)),
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(DecodeError::type_mismatch(JSON_FIELD_CRITICALITY, "a boolean")),
        };

        let value = match (fields.get(JSON_FIELD_VALUE_BASE64), fields.get(JSON_FIELD_VALUE_JSON)) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::ConflictingValueRepresentation {
                    oid,
                    reason: "value-base64 and value-json are mutually exclusive",
                })
            }
            (Some(Value::String(s)), None) => {
                JsonControlValue::Raw(decode_base64(JSON_FIELD_VALUE_BASE64, s)?)
            }
            (Some(_), None) => {
                return Err(DecodeError::type_mismatch(JSON_FIELD_VALUE_BASE64, "a base64-encoded string"))
            }
            (None, Some(Value::Object(map))) => JsonControlValue::Structured(map.clone()),
            (None, Some(_)) => return Err(DecodeError::type_mismatch(JSON_FIELD_VALUE_JSON, "a JSON object")),
            (None, None) => JsonControlValue::Absent,
        };

        match (policy, &value) {
            (ValuePolicy::Forbidden, JsonControlValue::Raw(_) | JsonControlValue::Structured(_)) => {
                return Err(DecodeError::UnexpectedValue { oid });
            }
            (ValuePolicy::Required, JsonControlValue::Absent) => {
                return Err(DecodeError::ConflictingValueRepresentation {
                    oid,
                    reason: "exactly one of value-base64 or value-json is required",
                });
            }
            _ => {}
        }

        if options.strict_top_level {
            if let Some(field) = unexpected_fields(fields, &CONTROL_OBJECT_FIELDS).next() {
                return Err(DecodeError::UnrecognizedField {
                    field: field.to_string(),
                    location: "control object",
                });
            }
        }

        Ok(Self {
            oid,
            control_name,
            criticality,
            value,
        })
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn control_name(&self) -> Option<&str> {
        self.control_name.as_deref()
    }

    /// Fails unless the object names `expected` as its OID.
    pub fn expect_oid(&self, expected: &str) -> Result<(), DecodeError> {
        if self.oid != expected {
            return Err(DecodeError::type_mismatch(JSON_FIELD_OID, "the OID of the decoded control type"));
        }
        Ok(())
    }

    pub fn criticality(&self) -> bool {
        self.criticality
    }

    pub fn value(&self) -> &JsonControlValue {
        &self.value
    }

    pub fn into_value(self) -> JsonControlValue {
        self.value
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(JSON_FIELD_OID.to_string(), Value::String(self.oid.clone()));
        if let Some(name) = &self.control_name {
            object.insert(JSON_FIELD_CONTROL_NAME.to_string(), Value::String(name.clone()));
        }
        object.insert(JSON_FIELD_CRITICALITY.to_string(), Value::Bool(self.criticality));
        match &self.value {
            JsonControlValue::Absent => {}
            JsonControlValue::Raw(bytes) => {
                object.insert(JSON_FIELD_VALUE_BASE64.to_string(), Value::String(encode_base64(bytes)));
            }
            JsonControlValue::Structured(map) => {
                object.insert(JSON_FIELD_VALUE_JSON.to_string(), Value::Object(map.clone()));
            }
        }
        Value::Object(object)
    }
}

/// Type-checked accessors over a `value-json` object.
pub struct JsonValueObject<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> JsonValueObject<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, DecodeError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(DecodeError::type_mismatch(name, "a boolean")),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<Option<&'a str>, DecodeError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(DecodeError::type_mismatch(name, "a string")),
        }
    }

    /// Reads an array of strings; a non-string element is reported as `name[index]`.
    pub fn get_string_array(&self, name: &str) -> Result<Option<Vec<String>>, DecodeError> {
        let items = match self.fields.get(name) {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(DecodeError::type_mismatch(name, "an array of strings")),
        };
        let mut strings = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => strings.push(s.clone()),
                _ => return Err(DecodeError::type_mismatch(format!("{}[{}]", name, i), "a string")),
            }
        }
        Ok(Some(strings))
    }

    pub fn get_base64(&self, name: &str) -> Result<Option<Vec<u8>>, DecodeError> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => decode_base64(name, s).map(Some),
            Some(_) => Err(DecodeError::type_mismatch(name, "a base64-encoded string")),
        }
    }

    /// In strict mode, fails on the first field outside `recognized`.
    pub fn check_unrecognized(
        &self,
        recognized: &[&str],
        options: &JsonDecodeOptions,
    ) -> Result<(), DecodeError> {
        if !options.strict {
            return Ok(());
        }
        match unexpected_fields(self.fields, recognized).next() {
            Some(field) => Err(DecodeError::UnrecognizedField {
                field: field.to_string(),
                location: "value-json",
            }),
            None => Ok(()),
        }
    }
}

/// Field names of `fields` that are not in `recognized`, in document order.
pub fn unexpected_fields<'m>(
    fields: &'m Map<String, Value>,
    recognized: &'m [&'m str],
) -> impl Iterator<Item = &'m str> + 'm {
    fields
        .keys()
        .map(String::as_str)
        .filter(move |k| !recognized.contains(k))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| DecodeError::type_mismatch(field, "a base64-encoded string"))
}
