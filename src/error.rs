//! Decode error taxonomy shared by the BER and JSON control codecs.
//!
//! Every decode path returns [`DecodeError`]; constructors taking explicit
//! typed fields never fail. A decode either yields a fully valid control or an
//! error, never a partially populated one.

use std::fmt;

use thiserror::Error;

use crate::ber::BerError;

/// Errors produced while decoding a control from BER or JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A mandatory JSON field (`oid`, `criticality`, or a required
    /// structured-value field) is absent.
    #[error("JSON control object is missing required field '{field}'")]
    MissingField { field: String },

    /// A JSON field has the wrong type, e.g. an array element is not a string.
    #[error("JSON field '{field}' must be {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    /// Strict mode only: the object contains a field outside the recognized set.
    #[error("unrecognized field '{field}' in {location}")]
    UnrecognizedField {
        field: String,
        location: &'static str,
    },

    /// Both `value-base64` and `value-json` are present, or neither is present
    /// when exactly one was required.
    #[error("control {oid}: {reason}")]
    ConflictingValueRepresentation { oid: String, reason: &'static str },

    /// The control carries a value although its type defines none.
    #[error("control {oid} must not have a value")]
    UnexpectedValue { oid: String },

    /// The control has no value although its type requires one.
    #[error("control {oid} requires a value")]
    MissingValue { oid: String },

    /// The BER structure cannot be parsed or contains an unrecognized element.
    #[error("malformed BER encoding{}: {reason}", oid_suffix(.oid))]
    MalformedBinaryEncoding { oid: Option<String>, reason: String },
}

fn oid_suffix(oid: &Option<String>) -> String {
    match oid {
        Some(oid) => format!(" in control {}", oid),
        None => String::new(),
    }
}

/// Discriminant of [`DecodeError`], used for matching and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    MissingField,
    TypeMismatch,
    UnrecognizedField,
    ConflictingValueRepresentation,
    UnexpectedValue,
    MissingValue,
    MalformedBinaryEncoding,
}

impl DecodeErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeErrorKind::MissingField => "missing_field",
            DecodeErrorKind::TypeMismatch => "type_mismatch",
            DecodeErrorKind::UnrecognizedField => "unrecognized_field",
            DecodeErrorKind::ConflictingValueRepresentation => "conflicting_value_representation",
            DecodeErrorKind::UnexpectedValue => "unexpected_value",
            DecodeErrorKind::MissingValue => "missing_value",
            DecodeErrorKind::MalformedBinaryEncoding => "malformed_binary_encoding",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::MissingField { .. } => DecodeErrorKind::MissingField,
            DecodeError::TypeMismatch { .. } => DecodeErrorKind::TypeMismatch,
            DecodeError::UnrecognizedField { .. } => DecodeErrorKind::UnrecognizedField,
            DecodeError::ConflictingValueRepresentation { .. } => {
                DecodeErrorKind::ConflictingValueRepresentation
            }
            DecodeError::UnexpectedValue { .. } => DecodeErrorKind::UnexpectedValue,
            DecodeError::MissingValue { .. } => DecodeErrorKind::MissingValue,
            DecodeError::MalformedBinaryEncoding { .. } => DecodeErrorKind::MalformedBinaryEncoding,
        }
    }

    pub(crate) fn missing_field(field: &str) -> Self {
        DecodeError::MissingField {
            field: field.to_string(),
        }
    }

    pub(crate) fn type_mismatch(field: impl Into<String>, expected: &'static str) -> Self {
        DecodeError::TypeMismatch {
            field: field.into(),
            expected,
        }
    }

    /// Malformed value of a specific control.
    pub(crate) fn malformed(oid: &str, reason: impl fmt::Display) -> Self {
        DecodeError::MalformedBinaryEncoding {
            oid: Some(oid.to_string()),
            reason: reason.to_string(),
        }
    }
}

impl From<BerError> for DecodeError {
    fn from(err: BerError) -> Self {
        DecodeError::MalformedBinaryEncoding {
            oid: None,
            reason: err.to_string(),
        }
    }
}
