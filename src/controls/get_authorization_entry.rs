// Get authorization entry request control.
//
// Asks the server to return the entries of the authenticated and/or
// authorized users with a bind response.
//
//   GetAuthorizationEntryRequest ::= SEQUENCE {
//        includeAuthNEntry     [0] BOOLEAN DEFAULT TRUE,
//        includeAuthZEntry     [1] BOOLEAN DEFAULT TRUE,
//        attributes            [2] AttributeSelection OPTIONAL }

use std::any::Any;
use std::fmt;

use serde_json::{Map, Value};

use crate::ber::{
    context_constructed, context_primitive, BerElement, BerError, BerWriter, TAG_OCTET_STRING,
    TAG_SEQUENCE,
};
use crate::control::{Control, GenericControl, TypedControl};
use crate::error::DecodeError;
use crate::json::{
    JsonControl, JsonControlValue, JsonDecodeOptions, JsonValueObject, ValuePolicy,
};

pub const GET_AUTHORIZATION_ENTRY_REQUEST_OID: &str = "1.3.6.1.4.1.30221.2.5.6";

const TYPE_INCLUDE_AUTHN_ENTRY: u8 = context_primitive(0);
const TYPE_INCLUDE_AUTHZ_ENTRY: u8 = context_primitive(1);
const TYPE_ATTRIBUTES: u8 = context_constructed(2);

const JSON_FIELD_INCLUDE_AUTHN_ENTRY: &str = "include-authentication-entry";
const JSON_FIELD_INCLUDE_AUTHZ_ENTRY: &str = "include-authorization-entry";
const JSON_FIELD_ATTRIBUTES: &str = "attributes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAuthorizationEntryOptions {
    pub include_authn_entry: bool,
    pub include_authz_entry: bool,
    /// Attributes to return. Empty means all user attributes.
    pub attributes: Vec<String>,
}

impl Default for GetAuthorizationEntryOptions {
    fn default() -> Self {
        Self {
            include_authn_entry: true,
            include_authz_entry: true,
            attributes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAuthorizationEntryRequestControl {
    critical: bool,
    options: GetAuthorizationEntryOptions,
}

impl GetAuthorizationEntryRequestControl {
    pub fn new(critical: bool, options: GetAuthorizationEntryOptions) -> Self {
        Self { critical, options }
    }

    pub fn include_authn_entry(&self) -> bool {
        self.options.include_authn_entry
    }

    pub fn include_authz_entry(&self) -> bool {
        self.options.include_authz_entry
    }

    pub fn attributes(&self) -> &[String] {
        &self.options.attributes
    }

    pub fn options(&self) -> &GetAuthorizationEntryOptions {
        &self.options
    }

    /// `None` when every field is at its default.
    fn encode_value(options: &GetAuthorizationEntryOptions) -> Option<Vec<u8>> {
        if *options == GetAuthorizationEntryOptions::default() {
            return None;
        }
        let mut writer = BerWriter::new();
        let seq_start = writer.start_sequence();
        if !options.include_authn_entry {
            writer.write_boolean_tagged(TYPE_INCLUDE_AUTHN_ENTRY, false);
        }
        if !options.include_authz_entry {
            writer.write_boolean_tagged(TYPE_INCLUDE_AUTHZ_ENTRY, false);
        }
        if !options.attributes.is_empty() {
            let attrs_start = writer.start_sequence_tagged(TYPE_ATTRIBUTES);
            for attr in &options.attributes {
                writer.write_string(attr);
            }
            writer.end_sequence(attrs_start);
        }
        writer.end_sequence(seq_start);
        Some(writer.into_vec())
    }

    fn decode_value(value: &[u8]) -> Result<GetAuthorizationEntryOptions, DecodeError> {
        let malformed = |e: BerError| DecodeError::malformed(GET_AUTHORIZATION_ENTRY_REQUEST_OID, e);
        let sequence = BerElement::decode(value)
            .and_then(|e| e.expect_tag(TAG_SEQUENCE))
            .map_err(malformed)?;

        let mut options = GetAuthorizationEntryOptions::default();
        let mut seen = Vec::with_capacity(3);
        for element in sequence.elements().map_err(malformed)? {
            if seen.contains(&element.tag) {
                return Err(DecodeError::malformed(
                    GET_AUTHORIZATION_ENTRY_REQUEST_OID,
                    format!("duplicate element type 0x{:02X}", element.tag),
                ));
            }
            seen.push(element.tag);
            match element.tag {
                TYPE_INCLUDE_AUTHN_ENTRY => {
                    options.include_authn_entry = element.as_boolean().map_err(malformed)?;
                }
                TYPE_INCLUDE_AUTHZ_ENTRY => {
                    options.include_authz_entry = element.as_boolean().map_err(malformed)?;
                }
                TYPE_ATTRIBUTES => {
                    let mut attributes = Vec::new();
                    for attr in element.elements().map_err(malformed)? {
                        let attr = attr.expect_tag(TAG_OCTET_STRING).map_err(malformed)?;
                        attributes.push(attr.as_string().map_err(malformed)?);
                    }
                    options.attributes = attributes;
                }
                tag => {
                    return Err(DecodeError::malformed(
                        GET_AUTHORIZATION_ENTRY_REQUEST_OID,
                        format!("unrecognized element type 0x{:02X}", tag),
                    ))
                }
            }
        }
        Ok(options)
    }

    fn decode_value_json(
        fields: &Map<String, Value>,
        options: &JsonDecodeOptions,
    ) -> Result<GetAuthorizationEntryOptions, DecodeError> {
        let object = JsonValueObject::new(fields);
        let defaults = GetAuthorizationEntryOptions::default();
        let decoded = GetAuthorizationEntryOptions {
            include_authn_entry: object
                .get_bool(JSON_FIELD_INCLUDE_AUTHN_ENTRY)?
                .unwrap_or(defaults.include_authn_entry),
            include_authz_entry: object
                .get_bool(JSON_FIELD_INCLUDE_AUTHZ_ENTRY)?
                .unwrap_or(defaults.include_authz_entry),
            attributes: object
                .get_string_array(JSON_FIELD_ATTRIBUTES)?
                .unwrap_or(defaults.attributes),
        };
        object.check_unrecognized(
            &[
                JSON_FIELD_INCLUDE_AUTHN_ENTRY,
                JSON_FIELD_INCLUDE_AUTHZ_ENTRY,
                JSON_FIELD_ATTRIBUTES,
            ],
            options,
        )?;
        Ok(decoded)
    }
}

impl Default for GetAuthorizationEntryRequestControl {
    fn default() -> Self {
        Self::new(false, GetAuthorizationEntryOptions::default())
    }
}

impl Control for GetAuthorizationEntryRequestControl {
    fn oid(&self) -> &str {
        GET_AUTHORIZATION_ENTRY_REQUEST_OID
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn control_name(&self) -> &str {
        "Get Authorization Entry Request Control"
    }

    fn value(&self) -> Option<Vec<u8>> {
        Self::encode_value(&self.options)
    }

    fn to_json(&self) -> Value {
        let value = if self.options == GetAuthorizationEntryOptions::default() {
            JsonControlValue::Absent
        } else {
            let mut fields = Map::new();
            fields.insert(
                JSON_FIELD_INCLUDE_AUTHN_ENTRY.to_string(),
                Value::Bool(self.options.include_authn_entry),
            );
            fields.insert(
                JSON_FIELD_INCLUDE_AUTHZ_ENTRY.to_string(),
                Value::Bool(self.options.include_authz_entry),
            );
            if !self.options.attributes.is_empty() {
                fields.insert(
                    JSON_FIELD_ATTRIBUTES.to_string(),
                    Value::Array(
                        self.options
                            .attributes
                            .iter()
                            .map(|a| Value::String(a.clone()))
                            .collect(),
                    ),
                );
            }
            JsonControlValue::Structured(fields)
        };
        JsonControl::new(
            GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            Some(self.control_name().to_string()),
            self.critical,
            value,
        )
        .to_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypedControl for GetAuthorizationEntryRequestControl {
    const OID: &'static str = GET_AUTHORIZATION_ENTRY_REQUEST_OID;

    fn decode(control: &GenericControl) -> Result<Self, DecodeError> {
        control.expect_oid(Self::OID)?;
        let options = match control.value() {
            Some(value) => Self::decode_value(value)?,
            None => GetAuthorizationEntryOptions::default(),
        };
        Ok(Self::new(control.is_critical(), options))
    }

    fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError> {
        let control = JsonControl::parse(object, options, ValuePolicy::Optional)?;
        control.expect_oid(Self::OID)?;
        let decoded = match control.value() {
            JsonControlValue::Absent => GetAuthorizationEntryOptions::default(),
            JsonControlValue::Raw(bytes) => Self::decode_value(bytes)?,
            JsonControlValue::Structured(fields) => Self::decode_value_json(fields, options)?,
        };
        Ok(Self::new(control.criticality(), decoded))
    }
}

impl fmt::Display for GetAuthorizationEntryRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GetAuthorizationEntryRequestControl(isCritical={}, includeAuthNEntry={}, includeAuthZEntry={}, attributes={{{}}})",
            self.critical,
            self.options.include_authn_entry,
            self.options.include_authz_entry,
            self.options.attributes.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeErrorKind;
    use serde_json::json;

    fn options(authn: bool, authz: bool, attributes: &[&str]) -> GetAuthorizationEntryOptions {
        GetAuthorizationEntryOptions {
            include_authn_entry: authn,
            include_authz_entry: authz,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_defaults_encode_to_no_value() {
        let control = GetAuthorizationEntryRequestControl::default();
        assert!(!control.is_critical());
        assert!(control.include_authn_entry());
        assert!(control.include_authz_entry());
        assert!(control.attributes().is_empty());
        assert_eq!(control.to_generic(), GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, None));
    }

    #[test]
    fn test_absent_value_decodes_to_defaults() {
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, true, None);
        let control = GetAuthorizationEntryRequestControl::decode(&generic).unwrap();
        assert!(control.is_critical());
        assert_eq!(control.options(), &GetAuthorizationEntryOptions::default());
    }

    #[test]
    fn test_encode_exact_bytes() {
        let control = GetAuthorizationEntryRequestControl::new(false, options(false, true, &["cn", "mail"]));
        let expected = vec![
            0x30, 0x0F, 0x80, 0x01, 0x00, 0xA2, 0x0A, 0x04, 0x02, 0x63, 0x6E, 0x04, 0x04, 0x6D, 0x61, 0x69, 0x6C,
        ];
        assert_eq!(control.value(), Some(expected.clone()));

        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(expected));
        let decoded = GetAuthorizationEntryRequestControl::decode(&generic).unwrap();
        assert_eq!(decoded, control);
    }

    #[test]
    fn test_roundtrip_field_combinations() {
        for authn in [true, false] {
            for authz in [true, false] {
                for attrs in [&[][..], &["cn"][..], &["cn", "mail", "uid"][..]] {
                    let control = GetAuthorizationEntryRequestControl::new(authn, options(authn, authz, attrs));
                    let decoded = GetAuthorizationEntryRequestControl::decode(&control.to_generic()).unwrap();
                    assert_eq!(decoded, control);
                }
            }
        }
    }

    #[test]
    fn test_decode_any_element_order() {
        // [2] { "cn" }, [1] FALSE, [0] FALSE
        let value = vec![
            0x30, 0x0C, 0xA2, 0x04, 0x04, 0x02, 0x63, 0x6E, 0x81, 0x01, 0x00, 0x80, 0x01, 0x00,
        ];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let control = GetAuthorizationEntryRequestControl::decode(&generic).unwrap();
        assert_eq!(control.options(), &options(false, false, &["cn"]));
    }

    #[test]
    fn test_decode_empty_attribute_sequence() {
        let value = vec![0x30, 0x02, 0xA2, 0x00];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let control = GetAuthorizationEntryRequestControl::decode(&generic).unwrap();
        assert!(control.attributes().is_empty());
    }

    #[test]
    fn test_decode_explicit_true() {
        let value = vec![0x30, 0x03, 0x80, 0x01, 0xFF];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let control = GetAuthorizationEntryRequestControl::decode(&generic).unwrap();
        assert_eq!(control.options(), &GetAuthorizationEntryOptions::default());
    }

    #[test]
    fn test_decode_unrecognized_tag() {
        let value = vec![0x30, 0x03, 0x83, 0x01, 0x00];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let err = GetAuthorizationEntryRequestControl::decode(&generic).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
        assert!(err.to_string().contains("0x83"));
    }

    #[test]
    fn test_decode_duplicate_element() {
        // [0] FALSE, [0] FALSE
        let value = vec![0x30, 0x06, 0x80, 0x01, 0x00, 0x80, 0x01, 0x00];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let err = GetAuthorizationEntryRequestControl::decode(&generic).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
        assert!(err.to_string().contains("duplicate"));

        let value = vec![0x30, 0x04, 0xA2, 0x00, 0xA2, 0x00];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        assert!(GetAuthorizationEntryRequestControl::decode(&generic).is_err());
    }

    #[test]
    fn test_decode_attribute_must_be_octet_string() {
        // [2] { [0] "cn" }
        let value = vec![0x30, 0x06, 0xA2, 0x04, 0x80, 0x02, 0x63, 0x6E];
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(value));
        let err = GetAuthorizationEntryRequestControl::decode(&generic).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
    }

    #[test]
    fn test_decode_rejects_other_oid() {
        let generic = GenericControl::new("1.2.3", false, None);
        let err = GetAuthorizationEntryRequestControl::decode(&generic).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
        assert!(err.to_string().contains("1.2.3"));
    }

    #[test]
    fn test_json_rejects_other_oid() {
        let object = json!({ "oid": "9.9.9", "criticality": false });
        let err = GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);
        assert!(matches!(err, DecodeError::TypeMismatch { ref field, .. } if field == "oid"));
    }

    #[test]
    fn test_decode_not_a_sequence() {
        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(vec![0x04, 0x00]));
        let err = GetAuthorizationEntryRequestControl::decode(&generic).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);

        let generic = GenericControl::new(GET_AUTHORIZATION_ENTRY_REQUEST_OID, false, Some(Vec::new()));
        assert!(GetAuthorizationEntryRequestControl::decode(&generic).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let control = GetAuthorizationEntryRequestControl::new(true, options(false, true, &["cn", "mail"]));
        let value = control.to_json();
        assert_eq!(
            value,
            json!({
                "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
                "control-name": "Get Authorization Entry Request Control",
                "criticality": true,
                "value-json": {
                    "include-authentication-entry": false,
                    "include-authorization-entry": true,
                    "attributes": ["cn", "mail"]
                }
            })
        );
        let decoded =
            GetAuthorizationEntryRequestControl::decode_json(&value, &JsonDecodeOptions::strict()).unwrap();
        assert_eq!(decoded, control);
    }

    #[test]
    fn test_json_default_has_no_value_fields() {
        let value = GetAuthorizationEntryRequestControl::default().to_json();
        assert!(value.get("value-json").is_none());
        assert!(value.get("value-base64").is_none());
        let decoded =
            GetAuthorizationEntryRequestControl::decode_json(&value, &JsonDecodeOptions::strict()).unwrap();
        assert_eq!(decoded, GetAuthorizationEntryRequestControl::default());
    }

    #[test]
    fn test_json_base64_value() {
        let object = json!({
            "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            "criticality": false,
            "value-base64": "MA+AAQCiCgQCY24EBG1haWw="
        });
        let control =
            GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::strict()).unwrap();
        assert_eq!(control.options(), &options(false, true, &["cn", "mail"]));
    }

    #[test]
    fn test_json_absent_fields_take_defaults() {
        let object = json!({
            "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            "criticality": false,
            "value-json": { "attributes": ["uid"] }
        });
        let control =
            GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::strict()).unwrap();
        assert_eq!(control.options(), &options(true, true, &["uid"]));
    }

    #[test]
    fn test_json_strict_unrecognized_field() {
        let object = json!({
            "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            "criticality": false,
            "value-json": { "include-authentication-entry": true, "extra": 1 }
        });
        let err = GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::strict())
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnrecognizedField {
                field: "extra".to_string(),
                location: "value-json",
            }
        );
        assert!(GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::lenient()).is_ok());
    }

    #[test]
    fn test_json_type_mismatch() {
        let object = json!({
            "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            "criticality": false,
            "value-json": { "include-authorization-entry": "yes" }
        });
        let err = GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::lenient())
            .unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);

        let object = json!({
            "oid": GET_AUTHORIZATION_ENTRY_REQUEST_OID,
            "criticality": false,
            "value-json": { "attributes": ["cn", false] }
        });
        let err = GetAuthorizationEntryRequestControl::decode_json(&object, &JsonDecodeOptions::lenient())
            .unwrap_err();
        assert_eq!(err, DecodeError::type_mismatch("attributes[1]", "a string"));
    }

    #[test]
    fn test_display() {
        let control = GetAuthorizationEntryRequestControl::default();
        assert_eq!(
            control.to_string(),
            "GetAuthorizationEntryRequestControl(isCritical=false, includeAuthNEntry=true, includeAuthZEntry=true, attributes={})"
        );
        let control = GetAuthorizationEntryRequestControl::new(true, options(true, false, &["cn", "mail"]));
        assert_eq!(
            control.to_string(),
            "GetAuthorizationEntryRequestControl(isCritical=true, includeAuthNEntry=true, includeAuthZEntry=false, attributes={cn, mail})"
        );
    }
}
