// Content synchronization request control (RFC 4533).
//
//   syncRequestValue ::= SEQUENCE {
//       mode ENUMERATED {
//           -- 0 unused
//           refreshOnly       (1),
//           -- 2 reserved
//           refreshAndPersist (3)
//       },
//       cookie     syncCookie OPTIONAL,
//       reloadHint BOOLEAN DEFAULT FALSE
//   }

use std::any::Any;
use std::fmt;

use serde_json::{Map, Value};

use crate::ber::{BerElement, BerError, BerWriter, TAG_BOOLEAN, TAG_ENUMERATED, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::control::{Control, GenericControl, TypedControl};
use crate::error::DecodeError;
use crate::json::{
    encode_base64, JsonControl, JsonControlValue, JsonDecodeOptions, JsonValueObject, ValuePolicy,
};

/// RFC 4533 Sync Request Control OID
pub const SYNC_REQUEST_OID: &str = "1.3.6.1.4.1.4203.1.9.1.1";

const JSON_FIELD_MODE: &str = "mode";
const JSON_FIELD_COOKIE: &str = "cookie";
const JSON_FIELD_RELOAD_HINT: &str = "reload-hint";

const JSON_MODE_REFRESH_ONLY: &str = "refresh-only";
const JSON_MODE_REFRESH_AND_PERSIST: &str = "refresh-and-persist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncRequestMode {
    #[default]
    RefreshOnly = 1,
    RefreshAndPersist = 3,
}

impl SyncRequestMode {
    pub fn as_json_str(self) -> &'static str {
        match self {
            SyncRequestMode::RefreshOnly => JSON_MODE_REFRESH_ONLY,
            SyncRequestMode::RefreshAndPersist => JSON_MODE_REFRESH_AND_PERSIST,
        }
    }

    fn from_json_str(value: &str) -> Option<Self> {
        match value {
            JSON_MODE_REFRESH_ONLY => Some(SyncRequestMode::RefreshOnly),
            JSON_MODE_REFRESH_AND_PERSIST => Some(SyncRequestMode::RefreshAndPersist),
            _ => None,
        }
    }
}

impl TryFrom<u8> for SyncRequestMode {
    type Error = DecodeError;
    fn try_from(value: u8) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(SyncRequestMode::RefreshOnly),
            3 => Ok(SyncRequestMode::RefreshAndPersist),
            _ => Err(DecodeError::malformed(
                SYNC_REQUEST_OID,
                format!("invalid sync request mode: {}", value),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncRequestOptions {
    pub mode: SyncRequestMode,
    pub cookie: Option<Vec<u8>>,
    pub reload_hint: bool,
}

/// Parsed Sync Request control (RFC 4533)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncRequestControl {
    critical: bool,
    options: SyncRequestOptions,
}

impl SyncRequestControl {
    pub fn new(critical: bool, options: SyncRequestOptions) -> Self {
        Self { critical, options }
    }

    pub fn mode(&self) -> SyncRequestMode {
        self.options.mode
    }

    pub fn is_refresh_and_persist(&self) -> bool {
        self.options.mode == SyncRequestMode::RefreshAndPersist
    }

    pub fn cookie(&self) -> Option<&[u8]> {
        self.options.cookie.as_deref()
    }

    pub fn reload_hint(&self) -> bool {
        self.options.reload_hint
    }

    pub fn options(&self) -> &SyncRequestOptions {
        &self.options
    }

    fn encode_value(options: &SyncRequestOptions) -> Vec<u8> {
        let mut writer = BerWriter::new();
        let seq_start = writer.start_sequence();
        writer.write_enumerated(options.mode as u8);
        if let Some(cookie) = &options.cookie {
            writer.write_octet_string(cookie);
        }
        if options.reload_hint {
            writer.write_boolean(true);
        }
        writer.end_sequence(seq_start);
        writer.into_vec()
    }

    fn decode_value(data: &[u8]) -> Result<SyncRequestOptions, DecodeError> {
        let malformed = |e: BerError| DecodeError::malformed(SYNC_REQUEST_OID, e);
        let sequence = BerElement::decode(data)
            .and_then(|e| e.expect_tag(TAG_SEQUENCE))
            .map_err(malformed)?;
        let mut elements = sequence.elements().map_err(malformed)?.into_iter();

        let mode = match elements.next() {
            Some(e) => e.expect_tag(TAG_ENUMERATED).and_then(|e| e.as_enumerated()).map_err(malformed)?,
            None => return Err(DecodeError::malformed(SYNC_REQUEST_OID, "missing sync request mode")),
        };
        let mut options = SyncRequestOptions {
            mode: SyncRequestMode::try_from(mode)?,
            ..Default::default()
        };

        let mut seen_reload_hint = false;
        for element in elements {
            match element.tag {
                // mode, cookie, reloadHint: the cookie may not follow the hint
                TAG_OCTET_STRING if options.cookie.is_none() && !seen_reload_hint => {
                    options.cookie = Some(element.as_octet_string().to_vec());
                }
                TAG_BOOLEAN if !seen_reload_hint => {
                    options.reload_hint = element.as_boolean().map_err(malformed)?;
                    seen_reload_hint = true;
                }
                tag => {
                    return Err(DecodeError::malformed(
                        SYNC_REQUEST_OID,
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
    ) -> Result<SyncRequestOptions, DecodeError> {
        let object = JsonValueObject::new(fields);
        let mode = object
            .get_string(JSON_FIELD_MODE)?
            .ok_or_else(|| DecodeError::missing_field(JSON_FIELD_MODE))?;
        let mode = SyncRequestMode::from_json_str(mode).ok_or_else(|| {
            DecodeError::type_mismatch(JSON_FIELD_MODE, "\"refresh-only\" or \"refresh-and-persist\"")
        })?;
        let decoded = SyncRequestOptions {
            mode,
            cookie: object.get_base64(JSON_FIELD_COOKIE)?,
            reload_hint: object.get_bool(JSON_FIELD_RELOAD_HINT)?.unwrap_or(false),
        };
        object.check_unrecognized(
            &[JSON_FIELD_MODE, JSON_FIELD_COOKIE, JSON_FIELD_RELOAD_HINT],
            options,
        )?;
        Ok(decoded)
    }
}

impl Control for SyncRequestControl {
    fn oid(&self) -> &str {
        SYNC_REQUEST_OID
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn control_name(&self) -> &str {
        "Content Synchronization Request Control"
    }

    fn value(&self) -> Option<Vec<u8>> {
        Some(Self::encode_value(&self.options))
    }

    fn to_json(&self) -> Value {
        let mut fields = Map::new();
        fields.insert(
            JSON_FIELD_MODE.to_string(),
            Value::String(self.options.mode.as_json_str().to_string()),
        );
        if let Some(cookie) = &self.options.cookie {
            fields.insert(JSON_FIELD_COOKIE.to_string(), Value::String(encode_base64(cookie)));
        }
        fields.insert(JSON_FIELD_RELOAD_HINT.to_string(), Value::Bool(self.options.reload_hint));
        JsonControl::new(
            SYNC_REQUEST_OID,
            Some(self.control_name().to_string()),
            self.critical,
            JsonControlValue::Structured(fields),
        )
        .to_value()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypedControl for SyncRequestControl {
    const OID: &'static str = SYNC_REQUEST_OID;

    fn decode(control: &GenericControl) -> Result<Self, DecodeError> {
        control.expect_oid(Self::OID)?;
        let value = control.value().ok_or_else(|| DecodeError::MissingValue {
            oid: SYNC_REQUEST_OID.to_string(),
        })?;
        Ok(Self::new(control.is_critical(), Self::decode_value(value)?))
    }

    fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError> {
        let control = JsonControl::parse(object, options, ValuePolicy::Required)?;
        control.expect_oid(Self::OID)?;
        let decoded = match control.value() {
            JsonControlValue::Raw(bytes) => Self::decode_value(bytes)?,
            JsonControlValue::Structured(fields) => Self::decode_value_json(fields, options)?,
            JsonControlValue::Absent => {
                return Err(DecodeError::MissingValue {
                    oid: SYNC_REQUEST_OID.to_string(),
                })
            }
        };
        Ok(Self::new(control.criticality(), decoded))
    }
}

impl fmt::Display for SyncRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncRequestControl(isCritical={}, mode={}", self.critical, self.options.mode.as_json_str())?;
        if let Some(cookie) = &self.options.cookie {
            write!(f, ", cookie={}", hex::encode(cookie))?;
        }
        write!(f, ", reloadHint={})", self.options.reload_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::find_control;
    use crate::error::DecodeErrorKind;
    use serde_json::json;

    fn generic(value: Option<Vec<u8>>) -> GenericControl {
        GenericControl::new(SYNC_REQUEST_OID, false, value)
    }

    #[test]
    fn test_find_control_none() {
        assert!(find_control::<SyncRequestControl>(&[]).unwrap().is_none());
    }

    #[test]
    fn test_find_control_wrong_oid() {
        let controls = vec![GenericControl::new("1.2.3.4", false, None)];
        assert!(find_control::<SyncRequestControl>(&controls).unwrap().is_none());
    }

    #[test]
    fn test_sync_request_control_refresh_and_persist() {
        // SEQUENCE { ENUMERATED 3 } (mode = refreshAndPersist)
        let controls = vec![generic(Some(vec![0x30, 0x03, 0x0A, 0x01, 0x03]))];
        let ctrl = find_control::<SyncRequestControl>(&controls).unwrap().unwrap();
        assert_eq!(ctrl.mode(), SyncRequestMode::RefreshAndPersist);
        assert!(ctrl.is_refresh_and_persist());
        assert!(ctrl.cookie().is_none());
        assert!(!ctrl.reload_hint());
    }

    #[test]
    fn test_sync_request_control_refresh_only() {
        let ctrl = SyncRequestControl::decode(&generic(Some(vec![0x30, 0x03, 0x0A, 0x01, 0x01]))).unwrap();
        assert_eq!(ctrl.mode(), SyncRequestMode::RefreshOnly);
        assert!(!ctrl.is_refresh_and_persist());
    }

    #[test]
    fn test_encode_with_cookie_and_reload_hint() {
        let control = SyncRequestControl::new(
            false,
            SyncRequestOptions {
                mode: SyncRequestMode::RefreshOnly,
                cookie: Some(b"abc".to_vec()),
                reload_hint: true,
            },
        );
        assert_eq!(
            control.value(),
            Some(vec![0x30, 0x0B, 0x0A, 0x01, 0x01, 0x04, 0x03, b'a', b'b', b'c', 0x01, 0x01, 0xFF])
        );
        assert_eq!(SyncRequestControl::decode(&control.to_generic()).unwrap(), control);
    }

    #[test]
    fn test_roundtrip_field_combinations() {
        for mode in [SyncRequestMode::RefreshOnly, SyncRequestMode::RefreshAndPersist] {
            for cookie in [None, Some(Vec::new()), Some(vec![0x00, 0xFF])] {
                for reload_hint in [false, true] {
                    let control = SyncRequestControl::new(
                        reload_hint,
                        SyncRequestOptions {
                            mode,
                            cookie: cookie.clone(),
                            reload_hint,
                        },
                    );
                    assert_eq!(SyncRequestControl::decode(&control.to_generic()).unwrap(), control);
                }
            }
        }
    }

    #[test]
    fn test_decode_missing_value() {
        let err = SyncRequestControl::decode(&generic(None)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingValue {
                oid: SYNC_REQUEST_OID.to_string()
            }
        );
    }

    #[test]
    fn test_decode_invalid_mode() {
        let err = SyncRequestControl::decode(&generic(Some(vec![0x30, 0x03, 0x0A, 0x01, 0x02]))).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
        assert!(SyncRequestMode::try_from(0).is_err());
        assert!(SyncRequestMode::try_from(255).is_err());
    }

    #[test]
    fn test_decode_unrecognized_element() {
        let value = vec![0x30, 0x06, 0x0A, 0x01, 0x01, 0x80, 0x01, 0x00];
        let err = SyncRequestControl::decode(&generic(Some(value))).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
    }

    #[test]
    fn test_decode_cookie_after_reload_hint() {
        // mode refreshOnly, reloadHint TRUE, cookie "ab"
        let value = vec![0x30, 0x0A, 0x0A, 0x01, 0x01, 0x01, 0x01, 0xFF, 0x04, 0x02, 0x61, 0x62];
        let err = SyncRequestControl::decode(&generic(Some(value))).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
    }

    #[test]
    fn test_decode_rejects_other_oid() {
        let control = GenericControl::new("1.2.3", false, Some(vec![0x30, 0x03, 0x0A, 0x01, 0x01]));
        let err = SyncRequestControl::decode(&control).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);

        let object = json!({ "oid": "1.2.3", "criticality": false, "value-json": { "mode": "refresh-only" } });
        let err = SyncRequestControl::decode_json(&object, &JsonDecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);
    }

    #[test]
    fn test_decode_empty_sequence() {
        let err = SyncRequestControl::decode(&generic(Some(vec![0x30, 0x00]))).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::MalformedBinaryEncoding);
    }

    #[test]
    fn test_json_roundtrip() {
        let control = SyncRequestControl::new(
            true,
            SyncRequestOptions {
                mode: SyncRequestMode::RefreshAndPersist,
                cookie: Some(vec![1, 2, 3]),
                reload_hint: false,
            },
        );
        let value = control.to_json();
        assert_eq!(
            value,
            json!({
                "oid": SYNC_REQUEST_OID,
                "control-name": "Content Synchronization Request Control",
                "criticality": true,
                "value-json": {
                    "mode": "refresh-and-persist",
                    "cookie": "AQID",
                    "reload-hint": false
                }
            })
        );
        assert_eq!(SyncRequestControl::decode_json(&value, &JsonDecodeOptions::strict()).unwrap(), control);
    }

    #[test]
    fn test_json_requires_value() {
        let object = json!({ "oid": SYNC_REQUEST_OID, "criticality": false });
        let err = SyncRequestControl::decode_json(&object, &JsonDecodeOptions::lenient()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::ConflictingValueRepresentation);
    }

    #[test]
    fn test_json_mode_errors() {
        let object = json!({ "oid": SYNC_REQUEST_OID, "criticality": false, "value-json": {} });
        let err = SyncRequestControl::decode_json(&object, &JsonDecodeOptions::lenient()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                field: "mode".to_string()
            }
        );

        let object = json!({ "oid": SYNC_REQUEST_OID, "criticality": false, "value-json": { "mode": "persist" } });
        let err = SyncRequestControl::decode_json(&object, &JsonDecodeOptions::lenient()).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::TypeMismatch);
    }

    #[test]
    fn test_json_base64_value() {
        let object = json!({ "oid": SYNC_REQUEST_OID, "criticality": false, "value-base64": "MAMKAQM=" });
        let control = SyncRequestControl::decode_json(&object, &JsonDecodeOptions::strict()).unwrap();
        assert!(control.is_refresh_and_persist());
    }

    #[test]
    fn test_display() {
        let control = SyncRequestControl::new(
            false,
            SyncRequestOptions {
                mode: SyncRequestMode::RefreshOnly,
                cookie: Some(vec![0xAB]),
                reload_hint: true,
            },
        );
        assert_eq!(
            control.to_string(),
            "SyncRequestControl(isCritical=false, mode=refresh-only, cookie=ab, reloadHint=true)"
        );
    }
}
