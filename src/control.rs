// LDAP control envelope: generic control, the Control trait, and the
// BER/JSON codecs for `Control ::= SEQUENCE { controlType, criticality, controlValue }`.

use std::any::Any;
use std::fmt;

use serde_json::Value;

use crate::ber::{BerElement, BerWriter, TAG_BOOLEAN, TAG_OCTET_STRING, TAG_SEQUENCE};
use crate::error::DecodeError;
use crate::json::{JsonControl, JsonControlValue, JsonDecodeOptions, ValuePolicy};

/// Context [0] IMPLICIT SEQUENCE OF control
pub const CONTROLS_TAG: u8 = 0xA0;

/// Behavior shared by every control, typed or generic.
pub trait Control: fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn oid(&self) -> &str;

    fn is_critical(&self) -> bool;

    /// Human-readable name. Informational only, never used for dispatch.
    fn control_name(&self) -> &str;

    /// Encoded BER value, if the control has one.
    fn value(&self) -> Option<Vec<u8>>;

    fn to_generic(&self) -> GenericControl {
        GenericControl::new(self.oid(), self.is_critical(), self.value())
    }

    /// JSON object form. The default carries the raw value as `value-base64`.
    fn to_json(&self) -> Value {
        let value = match self.value() {
            Some(bytes) => JsonControlValue::Raw(bytes),
            None => JsonControlValue::Absent,
        };
        JsonControl::new(
            self.oid(),
            Some(self.control_name().to_string()),
            self.is_critical(),
            value,
        )
        .to_value()
    }

    fn as_any(&self) -> &dyn Any;
}

/// A control type with a fixed OID and its own value format.
pub trait TypedControl: Control + Sized {
    const OID: &'static str;

    /// Builds the typed control from a generic one. An envelope whose OID is
    /// not [`Self::OID`] is rejected, so the decoded control keeps the wire OID.
    fn decode(control: &GenericControl) -> Result<Self, DecodeError>;

    /// Same as [`Self::decode`] for the JSON form; a foreign `oid` is a type mismatch.
    fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError>;
}

/// A control as carried on the wire: OID, criticality, and opaque value bytes.
///
/// An absent value and a present empty value are distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericControl {
    oid: String,
    critical: bool,
    value: Option<Vec<u8>>,
}

impl GenericControl {
    pub fn new(oid: impl Into<String>, critical: bool, value: Option<Vec<u8>>) -> Self {
        Self {
            oid: oid.into(),
            critical,
            value,
        }
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn into_value(self) -> Option<Vec<u8>> {
        self.value
    }

    /// Fails unless this envelope carries `expected` as its OID.
    pub fn expect_oid(&self, expected: &str) -> Result<(), DecodeError> {
        if self.oid != expected {
            return Err(DecodeError::malformed(
                &self.oid,
                format!("control type {} cannot decode OID {}", expected, self.oid),
            ));
        }
        Ok(())
    }

    /// Writes the control SEQUENCE. Criticality is omitted when false.
    pub fn encode_ber(&self, writer: &mut BerWriter) {
        let seq_start = writer.start_sequence();
        writer.write_string(&self.oid);
        if self.critical {
            writer.write_boolean(true);
        }
        if let Some(value) = &self.value {
            writer.write_octet_string(value);
        }
        writer.end_sequence(seq_start);
    }

    pub fn to_ber(&self) -> Vec<u8> {
        let mut writer = BerWriter::new();
        self.encode_ber(&mut writer);
        writer.into_vec()
    }

    /// Decodes exactly one control SEQUENCE.
    pub fn decode_ber(data: &[u8]) -> Result<Self, DecodeError> {
        let element = BerElement::decode(data)?;
        Self::from_element(element)
    }

    pub(crate) fn from_element(element: BerElement<'_>) -> Result<Self, DecodeError> {
        let children = element.expect_tag(TAG_SEQUENCE)?.elements()?;
        let mut children = children.into_iter();

        let oid = match children.next() {
            Some(e) if e.tag == TAG_OCTET_STRING => e.as_string()?,
            Some(e) => {
                return Err(DecodeError::MalformedBinaryEncoding {
                    oid: None,
                    reason: format!("expected control type OCTET STRING, got tag 0x{:02X}", e.tag),
                })
            }
            None => {
                return Err(DecodeError::MalformedBinaryEncoding {
                    oid: None,
                    reason: "empty control sequence".to_string(),
                })
            }
        };
        if oid.is_empty() {
            return Err(DecodeError::MalformedBinaryEncoding {
                oid: None,
                reason: "empty control type".to_string(),
            });
        }

        let mut critical = false;
        let mut value = None;
        let mut seen_value = false;
        let mut seen_criticality = false;
        for child in children {
            match child.tag {
                TAG_BOOLEAN if !seen_criticality && !seen_value => {
                    critical = child
                        .as_boolean()
                        .map_err(|e| DecodeError::malformed(&oid, e))?;
                    seen_criticality = true;
                }
                TAG_OCTET_STRING if !seen_value => {
                    value = Some(child.as_octet_string().to_vec());
                    seen_value = true;
                }
                tag => {
                    return Err(DecodeError::malformed(
                        &oid,
                        format!("unexpected element with tag 0x{:02X} in control sequence", tag),
                    ))
                }
            }
        }

        Ok(Self {
            oid,
            critical,
            value,
        })
    }

    /// JSON form with the value, if any, as `value-base64`. The control name
    /// is the OID since nothing more specific is known.
    pub fn to_json(&self) -> Value {
        Control::to_json(self)
    }

    /// Decodes a control object without type-specific knowledge. A
    /// `value-json` field cannot be interpreted here and is rejected.
    pub fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError> {
        let control = JsonControl::parse(object, options, ValuePolicy::Optional)?;
        let oid = control.oid().to_string();
        let critical = control.criticality();
        let value = match control.into_value() {
            JsonControlValue::Absent => None,
            JsonControlValue::Raw(bytes) => Some(bytes),
            JsonControlValue::Structured(_) => {
                return Err(DecodeError::ConflictingValueRepresentation {
                    oid,
                    reason: "value-json is not supported for controls without a registered decoder",
                })
            }
        };
        Ok(Self {
            oid,
            critical,
            value,
        })
    }
}

impl Control for GenericControl {
    fn oid(&self) -> &str {
        &self.oid
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn control_name(&self) -> &str {
        &self.oid
    }

    fn value(&self) -> Option<Vec<u8>> {
        self.value.clone()
    }

    fn to_generic(&self) -> GenericControl {
        self.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for GenericControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Control(oid={}, isCritical={}", self.oid, self.critical)?;
        if let Some(value) = &self.value {
            write!(f, ", value={}", hex::encode(value))?;
        }
        f.write_str(")")
    }
}

/// Encodes a `[0]` list of controls as it appears at the end of an LDAP message.
pub fn encode_controls(controls: &[GenericControl]) -> Vec<u8> {
    let mut writer = BerWriter::new();
    let start = writer.start_sequence_tagged(CONTROLS_TAG);
    for control in controls {
        control.encode_ber(&mut writer);
    }
    writer.end_sequence(start);
    writer.into_vec()
}

/// Decodes a `[0]` SEQUENCE OF control. Order is preserved.
pub fn decode_controls(data: &[u8]) -> Result<Vec<GenericControl>, DecodeError> {
    let list = BerElement::decode(data)?.expect_tag(CONTROLS_TAG)?;
    list.elements()?
        .into_iter()
        .map(GenericControl::from_element)
        .collect()
}

/// Finds the first control with `C::OID` and decodes it.
pub fn find_control<C: TypedControl>(controls: &[GenericControl]) -> Result<Option<C>, DecodeError> {
    match controls.iter().find(|c| c.oid() == C::OID) {
        Some(control) => C::decode(control).map(Some),
        None => Ok(None),
    }
}
