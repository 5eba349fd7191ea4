// Suppress referential integrity updates request control.
//
// Tells the server not to apply referential integrity processing for a
// delete or modify DN. Carries no value.

use std::any::Any;
use std::fmt;

use serde_json::Value;

use crate::control::{Control, GenericControl, TypedControl};
use crate::controls::ensure_no_value;
use crate::error::DecodeError;
use crate::json::{JsonControl, JsonDecodeOptions, ValuePolicy};

pub const SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES_REQUEST_OID: &str = "1.3.6.1.4.1.30221.2.5.30";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressReferentialIntegrityUpdatesRequestControl {
    critical: bool,
}

impl SuppressReferentialIntegrityUpdatesRequestControl {
    pub fn new(critical: bool) -> Self {
        Self { critical }
    }
}

/// Critical by default.
impl Default for SuppressReferentialIntegrityUpdatesRequestControl {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Control for SuppressReferentialIntegrityUpdatesRequestControl {
    fn oid(&self) -> &str {
        SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES_REQUEST_OID
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn control_name(&self) -> &str {
        "Suppress Referential Integrity Updates Request Control"
    }

    fn value(&self) -> Option<Vec<u8>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypedControl for SuppressReferentialIntegrityUpdatesRequestControl {
    const OID: &'static str = SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES_REQUEST_OID;

    fn decode(control: &GenericControl) -> Result<Self, DecodeError> {
        control.expect_oid(Self::OID)?;
        ensure_no_value(control)?;
        Ok(Self::new(control.is_critical()))
    }

    fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError> {
        let control = JsonControl::parse(object, options, ValuePolicy::Forbidden)?;
        control.expect_oid(Self::OID)?;
        Ok(Self::new(control.criticality()))
    }
}

impl fmt::Display for SuppressReferentialIntegrityUpdatesRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SuppressReferentialIntegrityUpdatesRequestControl(isCritical={})",
            self.critical
        )
    }
}
