// Replication repair request control.
//
// Marks an update as a replication repair so it is applied locally and not
// replicated. Carries no value.

use std::any::Any;
use std::fmt;

use serde_json::Value;

use crate::control::{Control, GenericControl, TypedControl};
use crate::controls::ensure_no_value;
use crate::error::DecodeError;
use crate::json::{JsonControl, JsonDecodeOptions, ValuePolicy};

pub const REPLICATION_REPAIR_REQUEST_OID: &str = "1.3.6.1.4.1.30221.1.5.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationRepairRequestControl {
    critical: bool,
}

impl ReplicationRepairRequestControl {
    /// Always critical.
    pub fn new() -> Self {
        Self { critical: true }
    }

    /// Used by the decoders so a received criticality survives a round trip.
    fn with_criticality(critical: bool) -> Self {
        Self { critical }
    }
}

impl Default for ReplicationRepairRequestControl {
    fn default() -> Self {
        Self::new()
    }
}

impl Control for ReplicationRepairRequestControl {
    fn oid(&self) -> &str {
        REPLICATION_REPAIR_REQUEST_OID
    }

    fn is_critical(&self) -> bool {
        self.critical
    }

    fn control_name(&self) -> &str {
        "Replication Repair Request Control"
    }

    fn value(&self) -> Option<Vec<u8>> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl TypedControl for ReplicationRepairRequestControl {
    const OID: &'static str = REPLICATION_REPAIR_REQUEST_OID;

    fn decode(control: &GenericControl) -> Result<Self, DecodeError> {
        control.expect_oid(Self::OID)?;
        ensure_no_value(control)?;
        Ok(Self::with_criticality(control.is_critical()))
    }

    fn decode_json(object: &Value, options: &JsonDecodeOptions) -> Result<Self, DecodeError> {
        let control = JsonControl::parse(object, options, ValuePolicy::Forbidden)?;
        control.expect_oid(Self::OID)?;
        Ok(Self::with_criticality(control.criticality()))
    }
}

impl fmt::Display for ReplicationRepairRequestControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplicationRepairRequestControl()")
    }
}
