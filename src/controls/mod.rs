//! Concrete request controls.

pub mod get_authorization_entry;
pub mod replication_repair;
pub mod suppress_referential_integrity_updates;
pub mod sync_request;

pub use get_authorization_entry::{
    GetAuthorizationEntryOptions, GetAuthorizationEntryRequestControl,
    GET_AUTHORIZATION_ENTRY_REQUEST_OID,
};
pub use replication_repair::{ReplicationRepairRequestControl, REPLICATION_REPAIR_REQUEST_OID};
pub use suppress_referential_integrity_updates::{
    SuppressReferentialIntegrityUpdatesRequestControl,
    SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES_REQUEST_OID,
};
pub use sync_request::{SyncRequestControl, SyncRequestMode, SyncRequestOptions, SYNC_REQUEST_OID};

use crate::control::GenericControl;
use crate::error::DecodeError;
use crate::registry::ControlRegistry;

/// Registers decoders for every control in this module.
pub fn register_default_controls(registry: &ControlRegistry) {
    registry.register_typed::<GetAuthorizationEntryRequestControl>();
    registry.register_typed::<SuppressReferentialIntegrityUpdatesRequestControl>();
    registry.register_typed::<ReplicationRepairRequestControl>();
    registry.register_typed::<SyncRequestControl>();
}

/// Rejects any value, including an empty one.
pub(crate) fn ensure_no_value(control: &GenericControl) -> Result<(), DecodeError> {
    if control.has_value() {
        return Err(DecodeError::UnexpectedValue {
            oid: control.oid().to_string(),
        });
    }
    Ok(())
}
