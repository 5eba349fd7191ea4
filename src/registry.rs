//! OID-keyed decoder registry.
//!
//! Lookups are lock-free loads of an immutable map; registration clones the
//! map and swaps it in, so readers never observe a partial update. The last
//! registration for an OID wins.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use serde_json::Value;
use tracing::{debug, info};

use crate::control::{Control, GenericControl, TypedControl};
use crate::controls::register_default_controls;
use crate::error::DecodeError;
use crate::json::{JsonDecodeOptions, JSON_FIELD_OID};
use crate::metrics::DecodeMetrics;

/// Rebuilds a typed control from its generic envelope.
pub trait ControlDecoder: Send + Sync {
    fn decode(&self, control: &GenericControl) -> Result<Box<dyn Control>, DecodeError>;

    /// Decodes a JSON control object. Decoders without a structured JSON
    /// mapping accept `value-base64` only and go through [`Self::decode`].
    fn decode_json(
        &self,
        object: &Value,
        options: &JsonDecodeOptions,
    ) -> Result<Box<dyn Control>, DecodeError> {
        let generic = GenericControl::decode_json(object, options)?;
        self.decode(&generic)
    }
}

impl<F> ControlDecoder for F
where
    F: Fn(&GenericControl) -> Result<Box<dyn Control>, DecodeError> + Send + Sync,
{
    fn decode(&self, control: &GenericControl) -> Result<Box<dyn Control>, DecodeError> {
        self(control)
    }
}

/// Decoder for a statically known control type, covering both BER and JSON.
pub struct TypedDecoder<C>(PhantomData<fn() -> C>);

impl<C> TypedDecoder<C> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C> Default for TypedDecoder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TypedControl> ControlDecoder for TypedDecoder<C> {
    fn decode(&self, control: &GenericControl) -> Result<Box<dyn Control>, DecodeError> {
        control.expect_oid(C::OID)?;
        Ok(Box::new(C::decode(control)?))
    }

    fn decode_json(
        &self,
        object: &Value,
        options: &JsonDecodeOptions,
    ) -> Result<Box<dyn Control>, DecodeError> {
        if let Some(Value::String(oid)) = object.get(JSON_FIELD_OID) {
            if oid != C::OID {
                return Err(DecodeError::type_mismatch(
                    JSON_FIELD_OID,
                    "the OID of the decoded control type",
                ));
            }
        }
        Ok(Box::new(C::decode_json(object, options)?))
    }
}

/// Result of a registry decode.
#[derive(Debug)]
pub enum DecodedControl {
    Typed(Box<dyn Control>),
    /// No decoder is registered for the OID.
    Generic(GenericControl),
}

impl DecodedControl {
    pub fn as_control(&self) -> &dyn Control {
        match self {
            DecodedControl::Typed(control) => &**control,
            DecodedControl::Generic(control) => control,
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, DecodedControl::Typed(_))
    }

    pub fn downcast_ref<T: Control>(&self) -> Option<&T> {
        self.as_control().as_any().downcast_ref::<T>()
    }

    pub fn to_generic(&self) -> GenericControl {
        self.as_control().to_generic()
    }

    pub fn to_json(&self) -> Value {
        self.as_control().to_json()
    }
}

impl fmt::Display for DecodedControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_control(), f)
    }
}

type DecoderMap = HashMap<String, Arc<dyn ControlDecoder>>;

pub struct ControlRegistry {
    decoders: ArcSwap<DecoderMap>,
    metrics: Arc<DecodeMetrics>,
}

impl ControlRegistry {
    /// An empty registry: every control passes through as generic.
    pub fn new() -> Self {
        Self {
            decoders: ArcSwap::from_pointee(HashMap::new()),
            metrics: Arc::new(DecodeMetrics::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        register_default_controls(&registry);
        registry
    }

    /// Process-wide registry, initialized with the default controls on first use.
    pub fn global() -> &'static ControlRegistry {
        static GLOBAL: OnceLock<ControlRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ControlRegistry::with_defaults)
    }

    pub fn register<D>(&self, oid: impl Into<String>, decoder: D)
    where
        D: ControlDecoder + 'static,
    {
        self.register_arc(oid, Arc::new(decoder));
    }

    pub fn register_arc(&self, oid: impl Into<String>, decoder: Arc<dyn ControlDecoder>) {
        let oid = oid.into();
        let previous = self.decoders.rcu(|current| {
            let mut next = DecoderMap::clone(current);
            next.insert(oid.clone(), Arc::clone(&decoder));
            next
        });
        let replaced = previous.contains_key(&oid);
        self.metrics.inc_registration(replaced);
        if replaced {
            info!(oid = %oid, "Replaced control decoder");
        } else {
            debug!(oid = %oid, "Registered control decoder");
        }
    }

    pub fn register_typed<C: TypedControl>(&self) {
        self.register(C::OID, TypedDecoder::<C>::new());
    }

    pub fn decoder(&self, oid: &str) -> Option<Arc<dyn ControlDecoder>> {
        self.decoders.load().get(oid).cloned()
    }

    pub fn is_registered(&self, oid: &str) -> bool {
        self.decoders.load().contains_key(oid)
    }

    /// OIDs with a registered decoder, sorted.
    pub fn registered_oids(&self) -> Vec<String> {
        let mut oids: Vec<String> = self.decoders.load().keys().cloned().collect();
        oids.sort();
        oids
    }

    /// Decodes with the registered decoder, or returns `control` unchanged when
    /// none is registered. Decoder errors are propagated.
    pub fn decode(&self, control: GenericControl) -> Result<DecodedControl, DecodeError> {
        let Some(decoder) = self.decoder(control.oid()) else {
            debug!(oid = %control.oid(), "No decoder registered, passing control through");
            self.metrics.inc_passthrough();
            return Ok(DecodedControl::Generic(control));
        };
        let result = decoder.decode(&control);
        self.record(control.oid(), result).map(DecodedControl::Typed)
    }

    /// Decodes every control of a message, preserving order. Stops at the first error.
    pub fn decode_all<I>(&self, controls: I) -> Result<Vec<DecodedControl>, DecodeError>
    where
        I: IntoIterator<Item = GenericControl>,
    {
        controls.into_iter().map(|c| self.decode(c)).collect()
    }

    /// Dispatches a JSON control object on its `oid` field.
    pub fn decode_json(
        &self,
        object: &Value,
        options: &JsonDecodeOptions,
    ) -> Result<DecodedControl, DecodeError> {
        let oid = match object.get(JSON_FIELD_OID) {
            Some(Value::String(oid)) => oid.as_str(),
            // Let the envelope parser report the precise problem.
            _ => return GenericControl::decode_json(object, options).map(DecodedControl::Generic),
        };
        let Some(decoder) = self.decoder(oid) else {
            debug!(oid = %oid, "No decoder registered, decoding JSON control as generic");
            let generic = GenericControl::decode_json(object, options)?;
            self.metrics.inc_passthrough();
            return Ok(DecodedControl::Generic(generic));
        };
        let result = decoder.decode_json(object, options);
        self.record(oid, result).map(DecodedControl::Typed)
    }

    pub fn metrics(&self) -> &Arc<DecodeMetrics> {
        &self.metrics
    }

    fn record(
        &self,
        oid: &str,
        result: Result<Box<dyn Control>, DecodeError>,
    ) -> Result<Box<dyn Control>, DecodeError> {
        match &result {
            Ok(_) => self.metrics.inc_decoded(oid),
            Err(e) => {
                debug!(oid = %oid, kind = %e.kind(), error = %e, "Failed to decode control");
                self.metrics.inc_error(oid, e.kind());
            }
        }
        result
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ControlRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRegistry")
            .field("oids", &self.registered_oids())
            .finish()
    }
}
