pub mod ber;
pub mod config;
pub mod control;
pub mod controls;
pub mod error;
pub mod json;
pub mod metrics;
pub mod registry;

pub use config::Config;
pub use control::{decode_controls, encode_controls, find_control, Control, GenericControl, TypedControl, CONTROLS_TAG};
pub use controls::register_default_controls;
pub use error::{DecodeError, DecodeErrorKind};
pub use json::JsonDecodeOptions;
pub use metrics::DecodeMetrics;
pub use registry::{ControlDecoder, ControlRegistry, DecodedControl, TypedDecoder};
