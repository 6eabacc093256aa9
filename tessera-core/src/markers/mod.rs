//! Positional marker construction and payload codecs

pub mod builder;
pub mod payload;

pub use builder::{build_markers, serialize_base_document, MarkerBuildOutput};
pub use payload::{parse_payload, render_payload, PayloadRecord};
