//! Utility modules: JSON/BSON conversion and wire-named enums.
pub mod json;
pub(crate) mod wire;
