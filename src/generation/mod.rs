//! Tool bundle generation from a detected capability gap.

pub mod generator;
pub mod metadata;
pub mod templates;

pub use generator::ToolGenerator;
pub use metadata::{MetadataStatus, ToolMetadata};
