//! Shared helpers.
//!
//! - [`path_validation`] - Validation of component ids received from outside the engine

pub mod path_validation;

pub use path_validation::validate_component_id;
