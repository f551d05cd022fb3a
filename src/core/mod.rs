//! Core types and error handling for islet.
//!
//! - [`error`] - The error taxonomy ([`IsletError`]) and CLI error reporting
//! - [`component`] - Component identities, scope ids and template references

pub mod component;
pub mod error;

pub use component::{ComponentIdentity, ComponentReference, scope_id_for, to_kebab_case};
pub use error::{ErrorContext, IsletError, user_friendly_error};
