//! Component id validation.
//!
//! Ids arriving from outside the engine (the client-module endpoint, the CLI)
//! are checked here before anything joins them onto the project root, so a
//! request can never name a file outside it.

use crate::core::IsletError;

/// Validate a component id such as `pages/index` or `components/sample-counter`.
///
/// A valid id is non-empty, relative, uses `/` as its only separator, has no
/// empty or `..` segments and contains only ASCII letters, digits, `-`, `_`
/// and `/`.
///
/// # Errors
///
/// Returns [`IsletError::InvalidComponentId`] describing the first rule the id breaks.
pub fn validate_component_id(id: &str) -> Result<(), IsletError> {
    let reject = |reason: &str| {
        Err(IsletError::InvalidComponentId {
            id: id.to_string(),
            reason: reason.to_string(),
        })
    };

    if id.is_empty() {
        return reject("id is empty");
    }
    if id.starts_with('/') || id.starts_with('\\') {
        return reject("absolute paths are not allowed");
    }
    if id.contains('\\') {
        return reject("backslashes are not allowed");
    }
    if id.as_bytes().get(1) == Some(&b':') {
        return reject("drive prefixes are not allowed");
    }
    if id.contains("..") {
        return reject("parent directory references are not allowed");
    }
    if let Some(bad) = id.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))) {
        return reject(&format!("character '{bad}' is not allowed"));
    }
    if id.split('/').any(str::is_empty) {
        return reject("empty path segment");
    }
    Ok(())
}
