//! Component identities and references.
//!
//! A component is identified by its root-relative path without extension
//! (`pages/index`, `components/sample-counter`). The identity also carries the
//! on-disk location of its single-file source and a scope id derived from the
//! id, used to namespace compiled output.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{COMPONENT_EXTENSION, SCOPE_ID_LEN};

/// One renderable unit: id, source location and scope id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentIdentity {
    id: String,
    path: PathBuf,
    scope_id: String,
}

impl ComponentIdentity {
    /// Build the identity of component `id` under project `root`.
    ///
    /// The id is assumed to be validated already (see
    /// [`validate_component_id`](crate::utils::path_validation::validate_component_id));
    /// this only joins paths.
    #[must_use]
    pub fn new(root: &Path, id: &str) -> Self {
        let id = id.trim_matches('/').to_string();
        let path = root.join(format!("{id}.{COMPONENT_EXTENSION}"));
        let scope_id = scope_id_for(&id);
        Self {
            id,
            path,
            scope_id,
        }
    }

    /// Root-relative id, e.g. `components/sample-counter`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location of the `.vue` source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short stable hash namespacing this component's compiled output.
    #[must_use]
    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    /// Attribute name used to scope markup and styles (`data-v-<scope>`).
    #[must_use]
    pub fn scope_attribute(&self) -> String {
        format!("data-v-{}", self.scope_id)
    }

    /// Whether the source file exists on disk.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

impl fmt::Display for ComponentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Compute the scope id of a component id.
///
/// First [`SCOPE_ID_LEN`] hex characters of the SHA-256 of the id. The id is
/// normalized to forward slashes so the value is identical on every platform.
#[must_use]
pub fn scope_id_for(id: &str) -> String {
    let normalized = id.replace('\\', "/");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..SCOPE_ID_LEN].to_string()
}

/// A capitalized tag name found in a template, e.g. `SampleCounter`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentReference {
    name: String,
}

impl ComponentReference {
    /// Wrap a tag name. Callers are expected to have matched the
    /// capitalized-tag convention already.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
        }
    }

    /// The tag name as written in the template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// On-disk file stem for this reference (`SampleCounter` → `sample-counter`).
    #[must_use]
    pub fn file_stem(&self) -> String {
        to_kebab_case(&self.name)
    }
}

impl fmt::Display for ComponentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Split at lowercase→uppercase boundaries and lowercase everything.
///
/// Only a lowercase letter followed by an uppercase letter starts a new
/// segment, so acronyms and digits stay attached (`HTMLView` → `htmlview`,
/// `Item2Card` → `item2card`).
#[must_use]
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('-');
        }
        prev_lower = ch.is_ascii_lowercase();
        out.push(ch.to_ascii_lowercase());
    }
    out
}
