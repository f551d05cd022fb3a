//! Sub-component discovery.
//!
//! A template references a nested component by using a capitalized tag name
//! (`<SampleCounter/>`, `<UserCard :user="u">`). Lowercase and kebab-case tags
//! are always native markup. Each reference maps to the component file
//! `<components_dir>/<kebab-name>.vue`; references whose file does not exist
//! are dropped here and fail later, at render time, as unknown tags.
//!
//! # Ordering
//!
//! References are returned in order of first appearance and each name appears
//! once, so generated import lists are deterministic.
//!
//! # Example
//!
//! ```rust
//! use islet::resolver::scan_references;
//!
//! let refs = scan_references("<div><SampleCounter/><sample-counter/><SampleCounter/></div>");
//! assert_eq!(refs.len(), 1);
//! assert_eq!(refs[0].name(), "SampleCounter");
//! ```

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{ComponentIdentity, ComponentReference};

/// A reference whose component file exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComponent {
    /// Tag name as used in the template
    pub reference: ComponentReference,
    /// Component the tag resolves to
    pub identity: ComponentIdentity,
}

/// Collect capitalized tag names from `template`, deduplicated, in order of
/// first appearance. Tags inside HTML comments are ignored.
#[must_use]
pub fn scan_references(template: &str) -> Vec<ComponentReference> {
    let text = strip_comments(template);
    let mut seen = HashSet::new();
    let mut references = Vec::new();

    if let Ok(tag_regex) = Regex::new(r"<([A-Z][A-Za-z0-9]*)(?:[\s/>]|$)") {
        for cap in tag_regex.captures_iter(&text) {
            if let Some(name) = cap.get(1) {
                if seen.insert(name.as_str().to_string()) {
                    references.push(ComponentReference::new(name.as_str()));
                }
            }
        }
    }

    references
}

/// Blank out `<!-- ... -->` so commented-out components are not picked up.
fn strip_comments(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return out,
        }
        out.push(' ');
    }
    out.push_str(rest);
    out
}

/// Maps template references to component identities on disk.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    components_dir: String,
}

impl Resolver {
    /// Resolve references under `root`, looking in `components_dir` (relative
    /// to `root`; empty means the root itself).
    pub fn new(root: impl Into<PathBuf>, components_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            components_dir: components_dir.into().trim_matches('/').to_string(),
        }
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identity a reference maps to, whether or not its file exists.
    #[must_use]
    pub fn identity_for(&self, reference: &ComponentReference) -> ComponentIdentity {
        let stem = reference.file_stem();
        let id = if self.components_dir.is_empty() {
            stem
        } else {
            format!("{}/{stem}", self.components_dir)
        };
        ComponentIdentity::new(&self.root, &id)
    }

    /// Scan `template` and keep the references whose component file exists.
    pub async fn resolve(&self, template: &str) -> Vec<ResolvedComponent> {
        let mut resolved = Vec::new();
        for reference in scan_references(template) {
            let identity = self.identity_for(&reference);
            if identity.exists().await {
                resolved.push(ResolvedComponent {
                    reference,
                    identity,
                });
            } else {
                debug!(
                    target: "islet::resolver",
                    "<{}> does not map to a component ({}); treating it as markup",
                    reference,
                    identity.path().display()
                );
            }
        }
        resolved
    }
}
