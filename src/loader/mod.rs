//! Dynamic module loading with guaranteed artifact cleanup.
//!
//! Generated module text is written to a uniquely named file in the configured
//! temporary directory, handed to a [`ModuleHost`] for evaluation, and removed
//! afterwards. The file is owned by a [`tempfile::NamedTempFile`] for the whole
//! call, so it is deleted on every exit path: a write failure, an evaluation
//! failure, or an early return all drop the handle. On the success path the
//! loader closes it explicitly and logs (but does not fail on) a removal error.
//!
//! # Module container
//!
//! The built-in host ([`host::TemplateModuleHost`]) evaluates a JSON container
//! describing named exports:
//!
//! ```json
//! {"exports": {
//!   "render": {"kind": "template", "source": "<p>{{ msg }}</p>"},
//!   "setup":  {"kind": "data", "value": {"msg": "hi"}}
//! }}
//! ```
//!
//! Template exports become [`RenderFunction`]s; data exports are plain values.

pub mod host;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::core::IsletError;
use crate::runtime::RenderFunction;

pub use host::TemplateModuleHost;

/// Executes a module artifact written to disk.
pub trait ModuleHost: Send + Sync {
    /// Evaluate the module at `path` and return its exported bindings.
    ///
    /// An `Err` describes a failure during module-level evaluation.
    fn evaluate(&self, path: &Path) -> Result<ModuleHandle, String>;
}

/// One exported binding of a loaded module.
#[derive(Clone)]
pub enum Binding {
    /// A callable render function
    Render(Arc<dyn RenderFunction>),
    /// A plain data value
    Value(Value),
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(_) => f.write_str("Render(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// Exported bindings of an evaluated module.
#[derive(Debug, Clone, Default)]
pub struct ModuleHandle {
    exports: BTreeMap<String, Binding>,
}

impl ModuleHandle {
    /// Wrap a set of exports.
    #[must_use]
    pub fn new(exports: BTreeMap<String, Binding>) -> Self {
        Self {
            exports,
        }
    }

    /// Binding exported under `name`.
    #[must_use]
    pub fn export(&self, name: &str) -> Option<&Binding> {
        self.exports.get(name)
    }

    /// Render function exported under `name`, if that export is callable.
    #[must_use]
    pub fn render_export(&self, name: &str) -> Option<Arc<dyn RenderFunction>> {
        match self.exports.get(name)? {
            Binding::Render(f) => Some(Arc::clone(f)),
            Binding::Value(_) => None,
        }
    }

    /// Data value exported under `name`, if that export is data.
    #[must_use]
    pub fn value_export(&self, name: &str) -> Option<&Value> {
        match self.exports.get(name)? {
            Binding::Value(v) => Some(v),
            Binding::Render(_) => None,
        }
    }

    /// Names of all exports, sorted.
    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// One export in the module container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModuleExport {
    /// Template source compiled into a render function at load time
    Template {
        /// Tera template source
        source: String,
    },
    /// A literal value
    Data {
        /// The exported value
        value: Value,
    },
}

/// Builder for module container text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleSource {
    /// Named exports
    pub exports: BTreeMap<String, ModuleExport>,
}

impl ModuleSource {
    /// An empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a template-backed render function under `name`.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.exports.insert(
            name.into(),
            ModuleExport::Template {
                source: source.into(),
            },
        );
        self
    }

    /// Export a data value under `name`.
    #[must_use]
    pub fn with_data(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.insert(
            name.into(),
            ModuleExport::Data {
                value,
            },
        );
        self
    }

    /// Serialized module text.
    ///
    /// # Errors
    ///
    /// Returns an error if an exported value cannot be serialized.
    pub fn to_source_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Loads generated module text through a [`ModuleHost`].
pub struct ModuleLoader {
    dir: PathBuf,
    host: Arc<dyn ModuleHost>,
    counter: AtomicU64,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("dir", &self.dir)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    /// Create a loader writing artifacts to `dir`.
    pub fn new(dir: impl Into<PathBuf>, host: Arc<dyn ModuleHost>) -> Self {
        Self {
            dir: dir.into(),
            host,
            counter: AtomicU64::new(0),
        }
    }

    /// Directory receiving temporary module artifacts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Make `source_text` executable as a module and return its exports.
    ///
    /// `id` names the component the module was generated for; it appears in the
    /// artifact name and in errors. Every call uses a distinct artifact name
    /// and the artifact never outlives the call.
    ///
    /// # Errors
    ///
    /// - [`IsletError::Io`] if the artifact cannot be written
    /// - [`IsletError::CompileExecution`] if the host fails to evaluate it
    pub async fn load_module(&self, id: &str, source_text: &str) -> Result<ModuleHandle, IsletError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let serial = self.counter.fetch_add(1, Ordering::Relaxed);
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let prefix = format!("{}-", artifact_stem(id));
        let suffix = format!(".{stamp}-{serial}.mjs");

        let mut artifact = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        artifact.write_all(source_text.as_bytes())?;
        artifact.flush()?;

        debug!(
            target: "islet::loader",
            "evaluating module for '{}' from {}",
            id,
            artifact.path().display()
        );

        let evaluated = self.host.evaluate(artifact.path());

        let artifact_path = artifact.path().to_path_buf();
        if let Err(e) = artifact.close() {
            warn!(
                target: "islet::loader",
                "Failed to remove module artifact {}: {}",
                artifact_path.display(),
                e
            );
        }

        evaluated.map_err(|reason| IsletError::CompileExecution {
            id: id.to_string(),
            reason,
        })
    }
}

/// Reduce a component id to characters safe in a file name.
fn artifact_stem(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "module".to_string() } else { stem }
}
