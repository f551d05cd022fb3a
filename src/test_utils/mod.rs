//! Test utilities for islet
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`init_test_logging`] installs a tracing subscriber once per process
//! - [`ComponentFixture`] is a throwaway project directory to write components into
//! - [`fixtures`] holds ready-made component sources
//!
//! # Example
//!
//! ```rust,no_run
//! use islet::test_utils::{ComponentFixture, fixtures};
//!
//! let project = ComponentFixture::with_sample_site().unwrap();
//! assert!(project.root().join("pages/index.vue").exists());
//! ```

pub mod fixtures;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::IsletConfig;
use crate::constants::COMPONENT_EXTENSION;
use crate::core::ComponentIdentity;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=islet=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// A temporary project directory holding `.vue` components.
pub struct ComponentFixture {
    _temp: TempDir,
    root: PathBuf,
}

impl ComponentFixture {
    /// Create an empty project.
    pub fn new() -> Result<Self> {
        init_test_logging(None);
        let temp = TempDir::new()?;
        let root = temp.path().join("site");
        fs::create_dir_all(&root)?;
        Ok(Self {
            _temp: temp,
            root,
        })
    }

    /// A project holding [`fixtures::SAMPLE_SITE`].
    pub fn with_sample_site() -> Result<Self> {
        let fixture = Self::new()?;
        for (id, source) in fixtures::SAMPLE_SITE {
            fixture.write(id, source)?;
        }
        Ok(fixture)
    }

    /// Project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the default configuration puts module artifacts.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.config().temp_dir()
    }

    /// Default configuration rooted at this project.
    #[must_use]
    pub fn config(&self) -> IsletConfig {
        IsletConfig::for_root(&self.root)
    }

    /// Identity of component `id` in this project.
    #[must_use]
    pub fn identity(&self, id: &str) -> ComponentIdentity {
        ComponentIdentity::new(&self.root, id)
    }

    /// Write component `id` (no extension) with `source`.
    pub fn write(&self, id: &str, source: &str) -> Result<PathBuf> {
        let path = self.root.join(format!("{id}.{COMPONENT_EXTENSION}"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, source).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write an arbitrary file relative to the root.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Files currently in the artifact directory, sorted.
    pub fn artifacts(&self) -> Result<Vec<PathBuf>> {
        let dir = self.temp_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        files.sort();
        Ok(files)
    }
}
