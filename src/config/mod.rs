//! Configuration for islet.
//!
//! Projects are configured by an optional `islet.toml`. Every field has a
//! default, so an empty file (or none at all) is a valid configuration.
//!
//! ```toml
//! # Directory containing pages/ and components/ (relative to this file)
//! root = "."
//! # Where capitalized template tags are looked up, relative to root
//! components_dir = "components"
//! # URL path the client-module endpoint is mounted at
//! client_module_path = "/_islet/module"
//! # What the document's import map resolves `vue` to
//! vue_runtime_url = "https://unpkg.com/vue@3/dist/vue.esm-browser.prod.js"
//! # Where generated server modules are written while they load
//! temp_dir = ".islet/tmp"
//! # Title used when the page logic assigns none
//! default_title = "islet"
//! ```
//!
//! Relative `root` and `temp_dir` values are resolved against the directory
//! containing the config file. `temp_dir` defaults to `<root>/.islet/tmp`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::constants::{
    DEFAULT_CLIENT_MODULE_PATH, DEFAULT_COMPONENTS_DIR, DEFAULT_CONFIG_FILE, DEFAULT_TITLE,
    DEFAULT_VUE_RUNTIME_URL,
};
use crate::core::IsletError;

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_components_dir() -> String {
    DEFAULT_COMPONENTS_DIR.to_string()
}

fn default_client_module_path() -> String {
    DEFAULT_CLIENT_MODULE_PATH.to_string()
}

fn default_vue_runtime_url() -> String {
    DEFAULT_VUE_RUNTIME_URL.to_string()
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsletConfig {
    /// Project root; component ids are relative to it
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Directory of sub-components, relative to `root`
    #[serde(default = "default_components_dir")]
    pub components_dir: String,

    /// URL path of the client-module endpoint
    #[serde(default = "default_client_module_path")]
    pub client_module_path: String,

    /// URL the import map gives for `vue`
    #[serde(default = "default_vue_runtime_url")]
    pub vue_runtime_url: String,

    /// Directory for temporary module artifacts; `<root>/.islet/tmp` if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Document title when the store has no string `title`
    #[serde(default = "default_title")]
    pub default_title: String,
}

impl Default for IsletConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            components_dir: default_components_dir(),
            client_module_path: default_client_module_path(),
            vue_runtime_url: default_vue_runtime_url(),
            temp_dir: None,
            default_title: default_title(),
        }
    }
}

impl IsletConfig {
    /// Defaults with `root` as the project root.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`validate`](Self::validate).
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        let base = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        config.resolve_relative_to(base);
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from `./islet.toml` if it exists, else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, or if the
    /// chosen file cannot be loaded.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(&path).await;
        }
        let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
        if fs::try_exists(&implicit).await.unwrap_or(false) {
            Self::load_from(&implicit).await
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve relative `root` and `temp_dir` against `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if self.root.is_relative() {
            self.root = normalize(&base.join(&self.root));
        }
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.is_relative() {
                self.temp_dir = Some(normalize(&base.join(temp_dir)));
            }
        }
    }

    /// Directory where generated server modules are written.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(|| self.root.join(".islet").join("tmp"))
    }

    /// Check values that would produce broken documents.
    ///
    /// # Errors
    ///
    /// [`IsletError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<(), IsletError> {
        if !self.client_module_path.starts_with('/') || self.client_module_path.contains('?') {
            return Err(IsletError::Config {
                message: format!(
                    "client_module_path must be an absolute URL path without a query, got '{}'",
                    self.client_module_path
                ),
            });
        }
        if self.components_dir.contains("..") || Path::new(&self.components_dir).is_absolute() {
            return Err(IsletError::Config {
                message: format!("components_dir must be relative to root, got '{}'", self.components_dir),
            });
        }
        if self.vue_runtime_url.trim().is_empty() {
            return Err(IsletError::Config {
                message: "vue_runtime_url must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Drop `.` components so joined paths print cleanly.
fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, std::path::Component::CurDir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_defaults_from_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("islet.toml");
        fs::write(&path, "").await.unwrap();

        let config = IsletConfig::load_from(&path).await.unwrap();
        assert_eq!(config.root, temp.path());
        assert_eq!(config.components_dir, "components");
        assert_eq!(config.client_module_path, "/_islet/module");
        assert_eq!(config.default_title, "islet");
        assert_eq!(config.temp_dir(), temp.path().join(".islet").join("tmp"));
    }

    #[tokio::test]
    async fn test_relative_paths_resolve_against_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("islet.toml");
        fs::write(
            &path,
            "root = \"site\"\ntemp_dir = \"scratch\"\ncomponents_dir = \"ui\"\ndefault_title = \"Docs\"\n",
        )
        .await
        .unwrap();

        let config = IsletConfig::load_from(&path).await.unwrap();
        assert_eq!(config.root, temp.path().join("site"));
        assert_eq!(config.temp_dir(), temp.path().join("scratch"));
        assert_eq!(config.components_dir, "ui");
        assert_eq!(config.default_title, "Docs");
    }

    #[tokio::test]
    async fn test_invalid_files() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("islet.toml");

        fs::write(&path, "unknown_key = 1").await.unwrap();
        assert!(IsletConfig::load_from(&path).await.is_err());

        fs::write(&path, "client_module_path = \"module\"").await.unwrap();
        let err = IsletConfig::load_from(&path).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<IsletError>(), Some(IsletError::Config { .. })));

        let missing = IsletConfig::load_with_optional(Some(temp.path().join("nope.toml"))).await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = IsletConfig::for_root("/srv/site");
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("temp_dir"));
        let back: IsletConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
