//! List the components of a project.
//!
//! Walks the project root for `.vue` files and prints each component id with
//! the scope id its scoped styles are rewritten to. Hidden directories (such as
//! the `.islet` artifact directory) are skipped, as are files whose path is
//! not a valid component id.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::constants::COMPONENT_EXTENSION;
use crate::core::ComponentIdentity;
use crate::engine::Engine;
use crate::utils::validate_component_id;

/// Arguments of `islet list`.
#[derive(Args)]
pub struct ListCommand {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ListedComponent {
    id: String,
    scope_id: String,
}

impl ListCommand {
    /// Print the components found under the engine's root.
    ///
    /// # Errors
    ///
    /// Fails if JSON output cannot be serialized.
    pub async fn execute(self, engine: &Engine) -> Result<()> {
        let root = engine.config().root.clone();
        let components = tokio::task::spawn_blocking(move || find_components(&root)).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&components)?);
            return Ok(());
        }

        if components.is_empty() {
            println!("{}", "No components found.".yellow());
            return Ok(());
        }
        let width = components.iter().map(|c| c.id.len()).max().unwrap_or(0);
        for component in &components {
            println!("{}  {}", format!("{:width$}", component.id).bold(), component.scope_id.dimmed());
        }
        println!("\n{} {} component(s)", "✓".green(), components.len());
        Ok(())
    }
}

fn find_components(root: &Path) -> Vec<ListedComponent> {
    let mut components: Vec<ListedComponent> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == COMPONENT_EXTENSION))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.with_extension("");
            let id = relative.to_string_lossy().replace('\\', "/");
            if let Err(e) = validate_component_id(&id) {
                tracing::debug!("skipping {}: {}", entry.path().display(), e);
                return None;
            }
            let identity = ComponentIdentity::new(root, &id);
            Some(ListedComponent {
                scope_id: identity.scope_id().to_string(),
                id,
            })
        })
        .collect();
    components.sort_by(|a, b| a.id.cmp(&b.id));
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ComponentFixture;

    #[test]
    fn test_find_components_skips_hidden_and_invalid() {
        let fixture = ComponentFixture::with_sample_site().unwrap();
        fixture.write_file(".islet/tmp/stale.vue", "<template/>").unwrap();
        fixture.write_file("components/bad name.vue", "<template/>").unwrap();
        fixture.write_file("README.md", "# site").unwrap();

        let ids: Vec<String> = find_components(fixture.root()).into_iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec!["components/notice", "components/sample-counter", "pages/broken", "pages/index"]
        );
    }

    #[test]
    fn test_scope_ids_match_identity() {
        let fixture = ComponentFixture::with_sample_site().unwrap();
        let listed = find_components(fixture.root());
        let counter = listed.iter().find(|c| c.id == "components/sample-counter").unwrap();
        assert_eq!(counter.scope_id, fixture.identity("components/sample-counter").scope_id());
    }
}
