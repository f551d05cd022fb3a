//! Render a page to a complete HTML document.
//!
//! Each `--assign key=value` puts `value` into the request's assignment store
//! before rendering. Values are parsed as JSON when they are valid JSON and
//! kept as plain strings otherwise, so `--assign count=3` assigns a number and
//! `--assign title=Home` assigns the string `"Home"`.
//!
//! ```bash
//! islet render pages/index --assign title=Home --assign items='[1,2,3]'
//! islet render pages/index --output index.html
//! ```

use anyhow::{Context, Result, anyhow};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;

use crate::engine::Engine;
use crate::store::AssignmentStore;

/// Arguments of `islet render`.
#[derive(Args)]
pub struct RenderCommand {
    /// Page id relative to the project root, without extension (e.g. `pages/index`)
    pub page: String,

    /// Assign a store value as `key=value`; may be repeated
    #[arg(short, long, value_name = "KEY=VALUE")]
    pub assign: Vec<String>,

    /// Write the document to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RenderCommand {
    /// Render the page and print or write the document.
    ///
    /// # Errors
    ///
    /// Malformed assignments, rendering failures, or an unwritable output file.
    pub async fn execute(self, engine: &Engine) -> Result<()> {
        let mut store = AssignmentStore::new();
        for assignment in &self.assign {
            let (key, value) = parse_assignment(assignment)?;
            store.assign(key, value);
        }

        let html = engine.render(&self.page, &store).await?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &html)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("{} Rendered {} to {}", "✓".green(), self.page.bold(), path.display());
            }
            None => println!("{html}"),
        }
        Ok(())
    }
}

/// Split `key=value`, parsing the value as JSON when possible.
fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid assignment '{assignment}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Invalid assignment '{assignment}': key is empty"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
