//! Command-line interface for islet.
//!
//! # Commands
//!
//! - `render` - Render a page to a full HTML document
//! - `compile` - Print the client module of a component
//! - `module` - Answer a raw client-module endpoint query
//! - `list` - List the components of a project with their scope ids
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Errors only
//! - `--config` / `-c` - Path to `islet.toml` (defaults to `./islet.toml` if present)
//! - `--root` - Project root, overriding the config file
//!
//! # Examples
//!
//! ```bash
//! islet render pages/index --assign title='"Home"' --assign items='[1,2,3]'
//! islet compile components/sample-counter
//! islet module 'c=components%2Fsample-counter'
//! islet --root site list
//! ```

mod compile;
mod list;
mod module;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::IsletConfig;
use crate::engine::Engine;

/// Top-level CLI arguments.
#[derive(Parser)]
#[command(
    name = "islet",
    about = "Server-side rendering for single-file UI components with client hydration",
    version,
    author
)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "ISLET_CONFIG")]
    config: Option<PathBuf>,

    /// Project root (overrides `root` from the configuration file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a page to HTML
    Render(render::RenderCommand),

    /// Print the client module of a component
    Compile(compile::CompileCommand),

    /// Run the client-module endpoint for a query string
    Module(module::ModuleCommand),

    /// List the components of the project
    List(list::ListCommand),
}

impl Cli {
    /// Run the selected command.
    ///
    /// # Errors
    ///
    /// Configuration loading or command failures.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = self.load_config().await?;
        let engine = Engine::new(config);

        match self.command {
            Commands::Render(cmd) => cmd.execute(&engine).await,
            Commands::Compile(cmd) => cmd.execute(&engine).await,
            Commands::Module(cmd) => cmd.execute(&engine).await,
            Commands::List(cmd) => cmd.execute(&engine).await,
        }
    }

    /// Log filter implied by the flags; `RUST_LOG` applies when neither is set.
    fn log_filter(&self) -> EnvFilter {
        if self.verbose {
            EnvFilter::new("islet=debug")
        } else if self.quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    async fn load_config(&self) -> Result<IsletConfig> {
        let mut config = IsletConfig::load_with_optional(self.config.clone())
            .await
            .context("Failed to load configuration")?;
        if let Some(root) = &self.root {
            config.root.clone_from(root);
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_with_assignments() {
        let cli = Cli::try_parse_from([
            "islet", "--root", "site", "render", "pages/index", "--assign", "title=\"Home\"", "-a", "n=3",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        match cli.command {
            Commands::Render(cmd) => {
                assert_eq!(cmd.page, "pages/index");
                assert_eq!(cmd.assign.len(), 2);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["islet", "-v", "-q", "list"]).is_err());
    }

    #[tokio::test]
    async fn test_root_flag_overrides_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let config_path = temp.path().join("islet.toml");
        tokio::fs::write(&config_path, "root = \"from-file\"").await.unwrap();

        let cli = Cli::try_parse_from([
            "islet",
            "--config",
            config_path.to_str().unwrap(),
            "--root",
            "/srv/override",
            "list",
        ])
        .unwrap();
        let config = cli.load_config().await.unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/override"));
    }
}
