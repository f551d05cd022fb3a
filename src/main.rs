//! islet CLI entry point
//!
//! Renders pages, compiles client modules and inspects projects of
//! single-file components from the command line:
//! - `render` - Render a page to a full HTML document
//! - `compile` - Print a component's browser module
//! - `module` - Answer a client-module endpoint query
//! - `list` - List components with their scope ids

use anyhow::Result;
use clap::Parser;
use islet::cli;
use islet::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
