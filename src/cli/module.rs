//! Answer a client-module endpoint query from the command line.
//!
//! Useful for checking what a browser would receive, including the status
//! code for rejected ids:
//!
//! ```bash
//! islet module 'c=components%2Fsample-counter'
//! islet module '/_islet/module?c=..%2F..%2Fetc%2Fpasswd'   # 400
//! ```

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use crate::engine::Engine;

/// Arguments of `islet module`.
#[derive(Args)]
pub struct ModuleCommand {
    /// Query string or request target, e.g. `c=pages%2Findex`
    pub query: String,
}

impl ModuleCommand {
    /// Run the endpoint and print its response.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint answers with a non-2xx status.
    pub async fn execute(self, engine: &Engine) -> Result<()> {
        let response = engine.endpoint().handle(&self.query).await;
        eprintln!("{} {}", response.status.to_string().bold(), response.content_type.dimmed());
        if !response.is_success() {
            bail!("Endpoint answered {}: {}", response.status, response.body);
        }
        print!("{}", response.body);
        Ok(())
    }
}
