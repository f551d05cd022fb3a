//! Print the browser module of a component.
//!
//! The output is exactly what the client-module endpoint would serve for the
//! same id.

use anyhow::Result;
use clap::Args;

use crate::engine::Engine;

/// Arguments of `islet compile`.
#[derive(Args)]
pub struct CompileCommand {
    /// Component id relative to the project root, without extension
    pub component: String,
}

impl CompileCommand {
    /// Compile and print the module.
    ///
    /// # Errors
    ///
    /// Any error from [`Engine::compile_for_client`].
    pub async fn execute(self, engine: &Engine) -> Result<()> {
        let module = engine.compile_for_client(&self.component).await?;
        print!("{module}");
        Ok(())
    }
}
