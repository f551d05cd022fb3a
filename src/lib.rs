//! islet - server-side rendering of single-file UI components with client hydration
//!
//! A page is a `.vue` single-file component. Request logic fills an
//! [`AssignmentStore`](store::AssignmentStore); the engine compiles the page,
//! renders it to HTML on the server and assembles a document that re-attaches
//! ("hydrates") the same component in the browser, with every capitalized
//! sub-component it uses registered by name.
//!
//! # Pipeline
//!
//! 1. [`sfc`] splits a component into template, script and style blocks
//! 2. [`compiler`] turns the template and script into a server module and a
//!    client module, and scopes styles marked `scoped`
//! 3. [`loader`] writes the server module to a uniquely named temporary file,
//!    evaluates it through a [`ModuleHost`](loader::ModuleHost) and removes the file
//! 4. [`runtime`] executes render functions against the merged context
//! 5. [`resolver`] discovers sub-components referenced by the template
//! 6. [`render`] drives the steps above for one request and assembles the document
//! 7. [`endpoint`] serves client modules to the browser by component id
//!
//! # Supporting Modules
//!
//! - [`engine`] - The façade routers call into
//! - [`page`] - Page logic and request context for routers
//! - [`store`] - Request-scoped key/value data for templates
//! - [`db`] - Lazily connecting, single-flight database guard and named-parameter queries
//! - [`config`] - `islet.toml` configuration
//! - [`core`] - Component identities and the error taxonomy
//! - [`utils`] - Component-id validation
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use islet::config::IsletConfig;
//! use islet::engine::Engine;
//! use islet::store::AssignmentStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = Engine::new(IsletConfig::for_root("site"));
//!
//! let mut store = AssignmentStore::new();
//! store.assign("title", "Home").assign("items", serde_json::json!(["a", "b"]));
//!
//! let html = engine.render("pages/index", &store).await?;
//! let module = engine.endpoint().handle("c=pages%2Findex").await;
//! assert_eq!(module.status, 200);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod core;
pub mod db;
pub mod endpoint;
pub mod engine;
pub mod loader;
pub mod page;
pub mod render;
pub mod resolver;
pub mod runtime;
pub mod sfc;
pub mod store;
pub mod utils;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
