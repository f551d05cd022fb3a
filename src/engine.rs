//! The engine façade.
//!
//! [`Engine`] wires the parser, compilers, module loader, resolver and
//! document assembler together and exposes what a router needs:
//!
//! - [`Engine::render`] renders a page with a request's [`AssignmentStore`]
//! - [`Engine::compile_for_client`] produces a component's browser module
//! - [`Engine::serve_page`] runs page logic, renders, and turns any failure
//!   into an error page
//! - [`Engine::endpoint`] answers client-module requests
//!
//! Every collaborator can be replaced through [`EngineBuilder`].
//!
//! ```rust,no_run
//! use islet::config::IsletConfig;
//! use islet::engine::Engine;
//! use islet::store::AssignmentStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = Engine::new(IsletConfig::for_root("site"));
//! let mut store = AssignmentStore::new();
//! store.assign("title", "Home");
//! let html = engine.render("pages/index", &store).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{debug, warn};

use crate::compiler::{ComponentCompiler, ScriptCompiler, TemplateCompiler, VueScriptCompiler, VueTemplateCompiler};
use crate::config::IsletConfig;
use crate::core::{ComponentIdentity, IsletError};
use crate::endpoint::ClientModuleEndpoint;
use crate::loader::{ModuleHost, ModuleLoader, TemplateModuleHost};
use crate::page::{PageLogic, PageResponse, RequestContext};
use crate::render::{DocumentAssembler, RenderInstance, RenderPipeline};
use crate::resolver::Resolver;
use crate::sfc::{ModuleParser, SfcParser};
use crate::store::AssignmentStore;
use crate::utils::validate_component_id;

/// Rendering engine for one project.
#[derive(Debug)]
pub struct Engine {
    config: IsletConfig,
    compiler: Arc<ComponentCompiler>,
    pipeline: RenderPipeline,
}

impl Engine {
    /// Engine with the built-in collaborators.
    #[must_use]
    pub fn new(config: IsletConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building an engine with replaceable collaborators.
    #[must_use]
    pub fn builder(config: IsletConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &IsletConfig {
        &self.config
    }

    /// Validate an external component id and build its identity.
    ///
    /// # Errors
    ///
    /// [`IsletError::InvalidComponentId`] if the id fails validation.
    pub fn identity(&self, id: &str) -> Result<ComponentIdentity, IsletError> {
        validate_component_id(id)?;
        Ok(ComponentIdentity::new(&self.config.root, id))
    }

    /// Render the page at `location` with the data in `store`.
    ///
    /// # Errors
    ///
    /// Any pipeline error; see [`RenderPipeline::render_instance`].
    pub async fn render(&self, location: &str, store: &AssignmentStore) -> Result<String, IsletError> {
        let identity = self.identity(location)?;
        self.pipeline.render(&identity, store).await
    }

    /// Render without assembling a document.
    ///
    /// # Errors
    ///
    /// Any pipeline error; see [`RenderPipeline::render_instance`].
    pub async fn render_instance(
        &self,
        location: &str,
        store: &AssignmentStore,
    ) -> Result<RenderInstance, IsletError> {
        let identity = self.identity(location)?;
        self.pipeline.render_instance(&identity, store).await
    }

    /// Compile the component at `location` into a browser module.
    ///
    /// # Errors
    ///
    /// - [`IsletError::InvalidComponentId`] before any path is built
    /// - [`IsletError::ComponentNotFound`], [`IsletError::Parse`],
    ///   [`IsletError::TemplateMissing`], [`IsletError::Compile`]
    pub async fn compile_for_client(&self, location: &str) -> Result<String, IsletError> {
        let identity = self.identity(location)?;
        let source = self.compiler.load(&identity).await?;
        self.compiler.compile_client(&source)
    }

    /// Serve one page request: run `logic` against a fresh store, then render.
    ///
    /// Failures never escape: they become an error page whose status follows
    /// [`IsletError::status_code`] (500 for errors raised by the logic itself).
    pub async fn serve_page(
        &self,
        location: &str,
        logic: Option<&PageLogic>,
        request: RequestContext,
    ) -> PageResponse {
        let mut store = AssignmentStore::new();
        store.reset();

        if let Some(logic) = logic {
            if let Err(e) = logic.run(&request, &mut store).await {
                let status = e.downcast_ref::<IsletError>().map_or(500, IsletError::status_code);
                warn!(target: "islet::engine", "page logic for {} failed: {:#}", request.path, e);
                return PageResponse::error(status, &format!("{e:#}"));
            }
        }

        match self.render(location, &store).await {
            Ok(html) => {
                debug!(target: "islet::engine", "served {} ({})", request.path, location);
                PageResponse::ok(html)
            }
            Err(e) => {
                warn!(target: "islet::engine", "rendering {} failed: {}", location, e);
                PageResponse::error(e.status_code(), &e.to_string())
            }
        }
    }

    /// The client-module endpoint backed by this engine.
    #[must_use]
    pub fn endpoint(&self) -> ClientModuleEndpoint<'_> {
        ClientModuleEndpoint::new(self)
    }
}

/// Builds an [`Engine`], optionally replacing collaborators.
pub struct EngineBuilder {
    config: IsletConfig,
    parser: Arc<dyn ModuleParser>,
    templates: Arc<dyn TemplateCompiler>,
    scripts: Arc<dyn ScriptCompiler>,
    host: Arc<dyn ModuleHost>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder").field("config", &self.config).finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Builder with the built-in collaborators.
    #[must_use]
    pub fn new(config: IsletConfig) -> Self {
        Self {
            config,
            parser: Arc::new(SfcParser::new()),
            templates: Arc::new(VueTemplateCompiler::new()),
            scripts: Arc::new(VueScriptCompiler::new()),
            host: Arc::new(TemplateModuleHost::new()),
        }
    }

    /// Replace the module parser.
    #[must_use]
    pub fn parser(mut self, parser: Arc<dyn ModuleParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the template compiler.
    #[must_use]
    pub fn template_compiler(mut self, templates: Arc<dyn TemplateCompiler>) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the script compiler.
    #[must_use]
    pub fn script_compiler(mut self, scripts: Arc<dyn ScriptCompiler>) -> Self {
        self.scripts = scripts;
        self
    }

    /// Replace the host that evaluates generated server modules.
    #[must_use]
    pub fn module_host(mut self, host: Arc<dyn ModuleHost>) -> Self {
        self.host = host;
        self
    }

    /// Assemble the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        let config = self.config;
        let loader = ModuleLoader::new(config.temp_dir(), self.host);
        let compiler = Arc::new(ComponentCompiler::new(self.parser, self.templates, self.scripts, loader));
        let pipeline = RenderPipeline::new(
            Arc::clone(&compiler),
            Resolver::new(config.root.clone(), config.components_dir.clone()),
            DocumentAssembler::new(
                config.client_module_path.clone(),
                config.vue_runtime_url.clone(),
                config.default_title.clone(),
            ),
        );
        Engine {
            config,
            compiler,
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ComponentFixture;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_serve_page_runs_logic_then_renders() {
        let fixture = ComponentFixture::new().unwrap();
        fixture.write("pages/hello", "<template><h1>Hello {{ name }}</h1></template>").unwrap();
        let engine = Engine::new(fixture.config());

        let logic = PageLogic::function(|request, store| {
            async move {
                store.assign("name", request.params["name"].clone()).assign("title", "Greeting");
                Ok(())
            }
            .boxed()
        });
        let response = engine
            .serve_page("pages/hello", Some(&logic), RequestContext::new("/hello/ada").with_param("name", "ada"))
            .await;
        assert_eq!(response.status, 200);
        assert!(response.body.contains("<h1>Hello ada</h1>"));
        assert!(response.body.contains("<title>Greeting</title>"));
    }

    #[tokio::test]
    async fn test_serve_page_error_statuses() {
        let fixture = ComponentFixture::new().unwrap();
        fixture.write("pages/broken", "<template><p>{{ nope }}</p></template>").unwrap();
        let engine = Engine::new(fixture.config());

        let missing = engine.serve_page("pages/missing", None, RequestContext::new("/missing")).await;
        assert_eq!(missing.status, 404);
        assert!(missing.body.contains("404 Not Found"));

        let broken = engine.serve_page("pages/broken", None, RequestContext::new("/broken")).await;
        assert_eq!(broken.status, 500);
        assert!(broken.body.contains("Rendering component &#39;pages/broken&#39; failed"));

        let failing = PageLogic::function(|_, _| async { Err::<(), _>(anyhow::anyhow!("no database")) }.boxed());
        let response = engine.serve_page("pages/broken", Some(&failing), RequestContext::new("/")).await;
        assert_eq!(response.status, 500);
        assert!(response.body.contains("no database"));
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected_before_touching_disk() {
        let fixture = ComponentFixture::new().unwrap();
        let engine = Engine::new(fixture.config());
        for id in ["../../etc/passwd", "/etc/passwd"] {
            let err = engine.compile_for_client(id).await.unwrap_err();
            assert!(matches!(err, IsletError::InvalidComponentId { .. }), "{id}");
            assert_eq!(err.status_code(), 400);
        }
        assert!(!fixture.temp_dir().exists());
    }
}
