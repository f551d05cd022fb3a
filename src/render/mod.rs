//! The rendering pipeline.
//!
//! One call to [`RenderPipeline::render`] turns a top-level component and the
//! request's [`AssignmentStore`] into a complete HTML document. The pipeline
//! runs its stages strictly in order and stops at the first error:
//!
//! 1. **Load**: read and parse the component source
//! 2. **Resolve**: find the sub-components its template references
//! 3. **Compile**: compile the component and, one at a time in resolution
//!    order, every sub-component (recursively) for the server target
//! 4. **Compose**: merge the store snapshot with the script's setup data;
//!    setup data wins on conflicting keys
//! 5. **Execute**: run the render function against the composed context
//! 6. **Assemble**: wrap the fragment in a document under a fresh instance id
//!
//! Nothing is retried: every failure is an authoring defect.

pub mod document;

use serde_json::Map;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::compiler::ComponentCompiler;
use crate::core::{ComponentIdentity, IsletError};
use crate::resolver::{ResolvedComponent, Resolver};
use crate::runtime::{ComponentRegistry, RegisteredComponent, compose_context, with_declared_props};
use crate::store::AssignmentStore;

pub use document::DocumentAssembler;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Read and parse the component
    Load,
    /// Discover sub-components
    Resolve,
    /// Compile for the server target
    Compile,
    /// Build the render context
    Compose,
    /// Run the render function
    Execute,
    /// Build the document
    Assemble,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Resolve => "resolve",
            Self::Compile => "compile",
            Self::Compose => "compose",
            Self::Execute => "execute",
            Self::Assemble => "assemble",
        })
    }
}

/// One execution of the pipeline for one top-level component.
#[derive(Debug, Clone)]
pub struct RenderInstance {
    /// Unique id namespacing this instance's state and mount point
    pub instance_id: String,
    /// The top-level component
    pub root: ComponentIdentity,
    /// Every sub-component reachable from the root, in resolution order
    pub components: Vec<ResolvedComponent>,
    /// Snapshot of the assignment store the page was rendered with
    pub state: Map<String, serde_json::Value>,
    /// Server-rendered HTML fragment
    pub html: String,
    /// Style text per component: root first, then `components` in order
    pub styles: Vec<String>,
}

/// Drives a render from component source to document.
pub struct RenderPipeline {
    compiler: Arc<ComponentCompiler>,
    resolver: Resolver,
    assembler: DocumentAssembler,
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("resolver", &self.resolver)
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl RenderPipeline {
    /// Create a pipeline from its parts.
    pub fn new(compiler: Arc<ComponentCompiler>, resolver: Resolver, assembler: DocumentAssembler) -> Self {
        Self {
            compiler,
            resolver,
            assembler,
        }
    }

    /// Render `identity` with the data in `store` into a full HTML document.
    ///
    /// # Errors
    ///
    /// Any [`IsletError`] raised by a stage; see [`render_instance`](Self::render_instance).
    pub async fn render(&self, identity: &ComponentIdentity, store: &AssignmentStore) -> Result<String, IsletError> {
        let instance = self.render_instance(identity, store).await?;
        stage(RenderStage::Assemble, identity);
        Ok(self.assembler.assemble(&instance))
    }

    /// Run every stage but assembly and return the render instance.
    ///
    /// # Errors
    ///
    /// - [`IsletError::ComponentNotFound`] if the root component (or a
    ///   sub-component that disappeared after resolution) is missing
    /// - [`IsletError::Parse`], [`IsletError::TemplateMissing`],
    ///   [`IsletError::Compile`], [`IsletError::CompileExecution`] from compilation
    /// - [`IsletError::RenderExecution`] if the render function fails
    pub async fn render_instance(
        &self,
        identity: &ComponentIdentity,
        store: &AssignmentStore,
    ) -> Result<RenderInstance, IsletError> {
        stage(RenderStage::Load, identity);
        let source = self.compiler.load(identity).await?;
        let template = source.template().ok_or_else(|| IsletError::TemplateMissing {
            id: identity.id().to_string(),
        })?;

        stage(RenderStage::Resolve, identity);
        let mut pending: VecDeque<ResolvedComponent> = self.resolver.resolve(template).await.into();

        stage(RenderStage::Compile, identity);
        let root = self.compiler.compile_server(&source).await?;
        let mut styles = vec![root.css.clone()];
        let mut components = Vec::new();
        let mut registry = ComponentRegistry::new();
        let mut visited: HashSet<String> =
            pending.iter().map(|c| c.reference.name().to_string()).collect();

        while let Some(component) = pending.pop_front() {
            let sub_source = self.compiler.load(&component.identity).await?;
            let artifact = self.compiler.compile_server(&sub_source).await?;
            debug!(
                target: "islet::render",
                "registered <{}> from '{}'",
                component.reference,
                component.identity
            );

            for nested in self.resolver.resolve(&artifact.template).await {
                if visited.insert(nested.reference.name().to_string()) {
                    pending.push_back(nested);
                }
            }

            styles.push(artifact.css.clone());
            registry.register(
                component.reference.name(),
                RegisteredComponent {
                    identity: artifact.identity,
                    render: artifact.render,
                    setup: artifact.setup.unwrap_or_default(),
                    props: artifact.props,
                },
            );
            components.push(component);
        }

        stage(RenderStage::Compose, identity);
        let state = store.get_all();
        let base = with_declared_props(state.clone(), root.props.as_deref());
        let context = match &root.setup {
            Some(setup) => compose_context(base, setup),
            None => base,
        };

        stage(RenderStage::Execute, identity);
        let registry = Arc::new(registry);
        let html = root
            .render
            .render(&context, &registry, 0)
            .map_err(|reason| IsletError::RenderExecution {
                id: identity.id().to_string(),
                reason,
            })?;

        Ok(RenderInstance {
            instance_id: Uuid::new_v4().simple().to_string(),
            root: identity.clone(),
            components,
            state,
            html,
            styles,
        })
    }
}

fn stage(stage: RenderStage, identity: &ComponentIdentity) {
    debug!(target: "islet::render", "[{}] {}", stage, identity);
}
