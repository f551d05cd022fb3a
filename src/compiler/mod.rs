//! Component compilation.
//!
//! [`ComponentCompiler`] drives the collaborators that turn one single-file
//! component into something runnable:
//!
//! - a [`ModuleParser`] splits the source into blocks,
//! - a [`TemplateCompiler`] compiles the template for the server or client target,
//! - a [`ScriptCompiler`] compiles the script block,
//! - the [`ModuleLoader`] evaluates the generated server module.
//!
//! The server target yields a [`ServerArtifact`] holding a render function and
//! the script's setup data and props. The client target yields ES module text
//! whose default export is the component options object with its render function.
//!
//! Nothing here is cached: every call recompiles from the source on disk.

pub mod js;
pub mod script;
pub mod style;
pub mod template;

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{ComponentIdentity, IsletError};
use crate::loader::{ModuleLoader, ModuleSource};
use crate::runtime::RenderFunction;
use crate::sfc::{ModuleParser, ScriptShape, SfcDescriptor};

pub use script::{ServerScript, VueScriptCompiler};
pub use template::VueTemplateCompiler;

/// Local binding the client module gives the script's default export.
const SCRIPT_BINDING: &str = "__sfc__";

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Compilation cannot produce usable output
    Error,
    /// Output was produced but may not behave as written
    Warning,
    /// Informational note
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// A message reported by a parser or compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub level: DiagnosticLevel,
    /// Human-readable description
    pub message: String,
    /// 1-based source line, when known
    pub line: Option<usize>,
}

impl Diagnostic {
    /// Build a diagnostic without a line.
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            line: None,
        }
    }

    /// Shorthand for an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    /// Shorthand for a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    /// Attach a source line.
    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Whether this diagnostic fails compilation.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Which artifact a compiler should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileTarget {
    /// Server render function (HTML string output)
    Server,
    /// Browser ES module
    Client,
}

/// Generated code plus everything the compiler had to say about it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// Generated code; meaningless when [`has_errors`](Self::has_errors) is true
    pub code: String,
    /// Diagnostics in source order
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// Whether any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Input to a [`TemplateCompiler`].
#[derive(Debug, Clone, Copy)]
pub struct TemplateRequest<'a> {
    /// Template block content
    pub source: &'a str,
    /// Component id, for messages
    pub id: &'a str,
    /// Scope id of the component
    pub scope_id: &'a str,
    /// Whether the component has scoped styles
    pub scoped: bool,
    /// Artifact to produce
    pub target: CompileTarget,
}

/// Input to a [`ScriptCompiler`].
#[derive(Debug, Clone, Copy)]
pub struct ScriptRequest<'a> {
    /// Script block content
    pub source: &'a str,
    /// Whether it is a plain or a setup script
    pub shape: ScriptShape,
    /// Component id, for messages
    pub id: &'a str,
    /// Scope id of the component
    pub scope_id: &'a str,
    /// Artifact to produce
    pub target: CompileTarget,
}

/// Compiles a template block.
///
/// Must be deterministic: identical requests produce identical output.
pub trait TemplateCompiler: Send + Sync {
    /// Compile one template.
    fn compile_template(&self, request: &TemplateRequest<'_>) -> CompileOutput;
}

/// Compiles a script block of either shape.
///
/// For [`CompileTarget::Server`] the output code is a JSON [`ServerScript`];
/// for [`CompileTarget::Client`] it is an ES module with one default export.
pub trait ScriptCompiler: Send + Sync {
    /// Compile one script.
    fn compile_script(&self, request: &ScriptRequest<'_>) -> CompileOutput;
}

/// A component source read from disk and split into blocks.
#[derive(Debug, Clone)]
pub struct ComponentSource {
    /// Where it came from
    pub identity: ComponentIdentity,
    /// Its blocks
    pub descriptor: SfcDescriptor,
}

impl ComponentSource {
    /// Template block content, if any.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.descriptor.template.as_ref().map(|t| t.content.as_str())
    }
}

/// Server-side compile result for one component.
#[derive(Clone)]
pub struct ServerArtifact {
    /// Component it was compiled from
    pub identity: ComponentIdentity,
    /// Server render function
    pub render: Arc<dyn RenderFunction>,
    /// Literal state from the script, if the script has any
    pub setup: Option<Map<String, Value>>,
    /// Declared props, if the script declares any
    pub props: Option<Vec<String>>,
    /// Style blocks, scoped ones rewritten, joined in source order
    pub css: String,
    /// The raw template block, for sub-component discovery
    pub template: String,
}

impl fmt::Debug for ServerArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerArtifact")
            .field("identity", &self.identity)
            .field("setup", &self.setup)
            .field("props", &self.props)
            .field("css", &self.css)
            .finish_non_exhaustive()
    }
}

/// Drives parsing, compilation and module loading for one component at a time.
pub struct ComponentCompiler {
    parser: Arc<dyn ModuleParser>,
    templates: Arc<dyn TemplateCompiler>,
    scripts: Arc<dyn ScriptCompiler>,
    loader: ModuleLoader,
}

impl fmt::Debug for ComponentCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCompiler").field("loader", &self.loader).finish_non_exhaustive()
    }
}

impl ComponentCompiler {
    /// Assemble a compiler from its collaborators.
    pub fn new(
        parser: Arc<dyn ModuleParser>,
        templates: Arc<dyn TemplateCompiler>,
        scripts: Arc<dyn ScriptCompiler>,
        loader: ModuleLoader,
    ) -> Self {
        Self {
            parser,
            templates,
            scripts,
            loader,
        }
    }

    /// The loader used for server modules.
    #[must_use]
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Read and parse the source of `identity`.
    ///
    /// # Errors
    ///
    /// - [`IsletError::ComponentNotFound`] if the source file does not exist
    /// - [`IsletError::Parse`] if the parser reports diagnostics
    /// - [`IsletError::Io`] for other read failures
    pub async fn load(&self, identity: &ComponentIdentity) -> Result<ComponentSource, IsletError> {
        let text = match tokio::fs::read_to_string(identity.path()).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IsletError::ComponentNotFound {
                    id: identity.id().to_string(),
                    path: identity.path().to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let descriptor = self.parser.parse(&text, identity.id()).map_err(|diagnostics| {
            IsletError::Parse {
                id: identity.id().to_string(),
                diagnostics,
            }
        })?;

        Ok(ComponentSource {
            identity: identity.clone(),
            descriptor,
        })
    }

    /// Compile `source` for the server target and load the resulting module.
    ///
    /// # Errors
    ///
    /// - [`IsletError::TemplateMissing`] if there is no template block
    /// - [`IsletError::Compile`] if either compiler reports errors
    /// - [`IsletError::CompileExecution`] if the generated module fails to load
    pub async fn compile_server(&self, source: &ComponentSource) -> Result<ServerArtifact, IsletError> {
        let identity = &source.identity;
        let id = identity.id();
        let template = source.template().ok_or_else(|| IsletError::TemplateMissing {
            id: id.to_string(),
        })?;

        let output = self.templates.compile_template(&TemplateRequest {
            source: template,
            id,
            scope_id: identity.scope_id(),
            scoped: source.descriptor.has_scoped_style(),
            target: CompileTarget::Server,
        });
        let render_source = accept(id, "template", output)?;

        let script = match source.descriptor.script_block() {
            Some(block) => {
                let output = self.scripts.compile_script(&ScriptRequest {
                    source: &block.content,
                    shape: source.descriptor.script_shape(),
                    id,
                    scope_id: identity.scope_id(),
                    target: CompileTarget::Server,
                });
                let code = accept(id, "script", output)?;
                serde_json::from_str::<ServerScript>(&code).map_err(|e| IsletError::Compile {
                    id: id.to_string(),
                    stage: "script".to_string(),
                    diagnostics: vec![Diagnostic::error(format!("script compiler output is not valid: {e}"))],
                })?
            }
            None => ServerScript::default(),
        };

        let mut module = ModuleSource::new().with_template("render", render_source);
        if let Some(setup) = script.setup {
            module = module.with_data("setup", Value::Object(setup));
        }
        if let Some(props) = script.props {
            module = module.with_data("props", Value::from(props));
        }
        let text = module.to_source_text().map_err(|e| IsletError::CompileExecution {
            id: id.to_string(),
            reason: format!("module could not be serialized: {e}"),
        })?;

        let handle = self.loader.load_module(id, &text).await?;
        let render = handle.render_export("render").ok_or_else(|| IsletError::CompileExecution {
            id: id.to_string(),
            reason: "module has no callable 'render' export".to_string(),
        })?;
        let setup = handle.value_export("setup").and_then(Value::as_object).cloned();
        let props = handle
            .value_export("props")
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok());

        debug!(target: "islet::compiler", "compiled '{}' for the server", id);

        Ok(ServerArtifact {
            identity: identity.clone(),
            render,
            setup,
            props,
            css: component_css(identity, &source.descriptor),
            template: template.to_string(),
        })
    }

    /// Compile `source` into a browser ES module.
    ///
    /// The module's default export is the component options object carrying
    /// `render` (and `__scopeId` when styles are scoped). Without a script the
    /// default export holds nothing but those. The template's `render` is also
    /// a named export.
    ///
    /// # Errors
    ///
    /// - [`IsletError::TemplateMissing`] if there is no template block
    /// - [`IsletError::Compile`] if either compiler reports errors or the
    ///   script's default export cannot be rewritten
    pub fn compile_client(&self, source: &ComponentSource) -> Result<String, IsletError> {
        let identity = &source.identity;
        let id = identity.id();
        let template = source.template().ok_or_else(|| IsletError::TemplateMissing {
            id: id.to_string(),
        })?;
        let scoped = source.descriptor.has_scoped_style();

        let output = self.templates.compile_template(&TemplateRequest {
            source: template,
            id,
            scope_id: identity.scope_id(),
            scoped,
            target: CompileTarget::Client,
        });
        let mut module = accept(id, "template", output)?;

        let mut members = vec!["render".to_string()];
        if let Some(block) = source.descriptor.script_block() {
            let output = self.scripts.compile_script(&ScriptRequest {
                source: &block.content,
                shape: source.descriptor.script_shape(),
                id,
                scope_id: identity.scope_id(),
                target: CompileTarget::Client,
            });
            let code = accept(id, "script", output)?;
            let rewritten = js::rewrite_default_export(&code, SCRIPT_BINDING).map_err(|reason| {
                IsletError::Compile {
                    id: id.to_string(),
                    stage: "script".to_string(),
                    diagnostics: vec![Diagnostic::error(reason)],
                }
            })?;
            module.push('\n');
            module.push_str(rewritten.trim_end());
            module.push('\n');
            members.insert(0, format!("...{SCRIPT_BINDING}"));
        }
        if scoped {
            members.push(format!("__scopeId: \"{}\"", identity.scope_attribute()));
        }

        module.push_str(&format!("export default {{ {} }};\n", members.join(", ")));
        debug!(target: "islet::compiler", "compiled '{}' for the client", id);
        Ok(module)
    }
}

/// Log warnings of `output` and turn errors into [`IsletError::Compile`].
fn accept(id: &str, stage: &str, output: CompileOutput) -> Result<String, IsletError> {
    for diagnostic in output.diagnostics.iter().filter(|d| !d.is_error()) {
        warn!(target: "islet::compiler", "{} ({}): {}", id, stage, diagnostic);
    }
    if output.has_errors() {
        return Err(IsletError::Compile {
            id: id.to_string(),
            stage: stage.to_string(),
            diagnostics: output.errors().cloned().collect(),
        });
    }
    Ok(output.code)
}

/// Join the style blocks of a component, rewriting scoped ones.
#[must_use]
pub fn component_css(identity: &ComponentIdentity, descriptor: &SfcDescriptor) -> String {
    let attribute = identity.scope_attribute();
    descriptor
        .styles
        .iter()
        .map(|block| {
            if block.scoped {
                style::scope_css(&block.content, &attribute).trim().to_string()
            } else {
                block.content.trim().to_string()
            }
        })
        .filter(|css| !css.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TemplateModuleHost;
    use crate::sfc::SfcParser;
    use crate::test_utils::ComponentFixture;
    use serde_json::json;

    fn compiler(fixture: &ComponentFixture) -> ComponentCompiler {
        ComponentCompiler::new(
            Arc::new(SfcParser::new()),
            Arc::new(VueTemplateCompiler::new()),
            Arc::new(VueScriptCompiler::new()),
            ModuleLoader::new(fixture.temp_dir(), Arc::new(TemplateModuleHost::new())),
        )
    }

    async fn load(fixture: &ComponentFixture, compiler: &ComponentCompiler, id: &str) -> ComponentSource {
        compiler.load(&fixture.identity(id)).await.unwrap()
    }

    #[tokio::test]
    async fn test_compile_server_with_setup_script() {
        let fixture = ComponentFixture::new().unwrap();
        fixture
            .write(
                "components/greeting",
                r#"<template><p class="greet">{{ greeting }}, {{ name }}</p></template>
<script setup>
import { ref } from 'vue'
const props = defineProps(['name'])
const greeting = ref('Hello')
</script>
<style scoped>.greet { color: teal }</style>"#,
            )
            .unwrap();
        let compiler = compiler(&fixture);
        let source = load(&fixture, &compiler, "components/greeting").await;
        let artifact = compiler.compile_server(&source).await.unwrap();

        assert_eq!(artifact.setup, Some(json!({"greeting": "Hello"}).as_object().unwrap().clone()));
        assert_eq!(artifact.props, Some(vec!["name".to_string()]));
        assert!(artifact.css.contains(&format!(".greet[{}]", source.identity.scope_attribute())));

        let mut context = artifact.setup.clone().unwrap();
        context.insert("name".into(), json!("Ada"));
        let html = artifact
            .render
            .render(&context, &Arc::new(crate::runtime::ComponentRegistry::new()), 0)
            .unwrap();
        assert_eq!(
            html,
            format!("<p class=\"greet\" {}=\"\">Hello, Ada</p>", source.identity.scope_attribute())
        );
    }

    #[tokio::test]
    async fn test_missing_component_and_template() {
        let fixture = ComponentFixture::new().unwrap();
        fixture.write("components/empty", "<script>export default {}</script>").unwrap();
        let compiler = compiler(&fixture);

        let missing = compiler.load(&fixture.identity("components/nope")).await.unwrap_err();
        assert!(matches!(missing, IsletError::ComponentNotFound { .. }));

        let source = load(&fixture, &compiler, "components/empty").await;
        let err = compiler.compile_server(&source).await.unwrap_err();
        assert!(matches!(err, IsletError::TemplateMissing { ref id } if id == "components/empty"));
        assert!(matches!(compiler.compile_client(&source), Err(IsletError::TemplateMissing { .. })));
    }

    #[tokio::test]
    async fn test_parse_and_compile_errors() {
        let fixture = ComponentFixture::new().unwrap();
        fixture.write("components/broken", "<template><div></template").unwrap();
        fixture.write("components/bad", "<template><p v-else>x</p></template>").unwrap();
        let compiler = compiler(&fixture);

        let err = compiler.load(&fixture.identity("components/broken")).await.unwrap_err();
        assert!(matches!(err, IsletError::Parse { .. }));

        let source = load(&fixture, &compiler, "components/bad").await;
        let err = compiler.compile_server(&source).await.unwrap_err();
        match err {
            IsletError::Compile { stage, diagnostics, .. } => {
                assert_eq!(stage, "template");
                assert!(!diagnostics.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_compile_client_without_script() {
        let fixture = ComponentFixture::new().unwrap();
        fixture.write("components/plain", "<template><p>{{ msg }}</p></template>").unwrap();
        let compiler = compiler(&fixture);
        let source = load(&fixture, &compiler, "components/plain").await;

        let module = compiler.compile_client(&source).unwrap();
        assert!(module.contains("export const render = __compile(\"<p>{{ msg }}</p>\");"));
        assert!(module.ends_with("export default { render };\n"));
        assert_eq!(module.matches("export default").count(), 1);
    }

    #[tokio::test]
    async fn test_compile_client_merges_script_export() {
        let fixture = ComponentFixture::new().unwrap();
        fixture
            .write(
                "components/counter",
                r#"<template><button @click="count++">{{ count }}</button></template>
<script>
// "export default" in a comment stays put
export default {
  data() { return { count: 0, label: "export default" } }
}
</script>
<style scoped>button { margin: 0 }</style>"#,
            )
            .unwrap();
        let compiler = compiler(&fixture);
        let source = load(&fixture, &compiler, "components/counter").await;

        let module = compiler.compile_client(&source).unwrap();
        assert!(module.contains("const __sfc__ = {"));
        assert!(module.contains("// \"export default\" in a comment stays put"));
        assert!(module.contains("label: \"export default\""));
        assert!(module.ends_with(&format!(
            "export default {{ ...__sfc__, render, __scopeId: \"{}\" }};\n",
            source.identity.scope_attribute()
        )));
    }

    #[test]
    fn test_diagnostic_display() {
        assert_eq!(Diagnostic::error("boom").at_line(3).to_string(), "line 3: boom");
        assert_eq!(Diagnostic::warning("careful").to_string(), "careful");
        let output = CompileOutput {
            code: String::new(),
            diagnostics: vec![Diagnostic::warning("w"), Diagnostic::error("e")],
        };
        assert!(output.has_errors());
        assert_eq!(output.errors().count(), 1);
    }
}
