//! Built-in module host backed by Tera.
//!
//! Template exports are parsed once when the module is evaluated; a parse
//! failure is a module-level evaluation failure. Each render clones the parsed
//! templates and registers a `__component` function bound to the caller's
//! [`ComponentRegistry`], which is how nested component tags are rendered.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};

use super::{Binding, ModuleExport, ModuleHandle, ModuleHost, ModuleSource};
use crate::constants::{COMPONENT_FUNCTION, COMPONENT_NAME_ARG};
use crate::runtime::{ComponentRegistry, RenderFunction};

/// Evaluates JSON module containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateModuleHost;

impl TemplateModuleHost {
    /// Create the host.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ModuleHost for TemplateModuleHost {
    fn evaluate(&self, path: &Path) -> Result<ModuleHandle, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read module {}: {e}", path.display()))?;
        let source: ModuleSource =
            serde_json::from_str(&text).map_err(|e| format!("invalid module container: {e}"))?;

        let mut exports = BTreeMap::new();
        for (name, export) in source.exports {
            let binding = match export {
                ModuleExport::Template {
                    source,
                } => Binding::Render(Arc::new(TemplateRender::parse(&name, &source)?)),
                ModuleExport::Data {
                    value,
                } => Binding::Value(value),
            };
            exports.insert(name, binding);
        }

        Ok(ModuleHandle::new(exports))
    }
}

/// A render function backed by one parsed Tera template.
pub struct TemplateRender {
    tera: Tera,
    template_name: String,
}

impl TemplateRender {
    /// Parse `source` as the body of export `export_name`.
    ///
    /// The template is registered with an `.html` name so Tera autoescapes
    /// interpolated values.
    ///
    /// # Errors
    ///
    /// Returns the formatted Tera error if the template does not parse.
    pub fn parse(export_name: &str, source: &str) -> Result<Self, String> {
        let template_name = format!("{export_name}.html");
        let mut tera = Tera::default();
        tera.add_raw_template(&template_name, source)
            .map_err(|e| format!("template export '{export_name}' does not parse: {}", format_tera_error(&e)))?;
        Ok(Self {
            tera,
            template_name,
        })
    }
}

impl RenderFunction for TemplateRender {
    fn render(
        &self,
        context: &Map<String, Value>,
        registry: &Arc<ComponentRegistry>,
        depth: usize,
    ) -> Result<String, String> {
        let mut tera = self.tera.clone();
        tera.register_function(
            COMPONENT_FUNCTION,
            ComponentCall {
                registry: Arc::clone(registry),
                depth,
            },
        );

        let context = TeraContext::from_value(Value::Object(context.clone()))
            .map_err(|e| format_tera_error(&e))?;
        tera.render(&self.template_name, &context).map_err(|e| format_tera_error(&e))
    }
}

/// The `__component(__name=..., ...)` template function.
struct ComponentCall {
    registry: Arc<ComponentRegistry>,
    depth: usize,
}

impl tera::Function for ComponentCall {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get(COMPONENT_NAME_ARG)
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg(format!("{COMPONENT_FUNCTION} requires a {COMPONENT_NAME_ARG} argument")))?;

        let props: Map<String, Value> = args
            .iter()
            .filter(|(key, _)| key.as_str() != COMPONENT_NAME_ARG)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        self.registry
            .render_component(name, props, self.depth + 1)
            .map(Value::String)
            .map_err(tera::Error::msg)
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Flatten a Tera error and its sources into one readable message.
#[must_use]
pub fn format_tera_error(error: &tera::Error) -> String {
    use std::error::Error;

    let mut messages = vec![error.to_string()];
    let mut current: Option<&dyn Error> = error.source();
    while let Some(err) = current {
        messages.push(err.to_string());
        current = err.source();
    }

    let messages: Vec<String> = messages
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    if messages.is_empty() {
        "template error".to_string()
    } else {
        messages.join("\n  → ")
    }
}
