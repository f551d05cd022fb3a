//! Runtime composition of compiled components.
//!
//! A render call gets a [`ComponentRegistry`] holding every sub-component the
//! page references, registered under its tag name. Server render functions call
//! back into the registry when they reach a component tag, so nested components
//! render with their own compiled template, props and setup data.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::MAX_COMPONENT_DEPTH;
use crate::core::ComponentIdentity;

/// A callable server render function exported by a loaded module.
pub trait RenderFunction: Send + Sync {
    /// Render HTML for `context`.
    ///
    /// `registry` resolves nested component tags; `depth` is the current
    /// component nesting depth (0 for the page itself).
    fn render(
        &self,
        context: &Map<String, Value>,
        registry: &Arc<ComponentRegistry>,
        depth: usize,
    ) -> Result<String, String>;
}

/// A compiled sub-component ready to render.
#[derive(Clone)]
pub struct RegisteredComponent {
    /// Identity of the component source
    pub identity: ComponentIdentity,
    /// Server render function
    pub render: Arc<dyn RenderFunction>,
    /// Data returned by the component's setup, if it has a script
    pub setup: Map<String, Value>,
    /// Declared input properties, if any
    pub props: Option<Vec<String>>,
}

impl std::fmt::Debug for RegisteredComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredComponent")
            .field("identity", &self.identity)
            .field("setup", &self.setup)
            .field("props", &self.props)
            .finish()
    }
}

/// Sub-components available to one render, keyed by tag name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, RegisteredComponent>,
    order: Vec<String>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` under tag `name`. A name registered twice keeps
    /// its first position and its latest component.
    pub fn register(&mut self, name: impl Into<String>, component: RegisteredComponent) {
        let name = name.into();
        if !self.components.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.components.insert(name, component);
    }

    /// Whether a tag name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Registered component for a tag name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredComponent> {
        self.components.get(name)
    }

    /// Tag names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Registered components in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RegisteredComponent)> {
        self.order
            .iter()
            .filter_map(|name| self.components.get(name).map(|c| (name.as_str(), c)))
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Render the component registered under `name` with call-site `props`.
    ///
    /// An unregistered name is an unknown tag. Declared props the call site
    /// does not pass are `null`; the component's own setup data overrides
    /// props of the same name.
    pub fn render_component(
        self: &Arc<Self>,
        name: &str,
        props: Map<String, Value>,
        depth: usize,
    ) -> Result<String, String> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(format!(
                "Component nesting exceeds {MAX_COMPONENT_DEPTH} levels while rendering <{name}>"
            ));
        }

        let component = self
            .components
            .get(name)
            .ok_or_else(|| format!("Unknown component tag <{name}>"))?;

        tracing::trace!(
            target: "islet::runtime",
            "rendering <{}> ({}) at depth {}",
            name,
            component.identity.id(),
            depth
        );

        let props = with_declared_props(props, component.props.as_deref());
        let context = compose_context(props, &component.setup);
        component
            .render
            .render(&context, self, depth)
            .map_err(|e| format!("in <{name}> ({}): {e}", component.identity.id()))
    }
}

/// Merge `overrides` into `base`; keys in `overrides` win.
#[must_use]
pub fn compose_context(
    mut base: Map<String, Value>,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    for (key, value) in overrides {
        base.insert(key.clone(), value.clone());
    }
    base
}

/// Add a `null` entry for every name in `declared` missing from `props`.
#[must_use]
pub fn with_declared_props(mut props: Map<String, Value>, declared: Option<&[String]>) -> Map<String, Value> {
    for name in declared.unwrap_or_default() {
        if !props.contains_key(name) {
            props.insert(name.clone(), Value::Null);
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    /// Renders `<tag>{greeting}{count}</tag>` from context, or nests a call.
    struct EchoRender {
        nested: Option<String>,
    }

    impl RenderFunction for EchoRender {
        fn render(
            &self,
            context: &Map<String, Value>,
            registry: &Arc<ComponentRegistry>,
            depth: usize,
        ) -> Result<String, String> {
            if let Some(nested) = &self.nested {
                return registry.render_component(nested, Map::new(), depth + 1);
            }
            Ok(format!(
                "<p>{}{}</p>",
                context.get("greeting").and_then(Value::as_str).unwrap_or(""),
                context.get("count").map(Value::to_string).unwrap_or_default()
            ))
        }
    }

    fn component(id: &str, setup: Value, nested: Option<&str>) -> RegisteredComponent {
        RegisteredComponent {
            identity: ComponentIdentity::new(Path::new("/app"), id),
            render: Arc::new(EchoRender {
                nested: nested.map(str::to_string),
            }),
            setup: setup.as_object().cloned().unwrap_or_default(),
            props: None,
        }
    }

    #[test]
    fn test_compose_context_script_wins() {
        let base = json!({"x": 0, "y": 2}).as_object().unwrap().clone();
        let overrides = json!({"x": 1}).as_object().unwrap().clone();

        let composed = compose_context(base, &overrides);
        assert_eq!(Value::Object(composed), json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_render_component_setup_overrides_props() {
        let mut registry = ComponentRegistry::new();
        registry.register("Greeter", component("components/greeter", json!({"greeting": "hi"}), None));
        let registry = Arc::new(registry);

        let props = json!({"greeting": "ignored", "count": 3}).as_object().unwrap().clone();
        let html = registry.render_component("Greeter", props, 1).unwrap();
        assert_eq!(html, "<p>hi3</p>");
    }

    #[test]
    fn test_declared_props_default_to_null() {
        let mut badge = component("components/badge", json!({}), None);
        badge.props = Some(vec!["greeting".to_string(), "count".to_string()]);
        let mut registry = ComponentRegistry::new();
        registry.register("Badge", badge);
        let registry = Arc::new(registry);

        let html = registry.render_component("Badge", Map::new(), 1).unwrap();
        assert_eq!(html, "<p>null</p>");

        let passed = json!({"count": 2}).as_object().unwrap().clone();
        let filled = with_declared_props(passed, Some(&["count".to_string(), "label".to_string()]));
        assert_eq!(Value::Object(filled), json!({"count": 2, "label": null}));
    }

    #[test]
    fn test_unknown_tag_is_an_error() {
        let registry = Arc::new(ComponentRegistry::new());
        let err = registry.render_component("Missing", Map::new(), 1).unwrap_err();
        assert!(err.contains("Unknown component tag <Missing>"));
    }

    #[test]
    fn test_recursion_is_bounded() {
        let mut registry = ComponentRegistry::new();
        registry.register("Loop", component("components/loop", json!({}), Some("Loop")));
        let registry = Arc::new(registry);

        let err = registry.render_component("Loop", Map::new(), 1).unwrap_err();
        assert!(err.contains("nesting exceeds"));
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = ComponentRegistry::new();
        registry.register("B", component("components/b", json!({}), None));
        registry.register("A", component("components/a", json!({}), None));
        registry.register("B", component("components/b", json!({}), None));

        assert_eq!(registry.names(), &["B".to_string(), "A".to_string()]);
        assert_eq!(registry.len(), 2);
        let ids: Vec<_> = registry.iter().map(|(_, c)| c.identity.id().to_string()).collect();
        assert_eq!(ids, vec!["components/b", "components/a"]);
    }
}
