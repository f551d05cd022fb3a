//! HTML document assembly.
//!
//! A document carries exactly one render instance:
//!
//! - the page styles (root component first, then sub-components in resolution order),
//! - the server-rendered fragment inside `<div id="islet-<instance>">`,
//! - an inline script adding this instance's state under its id to the
//!   page-global `window.__ISLET_STATE__` mapping (created if absent, never replaced),
//! - a module script importing every client module, creating the app rooted at
//!   that state slice, registering sub-components by tag name and mounting it.
//!   Sub-component modules are imported under generated aliases.

use serde_json::{Map, Value, json};
use std::fmt::Write as _;

use super::RenderInstance;
use crate::constants::{MOUNT_ID_PREFIX, STATE_GLOBAL, TITLE_KEY};
use crate::endpoint::module_url;

/// Local name the bootstrap script gives the root component's module.
const ROOT_BINDING: &str = "__islet_root";
/// Sub-components are bound as `__islet_c0`, `__islet_c1`, ... so tag names
/// never shadow globals the script uses.
const COMPONENT_BINDING_PREFIX: &str = "__islet_c";

/// Builds full documents from render instances.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    client_module_path: String,
    vue_runtime_url: String,
    default_title: String,
}

impl DocumentAssembler {
    /// Create an assembler.
    ///
    /// `client_module_path` is where the component-compilation endpoint is
    /// mounted; `vue_runtime_url` is what the import map resolves `vue` to.
    pub fn new(
        client_module_path: impl Into<String>,
        vue_runtime_url: impl Into<String>,
        default_title: impl Into<String>,
    ) -> Self {
        Self {
            client_module_path: client_module_path.into(),
            vue_runtime_url: vue_runtime_url.into(),
            default_title: default_title.into(),
        }
    }

    /// Render the complete HTML document for `instance`.
    #[must_use]
    pub fn assemble(&self, instance: &RenderInstance) -> String {
        let mount_id = mount_id(&instance.instance_id);
        let title = page_title(&instance.state, &self.default_title);
        let css = instance
            .styles
            .iter()
            .map(String::as_str)
            .filter(|css| !css.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let import_map = json!({ "imports": { "vue": self.vue_runtime_url } });

        let mut doc = String::with_capacity(instance.html.len() + css.len() + 1024);
        doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        let _ = writeln!(doc, "<title>{}</title>", escape_html(title));
        if !css.is_empty() {
            let _ = writeln!(doc, "<style>\n{}\n</style>", css.replace("</style", "<\\/style"));
        }
        let _ = writeln!(doc, "<script type=\"importmap\">{}</script>", escape_script_json(&import_map));
        doc.push_str("</head>\n<body>\n");
        let _ = writeln!(doc, "<div id=\"{mount_id}\">{}</div>", instance.html);
        let _ = writeln!(doc, "<script>{}</script>", self.state_script(instance));
        let _ = writeln!(doc, "<script type=\"module\">\n{}</script>", self.bootstrap_script(instance));
        doc.push_str("</body>\n</html>\n");
        doc
    }

    /// `(window.__ISLET_STATE__ = window.__ISLET_STATE__ || {})["<id>"] = {...};`
    #[must_use]
    pub fn state_script(&self, instance: &RenderInstance) -> String {
        format!(
            "(window.{STATE_GLOBAL} = window.{STATE_GLOBAL} || {{}})[{}] = {};",
            js_string(&instance.instance_id),
            escape_script_json(&Value::Object(instance.state.clone()))
        )
    }

    /// The module script that hydrates the instance.
    #[must_use]
    pub fn bootstrap_script(&self, instance: &RenderInstance) -> String {
        let mut script = String::new();
        let _ = writeln!(
            script,
            "import {ROOT_BINDING} from {};",
            js_string(&module_url(&self.client_module_path, instance.root.id()))
        );
        for (i, component) in instance.components.iter().enumerate() {
            let _ = writeln!(
                script,
                "import {COMPONENT_BINDING_PREFIX}{i} from {};",
                js_string(&module_url(&self.client_module_path, component.identity.id()))
            );
        }
        script.push_str("import { createSSRApp } from \"vue\";\n");
        let _ = writeln!(
            script,
            "const state = window.{STATE_GLOBAL}[{}];",
            js_string(&instance.instance_id)
        );
        let _ = writeln!(
            script,
            "const app = createSSRApp({{ ...{ROOT_BINDING}, data() {{ return Object.assign({{}}, state, {ROOT_BINDING}.data ? {ROOT_BINDING}.data.call(this) : {{}}); }} }});"
        );
        for (i, component) in instance.components.iter().enumerate() {
            let name = js_string(component.reference.name());
            let _ = writeln!(script, "app.component({name}, {COMPONENT_BINDING_PREFIX}{i});");
        }
        let _ = writeln!(script, "app.mount({});", js_string(&format!("#{}", mount_id(&instance.instance_id))));
        script
    }
}

/// DOM id the instance mounts at.
#[must_use]
pub fn mount_id(instance_id: &str) -> String {
    format!("{MOUNT_ID_PREFIX}{instance_id}")
}

/// The store's `title` entry when it is a string, else `default`.
fn page_title<'a>(state: &'a Map<String, Value>, default: &'a str) -> &'a str {
    state.get(TITLE_KEY).and_then(Value::as_str).unwrap_or(default)
}

/// Escape text for HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serialize `value` as JSON that is safe to inline in a `<script>` element.
///
/// `<`, `>` and `&` become unicode escapes so the text cannot close the
/// element or open a comment; U+2028 and U+2029 are escaped for pre-ES2019
/// parsers.
#[must_use]
pub fn escape_script_json(value: &Value) -> String {
    let json = value.to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

fn js_string(text: &str) -> String {
    escape_script_json(&Value::String(text.to_string()))
}
