//! Built-in script compiler.
//!
//! The server target extracts what can be known without running the script:
//! literal state (setup bindings or the object returned by `data()`) and the
//! declared props. It emits them as JSON ([`ServerScript`]). The client target
//! produces an ES module whose default export is a component options object;
//! `<script setup>` bodies are wrapped into a `setup()` function for that.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::js::{
    find_top_level_word, is_identifier, js_literal_to_json, mask_non_code, matching_close, split_top_level,
    statements,
};
use super::{CompileOutput, CompileTarget, Diagnostic, ScriptCompiler, ScriptRequest};
use crate::sfc::ScriptShape;

const STATE_WRAPPERS: &[&str] = &["ref", "reactive", "shallowRef", "shallowReactive"];

/// What the server target extracts from a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerScript {
    /// Literal state the component renders with
    pub setup: Option<Map<String, Value>>,
    /// Declared prop names
    pub props: Option<Vec<String>>,
}

/// Built-in compiler for options and setup scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct VueScriptCompiler;

impl VueScriptCompiler {
    /// Create the compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ScriptCompiler for VueScriptCompiler {
    fn compile_script(&self, request: &ScriptRequest<'_>) -> CompileOutput {
        let mut diagnostics = Vec::new();
        let code = match (request.target, request.shape) {
            (_, ScriptShape::NoScript) => String::new(),
            (CompileTarget::Server, ScriptShape::SetupScript) => {
                server_json(&setup_server(request.source, &mut diagnostics))
            }
            (CompileTarget::Server, ScriptShape::OptionsScript) => {
                server_json(&options_server(request.source, &mut diagnostics))
            }
            (CompileTarget::Client, ScriptShape::OptionsScript) => request.source.to_string(),
            (CompileTarget::Client, ScriptShape::SetupScript) => setup_client(request.source, &mut diagnostics),
        };
        CompileOutput {
            code,
            diagnostics,
        }
    }
}

fn server_json(script: &ServerScript) -> String {
    serde_json::to_string(script).unwrap_or_else(|_| "{}".to_string())
}

/// A `const|let|var` declaration split into its declarators.
struct Declaration<'a> {
    declarators: Vec<(&'a str, Option<&'a str>)>,
}

fn declaration(statement: &str) -> Option<Declaration<'_>> {
    let rest = ["const ", "let ", "var "].into_iter().find_map(|kw| statement.strip_prefix(kw))?;
    let declarators = split_top_level(rest, b',')
        .into_iter()
        .map(|decl| {
            let masked = mask_non_code(decl);
            match masked.find('=').filter(|&p| !masked[p..].starts_with("==") && !masked[p..].starts_with("=>")) {
                Some(p) => (decl[..p].trim(), Some(decl[p + 1..].trim())),
                None => (decl.trim(), None),
            }
        })
        .collect();
    Some(Declaration {
        declarators,
    })
}

/// `name(args)` where the whole expression is one call; returns the args.
fn call_arguments<'a>(expr: &'a str, callee: &str) -> Option<&'a str> {
    let rest = expr.strip_prefix(callee)?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let masked = mask_non_code(rest);
    let mut depth = 1usize;
    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return rest[i + 1..].trim().is_empty().then(|| rest[..i].trim());
                }
            }
            _ => {}
        }
    }
    None
}

/// Prop names from a `defineProps` argument or `props` option value.
fn prop_names(arg: &str) -> Option<Vec<String>> {
    match js_literal_to_json(arg) {
        Some(Value::Array(items)) => items.into_iter().map(|v| v.as_str().map(str::to_string)).collect(),
        _ => {
            let body = arg.trim().strip_prefix('{')?.strip_suffix('}')?;
            let mut names = Vec::new();
            for entry in split_top_level(body, b',') {
                let masked = mask_non_code(entry);
                let key = masked.find(':').map_or(entry, |p| &entry[..p]).trim();
                let key = match js_literal_to_json(key) {
                    Some(Value::String(s)) => s,
                    _ if is_identifier(key) => key.to_string(),
                    _ => return None,
                };
                names.push(key);
            }
            Some(names)
        }
    }
}

/// Props from `defineProps(...)`, possibly wrapped in `withDefaults(...)`.
fn define_props(expr: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Option<Vec<String>>> {
    let expr = call_arguments(expr, "withDefaults")
        .and_then(|args| split_top_level(args, b',').into_iter().next())
        .unwrap_or(expr);
    if expr.starts_with("defineProps<") {
        diagnostics.push(Diagnostic::warning(
            "type-only defineProps declarations are not read on the server",
        ));
        return Some(None);
    }
    let args = call_arguments(expr, "defineProps")?;
    if args.is_empty() {
        return Some(Some(Vec::new()));
    }
    match prop_names(args) {
        Some(names) => Some(Some(names)),
        None => {
            diagnostics.push(Diagnostic::error(format!("unsupported defineProps argument: {args}")));
            Some(None)
        }
    }
}

/// Literal value of a setup initializer, unwrapping `ref(...)` and friends.
fn literal_state(init: &str) -> Option<Value> {
    for wrapper in STATE_WRAPPERS {
        if let Some(args) = call_arguments(init, wrapper) {
            return if args.is_empty() { Some(Value::Null) } else { js_literal_to_json(args) };
        }
    }
    js_literal_to_json(init)
}

fn setup_server(source: &str, diagnostics: &mut Vec<Diagnostic>) -> ServerScript {
    let mut setup = Map::new();
    let mut props = None;

    for span in statements(source) {
        let statement = &source[span];
        if let Some(found) = define_props(statement, diagnostics) {
            props = found;
            continue;
        }
        let Some(decl) = declaration(statement) else {
            continue;
        };
        for (name, init) in decl.declarators {
            let Some(init) = init else {
                continue;
            };
            if let Some(found) = define_props(init, diagnostics) {
                props = found;
                continue;
            }
            if init.starts_with("defineEmits") {
                continue;
            }
            if !is_identifier(name) {
                diagnostics.push(Diagnostic::warning(format!(
                    "destructured binding `{name}` is only available on the client"
                )));
                continue;
            }
            match literal_state(init) {
                Some(value) => {
                    setup.insert(name.to_string(), value);
                }
                None => diagnostics.push(Diagnostic::warning(format!(
                    "binding `{name}` is not a literal and is only available on the client"
                ))),
            }
        }
    }

    ServerScript {
        setup: Some(setup),
        props,
    }
}

/// Top-level `key: value` / `key() {}` properties of an object literal body.
fn object_properties(body: &str) -> Vec<(String, &str)> {
    let mut properties = Vec::new();
    for entry in split_top_level(body, b',') {
        let key_end = entry
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(entry.len());
        let (key, rest) = entry.split_at(key_end);
        if key.is_empty() {
            continue;
        }
        let rest = rest.trim_start();
        let value = rest.strip_prefix(':').map_or(rest, str::trim_start);
        properties.push((key.to_string(), value));
    }
    properties
}

/// The object literal a `data` option returns.
fn data_literal(value: &str) -> Option<Value> {
    let masked = mask_non_code(value);
    if let Some(arrow) = masked.find("=>") {
        let body = value[arrow + 2..].trim();
        if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
            return js_literal_to_json(inner);
        }
        if !body.starts_with('{') {
            return js_literal_to_json(body);
        }
    }

    let open = masked.find('{')?;
    let close = matching_close(&masked, open)?;
    let body = &value[open + 1..close];
    let body_masked = &masked[open + 1..close];
    let ret = *find_top_level_word(body_masked, "return").first()?;
    let returned = &body[ret + "return".len()..];
    let end = statements(returned).first().map_or(returned.len(), |span| span.end);
    js_literal_to_json(returned[..end].trim())
}

fn options_server(source: &str, diagnostics: &mut Vec<Diagnostic>) -> ServerScript {
    let masked = mask_non_code(source);
    let Some(export) = find_top_level_word(&masked, "default").into_iter().find(|&p| {
        masked[..p].trim_end().ends_with("export")
    }) else {
        diagnostics.push(Diagnostic::error("script has no top-level default export"));
        return ServerScript::default();
    };

    let after = export + "default".len();
    let Some(open) = masked[after..].find('{').map(|p| p + after) else {
        diagnostics.push(Diagnostic::error("default export is not an object literal"));
        return ServerScript::default();
    };
    let Some(close) = matching_close(&masked, open) else {
        diagnostics.push(Diagnostic::error("default export object is not closed"));
        return ServerScript::default();
    };

    let mut script = ServerScript::default();
    for (key, value) in object_properties(&source[open + 1..close]) {
        match key.as_str() {
            "data" => match data_literal(value) {
                Some(Value::Object(map)) => script.setup = Some(map),
                _ => diagnostics.push(Diagnostic::warning(
                    "data() does not return an object literal; its state is only available on the client",
                )),
            },
            "props" => match prop_names(value) {
                Some(names) => script.props = Some(names),
                None => diagnostics.push(Diagnostic::error(format!("unsupported props option: {value}"))),
            },
            _ => {}
        }
    }
    script
}

/// Names a top-level statement binds, if any.
fn bound_names(statement: &str) -> Vec<String> {
    let words: Vec<&str> = statement.split_whitespace().take(3).collect();
    match words.as_slice() {
        ["function", name, ..] | ["class", name, ..] | ["async", "function", name] => {
            let name: String = name.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$').collect();
            if name.is_empty() { Vec::new() } else { vec![name] }
        }
        _ => match declaration(statement) {
            Some(decl) => decl
                .declarators
                .iter()
                .flat_map(|(pattern, _)| pattern_names(pattern))
                .collect(),
            None => Vec::new(),
        },
    }
}

/// Identifiers bound by a declaration pattern (`a`, `{ a, b: c }`, `[x, y]`).
fn pattern_names(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim();
    if is_identifier(pattern) {
        return vec![pattern.to_string()];
    }
    let Some(inner) = pattern
        .strip_prefix('{')
        .and_then(|p| p.strip_suffix('}'))
        .or_else(|| pattern.strip_prefix('[').and_then(|p| p.strip_suffix(']')))
    else {
        return Vec::new();
    };
    split_top_level(inner, b',')
        .into_iter()
        .flat_map(|part| {
            let part = part.trim_start_matches("...");
            let target = part.split_once(':').map_or(part, |(_, t)| t);
            let target = target.split_once('=').map_or(target, |(t, _)| t);
            pattern_names(target)
        })
        .collect()
}

/// Local names an import statement introduces, unless it imports from `vue`.
fn imported_names(statement: &str) -> Vec<String> {
    let Some(rest) = statement.strip_prefix("import") else {
        return Vec::new();
    };
    let Some(from) = rest.rfind("from") else {
        return Vec::new();
    };
    let module = rest[from + 4..].trim().trim_matches(|c| c == '\'' || c == '"' || c == ';');
    if module == "vue" {
        return Vec::new();
    }

    let clause = rest[..from].trim().trim_start_matches("type ").trim();
    let mut names = Vec::new();
    for part in split_top_level(clause, b',') {
        if let Some(named) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            for spec in split_top_level(named, b',') {
                let local = spec.rsplit(" as ").next().unwrap_or(spec).trim();
                if is_identifier(local) {
                    names.push(local.to_string());
                }
            }
        } else if let Some(ns) = part.strip_prefix("* as ") {
            names.push(ns.trim().to_string());
        } else if is_identifier(part) {
            names.push(part.to_string());
        }
    }
    names
}

fn expose(names: Vec<String>, exposed: &mut Vec<String>) {
    for name in names {
        if !exposed.contains(&name) {
            exposed.push(name);
        }
    }
}

fn setup_client(source: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
    let mut imports = Vec::new();
    let mut body = Vec::new();
    let mut exposed: Vec<String> = Vec::new();
    let mut props_option: Option<String> = None;
    let mut emits_option: Option<String> = None;

    for span in statements(source) {
        let statement = &source[span];
        if statement.starts_with("import ") || statement.starts_with("import{") {
            expose(imported_names(statement), &mut exposed);
            imports.push(statement.to_string());
            continue;
        }
        if statement.starts_with("export ") {
            diagnostics.push(Diagnostic::error("<script setup> cannot contain exports"));
            continue;
        }

        let mut rewritten = statement.to_string();
        for (macro_name, replacement, option) in [
            ("defineProps", "__props", &mut props_option),
            ("defineEmits", "__emit", &mut emits_option),
        ] {
            let masked = mask_non_code(&rewritten);
            let Some(at) = masked.find(macro_name) else {
                continue;
            };
            let Some(open) = masked[at..].find('(').map(|p| p + at) else {
                continue;
            };
            let Some(close) = matching_close(&masked, open) else {
                continue;
            };
            let args = rewritten[open + 1..close].trim().to_string();
            if !args.is_empty() && option.is_none() {
                *option = Some(args);
            }
            rewritten.replace_range(at..=close, replacement);
        }

        expose(bound_names(&rewritten), &mut exposed);
        body.push(rewritten);
    }

    let mut out = String::new();
    for import in &imports {
        out.push_str(import);
        out.push_str(";\n");
    }
    out.push_str("export default {\n");
    if let Some(props) = &props_option {
        out.push_str(&format!("  props: {props},\n"));
    }
    if let Some(emits) = &emits_option {
        out.push_str(&format!("  emits: {emits},\n"));
    }
    out.push_str("  setup(__props, { emit: __emit }) {\n");
    for statement in &body {
        for line in statement.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&format!("    return {{ {} }};\n", exposed.join(", ")));
    out.push_str("  }\n};\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(source: &str, shape: ScriptShape, target: CompileTarget) -> CompileOutput {
        VueScriptCompiler::new().compile_script(&ScriptRequest {
            source,
            shape,
            id: "components/test",
            scope_id: "1a2b3c4d",
            target,
        })
    }

    fn server(source: &str, shape: ScriptShape) -> (ServerScript, Vec<Diagnostic>) {
        let out = compile(source, shape, CompileTarget::Server);
        (serde_json::from_str(&out.code).unwrap(), out.diagnostics)
    }

    #[test]
    fn test_setup_script_state_and_props() {
        let source = r#"
import { ref, computed } from 'vue'
const props = defineProps(['label', 'start'])
const count = ref(0)
const user = reactive({ name: 'Ada', tags: ['x'] })
let title = "Hello", empty = ref()
const doubled = computed(() => count.value * 2)
function inc() { count.value++ }
"#;
        let (script, diagnostics) = server(source, ScriptShape::SetupScript);
        assert_eq!(
            Value::Object(script.setup.unwrap()),
            json!({"count": 0, "user": {"name": "Ada", "tags": ["x"]}, "title": "Hello", "empty": null})
        );
        assert_eq!(script.props, Some(vec!["label".to_string(), "start".to_string()]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("doubled"));
    }

    #[test]
    fn test_define_props_object_and_defaults() {
        let (script, _) = server(
            "const props = withDefaults(defineProps({ label: String, 'max-count': { type: Number } }), { label: 'x' })",
            ScriptShape::SetupScript,
        );
        assert_eq!(script.props, Some(vec!["label".to_string(), "max-count".to_string()]));
    }

    #[test]
    fn test_options_script() {
        let source = r#"
const LIMIT = 10
export default {
  name: 'Counter',
  props: { start: Number },
  data() {
    const local = 1
    return { count: 0, limit: 10 }
  },
  methods: { inc() { this.count++ } }
}
"#;
        let (script, diagnostics) = server(source, ScriptShape::OptionsScript);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(Value::Object(script.setup.unwrap()), json!({"count": 0, "limit": 10}));
        assert_eq!(script.props, Some(vec!["start".to_string()]));
    }

    #[test]
    fn test_options_data_arrow() {
        let (script, _) = server(
            "export default { data: () => ({ open: false }), props: ['a'] }",
            ScriptShape::OptionsScript,
        );
        assert_eq!(Value::Object(script.setup.unwrap()), json!({"open": false}));
        assert_eq!(script.props, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_options_without_data() {
        let (script, diagnostics) = server("export default { name: 'Plain' }", ScriptShape::OptionsScript);
        assert_eq!(script, ServerScript::default());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_options_without_default_export() {
        let out = compile("const a = 1", ScriptShape::OptionsScript, CompileTarget::Server);
        assert!(out.has_errors());
    }

    #[test]
    fn test_client_options_passthrough() {
        let source = "export default { data() { return { a: 1 } } }";
        let out = compile(source, ScriptShape::OptionsScript, CompileTarget::Client);
        assert_eq!(out.code, source);
    }

    #[test]
    fn test_client_setup_rewrite() {
        let source = r#"import { ref } from 'vue'
import Chart from './chart.js'
const props = defineProps(['label'])
const emit = defineEmits(['change'])
const count = ref(0)
function inc() {
  count.value++
  emit('change', count.value)
}"#;
        let out = compile(source, ScriptShape::SetupScript, CompileTarget::Client);
        assert!(!out.has_errors(), "{:?}", out.diagnostics);
        let code = out.code;
        assert!(code.starts_with("import { ref } from 'vue';\nimport Chart from './chart.js';\nexport default {\n"));
        assert!(code.contains("  props: ['label'],\n"));
        assert!(code.contains("  emits: ['change'],\n"));
        assert!(code.contains("  setup(__props, { emit: __emit }) {\n"));
        assert!(code.contains("    const props = __props\n"));
        assert!(code.contains("    const emit = __emit\n"));
        assert!(code.contains("    return { Chart, props, emit, count, inc };\n"));
        assert_eq!(code.matches("export default").count(), 1);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(pattern_names("{ a, b: c, ...rest }"), vec!["a", "c", "rest"]);
        assert_eq!(pattern_names("[x, y = 2]"), vec!["x", "y"]);
    }
}
