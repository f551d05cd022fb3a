//! Built-in template compiler.
//!
//! Templates use the Vue syntax subset that can be rendered without a
//! JavaScript runtime. For the server target they are translated into Tera:
//!
//! | Template                         | Tera                                            |
//! |----------------------------------|-------------------------------------------------|
//! | `{{ a && b }}`                   | `{{ a and b }}`                                 |
//! | `{{ ok ? x : y }}`               | `{% if ok %}{{ x }}{% else %}{{ y }}{% endif %}`|
//! | `v-if` / `v-else-if` / `v-else`  | `{% if %}` / `{% elif %}` / `{% else %}`         |
//! | `{{ 'Hi ' + name }}`             | `{{ "Hi " ~ name }}`                            |
//! | `v-for="item in items"`          | `{% for item in items %}`                       |
//! | `:title="t"`                     | `title="{{ t }}"`                               |
//! | `<SampleCounter :start="n"/>`    | `{{ __component(__name="SampleCounter", start=n) \| safe }}` |
//!
//! Expressions are restricted to property access, indexing, literals and
//! operators; calls, `null`, template strings and nested ternaries are
//! rejected with an error diagnostic. A two-name `v-for` is lowered to a
//! key/value loop when its source is an object and to a loop with a position
//! otherwise. The generated template is parsed before it is returned, so
//! anything Tera would reject is reported as an error here. The client target only validates the
//! markup and hands the template to the Vue runtime compiler in the browser.

use serde_json::Value;

use super::js::{is_identifier, js_literal_to_json, mask_non_code, split_top_level};
use super::{CompileOutput, CompileTarget, Diagnostic, TemplateCompiler, TemplateRequest};
use crate::constants::{COMPONENT_FUNCTION, COMPONENT_NAME_ARG};
use crate::loader::host::format_tera_error;
use crate::sfc::markup::{Attribute, line_of, scan_tag};

/// Context variable holding the source of a two-name `v-for`.
const FOR_SOURCE: &str = "__islet_for_source";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "allowfullscreen", "async", "autofocus", "autoplay", "checked", "controls", "default", "defer",
    "disabled", "formnovalidate", "hidden", "inert", "loop", "multiple", "muted", "novalidate",
    "open", "readonly", "required", "reversed", "selected",
];

/// Built-in compiler for Vue-style templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct VueTemplateCompiler;

impl VueTemplateCompiler {
    /// Create the compiler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TemplateCompiler for VueTemplateCompiler {
    fn compile_template(&self, request: &TemplateRequest<'_>) -> CompileOutput {
        let (nodes, mut diagnostics) = parse_nodes(request.source);

        let code = match request.target {
            CompileTarget::Server => {
                let mut codegen = ServerCodegen {
                    out: String::with_capacity(request.source.len() * 2),
                    diagnostics: &mut diagnostics,
                    scope_attribute: request.scoped.then(|| format!("data-v-{}", request.scope_id)),
                };
                codegen.children(&nodes);
                let code = codegen.out;
                if !diagnostics.iter().any(Diagnostic::is_error) {
                    if let Err(e) = tera::Tera::default().add_raw_template("render.html", &code) {
                        diagnostics.push(Diagnostic::error(format!(
                            "generated template does not parse: {}",
                            format_tera_error(&e)
                        )));
                    }
                }
                code
            }
            CompileTarget::Client => {
                check_structure(&nodes, &mut diagnostics);
                format!(
                    "import {{ compile as __compile }} from \"vue\";\nexport const render = __compile({});\n",
                    Value::String(request.source.trim().to_string())
                )
            }
        };

        CompileOutput {
            code,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
    line: usize,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    fn is_component(&self) -> bool {
        self.name.starts_with(|c: char| c.is_ascii_uppercase())
    }

    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.to_ascii_lowercase().as_str())
    }

    fn chain_role(&self) -> ChainRole<'_> {
        if let Some(cond) = self.attribute("v-if") {
            ChainRole::If(cond)
        } else if let Some(cond) = self.attribute("v-else-if") {
            ChainRole::ElseIf(cond)
        } else if self.attribute("v-else").is_some() {
            ChainRole::Else
        } else {
            ChainRole::None
        }
    }

    fn has_content(&self) -> bool {
        self.children.iter().any(|child| match child {
            Node::Text(t) => !t.trim().is_empty(),
            Node::Element(_) => true,
        })
    }
}

enum ChainRole<'a> {
    If(&'a str),
    ElseIf(&'a str),
    Else,
    None,
}

/// Build the node tree, reporting unbalanced markup.
fn parse_nodes(source: &str) -> (Vec<Node>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut text = String::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    fn attach(node: Node, stack: &mut [Element], roots: &mut Vec<Node>) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }

    fn flush(text: &mut String, stack: &mut [Element], roots: &mut Vec<Node>) {
        if !text.is_empty() {
            attach(Node::Text(std::mem::take(text)), stack, roots);
        }
    }

    while pos < bytes.len() {
        let rest = &source[pos..];
        if rest.starts_with("{{") {
            match rest[2..].find("}}") {
                Some(end) => {
                    text.push_str(&rest[..end + 4]);
                    pos += end + 4;
                }
                None => {
                    diagnostics.push(
                        Diagnostic::error("unterminated {{ interpolation").at_line(line_of(source, pos)),
                    );
                    pos = bytes.len();
                }
            }
            continue;
        }
        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => pos += end + 3,
                None => {
                    diagnostics.push(Diagnostic::error("unterminated comment").at_line(line_of(source, pos)));
                    pos = bytes.len();
                }
            }
            continue;
        }
        if bytes[pos] == b'<' {
            let line = line_of(source, pos);
            if let Some(tag) = scan_tag(source, pos) {
                flush(&mut text, &mut stack, &mut roots);
                pos = tag.end;

                if tag.closing {
                    if VOID_ELEMENTS.contains(&tag.name.to_ascii_lowercase().as_str()) {
                        continue;
                    }
                    match stack.iter().rposition(|el| el.name == tag.name) {
                        Some(index) => {
                            while stack.len() > index + 1 {
                                if let Some(unclosed) = stack.pop() {
                                    diagnostics.push(
                                        Diagnostic::error(format!(
                                            "element <{}> is missing a closing tag",
                                            unclosed.name
                                        ))
                                        .at_line(unclosed.line),
                                    );
                                    attach(Node::Element(unclosed), &mut stack, &mut roots);
                                }
                            }
                            if let Some(closed) = stack.pop() {
                                attach(Node::Element(closed), &mut stack, &mut roots);
                            }
                        }
                        None => diagnostics.push(
                            Diagnostic::error(format!("unexpected closing tag </{}>", tag.name)).at_line(line),
                        ),
                    }
                    continue;
                }

                let element = Element {
                    name: tag.name,
                    attributes: tag.attributes,
                    children: Vec::new(),
                    line,
                };
                if tag.self_closing || element.is_void() {
                    attach(Node::Element(element), &mut stack, &mut roots);
                } else {
                    stack.push(element);
                }
                continue;
            }
            if bytes.get(pos + 1).is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/') {
                diagnostics.push(Diagnostic::error("unterminated tag").at_line(line));
                pos = bytes.len();
                continue;
            }
            text.push('<');
            pos += 1;
            continue;
        }

        let next = [rest.find('<'), rest.find("{{")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rest.len())
            .max(1);
        let chunk_end = (pos + next).min(bytes.len());
        let chunk_end = (chunk_end..=bytes.len())
            .find(|&i| source.is_char_boundary(i))
            .unwrap_or(bytes.len());
        text.push_str(&source[pos..chunk_end]);
        pos = chunk_end;
    }

    flush(&mut text, &mut stack, &mut roots);
    while let Some(unclosed) = stack.pop() {
        diagnostics.push(
            Diagnostic::error(format!("element <{}> is missing a closing tag", unclosed.name))
                .at_line(unclosed.line),
        );
        attach(Node::Element(unclosed), &mut stack, &mut roots);
    }

    (roots, diagnostics)
}

/// Structural checks shared by both targets: conditional chains and loops.
fn check_structure(nodes: &[Node], diagnostics: &mut Vec<Diagnostic>) {
    let mut open_chain = false;
    for node in nodes {
        match node {
            Node::Text(t) if t.trim().is_empty() => {}
            Node::Text(_) => open_chain = false,
            Node::Element(el) => {
                match el.chain_role() {
                    ChainRole::If(_) => open_chain = true,
                    ChainRole::ElseIf(_) if open_chain => {}
                    ChainRole::Else if open_chain => open_chain = false,
                    ChainRole::ElseIf(_) | ChainRole::Else => diagnostics.push(orphan_else(el)),
                    ChainRole::None => open_chain = false,
                }
                if let Some(spec) = el.attribute("v-for") {
                    if let Err(reason) = parse_v_for(spec) {
                        diagnostics.push(Diagnostic::error(reason).at_line(el.line));
                    }
                }
                check_structure(&el.children, diagnostics);
            }
        }
    }
}

fn orphan_else(el: &Element) -> Diagnostic {
    Diagnostic::error(format!(
        "v-else/v-else-if on <{}> has no preceding v-if or v-else-if element",
        el.name
    ))
    .at_line(el.line)
}

struct VFor {
    item: String,
    index: Option<String>,
    source: String,
}

fn parse_v_for(spec: &str) -> Result<VFor, String> {
    let malformed = || format!("malformed v-for expression \"{spec}\"");
    let (lhs, rhs) = [" in ", " of "]
        .iter()
        .filter_map(|sep| spec.find(sep).map(|p| (&spec[..p], &spec[p + sep.len()..])))
        .min_by_key(|(lhs, _)| lhs.len())
        .ok_or_else(malformed)?;

    let lhs = lhs.trim();
    let names: Vec<&str> = match lhs.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner.split(',').map(str::trim).collect(),
        None => vec![lhs],
    };
    if names.is_empty() || names.len() > 2 || !names.iter().all(|n| is_identifier(n)) {
        return Err(malformed());
    }
    let source = rhs.trim();
    if source.is_empty() {
        return Err(malformed());
    }

    Ok(VFor {
        item: names[0].to_string(),
        index: names.get(1).map(|s| (*s).to_string()),
        source: source.to_string(),
    })
}

struct ServerCodegen<'a> {
    out: String,
    diagnostics: &'a mut Vec<Diagnostic>,
    scope_attribute: Option<String>,
}

impl ServerCodegen<'_> {
    fn error(&mut self, message: impl Into<String>, line: usize) {
        let diagnostic = Diagnostic::error(message);
        self.diagnostics.push(if line > 0 { diagnostic.at_line(line) } else { diagnostic });
    }

    fn expression(&mut self, expr: &str, line: usize) -> String {
        match translate_expression(expr) {
            Ok(translated) => translated,
            Err(reason) => {
                self.error(format!("{reason} in expression \"{}\"", expr.trim()), line);
                "false".to_string()
            }
        }
    }

    /// Tera output of `expr`. A top-level ternary becomes an `if` block.
    fn output(&mut self, expr: &str, line: usize, filter: &str) -> String {
        match split_ternary(expr) {
            Some((cond, yes, no)) => {
                let cond = self.expression(cond, line);
                let yes = self.expression(yes, line);
                let no = self.expression(no, line);
                format!("{{% if {cond} %}}{{{{ {yes}{filter} }}}}{{% else %}}{{{{ {no}{filter} }}}}{{% endif %}}")
            }
            None => format!("{{{{ {}{filter} }}}}", self.expression(expr, line)),
        }
    }

    fn children(&mut self, nodes: &[Node]) {
        let mut open_chain = false;
        let mut held_whitespace = String::new();

        for node in nodes {
            let el = match node {
                Node::Text(t) if open_chain && t.trim().is_empty() => {
                    held_whitespace.push_str(t);
                    continue;
                }
                Node::Text(t) => {
                    if open_chain {
                        self.out.push_str("{% endif %}");
                        open_chain = false;
                    }
                    self.out.push_str(&std::mem::take(&mut held_whitespace));
                    self.text(t, 0);
                    continue;
                }
                Node::Element(el) => el,
            };

            match el.chain_role() {
                ChainRole::If(cond) => {
                    if open_chain {
                        self.out.push_str("{% endif %}");
                    }
                    self.out.push_str(&std::mem::take(&mut held_whitespace));
                    let cond = self.expression(cond, el.line);
                    self.out.push_str(&format!("{{% if {cond} %}}"));
                    open_chain = true;
                }
                ChainRole::ElseIf(cond) if open_chain => {
                    held_whitespace.clear();
                    let cond = self.expression(cond, el.line);
                    self.out.push_str(&format!("{{% elif {cond} %}}"));
                }
                ChainRole::Else if open_chain => {
                    held_whitespace.clear();
                    self.out.push_str("{% else %}");
                    self.element(el);
                    self.out.push_str("{% endif %}");
                    open_chain = false;
                    continue;
                }
                ChainRole::ElseIf(_) | ChainRole::Else => {
                    let diagnostic = orphan_else(el);
                    self.diagnostics.push(diagnostic);
                    continue;
                }
                ChainRole::None => {
                    if open_chain {
                        self.out.push_str("{% endif %}");
                        open_chain = false;
                    }
                    self.out.push_str(&std::mem::take(&mut held_whitespace));
                }
            }
            self.element(el);
        }

        if open_chain {
            self.out.push_str("{% endif %}");
        }
        self.out.push_str(&held_whitespace);
    }

    fn element(&mut self, el: &Element) {
        let v_for = match el.attribute("v-for").map(parse_v_for) {
            Some(Ok(v_for)) => Some(v_for),
            Some(Err(reason)) => {
                self.error(reason, el.line);
                return;
            }
            None => None,
        };

        let Some(v_for) = v_for else {
            self.body(el);
            return;
        };

        let numeric = v_for.source.parse::<u64>().ok();
        let source = match numeric {
            Some(n) => format!("range(start=1, end={})", n + 1),
            None => self.expression(&v_for.source, el.line),
        };
        let item = &v_for.item;
        let Some(index) = &v_for.index else {
            self.out.push_str(&format!("{{% for {item} in {source} %}}"));
            self.body(el);
            self.out.push_str("{% endfor %}");
            return;
        };
        if numeric.is_some() {
            self.out.push_str(&format!("{{% for {item} in {source} %}}{{% set {index} = loop.index0 %}}"));
            self.body(el);
            self.out.push_str("{% endfor %}");
            return;
        }

        // `(value, key) in object` names the key; arrays name the position.
        let outer = std::mem::take(&mut self.out);
        self.body(el);
        let body = std::mem::replace(&mut self.out, outer);
        self.out.push_str(&format!(
            "{{% set {FOR_SOURCE} = {source} %}}{{% if {FOR_SOURCE} is object %}}\
             {{% for {index}, {item} in {FOR_SOURCE} %}}{body}{{% endfor %}}{{% else %}}\
             {{% for {item} in {FOR_SOURCE} %}}{{% set {index} = loop.index0 %}}{body}{{% endfor %}}{{% endif %}}"
        ));
    }

    fn body(&mut self, el: &Element) {
        if el.is_component() {
            self.component(el);
        } else if el.name == "template" {
            self.children(&el.children);
        } else {
            self.native(el);
        }
    }

    fn component(&mut self, el: &Element) {
        let mut args = vec![format!("{COMPONENT_NAME_ARG}=\"{}\"", el.name)];

        for attr in &el.attributes {
            let (prop, value) = match classify(attr) {
                AttrKind::Static => match tera_string_literal(attr.value.as_deref().unwrap_or("")) {
                    Some(literal) => (attr.name.as_str(), literal),
                    None => {
                        self.error(format!("cannot pass static value of \"{}\" to <{}>", attr.name, el.name), el.line);
                        continue;
                    }
                },
                AttrKind::Bound(name) => (name, self.expression(attr.value.as_deref().unwrap_or(""), el.line)),
                AttrKind::Model => ("modelValue", self.expression(attr.value.as_deref().unwrap_or(""), el.line)),
                _ => continue,
            };
            let prop = camelize(prop);
            if !is_identifier(&prop) {
                self.diagnostics.push(
                    Diagnostic::warning(format!("prop \"{prop}\" on <{}> is not a valid name; skipped", el.name))
                        .at_line(el.line),
                );
                continue;
            }
            args.push(format!("{prop}={value}"));
        }

        if el.has_content() {
            self.diagnostics.push(
                Diagnostic::warning(format!("slot content of <{}> is not rendered on the server", el.name))
                    .at_line(el.line),
            );
        }

        self.out.push_str(&format!("{{{{ {COMPONENT_FUNCTION}({}) | safe }}}}", args.join(", ")));
    }

    fn native(&mut self, el: &Element) {
        let mut static_class = String::new();
        let mut static_style = String::new();
        let mut dynamic_class = Vec::new();
        let mut dynamic_style = Vec::new();
        let mut attributes = String::new();
        let mut content: Option<String> = None;

        for attr in &el.attributes {
            let value = attr.value.as_deref().unwrap_or("");
            match classify(attr) {
                AttrKind::Static if attr.name == "class" => static_class = escape_literal(value),
                AttrKind::Static if attr.name == "style" => static_style = escape_literal(value),
                AttrKind::Static => match &attr.value {
                    Some(v) => attributes.push_str(&format!(" {}=\"{}\"", attr.name, escape_literal(v))),
                    None => attributes.push_str(&format!(" {}", attr.name)),
                },
                AttrKind::Bound("class") => dynamic_class.push(self.class_binding(value, el.line)),
                AttrKind::Bound("style") => dynamic_style.push(self.style_binding(value, el.line)),
                AttrKind::Bound(name) if BOOLEAN_ATTRIBUTES.contains(&name) => {
                    let cond = self.expression(value, el.line);
                    attributes.push_str(&format!("{{% if {cond} %}} {name}{{% endif %}}"));
                }
                AttrKind::Bound(name) => {
                    let output = self.output(value, el.line, "");
                    attributes.push_str(&format!(" {name}=\"{output}\""));
                }
                AttrKind::Show => {
                    let cond = self.expression(value, el.line);
                    dynamic_style.push(format!("{{% if not ({cond}) %}}display:none{{% endif %}}"));
                }
                AttrKind::Html => content = Some(self.output(value, el.line, " | safe")),
                AttrKind::Text => content = Some(self.output(value, el.line, "")),
                AttrKind::Model => {
                    let expr = self.expression(value, el.line);
                    match (el.name.as_str(), el.attribute("type")) {
                        ("input", Some("checkbox")) => {
                            attributes.push_str(&format!("{{% if {expr} %}} checked{{% endif %}}"));
                        }
                        ("input", Some("radio")) => {
                            let option = tera_string_literal(el.attribute("value").unwrap_or(""))
                                .unwrap_or_else(|| "\"\"".to_string());
                            attributes.push_str(&format!("{{% if {expr} == {option} %}} checked{{% endif %}}"));
                        }
                        ("textarea", _) => content = Some(format!("{{{{ {expr} }}}}")),
                        ("select", _) => {}
                        _ => attributes.push_str(&format!(" value=\"{{{{ {expr} }}}}\"")),
                    }
                }
                AttrKind::Structural | AttrKind::Dropped => {}
            }
        }

        self.out.push('<');
        self.out.push_str(&el.name);
        if !static_class.is_empty() || !dynamic_class.is_empty() {
            let mut class = static_class;
            for piece in dynamic_class {
                if !class.is_empty() {
                    class.push(' ');
                }
                class.push_str(&piece);
            }
            self.out.push_str(&format!(" class=\"{class}\""));
        }
        if !static_style.is_empty() || !dynamic_style.is_empty() {
            let mut style = static_style.trim_end().trim_end_matches(';').to_string();
            for piece in dynamic_style {
                if !style.is_empty() {
                    style.push(';');
                }
                style.push_str(&piece);
            }
            self.out.push_str(&format!(" style=\"{style}\""));
        }
        self.out.push_str(&attributes);
        if let Some(scope) = &self.scope_attribute {
            self.out.push_str(&format!(" {scope}=\"\""));
        }
        self.out.push('>');

        if el.is_void() {
            return;
        }

        match content {
            Some(content) => self.out.push_str(&content),
            None if el.attribute("v-pre").is_some() => {
                for child in &el.children {
                    if let Node::Text(t) = child {
                        self.out.push_str(&escape_literal(t));
                    }
                }
            }
            None => self.children(&el.children),
        }

        self.out.push_str(&format!("</{}>", el.name));
    }

    fn class_binding(&mut self, expr: &str, line: usize) -> String {
        let trimmed = expr.trim();
        if let Some(body) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let mut pieces = Vec::new();
            for entry in split_top_level(body, b',') {
                let Some((key, cond)) = split_property(entry) else {
                    self.error(format!("unsupported class binding entry \"{entry}\""), line);
                    continue;
                };
                let cond = self.expression(cond, line);
                pieces.push(format!("{{% if {cond} %}}{}{{% endif %}}", escape_literal(&key)));
            }
            return pieces.join(" ");
        }
        if let Some(body) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return split_top_level(body, b',')
                .into_iter()
                .map(|item| self.output(item, line, ""))
                .collect::<Vec<_>>()
                .join(" ");
        }
        self.output(trimmed, line, "")
    }

    fn style_binding(&mut self, expr: &str, line: usize) -> String {
        let trimmed = expr.trim();
        if let Some(body) = trimmed.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let mut declarations = Vec::new();
            for entry in split_top_level(body, b',') {
                let Some((key, value)) = split_property(entry) else {
                    self.error(format!("unsupported style binding entry \"{entry}\""), line);
                    continue;
                };
                let value = self.output(value, line, "");
                declarations.push(format!("{}:{value}", hyphenate(&key)));
            }
            return declarations.join(";");
        }
        self.output(trimmed, line, "")
    }

    fn text(&mut self, text: &str, line: usize) {
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            self.out.push_str(&escape_literal(&rest[..start]));
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                self.out.push_str(&escape_literal(&rest[start..]));
                return;
            };
            self.interpolation(&after[..end], line);
            rest = &after[end + 2..];
        }
        self.out.push_str(&escape_literal(rest));
    }

    fn interpolation(&mut self, expr: &str, line: usize) {
        let output = self.output(expr, line, "");
        self.out.push_str(&output);
    }
}

enum AttrKind<'a> {
    Static,
    Bound(&'a str),
    Show,
    Html,
    Text,
    Model,
    Structural,
    Dropped,
}

fn classify(attr: &Attribute) -> AttrKind<'_> {
    let name = attr.name.as_str();
    match name {
        "v-if" | "v-else-if" | "v-else" | "v-for" => AttrKind::Structural,
        "v-show" => AttrKind::Show,
        "v-html" => AttrKind::Html,
        "v-text" => AttrKind::Text,
        "v-model" => AttrKind::Model,
        "key" | "ref" | ":key" | ":ref" | "v-bind" | "v-pre" => AttrKind::Dropped,
        _ => {
            if let Some(bound) = name.strip_prefix(':').or_else(|| name.strip_prefix("v-bind:")) {
                AttrKind::Bound(bound)
            } else if name.starts_with('@') || name.starts_with('#') || name.starts_with("v-") {
                AttrKind::Dropped
            } else {
                AttrKind::Static
            }
        }
    }
}

/// Split `key: value` of an object-literal entry; quoted keys are unquoted.
fn split_property(entry: &str) -> Option<(String, &str)> {
    let masked = mask_non_code(entry);
    let colon = masked.find(':')?;
    let raw_key = entry[..colon].trim();
    let key = match js_literal_to_json(raw_key) {
        Some(Value::String(s)) => s,
        _ if is_identifier(raw_key) => raw_key.to_string(),
        _ => return None,
    };
    Some((key, entry[colon + 1..].trim()))
}

/// Split a top-level `cond ? yes : no`.
fn split_ternary(expr: &str) -> Option<(&str, &str, &str)> {
    let masked = mask_non_code(expr);
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    let mut question = None;
    let mut nested = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'?' if depth == 0 => {
                let next = bytes.get(i + 1).copied();
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                if next == Some(b'?') || next == Some(b'.') || prev == Some(b'?') {
                    continue;
                }
                if question.is_none() {
                    question = Some(i);
                } else {
                    nested += 1;
                }
            }
            b':' if depth == 0 && question.is_some() => {
                if nested == 0 {
                    let q = question?;
                    return Some((&expr[..q], &expr[q + 1..i], &expr[i + 1..]));
                }
                nested -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Translate a template expression into a Tera expression.
fn translate_expression(expr: &str) -> Result<String, String> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err("empty expression".to_string());
    }

    let chars: Vec<char> = expr.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut i = 0;

    let is_operand_end = |tokens: &[String]| {
        tokens.last().is_some_and(|t| {
            t == ")" || t == "]" || t.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '"')
        }) && !matches!(tokens.last().map(String::as_str), Some("and" | "or" | "not" | "in"))
    };

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match word.as_str() {
                "null" | "undefined" => return Err(format!("`{word}` is not supported")),
                "typeof" | "instanceof" | "new" | "function" | "this" => {
                    return Err(format!("`{word}` is not supported"));
                }
                "length" if tokens.last().is_some_and(|t| t == ".") => {
                    tokens.pop();
                    tokens.push("|".to_string());
                    tokens.push("length".to_string());
                }
                _ => tokens.push(word),
            }
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            let raw: String = chars[start..i].iter().collect();
            match js_literal_to_json(&raw) {
                Some(Value::Number(n)) => tokens.push(n.to_string()),
                _ => return Err(format!("invalid number `{raw}`")),
            }
            continue;
        }

        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' {
                    i += 1;
                }
                i += 1;
            }
            i += 1;
            let raw: String = chars[start..i.min(chars.len())].iter().collect();
            let literal = match js_literal_to_json(&raw) {
                Some(Value::String(s)) => tera_string_literal(&s),
                _ => None,
            };
            tokens.push(literal.ok_or_else(|| format!("unsupported string literal {raw}"))?);
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        let (token, width) = if rest.starts_with("===") {
            ("==", 3)
        } else if rest.starts_with("!==") {
            ("!=", 3)
        } else if rest.starts_with("==") || rest.starts_with("!=") || rest.starts_with("<=") || rest.starts_with(">=") {
            (&rest[..2], 2)
        } else if rest.starts_with("&&") {
            ("and", 2)
        } else if rest.starts_with("||") {
            ("or", 2)
        } else if rest.starts_with("??") || rest.starts_with("?.") {
            return Err(format!("operator `{}` is not supported", &rest[..2]));
        } else if rest.starts_with("=>") {
            return Err("arrow functions are not supported".to_string());
        } else {
            match c {
                '!' => ("not", 1),
                '(' if is_operand_end(&tokens) => {
                    return Err("function calls are not supported".to_string());
                }
                '+' | '-' | '*' | '/' | '%' | '<' | '>' | '(' | ')' | '[' | ']' | '.' | ',' => {
                    (&rest[..c.len_utf8()], 1)
                }
                '`' => return Err("template strings are not supported".to_string()),
                '?' | ':' => {
                    return Err("conditional expressions are only supported as the whole of an interpolation or attribute value"
                        .to_string());
                }
                '=' => return Err("assignments are not supported".to_string()),
                '{' | '}' => return Err("object literals are not supported".to_string()),
                other => return Err(format!("unexpected character `{other}`")),
            }
        };
        tokens.push(token.to_string());
        i += width;
    }

    concatenate_strings(&mut tokens)?;
    Ok(join_tokens(&tokens))
}

/// Turn `+` into Tera's `~` wherever one of its operands is a string literal.
///
/// Tera only joins plain values, so every operand of such a chain must be a
/// literal or a property path.
fn concatenate_strings(tokens: &mut [String]) -> Result<(), String> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut open: Vec<Vec<usize>> = vec![Vec::new()];

    for (i, token) in tokens.iter().enumerate() {
        match token.as_str() {
            "(" | "[" => {
                if let Some(run) = open.last_mut() {
                    run.push(i);
                }
                open.push(Vec::new());
            }
            ")" | "]" => {
                if open.len() > 1 {
                    runs.extend(open.pop());
                }
                if let Some(run) = open.last_mut() {
                    run.push(i);
                }
            }
            "and" | "or" | "not" | "in" | "==" | "!=" | "<" | ">" | "<=" | ">=" | "," => {
                if let Some(run) = open.last_mut() {
                    runs.push(std::mem::take(run));
                }
            }
            _ => {
                if let Some(run) = open.last_mut() {
                    run.push(i);
                }
            }
        }
    }
    runs.extend(open);

    let mut joins = Vec::new();
    for run in &runs {
        let operands: Vec<&[usize]> = run.split(|&i| tokens[i] == "+").collect();
        let Some(first_string) = operands.iter().position(|op| matches!(op, [i] if is_string_token(&tokens[*i])))
        else {
            continue;
        };
        if operands.len() < 2 {
            continue;
        }
        if first_string > 1 {
            return Err("arithmetic before string concatenation is not supported".to_string());
        }
        if let Some(operand) = operands.iter().find(|op| !is_plain_value(tokens, op)) {
            let text: Vec<&str> = operand.iter().map(|&i| tokens[i].as_str()).collect();
            return Err(format!(
                "`{}` cannot be joined to a string; only literals and properties can",
                text.join(" ")
            ));
        }
        joins.extend(run.iter().copied().filter(|&i| tokens[i] == "+"));
    }
    for i in joins {
        tokens[i] = "~".to_string();
    }
    Ok(())
}

fn is_string_token(token: &str) -> bool {
    token.starts_with(['"', '\'', '`'])
}

/// A single literal, or a property path such as `user.name` or `rows[0]`.
fn is_plain_value(tokens: &[String], operand: &[usize]) -> bool {
    let Some((&first, rest)) = operand.split_first() else {
        return false;
    };
    let first = tokens[first].as_str();
    if is_string_token(first) || first.starts_with(|c: char| c.is_ascii_digit()) {
        return rest.is_empty();
    }
    first.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && !matches!(first, "true" | "false")
        && rest.iter().all(|&i| {
            let token = tokens[i].as_str();
            matches!(token, "." | "[" | "]") || token.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

fn join_tokens(tokens: &[String]) -> String {
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for token in tokens {
        let tight = match prev {
            None => true,
            Some(p) => {
                matches!(token.as_str(), "." | ")" | "]" | ",")
                    || matches!(p, "." | "(" | "[")
                    || (token == "[" && (p == ")" || p == "]" || p.starts_with(|c: char| c.is_alphanumeric() || c == '_')))
            }
        };
        if !tight {
            out.push(' ');
        }
        out.push_str(token);
        prev = Some(token);
    }
    out
}

/// Quote `s` as a Tera string literal. Tera strings have no escapes, so the
/// delimiter must not occur in the text.
fn tera_string_literal(s: &str) -> Option<String> {
    ['"', '\'', '`']
        .into_iter()
        .find(|q| !s.contains(*q))
        .map(|q| format!("{q}{s}{q}"))
}

/// Escape `{{`, `{%` and `{#` so literal text never opens a Tera tag.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            if let Some(&next @ ('{' | '%' | '#')) = chars.peek() {
                chars.next();
                let quote = if next == '{' { '\'' } else { '"' };
                out.push_str(&format!("{{{{ {quote}{{{next}{quote} }}}}"));
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// `item-count` → `itemCount`.
fn camelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `fontSize` → `font-size`.
fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
