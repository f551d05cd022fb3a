//! Single-file component parsing.
//!
//! A component source holds one `<template>` block, at most one `<script>` or
//! `<script setup>` block and any number of `<style>` blocks (optionally
//! `scoped`). Other top-level blocks are ignored. The [`ModuleParser`] trait is
//! the seam for swapping in a different parser; [`SfcParser`] is the built-in one.

pub mod markup;

use tracing::debug;

use crate::compiler::Diagnostic;
use markup::{Attribute, line_of, scan_tag};

/// Splits a component source into its blocks.
pub trait ModuleParser: Send + Sync {
    /// Parse `source` of component `id`.
    ///
    /// # Errors
    ///
    /// Returns the diagnostics describing why the source is malformed.
    fn parse(&self, source: &str, id: &str) -> Result<SfcDescriptor, Vec<Diagnostic>>;
}

/// One top-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfcBlock {
    /// Text between the opening and closing tags
    pub content: String,
    /// Attributes of the opening tag
    pub attributes: Vec<Attribute>,
    /// Line of the opening tag
    pub line: usize,
}

impl SfcBlock {
    /// Whether the opening tag carries attribute `name`.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }
}

/// A `<style>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    /// CSS text
    pub content: String,
    /// Whether the block is `scoped`
    pub scoped: bool,
    /// Line of the opening tag
    pub line: usize,
}

/// How a component's script section is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptShape {
    /// No script section
    NoScript,
    /// A plain `<script>` exporting an options object
    OptionsScript,
    /// A `<script setup>` whose top-level bindings form the component state
    SetupScript,
}

/// The blocks of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfcDescriptor {
    /// `<template>`
    pub template: Option<SfcBlock>,
    /// `<script>`
    pub script: Option<SfcBlock>,
    /// `<script setup>`
    pub script_setup: Option<SfcBlock>,
    /// Every `<style>` in source order
    pub styles: Vec<StyleBlock>,
}

impl SfcDescriptor {
    /// Shape of the script section.
    #[must_use]
    pub fn script_shape(&self) -> ScriptShape {
        if self.script_setup.is_some() {
            ScriptShape::SetupScript
        } else if self.script.is_some() {
            ScriptShape::OptionsScript
        } else {
            ScriptShape::NoScript
        }
    }

    /// The script block, whichever shape it has.
    #[must_use]
    pub fn script_block(&self) -> Option<&SfcBlock> {
        self.script_setup.as_ref().or(self.script.as_ref())
    }

    /// Whether any style block is scoped.
    #[must_use]
    pub fn has_scoped_style(&self) -> bool {
        self.styles.iter().any(|s| s.scoped)
    }
}

/// Built-in single-file component parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SfcParser;

impl SfcParser {
    /// Create the parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ModuleParser for SfcParser {
    fn parse(&self, source: &str, id: &str) -> Result<SfcDescriptor, Vec<Diagnostic>> {
        let mut descriptor = SfcDescriptor::default();
        let mut diagnostics = Vec::new();
        let lowered = source.to_ascii_lowercase();
        let bytes = source.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos].is_ascii_whitespace() {
                pos += 1;
                continue;
            }
            if source[pos..].starts_with("<!--") {
                match source[pos..].find("-->") {
                    Some(end) => {
                        pos += end + 3;
                        continue;
                    }
                    None => {
                        diagnostics.push(Diagnostic::error("unterminated comment").at_line(line_of(source, pos)));
                        break;
                    }
                }
            }
            if bytes[pos] != b'<' {
                pos = source[pos..].find('<').map_or(bytes.len(), |p| p + pos);
                continue;
            }

            let line = line_of(source, pos);
            let Some(tag) = scan_tag(source, pos) else {
                diagnostics.push(Diagnostic::error("unterminated opening tag").at_line(line));
                break;
            };
            let name = tag.name.to_ascii_lowercase();

            if tag.closing {
                diagnostics.push(
                    Diagnostic::error(format!("unexpected closing tag </{name}> at top level")).at_line(line),
                );
                pos = tag.end;
                continue;
            }

            let (content, next) = if tag.self_closing {
                (String::new(), tag.end)
            } else {
                let close = if name == "template" {
                    find_template_close(source, &lowered, tag.end)
                } else {
                    find_close(&lowered, tag.end, &name)
                };
                let Some((content_end, after)) = close else {
                    diagnostics.push(
                        Diagnostic::error(format!("<{name}> block is missing </{name}>")).at_line(line),
                    );
                    break;
                };
                (source[tag.end..content_end].to_string(), after)
            };
            pos = next;

            let block = SfcBlock {
                content,
                attributes: tag.attributes,
                line,
            };
            match name.as_str() {
                "template" => {
                    if descriptor.template.is_some() {
                        diagnostics.push(Diagnostic::error("duplicate <template> block").at_line(line));
                    } else {
                        descriptor.template = Some(block);
                    }
                }
                "script" => {
                    let slot = if block.has_attribute("setup") {
                        &mut descriptor.script_setup
                    } else {
                        &mut descriptor.script
                    };
                    if slot.is_some() {
                        diagnostics.push(Diagnostic::error("duplicate <script> block").at_line(line));
                    } else {
                        *slot = Some(block);
                    }
                }
                "style" => {
                    let scoped = block.has_attribute("scoped");
                    descriptor.styles.push(StyleBlock {
                        content: block.content,
                        scoped,
                        line,
                    });
                }
                other => debug!(target: "islet::sfc", "{}: ignoring custom block <{}>", id, other),
            }
        }

        if descriptor.script.is_some() && descriptor.script_setup.is_some() {
            diagnostics.push(Diagnostic::error(
                "a component may have <script> or <script setup>, not both",
            ));
        }

        if diagnostics.is_empty() { Ok(descriptor) } else { Err(diagnostics) }
    }
}

/// Find `</name>` from `from` in lowercased source. Returns the start of the
/// closing tag and the offset after it.
fn find_close(lowered: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{name}");
    let start = lowered[from..].find(&needle)? + from;
    let gt = lowered[start..].find('>')? + start;
    Some((start, gt + 1))
}

/// Find the `</template>` matching an opening `<template>`, skipping nested
/// `<template>` elements and comments.
fn find_template_close(source: &str, lowered: &str, from: usize) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(offset) = lowered[pos..].find('<') {
        let at = pos + offset;
        let rest = &lowered[at..];
        if rest.starts_with("<!--") {
            pos = at + rest.find("-->")? + 3;
            continue;
        }
        let is_template = |prefix: &str| {
            rest.starts_with(prefix)
                && !rest.as_bytes().get(prefix.len()).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
        };
        if is_template("</template") {
            let gt = rest.find('>')? + at;
            depth -= 1;
            if depth == 0 {
                return Some((at, gt + 1));
            }
            pos = gt + 1;
        } else if is_template("<template") {
            let tag = scan_tag(source, at)?;
            if !tag.self_closing {
                depth += 1;
            }
            pos = tag.end;
        } else {
            pos = at + 1;
        }
    }
    None
}
