//! Scoped style rewriting.
//!
//! Every selector of a `<style scoped>` block gets the component's scope
//! attribute on its last compound selector, before any pseudo-class or
//! pseudo-element: `.card p:hover` becomes `.card p[data-v-1a2b3c4d]:hover`.
//! `:deep(x)` moves the attribute in front of the deep part. Rules inside
//! `@media`, `@supports`, `@container` and `@layer` are scoped; other at-rules
//! such as `@keyframes` and `@font-face` are copied untouched.

const NESTING_AT_RULES: &[&str] = &["media", "supports", "container", "layer", "document"];

/// Add `[attribute]` to every selector in `css`.
#[must_use]
pub fn scope_css(css: &str, attribute: &str) -> String {
    let marker = format!("[{attribute}]");
    let mut out = String::with_capacity(css.len() + css.len() / 4);
    scope_block(css, &marker, &mut out);
    out
}

fn scope_block(css: &str, marker: &str, out: &mut String) {
    let bytes = css.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &css[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            break;
        }

        if trimmed.starts_with("/*") {
            let end = trimmed.find("*/").map_or(trimmed.len(), |p| p + 2);
            out.push_str(&trimmed[..end]);
            out.push('\n');
            pos += end;
            continue;
        }

        let Some(brace) = find_outside_strings(trimmed, b'{') else {
            out.push_str(trimmed);
            break;
        };
        if let Some(semi) = find_outside_strings(trimmed, b';').filter(|&s| s < brace) {
            // Statement at-rule such as `@import` or `@charset`.
            out.push_str(&trimmed[..=semi]);
            out.push('\n');
            pos += semi + 1;
            continue;
        }

        let prelude = trimmed[..brace].trim();
        let Some(close) = matching_brace(trimmed, brace) else {
            out.push_str(trimmed);
            break;
        };
        let body = &trimmed[brace + 1..close];

        if let Some(at_rule) = prelude.strip_prefix('@') {
            let name: String = at_rule
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            out.push_str(prelude);
            out.push_str(" {\n");
            if NESTING_AT_RULES.contains(&name.as_str()) {
                scope_block(body, marker, out);
            } else {
                out.push_str(body.trim());
                out.push('\n');
            }
            out.push_str("}\n");
        } else {
            let selectors: Vec<String> = split_selectors(prelude)
                .into_iter()
                .map(|selector| scope_selector(selector, marker))
                .collect();
            out.push_str(&selectors.join(", "));
            out.push_str(" {");
            out.push_str(body);
            out.push_str("}\n");
        }
        pos += close + 1;
    }
}

fn find_outside_strings(css: &str, target: u8) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in css.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == target => return Some(i),
            None => {}
        }
    }
    None
}

fn matching_brace(css: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for (i, b) in css.bytes().enumerate().skip(open) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Split a selector list on commas outside parentheses and brackets.
fn split_selectors(prelude: &str) -> Vec<&str> {
    let mut selectors = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, b) in prelude.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                selectors.push(prelude[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    selectors.push(prelude[start..].trim());
    selectors.into_iter().filter(|s| !s.is_empty()).collect()
}

fn scope_selector(selector: &str, marker: &str) -> String {
    if let Some(deep) = selector.find(":deep(") {
        let inner_start = deep + ":deep(".len();
        let inner_end = selector[inner_start..].rfind(')').map_or(selector.len(), |p| p + inner_start);
        let inner = selector[inner_start..inner_end].trim();
        let prefix = selector[..deep].trim_end();
        let scoped_prefix = if prefix.is_empty() { marker.to_string() } else { scope_selector(prefix, marker) };
        return format!("{scoped_prefix} {inner}");
    }

    let compound_start = last_compound_start(selector);
    let compound = &selector[compound_start..];
    let insert_at = pseudo_start(compound).map_or(selector.len(), |p| compound_start + p);
    format!("{}{marker}{}", &selector[..insert_at], &selector[insert_at..])
}

/// Byte offset where the last compound selector begins.
fn last_compound_start(selector: &str) -> usize {
    let mut depth = 0usize;
    let mut start = 0;
    for (i, b) in selector.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b' ' | b'>' | b'+' | b'~' | b'\t' | b'\n' if depth == 0 => start = i + 1,
            _ => {}
        }
    }
    start
}

/// Offset of the first `:` outside brackets within a compound selector.
fn pseudo_start(compound: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in compound.bytes().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTR: &str = "data-v-1a2b3c4d";

    #[test]
    fn test_simple_selectors() {
        let css = scope_css(".card { color: red; }\nh1, .title > span { margin: 0 }", ATTR);
        assert_eq!(
            css,
            ".card[data-v-1a2b3c4d] { color: red; }\nh1[data-v-1a2b3c4d], .title > span[data-v-1a2b3c4d] { margin: 0 }\n"
        );
    }

    #[test]
    fn test_pseudo_classes_and_elements() {
        assert_eq!(scope_selector("a:hover", "[x]"), "a[x]:hover");
        assert_eq!(scope_selector(".btn::before", "[x]"), ".btn[x]::before");
        assert_eq!(scope_selector("li:not(.a, .b)", "[x]"), "li[x]:not(.a, .b)");
        assert_eq!(scope_selector("input[type=\"a b\"]", "[x]"), "input[type=\"a b\"][x]");
    }

    #[test]
    fn test_deep_selector() {
        assert_eq!(scope_selector(".wrap :deep(.inner p)", "[x]"), ".wrap[x] .inner p");
        assert_eq!(scope_selector(":deep(.inner)", "[x]"), "[x] .inner");
    }

    #[test]
    fn test_media_is_scoped_and_keyframes_are_not() {
        let css = scope_css(
            "@media (max-width: 600px) { .card { padding: 0 } }\n@keyframes spin { from { transform: rotate(0) } to { transform: rotate(360deg) } }",
            ATTR,
        );
        assert!(css.contains("@media (max-width: 600px) {\n.card[data-v-1a2b3c4d] { padding: 0 }\n}"));
        assert!(css.contains("from { transform: rotate(0) }"));
        assert!(!css.contains("from[data-v"));
    }

    #[test]
    fn test_statement_at_rules_and_comments() {
        let css = scope_css("@import url('x.css');\n/* note */\np { color: blue }", ATTR);
        assert_eq!(css, "@import url('x.css');\n/* note */\np[data-v-1a2b3c4d] { color: blue }\n");
    }
}
