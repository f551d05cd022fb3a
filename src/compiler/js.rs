//! Lexical helpers over JavaScript source.
//!
//! None of this is a JavaScript parser. [`mask_non_code`] blanks out string,
//! template-literal, comment and regex contents while keeping byte offsets, so
//! bracket depth and keyword positions can be found with plain scans that are
//! never fooled by text such as `"export default"` inside a string. The other
//! helpers build on that mask.

use serde_json::{Map, Number, Value};
use std::ops::Range;

const REGEX_PRECEDING_BYTES: &[u8] = b"(,=:[!&|?{};+-*%<>~^";
const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "yield", "await",
];

/// Blank out everything that is not code.
///
/// String and template-literal contents, comments and regex literal bodies are
/// replaced with spaces (newlines are kept). Quote delimiters and `${ }`
/// substitutions inside template literals stay visible. The result has exactly
/// the byte length of `src`, so offsets found in it index `src` directly.
#[must_use]
pub fn mask_non_code(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = bytes.to_vec();
    let len = bytes.len();

    let mut i = 0;
    let mut brace_depth = 0usize;
    // Brace depth at which each open `${` substitution started.
    let mut substitutions: Vec<usize> = Vec::new();
    let mut prev: Option<u8> = None;
    let mut prev_word_start = 0usize;

    while i < len {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match b {
            b'/' if next == Some(b'/') => {
                while i < len && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
                continue;
            }
            b'/' if next == Some(b'*') => {
                let end = find_from(bytes, i + 2, b"*/").map_or(len, |p| p + 2);
                blank(&mut out, i, end);
                i = end;
                continue;
            }
            b'\'' | b'"' => {
                i = skip_quoted(bytes, &mut out, i, b);
                prev = Some(b);
                continue;
            }
            b'`' => {
                let (end, opened) = skip_template_text(bytes, &mut out, i + 1);
                i = end;
                if opened {
                    brace_depth += 1;
                    substitutions.push(brace_depth);
                }
                prev = Some(b'`');
                continue;
            }
            b'/' if regex_allowed(prev, &src[prev_word_start..i]) => {
                i = skip_regex(bytes, &mut out, i);
                prev = Some(b'/');
                continue;
            }
            b'{' => brace_depth += 1,
            b'}' => {
                if substitutions.last() == Some(&brace_depth) {
                    substitutions.pop();
                    brace_depth -= 1;
                    let (end, opened) = skip_template_text(bytes, &mut out, i + 1);
                    i = end;
                    if opened {
                        brace_depth += 1;
                        substitutions.push(brace_depth);
                    }
                    prev = Some(b'`');
                    continue;
                }
                brace_depth = brace_depth.saturating_sub(1);
            }
            _ => {}
        }

        if !b.is_ascii_whitespace() {
            if is_ident_byte(b) && (i == 0 || !is_ident_byte(bytes[i - 1])) {
                prev_word_start = i;
            }
            prev = Some(b);
        }
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| src.to_string())
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    for byte in &mut out[start..end] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..].windows(needle.len()).position(|w| w == needle).map(|p| p + from)
}

/// Mask a quoted string starting at `start`; returns the index after it.
fn skip_quoted(bytes: &[u8], out: &mut [u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                blank(out, i, (i + 2).min(bytes.len()));
                i += 2;
            }
            b if b == quote => return i + 1,
            b'\n' => return i,
            _ => {
                out[i] = b' ';
                i += 1;
            }
        }
    }
    bytes.len()
}

/// Mask template-literal text from `start` up to the closing backtick or the
/// next `${`. Returns the index after the stop point and whether a
/// substitution was opened.
fn skip_template_text(bytes: &[u8], out: &mut [u8], start: usize) -> (usize, bool) {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                blank(out, i, (i + 2).min(bytes.len()));
                i += 2;
            }
            b'`' => return (i + 1, false),
            b'$' if bytes.get(i + 1) == Some(&b'{') => return (i + 2, true),
            b'\n' => i += 1,
            _ => {
                out[i] = b' ';
                i += 1;
            }
        }
    }
    (bytes.len(), false)
}

fn skip_regex(bytes: &[u8], out: &mut [u8], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                blank(out, i, (i + 2).min(bytes.len()));
                i += 2;
                continue;
            }
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return i;
            }
            b'\n' => return i,
            _ => {}
        }
        out[i] = b' ';
        i += 1;
    }
    bytes.len()
}

fn regex_allowed(prev: Option<u8>, prev_word: &str) -> bool {
    match prev {
        None => true,
        Some(b) if REGEX_PRECEDING_BYTES.contains(&b) => true,
        Some(b) if is_ident_byte(b) => REGEX_PRECEDING_WORDS.contains(&prev_word.trim()),
        Some(_) => false,
    }
}

const fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Whether `s` is a plain JavaScript identifier.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Index of the bracket closing the one at `open` in masked source.
#[must_use]
pub fn matching_close(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offsets of `word` occurring at bracket depth 0 as a whole word.
#[must_use]
pub fn find_top_level_word(masked: &str, word: &str) -> Vec<usize> {
    let bytes = masked.as_bytes();
    let needle = word.as_bytes();
    let mut hits = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {
                if depth == 0
                    && bytes[i..].starts_with(needle)
                    && (i == 0 || !is_ident_byte(bytes[i - 1]))
                    && !bytes.get(i + needle.len()).copied().is_some_and(is_ident_byte)
                {
                    hits.push(i);
                    i += needle.len();
                    continue;
                }
            }
        }
        i += 1;
    }
    hits
}

/// Split `src` on `sep` at bracket depth 0, ignoring separators inside
/// strings and comments. Pieces are trimmed; empty pieces are dropped.
#[must_use]
pub fn split_top_level(src: &str, sep: u8) -> Vec<&str> {
    let masked = mask_non_code(src);
    let bytes = masked.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ if b == sep && depth == 0 => {
                pieces.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&src[start..]);
    pieces.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Spans of the top-level statements of a script, in order.
///
/// A statement ends at a depth-0 `;` or at a depth-0 line break that cannot
/// continue the statement. Spans are trimmed and exclude the `;`.
#[must_use]
pub fn statements(src: &str) -> Vec<Range<usize>> {
    let masked = mask_non_code(src);
    let bytes = masked.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    let push = |start: usize, end: usize, spans: &mut Vec<Range<usize>>| {
        let text = &masked[start..end];
        if text.trim().is_empty() {
            return;
        }
        let lead = text.len() - text.trim_start().len();
        let trail = text.len() - text.trim_end().len();
        spans.push(start + lead..end - trail);
    };

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b';' if depth == 0 => {
                push(start, i, &mut spans);
                start = i + 1;
            }
            b'\n' if depth == 0 && ends_statement(&masked[start..i], &masked[i + 1..]) => {
                push(start, i, &mut spans);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(start, bytes.len(), &mut spans);
    spans
}

fn ends_statement(before: &str, after: &str) -> bool {
    let Some(last) = before.trim_end().bytes().last() else {
        return false;
    };
    let rest = after.trim_start();
    let Some(next) = rest.bytes().next() else {
        return true;
    };
    if b"=+-*/,([{.?:|&<>!".contains(&last) || b".)]},?:+-*/=|&<>".contains(&next) {
        return false;
    }
    let next_word: String = rest.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    !matches!(next_word.as_str(), "else" | "catch" | "finally")
}

/// Replace the single top-level `export default` with `const <binding> =`.
///
/// # Errors
///
/// Fails when the script has no top-level default export or more than one.
pub fn rewrite_default_export(src: &str, binding: &str) -> Result<String, String> {
    let masked = mask_non_code(src);
    let mut hits = Vec::new();
    for start in find_top_level_word(&masked, "export") {
        let after = &masked[start + "export".len()..];
        let gap = after.len() - after.trim_start().len();
        let rest = &after[gap..];
        let follows_default = rest.starts_with("default")
            && !rest.as_bytes().get("default".len()).copied().is_some_and(is_ident_byte);
        if gap > 0 && follows_default {
            hits.push(start..start + "export".len() + gap + "default".len());
        }
    }

    match hits.as_slice() {
        [] => Err("script has no top-level default export".to_string()),
        [span] => {
            let mut out = String::with_capacity(src.len() + binding.len());
            out.push_str(&src[..span.start]);
            out.push_str("const ");
            out.push_str(binding);
            out.push_str(" =");
            out.push_str(&src[span.end..]);
            Ok(out)
        }
        many => Err(format!("script has {} top-level default exports", many.len())),
    }
}

/// Evaluate a JavaScript literal expression to JSON.
///
/// Accepts object and array literals (unquoted or quoted keys, trailing
/// commas), single- or double-quoted strings, backtick strings without
/// substitutions, numbers, booleans, `null` and `undefined` (as `null`).
/// Returns `None` for anything else, including identifiers and calls.
#[must_use]
pub fn js_literal_to_json(src: &str) -> Option<Value> {
    let mut parser = LiteralParser {
        src: src.as_bytes(),
        text: src,
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_trivia();
    if parser.peek() == Some(b';') {
        parser.pos += 1;
        parser.skip_trivia();
    }
    (parser.pos == parser.src.len()).then_some(value)
}

struct LiteralParser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            if self.src[self.pos..].starts_with(b"//") {
                while self.peek().is_some_and(|b| b != b'\n') {
                    self.pos += 1;
                }
            } else if self.src[self.pos..].starts_with(b"/*") {
                self.pos = find_from(self.src, self.pos + 2, b"*/").map_or(self.src.len(), |p| p + 2);
            } else {
                return;
            }
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_trivia();
        match self.peek()? {
            b'{' => self.object(),
            b'[' => self.array(),
            q @ (b'\'' | b'"' | b'`') => self.string(q).map(Value::String),
            b'-' | b'+' | b'.' | b'0'..=b'9' => self.number(),
            _ => {
                let word = self.word();
                match word {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => None,
                }
            }
        }
    }

    fn word(&mut self) -> &str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn object(&mut self) -> Option<Value> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            match self.peek()? {
                b'}' => {
                    self.pos += 1;
                    return Some(Value::Object(map));
                }
                q @ (b'\'' | b'"') => {
                    let key = self.string(q)?;
                    map.insert(key, self.property_value()?);
                }
                b'0'..=b'9' => {
                    let key = self.number()?.to_string();
                    map.insert(key, self.property_value()?);
                }
                _ => {
                    let key = self.word().to_string();
                    if key.is_empty() {
                        return None;
                    }
                    map.insert(key, self.property_value()?);
                }
            }
            self.skip_trivia();
            match self.peek()? {
                b',' => self.pos += 1,
                b'}' => {}
                _ => return None,
            }
        }
    }

    fn property_value(&mut self) -> Option<Value> {
        self.skip_trivia();
        if self.peek()? != b':' {
            return None;
        }
        self.pos += 1;
        self.value()
    }

    fn array(&mut self) -> Option<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.peek()? == b']' {
                self.pos += 1;
                return Some(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_trivia();
            match self.peek()? {
                b',' => self.pos += 1,
                b']' => {}
                _ => return None,
            }
        }
    }

    fn string(&mut self, quote: u8) -> Option<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            let ch = rest.chars().next()?;
            self.pos += ch.len_utf8();
            match ch {
                c if c as u32 == u32::from(quote) => return Some(out),
                '$' if quote == b'`' && self.peek() == Some(b'{') => return None,
                '\n' if quote != b'`' => return None,
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Option<()> {
        let ch = self.text[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        match ch {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'x' => {
                let hex = self.text.get(self.pos..self.pos + 2)?;
                self.pos += 2;
                out.push(char::from_u32(u32::from_str_radix(hex, 16).ok()?)?);
            }
            'u' => {
                let code = if self.peek() == Some(b'{') {
                    let end = find_from(self.src, self.pos, b"}")?;
                    let hex = &self.text[self.pos + 1..end];
                    self.pos = end + 1;
                    u32::from_str_radix(hex, 16).ok()?
                } else {
                    let hex = self.text.get(self.pos..self.pos + 4)?;
                    self.pos += 4;
                    u32::from_str_radix(hex, 16).ok()?
                };
                out.push(char::from_u32(code)?);
            }
            c => out.push(c),
        }
        Some(())
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_')
            || (matches!(self.peek(), Some(b'-' | b'+'))
                && matches!(self.src.get(self.pos - 1), Some(b'e' | b'E')))
        {
            self.pos += 1;
        }
        let raw: String = self.text[start..self.pos].chars().filter(|&c| c != '_').collect();
        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(&raw)),
        };

        let radix = match digits.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let n = i64::from_str_radix(&digits[2..], radix).ok()?;
            return Some(Value::Number(Number::from(if negative { -n } else { n })));
        }

        if let Ok(n) = digits.parse::<i64>() {
            return Some(Value::Number(Number::from(if negative { -n } else { n })));
        }
        let f: f64 = digits.parse().ok()?;
        Number::from_f64(if negative { -f } else { f }).map(Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mask_hides_strings_and_comments() {
        let src = r#"const a = "export default"; // export default
/* export default */ const b = `x ${y} export default`;"#;
        let masked = mask_non_code(src);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains("export default"));
        assert!(masked.contains("const a"));
        assert!(masked.contains("${y}"));
    }

    #[test]
    fn test_mask_regex_literal() {
        let src = "const re = /[}]export default/g; const n = a / b;";
        let masked = mask_non_code(src);
        assert!(!masked.contains("export"));
        assert!(masked.contains("a / b"));
    }

    #[test]
    fn test_rewrite_default_export_ignores_strings() {
        let src = r#"const label = "export default";
// export default is below
export default {
  data() { return { label } }
}"#;
        let rewritten = rewrite_default_export(src, "__sfc__").unwrap();
        assert!(rewritten.contains(r#"const label = "export default";"#));
        assert!(rewritten.contains("// export default is below"));
        assert!(rewritten.contains("const __sfc__ = {"));
        assert_eq!(rewritten.matches("const __sfc__").count(), 1);
    }

    #[test]
    fn test_rewrite_default_export_requires_exactly_one() {
        assert!(rewrite_default_export("const a = 1;", "__sfc__").is_err());
        let twice = "export default {}\nexport default {}";
        let err = rewrite_default_export(twice, "__sfc__").unwrap_err();
        assert!(err.contains('2'));
    }

    #[test]
    fn test_nested_export_default_is_not_top_level() {
        let src = "function f() { const s = 1; }\nexport default { template: `export default` }";
        let rewritten = rewrite_default_export(src, "__sfc__").unwrap();
        assert!(rewritten.contains("template: `export default`"));
    }

    #[test]
    fn test_statements_split() {
        let src = "import { ref } from 'vue'\nconst count = ref(0)\nconst obj = {\n  a: 1,\n  b: 2\n};\nfunction inc() {\n  count.value++\n}\nconst total = 1 +\n  2";
        let spans: Vec<&str> = statements(src).into_iter().map(|r| &src[r]).collect();
        assert_eq!(spans.len(), 5);
        assert_eq!(spans[0], "import { ref } from 'vue'");
        assert_eq!(spans[1], "const count = ref(0)");
        assert!(spans[2].starts_with("const obj = {"));
        assert!(spans[3].starts_with("function inc()"));
        assert_eq!(spans[4], "const total = 1 +\n  2");
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("a: 1, b: [1, 2], c: 'x,y'", b',');
        assert_eq!(parts, vec!["a: 1", "b: [1, 2]", "c: 'x,y'"]);
    }

    #[test]
    fn test_js_literals() {
        assert_eq!(
            js_literal_to_json("{ name: 'Ada', tags: ['a', \"b\",], nested: { n: -1.5 }, }"),
            Some(json!({"name": "Ada", "tags": ["a", "b"], "nested": {"n": -1.5}}))
        );
        assert_eq!(js_literal_to_json("0x1F"), Some(json!(31)));
        assert_eq!(js_literal_to_json("1_000"), Some(json!(1000)));
        assert_eq!(js_literal_to_json("undefined"), Some(Value::Null));
        assert_eq!(js_literal_to_json("`plain`"), Some(json!("plain")));
        assert_eq!(js_literal_to_json("'it\\'s'"), Some(json!("it's")));
        assert_eq!(js_literal_to_json("[1, 2];"), Some(json!([1, 2])));
    }

    #[test]
    fn test_non_literals_are_rejected() {
        assert_eq!(js_literal_to_json("count + 1"), None);
        assert_eq!(js_literal_to_json("{ a }"), None);
        assert_eq!(js_literal_to_json("`hi ${name}`"), None);
        assert_eq!(js_literal_to_json("fetch()"), None);
    }

    #[test]
    fn test_matching_close() {
        let src = "f({ a: [1, (2)] }) + 1";
        let masked = mask_non_code(src);
        assert_eq!(matching_close(&masked, 1), Some(17));
        assert_eq!(matching_close(&masked, 2), Some(16));
    }
}
