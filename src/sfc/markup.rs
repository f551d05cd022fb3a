//! Tag and attribute scanning shared by the SFC parser and the template compiler.

/// One attribute of an opening tag. `value` is `None` for bare attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name as written (`class`, `:title`, `@click`, `v-if`)
    pub name: String,
    /// Unquoted value
    pub value: Option<String>,
}

impl Attribute {
    /// Build an attribute.
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }
}

/// A scanned `<name ...>` or `</name>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name as written
    pub name: String,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// `</name>`
    pub closing: bool,
    /// `<name ... />`
    pub self_closing: bool,
    /// Byte offset just past the closing `>`
    pub end: usize,
}

impl Tag {
    /// Value of the first attribute called `name`; `Some("")` for a bare one.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    /// Whether an attribute called `name` is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }
}

const fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

/// Scan the tag starting at `start` (which must be a `<`).
///
/// Returns `None` when the text there is not a tag name or the tag never
/// reaches its closing `>`. Quoted attribute values may contain `>`.
#[must_use]
pub fn scan_tag(src: &str, start: usize) -> Option<Tag> {
    let bytes = src.as_bytes();
    if bytes.get(start) != Some(&b'<') {
        return None;
    }

    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes.get(i).copied().is_some_and(is_name_byte) {
        i += 1;
    }
    let name = src[name_start..i].to_string();

    let attrs_start = i;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => break,
            None => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    let inner = src[attrs_start..i].trim_end();
    let self_closing = inner.ends_with('/');
    let inner = inner.strip_suffix('/').unwrap_or(inner);

    Some(Tag {
        name,
        attributes: parse_attributes(inner),
        closing,
        self_closing,
        end: i + 1,
    })
}

/// Parse the attribute list of an opening tag.
#[must_use]
pub fn parse_attributes(src: &str) -> Vec<Attribute> {
    let bytes = src.as_bytes();
    let mut attributes = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        let name = &src[name_start..i];

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes.get(j) != Some(&b'=') {
            attributes.push(Attribute::new(name, None));
            continue;
        }

        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let value = match bytes.get(j) {
            Some(&q @ (b'"' | b'\'')) => {
                let value_start = j + 1;
                let value_end = src[value_start..].find(q as char).map_or(src.len(), |p| p + value_start);
                i = (value_end + 1).min(src.len());
                &src[value_start..value_end]
            }
            _ => {
                let value_start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                i = j;
                &src[value_start..j]
            }
        };
        attributes.push(Attribute::new(name, Some(value)));
    }

    attributes
}

/// 1-based line number of byte `offset` in `src`.
#[must_use]
pub fn line_of(src: &str, offset: usize) -> usize {
    src.as_bytes()[..offset.min(src.len())].iter().filter(|&&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_tag_with_attributes() {
        let src = r#"<button class="btn" :disabled="count > 3" @click="inc" hidden>"#;
        let tag = scan_tag(src, 0).unwrap();
        assert_eq!(tag.name, "button");
        assert!(!tag.closing);
        assert!(!tag.self_closing);
        assert_eq!(tag.end, src.len());
        assert_eq!(tag.attribute("class"), Some("btn"));
        assert_eq!(tag.attribute(":disabled"), Some("count > 3"));
        assert_eq!(tag.attribute("@click"), Some("inc"));
        assert_eq!(tag.attribute("hidden"), Some(""));
        assert!(tag.attributes[3].value.is_none());
    }

    #[test]
    fn test_scan_self_closing_and_closing_tags() {
        let tag = scan_tag("<SampleCounter :start='1'/>", 0).unwrap();
        assert!(tag.self_closing);
        assert_eq!(tag.attribute(":start"), Some("1"));

        let close = scan_tag("</div >", 0).unwrap();
        assert!(close.closing);
        assert_eq!(close.name, "div");
    }

    #[test]
    fn test_not_a_tag() {
        assert!(scan_tag("< 3", 0).is_none());
        assert!(scan_tag("<div class='x'", 0).is_none());
    }

    #[test]
    fn test_unquoted_values() {
        let attrs = parse_attributes("type=checkbox checked");
        assert_eq!(
            attrs,
            vec![Attribute::new("type", Some("checkbox")), Attribute::new("checked", None)]
        );
    }
}
