use std::collections::BTreeMap;

use crate::error::XmlError;

/// An attributed element tree node.
///
/// Attribute storage is a `BTreeMap`, so lookup is name-based and encoding
/// order is lexicographic no matter the insertion order — the property the
/// canonical encoder relies on for diff-stable output.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<Content>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Element {
        self.set_attribute(name, value);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(Content::Element(child));
    }

    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Content::Text(text.into()));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(el) => Some(el),
            Content::Text(_) => None,
        })
    }
}

/// Decodes markup into an element tree.
///
/// Well-formedness is enforced: tags must match, attribute names must be
/// unique, entities must be terminated and known. The prolog (declaration,
/// comments, doctype) is skipped; whitespace-only text between elements is
/// dropped and significant text is kept trimmed.
pub fn decode(input: &str) -> Result<Element, XmlError> {
    let mut d = Decoder::new(input);
    d.skip_misc()?;
    let root = d.element()?;
    d.skip_misc()?;
    if !d.at_end() {
        return Err(XmlError::UnexpectedCharacter {
            found: d.peek_char(),
            offset: d.i,
        });
    }
    Ok(root)
}

/// Encodes an element subtree with the given per-level indent width.
///
/// Canonical rules: attributes sorted lexicographically, special characters
/// re-escaped, childless elements collapsed to `<name attr="v" />`,
/// text-only elements rendered inline. No trailing newline.
pub fn encode(element: &Element, indent: usize) -> String {
    let mut out = String::new();
    encode_into(&mut out, element, indent, 0);
    out
}

/// Encodes a root element, prefixed with the XML declaration header.
pub fn encode_document(element: &Element, indent: usize) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    encode_into(&mut out, element, indent, 0);
    out
}

fn encode_into(out: &mut String, element: &Element, indent: usize, depth: usize) {
    let pad = indent * depth;
    push_spaces(out, pad);
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        push_escaped(out, value, true);
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str(" />");
        return;
    }

    let text_only = element
        .children
        .iter()
        .all(|c| matches!(c, Content::Text(_)));
    out.push('>');
    if text_only {
        for child in &element.children {
            if let Content::Text(text) = child {
                push_escaped(out, text, false);
            }
        }
    } else {
        for child in &element.children {
            out.push('\n');
            match child {
                Content::Element(el) => encode_into(out, el, indent, depth + 1),
                Content::Text(text) => {
                    push_spaces(out, indent * (depth + 1));
                    push_escaped(out, text, false);
                }
            }
        }
        out.push('\n');
        push_spaces(out, pad);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn push_spaces(out: &mut String, count: usize) {
    for _ in 0..count {
        out.push(' ');
    }
}

fn push_escaped(out: &mut String, value: &str, in_attribute: bool) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Formats a geometry coordinate for output. Integral values keep one
/// fractional digit (`256.0`), everything else prints the shortest decimal
/// that round-trips; never scientific notation.
pub fn format_coordinate(value: f64) -> String {
    if value.is_finite() && value == value.trunc() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Formats an integral length attribute: no fractional part (`256`).
pub fn format_length(value: i64) -> String {
    value.to_string()
}

struct Decoder<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.i >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn peek_char(&self) -> char {
        self.peek().map(char::from).unwrap_or('\0')
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.i += 1;
        }
    }

    /// Skips whitespace, the XML declaration, processing instructions,
    /// comments and a doctype — everything allowed around the root element.
    fn skip_misc(&mut self) -> Result<(), XmlError> {
        loop {
            self.skip_whitespace();
            if self.starts_with(b"<?") {
                self.skip_until(b"?>")?;
            } else if self.starts_with(b"<!--") {
                self.skip_until(b"-->")?;
            } else if self.starts_with(b"<!") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes[self.i..].starts_with(prefix)
    }

    fn skip_until(&mut self, terminator: &[u8]) -> Result<(), XmlError> {
        while self.i < self.bytes.len() {
            if self.starts_with(terminator) {
                self.i += terminator.len();
                return Ok(());
            }
            self.i += 1;
        }
        Err(XmlError::UnexpectedEof)
    }

    fn skip_doctype(&mut self) -> Result<(), XmlError> {
        // "<!DOCTYPE ... >", possibly with an internal [...] subset.
        let mut brackets = 0usize;
        while let Some(b) = self.peek() {
            self.i += 1;
            match b {
                b'[' => brackets += 1,
                b']' => brackets = brackets.saturating_sub(1),
                b'>' if brackets == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(XmlError::UnexpectedEof)
    }

    fn element(&mut self) -> Result<Element, XmlError> {
        self.expect(b'<')?;
        let name = self.name()?;
        let mut element = Element::new(name);

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(XmlError::UnexpectedEof),
                Some(b'/') => {
                    self.i += 1;
                    self.expect(b'>')?;
                    return Ok(element);
                }
                Some(b'>') => {
                    self.i += 1;
                    self.children(&mut element)?;
                    return Ok(element);
                }
                Some(_) => {
                    let attr_name = self.name()?;
                    self.skip_whitespace();
                    self.expect(b'=')?;
                    self.skip_whitespace();
                    let value = self.attribute_value()?;
                    if element.attributes.insert(attr_name.clone(), value).is_some() {
                        return Err(XmlError::DuplicateAttribute { name: attr_name });
                    }
                }
            }
        }
    }

    fn children(&mut self, parent: &mut Element) -> Result<(), XmlError> {
        loop {
            let text = self.text_run()?;
            if !text.is_empty() {
                parent.children.push(Content::Text(text));
            }
            if self.at_end() {
                return Err(XmlError::UnexpectedEof);
            }
            if self.starts_with(b"<!--") {
                self.skip_until(b"-->")?;
                continue;
            }
            if self.starts_with(b"</") {
                self.i += 2;
                let close = self.name()?;
                if close != parent.name {
                    return Err(XmlError::MismatchedTag {
                        expected: parent.name.clone(),
                        found: close,
                    });
                }
                self.skip_whitespace();
                self.expect(b'>')?;
                return Ok(());
            }
            let child = self.element()?;
            parent.children.push(Content::Element(child));
        }
    }

    /// Collects character data up to the next markup, decoding entities and
    /// trimming surrounding whitespace.
    fn text_run(&mut self) -> Result<String, XmlError> {
        let start = self.i;
        while let Some(b) = self.peek() {
            if b == b'<' {
                break;
            }
            self.i += 1;
        }
        let raw = std::str::from_utf8(&self.bytes[start..self.i]).unwrap_or_default();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        let lead = raw.len() - raw.trim_start().len();
        decode_entities(trimmed, start + lead)
    }

    fn attribute_value(&mut self) -> Result<String, XmlError> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            Some(found) => {
                return Err(XmlError::UnexpectedCharacter {
                    found: found as char,
                    offset: self.i,
                });
            }
            None => return Err(XmlError::UnexpectedEof),
        };
        self.i += 1;
        let start = self.i;
        while let Some(b) = self.peek() {
            if b == quote {
                let raw = std::str::from_utf8(&self.bytes[start..self.i]).unwrap_or_default();
                self.i += 1;
                return decode_entities(raw, start);
            }
            self.i += 1;
        }
        Err(XmlError::UnexpectedEof)
    }

    fn name(&mut self) -> Result<String, XmlError> {
        let start = self.i;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.i += 1,
            Some(found) => {
                return Err(XmlError::UnexpectedCharacter {
                    found: found as char,
                    offset: self.i,
                });
            }
            None => return Err(XmlError::UnexpectedEof),
        }
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':') {
                self.i += 1;
            } else {
                break;
            }
        }
        Ok(std::str::from_utf8(&self.bytes[start..self.i])
            .unwrap_or_default()
            .to_string())
    }

    fn expect(&mut self, byte: u8) -> Result<(), XmlError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.i += 1;
                Ok(())
            }
            Some(found) => Err(XmlError::UnexpectedCharacter {
                found: found as char,
                offset: self.i,
            }),
            None => Err(XmlError::UnexpectedEof),
        }
    }
}

/// Resolves the five named entities plus decimal/hex character references.
fn decode_entities(raw: &str, base_offset: usize) -> Result<String, XmlError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut offset = base_offset;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let entity_offset = offset + amp;
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            return Err(XmlError::MalformedEntity {
                entity: tail.chars().take(8).collect(),
                offset: entity_offset,
            });
        };
        let entity = &tail[1..semi];
        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let decoded = numeric_reference(entity);
                match decoded {
                    Some(c) => out.push(c),
                    None => {
                        return Err(XmlError::MalformedEntity {
                            entity: entity.to_string(),
                            offset: entity_offset,
                        });
                    }
                }
            }
        }
        offset = entity_offset + semi + 1;
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn numeric_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sorted_attributes_and_self_closing_child() {
        let mut element = Element::new("draw");
        element.set_attribute("zlevel", "2");
        element.set_attribute("color", "Red&Back");
        element.append_child(Element::new("circle"));

        assert_eq!(
            encode(&element, 2),
            "<draw color=\"Red&amp;Back\" zlevel=\"2\">\n  <circle />\n</draw>"
        );
    }

    #[test]
    fn document_encoding_prepends_declaration() {
        let element = Element::new("svg").with_attribute("width", "480");
        assert_eq!(
            encode_document(&element, 2),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<svg width=\"480\" />"
        );
    }

    #[test]
    fn attribute_order_is_insertion_independent() {
        let a = Element::new("rect")
            .with_attribute("width", "1")
            .with_attribute("height", "2")
            .with_attribute("x", "3");
        let b = Element::new("rect")
            .with_attribute("x", "3")
            .with_attribute("width", "1")
            .with_attribute("height", "2");
        assert_eq!(encode(&a, 2), encode(&b, 2));
        assert_eq!(encode(&a, 2), "<rect height=\"2\" width=\"1\" x=\"3\" />");
    }

    #[test]
    fn text_children_render_inline() {
        let mut element = Element::new("text");
        element.set_attribute("x", "18.0");
        element.append_text("Small & Large");
        assert_eq!(encode(&element, 2), "<text x=\"18.0\">Small &amp; Large</text>");
    }

    #[test]
    fn decodes_nested_elements_and_attributes() {
        let doc = decode(
            "<?xml version=\"1.0\"?>\n<!-- header -->\n<svg width=\"480\" height='352'>\n  \
             <g id=\"layer\"><rect x=\"1\" y=\"2\"/></g>\n</svg>",
        )
        .unwrap();
        assert_eq!(doc.name, "svg");
        assert_eq!(doc.attribute("width"), Some("480"));
        assert_eq!(doc.attribute("height"), Some("352"));
        let g = doc.child_elements().next().unwrap();
        assert_eq!(g.name, "g");
        assert_eq!(g.child_elements().next().unwrap().name, "rect");
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let doc = decode("<a title=\"x &lt; y &amp; z\">A&#65;&#x41;&apos;</a>").unwrap();
        assert_eq!(doc.attribute("title"), Some("x < y & z"));
        assert_eq!(doc.children, vec![Content::Text("AAA'".to_string())]);
    }

    #[test]
    fn mismatched_tags_report_both_names() {
        let err = decode("<a><b></a></b>").unwrap_err();
        assert_eq!(
            err,
            XmlError::MismatchedTag {
                expected: "b".to_string(),
                found: "a".to_string(),
            }
        );
    }

    #[test]
    fn truncated_document_is_eof() {
        assert_eq!(decode("<a><b/>").unwrap_err(), XmlError::UnexpectedEof);
        assert_eq!(decode("<a attr=\"x").unwrap_err(), XmlError::UnexpectedEof);
    }

    #[test]
    fn unterminated_and_unknown_entities_are_malformed() {
        let err = decode("<a>x &amp y</a>").unwrap_err();
        assert!(matches!(err, XmlError::MalformedEntity { .. }));
        let err = decode("<a>&nosuch;</a>").unwrap_err();
        assert_eq!(
            err,
            XmlError::MalformedEntity {
                entity: "nosuch".to_string(),
                offset: 3,
            }
        );
    }

    #[test]
    fn duplicate_attributes_are_rejected() {
        let err = decode("<a x=\"1\" x=\"2\" />").unwrap_err();
        assert_eq!(
            err,
            XmlError::DuplicateAttribute {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn round_trip_is_structurally_stable() {
        let source = "<svg height=\"352\" width=\"480\">\n\
                      \x20 <defs>\n\
                      \x20   <linearGradient id=\"violet\" x1=\"0.0\" x2=\"1.0\" y1=\"1.0\" y2=\"1.0\" />\n\
                      \x20   <rect height=\"256.0\" id=\"frame\" width=\"256.0\" x=\"112.0\" y=\"48.0\" />\n\
                      \x20 </defs>\n\
                      \x20 <rect fill=\"url(#checkerboard)\" height=\"352.0\" width=\"480.0\" x=\"0.0\" y=\"0.0\" />\n\
                      \x20 <g id=\"Notes\"><text x=\"18.0\" y=\"126.0\">Small</text></g>\n\
                      </svg>";
        let first = decode(source).unwrap();
        let reencoded = encode_document(&first, 2);
        let second = decode(&reencoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn decoder_agrees_with_reference_parser() {
        let source = "<svg width=\"480\" height=\"352\">\n  <g fill=\"#27aae1\">\n    \
                      <path d=\"M0.0,69.755 L2.685,69.755 Z\" />\n    <text x=\"18.0\">Sm&amp;all</text>\n  \
                      </g>\n</svg>";
        let ours = decode(source).unwrap();
        let theirs = roxmltree::Document::parse(source).unwrap();
        assert_tree_matches(&ours, theirs.root_element());
    }

    fn assert_tree_matches(ours: &Element, theirs: roxmltree::Node<'_, '_>) {
        assert_eq!(ours.name, theirs.tag_name().name());
        let mut reference: Vec<(String, String)> = theirs
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();
        reference.sort();
        let mine: Vec<(String, String)> = ours
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        assert_eq!(mine, reference);

        let their_children: Vec<roxmltree::Node<'_, '_>> =
            theirs.children().filter(|n| n.is_element()).collect();
        let my_children: Vec<&Element> = ours.child_elements().collect();
        assert_eq!(my_children.len(), their_children.len());
        for (mine, theirs) in my_children.iter().zip(their_children) {
            assert_tree_matches(mine, theirs);
        }

        let their_text: String = theirs
            .children()
            .filter_map(|n| if n.is_text() { n.text() } else { None })
            .collect::<String>()
            .trim()
            .to_string();
        let my_text: String = ours
            .children
            .iter()
            .filter_map(|c| match c {
                Content::Text(t) => Some(t.as_str()),
                Content::Element(_) => None,
            })
            .collect();
        assert_eq!(my_text, their_text);
    }

    #[test]
    fn coordinate_formatting_policy() {
        assert_eq!(format_coordinate(256.0), "256.0");
        assert_eq!(format_coordinate(0.0), "0.0");
        assert_eq!(format_coordinate(69.755), "69.755");
        assert_eq!(format_coordinate(-1.5), "-1.5");
        assert_eq!(format_coordinate(0.0000001), "0.0000001");
        assert_eq!(format_length(256), "256");
        assert_eq!(format_length(-3), "-3");
    }
}
