//! Typed XML document tree and encoder.
//!
//! RSpecs are built as an [`Element`] tree and serialized by [`encode`]. The
//! in-memory model carries no wire formatting; escaping and layout happen
//! only in the encoder.

/// An XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Qualified name, e.g. `rspec` or `xsi:schemaLocation`-style prefixed names.
    pub name: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Child elements.
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
}

impl Element {
    /// Create an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an attribute (builder style).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Add a child (builder style).
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child in place.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All descendants (not including self), in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.children.iter().rev());
        }
        out
    }

    /// All descendants with the given name, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

/// Serialize a document with an XML declaration.
pub fn encode(root: &Element) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, root, 0);
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(out, value, true);
        out.push('"');
    }

    if element.children.is_empty() && element.text.is_empty() {
        out.push_str("/>\n");
        return;
    }

    out.push('>');
    if element.children.is_empty() {
        escape_into(out, &element.text, false);
    } else {
        out.push('\n');
        if !element.text.is_empty() {
            out.push_str(&"  ".repeat(depth + 1));
            escape_into(out, &element.text, false);
            out.push('\n');
        }
        for child in &element.children {
            write_element(out, child, depth + 1);
        }
        out.push_str(&indent);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
}

/// Check a character against the XML 1.0 `Char` production.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}'
            | '\u{A}'
            | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Escape markup characters. Characters XML cannot carry at all become
/// U+FFFD; whitespace that attribute normalization would fold is written as
/// a character reference.
fn escape_into(out: &mut String, value: &str, attribute: bool) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\'' if attribute => out.push_str("&apos;"),
            '\t' if attribute => out.push_str("&#x9;"),
            '\n' if attribute => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c if !is_xml_char(c) => out.push(char::REPLACEMENT_CHARACTER),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_nested() {
        let doc = Element::new("rspec")
            .attr("type", "manifest")
            .child(Element::new("node").attr("client_id", "a"));

        assert_eq!(
            encode(&doc),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <rspec type=\"manifest\">\n  <node client_id=\"a\"/>\n</rspec>\n"
        );
    }

    #[test]
    fn test_encode_escapes_attributes() {
        let doc = Element::new("node").attr("client_id", "a<b>&\"c\"");
        assert!(encode(&doc).contains("client_id=\"a&lt;b&gt;&amp;&quot;c&quot;\""));
    }

    #[test]
    fn test_encode_keeps_output_well_formed() {
        let doc = Element::new("node")
            .attr("client_id", "a\u{1}b\tc")
            .attr("component_id", "x\u{FFFF}\r\ny");
        let xml = encode(&doc);
        assert!(xml.contains("client_id=\"a\u{FFFD}b&#x9;c\""));
        assert!(xml.contains("component_id=\"x\u{FFFD}&#xD;&#xA;y\""));
        assert!(xml.chars().all(is_xml_char));

        let back = crate::rspec::parser::parse_document(&xml).unwrap();
        assert_eq!(back.attribute("client_id"), Some("a\u{FFFD}b\tc"));
    }

    #[test]
    fn test_encode_text() {
        let mut doc = Element::new("note");
        doc.text = "1 < 2".into();
        assert!(encode(&doc).ends_with("<note>1 &lt; 2</note>\n"));
    }

    #[test]
    fn test_descendants_named() {
        let doc = Element::new("rspec")
            .child(Element::new("node").attr("client_id", "a"))
            .child(
                Element::new("group").child(Element::new("node").attr("client_id", "b")),
            )
            .child(Element::new("link"));

        let ids: Vec<_> = doc
            .descendants_named("node")
            .iter()
            .map(|n| n.attribute("client_id").unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
