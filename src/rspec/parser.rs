//! Request document parser.
//!
//! A small, strict XML reader producing an [`Element`] tree. It understands
//! what request RSpecs use: a prolog with declaration, comments, processing
//! instructions and doctype; elements with quoted attributes; character data,
//! CDATA sections and the predefined and numeric entity references.
//! Namespaces are not resolved; names are kept as written.

use super::document::{is_xml_char, Element};
use super::RspecError;

/// Maximum element nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse a complete document and return its root element.
pub fn parse_document(input: &str) -> Result<Element, RspecError> {
    let mut parser = XmlParser::new(input);
    parser.skip_misc()?;
    if !parser.rest().starts_with('<') {
        return Err(parser.error("expected root element"));
    }
    let root = parser.parse_element(0)?;
    parser.skip_misc()?;
    if !parser.rest().is_empty() {
        return Err(parser.error("content after root element"));
    }
    Ok(root)
}

struct XmlParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> XmlParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> RspecError {
        RspecError::Malformed {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, c: char) -> Result<(), RspecError> {
        match self.bump() {
            Some(found) if found == c => Ok(()),
            Some(found) => Err(self.error(format!("expected '{}', found '{}'", c, found))),
            None => Err(self.error(format!("expected '{}', found end of input", c))),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Advance past the next occurrence of `terminator`.
    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<&'a str, RspecError> {
        match self.rest().find(terminator) {
            Some(offset) => {
                let skipped = &self.rest()[..offset];
                self.pos += offset + terminator.len();
                Ok(skipped)
            }
            None => Err(self.error(format!("unterminated {}", what))),
        }
    }

    fn skip_doctype(&mut self) -> Result<(), RspecError> {
        let mut brackets = 0usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => brackets += 1,
                ']' => brackets = brackets.saturating_sub(1),
                '>' if brackets == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.error("unterminated doctype"))
    }

    /// Skip whitespace, comments, processing instructions and doctype.
    fn skip_misc(&mut self) -> Result<(), RspecError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<!") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> Result<&'a str, RspecError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {
                self.bump();
            }
            _ => return Err(self.error("expected a name")),
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
        {
            self.bump();
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_element(&mut self, depth: usize) -> Result<Element, RspecError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(self.error("maximum nesting depth exceeded"));
        }
        self.expect('<')?;
        let mut element = Element::new(self.read_name()?);

        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            let name = self.read_name()?;
            self.skip_whitespace();
            self.expect('=')?;
            self.skip_whitespace();
            let quote = match self.bump() {
                Some(q @ ('"' | '\'')) => q,
                _ => return Err(self.error("expected quoted attribute value")),
            };
            let raw = match self.rest().find(quote) {
                Some(offset) => {
                    let raw = &self.rest()[..offset];
                    self.pos += offset + 1;
                    raw
                }
                None => return Err(self.error("unterminated attribute value")),
            };
            if raw.contains('<') {
                return Err(self.error("'<' in attribute value"));
            }
            if element.attribute(name).is_some() {
                return Err(self.error(format!("duplicate attribute {}", name)));
            }
            let value = decode_entities(raw).map_err(|m| self.error(m))?;
            element.attributes.push((name.to_string(), value));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unclosed element <{}>", element.name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.read_name()?;
                if closing != element.name {
                    return Err(self.error(format!(
                        "mismatched closing tag </{}> for <{}>",
                        closing, element.name
                    )));
                }
                self.skip_whitespace();
                self.expect('>')?;
                return Ok(element);
            } else if rest.starts_with("<!--") {
                self.pos += 4;
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += 9;
                let data = self.skip_past("]]>", "CDATA section")?;
                check_chars(data).map_err(|m| self.error(m))?;
                element.text.push_str(data);
            } else if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with('<') {
                let child = self.parse_element(depth + 1)?;
                element.push(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let raw = &rest[..end];
                self.pos += end;
                let text = decode_entities(raw).map_err(|m| self.error(m))?;
                if !text.trim().is_empty() {
                    element.text.push_str(&text);
                }
            }
        }
    }
}

fn check_chars(raw: &str) -> Result<(), String> {
    match raw.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(format!("character U+{:04X} is not allowed in XML", c as u32)),
        None => Ok(()),
    }
}

/// Resolve the body of a `&#...;` reference.
fn char_reference(entity: &str) -> Result<char, String> {
    let (digits, radix) = match entity.strip_prefix("#x") {
        Some(hex) => (hex, 16),
        None => (entity.strip_prefix('#').unwrap_or(entity), 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(format!("malformed character reference &{};", entity));
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .filter(|c| is_xml_char(*c))
        .ok_or_else(|| format!("character reference &{}; is not an XML character", entity))
}

/// Expand entity and character references, rejecting characters outside
/// the XML `Char` production whether literal or referenced.
fn decode_entities(raw: &str) -> Result<String, String> {
    check_chars(raw)?;
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];
        let expanded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ if entity.starts_with('#') => char_reference(entity)?,
            _ => return Err(format!("unknown entity &{};", entity)),
        };
        out.push(expanded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- two unbound nodes -->
<rspec xmlns="http://www.geni.net/resources/rspec/3" type="request">
  <node client_id="alpha" exclusive="false">
    <sliver_type name="default-vm"/>
  </node>
  <node client_id='beta'/>
</rspec>
"#;

    #[test]
    fn test_parse_request() {
        let root = parse_document(REQUEST).unwrap();
        assert_eq!(root.name, "rspec");
        assert_eq!(root.attribute("type"), Some("request"));

        let nodes = root.descendants_named("node");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].attribute("client_id"), Some("alpha"));
        assert_eq!(nodes[0].children[0].name, "sliver_type");
        assert_eq!(nodes[1].attribute("client_id"), Some("beta"));
    }

    #[test]
    fn test_entities_and_cdata() {
        let root = parse_document(
            "<a v=\"x &amp; y &#65;&#x42;\"><![CDATA[<raw>]]> &lt;t&gt;</a>",
        )
        .unwrap();
        assert_eq!(root.attribute("v"), Some("x & y AB"));
        assert_eq!(root.text, "<raw> <t>");
    }

    #[test]
    fn test_non_xml_characters_rejected() {
        for bad in [
            "<node client_id=\"a&#1;b\"/>",
            "<node client_id=\"&#0;\"/>",
            "<node client_id=\"&#x1F;\"/>",
            "<node client_id=\"&#xFFFE;\"/>",
            "<node client_id=\"&#xD800;\"/>",
            "<node client_id=\"&#x110000;\"/>",
            "<node client_id=\"&#x+41;\"/>",
            "<node client_id=\"&#;\"/>",
            "<node>&#27;[31m</node>",
            "<node client_id=\"a\u{1}b\"/>",
            "<node><![CDATA[\u{8}]]></node>",
        ] {
            assert!(parse_document(bad).is_err(), "accepted: {:?}", bad);
        }

        let root = parse_document("<node v=\"&#9;&#xA;&#xD7FF;&#x10000;\"/>").unwrap();
        assert_eq!(root.attribute("v"), Some("\t\n\u{D7FF}\u{10000}"));
    }

    #[test]
    fn test_doctype_skipped() {
        let root = parse_document("<!DOCTYPE rspec [<!ENTITY x \"y\">]><rspec/>").unwrap();
        assert_eq!(root.name, "rspec");
    }

    #[test]
    fn test_malformed_inputs() {
        for bad in [
            "",
            "not xml at all",
            "<rspec>",
            "<rspec></rspex>",
            "<rspec a=b/>",
            "<rspec a=\"1\" a=\"2\"/>",
            "<rspec/><extra/>",
            "<rspec>&bogus;</rspec>",
            "<rspec a=\"<\"/>",
            "<!-- never closed",
        ] {
            assert!(parse_document(bad).is_err(), "accepted: {:?}", bad);
        }
    }

    #[test]
    fn test_error_reports_position() {
        match parse_document("<a></b>") {
            Err(RspecError::Malformed { position, message }) => {
                assert!(position > 0);
                assert!(message.contains("mismatched"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "<a>".repeat(MAX_NESTING_DEPTH + 1) + &"</a>".repeat(MAX_NESTING_DEPTH + 1);
        assert!(parse_document(&deep).is_err());
    }
}
