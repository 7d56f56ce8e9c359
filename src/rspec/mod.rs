//! RSpec documents.
//!
//! The serialization boundary between the lifecycle handler and the XML
//! resource descriptions exchanged with callers:
//!
//! - [`document`] - Element tree and encoder
//! - [`parser`] - Strict reader for request documents
//!
//! Builders here produce [`Element`] trees for advertisements and manifests;
//! [`parse_request`] extracts the requested nodes from a request document.

pub mod document;
pub mod parser;

pub use document::{encode, Element};
pub use parser::parse_document;

use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use thiserror::Error;

/// RSpec v3 namespace.
pub const RSPEC_NAMESPACE: &str = "http://www.geni.net/resources/rspec/3";

/// XML Schema instance namespace.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Advertisement schema location.
pub const AD_SCHEMA: &str = "http://www.geni.net/resources/rspec/3/ad.xsd";

/// Manifest schema location.
pub const MANIFEST_SCHEMA: &str = "http://www.geni.net/resources/rspec/3/manifest.xsd";

/// RSpec document errors.
#[derive(Debug, Error)]
pub enum RspecError {
    /// The input is not a well-formed document.
    #[error("malformed document at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    /// Well-formed, but not an RSpec.
    #[error("not an rspec: root element is <{root}>")]
    UnexpectedRoot { root: String },

    /// Compression of an outgoing document failed.
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// A node requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedNode {
    /// Caller-chosen name for the node; empty when absent.
    pub client_id: String,
}

/// Parsed request document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestRspec {
    /// Requested nodes in document order.
    pub nodes: Vec<RequestedNode>,
}

impl RequestRspec {
    /// Number of resources requested.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no resources were requested.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Parse a request document.
///
/// Every `node` element counts as one requested resource, wherever it sits.
/// Component bindings in the request are ignored; only `client_id` is kept.
pub fn parse_request(input: &str) -> Result<RequestRspec, RspecError> {
    let root = parse_document(input)?;
    if local_name(&root.name) != "rspec" {
        return Err(RspecError::UnexpectedRoot { root: root.name });
    }

    let nodes = root
        .descendants()
        .into_iter()
        .filter(|e| local_name(&e.name) == "node")
        .map(|e| RequestedNode {
            client_id: e.attribute("client_id").unwrap_or_default().to_string(),
        })
        .collect();
    Ok(RequestRspec { nodes })
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// One resource in an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedNode {
    /// Resource URN.
    pub component_id: String,
    /// Short resource name.
    pub component_name: String,
    /// Whether the resource can be allocated now.
    pub available: bool,
}

/// One bound resource in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestNode {
    /// Name the caller gave the node in its request.
    pub client_id: String,
    /// Resource URN.
    pub component_id: String,
    /// Sliver URN.
    pub sliver_id: String,
}

fn rspec_root(kind: &str, schema: &str) -> Element {
    Element::new("rspec")
        .attr("xmlns", RSPEC_NAMESPACE)
        .attr("xmlns:xsi", XSI_NAMESPACE)
        .attr(
            "xsi:schemaLocation",
            format!("{} {}", RSPEC_NAMESPACE, schema),
        )
        .attr("type", kind)
}

/// Build an advertisement of the given resources.
pub fn advertisement(component_manager_id: &str, nodes: &[AdvertisedNode]) -> Element {
    let mut root = rspec_root("advertisement", AD_SCHEMA);
    for node in nodes {
        root.push(
            Element::new("node")
                .attr("component_manager_id", component_manager_id)
                .attr("component_name", &node.component_name)
                .attr("component_id", &node.component_id)
                .attr("exclusive", "false")
                .child(Element::new("available").attr("now", node.available.to_string())),
        );
    }
    root
}

/// Build a manifest of a slice's bound resources.
pub fn manifest(component_manager_id: &str, nodes: &[ManifestNode]) -> Element {
    let mut root = rspec_root("manifest", MANIFEST_SCHEMA);
    for node in nodes {
        root.push(
            Element::new("node")
                .attr("client_id", &node.client_id)
                .attr("component_id", &node.component_id)
                .attr("component_manager_id", component_manager_id)
                .attr("sliver_id", &node.sliver_id),
        );
    }
    root
}

/// zlib-compress a document and base64 encode the result.
pub fn compress(document: &str) -> Result<String, RspecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(document.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    const AM: &str = "urn:publicid:IDN+geni:gpo:gcf+authority+am";

    #[test]
    fn test_parse_request_counts_nodes() {
        let req = parse_request(
            r#"<rspec xmlns="http://www.geni.net/resources/rspec/3" type="request">
                 <node client_id="a" component_id="urn:ignored"/>
                 <node/>
               </rspec>"#,
        )
        .unwrap();
        assert_eq!(req.len(), 2);
        assert_eq!(req.nodes[0].client_id, "a");
        assert_eq!(req.nodes[1].client_id, "");
    }

    #[test]
    fn test_parse_request_prefixed_names() {
        let req = parse_request(
            r#"<r:rspec xmlns:r="http://www.geni.net/resources/rspec/3"><r:node client_id="x"/></r:rspec>"#,
        )
        .unwrap();
        assert_eq!(req.len(), 1);
    }

    #[test]
    fn test_parse_request_empty() {
        let req = parse_request("<rspec type=\"request\"/>").unwrap();
        assert!(req.is_empty());
    }

    #[test]
    fn test_parse_request_rejects() {
        assert!(matches!(
            parse_request("<html/>"),
            Err(RspecError::UnexpectedRoot { .. })
        ));
        assert!(matches!(
            parse_request("<rspec><node></rspec>"),
            Err(RspecError::Malformed { .. })
        ));
    }

    #[test]
    fn test_advertisement_layout() {
        let doc = advertisement(
            AM,
            &[AdvertisedNode {
                component_id: "urn:publicid:IDN+geni:gpo:gcf+fakevm+1".into(),
                component_name: "1".into(),
                available: true,
            }],
        );
        assert_eq!(doc.attribute("type"), Some("advertisement"));
        assert!(doc
            .attribute("xsi:schemaLocation")
            .unwrap()
            .ends_with("ad.xsd"));

        let node = &doc.children[0];
        assert_eq!(node.attribute("component_manager_id"), Some(AM));
        assert_eq!(node.attribute("exclusive"), Some("false"));
        assert_eq!(node.children[0].attribute("now"), Some("true"));

        // Encoded output parses back
        let reparsed = parse_document(&encode(&doc)).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_manifest_layout() {
        let doc = manifest(
            AM,
            &[ManifestNode {
                client_id: "vm0".into(),
                component_id: "urn:c".into(),
                sliver_id: "urn:s".into(),
            }],
        );
        assert_eq!(doc.attribute("type"), Some("manifest"));
        let node = &doc.children[0];
        assert_eq!(node.attribute("client_id"), Some("vm0"));
        assert_eq!(node.attribute("sliver_id"), Some("urn:s"));
    }

    #[test]
    fn test_compress() {
        let encoded = compress("<rspec/>").unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let mut out = String::new();
        ZlibDecoder::new(&raw[..]).read_to_string(&mut out).unwrap();
        assert_eq!(out, "<rspec/>");
    }
}
