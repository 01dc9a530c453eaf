//! Namespace-aware element tree used by the RSS and Atom decoders.
//!
//! Feeds mix their own vocabulary with extension namespaces (`atom:link`,
//! `itunes:summary`, `media:title`) whose local names collide with the core
//! ones, and they carry inline markup inside text elements. Walking a small
//! owned tree lets each dialect pick the children in its own namespace and
//! read mixed content without failing on either.

use std::io::{BufRead, BufReader};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::{Decoder, NsReader};

use crate::feed::charset::CharsetReader;
use crate::feed::parser::FeedError;

/// SEC-003: Deepest element nesting accepted in a feed document.
pub(crate) const MAX_DEPTH: usize = 256;

/// An element with its resolved namespace, attributes and mixed content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    /// Namespace URI the element name resolves to. `None` for unqualified
    /// names and for prefixes the document never declares.
    pub namespace: Option<String>,
    /// Local name, without prefix.
    pub name: String,
    /// Name as written in the document.
    qname: String,
    /// Attributes as written, values unescaped.
    attributes: Vec<(String, String)>,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Element(Element),
}

impl Element {
    /// Value of the attribute written exactly as `qname`.
    pub fn attribute(&self, qname: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == qname)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Whether the element belongs to `namespace`.
    ///
    /// `None` asks for a plain element: no namespace and no prefix, so an
    /// undeclared `atom:link` does not pass for `link`.
    pub fn is_in(&self, namespace: Option<&str>) -> bool {
        match namespace {
            Some(uri) => self.namespace.as_deref() == Some(uri),
            None => self.namespace.is_none() && !self.qname.contains(':'),
        }
    }

    /// Inner content: character data unescaped, nested elements kept as
    /// markup.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => element.write_markup(&mut out),
            }
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.qname);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.nodes.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(&escape(text.as_str())),
                Node::Element(element) => element.write_markup(out),
            }
        }
        out.push_str("</");
        out.push_str(&self.qname);
        out.push('>');
    }
}

/// Transcodes `content` and reads its root element.
pub(crate) fn read_document(content: &[u8]) -> Result<Element, FeedError> {
    let reader = CharsetReader::new(content)?;
    read_root(BufReader::new(reader))
}

fn read_root<R: BufRead>(source: R) -> Result<Element, FeedError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; custom
    // references like &xxe; fail in `unescape()` instead of resolving.
    let mut reader = NsReader::from_reader(source);
    reader.config_mut().expand_empty_elements = true;
    let decoder = reader.decoder();

    let mut open: Vec<Element> = Vec::new();
    let mut buf = Vec::new();

    loop {
        let (namespace, event) = reader.read_resolved_event_into(&mut buf)?;
        let namespace = match namespace {
            ResolveResult::Bound(ns) => Some(utf8(ns.as_ref())?),
            ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
        };

        match event {
            Event::Start(start) => {
                if open.len() >= MAX_DEPTH {
                    return Err(FeedError::Decode(format!(
                        "elements nested deeper than {MAX_DEPTH} levels"
                    )));
                }
                open.push(open_element(&start, namespace, decoder)?);
            }
            Event::End(_) => {
                let Some(element) = open.pop() else {
                    return Err(FeedError::Decode("unbalanced end tag".into()));
                };
                match open.last_mut() {
                    Some(parent) => parent.nodes.push(Node::Element(element)),
                    None => return Ok(element),
                }
            }
            Event::Text(text) => {
                if let Some(parent) = open.last_mut() {
                    parent.nodes.push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = open.last_mut() {
                    parent.nodes.push(Node::Text(utf8(&cdata)?));
                }
            }
            Event::Eof => {
                return Err(FeedError::Decode(match open.first() {
                    Some(root) => format!("document ends inside <{}>", root.qname),
                    None => "document has no root element".into(),
                }))
            }
            // Declarations, comments, processing instructions and DOCTYPE
            _ => {}
        }
        buf.clear();
    }
}

fn open_element(
    start: &BytesStart<'_>,
    namespace: Option<String>,
    decoder: Decoder,
) -> Result<Element, FeedError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.decode_and_unescape_value(decoder)?;
        attributes.push((utf8(attr.key.as_ref())?, value.into_owned()));
    }
    Ok(Element {
        namespace,
        name: utf8(start.local_name().as_ref())?,
        qname: utf8(start.name().as_ref())?,
        attributes,
        nodes: Vec::new(),
    })
}

// The stream is already UTF-8 once it leaves CharsetReader.
fn utf8(bytes: &[u8]) -> Result<String, FeedError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| FeedError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Element {
        read_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_resolves_prefixed_and_default_namespaces() {
        let root = parse(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><atom:link href="x"/><link>y</link></rss>"#,
        );
        let children: Vec<_> = root.elements().collect();
        assert_eq!(children[0].name, "link");
        assert_eq!(
            children[0].namespace.as_deref(),
            Some("http://www.w3.org/2005/Atom")
        );
        assert!(!children[0].is_in(None));
        assert!(children[1].is_in(None));
        assert_eq!(children[0].attribute("href"), Some("x"));
    }

    #[test]
    fn test_undeclared_prefix_is_not_plain() {
        let root = parse("<rss><atom:link/></rss>");
        let link = root.elements().next().unwrap();
        assert_eq!(link.namespace, None);
        assert!(!link.is_in(None));
    }

    #[test]
    fn test_text_keeps_nested_markup() {
        let root = parse(r#"<d>hello <b class="x">a &amp; b</b><br/> &lt;done&gt;</d>"#);
        assert_eq!(root.text(), r#"hello <b class="x">a &amp; b</b><br/> <done>"#);
    }

    #[test]
    fn test_cdata_is_verbatim() {
        let root = parse("<d><![CDATA[<p>x & y</p>]]></d>");
        assert_eq!(root.text(), "<p>x & y</p>");
    }

    #[test]
    fn test_unclosed_document_is_error() {
        assert!(read_document(b"<rss><channel>").is_err());
        assert!(matches!(
            read_document(b"<!-- nothing -->"),
            Err(FeedError::Decode(_))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        assert!(read_document(nested(MAX_DEPTH).as_bytes()).is_ok());
        let err = read_document(nested(MAX_DEPTH + 1).as_bytes()).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }

    #[test]
    fn test_custom_entity_is_not_expanded() {
        let xml = r#"<!DOCTYPE rss [<!ENTITY x "EXPANDED">]><rss><title>&x;</title></rss>"#;
        assert!(read_document(xml.as_bytes()).is_err());
    }
}
