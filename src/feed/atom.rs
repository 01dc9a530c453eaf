//! Atom 1.0 decoding and the Atom→RSS2 normalizer.

use crate::feed::model::{AtomDocument, AtomEntry, Author, Item, Link, Rss2};
use crate::feed::parser::FeedError;
use crate::feed::xml::{read_document, Element};

/// Namespace an Atom root element must resolve to.
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Decodes `content` as an Atom 1.0 document.
///
/// The root must be a `<feed>` element in [`ATOM_NAMESPACE`], whether bound
/// as the default namespace or through a prefix. Children from other
/// namespaces are ignored; when an element repeats, the last one wins.
///
/// # Errors
///
/// Fails when the charset cannot be decoded, the XML is malformed, or the
/// root is not an Atom `<feed>`.
pub fn decode_atom(content: &[u8]) -> Result<AtomDocument, FeedError> {
    let root = read_document(content)?;
    if root.name != "feed" {
        return Err(FeedError::Decode(format!(
            "expected <feed> root element, found <{}>",
            root.name
        )));
    }
    if !root.is_in(Some(ATOM_NAMESPACE)) {
        return Err(FeedError::Decode(format!(
            "<feed> is not in the Atom namespace (namespace={:?})",
            root.namespace.as_deref().unwrap_or_default()
        )));
    }

    let mut doc = AtomDocument::default();
    for child in atom_children(&root) {
        match child.name.as_str() {
            "title" => doc.title = child.text(),
            "subtitle" => doc.subtitle = child.text(),
            "id" => doc.id = child.text(),
            "updated" => doc.updated = child.text(),
            "rights" => doc.rights = child.text(),
            "link" => doc.link = decode_link(child),
            "author" => doc.author = decode_author(child),
            "entry" => doc.entries.push(decode_entry(child)),
            _ => {}
        }
    }
    Ok(doc)
}

fn atom_children(element: &Element) -> impl Iterator<Item = &Element> {
    element
        .elements()
        .filter(|child| child.is_in(Some(ATOM_NAMESPACE)))
}

fn decode_entry(element: &Element) -> AtomEntry {
    let mut entry = AtomEntry::default();
    for child in atom_children(element) {
        match child.name.as_str() {
            "title" => entry.title = child.text(),
            "summary" => entry.summary = child.text(),
            "content" => entry.content = child.text(),
            "id" => entry.id = child.text(),
            "updated" => entry.updated = child.text(),
            "link" => entry.link = decode_link(child),
            "author" => entry.author = decode_author(child),
            _ => {}
        }
    }
    entry
}

fn decode_link(element: &Element) -> Link {
    Link {
        href: element.attribute("href").unwrap_or_default().to_owned(),
    }
}

fn decode_author(element: &Element) -> Author {
    let mut author = Author::default();
    for child in atom_children(element) {
        match child.name.as_str() {
            "name" => author.name = child.text(),
            "email" => author.email = child.text(),
            _ => {}
        }
    }
    author
}

/// Maps an Atom document onto the canonical RSS2 shape.
///
/// Total: absent fields map to empty strings. Entry bodies prefer
/// `content` and fall back to `summary`. Atom entries never populate
/// `guid`, `comments`, `pub_date` or `content`, and `version` stays empty.
pub fn atom_to_rss2(doc: AtomDocument) -> Rss2 {
    Rss2 {
        version: String::new(),
        title: doc.title,
        link: doc.link.href,
        description: doc.subtitle,
        pub_date: doc.updated,
        items: doc.entries.into_iter().map(entry_to_item).collect(),
    }
}

fn entry_to_item(entry: AtomEntry) -> Item {
    let description = if entry.content.is_empty() {
        entry.summary
    } else {
        entry.content
    };
    Item {
        title: entry.title,
        link: entry.link.href,
        description,
        ..Item::default()
    }
}
