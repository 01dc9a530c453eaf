use serde::Serialize;

/// Canonical feed shape produced for every supported dialect.
///
/// Modeled on an RSS 2.0 `<channel>`. Atom documents are mapped onto it by
/// [`atom_to_rss2`](crate::feed::atom_to_rss2); in that case `version` is
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rss2 {
    /// Value of the `version` attribute on `<rss>` (`"2.0"` for valid feeds)
    pub version: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text, not parsed into a timestamp
    pub pub_date: String,
    /// Entries in source document order
    pub items: Vec<Item>,
}

/// A single feed entry in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub guid: String,
    /// HTML body, trusted as markup supplied by the feed publisher.
    ///
    /// After a successful parse this holds the full-text `content` whenever
    /// the source provided one.
    pub description: String,
    /// Full-text HTML from `<content:encoded>`
    pub content: String,
    pub pub_date: String,
    /// URL of the entry's comment page
    pub comments: String,
}

/// Intermediate result of decoding an Atom 1.0 document.
///
/// Only lives for the duration of a parse; see [`Rss2`] for the shape
/// callers receive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomDocument {
    pub title: String,
    pub subtitle: String,
    pub id: String,
    pub updated: String,
    pub rights: String,
    /// The document's link. `rel` is not distinguished.
    pub link: Link,
    pub author: Author,
    pub entries: Vec<AtomEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomEntry {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub id: String,
    pub updated: String,
    pub link: Link,
    pub author: Author,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}
