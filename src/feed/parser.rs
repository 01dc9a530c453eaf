use thiserror::Error;

use crate::feed::atom::{atom_to_rss2, decode_atom};
use crate::feed::charset::CharsetError;
use crate::feed::model::{AtomDocument, Item, Rss2};
use crate::feed::xml::{read_document, Element};

/// The only RSS version accepted without complaint.
pub const RSS_VERSION: &str = "2.0";

/// Errors produced while turning feed bytes into an [`Rss2`].
#[derive(Debug, Error)]
pub enum FeedError {
    /// The declared charset is unknown or the stream could not be read.
    #[error(transparent)]
    Charset(#[from] CharsetError),

    /// The bytes are not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Well-formed XML that does not have the attempted dialect's shape.
    #[error("feed decode error: {0}")]
    Decode(String),

    /// The document is RSS but not version 2.0.
    ///
    /// The decoded feed is still attached and usable, see
    /// [`FeedError::partial_feed`].
    #[error("invalid feed content")]
    InvalidContent(Box<Rss2>),
}

impl FeedError {
    /// The feed decoded alongside an [`FeedError::InvalidContent`] error.
    pub fn partial_feed(&self) -> Option<&Rss2> {
        match self {
            FeedError::InvalidContent(feed) => Some(feed),
            _ => None,
        }
    }

    /// Consumes the error, returning the feed decoded alongside it, if any.
    pub fn into_partial_feed(self) -> Option<Rss2> {
        match self {
            FeedError::InvalidContent(feed) => Some(*feed),
            _ => None,
        }
    }
}

/// Syndication dialects, in the order [`parse_feed`] tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Rss2,
    Atom1,
}

/// Successful structural decode of one [`Dialect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Rss2(Rss2),
    Atom1(AtomDocument),
}

impl Dialect {
    /// Detection order: the first dialect that decodes wins.
    pub const ORDER: [Dialect; 2] = [Dialect::Rss2, Dialect::Atom1];

    /// Decodes `content` as this dialect without any post-processing.
    pub fn decode(self, content: &[u8]) -> Result<Decoded, FeedError> {
        match self {
            Dialect::Rss2 => decode_rss2(content).map(Decoded::Rss2),
            Dialect::Atom1 => decode_atom(content).map(Decoded::Atom1),
        }
    }
}

// RSS 2.0 has no namespace of its own: only plain children map onto fields,
// so `atom:link`, `itunes:summary` and friends never shadow them. Repeated
// elements overwrite earlier ones.
fn decode_rss2(content: &[u8]) -> Result<Rss2, FeedError> {
    let root = read_document(content)?;
    if root.name != "rss" || !root.is_in(None) {
        return Err(FeedError::Decode(format!(
            "expected <rss> root element, found <{}>",
            root.name
        )));
    }

    let mut feed = Rss2 {
        version: root.attribute("version").unwrap_or_default().to_owned(),
        ..Rss2::default()
    };
    let channels = root.elements().filter(|e| e.is_in(None) && e.name == "channel");
    for child in channels.flat_map(Element::elements) {
        if !child.is_in(None) {
            continue;
        }
        match child.name.as_str() {
            "title" => feed.title = child.text(),
            "link" => feed.link = child.text(),
            "description" => feed.description = child.text(),
            "pubDate" => feed.pub_date = child.text(),
            "item" => feed.items.push(decode_item(child)),
            _ => {}
        }
    }
    Ok(feed)
}

fn decode_item(element: &Element) -> Item {
    let mut item = Item::default();
    for child in element.elements() {
        match child.name.as_str() {
            // Full text is matched by local name: publishers use the
            // content module under several prefixes, declared or not.
            "encoded" => item.content = child.text(),
            _ if !child.is_in(None) => {}
            "title" => item.title = child.text(),
            "link" => item.link = child.text(),
            "guid" => item.guid = child.text(),
            "description" => item.description = child.text(),
            "pubDate" => item.pub_date = child.text(),
            "comments" => item.comments = child.text(),
            _ => {}
        }
    }
    item
}

/// Parses RSS 2.0 or Atom 1.0 bytes into the canonical [`Rss2`] shape.
///
/// Dialects are tried in [`Dialect::ORDER`]. Structural failures only drive
/// the fallback; when every dialect fails, the last failure is returned.
///
/// - Atom documents are normalized with [`atom_to_rss2`] and always
///   succeed once decoded.
/// - RSS documents with `version="2.0"` have each item's full-text
///   `content` copied over `description`.
/// - RSS documents with any other version are returned inside
///   [`FeedError::InvalidContent`], unmodified.
///
/// # Examples
///
/// ```
/// let xml = br#"<rss version="2.0"><channel><item><title>A</title><encoded>FULL</encoded><description>short</description></item></channel></rss>"#;
/// let feed = pull::feed::parse_feed(xml).unwrap();
/// assert_eq!(feed.items[0].description, "FULL");
/// ```
pub fn parse_feed(content: &[u8]) -> Result<Rss2, FeedError> {
    let mut last_error = None;

    for dialect in Dialect::ORDER {
        match dialect.decode(content) {
            Ok(Decoded::Rss2(feed)) => return check_rss2(feed),
            Ok(Decoded::Atom1(doc)) => return Ok(atom_to_rss2(doc)),
            Err(e) => {
                tracing::debug!(dialect = ?dialect, error = %e, "Feed did not decode as dialect");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| FeedError::Decode("no feed dialect attempted".into())))
}

fn check_rss2(mut feed: Rss2) -> Result<Rss2, FeedError> {
    if feed.version != RSS_VERSION {
        return Err(FeedError::InvalidContent(Box::new(feed)));
    }
    for item in &mut feed.items {
        if !item.content.is_empty() {
            item.description.clone_from(&item.content);
        }
    }
    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS2: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example Channel</title>
    <link>http://example.com/</link>
    <atom:link href="http://example.com/rss" rel="self" type="application/rss+xml"/>
    <description>My example channel</description>
    <pubDate>Mon, 06 Sep 2010 00:01:00 +0000</pubDate>
    <item>
      <title>First</title>
      <link>http://example.com/1</link>
      <guid isPermaLink="false">id-1</guid>
      <description>first summary</description>
      <pubDate>Sun, 06 Sep 2009 16:20:00 +0000</pubDate>
      <comments>http://example.com/1#comments</comments>
    </item>
    <item>
      <title>Second</title>
      <description>second summary</description>
      <content:encoded><![CDATA[<p>second full</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Title</title>
  <link href="http://example.org/"/>
  <entry><title>E</title><summary>S</summary></entry>
</feed>"#;

    #[test]
    fn test_rss2_channel_fields() {
        let feed = parse_feed(RSS2.as_bytes()).unwrap();
        assert_eq!(feed.version, "2.0");
        assert_eq!(feed.title, "Example Channel");
        assert_eq!(feed.link, "http://example.com/");
        assert_eq!(feed.description, "My example channel");
        assert_eq!(feed.pub_date, "Mon, 06 Sep 2010 00:01:00 +0000");
        assert_eq!(feed.items.len(), 2);
    }

    #[test]
    fn test_rss2_item_fields() {
        let feed = parse_feed(RSS2.as_bytes()).unwrap();
        let first = &feed.items[0];
        assert_eq!(first.title, "First");
        assert_eq!(first.link, "http://example.com/1");
        assert_eq!(first.guid, "id-1");
        assert_eq!(first.description, "first summary");
        assert_eq!(first.content, "");
        assert_eq!(first.pub_date, "Sun, 06 Sep 2009 16:20:00 +0000");
        assert_eq!(first.comments, "http://example.com/1#comments");
    }

    #[test]
    fn test_full_text_replaces_description() {
        let feed = parse_feed(RSS2.as_bytes()).unwrap();
        assert_eq!(feed.items[1].content, "<p>second full</p>");
        assert_eq!(feed.items[1].description, "<p>second full</p>");
    }

    #[test]
    fn test_dialects_decode_in_isolation() {
        assert!(matches!(
            Dialect::Rss2.decode(RSS2.as_bytes()),
            Ok(Decoded::Rss2(_))
        ));
        assert!(Dialect::Rss2.decode(ATOM.as_bytes()).is_err());
        assert!(matches!(
            Dialect::Atom1.decode(ATOM.as_bytes()),
            Ok(Decoded::Atom1(_))
        ));
        assert!(Dialect::Atom1.decode(RSS2.as_bytes()).is_err());
    }

    #[test]
    fn test_raw_rss2_decode_keeps_summary() {
        let Ok(Decoded::Rss2(feed)) = Dialect::Rss2.decode(RSS2.as_bytes()) else {
            panic!("expected RSS2 decode");
        };
        assert_eq!(feed.items[1].description, "second summary");
    }

    #[test]
    fn test_atom_fallback_has_no_version() {
        let feed = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(feed.version, "");
        assert_eq!(feed.title, "Atom Title");
        assert_eq!(feed.link, "http://example.org/");
        assert_eq!(feed.items[0].description, "S");
    }

    #[test]
    fn test_wrong_version_returns_partial_feed() {
        let xml = r#"<rss version="0.91"><channel><title>Old</title>
            <item><title>A</title><description>d</description><encoded>full</encoded></item>
        </channel></rss>"#;
        let err = parse_feed(xml.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "invalid feed content");

        let partial = err.partial_feed().expect("partial feed attached");
        assert_eq!(partial.version, "0.91");
        assert_eq!(partial.title, "Old");
        // Full-text preference only applies to valid 2.0 feeds
        assert_eq!(partial.items[0].description, "d");

        let owned = err.into_partial_feed().unwrap();
        assert_eq!(owned.items.len(), 1);
    }

    #[test]
    fn test_missing_version_is_invalid_content() {
        let xml = "<rss><channel><title>T</title></channel></rss>";
        let err = parse_feed(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, FeedError::InvalidContent(_)));
    }

    #[test]
    fn test_unrecognized_root_surfaces_atom_failure() {
        let xml = r#"<html><body>not a feed</body></html>"#;
        let err = parse_feed(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
        assert!(err.partial_feed().is_none());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
        assert!(parse_feed(b"").is_err());
    }

    #[test]
    fn test_unknown_charset_is_charset_error() {
        let xml = r#"<?xml version="1.0" encoding="x-unknown-charset"?><rss version="2.0"/>"#;
        let err = parse_feed(xml.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeedError::Charset(CharsetError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_atom_self_link_does_not_shadow_channel_link() {
        for xml in [
            r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
                <link>http://e/</link><atom:link href="http://e/feed" rel="self"/>
            </channel></rss>"#,
            r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
                <atom:link href="http://e/feed" rel="self"/><link>http://e/</link>
            </channel></rss>"#,
        ] {
            let Ok(Decoded::Rss2(feed)) = Dialect::Rss2.decode(xml.as_bytes()) else {
                panic!("RSS decode failed for {xml}");
            };
            assert_eq!(feed.link, "http://e/");
        }
    }

    #[test]
    fn test_extension_elements_do_not_collide_with_item_fields() {
        let xml = r#"<rss version="2.0"
            xmlns:media="http://search.yahoo.com/mrss/"
            xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
            xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <itunes:summary>show summary</itunes:summary>
            <item>
              <title>A</title>
              <media:title>B</media:title>
              <itunes:title>C</itunes:title>
              <description>plain</description>
              <itunes:summary>podcast summary</itunes:summary>
              <atom:link href="http://e/a" rel="replies"/>
              <link>http://e/a</link>
            </item>
        </channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        let item = &feed.items[0];
        assert_eq!(item.title, "A");
        assert_eq!(item.description, "plain");
        assert_eq!(item.link, "http://e/a");
    }

    #[test]
    fn test_repeated_item_field_last_wins() {
        let xml = r#"<rss version="2.0"><channel><item>
            <link>http://e/x</link><link>http://e/y</link>
        </item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].link, "http://e/y");
    }

    #[test]
    fn test_inline_markup_in_description_is_kept() {
        let xml = r#"<rss version="2.0"><channel><title>T</title><item>
            <description>hello <b>world</b></description>
        </item></channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.items[0].description, "hello <b>world</b>");
    }

    #[test]
    fn test_prefixed_encoded_without_declaration() {
        let xml = br#"<rss version="2.0"><channel><item><description>short</description><content:encoded>FULL</content:encoded></item></channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.items[0].content, "FULL");
        assert_eq!(feed.items[0].description, "FULL");
    }

    #[test]
    fn test_non_contiguous_items_preserve_order() {
        let xml = r#"<rss version="2.0"><channel>
            <item><title>1</title></item>
            <title>Channel</title>
            <item><title>2</title></item>
            <item><title>3</title></item>
        </channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        let titles: Vec<_> = feed.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["1", "2", "3"]);
        assert_eq!(feed.title, "Channel");
    }
}
