use std::path::Path;

use quick_xml::de::DeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::charset::{decode_xml, CharsetError};

/// Errors that can occur while reading or writing OPML.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// The document could not be decoded as OPML. The decoder's own
    /// diagnostic is only logged.
    #[error("invalid opml content")]
    InvalidContent,

    /// File I/O error.
    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the document failed.
    #[error("Failed to write OPML: {0}")]
    Export(String),
}

// Error carrier for decode_xml; flattened into OpmlError::InvalidContent.
#[derive(Debug, Error)]
enum DecodeFailure {
    #[error(transparent)]
    Charset(#[from] CharsetError),
    #[error(transparent)]
    Xml(#[from] DeError),
}

/// Root node of an OPML document.
///
/// The only required attribute is `version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "opml", default)]
pub struct Opml {
    #[serde(rename = "@version")]
    pub version: String,
    pub head: Head,
    pub body: Body,
}

/// Document metadata. Timestamps are kept as raw strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Head {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date_created: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date_modified: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner_email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub owner_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docs: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expansion_state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vert_scroll_state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub window_top: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub window_bottom: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub window_left: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub window_right: String,
}

/// Parent of all top-level outlines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body {
    #[serde(rename = "outline", default, skip_serializing_if = "Vec::is_empty")]
    pub outlines: Vec<Outline>,
}

/// A node of the outline tree.
///
/// Children are owned, so the structure is always a finite tree whose shape
/// mirrors the document's nesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    #[serde(rename = "@text")]
    pub text: String,
    #[serde(rename = "@type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "@isComment", skip_serializing_if = "String::is_empty")]
    pub is_comment: String,
    #[serde(rename = "@isBreakpoint", skip_serializing_if = "String::is_empty")]
    pub is_breakpoint: String,
    #[serde(rename = "@created", skip_serializing_if = "String::is_empty")]
    pub created: String,
    #[serde(rename = "@category", skip_serializing_if = "String::is_empty")]
    pub category: String,
    /// URL of the RSS/Atom feed this outline subscribes to
    #[serde(rename = "@xmlUrl", skip_serializing_if = "String::is_empty")]
    pub xml_url: String,
    #[serde(rename = "@htmlUrl", skip_serializing_if = "String::is_empty")]
    pub html_url: String,
    #[serde(rename = "@url", skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(rename = "@language", skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(rename = "@title", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(rename = "@version", skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "@description", skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "outline", skip_serializing_if = "Vec::is_empty")]
    pub outlines: Vec<Outline>,
}

impl Outline {
    /// True when the outline subscribes to a feed (has an `xmlUrl`).
    pub fn is_feed(&self) -> bool {
        !self.xml_url.trim().is_empty()
    }

    /// Display title: `title`, falling back to `text`, then to `xmlUrl`.
    pub fn display_title(&self) -> &str {
        [&self.title, &self.text, &self.xml_url]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl Opml {
    /// Feed outlines in document (pre-)order, at any nesting depth.
    ///
    /// Category outlines without `xmlUrl` are traversed but not returned.
    pub fn feeds(&self) -> Vec<&Outline> {
        let mut feeds = Vec::new();
        let mut stack: Vec<&Outline> = self.body.outlines.iter().rev().collect();
        while let Some(outline) = stack.pop() {
            if outline.is_feed() {
                feeds.push(outline);
            }
            stack.extend(outline.outlines.iter().rev());
        }
        feeds
    }

    /// Deepest outline nesting level; 0 for an empty body.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(&Outline, usize)> =
            self.body.outlines.iter().map(|o| (o, 1)).collect();
        while let Some((outline, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(outline.outlines.iter().map(|o| (o, depth + 1)));
        }
        max
    }
}

/// Root selector: decoding fails unless the document element is `<opml>`.
#[derive(Deserialize)]
enum OpmlRoot {
    #[serde(rename = "opml")]
    Opml(Opml),
}

/// Parses OPML bytes into an outline tree.
///
/// No semantic validation is applied; outline `type` values and URLs are
/// returned as written.
///
/// # Errors
///
/// Every decode failure, charset failures included, is reported as
/// [`OpmlError::InvalidContent`].
///
/// # Security
///
/// XXE is not possible: `quick-xml` (0.37) never parses `<!ENTITY>`
/// declarations, so custom entity references fail to decode instead of
/// expanding.
pub fn parse_opml(content: &[u8]) -> Result<Opml, OpmlError> {
    match decode_xml::<OpmlRoot, DecodeFailure>(content) {
        Ok(OpmlRoot::Opml(opml)) => Ok(opml),
        Err(e) => {
            tracing::debug!(error = %e, "OPML decode failed");
            Err(OpmlError::InvalidContent)
        }
    }
}

/// Reads and parses an OPML file from disk.
pub async fn read_opml_file(path: impl AsRef<Path>) -> Result<Opml, OpmlError> {
    let content = tokio::fs::read(path.as_ref()).await?;
    parse_opml(&content)
}

/// Serializes `opml` as an indented UTF-8 OPML document.
///
/// Empty optional attributes and head fields are omitted.
pub fn export_opml(opml: &Opml) -> Result<String, OpmlError> {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let mut serializer = quick_xml::se::Serializer::new(&mut xml);
    serializer.indent(' ', 2);
    opml.serialize(serializer)
        .map_err(|e| OpmlError::Export(e.to_string()))?;
    Ok(xml)
}
