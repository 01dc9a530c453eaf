//! Feed ingestion: charset normalization, dialect detection and fetching.
//!
//! This module turns RSS 2.0, Atom 1.0 and OPML documents into one
//! canonical in-memory shape:
//!
//! - **Charset**: Declared legacy encodings (GBK and friends) are transcoded
//!   to UTF-8 while the XML is being decoded
//! - **Parsing**: RSS 2.0 first, Atom 1.0 as fallback, both mapped onto [`Rss2`]
//! - **OPML**: Subscription lists decoded into an owned outline tree
//! - **Spider**: A single HTTP fetch of one feed URL, delivered once
//!
//! # Architecture
//!
//! - [`charset`] - Streaming transcoder and the charset resolution hook
//! - [`parser`] - Dialect cascade and the RSS 2.0 version gate
//! - [`atom`] - Atom decoding and the Atom→RSS2 normalizer
//! - [`opml`] - OPML parsing, traversal and export
//! - [`spider`] - One-shot HTTP fetch producing a [`FetchResult`]
//! - `xml` - Namespace-aware element tree shared by the RSS and Atom decoders
//!
//! # Example
//!
//! ```ignore
//! use pull::feed::{parse_feed, Spider};
//!
//! let feed = parse_feed(&bytes)?;
//!
//! let result = Spider::new(url, 30).run().await?;
//! ```

pub mod atom;
pub mod charset;
mod model;
pub mod opml;
pub mod parser;
pub mod spider;
mod xml;

pub use atom::{atom_to_rss2, decode_atom};
pub use charset::{resolve_charset, CharsetError, CharsetReader, CharsetResolver};
pub use model::{AtomDocument, AtomEntry, Author, Item, Link, Rss2};
pub use opml::{export_opml, parse_opml, read_opml_file, Body, Head, Opml, OpmlError, Outline};
pub use parser::{parse_feed, Decoded, Dialect, FeedError};
pub use spider::{FetchError, FetchResult, Spider};
