//! Charset normalization for XML documents.
//!
//! [`CharsetReader`] sniffs the `encoding` label from the XML declaration,
//! resolves it through a [`CharsetResolver`] hook and transcodes the rest of
//! the stream to UTF-8 as the XML deserializer pulls bytes from it. There is
//! no intermediate copy of the whole document.
//!
//! Malformed input is an error. The decoder never substitutes U+FFFD.

use std::io::{self, BufReader, Read};

use encoding_rs::{DecoderResult, Encoding, GB18030, UTF_8};
use quick_xml::de::DeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Number of leading bytes inspected for an XML declaration.
const PROLOG_PEEK: usize = 1024;
/// Raw bytes pulled from the underlying reader per refill.
const CHUNK_SIZE: usize = 8 * 1024;
/// Smallest output buffer handed to the decoder.
const MIN_OUTPUT: usize = 16;

/// Labels routed to GB18030, the superset of the GB family.
///
/// Publishers frequently declare `GBK` or `GB2312` while emitting characters
/// outside those tables.
const GB_FAMILY: &[&str] = &[
    "gbk",
    "gb2312",
    "gb_2312",
    "gb_2312-80",
    "gb18030",
    "cp936",
    "ms936",
    "windows-936",
    "x-gbk",
    "csgb2312",
    "chinese",
];

/// Errors raised while resolving or transcoding a document's charset.
#[derive(Debug, Error)]
pub enum CharsetError {
    /// The declared label does not name an encoding we can decode.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The bytes are not valid in the resolved encoding.
    #[error("malformed {encoding} byte sequence")]
    Malformed { encoding: &'static str },

    /// Reading the underlying stream failed.
    #[error("failed to read document: {0}")]
    Io(#[from] io::Error),
}

/// Hook mapping a declared encoding label to a decoder.
pub type CharsetResolver = fn(&str) -> Result<&'static Encoding, CharsetError>;

/// Default [`CharsetResolver`].
///
/// GB-family labels resolve to GB18030; every other label goes through the
/// WHATWG label registry. Matching is case-insensitive.
pub fn resolve_charset(label: &str) -> Result<&'static Encoding, CharsetError> {
    let label = label.trim();
    if GB_FAMILY.iter().any(|gb| gb.eq_ignore_ascii_case(label)) {
        return Ok(GB18030);
    }
    Encoding::for_label(label.as_bytes())
        .ok_or_else(|| CharsetError::UnsupportedEncoding(label.to_owned()))
}

/// Extracts the `encoding` pseudo-attribute from an XML declaration.
///
/// Returns `None` when the document has no declaration or the declaration
/// carries no encoding. A leading UTF-8 byte-order mark is skipped.
pub fn declared_encoding(prolog: &[u8]) -> Option<String> {
    let prolog = prolog.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(prolog);
    let mut reader = Reader::from_reader(prolog);
    loop {
        match reader.read_event() {
            Ok(Event::Decl(decl)) => {
                let label = decl.encoding()?.ok()?;
                return std::str::from_utf8(&label).ok().map(str::to_owned);
            }
            // Whitespace before the declaration
            Ok(Event::Text(text)) if text.iter().all(u8::is_ascii_whitespace) => {}
            _ => return None,
        }
    }
}

/// A [`Read`] adapter yielding the UTF-8 transcoding of an XML byte stream.
///
/// A byte-order mark takes precedence over the declared label. Documents
/// without a declaration are treated as UTF-8 and still validated.
pub struct CharsetReader<R> {
    inner: R,
    decoder: encoding_rs::Decoder,
    /// Raw bytes not yet consumed by the decoder
    pending: Vec<u8>,
    /// UTF-8 output not yet handed to the caller
    decoded: Vec<u8>,
    pos: usize,
    input_done: bool,
    finished: bool,
}

impl<R: Read> CharsetReader<R> {
    /// Wraps `inner`, resolving its declared charset with [`resolve_charset`].
    pub fn new(inner: R) -> Result<Self, CharsetError> {
        Self::with_resolver(inner, resolve_charset)
    }

    /// Wraps `inner`, resolving its declared charset with `resolver`.
    ///
    /// The resolver is only consulted when the document declares an
    /// encoding.
    pub fn with_resolver(mut inner: R, resolver: CharsetResolver) -> Result<Self, CharsetError> {
        let mut pending = Vec::with_capacity(PROLOG_PEEK);
        inner
            .by_ref()
            .take(PROLOG_PEEK as u64)
            .read_to_end(&mut pending)?;
        let input_done = pending.len() < PROLOG_PEEK;

        let encoding = match declared_encoding(&pending) {
            Some(label) => resolver(&label)?,
            None => UTF_8,
        };
        tracing::trace!(encoding = encoding.name(), "Resolved document charset");

        Ok(Self {
            inner,
            decoder: encoding.new_decoder(),
            pending,
            decoded: Vec::new(),
            pos: 0,
            input_done,
            finished: false,
        })
    }

    /// Encoding currently used for decoding.
    ///
    /// May differ from the declared one once a byte-order mark has been seen.
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    fn fill(&mut self) -> io::Result<()> {
        if !self.input_done {
            let start = self.pending.len();
            self.pending.resize(start + CHUNK_SIZE, 0);
            let read = self.inner.read(&mut self.pending[start..]);
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.pending.truncate(start);
                    return Err(e);
                }
            };
            self.pending.truncate(start + n);
            self.input_done = n == 0;
        }

        let capacity = self
            .decoder
            .max_utf8_buffer_length_without_replacement(self.pending.len())
            .unwrap_or(CHUNK_SIZE * 4)
            .max(MIN_OUTPUT);
        self.decoded.clear();
        self.decoded.resize(capacity, 0);
        self.pos = 0;

        let (result, read, written) = self.decoder.decode_to_utf8_without_replacement(
            &self.pending,
            &mut self.decoded,
            self.input_done,
        );
        self.pending.drain(..read);
        self.decoded.truncate(written);

        match result {
            DecoderResult::InputEmpty => self.finished = self.input_done,
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(..) => {
                self.finished = true;
                self.decoded.clear();
                let err = CharsetError::Malformed {
                    encoding: self.decoder.encoding().name(),
                };
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for CharsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.decoded.len() {
                let n = buf.len().min(self.decoded.len() - self.pos);
                buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}

/// Deserializes `content` into `T`, transcoding it on the fly.
///
/// The charset hook runs inside the same stream the deserializer reads, so
/// there is a single decode pass.
pub(crate) fn decode_xml<T, E>(content: &[u8]) -> Result<T, E>
where
    T: DeserializeOwned,
    E: From<CharsetError> + From<DeError>,
{
    let reader = CharsetReader::new(content)?;
    Ok(quick_xml::de::from_reader(BufReader::new(reader))?)
}
