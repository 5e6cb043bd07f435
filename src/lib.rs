/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! # mime-scanner
//!
//! _mime-scanner_ turns a raw RFC 5322 / MIME message into a tree of [`Part`]s
//! without copying or decoding anything up front. The scanner makes a single
//! pass over the input recording byte offsets only; headers and bodies are
//! parsed the first time they are read and cached afterwards.
//!
//! Untouched messages serialize back byte for byte. Mutated parts are
//! re-encoded (transfer encoding and charset are chosen automatically) while
//! their untouched siblings are still copied verbatim from the input.
//!
//! - Boundary-aware tokenizer that filters false `Content-Type` and boundary
//!   lines found inside bodies.
//! - RFC 2047 encoded words, RFC 2231 parameter continuations and RFC 1342
//!   style quoted encoded words.
//! - Charset decoding through `encoding_rs` with UTF-7/UTF-16 support and a
//!   detection fallback for mislabeled content.
//! - Quoted-printable, base64 and encoded-word encoders for serialization.
//! - Bounce detection, subject cleanup and JWZ message threading.
//!
//! ## Usage Example
//!
//! ```
//!    use mime_scanner::*;
//!
//!    let input = concat!(
//!        "From: =?utf-8?B?0JbQtdC60LA=?= <ev@host.com>\r\n",
//!        "Subject: Re: lunch\r\n",
//!        "Content-Type: multipart/mixed; boundary=bd1\r\n",
//!        "\r\n",
//!        "--bd1\r\n",
//!        "Content-Type: text/plain\r\n",
//!        "\r\n",
//!        "Sasha\r\n",
//!        "--bd1--\r\n"
//!    );
//!
//!    let mut message = from_bytes(input.as_bytes()).unwrap();
//!
//!    assert_eq!(
//!        message.headers().unwrap().get_text("from").unwrap(),
//!        "Жека <ev@host.com>"
//!    );
//!    assert_eq!(message.clean_subject().unwrap().unwrap(), "lunch");
//!    assert_eq!(message.to_bytes().unwrap(), input.as_bytes());
//!
//!    message.parts_mut()[0].set_body("Hey!\n");
//!    assert!(message.was_changed());
//! ```

pub mod core;
pub mod decoders;
pub mod encoders;
pub mod error;
pub mod parsers;

use std::{cell::OnceCell, ops::Range};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use crate::core::{
    create::{attachment, binary, message_container, multipart, text},
    threading::{build_thread, ContainerId, ThreadContainer, ThreadTree, Threadable},
};
pub use error::{Error, Result};

/// Scanner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageParser {
    pub(crate) max_header_line: usize,
    pub(crate) max_steps: usize,
    pub(crate) strict: bool,
}

/// Serializer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub(crate) max_line_length: usize,
    pub(crate) long_line_threshold: usize,
    pub(crate) max_header_length: usize,
}

/// A header field name kept in canonical `Title-Case` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct HeaderName(pub(crate) String);

/// Ordered multimap of raw (still encoded) header values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MimeHeaders {
    pub(crate) entries: Vec<(HeaderName, String)>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) changed: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) num_prepends: usize,
}

/// A decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderValue {
    Unstructured(String),
    Parameterized(Parameterized),
    AddressList(Vec<Address>),
}

/// A value followed by `; name=value` parameters, such as `Content-Disposition`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameterized {
    pub value: Option<String>,
    pub params: Params,
}

/// Parameter list with case-insensitive names, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Params(pub(crate) Vec<(String, String)>);

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentType {
    pub(crate) main: String,
    pub(crate) sub: String,
    pub(crate) params: Params,
}

/// A mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

/// A decoded body: Unicode for `text/*` parts, raw bytes for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

/// Delivery report signals gathered from a message tree.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounce {
    pub score: f64,
    pub status: Option<String>,
    pub notification: Option<String>,
    pub diagnostic_code: Option<String>,
}

/// A node of the MIME tree.
///
/// Parts produced by [`from_bytes`] borrow the input buffer and parse their
/// headers and body lazily. Parts produced by the constructors ([`text`],
/// [`multipart`], ...) own their contents. Both kinds expose the same API and
/// can be mixed freely in one tree.
#[derive(Debug, Clone)]
pub struct Part<'x> {
    pub(crate) container: Container<'x>,
    pub(crate) parts: Vec<Part<'x>>,
    pub(crate) enclosed: Option<Box<Part<'x>>>,
    pub(crate) is_root: bool,
    pub(crate) bounce: OnceCell<Bounce>,
}

#[derive(Debug, Clone)]
pub(crate) enum Container<'x> {
    Stream(StreamContainer<'x>),
    Synth(SynthContainer),
}

#[derive(Debug, Clone)]
pub(crate) struct StreamContainer<'x> {
    pub(crate) raw: &'x [u8],
    pub(crate) range: Range<usize>,
    pub(crate) content_type: ContentType,
    pub(crate) headers: OnceCell<HeaderBlock>,
    pub(crate) body: OnceCell<Body>,
    pub(crate) body_changed: bool,
    pub(crate) parser: MessageParser,
}

#[derive(Debug, Clone)]
pub(crate) struct HeaderBlock {
    pub(crate) headers: MimeHeaders,
    pub(crate) body_offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct SynthContainer {
    pub(crate) headers: MimeHeaders,
    pub(crate) body: Option<Body>,
}

/// Scans `bytes` in strict mode.
pub fn from_bytes(bytes: &[u8]) -> Result<Part<'_>> {
    MessageParser::new().parse(bytes)
}

/// Scans `bytes` tolerating broken multipart structure and header limits.
pub fn recover_from_bytes(bytes: &[u8]) -> Result<Part<'_>> {
    MessageParser::new().lenient().parse(bytes)
}
