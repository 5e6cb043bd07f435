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

use std::{borrow::Cow, cell::OnceCell, ops::Range};

use crate::{
    decoders::{
        charsets::{decode_charset, fix_charset},
        decode_transfer,
    },
    parsers::{header::parse_headers, MessageStream},
    Body, Container, ContentType, Error, HeaderBlock, MessageParser, MimeHeaders, Params, Part,
    Result, StreamContainer, SynthContainer,
};

impl<'x> Part<'x> {
    pub(crate) fn from_stream(
        raw: &'x [u8],
        range: Range<usize>,
        content_type: ContentType,
        parser: MessageParser,
    ) -> Self {
        Part {
            container: Container::Stream(StreamContainer {
                raw,
                range,
                content_type,
                headers: OnceCell::new(),
                body: OnceCell::new(),
                body_changed: false,
                parser,
            }),
            parts: Vec::new(),
            enclosed: None,
            is_root: false,
            bounce: OnceCell::new(),
        }
    }

    pub(crate) fn synth(headers: MimeHeaders, body: Option<Body>) -> Self {
        Part {
            container: Container::Synth(SynthContainer { headers, body }),
            parts: Vec::new(),
            enclosed: None,
            is_root: true,
            bounce: OnceCell::new(),
        }
    }

    pub(crate) fn set_range(&mut self, range: Range<usize>) {
        if let Container::Stream(stream) = &mut self.container {
            stream.range = range;
        }
    }

    pub(crate) fn range_end(&self) -> usize {
        match &self.container {
            Container::Stream(stream) => stream.range.end,
            Container::Synth(_) => 0,
        }
    }

    /// Returns `true` for parts backed by a scanned input buffer.
    pub fn is_stream(&self) -> bool {
        matches!(self.container, Container::Stream(_))
    }

    /// Returns the original bytes of the part, if it was scanned from input.
    pub fn raw_message(&self) -> Option<&'x [u8]> {
        match &self.container {
            Container::Stream(stream) => Some(&stream.raw[stream.range.clone()]),
            Container::Synth(_) => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Returns the headers of the part, parsing them on first access.
    pub fn headers(&self) -> Result<&MimeHeaders> {
        match &self.container {
            Container::Stream(stream) => stream.header_block().map(|block| &block.headers),
            Container::Synth(synth) => Ok(&synth.headers),
        }
    }

    /// Returns the headers for modification, parsing them first if needed.
    pub fn headers_mut(&mut self) -> Result<&mut MimeHeaders> {
        self.bounce = OnceCell::new();
        match &mut self.container {
            Container::Stream(stream) => {
                stream.header_block()?;
                stream
                    .headers
                    .get_mut()
                    .map(|block| &mut block.headers)
                    .ok_or_else(|| Error::MalformedHeaders("header block unavailable".into()))
            }
            Container::Synth(synth) => Ok(&mut synth.headers),
        }
    }

    /// Returns the content type of the part. Scanned parts report the type
    /// found while scanning until their headers are modified.
    pub fn content_type(&self) -> Cow<'_, ContentType> {
        let headers = match &self.container {
            Container::Stream(stream) => match stream.headers.get() {
                Some(block) if block.headers.have_changed(false) => &block.headers,
                _ => return Cow::Borrowed(&stream.content_type),
            },
            Container::Synth(synth) => &synth.headers,
        };

        Cow::Owned(
            headers
                .get_raw("Content-Type")
                .map(ContentType::parse)
                .unwrap_or_else(ContentType::default_leaf),
        )
    }

    /// Returns the `Content-Disposition` value and parameters.
    pub fn content_disposition(&self) -> Result<(Option<String>, Params)> {
        Ok(self
            .headers()?
            .get_params("Content-Disposition")
            .map(|value| (value.value, value.params))
            .unwrap_or_default())
    }

    /// Returns the lowercased `Content-Transfer-Encoding` and its parameters,
    /// `7bit` by default.
    pub fn content_encoding(&self) -> Result<(String, Params)> {
        Ok(self
            .headers()?
            .get_params("Content-Transfer-Encoding")
            .and_then(|value| Some((value.value?, value.params)))
            .unwrap_or_else(|| ("7bit".to_string(), Params::new())))
    }

    pub fn charset(&self) -> Option<String> {
        self.content_type().charset().map(str::to_string)
    }

    /// Returns `true` for parts that carry a body rather than other parts.
    pub fn is_singlepart(&self) -> bool {
        self.content_type().is_singlepart()
    }

    /// Returns the decoded body of a single part. Multiparts and containers
    /// have no body.
    pub fn body(&self) -> Result<Option<&Body>> {
        if !self.is_singlepart() {
            return Ok(None);
        }

        match &self.container {
            Container::Synth(synth) => Ok(synth.body.as_ref()),
            Container::Stream(stream) => {
                if let Some(body) = stream.body.get() {
                    return Ok(Some(body));
                }
                let body = self.decode_stream_body(stream)?;
                Ok(Some(stream.body.get_or_init(|| body)))
            }
        }
    }

    fn decode_stream_body(&self, stream: &StreamContainer<'x>) -> Result<Body> {
        let block = stream.header_block()?;
        let bytes = &stream.raw[block.body_offset.min(stream.range.end)..stream.range.end];
        let (encoding, _) = self.content_encoding()?;

        let bytes = match decode_transfer(&encoding, bytes) {
            Some(bytes) => bytes,
            None if stream.parser.strict => {
                return Err(Error::Decoding(format!(
                    "invalid {encoding} body at offset {}",
                    block.body_offset
                )));
            }
            None => bytes.to_vec(),
        };

        let content_type = self.content_type();
        if !content_type.is_text() {
            return Ok(Body::Binary(bytes));
        }

        let charset = content_type.charset().unwrap_or("ascii");
        let text = decode_charset(charset, &bytes)?;

        Ok(Body::Text(
            if content_type.sub() == "html" && fix_charset(charset) == "utf-8" {
                text.replace('\u{a0}', "&nbsp;")
            } else {
                text
            },
        ))
    }

    /// Replaces the body of the part.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        let body = body.into();
        self.bounce = OnceCell::new();
        match &mut self.container {
            Container::Stream(stream) => {
                stream.body = OnceCell::from(body);
                stream.body_changed = true;
            }
            Container::Synth(synth) => synth.body = Some(body),
        }
    }

    pub fn parts(&self) -> &[Part<'x>] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Part<'x>] {
        self.bounce = OnceCell::new();
        &mut self.parts
    }

    /// Appends a child part.
    pub fn append(&mut self, mut part: Part<'x>) {
        part.is_root = false;
        self.bounce = OnceCell::new();
        self.parts.push(part);
    }

    /// Sets the part enclosed by a message container.
    pub fn enclose(&mut self, mut part: Part<'x>) {
        part.is_root = false;
        self.bounce = OnceCell::new();
        self.enclosed = Some(Box::new(part));
    }

    pub fn enclosed(&self) -> Option<&Part<'x>> {
        self.enclosed.as_deref()
    }

    pub fn enclosed_mut(&mut self) -> Option<&mut Part<'x>> {
        self.bounce = OnceCell::new();
        self.enclosed.as_deref_mut()
    }

    /// Pre-order traversal: the part itself (optionally), its children and
    /// the parts enclosed by containers (unless `skip_enclosed`).
    pub fn walk(&self, with_self: bool, skip_enclosed: bool) -> Walk<'_, 'x> {
        let mut walk = Walk {
            stack: Vec::new(),
            skip_enclosed,
        };
        if with_self {
            walk.stack.push(self);
        } else {
            walk.push_children(self);
        }
        walk
    }

    /// Returns `true` when the part or any of its descendants was modified.
    /// Bodies set on multiparts or containers are not counted.
    pub fn was_changed(&self) -> bool {
        let changed = match &self.container {
            Container::Synth(_) => return true,
            Container::Stream(stream) => {
                stream
                    .headers
                    .get()
                    .is_some_and(|block| block.headers.have_changed(false))
                    || (stream.body_changed && self.is_singlepart())
            }
        };

        changed
            || self.parts.iter().any(Part::was_changed)
            || self.enclosed.as_ref().is_some_and(|part| part.was_changed())
    }
}

impl<'x> StreamContainer<'x> {
    pub(crate) fn header_block(&self) -> Result<&HeaderBlock> {
        if let Some(block) = self.headers.get() {
            return Ok(block);
        }

        let (headers, body_offset) = parse_headers(
            &mut MessageStream::with_range(self.raw, self.range.clone()),
            self.parser.max_header_line,
            self.parser.strict,
        )?;

        Ok(self.headers.get_or_init(|| HeaderBlock {
            headers,
            body_offset,
        }))
    }
}

pub struct Walk<'a, 'x> {
    stack: Vec<&'a Part<'x>>,
    skip_enclosed: bool,
}

impl<'a, 'x> Walk<'a, 'x> {
    fn push_children(&mut self, part: &'a Part<'x>) {
        if !self.skip_enclosed {
            if let Some(enclosed) = &part.enclosed {
                self.stack.push(enclosed);
            }
        }
        self.stack.extend(part.parts.iter().rev());
    }
}

impl<'a, 'x> Iterator for Walk<'a, 'x> {
    type Item = &'a Part<'x>;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.push_children(part);
        Some(part)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&[u8]> for Body {
    fn from(bytes: &[u8]) -> Self {
        Body::Binary(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(bytes)
    }
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Binary(_) => None,
        }
    }

    /// Returns the body as bytes, UTF-8 encoded for text.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}
