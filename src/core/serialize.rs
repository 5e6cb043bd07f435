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

use std::io::Write;

use crate::{
    decoders::charsets::{encode_text, fix_charset},
    encoders::{
        has_long_lines, header::encode_header, normalize_crlf, TransferEncoding,
    },
    Body, Container, EncoderConfig, Error, HeaderName, MimeHeaders, Part, Result,
};

/// Destination of serialized bytes. Sinks that can be rolled back return
/// `true` from `can_rewind`.
pub(crate) trait Sink {
    fn write(&mut self, bytes: &[u8]);
    fn position(&self) -> usize;
    fn rewind(&mut self, position: usize);

    fn can_rewind(&self) -> bool {
        true
    }
}

impl Sink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn position(&self) -> usize {
        self.len()
    }

    fn rewind(&mut self, position: usize) {
        self.truncate(position);
    }
}

/// Counts bytes without storing them.
#[derive(Debug, Default)]
pub(crate) struct ByteCounter(usize);

impl Sink for ByteCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }

    fn position(&self) -> usize {
        self.0
    }

    fn rewind(&mut self, position: usize) {
        self.0 = position;
    }
}

/// Forwards bytes to a writer, keeping the first I/O error.
struct WriteSink<'w, W: Write> {
    writer: &'w mut W,
    written: usize,
    error: Option<std::io::Error>,
}

impl<W: Write> Sink for WriteSink<'_, W> {
    fn write(&mut self, bytes: &[u8]) {
        if self.error.is_none() {
            match self.writer.write_all(bytes) {
                Ok(()) => self.written += bytes.len(),
                Err(err) => self.error = Some(err),
            }
        }
    }

    fn position(&self) -> usize {
        self.written
    }

    fn rewind(&mut self, position: usize) {
        debug_assert_eq!(position, self.written, "written bytes cannot be rolled back");
    }

    fn can_rewind(&self) -> bool {
        false
    }
}

impl Part<'_> {
    /// Returns the serialized length of the part.
    pub fn size(&self) -> Result<usize> {
        match self.raw_message() {
            Some(raw) if !self.was_changed() => Ok(raw.len()),
            _ => self.size_with(&EncoderConfig::default()),
        }
    }

    /// Returns the serialized length of the part, counted through a dry run.
    pub fn size_with(&self, config: &EncoderConfig) -> Result<usize> {
        let mut counter = ByteCounter::default();
        self.write_part(&mut counter, config)?;
        Ok(counter.0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&EncoderConfig::default())
    }

    pub fn to_bytes_with(&self, config: &EncoderConfig) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.raw_message().map_or(1024, |raw| raw.len()));
        self.write_part(&mut buf, config)?;
        Ok(buf)
    }

    pub fn to_stream(&self, writer: &mut impl Write) -> Result<()> {
        self.to_stream_with(writer, &EncoderConfig::default())
    }

    /// Serializes the part into `writer` without buffering the whole output.
    pub fn to_stream_with(&self, writer: &mut impl Write, config: &EncoderConfig) -> Result<()> {
        let mut sink = WriteSink {
            writer,
            written: 0,
            error: None,
        };
        self.write_part(&mut sink, config)?;
        match sink.error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Serializes the part, replacing invalid UTF-8 sequences.
    #[allow(clippy::inherent_to_string)]
    pub fn to_string(&self) -> Result<String> {
        self.to_bytes()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write_part(&self, sink: &mut impl Sink, config: &EncoderConfig) -> Result<()> {
        if let Some(raw) = self.raw_message() {
            if !self.was_changed() {
                sink.write(raw);
                return Ok(());
            } else if let Some(prepended) = self.prepends_only() {
                for (name, value) in prepended {
                    sink.write(encode_header(name, value, config)?.as_bytes());
                }
                sink.write(raw);
                return Ok(());
            }
        }

        let start = sink.position();
        let result = if sink.can_rewind() || self.raw_message().is_none() {
            self.write_changed(sink, config)
        } else {
            // Dry run first so that a failing subtree leaves nothing behind.
            self.write_changed(&mut ByteCounter::default(), config)
                .and_then(|_| self.write_changed(sink, config))
        };

        match result {
            Err(err) if err.is_decoding_error() && (sink.can_rewind() || sink.position() == start) => {
                match self.raw_message() {
                    Some(raw) => {
                        tracing::warn!(error = %err, "falling back to the verbatim bytes of a part");
                        sink.rewind(start);
                        sink.write(raw);
                        Ok(())
                    }
                    None => Err(err),
                }
            }
            result => result,
        }
    }

    /// Returns the prepended headers when they are the only change.
    fn prepends_only(&self) -> Option<&[(HeaderName, String)]> {
        let Container::Stream(stream) = &self.container else {
            return None;
        };
        let headers = &stream.headers.get()?.headers;

        (!headers.have_changed(true)
            && !(stream.body_changed && self.is_singlepart())
            && !self.parts.iter().any(Part::was_changed)
            && !self.enclosed.as_ref().is_some_and(|part| part.was_changed()))
        .then(|| headers.prepended())
    }

    fn write_changed(&self, sink: &mut impl Sink, config: &EncoderConfig) -> Result<()> {
        let headers = self.headers()?;
        if self.is_root && headers.is_empty() {
            return Err(Error::RootWithoutHeaders);
        }
        let content_type = self.content_type();

        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or_else(|| {
                Error::Encoding(format!("{} without boundary", content_type.value()))
            })?;
            self.write_headers(sink, headers, false, config)?;

            for (pos, part) in self.parts.iter().enumerate() {
                if pos > 0 {
                    sink.write(b"\r\n");
                }
                sink.write(b"--");
                sink.write(boundary.as_bytes());
                sink.write(b"\r\n");
                part.write_part(sink, config)?;
            }

            sink.write(b"\r\n--");
            sink.write(boundary.as_bytes());
            sink.write(b"--\r\n");
        } else if !content_type.is_singlepart() {
            self.write_headers(sink, headers, false, config)?;
            if let Some(enclosed) = &self.enclosed {
                enclosed.write_part(sink, config)?;
            }
        } else {
            self.write_singlepart(sink, headers, config)?;
        }

        Ok(())
    }

    fn write_singlepart(
        &self,
        sink: &mut impl Sink,
        headers: &MimeHeaders,
        config: &EncoderConfig,
    ) -> Result<()> {
        if let Container::Stream(stream) = &self.container {
            if !stream.body_changed {
                let body_offset = stream.header_block()?.body_offset;
                self.write_headers(sink, headers, false, config)?;
                sink.write(&stream.raw[body_offset.min(stream.range.end)..stream.range.end]);
                return Ok(());
            }
        }

        let mut headers = headers.clone();
        let mut content_type = self.content_type().into_owned();
        let (current, _) = self.content_encoding()?;
        let current = TransferEncoding::parse(&current);
        let preferred = current.unwrap_or(TransferEncoding::SevenBit);
        let is_attachment = self.is_attachment()?;
        let mut changed = false;

        let (encoding, bytes) = match self.body()? {
            Some(Body::Text(text)) if content_type.is_text() => {
                let declared = content_type.charset().unwrap_or("us-ascii").to_string();
                let (charset, bytes) = encode_text(&declared, text);
                let bytes = normalize_crlf(&bytes);

                let minimum = if is_attachment {
                    TransferEncoding::Base64
                } else if matches!(fix_charset(&charset).as_ref(), "us-ascii" | "iso-8859-1") {
                    if has_long_lines(&bytes, config.long_line_threshold) || !bytes.is_ascii() {
                        TransferEncoding::QuotedPrintable
                    } else {
                        TransferEncoding::SevenBit
                    }
                } else {
                    TransferEncoding::Base64
                };

                if fix_charset(&charset) != fix_charset(&declared) {
                    content_type.set_charset(&charset);
                    headers.set("Content-Type", content_type.to_string());
                    changed = true;
                }

                (preferred.at_least(minimum), bytes)
            }
            Some(body) => (
                preferred.at_least(TransferEncoding::Base64),
                body.as_bytes().to_vec(),
            ),
            None => (preferred, Vec::new()),
        };

        if current != Some(encoding) && (current.is_some() || encoding != TransferEncoding::SevenBit)
        {
            headers.set("Content-Transfer-Encoding", encoding.as_str());
            changed = true;
        }

        self.write_headers(sink, &headers, changed, config)?;
        sink.write(&encoding.encode(&bytes, config.max_line_length));

        Ok(())
    }

    /// Writes the header block and the empty line that ends it. Unchanged
    /// blocks of scanned parts are copied from the input.
    fn write_headers(
        &self,
        sink: &mut impl Sink,
        headers: &MimeHeaders,
        changed: bool,
        config: &EncoderConfig,
    ) -> Result<()> {
        if let Container::Stream(stream) = &self.container {
            if !changed && !headers.have_changed(false) {
                let block = stream.header_block()?;
                let raw = &stream.raw[stream.range.start..block.body_offset.min(stream.range.end)];
                if ends_with_empty_line(raw) {
                    sink.write(raw);
                    return Ok(());
                }
            }
        }

        for (name, value) in headers.iter() {
            sink.write(encode_header(name, value, config)?.as_bytes());
        }
        sink.write(b"\r\n");
        Ok(())
    }
}

fn ends_with_empty_line(raw: &[u8]) -> bool {
    let Some(rest) = raw.strip_suffix(b"\n") else {
        return false;
    };
    let rest = rest.strip_suffix(b"\r").unwrap_or(rest);
    rest.is_empty() || rest.ends_with(b"\n")
}
