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

use crate::{
    decoders::charsets::bytes_to_string, Error, HeaderName, MimeHeaders, Result,
};

use super::MessageStream;

/// Parses the header block at the current stream position.
///
/// Returns the headers and the offset where the body starts: right after the
/// first empty line, at the first line that is not a header, or at the end
/// of the stream.
pub fn parse_headers(
    stream: &mut MessageStream<'_>,
    max_line: usize,
    strict: bool,
) -> Result<(MimeHeaders, usize)> {
    let mut entries = Vec::new();
    let mut current: Option<(HeaderName, Vec<u8>)> = None;
    let mut is_first = true;
    let mut body_offset = None;

    loop {
        stream.checkpoint();
        let Some(line) = stream.next_line() else {
            break;
        };
        let bytes = stream.line_bytes(&line);

        if line.len() > max_line && strict {
            return Err(Error::MalformedHeaders(format!(
                "line of {} bytes at offset {} exceeds the {} bytes limit",
                line.len(),
                line.start,
                max_line
            )));
        }

        match bytes.first() {
            None => {
                body_offset = Some(line.end);
                break;
            }
            Some(b' ' | b'\t') => {
                if let Some((_, value)) = &mut current {
                    value.extend_from_slice(bytes);
                }
                continue;
            }
            _ if is_first && bytes.starts_with(b"From ") => {
                is_first = false;
                continue;
            }
            _ => (),
        }
        is_first = false;

        let name = bytes
            .iter()
            .position(|&ch| ch == b':')
            .map(|colon| (trim_end(&bytes[..colon]), &bytes[colon + 1..]))
            .filter(|(name, _)| {
                !name.is_empty() && !name.iter().any(|ch| ch.is_ascii_whitespace())
            });

        let Some((name, value)) = name else {
            stream.restore();
            body_offset = Some(line.start);
            break;
        };

        if !name.is_ascii() && strict {
            return Err(Error::NonAsciiHeaderName(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }

        if let Some((name, value)) = current.take() {
            entries.push((name, bytes_to_string(&value)));
        }

        let value = match value {
            [b' ' | b'\t', rest @ ..] => rest,
            value => value,
        };
        current = Some((
            HeaderName::new(String::from_utf8_lossy(name)),
            value.to_vec(),
        ));
    }

    if let Some((name, value)) = current.take() {
        entries.push((name, bytes_to_string(&value)));
    }

    Ok((
        MimeHeaders::from_entries(entries),
        body_offset.unwrap_or_else(|| stream.offset()),
    ))
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let len = bytes
        .iter()
        .rposition(|ch| !ch.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..len]
}

/// Returns `true` when `line` looks like a `Name: value` header line.
pub fn is_header_line(line: &[u8]) -> bool {
    line.iter()
        .position(|&ch| ch == b':')
        .map(|colon| trim_end(&line[..colon]))
        .is_some_and(|name| !name.is_empty() && !name.iter().any(|ch| ch.is_ascii_whitespace()))
}
