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
    decoders::{
        charsets::decode_charset,
        encoded_word::{decode_header, unfold},
        hex::decode_hex,
    },
    Parameterized, Params,
};

/// Splits `value` on `;` outside of quoted strings.
fn split_segments(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut in_quotes = false;
    let mut is_escaped = false;
    let mut start = 0;

    for (pos, ch) in value.char_indices() {
        match ch {
            _ if is_escaped => is_escaped = false,
            '\\' if in_quotes => is_escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                segments.push(&value[start..pos]);
                start = pos + 1;
            }
            _ => (),
        }
    }
    segments.push(&value[start..]);

    segments
}

fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
    {
        Some(inner) => {
            let mut result = String::with_capacity(inner.len());
            let mut is_escaped = false;
            for ch in inner.chars() {
                if ch == '\\' && !is_escaped {
                    is_escaped = true;
                } else {
                    result.push(ch);
                    is_escaped = false;
                }
            }
            result
        }
        None => value.to_string(),
    }
}

struct Continuation<'x> {
    index: u32,
    is_encoded: bool,
    value: &'x str,
}

/// Splits an RFC 2231 parameter name into `(base, index, is_encoded)`.
fn split_extended_name(name: &str) -> Option<(&str, u32, bool)> {
    let (base, rest) = name.split_once('*')?;
    let (index, is_encoded) = match rest {
        "" => (0, true),
        rest => match rest.strip_suffix('*') {
            Some(index) => (index.parse().ok()?, true),
            None => (rest.parse().ok()?, false),
        },
    };
    Some((base, index, is_encoded))
}

/// Splits a `charset'language'` prefix off an encoded value.
fn split_charset_prefix(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.splitn(3, '\'');
    let (charset, _language, text) = (parts.next()?, parts.next()?, parts.next()?);
    charset
        .bytes()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, b'-' | b'_' | b'.' | b':'))
        .then_some((charset, text))
}

/// Reassembles the pieces of an RFC 2231 parameter.
fn join_continuations(mut pieces: Vec<Continuation<'_>>) -> String {
    pieces.sort_by_key(|piece| piece.index);

    let mut charset = None;
    let mut bytes = Vec::new();
    let mut encoded = String::new();

    for (idx, piece) in pieces.iter().enumerate() {
        let mut value = piece.value;

        if piece.is_encoded {
            if idx == 0 || charset.is_none() {
                if let Some((cs, text)) = split_charset_prefix(value) {
                    charset = (!cs.is_empty()).then_some(cs);
                    value = text;
                }
            }
            encoded.push_str(value);
        } else {
            if !encoded.is_empty() {
                bytes.extend_from_slice(&decode_hex(encoded.as_bytes()).1);
                encoded.clear();
            }
            bytes.extend_from_slice(value.as_bytes());
        }
    }
    if !encoded.is_empty() {
        bytes.extend_from_slice(&decode_hex(encoded.as_bytes()).1);
    }

    decode_charset(charset.unwrap_or("utf-8"), &bytes)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses a `value; name=param; ...` header value.
///
/// Parameter names are lowercased. RFC 2231 continuations and charset
/// prefixes are reassembled, and RFC 2047 encoded words found in quoted
/// values are decoded. When a parameter appears more than once the last
/// value wins.
pub fn parse_parameterized(value: &str) -> Parameterized {
    let value = unfold(value);
    let mut segments = split_segments(&value).into_iter();

    let main = segments.next().map(str::trim).unwrap_or_default();
    let main = if main.contains("=?") {
        decode_header(main)
    } else {
        main.to_string()
    };

    let mut params = Params::new();
    let mut continuations: Vec<(String, Vec<Continuation<'_>>)> = Vec::new();

    for segment in segments {
        let Some((name, param)) = segment.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let param = param.trim();
        if name.is_empty() {
            continue;
        }

        if let Some((base, index, is_encoded)) = split_extended_name(&name) {
            let piece = Continuation {
                index,
                is_encoded,
                value: param.trim_matches('"'),
            };
            match continuations.iter_mut().find(|(b, _)| b == base) {
                Some((_, pieces)) => pieces.push(piece),
                None => {
                    // Reserve the position of the parameter.
                    params.set(base, "");
                    continuations.push((base.to_string(), vec![piece]));
                }
            }
        } else {
            let param = unquote(param);
            let param = if param.contains("=?") {
                decode_header(&param)
            } else {
                param
            };
            params.set(&name, param);
        }
    }

    for (base, pieces) in continuations {
        params.set(&base, join_continuations(pieces));
    }

    Parameterized {
        value: (!main.is_empty()).then(|| main.to_ascii_lowercase()),
        params,
    }
}
