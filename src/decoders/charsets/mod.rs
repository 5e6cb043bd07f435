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

//! Charset bridge between raw bytes and Unicode text.

use std::borrow::Cow;

use encoding_rs::Encoding;

use crate::{Error, Result};

pub mod detect;
pub mod utf;

/// Normalizes a charset label, mapping common aliases that `encoding_rs`
/// does not know about.
pub fn fix_charset(charset: &str) -> Cow<'static, str> {
    let charset = charset.trim().trim_matches('"').to_ascii_lowercase();

    if charset.contains("sjis") {
        return "shift_jis".into();
    } else if charset.contains("koi8-r") {
        return "koi8-r".into();
    } else if charset.contains("utf-8") {
        return "utf-8".into();
    }

    hashify::tiny_map_ignore_case!(charset.as_bytes(),
        "windows-874" => "windows-874",
        "cp874" => "windows-874",
        "x-unknown" => "utf-8",
        "utf8" => "utf-8",
        "unicode-1-1-utf-7" => "utf-7",
        "ascii" => "us-ascii",
        "ansi_x3.4-1968" => "us-ascii",
    )
    .map(Cow::Borrowed)
    .unwrap_or(Cow::Owned(charset))
}

/// Returns `true` when ASCII bytes decode to themselves in `label`.
fn is_ascii_transparent(label: &str) -> bool {
    !matches!(label, "utf-7" | "utf-16" | "utf-16le" | "utf-16be")
        && Encoding::for_label(label.as_bytes()).map_or(true, |e| e.is_ascii_compatible())
}

/// Decodes `bytes` with the declared `charset`.
///
/// ASCII input is returned as-is. Unknown labels and malformed input fall
/// back to charset detection; `Error::Decoding` is returned when that fails
/// too.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> Result<String> {
    let label = fix_charset(charset);

    if bytes.is_ascii() && is_ascii_transparent(&label) {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let decoded = match label.as_ref() {
        "utf-7" => Some(utf::decoder_utf7(bytes)),
        "utf-16" => Some(utf::decoder_utf16(bytes)),
        "utf-16le" => Some(utf::decoder_utf16_le(bytes)),
        "utf-16be" => Some(utf::decoder_utf16_be(bytes)),
        "utf-8" => std::str::from_utf8(bytes).ok().map(str::to_string),
        label => Encoding::for_label(label.as_bytes())
            .and_then(|encoding| detect::decode_strict(encoding, bytes)),
    };

    if let Some(decoded) = decoded {
        return Ok(decoded);
    }

    tracing::warn!(charset, "Charset decoding failed, detecting charset");

    detect::detect(bytes)
        .ok_or_else(|| Error::Decoding(format!("cannot decode text declared as {charset:?}")))
}

/// Converts header bytes to text: UTF-8 when valid, detected otherwise.
pub fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => detect::detect(bytes)
            .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Encodes `text` in `charset`, falling back to UTF-8 when the charset is
/// unknown or cannot represent the text. Returns the charset actually used.
pub fn encode_text(charset: &str, text: &str) -> (String, Vec<u8>) {
    let label = fix_charset(charset);
    let utf8 = || ("utf-8".to_string(), text.as_bytes().to_vec());

    match label.as_ref() {
        "utf-8" => return utf8(),
        "us-ascii" if text.is_ascii() => return (charset.trim().to_string(), text.into()),
        "us-ascii" => return utf8(),
        _ => (),
    }

    if let Some(encoding) = Encoding::for_label(label.as_bytes())
        .filter(|encoding| encoding.output_encoding() == *encoding)
    {
        let (bytes, used, had_errors) = encoding.encode(text);
        if !had_errors && used == encoding {
            return (charset.trim().to_string(), bytes.into_owned());
        }
    }

    utf8()
}
