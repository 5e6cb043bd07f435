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

pub mod base64;
pub mod encoded_word;
pub mod header;
pub mod quoted_printable;

/// A `Content-Transfer-Encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    QuotedPrintable,
    Base64,
    EightBit,
}

impl TransferEncoding {
    /// Parses a transfer encoding name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        hashify::tiny_map_ignore_case!(value.trim().as_bytes(),
            "7bit" => TransferEncoding::SevenBit,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            "base64" => TransferEncoding::Base64,
            "8bit" => TransferEncoding::EightBit,
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::EightBit => "8bit",
        }
    }

    /// `7bit < quoted-printable = base64 < 8bit`
    fn weight(&self) -> u8 {
        match self {
            TransferEncoding::SevenBit => 0,
            TransferEncoding::QuotedPrintable | TransferEncoding::Base64 => 1,
            TransferEncoding::EightBit => 3,
        }
    }

    /// Returns `self` unless `minimum` is strictly stronger.
    pub fn at_least(self, minimum: TransferEncoding) -> Self {
        if minimum.weight() > self.weight() {
            minimum
        } else {
            self
        }
    }

    /// Applies the transfer encoding to `bytes`.
    pub fn encode(&self, bytes: &[u8], max_line: usize) -> Vec<u8> {
        match self {
            TransferEncoding::QuotedPrintable => {
                quoted_printable::encode_quoted_printable(bytes, max_line)
            }
            TransferEncoding::Base64 => base64::encode_base64_mime(bytes, max_line),
            TransferEncoding::SevenBit | TransferEncoding::EightBit => bytes.to_vec(),
        }
    }
}

/// Converts bare `\n` and `\r` line endings to `\r\n`.
pub fn normalize_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + bytes.len() / 32);
    let mut iter = bytes.iter().peekable();

    while let Some(&ch) = iter.next() {
        match ch {
            b'\r' => {
                iter.next_if_eq(&&b'\n');
                result.extend_from_slice(b"\r\n");
            }
            b'\n' => result.extend_from_slice(b"\r\n"),
            _ => result.push(ch),
        }
    }

    result
}

/// Returns `true` when any line of `bytes` is at least `threshold` bytes
/// long, terminator excluded.
pub fn has_long_lines(bytes: &[u8], threshold: usize) -> bool {
    bytes
        .split(|&ch| ch == b'\n')
        .any(|line| line.strip_suffix(b"\r").unwrap_or(line).len() >= threshold)
}
