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

use base64::{engine::general_purpose::STANDARD, Engine};

/// Encodes `bytes` as base64 without line breaks.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Encodes `bytes` as base64 split in CRLF terminated lines of `max_line`
/// characters.
pub fn encode_base64_mime(bytes: &[u8], max_line: usize) -> Vec<u8> {
    let encoded = STANDARD.encode(bytes);
    let max_line = max_line.max(4);
    let mut result = Vec::with_capacity(encoded.len() + 2 * (encoded.len() / max_line + 1));

    for line in encoded.as_bytes().chunks(max_line) {
        result.extend_from_slice(line);
        result.extend_from_slice(b"\r\n");
    }

    result
}
