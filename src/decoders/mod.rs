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

//! Transfer and header decoders.

pub mod base64;
pub mod charsets;
pub mod encoded_word;
pub mod hex;
pub mod quoted_printable;

/// Transfer-decodes a body according to its `Content-Transfer-Encoding`.
///
/// Returns `None` when the payload is not valid for the declared encoding.
/// Unknown encodings (`7bit`, `8bit`, `binary`, ...) pass through untouched.
pub fn decode_transfer(encoding: &str, bytes: &[u8]) -> Option<Vec<u8>> {
    if encoding.eq_ignore_ascii_case("base64") {
        base64::decode_base64(bytes)
    } else if encoding.eq_ignore_ascii_case("quoted-printable") {
        Some(quoted_printable::decode_quoted_printable(bytes))
    } else {
        Some(bytes.to_vec())
    }
}
