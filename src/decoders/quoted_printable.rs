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

use super::hex::hex_value;

#[derive(PartialEq, Debug)]
enum QuotedPrintableState {
    None,
    Eq,
    Hex1(u8, u8),
}

/// Decodes a quoted-printable body. Soft line breaks (`=` followed by
/// optional whitespace and a line ending) are removed and invalid escapes are
/// kept literally.
pub fn decode_quoted_printable(bytes: &[u8]) -> Vec<u8> {
    decode(bytes, false)
}

/// Decodes the text of a `Q` encoded word, where `_` stands for a space.
pub fn decode_quoted_printable_word(bytes: &[u8]) -> Vec<u8> {
    decode(bytes, true)
}

fn decode(bytes: &[u8], is_word: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(bytes.len());
    let mut state = QuotedPrintableState::None;
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos];
        pos += 1;

        state = match state {
            QuotedPrintableState::None => match ch {
                b'=' => QuotedPrintableState::Eq,
                b'_' if is_word => {
                    buf.push(b' ');
                    QuotedPrintableState::None
                }
                _ => {
                    buf.push(ch);
                    QuotedPrintableState::None
                }
            },
            QuotedPrintableState::Eq => {
                if let Some(hex1) = hex_value(ch) {
                    QuotedPrintableState::Hex1(hex1, ch)
                } else if !is_word && matches!(ch, b'\r' | b'\n' | b' ' | b'\t') {
                    if let Some(skip) = soft_break(&bytes[pos - 1..]) {
                        pos += skip - 1;
                    } else {
                        buf.push(b'=');
                        buf.push(ch);
                    }
                    QuotedPrintableState::None
                } else if ch == b'=' {
                    buf.push(b'=');
                    QuotedPrintableState::Eq
                } else {
                    buf.push(b'=');
                    buf.push(ch);
                    QuotedPrintableState::None
                }
            }
            QuotedPrintableState::Hex1(hex1, raw) => {
                if let Some(hex2) = hex_value(ch) {
                    buf.push((hex1 << 4) | hex2);
                    QuotedPrintableState::None
                } else {
                    buf.push(b'=');
                    buf.push(raw);
                    if ch == b'=' {
                        QuotedPrintableState::Eq
                    } else {
                        buf.push(ch);
                        QuotedPrintableState::None
                    }
                }
            }
        };
    }

    match state {
        QuotedPrintableState::None => (),
        QuotedPrintableState::Eq => {
            // A trailing '=' is a soft break at the end of input.
            if is_word {
                buf.push(b'=');
            }
        }
        QuotedPrintableState::Hex1(_, raw) => {
            buf.push(b'=');
            buf.push(raw);
        }
    }

    buf
}

/// Returns the length of `[ \t]* \r? \n` at the start of `bytes`, or of the
/// whitespace run when it reaches the end of input.
fn soft_break(bytes: &[u8]) -> Option<usize> {
    let ws = bytes
        .iter()
        .take_while(|&&ch| ch == b' ' || ch == b'\t')
        .count();
    match &bytes[ws..] {
        [b'\r', b'\n', ..] => Some(ws + 2),
        [b'\n', ..] | [b'\r', ..] => Some(ws + 1),
        [] => Some(ws),
        _ => None,
    }
}
