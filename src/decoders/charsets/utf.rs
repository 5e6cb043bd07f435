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

use std::char::{decode_utf16, REPLACEMENT_CHARACTER};

use crate::decoders::base64::base64_value;

struct Utf7DecoderState {
    utf16_units: Vec<u16>,
    bits: u32,
    bit_count: u8,
}

impl Utf7DecoderState {
    fn push(&mut self, val: u8) {
        self.bits = (self.bits << 6) | val as u32;
        self.bit_count += 6;

        if self.bit_count >= 16 {
            self.bit_count -= 16;
            self.utf16_units.push((self.bits >> self.bit_count) as u16);
            self.bits &= (1 << self.bit_count) - 1;
        }
    }

    fn flush(&mut self, result: &mut String) {
        result.extend(
            decode_utf16(self.utf16_units.drain(..)).map(|r| r.unwrap_or(REPLACEMENT_CHARACTER)),
        );
        self.bits = 0;
        self.bit_count = 0;
    }
}

pub fn decoder_utf7(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());
    let mut in_b64 = false;
    let mut shift_len = 0;

    let mut state = Utf7DecoderState {
        utf16_units: Vec::with_capacity(10),
        bits: 0,
        bit_count: 0,
    };

    for &byte in bytes {
        if in_b64 {
            if let Some(val) = base64_value(byte) {
                state.push(val);
                shift_len += 1;
                continue;
            }

            state.flush(&mut result);
            in_b64 = false;

            match byte {
                b'-' if shift_len == 0 => result.push('+'),
                b'-' => (),
                _ => {
                    if shift_len == 0 {
                        result.push('+');
                    }
                    result.push(char::from(byte));
                }
            }
        } else if byte == b'+' {
            in_b64 = true;
            shift_len = 0;
        } else {
            result.push(char::from(byte));
        }
    }

    if in_b64 {
        if shift_len == 0 {
            result.push('+');
        }
        state.flush(&mut result);
    }

    result.shrink_to_fit();
    result
}

fn decoder_utf16_(bytes: &[u8], fnc: fn([u8; 2]) -> u16) -> String {
    decode_utf16(bytes.chunks_exact(2).map(|c| fnc([c[0], c[1]])))
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect::<String>()
}

pub fn decoder_utf16_le(bytes: &[u8]) -> String {
    decoder_utf16_(bytes, u16::from_le_bytes)
}

pub fn decoder_utf16_be(bytes: &[u8]) -> String {
    decoder_utf16_(bytes, u16::from_be_bytes)
}

#[allow(clippy::type_complexity)]
pub fn decoder_utf16(bytes: &[u8]) -> String {
    // Read BOM
    let (bytes, fnc): (&[u8], fn([u8; 2]) -> u16) = match bytes {
        [0xfe, 0xff, rest @ ..] => (rest, u16::from_be_bytes),
        [0xff, 0xfe, rest @ ..] => (rest, u16::from_le_bytes),
        _ => (bytes, u16::from_le_bytes),
    };

    decoder_utf16_(bytes, fnc)
}

#[cfg(test)]
mod tests {
    use super::{decoder_utf16, decoder_utf16_be, decoder_utf7};

    #[test]
    fn decode_utf7() {
        let inputs = [
            ("Hello, World+ACE-", "Hello, World!"),
            ("Hi Mom -+Jjo--!", "Hi Mom -☺-!"),
            ("+ZeVnLIqe-", "日本語"),
            ("Item 3 is +AKM-1.", "Item 3 is £1."),
            ("Plus minus +- -+ +--", "Plus minus + -+ +-"),
            (
                "+APw-ber ihre mi+AN8-liche Lage+ADs- +ACI-wir",
                "über ihre mißliche Lage; \"wir",
            ),
            (
                concat!(
                    "+ACI-The sayings of Confucius,+ACI- James R. Ware, trans.  +U/BTFw-:\n",
                    "+ZYeB9FH6ckh5Pg-, 1980.\n",
                    "+Vttm+E6UfZM-, +W4tRQ066bOg-, +UxdOrA-:  +Ti1XC2b4Xpc-, 1990."
                ),
                concat!(
                    "\"The sayings of Confucius,\" James R. Ware, trans.  台北:\n",
                    "文致出版社, 1980.\n",
                    "四書五經, 宋元人注, 北京:  中國書店, 1990."
                ),
            ),
            ("trailing +AKM", "trailing £"),
        ];

        for (input, expected) in inputs {
            assert_eq!(decoder_utf7(input.as_bytes()), expected, "Failed for {input:?}");
        }
    }

    #[test]
    fn decode_utf16() {
        let inputs: [(&[u8], &str); 4] = [
            (b"\xff\xfe\xe1\x00\xe9\x00", "áé"),
            (b"\xfe\xff\x00\xe1\x00\xe9", "áé"),
            (b"\xe1\x00\xe9\x00", "áé"),
            (b"\xe1\x00\xe9", "á"),
        ];

        for (input, expected) in inputs {
            assert_eq!(decoder_utf16(input), expected, "Failed for {input:?}");
        }

        assert_eq!(
            decoder_utf16_be(b"0\xcf0\xed0\xfc0\xfb0\xef0\xfc0\xeb0\xc9"),
            "ハロー・ワールド"
        );
    }
}
