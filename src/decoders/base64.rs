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

const INVALID: u8 = 0xff;
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

static BASE64_MAP: [u8; 256] = build_map();

const fn build_map() -> [u8; 256] {
    let mut map = [INVALID; 256];
    let mut idx = 0;
    while idx < ALPHABET.len() {
        map[ALPHABET[idx] as usize] = idx as u8;
        idx += 1;
    }
    map
}

/// Returns the 6-bit value of a base64 alphabet character.
#[inline(always)]
pub fn base64_value(ch: u8) -> Option<u8> {
    let val = BASE64_MAP[ch as usize];
    (val != INVALID).then_some(val)
}

/// Decodes base64 text, skipping whitespace. Returns `None` on any byte
/// outside the alphabet.
pub fn decode_base64(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut chunk: u32 = 0;
    let mut byte_count: u8 = 0;

    let mut buf = Vec::with_capacity(bytes.len() / 4 * 3);

    for &ch in bytes {
        let val = BASE64_MAP[ch as usize];

        if val != INVALID {
            chunk = (chunk << 6) | val as u32;
            byte_count += 1;

            if byte_count == 4 {
                buf.extend_from_slice(&chunk.to_be_bytes()[1..]);
                chunk = 0;
                byte_count = 0;
            }
        } else if ch == b'=' {
            flush(&mut buf, chunk, byte_count)?;
            chunk = 0;
            byte_count = 0;
        } else if !ch.is_ascii_whitespace() {
            return None;
        }
    }

    flush(&mut buf, chunk, byte_count)?;

    Some(buf)
}

fn flush(buf: &mut Vec<u8>, chunk: u32, byte_count: u8) -> Option<()> {
    match byte_count {
        0 => (),
        2 => buf.push((chunk >> 4) as u8),
        3 => buf.extend_from_slice(&((chunk >> 2) as u16).to_be_bytes()),
        _ => return None,
    }
    Some(())
}

/// Decodes the text of a `B` encoded word, padding it to a multiple of four.
pub fn decode_base64_word(text: &[u8]) -> Option<Vec<u8>> {
    let len = text.iter().filter(|ch| !ch.is_ascii_whitespace()).count();
    if len % 4 != 0 {
        let mut padded = text.to_vec();
        padded.resize(text.len() + 4 - len % 4, b'=');
        decode_base64(&padded)
    } else {
        decode_base64(text)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn decode_base64() {
        for (encoded_str, expected_result) in [
            ("VGVzdA==", "Test"),
            ("WWU=", "Ye"),
            ("QQ==", "A"),
            ("cm8=", "ro"),
            (
                "QXJlIHlvdSBhIFNoaW1hbm8gb3IgQ2FtcGFnbm9sbyBwZXJzb24/",
                "Are you a Shimano or Campagnolo person?",
            ),
            (
                "PCFET0NUWVBFIGh0bWw+CjxodG1sPgo8Ym9keT4KPC9ib2R5Pgo8L2h0bWw+Cg==",
                "<!DOCTYPE html>\n<html>\n<body>\n</body>\n</html>\n",
            ),
            (
                "PCFET0NUWVBFIGh0bWw+CjxodG1sPg\no8Ym9ke\nT4KPC 9ib2R5Pg\n o8L2h0bWw+Cg==",
                "<!DOCTYPE html>\n<html>\n<body>\n</body>\n</html>\n",
            ),
            ("w6HDqcOtw7PDug==", "áéíóú"),
            ("====", ""),
            ("w6HDq!cOtw7PDug=", ""),
            ("w6 HD qcOt", "áéí"),
            ("cmáé", ""),
            ("áé", ""),
            ("w\n6\nH\nD\nq\nc\nO\nt\nw\n7\n P\tD u g\n==", "áéíóú"),
            ("cm8", "ro"),
        ] {
            assert_eq!(
                super::decode_base64(encoded_str.as_bytes()).unwrap_or_default(),
                expected_result.as_bytes(),
                "Failed for {:?}",
                encoded_str
            );
        }
    }

    #[test]
    fn decode_base64_word() {
        for (encoded_str, expected_result) in [
            ("0JbQtdC60LA=", Some("Жека")),
            ("0JbQtdC60LA", Some("Жека")),
            ("w6HDqcOtw7PDug", Some("áéíóú")),
            ("SGk", Some("Hi")),
            ("", Some("")),
            ("S?GVsbG8", None),
        ] {
            assert_eq!(
                super::decode_base64_word(encoded_str.as_bytes()),
                expected_result.map(|r| r.as_bytes().to_vec()),
                "Failed for {:?}",
                encoded_str
            );
        }
    }
}
