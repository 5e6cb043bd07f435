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

static HEX_MAP: [i8; 256] = build_map();

const fn build_map() -> [i8; 256] {
    let mut map = [-1i8; 256];
    let mut idx = 0;
    while idx < 10 {
        map[b'0' as usize + idx] = idx as i8;
        idx += 1;
    }
    idx = 0;
    while idx < 6 {
        map[b'a' as usize + idx] = 10 + idx as i8;
        map[b'A' as usize + idx] = 10 + idx as i8;
        idx += 1;
    }
    map
}

/// Returns the value of a hexadecimal digit, case-insensitive.
#[inline(always)]
pub fn hex_value(ch: u8) -> Option<u8> {
    let val = HEX_MAP[ch as usize];
    if val != -1 {
        Some(val as u8)
    } else {
        None
    }
}

#[derive(PartialEq, Debug)]
enum HexState {
    None,
    Percent,
    Hex1(u8, u8),
}

/// Percent-decodes `src`. Invalid escapes are copied literally and reported
/// by returning `false`.
pub fn decode_hex(src: &[u8]) -> (bool, Vec<u8>) {
    let mut state = HexState::None;
    let mut result = Vec::with_capacity(src.len());
    let mut success = true;

    for &ch in src {
        state = match state {
            HexState::None if ch == b'%' => HexState::Percent,
            HexState::None => {
                result.push(ch);
                HexState::None
            }
            HexState::Percent => match hex_value(ch) {
                Some(hex1) => HexState::Hex1(hex1, ch),
                None => {
                    success = false;
                    result.push(b'%');
                    if ch == b'%' {
                        HexState::Percent
                    } else {
                        result.push(ch);
                        HexState::None
                    }
                }
            },
            HexState::Hex1(hex1, raw) => match hex_value(ch) {
                Some(hex2) => {
                    result.push((hex1 << 4) | hex2);
                    HexState::None
                }
                None => {
                    success = false;
                    result.push(b'%');
                    result.push(raw);
                    if ch == b'%' {
                        HexState::Percent
                    } else {
                        result.push(ch);
                        HexState::None
                    }
                }
            },
        };
    }

    match state {
        HexState::None => (),
        HexState::Percent => {
            success = false;
            result.push(b'%');
        }
        HexState::Hex1(_, raw) => {
            success = false;
            result.push(b'%');
            result.push(raw);
        }
    }

    (success, result)
}
