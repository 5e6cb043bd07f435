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

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encodes `bytes` as quoted-printable with CRLF line endings.
///
/// Output lines never exceed `max_line` columns: longer lines are split with
/// soft `=` breaks that never cut through an escape sequence. Trailing
/// whitespace and a `.` at the start of an output line are escaped.
pub fn encode_quoted_printable(bytes: &[u8], max_line: usize) -> Vec<u8> {
    let max_line = max_line.max(4);
    let mut result = Vec::with_capacity(bytes.len() + bytes.len() / 4);
    let mut lines = bytes.split(|&ch| ch == b'\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut column = 0;

        for (pos, &ch) in line.iter().enumerate() {
            let is_last = pos + 1 == line.len();
            let is_literal = |column: usize| match ch {
                b'=' => false,
                b' ' | b'\t' => !is_last,
                b'.' => column != 0,
                33..=126 => true,
                _ => false,
            };

            // Keep room for the soft break, unless this is the last token.
            let limit = if is_last { max_line } else { max_line - 1 };
            if column + if is_literal(column) { 1 } else { 3 } > limit {
                result.extend_from_slice(b"=\r\n");
                column = 0;
            }

            if is_literal(column) {
                result.push(ch);
                column += 1;
            } else {
                result.extend_from_slice(&[
                    b'=',
                    HEX[(ch >> 4) as usize],
                    HEX[(ch & 0x0f) as usize],
                ]);
                column += 3;
            }
        }

        if lines.peek().is_some() {
            result.extend_from_slice(b"\r\n");
        }
    }

    result
}
