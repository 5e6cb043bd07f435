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

use super::base64::encode_base64;

/// Longest encoded word allowed by RFC 2047.
pub const MAX_WORD_LENGTH: usize = 75;

/// Longest encoded word that fits on a folded line of `max_line_length`
/// columns after its leading space.
pub fn max_word_length(max_line_length: usize) -> usize {
    max_line_length.saturating_sub(1).min(MAX_WORD_LENGTH)
}

const Q_PREFIX: &str = "=?utf-8?q?";
const B_PREFIX: &str = "=?utf-8?b?";
const SUFFIX: &str = "?=";

fn q_width(ch: char) -> usize {
    if ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '!' | '*' | '+' | '-' | '/') {
        1
    } else {
        3 * ch.len_utf8()
    }
}

fn push_q(word: &mut String, ch: char) {
    if ch == ' ' {
        word.push('_');
    } else if q_width(ch) == 1 {
        word.push(ch);
    } else {
        let mut buf = [0u8; 4];
        for byte in ch.encode_utf8(&mut buf).bytes() {
            word.push_str(&format!("={byte:02X}"));
        }
    }
}

/// Encodes `text` as one or more UTF-8 encoded words of at most `max_len`
/// characters each, using whichever of the `Q` and `B` encodings is shorter
/// (`Q` on ties).
pub fn encode_words(text: &str, max_len: usize) -> Vec<String> {
    let budget = max_len.max(Q_PREFIX.len() + SUFFIX.len() + 12) - Q_PREFIX.len() - SUFFIX.len();
    let q_len: usize = text.chars().map(q_width).sum();
    let b_len = text.len().div_ceil(3) * 4;

    let mut words = Vec::new();
    if q_len <= b_len {
        let mut word = String::new();
        for ch in text.chars() {
            if !word.is_empty() && word.len() + q_width(ch) > budget {
                words.push(format!("{Q_PREFIX}{word}{SUFFIX}"));
                word.clear();
            }
            push_q(&mut word, ch);
        }
        if !word.is_empty() {
            words.push(format!("{Q_PREFIX}{word}{SUFFIX}"));
        }
    } else {
        let max_bytes = budget / 4 * 3;
        let mut start = 0;
        let mut end = 0;
        for (pos, ch) in text.char_indices() {
            if pos + ch.len_utf8() - start > max_bytes && end > start {
                words.push(format!("{B_PREFIX}{}{SUFFIX}", encode_base64(text[start..end].as_bytes())));
                start = end;
            }
            end = pos + ch.len_utf8();
        }
        if end > start {
            words.push(format!("{B_PREFIX}{}{SUFFIX}", encode_base64(text[start..end].as_bytes())));
        }
    }

    words
}

/// Returns `true` when `text` can be emitted in a header without encoding.
pub fn is_header_safe(text: &str) -> bool {
    text.is_ascii() && !text.contains("=?") && !text.bytes().any(|ch| ch.is_ascii_control() && ch != b'\t')
}

/// Encodes unstructured header text, folding consecutive encoded words with
/// `CRLF SP`.
pub fn encode_unstructured(text: &str, max_word: usize) -> String {
    if is_header_safe(text) {
        text.to_string()
    } else {
        encode_words(text, max_word).join("\r\n ")
    }
}
