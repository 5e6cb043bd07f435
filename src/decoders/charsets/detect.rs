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

//! Charset detection for mislabeled or unlabeled text.

use encoding_rs::{
    Encoding, BIG5, EUC_JP, EUC_KR, GBK, ISO_2022_JP, ISO_8859_2, ISO_8859_7, KOI8_R, SHIFT_JIS,
    WINDOWS_1250, WINDOWS_1251, WINDOWS_1252, WINDOWS_1253, WINDOWS_1255, WINDOWS_1256,
    WINDOWS_874,
};

/// Candidates tried by the scoring detector, best guess first.
static CANDIDATES: &[&Encoding] = &[
    WINDOWS_1252,
    WINDOWS_1251,
    KOI8_R,
    WINDOWS_1250,
    ISO_8859_2,
    WINDOWS_1253,
    ISO_8859_7,
    WINDOWS_1255,
    WINDOWS_1256,
    WINDOWS_874,
    SHIFT_JIS,
    EUC_JP,
    GBK,
    BIG5,
    EUC_KR,
];

/// BOM sniffing, UTF-8 validity and ISO-2022-JP escape sequences.
pub fn detect_fast(bytes: &[u8]) -> Option<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_strict(encoding, &bytes[bom_len..]);
    }

    if bytes.windows(3).any(|w| {
        matches!(
            w,
            [0x1b, b'$', b'B'] | [0x1b, b'$', b'@'] | [0x1b, b'(', b'J'] | [0x1b, b'$', b'(']
        )
    }) {
        return decode_strict(ISO_2022_JP, bytes);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    None
}

/// Decodes `bytes` with every candidate encoding and keeps the one whose
/// output is the most script-coherent.
pub fn detect_slow(bytes: &[u8]) -> Option<String> {
    let mut best: Option<(&'static Encoding, i64)> = None;

    for &encoding in CANDIDATES {
        let Some(text) = decode_strict(encoding, bytes) else {
            continue;
        };
        let score = score(&text);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((encoding, score));
        }
    }

    best.map(|(encoding, _)| {
        tracing::debug!(charset = encoding.name(), "Detected charset");
        encoding.decode_without_bom_handling(bytes).0.into_owned()
    })
}

/// Runs the fast detector, then the slow one.
pub fn detect(bytes: &[u8]) -> Option<String> {
    detect_fast(bytes).or_else(|| detect_slow(bytes))
}

pub(crate) fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    (!had_errors).then(|| text.into_owned())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Greek,
    Cyrillic,
    Hebrew,
    Arabic,
    Thai,
    Cjk,
    Other,
}

fn script(ch: char) -> Script {
    match ch as u32 {
        0x80..=0x24f | 0x1e00..=0x1eff => Script::Latin,
        0x370..=0x3ff => Script::Greek,
        0x400..=0x52f => Script::Cyrillic,
        0x590..=0x5ff => Script::Hebrew,
        0x600..=0x6ff => Script::Arabic,
        0xe00..=0xe7f => Script::Thai,
        0x3000..=0x9fff | 0xac00..=0xd7af | 0xff00..=0xffef => Script::Cjk,
        _ => Script::Other,
    }
}

fn score(text: &str) -> i64 {
    let mut score = 0;
    let mut last_script = None;
    let mut latin_run = 0;

    for ch in text.chars() {
        if ch.is_ascii() {
            score += 1;
            latin_run = 0;
        } else if ('\u{80}'..='\u{9f}').contains(&ch) || ch == char::REPLACEMENT_CHARACTER {
            score -= 5;
            latin_run = 0;
        } else if ch.is_alphabetic() {
            let current = script(ch);
            score += match last_script {
                // Western text rarely carries long runs of accented letters.
                _ if current == Script::Latin && latin_run >= 2 => -2,
                Some(last) if last == current => 2,
                Some(_) => -1,
                None => 1,
            };
            latin_run = if current == Script::Latin {
                latin_run + 1
            } else {
                0
            };
            last_script = Some(current);
        } else {
            latin_run = 0;
        }
    }

    score
}
