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

static RE_PREFIXES: &[&str] = &[
    "re", "res", "sv", "antw", "ref", "aw", "απ", "השב", "vá", "r", "rif", "bls", "odp", "ynt",
    "atb", "رد", "回复", "转发", "ha",
];

static FWD_PREFIXES: &[&str] = &[
    "fwd", "fw", "rv", "enc", "vs", "doorst", "vl", "tr", "wg", "πρθ", "הועבר", "továbbítás",
    "i", "fs", "trs", "vb", "pd", "i̇lt", "yml", "回覆", "轉寄",
];

fn is_prefix(token: &str) -> bool {
    let token = token.to_lowercase();
    RE_PREFIXES.contains(&token.as_str()) || FWD_PREFIXES.contains(&token.as_str())
}

/// Strips any number of leading reply and forward markers (`Re:`, `Fwd:`,
/// `RE[2]:`, `Aw:`, ...) from a subject.
pub fn clean_subject(text: &str) -> &str {
    let mut rest = text.trim_start();

    loop {
        let Some(colon) = rest.find(':') else {
            break;
        };
        let token = &rest[..colon];
        let prefix = match token.find(['[', '(']) {
            Some(open) => {
                let counter = &token[open + 1..];
                let counter = counter
                    .strip_suffix(']')
                    .or_else(|| counter.strip_suffix(')'));
                match counter {
                    Some(counter) if counter.chars().all(|ch| ch.is_ascii_digit()) => {
                        &token[..open]
                    }
                    _ => break,
                }
            }
            None => token,
        };

        if prefix.is_empty() || !is_prefix(prefix.trim_end()) {
            break;
        }
        rest = rest[colon + 1..].trim_start();
    }

    rest.trim_end()
}
