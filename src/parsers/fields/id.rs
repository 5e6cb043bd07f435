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

/// Extracts the `<...>` message ids of a `Message-Id`, `References` or
/// `In-Reply-To` value, without the angle brackets.
///
/// Values with no bracketed id are returned as a single bare token to cope
/// with broken clients.
pub fn parse_ids(value: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut token_start = None;
    let mut invalid = String::new();

    for (pos, ch) in value.char_indices() {
        match ch {
            '<' => token_start = Some(pos + 1),
            '>' => {
                if let Some(start) = token_start.take() {
                    let id: String = value[start..pos]
                        .chars()
                        .filter(|ch| !ch.is_whitespace())
                        .collect();
                    if !id.is_empty() {
                        ids.push(id);
                    }
                }
            }
            _ if token_start.is_none() && ids.is_empty() && !ch.is_whitespace() => {
                invalid.push(ch);
            }
            _ => (),
        }
    }

    if ids.is_empty() && !invalid.is_empty() {
        ids.push(invalid);
    }

    ids
}

/// Returns the first message id of a value.
pub fn parse_id(value: &str) -> Option<String> {
    parse_ids(value).into_iter().next()
}

/// Checks that `id` (with or without angle brackets) is `left@right` with no
/// whitespace, control characters or nested brackets.
pub fn is_valid_message_id(id: &str) -> bool {
    let id = id
        .strip_prefix('<')
        .and_then(|id| id.strip_suffix('>'))
        .unwrap_or(id);

    match id.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !id
                    .chars()
                    .any(|ch| ch.is_whitespace() || ch.is_control() || matches!(ch, '<' | '>'))
        }
        None => false,
    }
}
