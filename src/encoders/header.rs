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

use crate::{
    core::content_type::quote_param,
    parsers::fields::{address::parse_address_groups, params::parse_parameterized},
    Address, EncoderConfig, Error, HeaderName, Result,
};

use super::encoded_word::{encode_unstructured, encode_words, is_header_safe, max_word_length};

/// Emits a header line terminated by CRLF, encoding non-ASCII text and
/// folding lines longer than the configured limit.
///
/// Values over `max_header_length` bytes are written unfolded and
/// unencoded.
pub fn encode_header(name: &HeaderName, value: &str, config: &EncoderConfig) -> Result<String> {
    if !name.is_ascii() {
        return Err(Error::Encoding(format!(
            "header name {:?} is not ASCII",
            name.as_str()
        )));
    }

    let max_word = max_word_length(config.max_line_length);
    let value = if value.len() > config.max_header_length || is_header_safe(value) {
        value.to_string()
    } else if name.is_address() {
        encode_address_list(value, max_word)
    } else if name.is_parameterized() {
        encode_parameterized(value, max_word)
    } else {
        encode_unstructured(value, max_word)
    };

    let mut line = if value.len() > config.max_header_length || value.contains("\r\n") {
        format!("{name}: {value}")
    } else {
        fold(name.as_str(), &value, config.max_line_length)
    };
    line.push_str("\r\n");

    Ok(line)
}

fn encode_address_list(value: &str, max_word: usize) -> String {
    parse_address_groups(value)
        .iter()
        .map(|group| {
            let members = group
                .addresses
                .iter()
                .map(|address| encode_address(address, max_word))
                .collect::<Vec<_>>()
                .join(", ");
            match group.name.as_deref() {
                Some(name) if members.is_empty() => format!("{}:;", encode_phrase(name, max_word)),
                Some(name) => format!("{}: {members};", encode_phrase(name, max_word)),
                None => members,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes a display or group name as an atom run, a quoted string or
/// encoded words.
fn encode_phrase(name: &str, max_word: usize) -> String {
    if !is_header_safe(name) {
        encode_words(name, max_word).join(" ")
    } else if name
        .bytes()
        .all(|ch| ch.is_ascii_alphanumeric() || b" !#$%&'*+-/=?^_`{|}~".contains(&ch))
    {
        name.to_string()
    } else {
        quote_param(name)
    }
}

/// Encodes the display name and converts the domain to its ASCII form.
pub fn encode_address(address: &Address, max_word: usize) -> String {
    let addr_spec = match address.address.rsplit_once('@') {
        Some((local, domain)) if !domain.is_ascii() => match idna::domain_to_ascii(domain) {
            Ok(domain) => format!("{local}@{domain}"),
            Err(_) => address.address.clone(),
        },
        _ => address.address.clone(),
    };

    match address.name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => format!("{} <{addr_spec}>", encode_phrase(name, max_word)),
        None => addr_spec,
    }
}

fn encode_parameterized(value: &str, max_word: usize) -> String {
    let parsed = parse_parameterized(value);
    let mut result = parsed.value.unwrap_or_default();

    for (name, value) in parsed.params.iter() {
        result.push_str("; ");
        result.push_str(name);
        result.push('=');
        if is_header_safe(value) {
            result.push_str(&quote_param(value));
        } else {
            result.push('"');
            result.push_str(&encode_words(value, max_word).join(" "));
            result.push('"');
        }
    }

    result
}

/// Folds `name: value` at whitespace, preferring breaks that follow a `,`
/// or `;`, so that lines stay within `max_line` where possible.
pub fn fold(name: &str, value: &str, max_line: usize) -> String {
    let mut result = format!("{name}: ");
    let mut line_len = result.len();
    let mut rest = value;

    while line_len + rest.len() > max_line {
        let budget = max_line.saturating_sub(line_len);
        let breaks = rest
            .char_indices()
            .filter(|(pos, ch)| *pos > 0 && (*ch == ' ' || *ch == '\t'))
            .map(|(pos, _)| pos);

        let mut preferred = None;
        let mut fallback = None;
        let mut first_over = None;
        for pos in breaks {
            if pos > budget {
                first_over = Some(pos);
                break;
            }
            if matches!(rest.as_bytes()[pos - 1], b',' | b';') {
                preferred = Some(pos);
            }
            fallback = Some(pos);
        }

        let Some(pos) = preferred.or(fallback).or(first_over) else {
            break;
        };
        result.push_str(&rest[..pos]);
        result.push_str("\r\n");
        rest = &rest[pos..];
        line_len = 0;
    }

    result.push_str(rest);
    result
}
