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

use std::borrow::Cow;

use crate::{
    decoders::{
        base64::decode_base64_word, charsets::decode_charset,
        quoted_printable::decode_quoted_printable_word,
    },
    Error, Result,
};

/// Removes folding line breaks, keeping the whitespace that follows them.
pub fn unfold(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        value.chars().filter(|ch| !matches!(ch, '\r' | '\n')).collect::<String>().into()
    } else {
        value.into()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EncodedWord<'x> {
    pub charset: &'x str,
    pub encoding: u8,
    pub text: &'x str,
    /// Byte length of the whole `=?...?=` sequence.
    pub len: usize,
}

/// Parses the encoded word starting at the beginning of `value`.
pub fn parse_encoded_word(value: &str) -> Option<EncodedWord<'_>> {
    let rest = value.strip_prefix("=?")?;
    let charset_end = rest.find('?')?;
    let charset = &rest[..charset_end];
    if charset.is_empty() || charset.contains(|ch: char| ch.is_ascii_whitespace()) {
        return None;
    }

    let rest = &rest[charset_end + 1..];
    let encoding = match rest.as_bytes() {
        [enc @ (b'b' | b'B' | b'q' | b'Q'), b'?', ..] => enc.to_ascii_lowercase(),
        _ => return None,
    };

    let rest = &rest[2..];
    let text_end = rest.find("?=")?;

    Some(EncodedWord {
        charset: charset.split('*').next().unwrap_or(charset),
        encoding,
        text: &rest[..text_end],
        len: 2 + charset_end + 1 + 2 + text_end + 2,
    })
}

impl EncodedWord<'_> {
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        if self.encoding == b'b' {
            decode_base64_word(self.text.as_bytes()).ok_or_else(|| {
                Error::Decoding(format!("invalid base64 in encoded word {:?}", self.text))
            })
        } else {
            Ok(decode_quoted_printable_word(self.text.as_bytes()))
        }
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
pub fn try_decode_header(value: &str) -> Result<String> {
    let value = unfold(value);
    if !value.contains("=?") {
        return Ok(value.into_owned());
    }

    let mut result = String::with_capacity(value.len());
    // Bytes of adjacent words sharing a charset are decoded together so
    // multi-byte characters split across words survive.
    let mut pending: Option<(&str, Vec<u8>)> = None;
    let mut gap_start = 0;
    let mut pos = 0;

    while pos < value.len() {
        let word = value[pos..]
            .starts_with("=?")
            .then(|| parse_encoded_word(&value[pos..]))
            .flatten();

        let Some(word) = word else {
            pos += value[pos..].chars().next().map_or(1, char::len_utf8);
            continue;
        };

        let gap = &value[gap_start..pos];
        let only_whitespace = gap.chars().all(|ch| ch == ' ' || ch == '\t');
        let bytes = word.decode_bytes()?;

        match &mut pending {
            Some((charset, buf))
                if only_whitespace && charset.eq_ignore_ascii_case(word.charset) =>
            {
                buf.extend_from_slice(&bytes);
            }
            _ => {
                if let Some((charset, buf)) = pending.take() {
                    result.push_str(&decode_charset(charset, &buf)?);
                    if !only_whitespace {
                        result.push_str(gap);
                    }
                } else {
                    result.push_str(gap);
                }
                pending = Some((word.charset, bytes));
            }
        }

        pos += word.len;
        gap_start = pos;
    }

    if let Some((charset, buf)) = pending {
        result.push_str(&decode_charset(charset, &buf)?);
    }
    result.push_str(&value[gap_start..]);

    Ok(result)
}

/// Decodes a header value, returning it unchanged when decoding fails.
pub fn decode_header(value: &str) -> String {
    try_decode_header(value).unwrap_or_else(|err| {
        tracing::warn!(value, error = %err, "Failed to decode header value");
        unfold(value).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_header, parse_encoded_word, try_decode_header};

    #[test]
    fn decode_rfc2047() {
        let inputs = [
            ("=?iso-8859-1?q?this=20is=20some=20text?=", "this is some text"),
            ("=?iso-8859-1?q?this is some text?=", "this is some text"),
            ("=?US-ASCII?Q?Keith_Moore?=", "Keith Moore"),
            ("=?iso_8859-1:1987?Q?Keld_J=F8rn_Simonsen?=", "Keld Jørn Simonsen"),
            ("=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?=", "If you can read this yo"),
            (
                "=?ISO-8859-2?B?dSB1bmRlcnN0YW5kIHRoZSBleGFtcGxlLg==?=",
                "u understand the example.",
            ),
            ("=?ISO-8859-1?Q?Olle_J=E4rnefors?=", "Olle Järnefors"),
            ("=?ISO-8859-1?Q?Patrik_F=E4ltstr=F6m?=", "Patrik Fältström"),
            ("=?ISO-8859-1*?Q?a?=", "a"),
            ("=?ISO-8859-1**?Q?a_b?=", "a b"),
            ("=?utf-8?b?VGjDrXMgw61zIHbDoWzDrWQgw5pURjg=?=", "Thís ís válíd ÚTF8"),
            (
                "=?utf-8*unknown?q?Th=C3=ADs_=C3=ADs_v=C3=A1l=C3=ADd_=C3=9ATF8?=",
                "Thís ís válíd ÚTF8",
            ),
            ("=?Iso-8859-6?Q?=E5=D1=CD=C8=C7 =C8=C7=E4=D9=C7=E4=E5?=", "مرحبا بالعالم"),
            ("=?Iso-8859-6*arabic?b?5dHNyMcgyMfk2cfk5Q==?=", "مرحبا بالعالم"),
            ("=?shift_jis?B?g26DjYFbgUWDj4Fbg4uDaA==?=", "ハロー・ワールド"),
            ("=?iso-2022-jp?q?=1B$B%O%m!<!&%o!<%k%I=1B(B?=", "ハロー・ワールド"),
            ("=?utf-8?B?0JbQtdC60LA=?= <ev@host.com>", "Жека <ev@host.com>"),
            ("=?utf-8?B?0JbQtdC60LA?= <ev@host.com>", "Жека <ev@host.com>"),
            ("=?utf-8?q?a?= =?utf-8?q?b?=", "ab"),
            ("=?utf-8?q?a?=\r\n  =?utf-8?q?b?=", "ab"),
            ("=?utf-8?q?a?= and =?utf-8?q?b?=", "a and b"),
            ("(=?ISO-8859-1?Q?a?= =?ISO-8859-2?Q?_b?=)", "(a b)"),
            ("=?utf-8?B?0J/RgNC4?= =?utf-8?B?0LLQtdGC?=", "Привет"),
            ("=?utf-8?B?0J/RgNC40LI=?= =?utf-8?B?0LXRgg==?=", "Привет"),
            ("=?utf-8?Q?=D0=9F=D1?= =?utf-8?Q?=80=D0=B8?=", "При"),
            ("plain\r\n text", "plain text"),
            ("=?broken", "=?broken"),
            ("a =? b ?= c", "a =? b ?= c"),
            ("=?utf-8?x?abc?=", "=?utf-8?x?abc?="),
        ];

        for (input, expected) in inputs {
            assert_eq!(decode_header(input), expected, "Failed for {input:?}");
        }
    }

    #[test]
    fn invalid_words_fall_back() {
        let input = "=?utf-8?B?!!!?= tail";
        assert!(try_decode_header(input).is_err());
        assert_eq!(decode_header(input), input);
    }

    #[test]
    fn word_boundaries() {
        let word = parse_encoded_word("=?utf-8*en?Q?abc?= rest").unwrap();
        assert_eq!(word.charset, "utf-8");
        assert_eq!(word.encoding, b'q');
        assert_eq!(word.text, "abc");
        assert_eq!(word.len, "=?utf-8*en?Q?abc?=".len());

        assert!(parse_encoded_word("=?utf 8?Q?abc?=").is_none());
        assert!(parse_encoded_word("=??Q?abc?=").is_none());
    }
}
