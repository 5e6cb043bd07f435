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

use std::fmt::{self, Display};

use crate::{
    decoders::encoded_word::decode_header,
    parsers::fields::{address::parse_address_list, params::parse_parameterized},
    Address, ContentType, HeaderName, HeaderValue, MimeHeaders, Parameterized,
};

/// Converts a header name to `Title-Case`, using `-` as the word separator.
pub fn canonicalize(name: &str) -> String {
    let mut result = String::with_capacity(name.len());

    for (idx, word) in name.split('-').enumerate() {
        if idx > 0 {
            result.push('-');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            for ch in chars {
                result.extend(ch.to_lowercase());
            }
        }
    }

    result
}

impl HeaderName {
    pub fn new(name: impl AsRef<str>) -> Self {
        HeaderName(canonicalize(name.as_ref()))
    }

    /// Returns the canonical header name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ascii(&self) -> bool {
        self.0.is_ascii()
    }

    /// Returns `true` for headers carrying `; name=value` parameters.
    pub fn is_parameterized(&self) -> bool {
        matches!(
            self.0.as_str(),
            "Content-Type" | "Content-Disposition" | "Content-Transfer-Encoding"
        )
    }

    /// Returns `true` for headers holding a list of mailboxes.
    pub fn is_address(&self) -> bool {
        matches!(
            self.0.as_str(),
            "From"
                | "To"
                | "Cc"
                | "Bcc"
                | "Reply-To"
                | "Sender"
                | "Delivered-To"
                | "Resent-From"
                | "Resent-To"
                | "Resent-Cc"
                | "Resent-Bcc"
                | "Resent-Sender"
        )
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        HeaderName::new(name)
    }
}

impl From<String> for HeaderName {
    fn from(name: String) -> Self {
        HeaderName::new(name)
    }
}

impl AsRef<str> for HeaderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for HeaderName {
    fn eq(&self, other: &str) -> bool {
        self.0 == canonicalize(other)
    }
}

impl PartialEq<&str> for HeaderName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == canonicalize(other)
    }
}

impl Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Unstructured(text) => Some(text),
            HeaderValue::Parameterized(params) => params.value.as_deref(),
            HeaderValue::AddressList(_) => None,
        }
    }

    pub fn as_parameterized(&self) -> Option<&Parameterized> {
        match self {
            HeaderValue::Parameterized(params) => Some(params),
            _ => None,
        }
    }

    pub fn as_address_list(&self) -> Option<&[Address]> {
        match self {
            HeaderValue::AddressList(list) => Some(list),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            HeaderValue::Unstructured(text) => Some(text),
            HeaderValue::Parameterized(params) => params.value,
            HeaderValue::AddressList(_) => None,
        }
    }
}

fn remove_newlines(value: &str) -> String {
    value.chars().filter(|ch| !matches!(ch, '\r' | '\n')).collect()
}

impl MimeHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: Vec<(HeaderName, String)>) -> Self {
        MimeHeaders {
            entries,
            changed: false,
            num_prepends: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = HeaderName::new(name);
        self.entries.iter().any(|(key, _)| key == &name)
    }

    /// Returns the first raw value of a header
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        let name = HeaderName::new(name);
        self.entries
            .iter()
            .find(|(key, _)| key == &name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns all the raw values of a header
    pub fn get_all_raw(&self, name: &str) -> Vec<&str> {
        let name = HeaderName::new(name);
        self.entries
            .iter()
            .filter(|(key, _)| key == &name)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// Returns the first value of a header, decoded according to its name.
    pub fn get(&self, name: &str) -> Option<HeaderValue> {
        let raw = self.get_raw(name)?;
        let name = HeaderName::new(name);

        Some(if name.is_parameterized() {
            let mut value = parse_parameterized(raw);
            if name == "Content-Type" {
                value.value = Some(ContentType::from_parameterized(value.clone()).value());
            }
            HeaderValue::Parameterized(value)
        } else {
            HeaderValue::Unstructured(decode_header(raw))
        })
    }

    /// Returns the first value of a header with encoded words decoded
    pub fn get_text(&self, name: &str) -> Option<String> {
        self.get_raw(name).map(decode_header)
    }

    /// Returns all the values of a header with encoded words decoded
    pub fn get_all(&self, name: &str) -> Vec<String> {
        self.get_all_raw(name).into_iter().map(decode_header).collect()
    }

    /// Returns the first value of a header parsed as a parameterized value
    pub fn get_params(&self, name: &str) -> Option<Parameterized> {
        self.get_raw(name).map(parse_parameterized)
    }

    /// Returns the mailboxes listed in all the values of an address header
    pub fn get_addresses(&self, name: &str) -> Option<Vec<Address>> {
        let values = self.get_all_raw(name);
        if values.is_empty() {
            return None;
        }
        Some(
            values
                .into_iter()
                .flat_map(parse_address_list)
                .map(|address| Address {
                    name: address.name.as_deref().map(decode_header),
                    address: address.address,
                })
                .collect(),
        )
    }

    /// Replaces every value of `name` with `value`. Missing headers are
    /// prepended.
    pub fn set(&mut self, name: &str, value: impl AsRef<str>) {
        let name = HeaderName::new(name);
        let value = remove_newlines(value.as_ref());

        if let Some(pos) = self.entries.iter().position(|(key, _)| key == &name) {
            self.entries[pos].1 = value;
            let mut idx = 0;
            self.entries.retain(|(key, _)| {
                let keep = idx <= pos || key != &name;
                idx += 1;
                keep
            });
            self.changed = true;
        } else {
            self.entries.insert(0, (name, value));
            self.num_prepends += 1;
        }
    }

    /// Inserts a header at the top.
    pub fn prepend(&mut self, name: &str, value: impl AsRef<str>) {
        self.entries
            .insert(0, (HeaderName::new(name), remove_newlines(value.as_ref())));
        self.num_prepends += 1;
    }

    /// Appends a header at the bottom.
    pub fn add(&mut self, name: &str, value: impl AsRef<str>) {
        self.entries
            .push((HeaderName::new(name), remove_newlines(value.as_ref())));
        self.changed = true;
    }

    /// Removes every value of `name`, returns whether anything was removed.
    pub fn delete(&mut self, name: &str) -> bool {
        let name = HeaderName::new(name);
        let len = self.entries.len();
        self.entries.retain(|(key, _)| key != &name);

        if self.entries.len() != len {
            self.changed = true;
            true
        } else {
            false
        }
    }

    /// Rewrites every header through `fnc`.
    pub fn transform<F>(&mut self, mut fnc: F)
    where
        F: FnMut(&HeaderName, &str) -> (String, String),
    {
        self.entries = self
            .entries
            .iter()
            .map(|(key, value)| {
                let (key, value) = fnc(key, value);
                (HeaderName::new(key), remove_newlines(&value))
            })
            .collect();
        self.changed = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(key, value)| (key, value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &HeaderName> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn num_prepends(&self) -> usize {
        self.num_prepends
    }

    /// Returns whether the headers were modified. Prepended headers only
    /// count when `ignore_prepends` is false.
    pub fn have_changed(&self, ignore_prepends: bool) -> bool {
        self.changed || (!ignore_prepends && self.num_prepends > 0)
    }

    pub(crate) fn prepended(&self) -> &[(HeaderName, String)] {
        &self.entries[..self.num_prepends.min(self.entries.len())]
    }
}

impl<'a> IntoIterator for &'a MimeHeaders {
    type Item = &'a (HeaderName, String);
    type IntoIter = std::slice::Iter<'a, (HeaderName, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::{HeaderName, HeaderValue, MimeHeaders};

    use super::canonicalize;

    #[test]
    fn canonical_names() {
        let inputs = [
            ("content-type", "Content-Type"),
            ("CONTENT-TYPE", "Content-Type"),
            ("message-id", "Message-Id"),
            ("MIME-Version", "Mime-Version"),
            ("x-spam--flag", "X-Spam--Flag"),
            ("subject", "Subject"),
            ("", ""),
            ("dkim-signature", "Dkim-Signature"),
        ];

        for (input, expected) in inputs {
            let once = canonicalize(input);
            assert_eq!(once, expected, "Failed for {input:?}");
            assert_eq!(canonicalize(&once), once, "Failed for {input:?}");
        }

        assert_eq!(HeaderName::new("REPLY-to"), "reply-TO");
        assert!(HeaderName::new("content-disposition").is_parameterized());
        assert!(HeaderName::new("delivered-to").is_address());
        assert!(!HeaderName::new("subject").is_address());
    }

    fn sample() -> MimeHeaders {
        let mut headers = MimeHeaders::new();
        headers.add("Received", "from a");
        headers.add("Subject", "=?utf-8?B?0J/RgNC40LLQtdGC?= world");
        headers.add("received", "from b");
        headers.add("Content-Type", "TEXT/Plain; Charset=\"UTF-8\"");
        headers.changed = false;
        headers
    }

    #[test]
    fn lookups() {
        let headers = sample();

        for name in ["subject", "SUBJECT", "Subject", "sUbJeCt"] {
            assert_eq!(
                headers.get_text(name).as_deref(),
                Some("Привет world"),
                "Failed for {name:?}"
            );
        }
        assert_eq!(headers.get_raw("received"), Some("from a"));
        assert_eq!(headers.get_all("RECEIVED"), vec!["from a", "from b"]);
        assert_eq!(headers.get_raw("X-Missing"), None);
        assert!(headers.get("X-Missing").is_none());

        match headers.get("content-type") {
            Some(HeaderValue::Parameterized(value)) => {
                assert_eq!(value.value.as_deref(), Some("text/plain"));
                assert_eq!(value.params.get("charset"), Some("UTF-8"));
            }
            other => panic!("Unexpected value {other:?}"),
        }
    }

    #[test]
    fn mutations() {
        let mut headers = sample();
        assert!(!headers.have_changed(false));

        headers.prepend("X-Trace", "one\r\n two");
        assert!(headers.have_changed(false));
        assert!(!headers.have_changed(true));
        assert_eq!(headers.keys().next().unwrap().as_str(), "X-Trace");
        assert_eq!(headers.get_raw("x-trace"), Some("one two"));
        assert_eq!(headers.prepended().len(), 1);

        headers.set("received", "from c");
        assert!(headers.have_changed(true));
        assert_eq!(headers.get_all_raw("Received"), vec!["from c"]);
        assert_eq!(
            headers.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["X-Trace", "Received", "Subject", "Content-Type"]
        );

        headers.set("X-New", "value");
        assert_eq!(headers.num_prepends(), 2);
        assert_eq!(headers.keys().next().unwrap().as_str(), "X-New");

        assert!(headers.delete("x-new"));
        assert!(!headers.delete("x-new"));

        headers.add("X-Last", "tail");
        assert_eq!(headers.keys().last().unwrap().as_str(), "X-Last");

        headers.transform(|name, value| (name.as_str().to_lowercase(), value.to_uppercase()));
        assert_eq!(headers.get_raw("X-LAST"), Some("TAIL"));
        assert_eq!(headers.keys().last().unwrap().as_str(), "X-Last");
    }

    #[test]
    fn address_lookup() {
        let mut headers = MimeHeaders::new();
        headers.add(
            "To",
            "=?utf-8?B?0JbQtdC60LA=?= <ev@host.com>, \"Doe, John\" <john@example.com>",
        );
        headers.add("to", "bare@example.org");

        let addresses = headers.get_addresses("TO").unwrap();
        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[0].name.as_deref(), Some("Жека"));
        assert_eq!(addresses[0].address, "ev@host.com");
        assert_eq!(addresses[1].name.as_deref(), Some("Doe, John"));
        assert_eq!(addresses[2].name, None);
        assert_eq!(addresses[2].address, "bare@example.org");
        assert!(headers.get_addresses("Cc").is_none());
    }
}
