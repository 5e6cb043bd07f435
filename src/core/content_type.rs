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

use crate::{parsers::fields::params::parse_parameterized, ContentType, Parameterized, Params};

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a parameter by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` when the provided parameter name is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a parameter, replacing any previous value
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self
            .0
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            entry.1 = value;
        } else {
            self.0.push((name.to_ascii_lowercase(), value));
        }
    }

    /// Removes a parameter by name
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|pos| self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.set(&key.into(), value);
        }
        params
    }
}

impl Parameterized {
    pub fn new(value: impl Into<String>) -> Self {
        Parameterized {
            value: Some(value.into()),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.set(name, value);
        self
    }

    /// Returns ```true``` if the Content-Disposition type is "attachment"
    pub fn is_attachment(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("attachment"))
    }

    /// Returns ```true``` if the Content-Disposition type is "inline"
    pub fn is_inline(&self) -> bool {
        self.value
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("inline"))
    }
}

/// Normalizes a `Content-Type` value into a `(main, sub)` pair.
pub fn fix_content_type(value: Option<&str>) -> (String, String) {
    let value = value.unwrap_or_default().trim().to_ascii_lowercase();
    let mut segments = value.split('/').map(str::trim);

    match (segments.next(), segments.next()) {
        (None | Some(""), None) => ("text".into(), "plain".into()),
        (Some("text"), None) => ("text".into(), "plain".into()),
        (Some("html"), None) => ("text".into(), "html".into()),
        (Some(_), None) => ("application".into(), "octet-stream".into()),
        (Some(main), Some(sub)) if !main.is_empty() && !sub.is_empty() => {
            (main.to_string(), sub.to_string())
        }
        _ => ("application".into(), "octet-stream".into()),
    }
}

impl ContentType {
    pub fn new(main: impl AsRef<str>, sub: impl AsRef<str>) -> Self {
        ContentType {
            main: main.as_ref().to_ascii_lowercase(),
            sub: sub.as_ref().to_ascii_lowercase(),
            params: Params::new(),
        }
    }

    /// Parses a raw `Content-Type` header value.
    pub fn parse(value: &str) -> Self {
        Self::from_parameterized(parse_parameterized(value))
    }

    pub fn from_parameterized(value: Parameterized) -> Self {
        let (main, sub) = fix_content_type(value.value.as_deref());
        ContentType {
            main,
            sub,
            params: value.params,
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.set(name, value);
        self
    }

    /// Returns the type
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Returns the sub-type
    pub fn sub(&self) -> &str {
        &self.sub
    }

    /// Returns `type/subtype`
    pub fn value(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn is(&self, main: &str, sub: &str) -> bool {
        self.main == main && self.sub == sub
    }

    pub fn is_multipart(&self) -> bool {
        self.main == "multipart"
    }

    pub fn is_singlepart(&self) -> bool {
        !self.is_multipart() && !self.is_message_container() && !self.is_headers_container()
    }

    pub fn is_message_container(&self) -> bool {
        self.is("message", "rfc822")
    }

    pub fn is_delivery_status(&self) -> bool {
        self.is("message", "delivery-status")
    }

    pub fn is_feedback_report(&self) -> bool {
        self.is("message", "feedback-report")
    }

    pub fn is_disposition_notification(&self) -> bool {
        self.is("message", "disposition-notification")
    }

    /// Parts whose body is a bare header block.
    pub fn is_headers_container(&self) -> bool {
        self.is_feedback_report()
            || self.is_disposition_notification()
            || self.is("text", "rfc822-headers")
    }

    pub fn is_text(&self) -> bool {
        self.main == "text"
    }

    pub fn boundary(&self) -> Option<&str> {
        self.params.get("boundary").filter(|b| !b.is_empty())
    }

    /// Returns the delimiter line for this multipart, without line terminator.
    pub fn boundary_line(&self, is_final: bool) -> Option<String> {
        self.boundary().map(|boundary| {
            if is_final {
                format!("--{boundary}--")
            } else {
                format!("--{boundary}")
            }
        })
    }

    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset")
    }

    pub fn set_charset(&mut self, charset: &str) {
        self.params.set("charset", charset);
    }

    pub(crate) fn default_leaf() -> Self {
        ContentType::new("text", "plain").with_param("charset", "ascii")
    }
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::new("text", "plain")
    }
}

/// Quotes a parameter value when it is not a plain token.
pub(crate) fn quote_param(value: &str) -> String {
    if !value.is_empty()
        && value
            .bytes()
            .all(|ch| ch.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&ch))
    {
        value.to_string()
    } else {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for ch in value.chars() {
            if matches!(ch, '"' | '\\') {
                quoted.push('\\');
            }
            quoted.push(ch);
        }
        quoted.push('"');
        quoted
    }
}

pub(crate) fn write_params(f: &mut impl fmt::Write, params: &Params) -> fmt::Result {
    for (name, value) in params.iter() {
        write!(f, "; {}={}", name, quote_param(value))?;
    }
    Ok(())
}

impl Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)?;
        write_params(f, &self.params)
    }
}

impl Display for Parameterized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(value) = &self.value {
            f.write_str(value)?;
        }
        write_params(f, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use crate::ContentType;

    use super::fix_content_type;

    #[test]
    fn content_type_fixups() {
        let inputs = [
            (None, ("text", "plain")),
            (Some(""), ("text", "plain")),
            (Some("text"), ("text", "plain")),
            (Some("HTML"), ("text", "html")),
            (Some("pdf"), ("application", "octet-stream")),
            (Some("Text/HTML"), ("text", "html")),
            (Some(" image/png "), ("image", "png")),
            (Some("text/plain/extra"), ("text", "plain")),
            (Some("text/"), ("application", "octet-stream")),
        ];

        for (input, (main, sub)) in inputs {
            assert_eq!(
                fix_content_type(input),
                (main.to_string(), sub.to_string()),
                "Failed for {input:?}"
            );
        }
    }

    #[test]
    fn content_type_predicates() {
        let inputs = [
            ("multipart/mixed; boundary=abc", "mxxx"),
            ("message/rfc822", "_m__"),
            ("message/feedback-report", "__h_"),
            ("text/rfc822-headers", "__h_"),
            ("message/disposition-notification", "__h_"),
            ("message/delivery-status", "s__d"),
            ("text/plain", "s___"),
        ];

        for (input, flags) in inputs {
            let ct = ContentType::parse(input);
            let flags = flags.as_bytes();
            assert_eq!(ct.is_multipart(), flags[0] == b'm', "Failed for {input:?}");
            assert_eq!(ct.is_singlepart(), flags[0] == b's', "Failed for {input:?}");
            assert_eq!(ct.is_message_container(), flags[1] == b'm', "Failed for {input:?}");
            assert_eq!(ct.is_headers_container(), flags[2] == b'h', "Failed for {input:?}");
            assert_eq!(ct.is_delivery_status(), flags[3] == b'd', "Failed for {input:?}");
        }
    }

    #[test]
    fn content_type_display() {
        let mut ct = ContentType::parse("Multipart/Mixed; Boundary=\"a b\"");
        assert_eq!(ct.boundary(), Some("a b"));
        assert_eq!(ct.boundary_line(false).unwrap(), "--a b");
        assert_eq!(ct.boundary_line(true).unwrap(), "--a b--");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");

        ct = ContentType::parse("text/plain; charset=us-ascii");
        ct.set_charset("utf-8");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        assert!(ContentType::parse("multipart/mixed").boundary().is_none());
        assert!(ContentType::parse("multipart/mixed; boundary=\"\"")
            .boundary()
            .is_none());
    }
}
