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
    parsers::fields::{
        id::{is_valid_message_id, parse_id, parse_ids},
        thread::clean_subject,
    },
    ContentType, Error, Part, Result,
};

impl<'x> Part<'x> {
    /// Returns the `Message-Id` without angle brackets.
    pub fn message_id(&self) -> Result<Option<String>> {
        Ok(self.headers()?.get_raw("Message-Id").and_then(parse_id))
    }

    /// Sets the `Message-Id`, adding angle brackets when missing.
    pub fn set_message_id(&mut self, id: &str) -> Result<()> {
        let id = id.trim();
        if !is_valid_message_id(id) {
            return Err(Error::InvalidMessageId(id.to_string()));
        }
        let id = if id.starts_with('<') {
            id.to_string()
        } else {
            format!("<{id}>")
        };
        self.headers_mut()?.set("Message-Id", id);
        Ok(())
    }

    /// Returns the decoded `Subject`.
    pub fn subject(&self) -> Result<Option<String>> {
        Ok(self.headers()?.get_text("Subject"))
    }

    /// Returns the `Subject` without reply and forward prefixes.
    pub fn clean_subject(&self) -> Result<Option<String>> {
        Ok(self
            .subject()?
            .map(|subject| clean_subject(&subject).to_string()))
    }

    /// Returns the ids listed in `References`, or in `In-Reply-To` when there
    /// are none.
    pub fn references(&self) -> Result<Vec<String>> {
        let headers = self.headers()?;
        let ids = headers
            .get_all_raw("References")
            .into_iter()
            .flat_map(parse_ids)
            .collect::<Vec<_>>();

        Ok(if ids.is_empty() {
            headers
                .get_raw("In-Reply-To")
                .map(parse_ids)
                .unwrap_or_default()
        } else {
            ids
        })
    }

    /// Returns the file name from `Content-Disposition`, falling back to the
    /// `name` parameter of `Content-Type`.
    pub fn detected_file_name(&self) -> Result<Option<String>> {
        let (_, params) = self.content_disposition()?;
        let content_type = self.content_type();
        Ok(params
            .get("filename")
            .or_else(|| content_type.params().get("name"))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()))
    }

    /// Returns the content type guessed from the file name and, for generic
    /// binary, image and audio parts, from the leading bytes of the body.
    pub fn detected_content_type(&self) -> Result<ContentType> {
        let content_type = self.content_type().into_owned();
        if !content_type.is_singlepart() {
            return Ok(content_type);
        }

        if let Some(guessed) = self
            .detected_file_name()?
            .as_deref()
            .and_then(guess_by_extension)
        {
            return Ok(guessed);
        }

        if is_sniffable(&content_type) {
            if let Some(sniffed) = self
                .body()?
                .and_then(|body| refine_by_magic(&content_type, body.as_bytes()))
            {
                return Ok(sniffed);
            }
        }

        Ok(content_type)
    }

    pub fn detected_format(&self) -> Result<String> {
        self.detected_content_type()
            .map(|content_type| content_type.main().to_string())
    }

    pub fn detected_subtype(&self) -> Result<String> {
        self.detected_content_type()
            .map(|content_type| content_type.sub().to_string())
    }

    /// Returns `true` for text or message parts that are not named files.
    pub fn is_body(&self) -> Result<bool> {
        let content_type = self.content_type();
        Ok((content_type.is_text() || content_type.main() == "message")
            && self.detected_file_name()?.is_none())
    }

    pub fn is_attachment(&self) -> Result<bool> {
        Ok(self.content_disposition()?.0.as_deref() == Some("attachment"))
    }

    pub fn is_inline(&self) -> Result<bool> {
        Ok(self.content_disposition()?.0.as_deref() == Some("inline"))
    }

    /// Returns `true` for `multipart/report; report-type=delivery-status`.
    pub fn is_delivery_notification(&self) -> bool {
        let content_type = self.content_type();
        content_type.is("multipart", "report")
            && content_type
                .params()
                .get("report-type")
                .is_some_and(|report| report.eq_ignore_ascii_case("delivery-status"))
    }

    /// Returns the message enclosed by the first `message/rfc822` part of the
    /// tree.
    pub fn get_attached_message(&self) -> Option<&Part<'x>> {
        self.walk(true, false)
            .find(|part| part.content_type().is_message_container())
            .and_then(Part::enclosed)
    }

    /// Deletes every value of the listed headers.
    pub fn remove_headers(&mut self, names: &[&str]) -> Result<()> {
        let headers = self.headers_mut()?;
        for name in names {
            headers.delete(name);
        }
        Ok(())
    }
}

/// Guesses a content type from a file name extension.
pub(crate) fn guess_by_extension(file_name: &str) -> Option<ContentType> {
    let file_name = file_name.trim().to_ascii_lowercase();
    if file_name.ends_with(".bz2") {
        return Some(ContentType::new("application", "x-bzip2"));
    } else if file_name.ends_with(".gz") || file_name.ends_with(".tgz") {
        return Some(ContentType::new("application", "x-gzip"));
    }

    mime_guess::from_path(&file_name)
        .first()
        .and_then(|mime| split_mime(mime.essence_str()))
}

/// Guesses a content type from magic numbers.
pub(crate) fn sniff_content_type(bytes: &[u8]) -> Option<ContentType> {
    infer::get(bytes).and_then(|kind| split_mime(kind.mime_type()))
}

/// Returns the sniffed type of `bytes` when it may replace `declared`.
/// Generic binary types accept any match, image and audio types only a
/// match of the same main type.
pub(crate) fn refine_by_magic(declared: &ContentType, bytes: &[u8]) -> Option<ContentType> {
    let sniffed = sniff_content_type(bytes)?;
    match declared.main() {
        "image" | "audio" if sniffed.main() == declared.main() => Some(sniffed),
        _ if declared.is("application", "octet-stream") => Some(sniffed),
        _ => None,
    }
}

fn is_sniffable(content_type: &ContentType) -> bool {
    content_type.is("application", "octet-stream")
        || matches!(content_type.main(), "image" | "audio")
}

fn split_mime(value: &str) -> Option<ContentType> {
    value
        .split_once('/')
        .map(|(main, sub)| ContentType::new(main, sub))
}
