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

//! Constructors for new parts.

use crate::{
    core::{
        content_type::quote_param,
        message::{guess_by_extension, refine_by_magic, sniff_content_type},
    },
    decoders::charsets::{decode_charset, fix_charset},
    from_bytes, Body, ContentType, MimeHeaders, Part,
};

/// Returns a random boundary of 32 hexadecimal digits.
pub fn make_boundary() -> String {
    format!("{:032x}", rand::random::<u128>())
}

fn new_headers(content_type: &ContentType) -> MimeHeaders {
    let mut headers = MimeHeaders::new();
    headers.add("Mime-Version", "1.0");
    headers.add("Content-Type", content_type.to_string());
    headers
}

fn add_disposition(
    headers: &mut MimeHeaders,
    disposition: Option<&str>,
    filename: Option<&str>,
) {
    let disposition = match (disposition, filename) {
        (Some(disposition), _) => disposition,
        (None, Some(_)) => "attachment",
        (None, None) => return,
    };
    match filename {
        Some(filename) => headers.add(
            "Content-Disposition",
            format!("{disposition}; filename={}", quote_param(filename)),
        ),
        None => headers.add("Content-Disposition", disposition),
    }
}

/// Creates an empty `multipart/<subtype>` part with a random boundary.
pub fn multipart(subtype: &str) -> Part<'static> {
    let content_type = ContentType::new("multipart", subtype).with_param("boundary", make_boundary());
    Part::synth(new_headers(&content_type), None)
}

/// Creates a `text/<subtype>` part.
///
/// The charset defaults to `utf-8` and is narrowed to `ascii` when the body
/// is plain ASCII. A file name implies an `attachment` disposition and is
/// also set as the `name` of the content type.
pub fn text(
    subtype: &str,
    body: &str,
    charset: Option<&str>,
    disposition: Option<&str>,
    filename: Option<&str>,
) -> Part<'static> {
    let charset = match charset.unwrap_or("utf-8") {
        charset if fix_charset(charset) == "utf-8" && body.is_ascii() => "ascii",
        charset => charset,
    };
    let mut content_type = ContentType::new("text", subtype).with_param("charset", charset);
    if let Some(filename) = filename {
        content_type.params_mut().set("name", filename);
    }

    let mut headers = new_headers(&content_type);
    add_disposition(&mut headers, disposition, filename);
    Part::synth(headers, Some(Body::Text(body.to_string())))
}

/// Creates a part of any type holding raw bytes.
pub fn binary(
    main: &str,
    sub: &str,
    body: &[u8],
    filename: Option<&str>,
    disposition: Option<&str>,
    charset: Option<&str>,
) -> Part<'static> {
    let mut content_type = ContentType::new(main, sub);
    if let Some(charset) = charset {
        content_type.set_charset(charset);
    }
    if let Some(filename) = filename {
        content_type.params_mut().set("name", filename);
    }

    let mut headers = new_headers(&content_type);
    add_disposition(&mut headers, disposition, filename);
    Part::synth(headers, Some(Body::Binary(body.to_vec())))
}

/// Creates an attachment, inferring a missing or generic content type from
/// the file name or the leading bytes of `body`. Declared image and audio
/// subtypes are corrected from the leading bytes as well.
///
/// `message/*` bodies are scanned and wrapped in a message container;
/// bodies that fail to scan are attached as `application/octet-stream`.
pub fn attachment<'x>(
    content_type: &str,
    body: &'x [u8],
    filename: Option<&str>,
    disposition: Option<&str>,
    charset: Option<&str>,
) -> Part<'x> {
    let declared = match content_type.trim() {
        "" => ContentType::new("application", "octet-stream"),
        value => ContentType::parse(value),
    };
    let content_type = if declared.is("application", "octet-stream") {
        filename
            .and_then(guess_by_extension)
            .or_else(|| sniff_content_type(body))
            .unwrap_or(declared)
    } else {
        refine_by_magic(&declared, body).unwrap_or(declared)
    };

    match content_type.main() {
        "message" => match from_bytes(body) {
            Ok(message) => {
                let mut headers = new_headers(&ContentType::new("message", "rfc822"));
                add_disposition(&mut headers, disposition, filename);
                let mut container = Part::synth(headers, None);
                container.enclose(message);
                container
            }
            Err(err) => {
                tracing::debug!(error = %err, "attaching unreadable message as binary");
                binary("application", "octet-stream", body, filename, disposition, None)
            }
        },
        "text" => match decode_charset(charset.unwrap_or("utf-8"), body) {
            Ok(decoded) => text(content_type.sub(), &decoded, charset, disposition, filename),
            Err(_) => binary("text", content_type.sub(), body, filename, disposition, charset),
        },
        main => binary(main, content_type.sub(), body, filename, disposition, charset),
    }
}

/// Wraps `part` in a `message/rfc822` container.
pub fn message_container(part: Part<'_>) -> Part<'_> {
    let mut container = Part::synth(new_headers(&ContentType::new("message", "rfc822")), None);
    container.enclose(part);
    container
}

#[cfg(test)]
mod tests {
    use crate::{attachment, binary, from_bytes, message_container, multipart, text, Body};

    #[test]
    fn text_parts() {
        for (body, charset, expected) in [
            ("hello", None, "text/plain; charset=ascii"),
            ("привет", None, "text/plain; charset=utf-8"),
            ("hello", Some("utf-8"), "text/plain; charset=ascii"),
            ("hello", Some("iso-8859-1"), "text/plain; charset=iso-8859-1"),
        ] {
            let part = text("plain", body, charset, None, None);
            assert_eq!(
                part.headers().unwrap().get_raw("content-type"),
                Some(expected),
                "Failed for {body:?}"
            );
            assert_eq!(
                part.body().unwrap().and_then(Body::as_text),
                Some(body),
                "Failed for {body:?}"
            );
            assert!(part.is_root());
        }

        let part = text("html", "<p/>", None, None, Some("page.html"));
        let headers = part.headers().unwrap();
        assert_eq!(
            headers.keys().map(|name| name.as_str()).collect::<Vec<_>>(),
            ["Mime-Version", "Content-Type", "Content-Disposition"]
        );
        assert_eq!(
            headers.get_raw("Content-Type"),
            Some("text/html; charset=ascii; name=page.html")
        );
        assert_eq!(
            headers.get_raw("Content-Disposition"),
            Some("attachment; filename=page.html")
        );
        assert!(part.is_attachment().unwrap());
    }

    #[test]
    fn multipart_boundaries() {
        let first = multipart("mixed");
        let second = multipart("mixed");
        let boundary = first.content_type().boundary().unwrap().to_string();

        assert_eq!(boundary.len(), 32);
        assert!(boundary.bytes().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(second.content_type().boundary(), Some(boundary.as_str()));
        assert!(first.body().unwrap().is_none());
    }

    #[test]
    fn attachments() {
        let part = attachment("", b"%PDF-1.4 ...", None, None, None);
        assert_eq!(part.content_type().value(), "application/pdf");

        let part = attachment("", b"data", Some("photo.png"), Some("inline"), None);
        assert_eq!(part.content_type().value(), "image/png");
        assert!(part.is_inline().unwrap());
        assert_eq!(
            part.detected_file_name().unwrap().as_deref(),
            Some("photo.png")
        );

        let part = attachment("text/plain", b"caf\xe9", None, None, Some("iso-8859-1"));
        assert_eq!(part.body().unwrap().and_then(Body::as_text), Some("café"));

        let part = attachment("", b"ID3\x03\x00\x00\x00\x00\x00\x0a", None, None, None);
        assert_eq!(part.content_type().value(), "audio/mpeg");

        let jfif = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01";
        let part = attachment("image/png", jfif, Some("photo.png"), None, None);
        assert_eq!(part.content_type().value(), "image/jpeg");
        assert_eq!(
            part.detected_file_name().unwrap().as_deref(),
            Some("photo.png")
        );

        let message = b"Subject: inner\r\n\r\nhello\r\n";
        let part = attachment("message/rfc822", message, None, None, None);
        assert_eq!(part.content_type().value(), "message/rfc822");
        assert_eq!(part.headers().unwrap().get_raw("Content-Disposition"), None);
        let enclosed = part.enclosed().unwrap();
        assert!(!enclosed.is_root());
        assert_eq!(enclosed.subject().unwrap().as_deref(), Some("inner"));

        let part = attachment(
            "message/rfc822",
            message,
            Some("fwd.eml"),
            Some("inline"),
            None,
        );
        assert_eq!(
            part.headers().unwrap().get_raw("Content-Disposition"),
            Some("inline; filename=fwd.eml")
        );
        assert!(part.is_inline().unwrap());
        assert_eq!(
            part.enclosed().unwrap().subject().unwrap().as_deref(),
            Some("inner")
        );
    }

    #[test]
    fn build_and_scan() {
        let mut root = multipart("mixed");
        root.append(text("plain", "Сообщение", None, None, None));
        root.append(binary("image", "gif", b"GIF89a", Some("dot.gif"), None, None));
        root.append(message_container(text("plain", "inner", None, None, None)));

        let output = root.to_bytes().unwrap();
        let message = from_bytes(&output).unwrap();
        let parts = message.parts();

        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0].body().unwrap().and_then(Body::as_text),
            Some("Сообщение")
        );
        assert_eq!(
            parts[1].body().unwrap(),
            Some(&Body::Binary(b"GIF89a".to_vec()))
        );
        assert_eq!(
            parts[1].detected_file_name().unwrap().as_deref(),
            Some("dot.gif")
        );
        assert_eq!(
            parts[2].enclosed().unwrap().body().unwrap().and_then(Body::as_text),
            Some("inner")
        );
    }
}
