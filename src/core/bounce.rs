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
    decoders::charsets::bytes_to_string,
    parsers::{header::parse_headers, MessageStream},
    Body, Bounce, MimeHeaders, Part,
};

/// Headers found in delivery status notifications.
static BOUNCE_HEADERS: [&str; 8] = [
    "Action",
    "Content-Description",
    "Diagnostic-Code",
    "Final-Recipient",
    "Received",
    "Remote-Mta",
    "Reporting-Mta",
    "Status",
];

/// Header blocks read from a `message/delivery-status` body.
const MAX_STATUS_BLOCKS: usize = 3;

/// Default threshold of [`Part::is_bounce`].
pub const BOUNCE_PROBABILITY: f64 = 0.3;

impl Part<'_> {
    /// Returns the bounce signals of the tree, computed once.
    pub fn bounce(&self) -> &Bounce {
        self.bounce.get_or_init(|| detect_bounce(self))
    }

    pub fn is_bounce(&self) -> bool {
        self.is_bounce_with(BOUNCE_PROBABILITY)
    }

    /// Returns `true` when the bounce score exceeds `probability`.
    pub fn is_bounce_with(&self, probability: f64) -> bool {
        self.bounce().score > probability
    }
}

fn detect_bounce(message: &Part<'_>) -> Bounce {
    let mut collected: Vec<(&'static str, String)> = Vec::new();

    for part in message.walk(true, false) {
        match part.headers() {
            Ok(headers) => collect(&mut collected, headers),
            Err(err) => {
                tracing::debug!(error = %err, "skipping part with unreadable headers");
                continue;
            }
        }

        if part.content_type().is_delivery_status() {
            match part.body() {
                Ok(Some(body)) => collect_from_status(&mut collected, body),
                Ok(None) => (),
                Err(err) => tracing::debug!(error = %err, "unreadable delivery status"),
            }
        }
    }

    let found = BOUNCE_HEADERS
        .iter()
        .filter(|name| collected.iter().any(|(key, _)| key == *name))
        .count();

    Bounce {
        score: found as f64 / BOUNCE_HEADERS.len() as f64,
        status: collected
            .iter()
            .filter(|(key, _)| *key == "Status")
            .map(|(_, value)| value.trim())
            .find(|value| is_status_code(value))
            .map(str::to_string),
        notification: notification(message),
        diagnostic_code: collected
            .iter()
            .find(|(key, _)| *key == "Diagnostic-Code")
            .map(|(_, value)| value.clone()),
    }
}

fn collect(collected: &mut Vec<(&'static str, String)>, headers: &MimeHeaders) {
    for name in BOUNCE_HEADERS {
        if let Some(value) = headers.get_text(name) {
            collected.push((name, value));
        }
    }
}

fn collect_from_status(collected: &mut Vec<(&'static str, String)>, body: &Body) {
    let mut stream = MessageStream::new(body.as_bytes());

    for _ in 0..MAX_STATUS_BLOCKS {
        match parse_headers(&mut stream, usize::MAX, false) {
            Ok((headers, _)) => {
                for (name, value) in headers.iter() {
                    if let Some(known) = BOUNCE_HEADERS.into_iter().find(|known| *name == **known) {
                        collected.push((known, value.to_string()));
                    }
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "unreadable delivery status block");
                break;
            }
        }
        if stream.is_eof() {
            break;
        }
    }
}

/// Matches `\d\.\d+\.\d+` at the start of `value`.
fn is_status_code(value: &str) -> bool {
    let mut groups = value.splitn(3, '.');
    let (Some(class), Some(subject), Some(detail)) = (groups.next(), groups.next(), groups.next())
    else {
        return false;
    };
    let detail_digits = detail.bytes().take_while(u8::is_ascii_digit).count();

    class.len() == 1
        && class.bytes().all(|ch| ch.is_ascii_digit())
        && !subject.is_empty()
        && subject.bytes().all(|ch| ch.is_ascii_digit())
        && detail_digits > 0
}

fn notification(message: &Part<'_>) -> Option<String> {
    message
        .walk(false, false)
        .find(|part| {
            part.headers()
                .ok()
                .and_then(|headers| headers.get_text("Content-Description"))
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("notification"))
        })
        .and_then(|part| part.body().ok().flatten())
        .map(|body| match body {
            Body::Text(text) => text.clone(),
            Body::Binary(bytes) => bytes_to_string(bytes),
        })
}
