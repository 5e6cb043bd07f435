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

//! Boundary-aware MIME tokenizer.
//!
//! A single pass over the input lines emits the `Content-Type` headers and
//! boundary lines that shape the MIME tree. Content types found inside
//! bodies and boundary lines that do not belong to an open multipart are
//! filtered out by tracking which section of the message each line is in.

use crate::{ContentType, Error, MessageParser, Result};

use super::{header::is_header_line, preceding_newline, Line, MessageStream};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A `Content-Type` header starting a part, parsed.
    ContentType { start: usize, value: ContentType },
    /// A delimiter line. `start` is the offset of the line terminator that
    /// precedes it, `line_end` the end of the delimiter text and `end` the
    /// offset of the next line.
    Boundary {
        start: usize,
        line_end: usize,
        end: usize,
        value: String,
        is_final: bool,
    },
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    /// `longest` is the longest physical line of the folded header.
    ContentType {
        start: usize,
        end: usize,
        longest: Line,
    },
    Boundary(Line),
    Empty(Line),
    Continuation(Line),
    Header { line: Line, is_ascii_name: bool },
    Other(Line),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingSection {
    Multipart,
    Message,
    HeadersContainer,
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Headers {
        next: Option<PendingSection>,
        nested: bool,
        is_first: bool,
    },
    Body,
    MultipartPreamble,
    MultipartEpilogue,
}

impl Section {
    fn headers(nested: bool) -> Self {
        Section::Headers {
            next: None,
            nested,
            is_first: true,
        }
    }
}

struct Lexer<'x> {
    stream: MessageStream<'x>,
}

impl<'x> Lexer<'x> {
    fn next_lexeme(&mut self) -> Option<Lexeme> {
        let line = self.stream.next_line()?;
        let bytes = self.stream.line_bytes(&line);

        Some(match bytes {
            [] => Lexeme::Empty(line),
            [b'-', b'-', ..] if line.start > 0 => Lexeme::Boundary(line),
            [b' ' | b'\t', ..] => Lexeme::Continuation(line),
            _ if is_content_type(bytes) => {
                // Grab folded continuation lines.
                let mut end = line.content_end;
                let mut longest = line;
                loop {
                    self.stream.checkpoint();
                    match self.stream.next_line() {
                        Some(next)
                            if matches!(
                                self.stream.line_bytes(&next).first(),
                                Some(b' ' | b'\t')
                            ) =>
                        {
                            end = next.content_end;
                            if next.len() > longest.len() {
                                longest = next;
                            }
                        }
                        _ => {
                            self.stream.restore();
                            break;
                        }
                    }
                }
                Lexeme::ContentType {
                    start: line.start,
                    end,
                    longest,
                }
            }
            _ if is_header_line(bytes) => Lexeme::Header {
                line,
                is_ascii_name: bytes
                    .iter()
                    .take_while(|&&ch| ch != b':')
                    .all(|ch| ch.is_ascii()),
            },
            _ => Lexeme::Other(line),
        })
    }
}

fn is_content_type(line: &[u8]) -> bool {
    line.len() > 13
        && line[..12].eq_ignore_ascii_case(b"content-type")
        && line[12..]
            .iter()
            .find(|ch| !matches!(ch, b' ' | b'\t'))
            .is_some_and(|&ch| ch == b':')
}

/// Produces the filtered token stream of a message.
pub fn tokenize(data: &[u8], parser: &MessageParser) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        stream: MessageStream::new(data),
    };
    let mut tokens = Vec::new();
    let mut boundaries: Vec<String> = Vec::new();
    let mut section = Section::headers(false);

    while let Some(lexeme) = lexer.next_lexeme() {
        if let Section::Headers {
            nested: false,
            ..
        } = section
        {
            if let Some(line) = lexeme_line(&lexeme) {
                if line.len() > parser.max_header_line && parser.strict {
                    return Err(Error::MalformedHeaders(format!(
                        "line of {} bytes at offset {} exceeds the {} bytes limit",
                        line.len(),
                        line.start,
                        parser.max_header_line
                    )));
                }
            }
        }

        match lexeme {
            Lexeme::ContentType { start, end, .. } => {
                let Section::Headers { next, nested, .. } = section else {
                    continue;
                };
                let first_seen = next.is_none();
                section = Section::Headers {
                    next,
                    nested,
                    is_first: false,
                };
                if !first_seen && !nested {
                    continue;
                }

                let value = content_type_value(&data[start..end]);
                if !nested {
                    let next = if value.is_multipart() {
                        if let Some(boundary) = value.boundary() {
                            boundaries.push(boundary.to_string());
                            PendingSection::Multipart
                        } else {
                            PendingSection::Leaf
                        }
                    } else if value.is_message_container() {
                        PendingSection::Message
                    } else if value.is_headers_container() {
                        PendingSection::HeadersContainer
                    } else {
                        PendingSection::Leaf
                    };
                    section = Section::Headers {
                        next: Some(next),
                        nested,
                        is_first: false,
                    };
                }
                tokens.push(Token::ContentType { start, value });
            }
            Lexeme::Boundary(line) => {
                let text = trim_end(&data[line.start + 2..line.content_end]);
                let Some((depth, is_final)) = match_boundary(&boundaries, text) else {
                    if matches!(section, Section::Headers { .. }) {
                        section = Section::Body;
                    }
                    continue;
                };

                let value = if is_final {
                    boundaries.truncate(depth);
                    section = Section::MultipartEpilogue;
                    &text[..text.len() - 2]
                } else {
                    boundaries.truncate(depth + 1);
                    section = Section::headers(false);
                    text
                };

                tokens.push(Token::Boundary {
                    start: preceding_newline(data, line.start),
                    line_end: line.start + 2 + text.len(),
                    end: line.end,
                    value: String::from_utf8_lossy(value).into_owned(),
                    is_final,
                });
            }
            Lexeme::Empty(_) => {
                if let Section::Headers { next, nested, .. } = section {
                    section = match (nested, next) {
                        (true, _) => Section::Body,
                        (false, Some(PendingSection::Multipart)) => Section::MultipartPreamble,
                        (false, Some(PendingSection::Message)) => Section::headers(false),
                        (false, Some(PendingSection::HeadersContainer)) => Section::headers(true),
                        (false, Some(PendingSection::Leaf) | None) => Section::Body,
                    };
                }
            }
            Lexeme::Header {
                line,
                is_ascii_name,
            } => {
                if let Section::Headers { next, nested, .. } = section {
                    if !is_ascii_name && !nested && parser.strict {
                        let name = data[line.start..line.content_end]
                            .split(|&ch| ch == b':')
                            .next()
                            .unwrap_or_default();
                        return Err(Error::NonAsciiHeaderName(
                            String::from_utf8_lossy(name).trim().to_string(),
                        ));
                    }
                    section = Section::Headers {
                        next,
                        nested,
                        is_first: false,
                    };
                }
            }
            Lexeme::Other(line) => {
                if let Section::Headers {
                    next,
                    nested,
                    is_first,
                } = section
                {
                    section = if is_first && data[line.start..].starts_with(b"From ") {
                        Section::Headers {
                            next,
                            nested,
                            is_first: false,
                        }
                    } else {
                        Section::Body
                    };
                }
            }
            Lexeme::Continuation(_) => (),
        }
    }

    tokens.push(Token::End);

    tracing::debug!(tokens = tokens.len(), "Tokenized message");

    Ok(tokens)
}

fn lexeme_line(lexeme: &Lexeme) -> Option<Line> {
    match lexeme {
        Lexeme::Header { line, .. }
        | Lexeme::Other(line)
        | Lexeme::Boundary(line)
        | Lexeme::Continuation(line)
        | Lexeme::ContentType { longest: line, .. } => Some(*line),
        Lexeme::Empty(_) => None,
    }
}

fn content_type_value(bytes: &[u8]) -> ContentType {
    let text = String::from_utf8_lossy(bytes);
    let value = text.split_once(':').map_or("", |(_, value)| value);
    ContentType::parse(value)
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let len = bytes
        .iter()
        .rposition(|ch| !matches!(ch, b' ' | b'\t'))
        .map_or(0, |pos| pos + 1);
    &bytes[..len]
}

/// Looks `text` up in the boundary stack, innermost first. Returns the stack
/// depth of the match and whether it closes the multipart.
fn match_boundary(boundaries: &[String], text: &[u8]) -> Option<(usize, bool)> {
    boundaries.iter().enumerate().rev().find_map(|(depth, boundary)| {
        let boundary = boundary.as_bytes();
        if text == boundary {
            Some((depth, false))
        } else if text.len() == boundary.len() + 2
            && text.starts_with(boundary)
            && text.ends_with(b"--")
        {
            Some((depth, true))
        } else {
            None
        }
    })
}
