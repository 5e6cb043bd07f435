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

//! Builds the `Part` tree from the token stream.

use crate::{ContentType, Error, MessageParser, Part, Result};

use super::{
    tokenizer::{tokenize, Token},
    MessageStream,
};

struct Scanner<'x> {
    data: &'x [u8],
    tokens: Vec<Token>,
    pos: usize,
    steps: usize,
    parser: MessageParser,
}

/// Scans `data` into a tree of parts. The root always spans the whole input.
pub fn scan(data: &[u8], parser: MessageParser) -> Result<Part<'_>> {
    let mut scanner = Scanner {
        data,
        tokens: tokenize(data, &parser)?,
        pos: 0,
        steps: 0,
        parser,
    };

    let mut root = scanner.traverse(0)?;
    root.set_range(0..data.len());
    root.is_root = true;

    tracing::debug!(
        bytes = data.len(),
        steps = scanner.steps,
        parts = root.walk(true, false).count(),
        "Scanned message"
    );

    Ok(root)
}

impl<'x> Scanner<'x> {
    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::End)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.parser.max_steps {
            Err(Error::TooManyParts(self.parser.max_steps))
        } else {
            Ok(())
        }
    }

    /// Offset where a leaf starting at `start` ends: right before the line
    /// terminator of the next boundary, or the end of input.
    fn leaf_end(&self, start: usize) -> usize {
        match self.current() {
            Token::Boundary { start: end, .. } => (*end).max(start),
            _ => self.data.len(),
        }
    }

    /// Skips stray tokens up to the next boundary or the end of input.
    fn skip_to_boundary(&mut self) -> Result<()> {
        while let Token::ContentType { .. } = self.current() {
            self.step()?;
            self.advance();
        }
        Ok(())
    }

    fn leaf(&self, start: usize, content_type: ContentType) -> Part<'x> {
        Part::from_stream(
            self.data,
            start..self.leaf_end(start),
            content_type,
            self.parser,
        )
    }

    fn traverse(&mut self, start: usize) -> Result<Part<'x>> {
        self.step()?;

        let content_type = match self.current() {
            Token::ContentType { value, .. } => value.clone(),
            Token::Boundary { .. } | Token::End => {
                return Ok(self.leaf(start, ContentType::default_leaf()));
            }
        };
        self.advance();

        if content_type.is_multipart() {
            self.traverse_multipart(start, content_type)
        } else if content_type.is_message_container() {
            let enclosed_start = self.body_start(start);
            let enclosed = self.traverse(enclosed_start)?;
            let end = enclosed.range_end().max(enclosed_start);
            let mut part = Part::from_stream(self.data, start..end, content_type, self.parser);
            part.enclosed = Some(Box::new(enclosed));
            Ok(part)
        } else if content_type.is_headers_container() {
            let mut enclosed_type = None;
            while let Token::ContentType { value, .. } = self.current() {
                if enclosed_type.is_none() {
                    enclosed_type = Some(value.clone());
                }
                self.step()?;
                self.advance();
            }

            let enclosed_start = self.body_start(start);
            let end = self.leaf_end(enclosed_start);
            let enclosed = Part::from_stream(
                self.data,
                enclosed_start..end,
                enclosed_type.unwrap_or_default(),
                self.parser,
            );
            let mut part = Part::from_stream(self.data, start..end, content_type, self.parser);
            part.enclosed = Some(Box::new(enclosed));
            Ok(part)
        } else {
            self.skip_to_boundary()?;
            Ok(self.leaf(start, content_type))
        }
    }

    fn traverse_multipart(&mut self, start: usize, content_type: ContentType) -> Result<Part<'x>> {
        let Some(boundary) = content_type.boundary().map(str::to_string) else {
            if self.parser.strict {
                return Err(Error::MissingBoundary);
            }
            self.skip_to_boundary()?;
            return Ok(self.leaf(start, content_type));
        };

        let mut child_start = match self.current() {
            Token::Boundary {
                value,
                is_final: false,
                end,
                ..
            } if *value == boundary => *end,
            Token::Boundary {
                value,
                is_final: true,
                line_end,
                ..
            } if *value == boundary => {
                let end = *line_end;
                self.advance();
                return Ok(Part::from_stream(
                    self.data,
                    start..end,
                    content_type,
                    self.parser,
                ));
            }
            _ if self.parser.strict => return Err(Error::MissingOpeningBoundary(boundary)),
            _ => {
                self.skip_to_boundary()?;
                return Ok(self.leaf(start, content_type));
            }
        };
        self.advance();

        let mut parts = Vec::new();
        let end = loop {
            parts.push(self.traverse(child_start)?);
            self.step()?;

            match self.current() {
                Token::Boundary {
                    value,
                    is_final,
                    line_end,
                    end,
                    ..
                } if *value == boundary => {
                    if *is_final {
                        let end = *line_end;
                        self.advance();
                        break end;
                    }
                    child_start = *end;
                    self.advance();
                }
                Token::Boundary { start: end, .. } => break (*end).max(start),
                Token::End => break self.data.len(),
                Token::ContentType { .. } => {
                    self.skip_to_boundary()?;
                }
            }
        };

        let mut part = Part::from_stream(self.data, start..end, content_type, self.parser);
        part.parts = parts;
        Ok(part)
    }

    fn body_start(&self, start: usize) -> usize {
        MessageStream::with_range(self.data, start..self.data.len()).skip_to_first_empty_line()
    }
}
