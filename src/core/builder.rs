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

use crate::{parsers::scanner::scan, EncoderConfig, MessageParser, Part, Result};

impl MessageParser {
    /// Create a new builder for a message parser using the default settings.
    ///
    /// The default settings are:
    ///
    /// * Header lines of up to 10,000 bytes.
    /// * At most 500 scanning steps per message.
    /// * Strict mode: malformed multipart structure and header faults are
    ///   reported as errors.
    ///
    pub fn new() -> Self {
        Self {
            max_header_line: 10_000,
            max_steps: 500,
            strict: true,
        }
    }

    /// Set the maximum length of a header line, excluding its terminator.
    pub fn with_max_header_line(mut self, max_header_line: usize) -> Self {
        self.max_header_line = max_header_line;
        self
    }

    /// Set the maximum number of token-driven scanning steps.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Recover from malformed input instead of failing:
    ///
    /// * Multiparts without a boundary or opening boundary become leaves.
    /// * Header line limits and non-ASCII header names are ignored.
    /// * Bodies with an invalid transfer encoding decode to their raw bytes.
    ///
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    /// Fail on the first malformed construct (the default).
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Scans a message into a tree of parts borrowing `bytes`.
    pub fn parse<'x>(&self, bytes: &'x [u8]) -> Result<Part<'x>> {
        scan(bytes, *self)
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderConfig {
    /// Create a new encoder configuration using the default settings:
    ///
    /// * 76 columns per encoded line.
    /// * Text lines of 599 characters or more force a transfer encoding.
    /// * Header values longer than 8,000 characters are emitted unfolded.
    ///
    pub fn new() -> Self {
        Self {
            max_line_length: 76,
            long_line_threshold: 599,
            max_header_length: 8_000,
        }
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length.max(8);
        self
    }

    pub fn with_long_line_threshold(mut self, long_line_threshold: usize) -> Self {
        self.long_line_threshold = long_line_threshold;
        self
    }

    pub fn with_max_header_length(mut self, max_header_length: usize) -> Self {
        self.max_header_length = max_header_length;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new()
    }
}
