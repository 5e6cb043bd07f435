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

use std::ops::Range;

pub mod fields;
pub mod header;
pub mod scanner;
pub mod tokenizer;

/// A line of the input. `content_end` excludes the CR/LF terminator, `end` is
/// the offset of the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub start: usize,
    pub content_end: usize,
    pub end: usize,
}

impl Line {
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.content_end - self.start
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.content_end == self.start
    }

    #[inline(always)]
    pub fn has_terminator(&self) -> bool {
        self.end > self.content_end
    }
}

pub struct MessageStream<'x> {
    pub data: &'x [u8],
    pos: usize,
    limit: usize,
    restore_pos: usize,
}

impl<'x> MessageStream<'x> {
    pub fn new(data: &'x [u8]) -> MessageStream<'x> {
        MessageStream {
            data,
            pos: 0,
            limit: data.len(),
            restore_pos: 0,
        }
    }

    /// Creates a stream restricted to `range`.
    pub fn with_range(data: &'x [u8], range: Range<usize>) -> MessageStream<'x> {
        let limit = range.end.min(data.len());
        MessageStream {
            data,
            pos: range.start.min(limit),
            limit,
            restore_pos: 0,
        }
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.limit
    }

    #[inline(always)]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.limit);
    }

    #[inline(always)]
    pub fn checkpoint(&mut self) {
        self.restore_pos = self.pos;
    }

    #[inline(always)]
    pub fn restore(&mut self) {
        self.pos = self.restore_pos;
    }

    #[inline(always)]
    pub fn bytes(&self, range: Range<usize>) -> &'x [u8] {
        &self.data[range]
    }

    #[inline(always)]
    pub fn line_bytes(&self, line: &Line) -> &'x [u8] {
        &self.data[line.start..line.content_end]
    }

    /// Returns the next line and advances past its terminator.
    pub fn next_line(&mut self) -> Option<Line> {
        if self.pos >= self.limit {
            return None;
        }

        let start = self.pos;
        let (content_end, end) = match self.data[start..self.limit]
            .iter()
            .position(|&ch| ch == b'\n')
        {
            Some(idx) => {
                let lf = start + idx;
                if lf > start && self.data[lf - 1] == b'\r' {
                    (lf - 1, lf + 1)
                } else {
                    (lf, lf + 1)
                }
            }
            None => (self.limit, self.limit),
        };

        self.pos = end;
        Some(Line {
            start,
            content_end,
            end,
        })
    }

    /// Advances past the first empty line and returns the offset that
    /// follows it, or the stream limit when there is none.
    pub fn skip_to_first_empty_line(&mut self) -> usize {
        while let Some(line) = self.next_line() {
            if line.is_empty() && line.has_terminator() {
                return line.end;
            }
        }
        self.limit
    }
}

/// Offset of the line terminator that ends right before `pos`.
pub fn preceding_newline(data: &[u8], pos: usize) -> usize {
    match pos.checked_sub(1).and_then(|lf| data.get(lf).map(|ch| (lf, *ch))) {
        Some((lf, b'\n')) if lf > 0 && data[lf - 1] == b'\r' => lf - 1,
        Some((lf, b'\n')) => lf,
        _ => pos,
    }
}

#[cfg(test)]
mod tests {
    use super::{preceding_newline, Line, MessageStream};

    #[test]
    fn split_lines() {
        let inputs: [(&str, &[(usize, usize, usize)]); 5] = [
            ("", &[]),
            ("a\r\nbc\n\r\nd", &[(0, 1, 3), (3, 5, 6), (6, 6, 8), (8, 9, 9)]),
            ("\n\n", &[(0, 0, 1), (1, 1, 2)]),
            ("abc", &[(0, 3, 3)]),
            ("\r\r\n", &[(0, 1, 3)]),
        ];

        for (input, expected) in inputs {
            let mut stream = MessageStream::new(input.as_bytes());
            let mut lines = Vec::new();
            while let Some(Line {
                start,
                content_end,
                end,
            }) = stream.next_line()
            {
                lines.push((start, content_end, end));
            }
            assert_eq!(lines, expected, "Failed for {input:?}");
        }
    }

    #[test]
    fn first_empty_line() {
        let inputs = [
            ("Content-Type: message/rfc822\r\n\r\nFrom: a\r\n", 32),
            ("X: y\n\nbody", 6),
            ("no empty line", 13),
        ];

        for (input, expected) in inputs {
            assert_eq!(
                MessageStream::new(input.as_bytes()).skip_to_first_empty_line(),
                expected,
                "Failed for {input:?}"
            );
        }

        let data = b"abc\r\n--b\r\n";
        let mut stream = MessageStream::with_range(data, 5..data.len());
        assert_eq!(stream.next_line().map(|l| l.start), Some(5));
        assert_eq!(preceding_newline(data, 5), 3);
        assert_eq!(preceding_newline(b"ab\n--", 3), 2);
        assert_eq!(preceding_newline(b"--", 0), 0);
    }
}
