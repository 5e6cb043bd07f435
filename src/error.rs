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

use thiserror::Error;

/// Errors produced while scanning, decoding or serializing MIME messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Oversized or syntactically invalid header block.
    #[error("Malformed headers: {0}")]
    MalformedHeaders(String),

    /// A header name contains non-ASCII bytes.
    #[error("Non-ASCII header name {0:?}")]
    NonAsciiHeaderName(String),

    /// Multipart content type without a boundary parameter.
    #[error("Multipart message without boundary")]
    MissingBoundary,

    /// Multipart body does not start with its boundary.
    #[error("Multipart message without starting boundary {0:?}")]
    MissingOpeningBoundary(String),

    /// The scanner step budget was exhausted.
    #[error("Too many parts, scan exceeded {0} steps")]
    TooManyParts(usize),

    /// Transfer-encoding or charset decoding failure.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// A value could not be emitted.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The root part has no headers to serialize.
    #[error("Root message should have headers")]
    RootWithoutHeaders,

    /// A malformed Message-Id was assigned.
    #[error("Invalid message id {0:?}")]
    InvalidMessageId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors raised while reading a message.
    pub fn is_decoding_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeaders(_)
                | Error::NonAsciiHeaderName(_)
                | Error::MissingBoundary
                | Error::MissingOpeningBoundary(_)
                | Error::TooManyParts(_)
                | Error::Decoding(_)
        )
    }

    /// Returns `true` for errors raised while writing a message.
    pub fn is_encoding_error(&self) -> bool {
        matches!(self, Error::Encoding(_) | Error::RootWithoutHeaders)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
