//! Whitespace token reader
//!
//! Line breaks carry no meaning to the loader; every field is one
//! whitespace-separated token. Empty lines (vertices without
//! influences) simply vanish.

use std::str::{FromStr, SplitWhitespace};

use crate::traits::{ParseError, ParseResult};

/// Upper bound on pre-allocation from counts read off the input
const MAX_PREALLOC: usize = 1 << 16;

pub(crate) struct TokenReader<'a> {
    tokens: SplitWhitespace<'a>,
    position: usize,
}

impl<'a> TokenReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace(),
            position: 0,
        }
    }

    /// Tokens consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn token(&mut self, expected: &str) -> ParseResult<&'a str> {
        let token = self.tokens.next().ok_or_else(|| ParseError::UnexpectedEof {
            expected: expected.to_string(),
        })?;
        self.position += 1;
        Ok(token)
    }

    pub fn value<T: FromStr>(&mut self, expected: &str) -> ParseResult<T> {
        let position = self.position;
        let token = self.token(expected)?;
        token.parse().map_err(|_| ParseError::InvalidToken {
            token: token.to_string(),
            position,
            expected: expected.to_string(),
        })
    }

    pub fn count(&mut self, expected: &str) -> ParseResult<usize> {
        self.value(expected)
    }

    pub fn floats<const N: usize>(&mut self, expected: &str) -> ParseResult<[f32; N]> {
        let mut out = [0.0; N];
        for slot in &mut out {
            *slot = self.value(expected)?;
        }
        Ok(out)
    }

    /// Remaining token count; consumes the reader
    pub fn remaining(self) -> usize {
        self.tokens.count()
    }
}

/// Capacity hint that a corrupt count cannot blow up
pub(crate) fn capacity(count: usize) -> usize {
    count.min(MAX_PREALLOC)
}
