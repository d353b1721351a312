//! Parser interface shared by all readers

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("Invalid token '{token}' at token {position}, expected {expected}")]
    InvalidToken {
        token: String,
        position: usize,
        expected: String,
    },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Core trait for file format readers
pub trait Parser {
    /// The parsed output type
    type Output;

    /// Human-readable parser name
    fn name(&self) -> &str;

    /// File extensions this parser handles, without the dot
    fn extensions(&self) -> &[&str];

    /// Parse from a reader
    fn parse<R: Read>(&self, reader: R) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)
            .map_err(|e| ParseError::from(e).with_context(path.display().to_string()))?;
        let reader = std::io::BufReader::new(file);
        self.parse(reader)
            .map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Check if this parser handles the file's extension
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}
