use nom::error::{ContextError, ParseError};
use std::fmt;
use thiserror::Error;

/// Accumulating nom error: each entry pairs the remaining input at the point
/// of failure with a static description of what was expected there.
#[derive(Debug, PartialEq)]
pub struct CypherParsingError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> CypherParsingError<'a> {
    pub fn new(input: &'a str, message: &'static str) -> Self {
        CypherParsingError {
            errors: vec![(input, message)],
        }
    }

    /// The entry closest to the end of input, i.e. the deepest parse point.
    pub fn deepest(&self) -> Option<(&'a str, &'static str)> {
        self.errors.iter().min_by_key(|(rest, _)| rest.len()).copied()
    }
}

impl<'a> ParseError<&'a str> for CypherParsingError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        CypherParsingError::new(input, "unexpected input")
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "unexpected input"));
        other
    }
}

impl<'a> ContextError<&'a str> for CypherParsingError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for CypherParsingError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {}", ctx, input)?;
        }
        Ok(())
    }
}

impl<'a> From<nom::error::Error<&'a str>> for CypherParsingError<'a> {
    fn from(err: nom::error::Error<&'a str>) -> Self {
        CypherParsingError::new(err.input, "unable to parse")
    }
}

/// Lift a default-error parser result into the accumulating error type.
/// Clause parsers use this when invoking the expression/pattern layer.
pub fn lift<'a, O>(
    result: nom::IResult<&'a str, O>,
) -> nom::IResult<&'a str, O, CypherParsingError<'a>> {
    result.map_err(|e| e.map(CypherParsingError::from))
}

/// The parse error surfaced to callers: message plus source location.
/// `position` is a 0-based byte offset; `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseFailure {
    pub message: String,
    pub position: usize,
    pub line: u32,
    pub column: u32,
}

impl ParseFailure {
    /// Build a failure from the original input and the remaining unparsed
    /// suffix where the error occurred.
    pub fn at_remainder(input: &str, remainder: &str, message: impl Into<String>) -> Self {
        let position = input.len().saturating_sub(remainder.len());
        Self::at_offset(input, position, message)
    }

    pub fn at_offset(input: &str, position: usize, message: impl Into<String>) -> Self {
        let consumed = &input[..position.min(input.len())];
        let line = consumed.bytes().filter(|b| *b == b'\n').count() as u32 + 1;
        let column = match consumed.rfind('\n') {
            Some(nl) => (consumed.len() - nl) as u32,
            None => consumed.len() as u32 + 1,
        };
        ParseFailure {
            message: message.into(),
            position,
            line,
            column,
        }
    }
}
