//! Parsing `.ls8` program files into program images.
//!
//! This module is used to convert the text of an `.ls8` file
//! into the bytes that get loaded into memory.
//!
//! ```
//! use ls8_ensemble::parse::parse_program;
//!
//! let src = "
//!     ## print8.ls8
//!     10000010 # LDI R0,8
//!     00000000
//!     00001000
//!     01000111 # PRN R0
//!     00000000
//!     00000001 # HLT
//! ";
//! let program = parse_program(src).unwrap();
//! assert_eq!(program, [0x82, 0x00, 0x08, 0x47, 0x00, 0x01]);
//! ```
//!
//! The format is line-oriented: every line holds at most one byte,
//! and blank lines and comments are ignored.
pub mod lex;

use std::borrow::Cow;
use std::ops::Range;

use logos::Logos;

use crate::sim::mem::MEM_SIZE;
use lex::{LexErr, Token};

/// Kinds of errors that can occur from parsing an `.ls8` file.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrKind {
    /// The text could not be tokenized.
    Lex(LexErr),
    /// A line held more than one byte.
    ExtraByte,
    /// The program has more bytes than fit in memory.
    ProgramTooLarge,
}
impl std::fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex(e)          => e.fmt(f),
            Self::ExtraByte       => f.write_str("more than one byte on a line"),
            Self::ProgramTooLarge => f.write_str("program does not fit in memory"),
        }
    }
}

/// Error from parsing an `.ls8` file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseErr {
    /// The kind of error.
    pub kind: ParseErrKind,
    /// The line the error occurred on (starting from 1).
    pub line: usize,
    /// The span in the source associated with this error.
    pub span: Range<usize>
}
impl ParseErr {
    /// Creates a new [`ParseErr`].
    pub fn new(kind: ParseErrKind, line: usize, span: Range<usize>) -> Self {
        ParseErr { kind, line, span }
    }
}
impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}
impl std::error::Error for ParseErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ParseErrKind::Lex(e) => Some(e),
            _ => None
        }
    }
}
impl crate::err::Error for ParseErr {
    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            ParseErrKind::Lex(e)          => e.help(),
            ParseErrKind::ExtraByte       => Some("write each byte on its own line".into()),
            ParseErrKind::ProgramTooLarge => Some(format!("programs can be at most {MEM_SIZE} bytes").into()),
        }
    }
}

/// Parses the text of an `.ls8` file into a program image.
///
/// The program image starts at address 0, and has one byte per non-empty line.
///
/// # Errors
/// This fails on the first line which contains anything besides a binary byte and a comment,
/// or on the first byte which would not fit in memory.
pub fn parse_program(src: &str) -> Result<Vec<u8>, ParseErr> {
    let mut program = Vec::new();
    let mut line = 1;
    let mut line_has_byte = false;

    for (token, span) in Token::lexer(src).spanned() {
        let token = token.map_err(|e| ParseErr::new(ParseErrKind::Lex(e), line, span.clone()))?;

        match token {
            Token::Byte(byte) => {
                if line_has_byte {
                    return Err(ParseErr::new(ParseErrKind::ExtraByte, line, span));
                }
                if program.len() >= MEM_SIZE {
                    return Err(ParseErr::new(ParseErrKind::ProgramTooLarge, line, span));
                }
                program.push(byte);
                line_has_byte = true;
            },
            Token::Comment => {},
            Token::NewLine => {
                line += 1;
                line_has_byte = false;
            },
        }
    }

    Ok(program)
}

#[cfg(test)]
mod tests {
    use crate::err::Error;

    use super::lex::LexErr;
    use super::{parse_program, ParseErrKind};

    #[test]
    fn test_parse_basic() {
        let src = "\
            # mult.ls8\n\
            10000010 # LDI R0,8\n\
            00000000\n\
            \n\
            00001000\n\
            10100010 # MUL R0,R1\n\
            00000000\n\
            00000001\n\
            00000001 # HLT";

        let program = parse_program(src).unwrap();
        assert_eq!(program, [0x82, 0x00, 0x08, 0xA2, 0x00, 0x01, 0x01]);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_program("").unwrap(), []);
        assert_eq!(parse_program("# nothing here\n\n").unwrap(), []);
    }

    #[test]
    fn test_parse_lex_error() {
        let err = parse_program("00000001\n0000000Z\n").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::Lex(LexErr::InvalidBinary));
        assert_eq!(err.line, 2);
        assert_eq!(err.span, 9..17);
        assert_eq!(err.to_string(), "line 2: invalid binary literal");
        assert!(err.help().is_some());
    }

    #[test]
    fn test_parse_extra_byte() {
        let err = parse_program("00000001\n00000001 00000010\n").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::ExtraByte);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_too_large() {
        let fits = "00000001\n".repeat(256);
        assert_eq!(parse_program(&fits).unwrap().len(), 256);

        let too_large = "00000001\n".repeat(257);
        let err = parse_program(&too_large).unwrap_err();
        assert_eq!(err.kind, ParseErrKind::ProgramTooLarge);
        assert_eq!(err.line, 257);
    }
}
