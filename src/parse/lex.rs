//! Tokenizing `.ls8` program files.
//!
//! This module holds the tokens that make up an `.ls8` file ([`Token`]).
//! This module is used by the parser to facilitate the conversion of
//! program text into a program image.
//!
//! An `.ls8` file holds one byte per line, written as a binary literal.
//! Anything after a `#` is a comment:
//!
//! ```text
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! ```

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in an `.ls8` file.
#[derive(Debug, Logos, PartialEq, Eq)]
#[logos(skip r"[ \t]+", error = LexErr)]
pub enum Token {
    // Note, this regex spans over tokens that are technically invalid
    // (e.g., 0102 and 1x matches even though they aren't binary).
    // This is intended.
    // The regex collects what would be considered one discernable unit
    // and validates it using the validator function.

    /// A byte, written as a binary literal (e.g., `10000010`).
    #[regex(r"\d\w*", lex_byte)]
    Byte(u8),

    /// A comment, which starts with a `#` and spans the remaining part of the line.
    #[regex(r"#.*")]
    Comment,

    /// A new line
    #[regex(r"\r?\n")]
    NewLine
}

/// Any errors raised in attempting to tokenize an input stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// Binary literal has a value which does not fit in a byte.
    DoesNotFitU8,
    /// Binary literal has digits other than 0 and 1.
    InvalidBinary,
    /// Int parsing failed but the reason why is unknown
    UnknownIntErr,
    /// A symbol was used which is not allowed in `.ls8` files
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::DoesNotFitU8  => f.write_str("binary literal does not fit in a byte"),
            LexErr::InvalidBinary => f.write_str("invalid binary literal"),
            LexErr::UnknownIntErr => f.write_str("could not parse integer"),
            LexErr::InvalidSymbol => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU8  => Some("a byte is at most 8 binary digits (11111111)".into()),
            LexErr::InvalidBinary => Some("a binary literal only consists of digits 0 and 1".into()),
            LexErr::UnknownIntErr => None,
            LexErr::InvalidSymbol => Some("each line should hold one binary byte, optionally followed by a # comment".into()),
        }
    }
}

fn lex_byte(lx: &Lexer<'_, Token>) -> Result<u8, LexErr> {
    u8::from_str_radix(lx.slice(), 2)
        .map_err(|e| match e.kind() {
            IntErrorKind::InvalidDigit => LexErr::InvalidBinary,
            IntErrorKind::PosOverflow  => LexErr::DoesNotFitU8,
            _ => LexErr::UnknownIntErr,
        })
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use crate::err::LexErr;
    use crate::parse::lex::Token;

    #[test]
    fn test_bytes() {
        let mut tokens = Token::lexer("10000010 00000000\n1\n011111111");
        assert_eq!(tokens.next(), Some(Ok(Token::Byte(0b1000_0010))));
        assert_eq!(tokens.next(), Some(Ok(Token::Byte(0))));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::Byte(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        // leading zeroes are fine as long as the value fits
        assert_eq!(tokens.next(), Some(Ok(Token::Byte(0xFF))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_bytes_invalid() {
        let mut tokens = Token::lexer("100000010 10000012 1x");
        assert_eq!(tokens.next(), Some(Err(LexErr::DoesNotFitU8)));
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidBinary)));
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidBinary)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_comments() {
        let mut tokens = Token::lexer("# print8.ls8\r\n00000001 # HLT\n\t# done");
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::Byte(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), Some(Ok(Token::NewLine)));
        assert_eq!(tokens.next(), Some(Ok(Token::Comment)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_invalid_symbol() {
        let mut tokens = Token::lexer("LDI");
        assert_eq!(tokens.next(), Some(Err(LexErr::InvalidSymbol)));
    }
}
