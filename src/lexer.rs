//! Tokenizer feeding the grammar driver.
//!
//! Lexerless in the reference implementation (a PEG grammar matches
//! characters directly); split out here into its own token stream, the way
//! the retrieved parser examples in this codebase's lineage (hand-written
//! recursive-descent parsers with a `Lexer`/`Parser` split) structure
//! things. Reserved words (`and`, `or`, `not`, `in`, `re`, `like`, `eq`,
//! `gt`, `gte`, `lt`, `lte`, `apply`, `true`, `false`, `null`) are lexed as
//! plain `Ident` tokens; the grammar driver decides, from grammatical
//! position, whether an identifier is a keyword or a field name. The
//! grammar does not disambiguate a field literally named `in`/`or`/etc.
//! from the keyword, so callers must quote such field names. `!=` is lexed
//! as its own token, `NotEq`, rather than as `not` followed by `=`: it is
//! the printer's chosen spelling for a negated EQ and must parse back to
//! exactly the negated-EQ operator it prints.

use crate::error::JqlError;
use crate::session::Session;
use crate::strcodec;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Quoted(String),
    Number(String),
    Placeholder(String),
    Anchor(String),
    Slash,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Plus,
    Minus,
    Pipe,
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'s>(&self, input: &'s str) -> &'s str {
        &input[self.start..self.end]
    }
}

pub struct Lexer<'a> {
    session: &'a Session<'a>,
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(session: &'a Session<'a>) -> Lexer<'a> {
        let input = session.input();
        Lexer {
            session,
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b'\n' {
                self.session.bump_line();
                self.pos += 1;
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_'
    }

    fn is_ident_continue(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-'
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        self.pos += 1; // first char already validated by caller
        while let Some(b) = self.peek_byte() {
            if Self::is_ident_continue(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.peek_byte() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek_byte() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek_byte(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn read_quoted(&mut self) -> Result<String, JqlError> {
        debug_assert_eq!(self.peek_byte(), Some(b'"'));
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek_byte() {
                None => {
                    return Err(self
                        .session
                        .fatal("unterminated string literal", self.pos));
                }
                Some(b'"') => {
                    let raw = &self.input[start..self.pos];
                    self.pos += 1;
                    return strcodec::unescape(raw);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek_byte() == Some(b'u') {
                        self.pos += 1;
                        for _ in 0..4 {
                            if self.peek_byte().is_some() {
                                self.pos += 1;
                            }
                        }
                    } else if self.peek_byte().is_some() {
                        self.pos += 1;
                    }
                }
                Some(_) => {
                    self.pos += 1;
                }
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, JqlError> {
        self.skip_whitespace();
        let start = self.pos;
        let Some(b) = self.peek_byte() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                start,
                end: start,
            });
        };
        let kind = match b {
            b'/' => {
                self.pos += 1;
                TokenKind::Slash
            }
            b'[' => {
                self.pos += 1;
                TokenKind::LBracket
            }
            b']' => {
                self.pos += 1;
                TokenKind::RBracket
            }
            b'{' => {
                self.pos += 1;
                TokenKind::LBrace
            }
            b'}' => {
                self.pos += 1;
                TokenKind::RBrace
            }
            b',' => {
                self.pos += 1;
                TokenKind::Comma
            }
            b'+' => {
                self.pos += 1;
                TokenKind::Plus
            }
            b'|' => {
                self.pos += 1;
                TokenKind::Pipe
            }
            b'=' => {
                self.pos += 1;
                TokenKind::Eq
            }
            b'!' => {
                self.pos += 1;
                if self.peek_byte() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::NotEq
                } else {
                    return Err(self
                        .session
                        .fatal("expected '=' after '!'", self.pos));
                }
            }
            b'>' => {
                self.pos += 1;
                if self.peek_byte() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            b'<' => {
                self.pos += 1;
                if self.peek_byte() == Some(b'=') {
                    self.pos += 1;
                    TokenKind::Lte
                } else {
                    TokenKind::Lt
                }
            }
            b'"' => TokenKind::Quoted(self.read_quoted()?),
            b':' => {
                self.pos += 1;
                if self
                    .peek_byte()
                    .map(Self::is_ident_start)
                    .unwrap_or(false)
                {
                    TokenKind::Placeholder(self.read_ident())
                } else {
                    TokenKind::Colon
                }
            }
            b'@' => {
                self.pos += 1;
                if self
                    .peek_byte()
                    .map(Self::is_ident_start)
                    .unwrap_or(false)
                {
                    TokenKind::Anchor(self.read_ident())
                } else {
                    return Err(self.session.fatal("expected anchor name after '@'", self.pos));
                }
            }
            b'*' => {
                self.pos += 1;
                if self.peek_byte() == Some(b'*') {
                    self.pos += 1;
                    TokenKind::Ident("**".to_string())
                } else {
                    TokenKind::Ident("*".to_string())
                }
            }
            b'-' => {
                // Ambiguous with a negative number; only a digit makes this a
                // number, otherwise it's the projection exclude marker.
                if matches!(self.peek_byte_at(1), Some(d) if d.is_ascii_digit()) {
                    TokenKind::Number(self.read_number())
                } else {
                    self.pos += 1;
                    TokenKind::Minus
                }
            }
            b if b.is_ascii_digit() => TokenKind::Number(self.read_number()),
            b if Self::is_ident_start(b) => TokenKind::Ident(self.read_ident()),
            _ => {
                return Err(self
                    .session
                    .fatal(format!("unexpected character '{}'", b as char), self.pos))
            }
        };
        Ok(Token {
            kind,
            start,
            end: self.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserLimits;

    fn tokens(input: &str) -> Vec<TokenKind> {
        let session = Session::new(input, ParserLimits::default());
        let mut lexer = Lexer::new(&session);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_simple_path() {
        let toks = tokens("/foo/[bar = 42]");
        assert_eq!(
            toks,
            vec![
                TokenKind::Slash,
                TokenKind::Ident("foo".into()),
                TokenKind::Slash,
                TokenKind::LBracket,
                TokenKind::Ident("bar".into()),
                TokenKind::Eq,
                TokenKind::Number("42".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_star_and_double_star() {
        assert_eq!(
            tokens("/*/**"),
            vec![
                TokenKind::Slash,
                TokenKind::Ident("*".into()),
                TokenKind::Slash,
                TokenKind::Ident("**".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_placeholder_and_anchor() {
        assert_eq!(
            tokens("@a/[x = :p]"),
            vec![
                TokenKind::Anchor("a".into()),
                TokenKind::Slash,
                TokenKind::LBracket,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Placeholder("p".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn negative_number_vs_minus_marker() {
        assert_eq!(tokens("-1"), vec![TokenKind::Number("-1".into()), TokenKind::Eof]);
        assert_eq!(tokens("- /a"), vec![TokenKind::Minus, TokenKind::Slash, TokenKind::Ident("a".into()), TokenKind::Eof]);
    }

    #[test]
    fn lexes_bang_equals_as_one_token() {
        assert_eq!(
            tokens("/a/[x != 1]"),
            vec![
                TokenKind::Slash,
                TokenKind::Ident("a".into()),
                TokenKind::Slash,
                TokenKind::LBracket,
                TokenKind::Ident("x".into()),
                TokenKind::NotEq,
                TokenKind::Number("1".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bare_bang_is_a_lex_error() {
        let session = Session::new("/a/[x ! 1]", ParserLimits::default());
        let mut lexer = Lexer::new(&session);
        loop {
            match lexer.next_token() {
                Ok(tok) if tok.kind == TokenKind::Eof => panic!("expected a lex error before EOF"),
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }
}
