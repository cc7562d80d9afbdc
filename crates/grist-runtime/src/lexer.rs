use bstr::ByteSlice;
use grist_grammar::{
    literal::{unquote, EscapeError},
    Grammar, Name, Span, SymbolId,
};
use thiserror::Error;

use crate::Token;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum LexErrorReason {
    #[error("no token matches {found:?}")]
    NoMatch { found: char },
    #[error("{error} in `{token}`")]
    InvalidEscape { token: Name, error: EscapeError },
    #[error("invalid UTF-8")]
    InvalidUtf8,
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{reason} at offset {offset}")]
pub struct LexError {
    pub offset: u32,
    pub reason: LexErrorReason,
}

/// Lazily splits the input into tokens.
///
/// At every position the token productions are tried in the grammar's lexing order and the first
/// one which matches a non-empty prefix wins. After an error is yielded the lexer is exhausted.
pub struct Lexer<'a> {
    grammar: &'a Grammar,
    src: &'a str,
    position: u32,
    finished: bool,
    /// Offset of the first invalid byte of a byte source, `src` ends there.
    invalid_at: Option<u32>,
}

pub fn tokenize<'a>(grammar: &'a Grammar, src: &'a str) -> Lexer<'a> {
    Lexer::new(grammar, src, None)
}

/// Tokenize raw bytes, the valid UTF-8 prefix is lexed and then an error is reported at the first
/// invalid byte.
pub fn tokenize_bytes<'a>(grammar: &'a Grammar, bytes: &'a [u8]) -> Lexer<'a> {
    match bytes.to_str() {
        Ok(src) => Lexer::new(grammar, src, None),
        Err(err) => {
            let valid_up_to = err.valid_up_to();
            log::debug!("input is not valid UTF-8 past offset {valid_up_to}");
            let src = bytes[..valid_up_to].to_str().unwrap_or_default();
            Lexer::new(grammar, src, Some(valid_up_to as u32))
        }
    }
}

impl<'a> Lexer<'a> {
    fn new(grammar: &'a Grammar, src: &'a str, invalid_at: Option<u32>) -> Lexer<'a> {
        assert!(src.len() <= u32::MAX as usize, "Input too large");
        Lexer {
            grammar,
            src,
            position: 0,
            finished: false,
            invalid_at,
        }
    }

    /// The text being lexed.
    pub fn src(&self) -> &'a str {
        self.src
    }

    fn lex_token(&mut self) -> Result<Token, LexError> {
        let start = self.position as usize;

        for &kind in self.grammar.lex_order() {
            let production = self.grammar.get(kind);
            match production.pattern.match_at(self.src, start) {
                Some(end) if end > start => return self.finish_token(kind, start, end),
                _ => {}
            }
        }

        let found = self.src[start..].chars().next().unwrap_or_default();
        Err(LexError {
            offset: start as u32,
            reason: LexErrorReason::NoMatch { found },
        })
    }

    fn finish_token(&mut self, kind: SymbolId, start: usize, end: usize) -> Result<Token, LexError> {
        let text = &self.src[start..end];

        let mut kind = kind;
        if self.grammar.get(kind).attributes.word {
            if let Some(keyword) = self.grammar.keyword(kind, text) {
                kind = keyword;
            }
        }

        let production = self.grammar.get(kind);
        let mut value = None;
        if production.attributes.unquote {
            let decoded = unquote(text).map_err(|error| LexError {
                offset: (start + error.offset()) as u32,
                reason: LexErrorReason::InvalidEscape {
                    token: production.name.clone(),
                    error,
                },
            })?;
            value = Some(decoded);
        }

        log::trace!("lexed {} {:?} at {start}", production.name, text);

        self.position = end as u32;
        Ok(Token {
            kind,
            name: production.name.clone(),
            span: Span::new(start as u32, end as u32),
            value,
            skip: production.attributes.skip,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.position as usize == self.src.len() {
            self.finished = true;
            return self.invalid_at.map(|offset| {
                Err(LexError {
                    offset,
                    reason: LexErrorReason::InvalidUtf8,
                })
            });
        }

        let result = self.lex_token();
        self.finished = result.is_err();
        Some(result)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}
