use std::borrow::Cow;

use crate::{lexer::Lexer, LexError, Token};

/// Random access over tokens which may still be produced by a lexer. Tokens are pulled from the
/// lexer only once the parser looks at them and are kept around for backtracking.
pub struct TokenCursor<'a> {
    tokens: Cow<'a, [Token]>,
    lexer: Option<Lexer<'a>>,
    error: Option<LexError>,
    end: u32,
}

impl<'a> TokenCursor<'a> {
    pub fn from_slice(tokens: &'a [Token]) -> Self {
        Self {
            tokens: Cow::Borrowed(tokens),
            lexer: None,
            error: None,
            end: tokens.last().map_or(0, |t| t.span.end()),
        }
    }

    pub fn from_lexer(lexer: Lexer<'a>) -> Self {
        Self {
            tokens: Cow::Owned(Vec::new()),
            end: lexer.src().len() as u32,
            lexer: Some(lexer),
            error: None,
        }
    }

    /// Make sure the token at `position` is available if the input has one.
    pub fn fill(&mut self, position: usize) {
        while self.tokens.len() <= position {
            let Some(lexer) = &mut self.lexer else {
                return;
            };
            match lexer.next() {
                Some(Ok(token)) => self.tokens.to_mut().push(token),
                Some(Err(err)) => {
                    self.end = err.offset;
                    self.error = Some(err);
                    self.lexer = None;
                }
                None => self.lexer = None,
            }
        }
    }

    pub fn get(&self, position: usize) -> Option<&Token> {
        self.tokens.get(position)
    }

    /// The error which ended the input, only known once the parser has reached it.
    pub fn error(&self) -> Option<&LexError> {
        self.error.as_ref()
    }

    /// Byte offset of the token at `position`, or of the end of the input.
    pub fn offset(&mut self, position: usize) -> u32 {
        self.fill(position);
        self.get(position).map_or(self.end, |t| t.span.start())
    }
}
