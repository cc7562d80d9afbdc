use crate::span::Span;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[rustfmt::skip]
pub enum TokenKind {
    Comment, Whitespace,

    Ident, Literal, Class,
    ErrorToken,

    LParen, RParen, LCurly, RCurly,
    TokenKeyword, RuleKeyword,
    At, Pipe, Question, Plus, Star, Dot,
}

use TokenKind::*;

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            Comment => "comment",
            Whitespace => "whitespace",
            Ident => "identifier",
            Literal => "literal",
            Class => "character class",
            ErrorToken => "invalid input",
            LParen => "'('",
            RParen => "')'",
            LCurly => "'{'",
            RCurly => "'}'",
            TokenKeyword => "'token'",
            RuleKeyword => "'rule'",
            At => "'@'",
            Pipe => "'|'",
            Question => "'?'",
            Plus => "'+'",
            Star => "'*'",
            Dot => "'.'",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    str: &'a [u8],
    pos: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(str: &'a str) -> Self {
        assert!(str.len() <= u32::MAX as usize);
        Self {
            str: str.as_bytes(),
            pos: 0,
        }
    }

    pub fn pos(&self) -> u32 {
        self.pos
    }

    pub fn span_since(&self, start: u32) -> Span {
        Span::new(start, self.pos)
    }

    pub fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    pub fn peek(&self) -> Option<u8> {
        self.str.get(self.pos as usize).copied()
    }

    pub fn consume_while(&mut self, predicate: impl Fn(u8) -> bool) -> Span {
        let start = self.pos();
        while let Some(c) = self.peek() {
            if predicate(c) {
                self.next();
            } else {
                break;
            }
        }
        self.span_since(start)
    }

    /// Consume until the unescaped `close` byte, returns false if the input ended first.
    fn delimited(&mut self, close: u8) -> bool {
        loop {
            match self.next() {
                None => return false,
                Some(b'\\') => _ = self.next(),
                Some(b) if b == close => return true,
                Some(_) => {}
            }
        }
    }
}

fn is_ident_byte(c: u8) -> bool {
    matches!(c, b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9')
}

/// Splits grammar text into significant tokens and trivia.
pub fn lex(l: &mut Lexer, src: &str) -> (Vec<Token>, Vec<Token>) {
    let mut tokens = Vec::new();
    let mut trivia = Vec::new();
    while let Some(byte) = l.peek() {
        let pos = l.pos();
        let kind = match byte {
            b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => {
                l.consume_while(|c| c.is_ascii_whitespace());
                Whitespace
            }
            b'/' if l.str.get(pos as usize + 1) == Some(&b'/') => {
                l.consume_while(|c| c != b'\n');
                Comment
            }
            b'\'' | b'[' => {
                l.next();
                let close = if byte == b'[' { b']' } else { b'\'' };
                match (l.delimited(close), byte) {
                    (true, b'[') => Class,
                    (true, _) => Literal,
                    (false, _) => ErrorToken,
                }
            }
            _ if is_ident_byte(byte) => {
                let span = l.consume_while(is_ident_byte);
                match span.as_str(src) {
                    "token" => TokenKeyword,
                    "rule" => RuleKeyword,
                    _ => Ident,
                }
            }
            _ => {
                l.next();
                match byte {
                    b'@' => At,
                    b'|' => Pipe,
                    b'?' => Question,
                    b'+' => Plus,
                    b'*' => Star,
                    b'.' => Dot,
                    b'(' => LParen,
                    b')' => RParen,
                    b'{' => LCurly,
                    b'}' => RCurly,
                    _ => {
                        // don't split a multibyte character
                        l.consume_while(|c| c >= 0x80 && c < 0xC0);
                        ErrorToken
                    }
                }
            }
        };

        let span = l.span_since(pos);
        debug_assert!(!span.is_empty());

        if kind == Whitespace || kind == Comment {
            trivia.push(Token { kind, span })
        } else {
            tokens.push(Token { kind, span })
        }
    }
    (tokens, trivia)
}
