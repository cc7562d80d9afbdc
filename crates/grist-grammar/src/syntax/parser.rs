//! Recursive descent over grammar text, patterns are parsed with binding powers.
//!
//! ```text
//! item    = ('@' Ident)* ('token' | 'rule') Ident '{' pattern '}'
//! pattern = atom | pattern pattern | pattern '|' pattern | pattern ('*' | '+' | '?')
//! atom    = Ident | Literal | Class | '.' | '(' pattern? ')'
//! ```

use std::{iter::Peekable, str::CharIndices};

use crate::{
    error::ErrorAccumulator,
    literal::{unescape, EscapeError},
    pattern::{CharClass, ClassItem, NamedClass, Pattern},
    span::Span,
};

use super::{
    lexer::{Token, TokenKind, TokenKind::*},
    Item, ItemKind,
};

/// Parentheses nested deeper than this are an error, patterns are walked recursively.
const MAX_NESTING: u32 = 128;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    src: &'a str,
    err: &'a ErrorAccumulator,
    /// Currently open parentheses.
    nesting: u32,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, tokens: Vec<Token>, err: &'a ErrorAccumulator) -> Parser<'a> {
        Parser {
            tokens,
            pos: 0,
            src,
            err,
            nesting: 0,
        }
    }

    fn eof(&self) -> bool {
        self.pos == self.tokens.len()
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn at_any(&self, kinds: &[TokenKind]) -> bool {
        self.peek().map_or(false, |kind| kinds.contains(&kind))
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos];
        self.pos += 1;
        token
    }

    fn token(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.advance())
    }

    /// Span of the current token, or an empty span at the end of the text.
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map_or(Span::at(self.src.len() as u32), |t| t.span)
    }

    fn prev_end(&self) -> u32 {
        self.pos
            .checked_sub(1)
            .map_or(0, |prev| self.tokens[prev].span.end())
    }

    fn error(&self, message: impl ToString) {
        self.err.syntax(self.current_span(), message);
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        let token = self.token(kind);
        if token.is_none() {
            let found = self.peek().map_or("end of input", TokenKind::describe);
            self.error(format_args!("Expected {}, found {found}", kind.describe()));
        }
        token
    }

    fn text(&self, token: Token) -> &'a str {
        token.span.as_str(self.src)
    }

    /// Skip at least one token and then everything up to the start of the next item.
    #[cold]
    fn recover(&mut self) {
        if !self.eof() {
            self.advance();
        }
        while !(self.eof() || self.at_any(&[At, TokenKeyword, RuleKeyword])) {
            self.advance();
        }
    }
}

pub fn file(p: &mut Parser) -> Vec<Item> {
    let mut items = Vec::new();
    while !p.eof() {
        let start = p.pos;
        match item(p) {
            Some(item) => items.push(item),
            None => {
                // avoid recovering past the start of a valid item
                if p.pos == start || !p.at_any(&[At, TokenKeyword, RuleKeyword]) {
                    p.recover();
                }
            }
        }
    }
    items
}

fn item(p: &mut Parser) -> Option<Item> {
    let start = p.current_span().start();

    let mut attributes = Vec::new();
    while p.token(At).is_some() {
        let name = p.expect(Ident)?;
        attributes.push((p.text(name).into(), name.span));
    }

    let kind = if p.token(TokenKeyword).is_some() {
        ItemKind::Token
    } else if p.token(RuleKeyword).is_some() {
        ItemKind::Rule
    } else {
        p.error("Expected 'token' or 'rule'");
        return None;
    };

    let name = p.expect(Ident)?;
    p.expect(LCurly)?;
    let pattern = match pattern(p, 0) {
        Some(pattern) => pattern,
        None if p.at(RCurly) => {
            p.error("Expected a pattern, use '()' to match nothing");
            return None;
        }
        None => {
            p.error("Expected a pattern");
            return None;
        }
    };
    p.expect(RCurly)?;

    Some(Item {
        attributes,
        kind,
        name: p.text(name).into(),
        pattern,
        span: Span::new(start, p.prev_end()),
    })
}

// atom bp
//  '('  _ _
// postfix bp
//  '?'  5 _
//  '+'  5 _
//  '*'  5 _
//  Seq  3 _
// binary bp
//  '|'  1 2

fn atom(p: &mut Parser) -> Option<Pattern> {
    let pattern = match p.peek()? {
        Ident => {
            let token = p.advance();
            Pattern::reference(p.text(token))
        }
        Literal => {
            let token = p.advance();
            literal(p, token)
        }
        Class => {
            let token = p.advance();
            class(p, token)
        }
        Dot => {
            p.advance();
            Pattern::class(CharClass::any())
        }
        LParen => {
            let open = p.advance();
            if p.token(RParen).is_some() {
                return Some(Pattern::empty());
            }
            if p.nesting >= MAX_NESTING {
                p.err.syntax(
                    open.span,
                    format!("Parentheses are nested deeper than {MAX_NESTING}"),
                );
                skip_group(p);
                return Some(Pattern::empty());
            }

            p.nesting += 1;
            let inner = pattern(p, 0);
            p.nesting -= 1;
            if inner.is_none() {
                p.error("Expected a pattern");
            }
            p.expect(RParen);
            inner.unwrap_or_else(Pattern::empty)
        }
        ErrorToken => {
            let token = p.advance();
            let message = match p.text(token).as_bytes()[0] {
                b'\'' => "Unterminated literal",
                b'[' => "Unterminated character class",
                _ => "Unexpected character",
            };
            p.err.syntax(token.span, message);
            Pattern::empty()
        }
        _ => return None,
    };
    Some(pattern)
}

/// Skip past the parenthesis closing an already consumed `(`, stopping early at the end of the item.
fn skip_group(p: &mut Parser) {
    let mut open = 1u32;
    while let Some(kind) = p.peek() {
        match kind {
            LParen => open += 1,
            RParen if open == 1 => {
                p.advance();
                return;
            }
            RParen => open -= 1,
            RCurly => return,
            _ => {}
        }
        p.advance();
    }
}

pub fn pattern(p: &mut Parser, min_bp: u8) -> Option<Pattern> {
    let mut lhs = atom(p)?;

    while let Some(peek) = p.peek() {
        match peek {
            Question | Plus | Star => {
                // bp table lookup
                let bp = (5, ());
                if bp.0 <= min_bp {
                    break;
                }

                p.advance();
                lhs = match peek {
                    Question => lhs.optional(),
                    Plus => lhs.one_or_more(),
                    _ => lhs.zero_or_more(),
                };
            }
            Pipe => {
                // bp table lookup
                let bp = (1, 2);
                if bp.0 <= min_bp {
                    break;
                }

                p.advance();
                let Some(rhs) = pattern(p, bp.1) else {
                    p.error("Expected a pattern after '|'");
                    break;
                };
                lhs = match lhs {
                    Pattern::Choice(mut items) if items.len() > 1 => {
                        items.push(rhs);
                        Pattern::Choice(items)
                    }
                    lhs => Pattern::choice([lhs, rhs]),
                };
            }
            Ident | Literal | Class | Dot | LParen | ErrorToken => {
                // bp table lookup
                let bp = (3, ());
                if bp.0 <= min_bp {
                    break;
                }

                let Some(rhs) = pattern(p, bp.0) else {
                    break;
                };
                lhs = match lhs {
                    Pattern::Sequence(mut items) if items.len() > 1 => {
                        items.push(rhs);
                        Pattern::Sequence(items)
                    }
                    lhs => Pattern::seq([lhs, rhs]),
                };
            }
            _ => break,
        }
    }

    Some(lhs)
}

fn escape_error(p: &Parser, token: Token, err: EscapeError) {
    // the literal content starts after the opening delimiter
    let start = token.span.start() + 1 + err.offset() as u32;
    let span = Span::new(start, (start + 2).min(token.span.end()));
    p.err.syntax(span, err);
}

fn literal(p: &Parser, token: Token) -> Pattern {
    let text = p.text(token);
    let content = &text[1..text.len() - 1];
    match unescape(content) {
        Ok(value) if value.is_empty() => {
            p.err.syntax(token.span, "Empty literal, use '()' to match nothing");
            Pattern::empty()
        }
        Ok(value) => Pattern::literal(value),
        Err(err) => {
            escape_error(p, token, err);
            Pattern::empty()
        }
    }
}

fn class(p: &Parser, token: Token) -> Pattern {
    let text = p.text(token);
    let content = &text[1..text.len() - 1];
    let base = token.span.start() + 1;

    let mut chars = content.char_indices().peekable();
    let negated = chars.next_if(|&(_, c)| c == '^').is_some();

    let mut items = Vec::new();
    let error = |offset: usize, message: String| {
        let start = base + offset as u32;
        p.err.syntax(Span::new(start, start + 1), message);
    };

    while let Some(item) = class_item(&mut chars) {
        let item = match item {
            Ok(item) => item,
            Err((offset, message)) => {
                error(offset, message);
                return Pattern::empty();
            }
        };

        // a '-' which is last in the class is taken literally
        let is_range = chars.peek().map(|&(_, c)| c) == Some('-') && {
            let mut lookahead = chars.clone();
            lookahead.next();
            lookahead.peek().is_some()
        };
        if !is_range {
            items.push(item);
            continue;
        }

        let (dash, _) = chars.next().unwrap_or_default();
        let end = class_item(&mut chars);
        match (item, end) {
            (ClassItem::Char(start), Some(Ok(ClassItem::Char(end)))) if start <= end => {
                items.push(ClassItem::Range(start, end))
            }
            (ClassItem::Char(_), Some(Ok(ClassItem::Char(_)))) => {
                error(dash, "Range start is greater than its end".to_owned());
                return Pattern::empty();
            }
            (_, Some(Err((offset, message)))) => {
                error(offset, message);
                return Pattern::empty();
            }
            _ => {
                error(dash, "Named classes can't be a bound of a range".to_owned());
                return Pattern::empty();
            }
        }
    }

    Pattern::class(CharClass { negated, items })
}

/// A single character or a named class, escapes processed.
fn class_item(chars: &mut Peekable<CharIndices<'_>>) -> Option<Result<ClassItem, (usize, String)>> {
    let (offset, c) = chars.next()?;
    if c != '\\' {
        return Some(Ok(ClassItem::Char(c)));
    }
    let Some((_, escaped)) = chars.next() else {
        return Some(Err((offset, "Unterminated character escape".to_owned())));
    };
    let item = match escaped {
        'n' => ClassItem::Char('\n'),
        't' => ClassItem::Char('\t'),
        'r' => ClassItem::Char('\r'),
        '0' => ClassItem::Char('\0'),
        '\\' | ']' | '[' | '-' | '^' | '\'' | '"' => ClassItem::Char(escaped),
        _ => match NamedClass::from_escape(escaped) {
            Some(named) => ClassItem::Named(named),
            None => {
                let message = format!("Unknown character escape '\\{escaped}'");
                return Some(Err((offset, message)));
            }
        },
    };
    Some(Ok(item))
}
