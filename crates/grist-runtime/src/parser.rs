use std::{collections::BTreeSet, fmt::Display};

use grist_grammar::{Grammar, Name, Pattern, Span, SymbolId};
use thiserror::Error;

use crate::{
    cursor::TokenCursor,
    lexer::Lexer,
    tree::{ParseNode, RuleNode},
    LexError, Token,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ParserOptions {
    /// Maximum nesting of rules, deeper input fails instead of overflowing the stack.
    pub recursion_limit: u32,
    /// Attach skip tokens to the tree.
    pub keep_skipped: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            recursion_limit: 256,
            keep_skipped: false,
        }
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Expected {
    Symbol(Name),
    EndOfInput,
}

impl Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Symbol(name) => f.write_str(name),
            Expected::EndOfInput => f.write_str("end of input"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Found {
    Token(Token),
    EndOfInput,
}

impl Display for Found {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Found::Token(token) => f.write_str(&token.name),
            Found::EndOfInput => f.write_str("end of input"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ParseErrorKind {
    #[error("unexpected {found}, expected {}", display_expected(.expected))]
    Unexpected {
        expected: BTreeSet<Expected>,
        found: Found,
    },
    #[error("rules are nested deeper than the limit of {limit}")]
    RecursionLimit { limit: u32 },
}

fn display_expected(expected: &BTreeSet<Expected>) -> String {
    let names = expected.iter().map(Expected::to_string).collect::<Vec<_>>();
    match names.len() {
        0 => "nothing".to_owned(),
        1 => names[0].clone(),
        _ => format!("one of {}", names.join(", ")),
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("{kind} at offset {offset}")]
pub struct ParseError {
    pub offset: u32,
    pub kind: ParseErrorKind,
}

/// Failure of parsing straight from a lexer.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    pub fn offset(&self) -> u32 {
        match self {
            SyntaxError::Lex(err) => err.offset,
            SyntaxError::Parse(err) => err.offset,
        }
    }
}

pub fn parse(grammar: &Grammar, tokens: &[Token]) -> Result<ParseNode, ParseError> {
    parse_with(grammar, tokens, ParserOptions::default())
}

pub fn parse_with(
    grammar: &Grammar,
    tokens: &[Token],
    options: ParserOptions,
) -> Result<ParseNode, ParseError> {
    let parser = Parser::new(grammar, TokenCursor::from_slice(tokens), options);
    match parser.run() {
        Ok(tree) => Ok(tree),
        Err(SyntaxError::Parse(err)) => Err(err),
        Err(SyntaxError::Lex(_)) => unreachable!("Token slices have no lexer errors"),
    }
}

/// Parse while lexing, tokens are only lexed as far as the parser looks. A lexer error is
/// reported if the parser needed to look past it.
pub fn parse_lazy(
    grammar: &Grammar,
    lexer: Lexer<'_>,
    options: ParserOptions,
) -> Result<ParseNode, SyntaxError> {
    Parser::new(grammar, TokenCursor::from_lexer(lexer), options).run()
}

/// Nesting went past [`ParserOptions::recursion_limit`].
struct LimitReached {
    position: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct ParserPosition {
    token_position: usize,
    node_position: usize,
}

struct Parser<'a, 'g> {
    grammar: &'g Grammar,
    cursor: TokenCursor<'a>,
    options: ParserOptions,

    position: usize,
    /// Children of the rules currently being matched, innermost last.
    nodes: Vec<ParseNode>,
    depth: u32,

    furthest: usize,
    expected: BTreeSet<Expected>,
}

impl<'a, 'g> Parser<'a, 'g> {
    fn new(grammar: &'g Grammar, cursor: TokenCursor<'a>, options: ParserOptions) -> Self {
        Parser {
            grammar,
            cursor,
            options,
            position: 0,
            nodes: Vec::new(),
            depth: 0,
            furthest: 0,
            expected: BTreeSet::new(),
        }
    }

    fn save_position(&self) -> ParserPosition {
        ParserPosition {
            token_position: self.position,
            node_position: self.nodes.len(),
        }
    }

    fn restore_position(&mut self, state: ParserPosition) {
        debug_assert!(
            state.node_position <= self.nodes.len(),
            "Missing nodes to restore to. Mismatched save_position - restore_position pair?"
        );

        self.position = state.token_position;
        self.nodes.truncate(state.node_position);
    }

    /// Index and kind of the next token which isn't skipped, `None` at the end of the input.
    fn peek(&mut self) -> (usize, Option<SymbolId>) {
        let mut i = self.position;
        loop {
            self.cursor.fill(i);
            match self.cursor.get(i) {
                Some(token) if token.skip => i += 1,
                Some(token) => return (i, Some(token.kind)),
                None => return (i, None),
            }
        }
    }

    fn expect_at(&mut self, position: usize, expected: Expected) {
        if position > self.furthest {
            self.furthest = position;
            self.expected.clear();
        }
        if position == self.furthest {
            self.expected.insert(expected);
        }
    }

    /// Consume tokens up to and including `end`, skip tokens are kept only if requested.
    fn consume_through(&mut self, end: usize) {
        for i in self.position..=end {
            let Some(token) = self.cursor.get(i) else {
                break;
            };
            if i == end || self.options.keep_skipped {
                self.nodes.push(ParseNode::Terminal(token.clone()));
            }
        }
        self.position = end + 1;
    }

    fn token(&mut self, kind: SymbolId) -> bool {
        let (i, found) = self.peek();
        if found == Some(kind) {
            self.consume_through(i);
            true
        } else {
            self.expect_at(i, Expected::Symbol(self.grammar.name(kind).clone()));
            false
        }
    }

    fn rule(&mut self, kind: SymbolId) -> Result<bool, LimitReached> {
        if self.depth >= self.options.recursion_limit {
            return Err(LimitReached {
                position: self.position,
            });
        }

        let grammar = self.grammar;
        let production = grammar.get(kind);
        log::trace!("enter `{}` at token {}", production.name, self.position);

        let start = self.save_position();
        self.depth += 1;
        let matched = self.pattern(&production.pattern);
        self.depth -= 1;

        if !matched? {
            return Ok(false);
        }

        let children = self.nodes.split_off(start.node_position);
        let span = match (children.first(), children.last()) {
            (Some(first), Some(last)) => first.span().join(last.span()),
            _ => Span::at(self.cursor.offset(self.position)),
        };

        self.nodes.push(ParseNode::Rule(RuleNode {
            kind,
            name: production.name.clone(),
            span,
            children,
        }));
        Ok(true)
    }

    fn reference(&mut self, kind: SymbolId) -> Result<bool, LimitReached> {
        if self.grammar.get(kind).is_token() {
            Ok(self.token(kind))
        } else {
            self.rule(kind)
        }
    }

    /// On failure nothing is consumed.
    fn pattern(&mut self, pattern: &Pattern) -> Result<bool, LimitReached> {
        match pattern {
            Pattern::Literal(text) => match self.grammar.literal_token(text) {
                Some(kind) => Ok(self.token(kind)),
                None => Ok(false),
            },
            // never part of a valid rule
            Pattern::Class(_) => Ok(false),
            Pattern::Sequence(items) => {
                let start = self.save_position();
                for item in items {
                    if !self.pattern(item)? {
                        self.restore_position(start);
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Pattern::Choice(items) => {
                for item in items {
                    if self.pattern(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pattern::Repeat(inner, repeat) => {
                let start = self.save_position();
                let mut count = 0;
                while !repeat.is_saturated(count) {
                    let before = self.position;
                    if !self.pattern(inner)? {
                        break;
                    }
                    count += 1;
                    // an iteration which consumed nothing would match forever
                    if self.position == before {
                        break;
                    }
                }
                if count < repeat.min() {
                    self.restore_position(start);
                    return Ok(false);
                }
                Ok(true)
            }
            Pattern::Reference(name) => match self.grammar.symbol(name) {
                Some(kind) => self.reference(kind),
                None => Ok(false),
            },
        }
    }

    fn run(mut self) -> Result<ParseNode, SyntaxError> {
        let start = self.grammar.start();
        log::debug!("parsing from `{}`", self.grammar.name(start));

        let matched = match self.reference(start) {
            Ok(matched) => matched,
            Err(LimitReached { position }) => {
                let limit = self.options.recursion_limit;
                log::debug!("recursion limit {limit} reached at token {position}");
                return Err(SyntaxError::Parse(ParseError {
                    offset: self.cursor.offset(position),
                    kind: ParseErrorKind::RecursionLimit { limit },
                }));
            }
        };

        if matched {
            let (i, found) = self.peek();
            if found.is_none() && self.cursor.error().is_none() {
                return Ok(self.finish(i));
            }
            self.expect_at(i, Expected::EndOfInput);
        }

        Err(self.failure())
    }

    /// Trailing skip tokens go to the root. A token root keeping skip tokens is wrapped in a rule
    /// node of its own kind.
    fn finish(mut self, end: usize) -> ParseNode {
        let mut trailing = Vec::new();
        if self.options.keep_skipped {
            for i in self.position..end {
                if let Some(token) = self.cursor.get(i) {
                    trailing.push(ParseNode::Terminal(token.clone()));
                }
            }
        }
        log::debug!("parsed {end} tokens");

        let Some(root) = self.nodes.pop() else {
            unreachable!("Matched start symbol left no node")
        };
        match root {
            ParseNode::Rule(mut rule) => {
                debug_assert!(self.nodes.is_empty());
                if let Some(last) = trailing.last() {
                    rule.span = rule.span.join(last.span());
                }
                rule.children.extend(trailing);
                ParseNode::Rule(rule)
            }
            ParseNode::Terminal(token) if self.nodes.is_empty() && trailing.is_empty() => {
                ParseNode::Terminal(token)
            }
            ParseNode::Terminal(token) => {
                let kind = token.kind;
                let name = token.name.clone();

                // leading skip tokens were consumed together with the root
                let mut children = std::mem::take(&mut self.nodes);
                children.push(ParseNode::Terminal(token));
                children.extend(trailing);

                let span = match (children.first(), children.last()) {
                    (Some(first), Some(last)) => first.span().join(last.span()),
                    _ => unreachable!("Wrapped token root has no children"),
                };
                ParseNode::Rule(RuleNode {
                    kind,
                    name,
                    span,
                    children,
                })
            }
        }
    }

    fn failure(mut self) -> SyntaxError {
        let position = self.furthest;
        self.cursor.fill(position);

        let found = match self.cursor.get(position) {
            Some(token) => Found::Token(token.clone()),
            None => match self.cursor.error() {
                Some(err) => return SyntaxError::Lex(err.clone()),
                None => Found::EndOfInput,
            },
        };

        let err = ParseError {
            offset: self.cursor.offset(position),
            kind: ParseErrorKind::Unexpected {
                expected: std::mem::take(&mut self.expected),
                found,
            },
        };
        log::debug!("parse failed: {err}");
        SyntaxError::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use grist_grammar::compile;
    use rstest::rstest;

    use super::*;
    use crate::tokenize;

    fn lex(grammar: &Grammar, src: &str) -> Vec<Token> {
        tokenize(grammar, src)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn expected(names: &[&str]) -> BTreeSet<Expected> {
        names
            .iter()
            .map(|&name| match name {
                "$" => Expected::EndOfInput,
                _ => Expected::Symbol(name.into()),
            })
            .collect()
    }

    fn html() -> Grammar {
        compile(
            "
            token TEXT { [^<]+ }
            @root rule html { (normal | italic)* }
            rule italic { '<i>' html '</i>' }
            rule normal { TEXT }
            ",
        )
        .unwrap()
    }

    #[test]
    fn nested_structure() {
        crate::init_logger();
        let grammar = html();
        let src = "a<i>b</i>c";
        let tree = parse(&grammar, &lex(&grammar, src)).unwrap();

        assert_eq!(
            tree.display(src, false).to_string(),
            "html
  normal
    TEXT \"a\"
  italic
    '<i>' \"<i>\"
    html
      normal
        TEXT \"b\"
    '</i>' \"</i>\"
  normal
    TEXT \"c\"
"
        );
        assert_eq!(tree.span(), Span::new(0, 10));
    }

    #[test]
    fn empty_input() {
        let grammar = html();
        let tree = parse(&grammar, &[]).unwrap();
        assert_eq!(tree.name().as_ref(), "html");
        assert!(tree.children().is_empty());
        assert_eq!(tree.span(), Span::at(0));
    }

    #[test]
    fn furthest_failure() {
        let grammar = compile("rule root { 'a' 'b' 'c' }").unwrap();
        let err = parse(&grammar, &lex(&grammar, "ab")).unwrap_err();
        assert_eq!(
            err,
            ParseError {
                offset: 2,
                kind: ParseErrorKind::Unexpected {
                    expected: expected(&["'c'"]),
                    found: Found::EndOfInput
                }
            }
        );
        assert_eq!(err.to_string(), "unexpected end of input, expected 'c' at offset 2");
    }

    #[rstest]
    #[case("a<i>b", 5, &["'</i>'", "'<i>'", "TEXT"])]
    #[case("a</i>", 1, &["'<i>'", "TEXT", "$"])]
    #[case("<i></i></i>", 7, &["'<i>'", "TEXT", "$"])]
    fn expected_sets(#[case] src: &str, #[case] offset: u32, #[case] names: &[&str]) {
        let grammar = html();
        let err = parse(&grammar, &lex(&grammar, src)).unwrap_err();
        assert_eq!(err.offset, offset);
        let ParseErrorKind::Unexpected { expected: set, .. } = err.kind else {
            panic!("unexpected error {err}");
        };
        assert_eq!(set, expected(names));
    }

    #[test]
    fn ordered_choice_commits() {
        // the first alternative wins even though the second would let the sequence continue
        let grammar = compile("rule r { ('a' | 'a' 'b') 'b' 'c' }").unwrap();
        assert!(parse(&grammar, &lex(&grammar, "abc")).is_ok());

        let grammar = compile("rule r { ('a' | 'a' 'b') 'c' }").unwrap();
        let err = parse(&grammar, &lex(&grammar, "abc")).unwrap_err();
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn skipped_tokens() {
        let grammar = compile(
            "
            @skip token Space { ' '+ }
            token Word { [a-z]+ }
            rule list { '(' (Word | list)* ')' }
            ",
        )
        .unwrap();
        let src = " ( a (b) ) ";
        let tokens = lex(&grammar, src);

        let tree = parse(&grammar, &tokens).unwrap();
        let text = tree.tokens().map(|t| t.text(src)).collect::<String>();
        assert_eq!(text, "(a(b))");
        assert_eq!(tree.span(), Span::new(1, 10));

        let options = ParserOptions {
            keep_skipped: true,
            ..Default::default()
        };
        let tree = parse_with(&grammar, &tokens, options).unwrap();
        let text = tree.tokens().map(|t| t.text(src)).collect::<String>();
        assert_eq!(text, src);
        assert_eq!(tree.span(), Span::new(0, 11));
    }

    #[test]
    fn token_start_symbol() {
        let grammar = compile("token Word { [a-z]+ }").unwrap();
        let tree = parse(&grammar, &lex(&grammar, "abc")).unwrap();
        assert!(matches!(tree, ParseNode::Terminal(_)));

        let err = parse(&grammar, &lex(&grammar, "")).unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[rstest]
    #[case(" abc ", Span::new(0, 5))]
    #[case("  abc", Span::new(0, 5))]
    #[case("abc ", Span::new(0, 4))]
    fn token_start_symbol_keeps_skipped(#[case] src: &str, #[case] span: Span) {
        let grammar = compile("token Word { [a-z]+ } @skip token Space { ' '+ }").unwrap();
        let tokens = lex(&grammar, src);

        let tree = parse(&grammar, &tokens).unwrap();
        assert_eq!(tree.as_token().map(|t| t.text(src)), Some("abc"));

        let options = ParserOptions {
            keep_skipped: true,
            ..Default::default()
        };
        let tree = parse_with(&grammar, &tokens, options).unwrap();
        let text = tree.tokens().map(|t| t.text(src)).collect::<String>();
        assert_eq!(text, src);
        assert_eq!(tree.span(), span);
        assert_eq!(tree.name().as_ref(), "Word");
        assert_eq!(tree.token_root().map(|t| t.text(src)), Some("abc"));
    }

    #[test]
    fn default_limit_fits_thread_stack() {
        let grammar = html();
        let nested = |n: usize| "<i>".repeat(n) + &"</i>".repeat(n);
        let limit = ParserOptions::default().recursion_limit as usize;

        // each level of italics nests `italic` and `html`
        let ok = nested((limit - 1) / 2);
        let deep = nested(limit / 2 + 1);
        let (ok, deep) = std::thread::spawn(move || {
            let ok = parse(&grammar, &lex(&grammar, &ok)).map(|_| ());
            let deep = parse(&grammar, &lex(&grammar, &deep)).map(|_| ());
            (ok, deep)
        })
        .join()
        .unwrap();

        assert_eq!(ok, Ok(()));
        assert!(
            matches!(
                deep,
                Err(ParseError {
                    kind: ParseErrorKind::RecursionLimit { limit: 256 },
                    ..
                })
            ),
            "{deep:?}"
        );
    }

    #[test]
    fn recursion_limit() {
        let grammar = compile("rule list { '(' list? ')' }").unwrap();
        let src = "(".repeat(50) + &")".repeat(50);
        let tokens = lex(&grammar, &src);

        assert!(parse(&grammar, &tokens).is_ok());

        let options = ParserOptions {
            recursion_limit: 10,
            ..Default::default()
        };
        let err = parse_with(&grammar, &tokens, options).unwrap_err();
        assert_eq!(
            err,
            ParseError {
                offset: 10,
                kind: ParseErrorKind::RecursionLimit { limit: 10 }
            }
        );
    }

    #[test]
    fn lazy_lexing() {
        let grammar = compile("token A { 'a' } rule r { A A }").unwrap();
        let lazy = |src| parse_lazy(&grammar, tokenize(&grammar, src), Default::default());

        let err = lazy("ab").unwrap_err();
        assert!(matches!(err, SyntaxError::Lex(LexError { offset: 1, .. })));

        // a complete match still has to look at what follows
        let err = lazy("aab").unwrap_err();
        assert!(matches!(err, SyntaxError::Lex(LexError { offset: 2, .. })));

        let err = lazy("a").unwrap_err();
        assert!(matches!(err, SyntaxError::Parse(ParseError { offset: 1, .. })));

        assert!(lazy("aa").is_ok());
    }

    #[test]
    fn lazy_failure_before_lexer_error() {
        let grammar = compile("token A { 'a' } token B { 'b' } rule r { A A }").unwrap();
        let err = parse_lazy(&grammar, tokenize(&grammar, "ab!"), Default::default()).unwrap_err();
        assert_eq!(
            err,
            SyntaxError::Parse(ParseError {
                offset: 1,
                kind: ParseErrorKind::Unexpected {
                    expected: expected(&["A"]),
                    found: Found::Token(lex(&grammar, "ab")[1].clone()),
                }
            })
        );
    }
}
