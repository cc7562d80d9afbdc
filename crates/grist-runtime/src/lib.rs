//! Runtime for grammars built by `grist-grammar`: a lexer producing [`Token`]s and a parser
//! producing a [`ParseNode`] tree.

mod cursor;
pub mod lexer;
pub mod parser;
pub mod tree;

use grist_grammar::{Name, Span, SymbolId};

pub use lexer::{tokenize, tokenize_bytes, LexError, LexErrorReason, Lexer};
pub use parser::{
    parse, parse_lazy, parse_with, Expected, Found, ParseError, ParseErrorKind, ParserOptions,
    SyntaxError,
};
pub use tree::{ParseNode, RuleNode, VisitEvent};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    /// The token production.
    pub kind: SymbolId,
    pub name: Name,
    /// Byte range in the input.
    pub span: Span,
    /// Decoded content of `@unquote` tokens.
    pub value: Option<String>,
    /// Trivia ignored by the parser.
    pub skip: bool,
}

impl Token {
    #[track_caller]
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        self.span.as_str(src)
    }
    /// The decoded value if there is one, otherwise the text.
    pub fn value<'a>(&'a self, src: &'a str) -> &'a str {
        self.value.as_deref().unwrap_or_else(|| self.text(src))
    }
}

#[cfg(test)]
pub(crate) fn init_logger() {
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Trace, simplelog::Config::default());
}
