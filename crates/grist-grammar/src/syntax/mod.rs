//! The textual grammar surface.
//!
//! ```text
//! // line comment
//! @skip token Space { [ \t\r\n]+ }
//! @word token Ident { [a-zA-Z_] [a-zA-Z_0-9]* }
//! @root rule list { '(' (Ident | list)* ')' }
//! ```
//!
//! Token patterns are matched like rules are: repetition is greedy and never gives back what it
//! took. `'"' .* '"'` therefore never matches since `.*` eats the closing quote, exclude the
//! terminator instead as in `'"' [^"]* '"'`.

mod convert;
mod lexer;
mod parser;

use crate::{error::ErrorAccumulator, grammar::Grammar, span::Span, GrammarError, Name};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemKind {
    Token,
    Rule,
}

/// A single declaration as written, before any validation.
#[derive(Clone, Debug)]
pub struct Item {
    pub attributes: Vec<(Name, Span)>,
    pub kind: ItemKind,
    pub name: Name,
    pub pattern: crate::pattern::Pattern,
    pub span: Span,
}

/// Parse grammar text into its declarations.
pub fn parse_items(src: &str) -> Result<Vec<Item>, Vec<GrammarError>> {
    let err = ErrorAccumulator::new();

    let mut l = lexer::Lexer::new(src);
    let (tokens, trivia) = lexer::lex(&mut l, src);
    log::trace!(
        "grammar text has {} tokens and {} trivia",
        tokens.len(),
        trivia.len()
    );

    let mut p = parser::Parser::new(src, tokens, &err);
    let items = parser::file(&mut p);

    if err.is_empty() {
        Ok(items)
    } else {
        Err(err.finish())
    }
}

/// Compile grammar text into a [`Grammar`]. Syntax errors are reported on their own, semantic
/// checks only run on text which could be read completely.
pub fn compile(src: &str) -> Result<Grammar, Vec<GrammarError>> {
    let items = parse_items(src)?;
    convert::convert(items)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{CharClass, Pattern};

    #[test]
    fn compile_markup() {
        let grammar = compile(
            "
            // text up to the next tag
            token TEXT { [^<]+ }
            @root rule html { (normal | italic)* }
            rule italic { '<i>' html '</i>' }
            rule normal { TEXT }
            ",
        )
        .unwrap();

        assert_eq!(&**grammar.name(grammar.start()), "html");
        assert_eq!(
            grammar.get(grammar.symbol("TEXT").unwrap()).pattern,
            Pattern::class(CharClass::new([crate::pattern::ClassItem::Char('<')]).negate())
                .one_or_more()
        );
        assert!(grammar.literal_token("</i>").is_some());
    }

    #[test]
    fn display_compiles_back() {
        let src = r#"
            @skip token Space { [ \t\r\n]+ }
            @word token Ident { [a-zA-Z_] [a-zA-Z_0-9]* }
            @unquote token String { '"' ([^"\\] | '\\' .)* '"' }
            rule stmt { 'let' Ident '=' (String | Ident) ';'? }
            @root rule file { stmt* }
        "#;
        let grammar = compile(src).unwrap();
        let printed = grammar.to_string();
        let again = compile(&printed).unwrap();
        assert_eq!(printed, again.to_string());
        assert_eq!(&**again.name(again.start()), "file");
    }

    #[test]
    fn syntax_errors_are_collected() {
        let errors = compile(
            "
            token A { 'a'
            rule b { }
            rule c { 'c' }
            token D { 'unterminated }
            ",
        )
        .unwrap_err();

        let messages = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>();
        assert_eq!(messages.len(), 4, "{messages:#?}");
        assert!(messages[0].starts_with("Expected '}', found 'rule'"));
        assert!(messages[1].starts_with("Expected a pattern"));
        assert!(messages[2].starts_with("Unterminated literal"));
        assert!(messages[3].starts_with("Expected '}', found end of input"));
    }

    #[test]
    fn semantic_errors_carry_spans() {
        let src = "rule a { b }";
        let errors = compile(src).unwrap_err();
        let span = errors[0].span().unwrap();
        assert_eq!(span.as_str(src), src);
    }

    #[test]
    fn attribute_errors() {
        let errors = compile("@word rule a { 'x' } @shiny token B { 'b' }").unwrap_err();
        assert_eq!(
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            [
                "`@word` can only be applied to tokens at 1..5",
                "Unknown attribute `@shiny` at 22..27"
            ]
        );
    }
}
