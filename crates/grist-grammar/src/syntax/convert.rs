use crate::{
    error::{ErrorAccumulator, GrammarError},
    grammar::GrammarBuilder,
};

use super::{Item, ItemKind};

/// Turns parsed declarations into builder calls, checking that attributes are known and fit the
/// kind of production they are applied to.
pub fn convert(items: Vec<Item>) -> Result<GrammarBuilder, Vec<GrammarError>> {
    let err = ErrorAccumulator::new();
    let mut builder = GrammarBuilder::new();

    for item in items {
        let production = match item.kind {
            ItemKind::Token => builder.define_token(item.name, item.pattern),
            ItemKind::Rule => builder.define_rule(item.name, item.pattern),
        };
        production.at(item.span);

        for (attribute, span) in item.attributes {
            let applies = match (&*attribute, item.kind) {
                ("root", ItemKind::Rule) => {
                    production.root();
                    true
                }
                ("skip", ItemKind::Token) => {
                    production.skip();
                    true
                }
                ("word", ItemKind::Token) => {
                    production.word();
                    true
                }
                ("unquote", ItemKind::Token) => {
                    production.unquote();
                    true
                }
                ("root" | "skip" | "word" | "unquote", _) => false,
                _ => {
                    err.syntax(span, format_args!("Unknown attribute `@{attribute}`"));
                    continue;
                }
            };

            if !applies {
                let target = match item.kind {
                    ItemKind::Token => "rules",
                    ItemKind::Rule => "tokens",
                };
                err.syntax(
                    span,
                    format_args!("`@{attribute}` can only be applied to {target}"),
                );
            }
        }
    }

    if err.is_empty() {
        Ok(builder)
    } else {
        Err(err.finish())
    }
}
