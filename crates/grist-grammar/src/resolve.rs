//! Resolve names and literals of rules. There are no scopes, every production is visible from
//! every other one.

use std::collections::HashMap;

use cranelift_entity::PrimaryMap;

use crate::{
    error::{ErrorAccumulator, GrammarError},
    grammar::{Production, SymbolId, SymbolKind},
    literal::quote,
    pattern::Pattern,
    Name,
};

/// Tokens are matched on characters, so they may only contain regular patterns.
pub fn check_tokens(productions: &PrimaryMap<SymbolId, Production>, err: &ErrorAccumulator) {
    for (_, token) in productions.iter().filter(|(_, p)| p.is_token()) {
        if token.pattern.has_starved_tail() {
            log::warn!(
                "token `{}` repeats `.` before the end of a sequence, nothing after it can match",
                token.name
            );
        }
        for reference in token.pattern.references() {
            err.error(GrammarError::TokenNotRegular {
                token: token.name.clone(),
                reference: reference.clone(),
                span: token.span,
            });
        }
    }
}

/// Checks that rules only reference defined productions and creates tokens for literals which
/// have no corresponding token. Returns the mapping of literal text to its token.
pub fn resolve_rules(
    productions: &mut PrimaryMap<SymbolId, Production>,
    names: &HashMap<Name, SymbolId>,
    err: &ErrorAccumulator,
) -> HashMap<Name, SymbolId> {
    let mut literals = HashMap::new();
    for (handle, production) in productions.iter() {
        if let (SymbolKind::Token, Pattern::Literal(text)) = (production.kind, &production.pattern)
        {
            // duplicates are allowed, we insert the first occurence
            literals.entry(text.clone()).or_insert(handle);
        }
    }

    let mut missing = Vec::new();
    for (_, rule) in productions.iter().filter(|(_, p)| p.is_rule()) {
        let mut saw_class = false;
        rule.pattern.visit(&mut |pattern| match pattern {
            Pattern::Reference(name) if !names.contains_key(name) => {
                err.error(GrammarError::UndefinedNonterminal {
                    production: rule.name.clone(),
                    name: name.clone(),
                    span: rule.span,
                });
            }
            Pattern::Class(_) if !saw_class => {
                saw_class = true;
                err.error(GrammarError::ClassInRule {
                    rule: rule.name.clone(),
                    span: rule.span,
                });
            }
            Pattern::Literal(text) => {
                if !literals.contains_key(text) && !missing.contains(text) {
                    missing.push(text.clone());
                }
            }
            _ => {}
        });
    }

    for text in missing {
        let name: Name = quote(&text).into();
        let handle = productions.push(Production {
            name,
            kind: SymbolKind::Token,
            pattern: Pattern::Literal(text.clone()),
            attributes: Default::default(),
            span: None,
            implicit: true,
        });
        literals.insert(text, handle);
    }

    literals
}

/// Literal tokens which are also matched by some `@word` token. The lexer never tries these
/// directly, the word token is matched and then its text is looked up.
pub fn find_keywords(
    productions: &PrimaryMap<SymbolId, Production>,
) -> HashMap<Name, (SymbolId, SymbolId)> {
    let words = productions
        .iter()
        .filter(|(_, p)| p.is_token() && p.attributes.word)
        .collect::<Vec<_>>();

    let mut keywords = HashMap::new();
    if words.is_empty() {
        return keywords;
    }

    for (handle, token) in productions.iter() {
        let Pattern::Literal(text) = &token.pattern else {
            continue;
        };
        if !token.is_token() || token.attributes.word || keywords.contains_key(text) {
            continue;
        }
        if let Some(&(word, _)) = words.iter().find(|(_, w)| w.pattern.matches_exactly(text)) {
            log::trace!("`{}` is a keyword of `{}`", token.name, productions[word].name);
            keywords.insert(text.clone(), (word, handle));
        }
    }

    keywords
}
