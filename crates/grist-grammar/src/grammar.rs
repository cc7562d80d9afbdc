use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Display,
};

use cranelift_entity::{entity_impl, EntitySet, PrimaryMap};

use crate::{
    check,
    error::{ErrorAccumulator, GrammarError},
    pattern::Pattern,
    resolve,
    span::Span,
    Name,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SymbolId(u32);

entity_impl! { SymbolId }

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolKind {
    Token,
    Rule,
}

#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Attributes {
    pub root: bool,
    pub skip: bool,
    pub word: bool,
    pub unquote: bool,
}

#[derive(Clone, Debug)]
pub struct Production {
    pub name: Name,
    pub kind: SymbolKind,
    pub pattern: Pattern,
    pub attributes: Attributes,
    /// Where the production was declared, if it came from grammar text.
    pub span: Option<Span>,
    /// Tokens created for literals used in rules without a token declaring them.
    pub implicit: bool,
}

impl Production {
    fn new(name: Name, kind: SymbolKind, pattern: Pattern) -> Production {
        Production {
            name,
            kind,
            pattern,
            attributes: Attributes::default(),
            span: None,
            implicit: false,
        }
    }
    pub fn is_token(&self) -> bool {
        self.kind == SymbolKind::Token
    }
    pub fn is_rule(&self) -> bool {
        self.kind == SymbolKind::Rule
    }
    /// The parser ignores tokens of this kind.
    pub fn skip(&mut self) -> &mut Self {
        self.attributes.skip = true;
        self
    }
    /// Literal tokens used in rules which are matched by this token are lexed as keywords.
    pub fn word(&mut self) -> &mut Self {
        self.attributes.word = true;
        self
    }
    /// Decode the token text by removing its delimiters and processing escapes.
    pub fn unquote(&mut self) -> &mut Self {
        self.attributes.unquote = true;
        self
    }
    /// Make this rule the start of the grammar.
    pub fn root(&mut self) -> &mut Self {
        self.attributes.root = true;
        self
    }
    pub fn at(&mut self, span: Span) -> &mut Self {
        self.span = Some(span);
        self
    }
}

#[derive(Default)]
pub struct GrammarBuilder {
    productions: Vec<Production>,
    start: Option<Name>,
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        GrammarBuilder::default()
    }
    pub fn define_token(&mut self, name: impl Into<Name>, pattern: Pattern) -> &mut Production {
        self.define(Production::new(name.into(), SymbolKind::Token, pattern))
    }
    pub fn define_rule(&mut self, name: impl Into<Name>, pattern: Pattern) -> &mut Production {
        self.define(Production::new(name.into(), SymbolKind::Rule, pattern))
    }
    fn define(&mut self, production: Production) -> &mut Production {
        self.productions.push(production);
        let last = self.productions.len() - 1;
        &mut self.productions[last]
    }
    pub fn set_start(&mut self, name: impl Into<Name>) -> &mut Self {
        self.start = Some(name.into());
        self
    }

    /// Validate the productions and resolve them into a [`Grammar`].
    ///
    /// Every problem found is reported, not just the first one.
    pub fn build(self) -> Result<Grammar, Vec<GrammarError>> {
        if self.productions.is_empty() {
            return Err(vec![GrammarError::EmptyGrammar]);
        }

        let err = ErrorAccumulator::new();

        let mut productions = PrimaryMap::new();
        let mut names = HashMap::new();
        for production in self.productions {
            match names.entry(production.name.clone()) {
                Entry::Occupied(_) => err.error(GrammarError::DuplicateProduction {
                    name: production.name.clone(),
                    span: production.span,
                }),
                Entry::Vacant(v) => {
                    v.insert(productions.push(production));
                }
            }
        }

        let declared = productions.len();
        resolve::check_tokens(&productions, &err);
        let literals = resolve::resolve_rules(&mut productions, &names, &err);

        let start = find_start(self.start, &productions, &names, &err);
        check::check_left_recursion(&productions, &names, &err);

        // a missing start has always been reported
        let start = match start {
            Some(start) if err.is_empty() => start,
            _ => return Err(err.finish()),
        };

        let keywords = resolve::find_keywords(&productions);
        let lex_order = lexing_order(&productions, declared, &keywords);

        let grammar = Grammar {
            productions,
            names,
            literals,
            keywords,
            lex_order,
            start,
        };

        log::debug!(
            "built grammar with {} tokens and {} rules, starting at `{}`",
            grammar.tokens().count(),
            grammar.rules().count(),
            grammar.name(start)
        );

        Ok(grammar)
    }
}

fn find_start(
    explicit: Option<Name>,
    productions: &PrimaryMap<SymbolId, Production>,
    names: &HashMap<Name, SymbolId>,
    err: &ErrorAccumulator,
) -> Option<SymbolId> {
    if let Some(name) = explicit {
        let found = names.get(&name).copied();
        if found.is_none() {
            err.error(GrammarError::UndefinedStart { name });
        }
        return found;
    }

    let roots = productions
        .iter()
        .filter(|(_, p)| p.is_rule() && p.attributes.root)
        .map(|(handle, _)| handle)
        .collect::<Vec<_>>();

    if roots.len() > 1 {
        err.error(GrammarError::MultipleRoots {
            names: roots.iter().map(|&r| productions[r].name.clone()).collect(),
        });
        return None;
    }

    roots
        .first()
        .copied()
        .or_else(|| productions.iter().find(|(_, p)| p.is_rule()).map(|(h, _)| h))
        .or_else(|| productions.keys().next())
}

/// Implicit literal tokens go first so that punctuation wins over the declared catch-all tokens,
/// keywords are not tried at all since they're lexed through their word token.
fn lexing_order(
    productions: &PrimaryMap<SymbolId, Production>,
    declared: usize,
    keywords: &HashMap<Name, (SymbolId, SymbolId)>,
) -> Vec<SymbolId> {
    let mut is_keyword = EntitySet::new();
    for &(_, keyword) in keywords.values() {
        is_keyword.insert(keyword);
    }

    let implicit = productions
        .keys()
        .skip(declared)
        .filter(|&handle| !is_keyword.contains(handle));
    let explicit = productions
        .iter()
        .take(declared)
        .filter(|&(handle, p)| p.is_token() && !is_keyword.contains(handle))
        .map(|(handle, _)| handle);

    implicit.chain(explicit).collect()
}

/// An immutable, validated grammar. Safe to share between threads.
#[derive(Debug)]
pub struct Grammar {
    productions: PrimaryMap<SymbolId, Production>,
    names: HashMap<Name, SymbolId>,
    literals: HashMap<Name, SymbolId>,
    /// keyword text -> (word token, keyword token)
    keywords: HashMap<Name, (SymbolId, SymbolId)>,
    lex_order: Vec<SymbolId>,
    start: SymbolId,
}

impl Grammar {
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }
    pub fn start(&self) -> SymbolId {
        self.start
    }
    pub fn get(&self, handle: SymbolId) -> &Production {
        &self.productions[handle]
    }
    pub fn name(&self, handle: SymbolId) -> &Name {
        &self.productions[handle].name
    }
    /// Look up a production by name, implicit literal tokens are found through
    /// [`Grammar::literal_token`] instead.
    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.names.get(name).copied()
    }
    /// The token which matches exactly `text`.
    pub fn literal_token(&self, text: &str) -> Option<SymbolId> {
        self.literals.get(text).copied()
    }
    /// If `text` matched by `word` is a keyword, returns the keyword token.
    pub fn keyword(&self, word: SymbolId, text: &str) -> Option<SymbolId> {
        match self.keywords.get(text) {
            Some(&(source, keyword)) if source == word => Some(keyword),
            _ => None,
        }
    }
    /// Tokens in the order the lexer tries them, the first one to match wins.
    ///
    /// Literals written inside rules without a declared token come first, in order of appearance,
    /// followed by the declared tokens in declaration order. So `'<i>'` used in a rule beats a
    /// catch-all like `[^ ]+`, while a declared `token Open { '<i>' }` placed after that
    /// catch-all never matches. Keyword tokens are missing, they are lexed by their `@word` token.
    pub fn lex_order(&self) -> &[SymbolId] {
        &self.lex_order
    }
    pub fn len(&self) -> usize {
        self.productions.len()
    }
    pub fn iter(&self) -> cranelift_entity::Iter<'_, SymbolId, Production> {
        self.productions.iter()
    }
    pub fn tokens(&self) -> impl Iterator<Item = (SymbolId, &Production)> + '_ {
        self.iter().filter(|(_, p)| p.is_token())
    }
    pub fn rules(&self) -> impl Iterator<Item = (SymbolId, &Production)> + '_ {
        self.iter().filter(|(_, p)| p.is_rule())
    }

    /// Rules reachable from the start symbol, in declaration order.
    pub fn reachable_rules(&self) -> Vec<SymbolId> {
        let mut seen = EntitySet::new();
        let mut stack = vec![self.start];
        seen.insert(self.start);

        while let Some(handle) = stack.pop() {
            for name in self.get(handle).pattern.references() {
                if let Some(next) = self.symbol(name) {
                    if !seen.contains(next) {
                        seen.insert(next);
                        stack.push(next);
                    }
                }
            }
        }

        self.rules()
            .map(|(handle, _)| handle)
            .filter(|&handle| seen.contains(handle))
            .collect()
    }
}

/// Prints the grammar in the same syntax it can be compiled from.
impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (handle, production) in self.iter() {
            if production.implicit {
                continue;
            }

            let Attributes {
                root,
                skip,
                word,
                unquote,
            } = production.attributes;
            let root = root || (handle == self.start && production.is_rule());
            for (set, name) in [
                (root, "root"),
                (skip, "skip"),
                (word, "word"),
                (unquote, "unquote"),
            ] {
                if set {
                    write!(f, "@{name} ")?;
                }
            }

            let keyword = match production.kind {
                SymbolKind::Token => "token",
                SymbolKind::Rule => "rule",
            };
            writeln!(f, "{keyword} {} {{ {} }}", production.name, production.pattern)?;
        }
        Ok(())
    }
}
