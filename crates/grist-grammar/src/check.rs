use std::collections::HashMap;

use cranelift_entity::{EntitySet, PrimaryMap, SecondaryMap};

use crate::{
    error::{ErrorAccumulator, GrammarError},
    grammar::{Production, SymbolId},
    pattern::Pattern,
    Name,
};

struct CheckCx<'a> {
    productions: &'a PrimaryMap<SymbolId, Production>,
    names: &'a HashMap<Name, SymbolId>,
    nullable: SecondaryMap<SymbolId, bool>,
}

impl CheckCx<'_> {
    fn rule(&self, name: &str) -> Option<SymbolId> {
        let handle = *self.names.get(name)?;
        self.productions[handle].is_rule().then_some(handle)
    }

    fn is_nullable(&self, pattern: &Pattern) -> bool {
        match pattern {
            // within rules these are tokens, which always consume input
            Pattern::Literal(_) | Pattern::Class(_) => false,
            Pattern::Sequence(items) => items.iter().all(|p| self.is_nullable(p)),
            Pattern::Choice(items) => items.iter().any(|p| self.is_nullable(p)),
            Pattern::Repeat(inner, repeat) => repeat.min() == 0 || self.is_nullable(inner),
            Pattern::Reference(name) => self.rule(name).map_or(false, |r| self.nullable[r]),
        }
    }
}

/// Rules which can match without consuming any tokens, computed as a fixpoint.
fn compute_nullable(cx: &mut CheckCx) {
    loop {
        let mut changed = false;
        for (handle, rule) in cx.productions.iter().filter(|(_, p)| p.is_rule()) {
            if !cx.nullable[handle] && cx.is_nullable(&rule.pattern) {
                cx.nullable[handle] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Left recursion is reported for every rule which can reach itself without consuming a token.
/// The parser is top-down and would never terminate on such a rule.
pub fn check_left_recursion(
    productions: &PrimaryMap<SymbolId, Production>,
    names: &HashMap<Name, SymbolId>,
    err: &ErrorAccumulator,
) {
    let mut cx = CheckCx {
        productions,
        names,
        nullable: SecondaryMap::new(),
    };
    compute_nullable(&mut cx);

    let mut prefix_rules: SecondaryMap<SymbolId, Vec<SymbolId>> = SecondaryMap::new();
    for (handle, rule) in productions.iter().filter(|(_, p)| p.is_rule()) {
        let mut set = Vec::new();
        collect_prefix_rules(&rule.pattern, &cx, &mut set);
        prefix_rules[handle] = set;
    }

    let mut visited = EntitySet::new();
    let mut stack = Vec::new();
    for (handle, _) in productions.iter().filter(|(_, p)| p.is_rule()) {
        find_prefix_cycles(handle, &prefix_rules, &mut visited, &mut stack, productions, err);
    }
}

/// Collects rules which may be entered before anything is consumed, returns whether the pattern
/// is able to match nothing, in which case the following patterns are also in prefix position.
fn collect_prefix_rules(pattern: &Pattern, cx: &CheckCx, rules: &mut Vec<SymbolId>) -> bool {
    match pattern {
        Pattern::Literal(_) | Pattern::Class(_) => false,
        Pattern::Sequence(items) => {
            for item in items {
                if !collect_prefix_rules(item, cx, rules) {
                    return false;
                }
            }
            true
        }
        Pattern::Choice(items) => {
            let mut any = false;
            for item in items {
                any |= collect_prefix_rules(item, cx, rules);
            }
            any
        }
        Pattern::Repeat(inner, repeat) => {
            let nullable = collect_prefix_rules(inner, cx, rules);
            repeat.min() == 0 || nullable
        }
        Pattern::Reference(name) => match cx.rule(name) {
            Some(handle) => {
                if !rules.contains(&handle) {
                    rules.push(handle);
                }
                cx.nullable[handle]
            }
            None => false,
        },
    }
}

fn find_prefix_cycles(
    handle: SymbolId,

    prefix_rules: &SecondaryMap<SymbolId, Vec<SymbolId>>,
    visited: &mut EntitySet<SymbolId>,
    stack: &mut Vec<SymbolId>,

    productions: &PrimaryMap<SymbolId, Production>,
    err: &ErrorAccumulator,
) {
    if let Some(pos) = stack.iter().position(|&rule| rule == handle) {
        //      /pos
        // A -> B -> C -> D
        //      ↑________|
        let mut cycle = stack[pos..]
            .iter()
            .map(|&r| productions[r].name.clone())
            .collect::<Vec<_>>();
        cycle.push(productions[handle].name.clone());

        err.error(GrammarError::UnboundedLeftRecursion {
            cycle,
            span: productions[handle].span,
        });
        return;
    }

    if visited.contains(handle) {
        return;
    }
    visited.insert(handle);

    stack.push(handle);
    for &next in &prefix_rules[handle] {
        find_prefix_cycles(next, prefix_rules, visited, stack, productions, err);
    }
    stack.pop();
}

#[cfg(test)]
mod tests {
    use crate::{error::GrammarError, grammar::Grammar, pattern::Pattern};

    fn cycles(errors: Vec<GrammarError>) -> Vec<String> {
        errors
            .into_iter()
            .map(|e| match e {
                GrammarError::UnboundedLeftRecursion { cycle, .. } => cycle.join(" "),
                other => panic!("unexpected error {other}"),
            })
            .collect()
    }

    #[test]
    fn direct_left_recursion() {
        let mut b = Grammar::builder();
        b.define_rule(
            "expr",
            Pattern::choice([
                Pattern::seq([Pattern::reference("expr"), Pattern::literal("+")]),
                Pattern::literal("x"),
            ]),
        );
        assert_eq!(cycles(b.build().err().unwrap()), ["expr expr"]);
    }

    #[test]
    fn recursion_through_nullable_prefix() {
        let mut b = Grammar::builder();
        b.define_rule("a", Pattern::seq([Pattern::reference("opt"), Pattern::reference("b")]));
        b.define_rule("b", Pattern::seq([Pattern::literal("x").zero_or_more(), Pattern::reference("a")]));
        b.define_rule("opt", Pattern::literal("y").optional());
        assert_eq!(cycles(b.build().err().unwrap()), ["a b a"]);
    }

    #[test]
    fn guarded_recursion_is_fine() {
        let mut b = Grammar::builder();
        b.define_rule(
            "list",
            Pattern::seq([
                Pattern::literal("("),
                Pattern::reference("list").zero_or_more(),
                Pattern::literal(")"),
            ]),
        );
        b.define_rule(
            "tail",
            Pattern::seq([Pattern::literal("x"), Pattern::reference("tail").optional()]),
        );
        assert!(b.build().is_ok());
    }

    #[test]
    fn repeated_nullable_rule() {
        let mut b = Grammar::builder();
        b.define_rule("a", Pattern::reference("b").one_or_more());
        b.define_rule("b", Pattern::choice([Pattern::literal("x"), Pattern::reference("a")]));
        assert_eq!(cycles(b.build().err().unwrap()), ["a b a"]);
    }
}
