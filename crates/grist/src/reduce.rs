use std::sync::Arc;

use cranelift_entity::SecondaryMap;
use grist_grammar::{Grammar, Name, SymbolId};
use grist_runtime::{ParseNode, Token, VisitEvent};
use thiserror::Error;

type LeafFn<V> = dyn Fn(&Token, &str) -> V + Send + Sync;
type RuleFn<V> = dyn Fn(Vec<V>) -> V + Send + Sync;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("no reduction rule for {}", display_names(.names))]
pub struct MissingReductionRule {
    pub names: Vec<Name>,
}

fn display_names(names: &[Name]) -> String {
    names
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reduction semantics not yet bound to a grammar. The same builder can be built against several
/// grammars which share rule names.
pub struct ReductionBuilder<V> {
    leaf: Arc<LeafFn<V>>,
    rules: Vec<(Name, Arc<RuleFn<V>>)>,
}

impl<V> Clone for ReductionBuilder<V> {
    fn clone(&self) -> Self {
        Self {
            leaf: Arc::clone(&self.leaf),
            rules: self.rules.clone(),
        }
    }
}

impl<V> ReductionBuilder<V> {
    /// Reduce nodes of the rule `name` from the values of their children, registering a name
    /// again replaces the previous function.
    pub fn rule(mut self, name: &str, reduce: impl Fn(Vec<V>) -> V + Send + Sync + 'static) -> Self {
        self.rules.push((name.into(), Arc::new(reduce)));
        self
    }

    /// Fails if a rule reachable from the start symbol has nothing to reduce it. Registered names
    /// which are not rules of `grammar` are ignored.
    pub fn build(&self, grammar: &Grammar) -> Result<Reduction<V>, MissingReductionRule> {
        let mut rules: SecondaryMap<SymbolId, Option<Arc<RuleFn<V>>>> = SecondaryMap::new();
        for (name, reduce) in &self.rules {
            match grammar.symbol(name) {
                Some(handle) if grammar.get(handle).is_rule() => {
                    rules[handle] = Some(Arc::clone(reduce))
                }
                _ => log::debug!("grammar has no rule `{name}`, ignoring its reduction"),
            }
        }

        let names = grammar
            .reachable_rules()
            .into_iter()
            .filter(|&handle| rules[handle].is_none())
            .map(|handle| grammar.name(handle).clone())
            .collect::<Vec<_>>();

        if !names.is_empty() {
            return Err(MissingReductionRule { names });
        }

        Ok(Reduction {
            leaf: Arc::clone(&self.leaf),
            rules,
        })
    }
}

/// Folds parse trees of one grammar into values of `V`.
///
/// Tokens become values through the leaf function, every rule node is replaced by its rule
/// applied to the values of its children in order. Skip tokens kept in the tree are not reduced.
pub struct Reduction<V> {
    leaf: Arc<LeafFn<V>>,
    rules: SecondaryMap<SymbolId, Option<Arc<RuleFn<V>>>>,
}

impl<V> Reduction<V> {
    /// `leaf` receives every significant token together with its value, the decoded content for
    /// `@unquote` tokens and the source text otherwise.
    pub fn builder(leaf: impl Fn(&Token, &str) -> V + Send + Sync + 'static) -> ReductionBuilder<V> {
        ReductionBuilder {
            leaf: Arc::new(leaf),
            rules: Vec::new(),
        }
    }

    /// Post-order fold of `tree`, which was parsed from `src`. Only fails if the tree contains a
    /// rule this reduction was not built for.
    pub fn reduce(&self, tree: &ParseNode, src: &str) -> Result<V, MissingReductionRule> {
        if let Some(token) = tree.token_root() {
            return Ok((self.leaf)(token, token.value(src)));
        }

        let mut values: Vec<V> = Vec::new();
        // where the values of each open rule's children begin
        let mut starts: Vec<usize> = Vec::new();

        for (event, node) in tree.visit() {
            match (event, node) {
                (VisitEvent::Open, _) => starts.push(values.len()),
                (VisitEvent::Token, ParseNode::Terminal(token)) => {
                    if !token.skip {
                        values.push((self.leaf)(token, token.value(src)));
                    }
                }
                (VisitEvent::Close, ParseNode::Rule(rule)) => {
                    let Some(reduce) = &self.rules[rule.kind] else {
                        return Err(MissingReductionRule {
                            names: vec![rule.name.clone()],
                        });
                    };
                    let start = starts.pop().unwrap_or_default();
                    let children = values.split_off(start);
                    log::trace!("reducing `{}` from {} values", rule.name, children.len());
                    values.push(reduce(children));
                }
                _ => {}
            }
        }

        debug_assert_eq!(values.len(), 1);
        match values.pop() {
            Some(value) => Ok(value),
            None => unreachable!("Closing the root leaves its value"),
        }
    }
}
