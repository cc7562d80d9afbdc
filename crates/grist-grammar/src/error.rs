use std::cell::RefCell;

use thiserror::Error;

use crate::{span::Span, Name};

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum GrammarError {
    /// Grammar text which could not be read at all.
    #[error("{message} at {span}")]
    Syntax { message: String, span: Span },
    #[error("`{name}` is defined more than once")]
    DuplicateProduction { name: Name, span: Option<Span> },
    #[error("`{production}` references undefined nonterminal `{name}`")]
    UndefinedNonterminal {
        production: Name,
        name: Name,
        span: Option<Span>,
    },
    #[error("token `{token}` references `{reference}`, tokens must be regular")]
    TokenNotRegular {
        token: Name,
        reference: Name,
        span: Option<Span>,
    },
    #[error("rule `{rule}` contains a character class, rules match tokens not characters")]
    ClassInRule { rule: Name, span: Option<Span> },
    #[error("start nonterminal `{name}` is not defined")]
    UndefinedStart { name: Name },
    #[error("only one rule may be marked as the root, found {}", .names.join(", "))]
    MultipleRoots { names: Vec<Name> },
    #[error("grammar has no productions")]
    EmptyGrammar,
    #[error("left recursion through {}", .cycle.join(" -> "))]
    UnboundedLeftRecursion { cycle: Vec<Name>, span: Option<Span> },
}

impl GrammarError {
    /// Location in the grammar text, available for grammars compiled from text.
    pub fn span(&self) -> Option<Span> {
        match *self {
            GrammarError::Syntax { span, .. } => Some(span),
            GrammarError::DuplicateProduction { span, .. }
            | GrammarError::UndefinedNonterminal { span, .. }
            | GrammarError::TokenNotRegular { span, .. }
            | GrammarError::ClassInRule { span, .. }
            | GrammarError::UnboundedLeftRecursion { span, .. } => span,
            GrammarError::UndefinedStart { .. }
            | GrammarError::MultipleRoots { .. }
            | GrammarError::EmptyGrammar => None,
        }
    }
}

#[derive(Default)]
pub struct ErrorAccumulator {
    errors: RefCell<Vec<GrammarError>>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn error(&self, err: GrammarError) {
        log::debug!("grammar error: {err}");
        self.errors.borrow_mut().push(err);
    }
    pub fn syntax(&self, span: Span, message: impl ToString) {
        self.error(GrammarError::Syntax {
            message: message.to_string(),
            span,
        });
    }
    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
    pub fn finish(self) -> Vec<GrammarError> {
        RefCell::into_inner(self.errors)
    }
}
