//! Grammar model: productions built from patterns over characters (tokens) or over tokens
//! (rules), validated once into an immutable [`Grammar`].

mod check;
pub mod error;
pub mod grammar;
pub mod linemap;
pub mod literal;
pub mod pattern;
mod resolve;
pub mod span;
pub mod syntax;

use std::sync::Arc;

pub use error::GrammarError;
pub use grammar::{Attributes, Grammar, GrammarBuilder, Production, SymbolId, SymbolKind};
pub use pattern::{CharClass, ClassItem, NamedClass, Pattern, Repeat};
pub use span::Span;
pub use syntax::compile;

/// Names of productions and the text of literals, cheap to clone and shareable between threads.
pub type Name = Arc<str>;
