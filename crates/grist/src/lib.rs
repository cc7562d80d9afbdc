//! Grammar-driven text processing: compile a grammar, then lex, parse and reduce input into values
//! of your own abstract syntax.
//!
//! ```
//! use grist::{compile_grammar, process, Reduction};
//!
//! let grammar = compile_grammar("token Num { [0-9]+ } @root rule list { Num* }").unwrap();
//! let sum = Reduction::builder(|_, text: &str| text.parse::<u64>().unwrap())
//!     .rule("list", |values| values.into_iter().sum())
//!     .build(&grammar)
//!     .unwrap();
//! assert_eq!(process(&grammar, "123", &sum).unwrap(), 123);
//! ```

mod config;
mod error;
pub mod reduce;

pub use config::Config;
pub use error::PipelineError;
pub use reduce::{MissingReductionRule, Reduction, ReductionBuilder};

pub use grist_grammar::{self as grammar, Grammar, GrammarError, Name, Span, SymbolId};
pub use grist_runtime::{self as runtime, ParseNode, Token};

/// Compile grammar text, all errors found in the text are returned together.
pub fn compile_grammar(definition: &str) -> Result<Grammar, Vec<GrammarError>> {
    let grammar = grist_grammar::compile(definition)?;
    log::debug!(
        "compiled grammar with {} productions starting at `{}`",
        grammar.len(),
        grammar.name(grammar.start())
    );
    Ok(grammar)
}

pub fn process<V>(
    grammar: &Grammar,
    input: &str,
    reduction: &Reduction<V>,
) -> Result<V, PipelineError> {
    process_with(grammar, input, reduction, &Config::default())
}

/// Lex and parse `input` in one pass and reduce the resulting tree.
pub fn process_with<V>(
    grammar: &Grammar,
    input: &str,
    reduction: &Reduction<V>,
    config: &Config,
) -> Result<V, PipelineError> {
    let lexer = grist_runtime::tokenize(grammar, input);
    reduce_lexed(grammar, lexer, reduction, config)
}

/// Like [`process_with`] for input which may not be UTF-8, invalid bytes end the input with a
/// [`grist_runtime::LexErrorReason::InvalidUtf8`] error.
pub fn process_bytes<V>(
    grammar: &Grammar,
    input: &[u8],
    reduction: &Reduction<V>,
    config: &Config,
) -> Result<V, PipelineError> {
    let lexer = grist_runtime::tokenize_bytes(grammar, input);
    reduce_lexed(grammar, lexer, reduction, config)
}

fn reduce_lexed<V>(
    grammar: &Grammar,
    lexer: grist_runtime::Lexer<'_>,
    reduction: &Reduction<V>,
    config: &Config,
) -> Result<V, PipelineError> {
    let src = lexer.src();
    log::debug!("processing {} bytes", src.len());

    let tree = grist_runtime::parse_lazy(grammar, lexer, config.parser_options())?;
    let value = reduction.reduce(&tree, src)?;

    log::debug!("reduced `{}` spanning {:?}", tree.name(), tree.span());
    Ok(value)
}

#[cfg(test)]
pub(crate) fn init_logger() {
    let _ = simplelog::TestLogger::init(simplelog::LevelFilter::Trace, simplelog::Config::default());
}
