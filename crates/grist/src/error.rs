use grist_grammar::linemap::{LineMap, Position};
use grist_runtime::{LexError, ParseError, SyntaxError};
use thiserror::Error;

use crate::reduce::MissingReductionRule;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    MissingReductionRule(#[from] MissingReductionRule),
}

impl From<SyntaxError> for PipelineError {
    fn from(value: SyntaxError) -> Self {
        match value {
            SyntaxError::Lex(err) => PipelineError::Lex(err),
            SyntaxError::Parse(err) => PipelineError::Parse(err),
        }
    }
}

impl PipelineError {
    /// Byte offset into the input, reduction errors are not tied to any input.
    pub fn offset(&self) -> Option<u32> {
        match self {
            PipelineError::Lex(err) => Some(err.offset),
            PipelineError::Parse(err) => Some(err.offset),
            PipelineError::MissingReductionRule(_) => None,
        }
    }

    pub fn location(&self, src: &str) -> Option<Position> {
        let offset = self.offset()?;
        Some(LineMap::new(src).offset_to_position(src, offset))
    }

    /// The error prefixed with its `line:column`, followed by the offending line and a caret
    /// under the error.
    pub fn render(&self, src: &str) -> String {
        let Some(offset) = self.offset() else {
            return self.to_string();
        };

        let map = LineMap::new(src);
        let position = map.offset_to_position(src, offset);
        let line = map.line_str(src, position.line);

        let mut buf = format!("{position} {self}\n{line}\n");
        // tabs are kept so that the caret lines up
        for c in line.chars().take(position.column as usize) {
            buf.push(if c == '\t' { '\t' } else { ' ' });
        }
        buf.push('^');
        buf
    }
}
