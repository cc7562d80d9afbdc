use std::fmt::Display;

use grist_grammar::{Name, Span, SymbolId};

use crate::Token;

/// Concrete parse tree, every token consumed by the parser is a `Terminal`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ParseNode {
    Terminal(Token),
    Rule(RuleNode),
}

/// A rule with its children, or a token start symbol together with the skip tokens kept around it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RuleNode {
    pub kind: SymbolId,
    pub name: Name,
    /// From the first to the last child, empty rules get an empty span where they matched.
    pub span: Span,
    pub children: Vec<ParseNode>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VisitEvent {
    Open,
    Token,
    Close,
}

impl ParseNode {
    pub fn name(&self) -> &Name {
        match self {
            ParseNode::Terminal(token) => &token.name,
            ParseNode::Rule(rule) => &rule.name,
        }
    }
    pub fn span(&self) -> Span {
        match self {
            ParseNode::Terminal(token) => token.span,
            ParseNode::Rule(rule) => rule.span,
        }
    }
    pub fn children(&self) -> &[ParseNode] {
        match self {
            ParseNode::Terminal(_) => &[],
            ParseNode::Rule(rule) => &rule.children,
        }
    }
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            ParseNode::Terminal(token) => Some(token),
            ParseNode::Rule(_) => None,
        }
    }
    /// The token of a tree whose start symbol is a token. When skip tokens were kept it is
    /// wrapped in a rule node of its own kind.
    pub fn token_root(&self) -> Option<&Token> {
        match self {
            ParseNode::Terminal(token) => Some(token),
            ParseNode::Rule(rule) => rule
                .children
                .iter()
                .filter_map(ParseNode::as_token)
                .find(|token| token.kind == rule.kind),
        }
    }

    /// Pre-order walk, rules are both opened and closed.
    pub fn visit(&self) -> Visit<'_> {
        Visit {
            root: Some(self),
            stack: Vec::new(),
        }
    }

    /// The terminals of the tree in input order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> + '_ {
        self.visit().filter_map(|(_, node)| node.as_token())
    }

    pub fn display_into(
        &self,
        buf: &mut dyn std::fmt::Write,
        src: &str,
        print_skip_tokens: bool,
    ) -> std::fmt::Result {
        let mut indent = 0;
        for (event, node) in self.visit() {
            if let ParseNode::Terminal(token) = node {
                if token.skip && !print_skip_tokens {
                    continue;
                }
            }

            let old_indent = indent;

            match event {
                VisitEvent::Open => indent += 1,
                VisitEvent::Token => {}
                VisitEvent::Close => {
                    indent -= 1;
                    continue;
                }
            }

            for _ in 0..old_indent {
                write!(buf, "  ")?;
            }

            match node {
                ParseNode::Terminal(token) => writeln!(buf, "{} {:?}", token.name, token.text(src))?,
                ParseNode::Rule(rule) => writeln!(buf, "{}", rule.name)?,
            }
        }

        Ok(())
    }

    pub fn display<'a>(&'a self, src: &'a str, print_skip_tokens: bool) -> TreeDisplay<'a> {
        TreeDisplay(self, src, print_skip_tokens)
    }
}

pub struct Visit<'a> {
    root: Option<&'a ParseNode>,
    /// Open rules and the index of their next child.
    stack: Vec<(&'a ParseNode, usize)>,
}

impl<'a> Visit<'a> {
    fn enter(&mut self, node: &'a ParseNode) -> (VisitEvent, &'a ParseNode) {
        match node {
            ParseNode::Terminal(_) => (VisitEvent::Token, node),
            ParseNode::Rule(_) => {
                self.stack.push((node, 0));
                (VisitEvent::Open, node)
            }
        }
    }
}

impl<'a> Iterator for Visit<'a> {
    type Item = (VisitEvent, &'a ParseNode);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            return Some(self.enter(root));
        }

        let (node, index) = self.stack.last_mut()?;
        let node: &'a ParseNode = *node;
        let child = node.children().get(*index);
        if child.is_some() {
            *index += 1;
        }

        match child {
            Some(child) => Some(self.enter(child)),
            None => {
                self.stack.pop();
                Some((VisitEvent::Close, node))
            }
        }
    }
}

#[derive(Clone, Copy)]
pub struct TreeDisplay<'a>(&'a ParseNode, &'a str, bool);
impl Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.display_into(f, self.1, self.2)
    }
}
