use std::fmt::{Display, Write};

use crate::{literal::quote, Name};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum NamedClass {
    /// `\d`, ascii digits
    Digit,
    /// `\w`, alphanumeric characters and `_`
    Word,
    /// `\s`
    Whitespace,
}

impl NamedClass {
    pub fn matches(self, c: char) -> bool {
        match self {
            NamedClass::Digit => c.is_ascii_digit(),
            NamedClass::Word => c.is_alphanumeric() || c == '_',
            NamedClass::Whitespace => c.is_whitespace(),
        }
    }
    pub fn escape(self) -> char {
        match self {
            NamedClass::Digit => 'd',
            NamedClass::Word => 'w',
            NamedClass::Whitespace => 's',
        }
    }
    pub fn from_escape(c: char) -> Option<NamedClass> {
        match c {
            'd' => Some(NamedClass::Digit),
            'w' => Some(NamedClass::Word),
            's' => Some(NamedClass::Whitespace),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum ClassItem {
    Char(char),
    /// Inclusive on both ends
    Range(char, char),
    Named(NamedClass),
}

impl ClassItem {
    pub fn matches(&self, c: char) -> bool {
        match *self {
            ClassItem::Char(a) => a == c,
            ClassItem::Range(start, end) => start <= c && c <= end,
            ClassItem::Named(named) => named.matches(c),
        }
    }
}

/// A predicate over a single character, `[a-z_]`, `[^<]` or `.` in grammar text.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Default)]
pub struct CharClass {
    pub negated: bool,
    pub items: Vec<ClassItem>,
}

impl CharClass {
    pub fn new(items: impl IntoIterator<Item = ClassItem>) -> CharClass {
        CharClass {
            negated: false,
            items: items.into_iter().collect(),
        }
    }
    pub fn range(start: char, end: char) -> CharClass {
        CharClass::new([ClassItem::Range(start, end)])
    }
    pub fn named(named: NamedClass) -> CharClass {
        CharClass::new([ClassItem::Named(named)])
    }
    /// Matches every character.
    pub fn any() -> CharClass {
        CharClass {
            negated: true,
            items: Vec::new(),
        }
    }
    pub fn negate(mut self) -> CharClass {
        self.negated = !self.negated;
        self
    }
    pub fn matches(&self, c: char) -> bool {
        self.items.iter().any(|item| item.matches(c)) != self.negated
    }
}

impl Display for CharClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated && self.items.is_empty() {
            return f.write_char('.');
        }

        f.write_char('[')?;
        if self.negated {
            f.write_char('^')?;
        }
        for item in &self.items {
            match *item {
                ClassItem::Char(c) => write_class_char(f, c)?,
                ClassItem::Range(start, end) => {
                    write_class_char(f, start)?;
                    f.write_char('-')?;
                    write_class_char(f, end)?;
                }
                ClassItem::Named(named) => write!(f, "\\{}", named.escape())?,
            }
        }
        f.write_char(']')
    }
}

fn write_class_char(f: &mut dyn Write, c: char) -> std::fmt::Result {
    match c {
        ']' | '\\' | '^' | '-' => write!(f, "\\{c}"),
        _ => write_escaped(f, c),
    }
}

fn write_escaped(f: &mut dyn Write, c: char) -> std::fmt::Result {
    match c {
        '\n' => f.write_str("\\n"),
        '\t' => f.write_str("\\t"),
        '\r' => f.write_str("\\r"),
        '\0' => f.write_str("\\0"),
        _ => f.write_char(c),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Repeat {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `?`
    Optional,
}

impl Repeat {
    pub fn min(self) -> u32 {
        match self {
            Repeat::ZeroOrMore | Repeat::Optional => 0,
            Repeat::OneOrMore => 1,
        }
    }
    /// `None` is unbounded.
    pub fn max(self) -> Option<u32> {
        match self {
            Repeat::ZeroOrMore | Repeat::OneOrMore => None,
            Repeat::Optional => Some(1),
        }
    }
    pub fn symbol(self) -> char {
        match self {
            Repeat::ZeroOrMore => '*',
            Repeat::OneOrMore => '+',
            Repeat::Optional => '?',
        }
    }
    /// Whether the repetition has consumed as many iterations as it may.
    pub fn is_saturated(self, count: u32) -> bool {
        self.max().map_or(false, |max| count >= max)
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub enum Pattern {
    Literal(Name),
    Class(CharClass),
    Sequence(Vec<Pattern>),
    /// Ordered, the first alternative which matches wins.
    Choice(Vec<Pattern>),
    Repeat(Box<Pattern>, Repeat),
    Reference(Name),
}

impl Pattern {
    pub fn literal(text: impl Into<Name>) -> Pattern {
        Pattern::Literal(text.into())
    }
    pub fn class(class: CharClass) -> Pattern {
        Pattern::Class(class)
    }
    pub fn reference(name: impl Into<Name>) -> Pattern {
        Pattern::Reference(name.into())
    }
    pub fn seq(items: impl IntoIterator<Item = Pattern>) -> Pattern {
        Pattern::Sequence(items.into_iter().collect())
    }
    pub fn choice(items: impl IntoIterator<Item = Pattern>) -> Pattern {
        Pattern::Choice(items.into_iter().collect())
    }
    /// Matches the empty string.
    pub fn empty() -> Pattern {
        Pattern::Sequence(Vec::new())
    }
    pub fn zero_or_more(self) -> Pattern {
        Pattern::Repeat(Box::new(self), Repeat::ZeroOrMore)
    }
    pub fn one_or_more(self) -> Pattern {
        Pattern::Repeat(Box::new(self), Repeat::OneOrMore)
    }
    pub fn optional(self) -> Pattern {
        Pattern::Repeat(Box::new(self), Repeat::Optional)
    }

    pub fn children(&self) -> &[Pattern] {
        match self {
            Pattern::Sequence(items) | Pattern::Choice(items) => items,
            Pattern::Repeat(inner, _) => std::slice::from_ref(inner),
            Pattern::Literal(_) | Pattern::Class(_) | Pattern::Reference(_) => &[],
        }
    }

    /// Pre-order walk over this pattern and all of its children.
    pub fn visit<'a>(&'a self, fun: &mut dyn FnMut(&'a Pattern)) {
        fun(self);
        for child in self.children() {
            child.visit(fun);
        }
    }

    pub fn references(&self) -> Vec<&Name> {
        let mut names = Vec::new();
        self.visit(&mut |pattern| {
            if let Pattern::Reference(name) = pattern {
                names.push(name);
            }
        });
        names
    }

    /// Match against characters of `src` starting at the byte offset `pos`, returns the end offset.
    ///
    /// Repetition is greedy and choice is ordered, there is no backtracking into an alternative
    /// once it has matched. References never match, only regular patterns can be matched this way.
    pub fn match_at(&self, src: &str, pos: usize) -> Option<usize> {
        match self {
            Pattern::Literal(text) => src[pos..].starts_with(&**text).then(|| pos + text.len()),
            Pattern::Class(class) => {
                let c = src[pos..].chars().next()?;
                class.matches(c).then(|| pos + c.len_utf8())
            }
            Pattern::Sequence(items) => {
                let mut pos = pos;
                for item in items {
                    pos = item.match_at(src, pos)?;
                }
                Some(pos)
            }
            Pattern::Choice(items) => items.iter().find_map(|item| item.match_at(src, pos)),
            Pattern::Repeat(inner, repeat) => {
                let mut pos = pos;
                let mut count = 0;
                while !repeat.is_saturated(count) {
                    let Some(next) = inner.match_at(src, pos) else {
                        break;
                    };
                    count += 1;
                    // an iteration which consumed nothing would match forever
                    if next == pos {
                        break;
                    }
                    pos = next;
                }
                (count >= repeat.min()).then_some(pos)
            }
            Pattern::Reference(_) => None,
        }
    }

    /// Whether the whole of `text` is matched.
    pub fn matches_exactly(&self, text: &str) -> bool {
        self.match_at(text, 0) == Some(text.len())
    }

    /// Whether an unbounded repetition of `.` is followed by more of its sequence. The repetition
    /// takes the rest of the input, so what follows only matches if it can match nothing.
    pub fn has_starved_tail(&self) -> bool {
        let any = Pattern::Class(CharClass::any());
        let mut starved = false;
        self.visit(&mut |pattern| {
            let Pattern::Sequence(items) = pattern else {
                return;
            };
            let Some((_, init)) = items.split_last() else {
                return;
            };
            starved |= init.iter().any(|item| {
                matches!(item, Pattern::Repeat(inner, repeat) if repeat.max().is_none() && **inner == any)
            });
        });
        starved
    }

    fn precedence(&self) -> u8 {
        match self {
            Pattern::Choice(items) | Pattern::Sequence(items) if items.len() == 1 => {
                items[0].precedence()
            }
            Pattern::Choice(items) if items.len() > 1 => 0,
            Pattern::Sequence(items) if items.len() > 1 => 1,
            Pattern::Repeat(..) => 2,
            _ => 3,
        }
    }

    fn display_into(&self, f: &mut dyn Write, min_precedence: u8) -> std::fmt::Result {
        if let Pattern::Sequence(items) | Pattern::Choice(items) = self {
            if let [single] = &items[..] {
                return single.display_into(f, min_precedence);
            }
        }

        let parenthesize = self.precedence() < min_precedence;
        if parenthesize {
            f.write_char('(')?;
        }

        match self {
            Pattern::Literal(text) => f.write_str(&quote(text))?,
            Pattern::Class(class) => write!(f, "{class}")?,
            Pattern::Sequence(items) if items.is_empty() => f.write_str("()")?,
            Pattern::Choice(items) if items.is_empty() => f.write_str("()")?,
            Pattern::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    item.display_into(f, 2)?;
                }
            }
            Pattern::Choice(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    item.display_into(f, 1)?;
                }
            }
            Pattern::Repeat(inner, repeat) => {
                inner.display_into(f, 3)?;
                f.write_char(repeat.symbol())?;
            }
            Pattern::Reference(name) => f.write_str(name)?,
        }

        if parenthesize {
            f.write_char(')')?;
        }
        Ok(())
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_into(f, 0)
    }
}
