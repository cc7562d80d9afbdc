use std::fmt::Display;

/// Byte range into some source text, `start..end`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Span {
    start: u32,
    end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Span {
        debug_assert!(start <= end, "Span start after end");
        Self { start, end }
    }
    pub fn at(pos: u32) -> Span {
        Self {
            start: pos,
            end: pos,
        }
    }
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }
    #[track_caller]
    pub fn as_str(self, src: &str) -> &str {
        &src[self.start as usize..self.end as usize]
    }
    /// Smallest span covering both, the gap between them included.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
    pub fn start(self) -> u32 {
        self.start
    }
    pub fn end(self) -> u32 {
        self.end
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[test]
fn test_span_join() {
    let a = Span::new(2, 4);
    let b = Span::new(7, 9);
    assert_eq!(a.join(b), Span::new(2, 9));
    assert_eq!(b.join(a), Span::new(2, 9));
    assert_eq!(Span::at(3).len(), 0);
    assert!(Span::at(3).is_empty());
    assert_eq!(Span::new(1, 3).as_str("abcd"), "bc");
}
