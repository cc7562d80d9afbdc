/// The type of a byte offset in a string
pub type Offset = u32;

/// Use this for human output text positions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct Position {
    /// zero-based line index
    pub line: u32,
    /// zero-based column offset relative to the start of the line, unicode code points
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Position {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // humans count from one
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

pub struct LineMap {
    /// byte offset of the start of each line, and whether the line contains non-ascii characters
    lines: Vec<(Offset, bool)>,
}

impl LineMap {
    pub fn new(src: &str) -> Self {
        assert!(src.len() <= Offset::MAX as usize);
        let mut lines = Vec::new();

        let mut prev_end = 0;
        let mut saw_unicode = false;
        let mut bytes = src.bytes().enumerate();

        // utf8 bytes are either encoding an ascii character or are >=128
        // so we can search for ascii characters by interpreting the string as bytes
        while let Some((mut i, b)) = bytes.next() {
            // we recognize \r\n  \n  \r as newlines
            match b {
                b'\n' | b'\r' => {
                    if b == b'\r' {
                        if let Some((new_i, b'\n')) = bytes.clone().next() {
                            bytes.next();
                            i = new_i;
                        }
                    }
                    lines.push((prev_end, saw_unicode));
                    saw_unicode = false;
                    prev_end = i as Offset + 1;
                }
                _ => {
                    if b >= 128 {
                        saw_unicode = true;
                    }
                }
            }
        }

        lines.push((prev_end, saw_unicode));

        Self { lines }
    }

    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Returns zero-based line and column in unicode code points. Offset is clamped to the end of
    /// `src` and rounded down to a character boundary.
    pub fn offset_to_position(&self, src: &str, offset: Offset) -> Position {
        let mut offset = Offset::min(offset, src.len() as Offset);
        while !src.is_char_boundary(offset as usize) {
            offset -= 1;
        }

        let line = self.offset_to_line(offset);
        let (line_start, is_unicode) = self.lines[line as usize];

        let column = if is_unicode {
            src[line_start as usize..offset as usize].chars().count() as u32
        } else {
            offset - line_start
        };

        Position { line, column }
    }

    /// Find the line which contains the offset.
    pub fn offset_to_line(&self, offset: Offset) -> u32 {
        let index = self.lines.binary_search_by_key(&offset, |a| a.0);
        let line = match index {
            Ok(a) => a,
            Err(a) => a - 1,
        };
        line as u32
    }

    pub fn line_start(&self, line: u32) -> Offset {
        self.lines[line as usize].0
    }

    pub fn line_end(&self, src: &str, line: u32) -> Offset {
        self.lines
            .get((line + 1) as usize)
            .map(|line| line.0)
            .unwrap_or(src.len() as Offset)
    }

    /// The text of the line without its line terminator.
    pub fn line_str<'a>(&self, src: &'a str, line: u32) -> &'a str {
        let start = self.line_start(line);
        let end = self.line_end(src, line);
        src[start as usize..end as usize].trim_end_matches(['\n', '\r'])
    }
}
