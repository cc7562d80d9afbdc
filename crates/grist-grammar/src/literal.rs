use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum EscapeError {
    #[error("unknown character escape '\\{found}'")]
    Unknown { offset: usize, found: char },
    #[error("unterminated character escape")]
    Unterminated { offset: usize },
}

impl EscapeError {
    /// Byte offset of the backslash starting the escape.
    pub fn offset(self) -> usize {
        match self {
            EscapeError::Unknown { offset, .. } | EscapeError::Unterminated { offset } => offset,
        }
    }
}

/// Process backslash escapes, `\\ \' \" \n \t \r \0` are recognized.
pub fn unescape(text: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();

    while let Some((_, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let offset = out_offset(text, &chars);
        let escaped = match chars.next() {
            Some((_, '\\')) => '\\',
            Some((_, '\'')) => '\'',
            Some((_, '"')) => '"',
            Some((_, 'n')) => '\n',
            Some((_, 't')) => '\t',
            Some((_, 'r')) => '\r',
            Some((_, '0')) => '\0',
            Some((_, found)) => return Err(EscapeError::Unknown { offset, found }),
            None => return Err(EscapeError::Unterminated { offset }),
        };
        out.push(escaped);
    }

    Ok(out)
}

// the backslash was just consumed
fn out_offset(text: &str, rest: &std::str::CharIndices) -> usize {
    text.len() - rest.as_str().len() - 1
}

/// Strip the first and last character of `text`, the delimiters, and process escapes in between.
pub fn unquote(text: &str) -> Result<String, EscapeError> {
    let mut chars = text.chars();
    let (Some(open), Some(_)) = (chars.next(), chars.next_back()) else {
        return Ok(String::new());
    };
    unescape(chars.as_str()).map_err(|e| match e {
        EscapeError::Unknown { offset, found } => EscapeError::Unknown {
            offset: offset + open.len_utf8(),
            found,
        },
        EscapeError::Unterminated { offset } => EscapeError::Unterminated {
            offset: offset + open.len_utf8(),
        },
    })
}

/// Quote `text` as a grammar literal, `it's` becomes `'it\'s'`.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
