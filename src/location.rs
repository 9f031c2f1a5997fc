use serde::Serialize;
use std::fmt;

const LOOKING_AT_CHARS: usize = 20;
const TRUNCATION_MARKER: &str = " …";

/// Where in the source a token was found or an error was raised.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,
    /// Text at and after the point of interest, capped with a marker.
    pub looking_at: String,
}

impl Location {
    pub fn new(line: usize, looking_at: &str) -> Self {
        let mut snippet: String = looking_at.chars().take(LOOKING_AT_CHARS).collect();
        if looking_at.chars().nth(LOOKING_AT_CHARS).is_some() {
            snippet.push_str(TRUNCATION_MARKER);
        }

        Self {
            line,
            looking_at: snippet,
        }
    }

    /// Location of byte `offset` in `source`. Counts lines from the start,
    /// so the lexer tracks its own line number instead of calling this per token.
    pub fn at(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let line = source[..offset].matches('\n').count() + 1;
        Self::new(line, &source[offset..])
    }

    /// Location at the very end of `source`.
    pub fn end_of(source: &str) -> Self {
        Self::at(source, source.len())
    }

    /// Moves the location down by `lines`; used when an error raised while
    /// handling an argument is re-based onto the line of its macro call.
    pub fn shifted(&self, lines: usize) -> Self {
        Self {
            line: self.line + lines,
            looking_at: self.looking_at.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, looking at “{}”", self.line, self.looking_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_from_one() {
        let source = "first\nsecond\nthird";
        assert_eq!(Location::at(source, 0).line, 1);
        assert_eq!(Location::at(source, 6).line, 2);
        assert_eq!(Location::at(source, 13).looking_at, "third");
    }

    #[test]
    fn truncates_long_snippets() {
        let location = Location::new(3, "abcdefghijklmnopqrstuvwxyz");
        assert_eq!(location.looking_at, "abcdefghijklmnopqrst …");
    }

    #[test]
    fn end_of_source_has_empty_snippet() {
        let location = Location::end_of("''never closed");
        assert_eq!(location.line, 1);
        assert_eq!(location.looking_at, "");
    }
}
