use crate::error::MarkupError;
use crate::location::Location;
use crate::token::CallArguments;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// One parameter unit (each preceded by whitespace, the first one included)
/// or the closing marker of the list.
static PARAMETER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\A(?:\s+(?:([^\d\W]\w*)=)?(?:'''(.*?)'''|"""(.*?)"""|'(.*?)'|"(.*?)"|([^'">:)\s]+))|\s*(>>|\):))"#,
    )
    .expect("parameter pattern is valid")
});

/// Same as `PARAMETER_RE` without the mandatory leading whitespace. A list
/// opened by `(` may start right away: `@@note('x'):`.
static FIRST_PARENTHESIZED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\A(?:\s*(?:([^\d\W]\w*)=)?(?:'''(.*?)'''|"""(.*?)"""|'(.*?)'|"(.*?)"|([^'">:)\s]+))|\s*(>>|\):))"#,
    )
    .expect("parameter pattern is valid")
});

/// The marker that closes a parameter list.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Terminator {
    /// `>>`, closing a `<<name ...>>` call.
    Macro,
    /// `):`, closing a `name(...):` prefix.
    Paren,
}

impl Terminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminator::Macro => ">>",
            Terminator::Paren => "):",
        }
    }
}

/// Parses the literal argument list that starts at `source` and ends at
/// `terminator`. `line` is the line `source` starts on.
///
/// Returns how many bytes of `source` were consumed, terminator included,
/// together with the arguments.
pub fn parse_parameter_list(
    source: &str,
    line: usize,
    terminator: Terminator,
) -> Result<(usize, CallArguments), MarkupError> {
    let mut args = CallArguments::default();
    let mut cursor = 0;

    loop {
        let rest = &source[cursor..];
        let location = || Location::new(line + source[..cursor].matches('\n').count(), rest);

        let pattern = if cursor == 0 && terminator == Terminator::Paren {
            &FIRST_PARENTHESIZED_RE
        } else {
            &PARAMETER_RE
        };

        let Some(captures) = pattern.captures(rest) else {
            return Err(MarkupError::syntax(
                "Syntax error in macro parameter list",
                location(),
            ));
        };
        let matched = captures.get(0).map_or(0, |m| m.len());

        if let Some(end) = captures.get(7) {
            if end.as_str() != terminator.as_str() {
                return Err(MarkupError::syntax(
                    format!(
                        "Syntax error, can’t parse “{}” in macro parameter list",
                        end.as_str()
                    ),
                    location(),
                ));
            }
            cursor += matched;
            return Ok((cursor, args));
        }

        let value = literal(&captures);
        match captures.get(1) {
            Some(keyword) => {
                args.keyword.insert(keyword.as_str().to_string(), value);
            }
            None if !args.keyword.is_empty() => {
                return Err(MarkupError::syntax(
                    "Syntax error: positional argument follows named argument",
                    location(),
                ));
            }
            None => args.positional.push(value),
        }

        cursor += matched;
    }
}

fn literal(captures: &Captures) -> String {
    (2..=6)
        .find_map(|group| captures.get(group))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, terminator: Terminator) -> Result<(usize, CallArguments), MarkupError> {
        parse_parameter_list(source, 1, terminator)
    }

    #[test]
    fn binds_positional_and_keyword_literals() {
        let source = " 'a' 1.2 filename='test.jpg'>> rest";
        let (consumed, args) = parse(source, Terminator::Macro).unwrap();

        assert_eq!(&source[consumed..], " rest");
        assert_eq!(args.positional, vec!["a", "1.2"]);
        assert_eq!(args.keyword.get("filename").map(String::as_str), Some("test.jpg"));
    }

    #[test]
    fn empty_list() {
        let (consumed, args) = parse(">>", Terminator::Macro).unwrap();
        assert_eq!(consumed, 2);
        assert!(args.is_empty());
    }

    #[test]
    fn quoted_literals_may_span_lines_and_hold_other_quotes() {
        let source = " '''it's\nhere''' \"\"\"say \"hi\" now\"\"\" \"x>y\" >>";
        let (_, args) = parse(source, Terminator::Macro).unwrap();
        assert_eq!(args.positional, vec!["it's\nhere", "say \"hi\" now", "x>y"]);
    }

    #[test]
    fn parenthesized_list_needs_no_leading_space() {
        let source = "'table-dark' border=1): caption";
        let (consumed, args) = parse(source, Terminator::Paren).unwrap();
        assert_eq!(&source[consumed..], " caption");
        assert_eq!(args.positional, vec!["table-dark"]);
        assert_eq!(args.keyword.get("border").map(String::as_str), Some("1"));
    }

    #[test]
    fn positional_after_keyword_is_rejected() {
        let error = parse(" a=1 'b'>>", Terminator::Macro).unwrap_err();
        assert!(matches!(error, MarkupError::Syntax { .. }));
    }

    #[test]
    fn mismatched_terminator_names_what_was_found() {
        let error = parse(" 'a'):", Terminator::Macro).unwrap_err();
        assert!(error.to_string().contains("“):”"));
    }

    #[test]
    fn unterminated_list_reports_its_line() {
        let error = parse(" 'a'\n 'b'", Terminator::Macro).unwrap_err();
        match error {
            MarkupError::Syntax { location, .. } => assert_eq!(location.line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn first_unit_needs_leading_whitespace_in_calls() {
        assert!(parse("'a'>>", Terminator::Macro).is_err());
    }
}
