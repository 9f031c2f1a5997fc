use crate::error::MarkupError;
use crate::location::Location;
use crate::params::{parse_parameter_list, Terminator};
use crate::token::{CallArguments, CellSpec, Kind, MacroRef, Token, TokenValue};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Kind, decoded value and number of bytes consumed by one rule.
type Matched = (Kind, TokenValue, usize);
type RuleResult = Result<Option<Matched>, MarkupError>;
type Rule = fn(&str, usize) -> RuleResult;

macro_rules! pattern {
    ($re:expr) => {
        Lazy::new(|| Regex::new($re).expect("lexer pattern is valid"))
    };
}

static EOLS_RE: Lazy<Regex> = pattern!(r"\A\n(?:[ \t]*\n)*");
static HTML_COMMENT_START_RE: Lazy<Regex> = pattern!(r"\A<!---\n");
static HTML_COMMENT_END_RE: Lazy<Regex> = pattern!(r"\A--->\n");
static C_COMMENT_START_RE: Lazy<Regex> = pattern!(r"\A/\*\*\*\n");
static NULL_DOT_RE: Lazy<Regex> = pattern!(r"\A[ \t]*\.[ \t]*");
static SEPARATOR_RE: Lazy<Regex> = pattern!(r"\A[ \t]*----+[ \t]*");
static CAPTION_RE: Lazy<Regex> = pattern!(r"\A[ \t]*\|([^\n]*?)\|c[ \t]*(?:\n|\z)");
static ROW_START_RE: Lazy<Regex> = pattern!(r"\A[ \t]*\|");
static BLOCKQUOTE_START_RE: Lazy<Regex> = pattern!(r"\A<<<");
static BLOCKQUOTE_GAP_RE: Lazy<Regex> = pattern!(r"\A(?:[ \t]*\n|[ \t]+|\z)");
static NUMBERED_RE: Lazy<Regex> = pattern!(r"\A[ \t]*(#+)[ \t]*");
static BULLETED_RE: Lazy<Regex> = pattern!(r"\A[ \t]*([*•]+)[ \t]*");
static HEADING_RE: Lazy<Regex> = pattern!(r"\A[ \t]*(!+)[ \t]*");
static TERM_RE: Lazy<Regex> = pattern!(r"\A[ \t]*(;+)[ \t]*");
static DEFINITION_RE: Lazy<Regex> = pattern!(r"\A[ \t]*(:+)[ \t]*");

static TABLE_END_RE: Lazy<Regex> = pattern!(r"\A\|[ \t]*\n(?:[ \t]*\n)+");
static ROW_END_RE: Lazy<Regex> = pattern!(r"\A\|[ \t]*(?:\n|\z)");
static CELL_REST_RE: Lazy<Regex> = pattern!(r"\A[^|\n]*\|");

static PREFIX_RE: Lazy<Regex> = pattern!(r"\A([^\d\W]\w*)([(:])");
static BLOCKQUOTE_END_RE: Lazy<Regex> = pattern!(r"\A>>>[ \t]*(?:\n|\z)");
static COMMENT_RE: Lazy<Regex> = pattern!(r"(?s)\A/%.*?%/");
static MACRO_RE: Lazy<Regex> = pattern!(r"\A<<([^\d\W]\w*)");
static START_TAG_RE: Lazy<Regex> = pattern!(r"\A@@([^\d\W]\w*)");
static INLINE_BLOCK_START_RE: Lazy<Regex> = pattern!(r"\A\{\{[ \t]*([^\d\W][\w-]*)[ \t]*\{");
static IMAGE_LINK_RE: Lazy<Regex> = pattern!(
    r"\A\[(?i:img)\[(?:([^|\[\]\n]+?)\|)?([^|\[\]\n]+?)\](?:\[([^|\[\]\n]+?)\])?\]"
);
static LINK_RE: Lazy<Regex> = pattern!(r"\A\[\[([^|\n]+?)\]\]");
static LINK_WITH_TEXT_RE: Lazy<Regex> = pattern!(r"\A\[\[([^\n]+?)\|([^\n]+?)\]\]");
static HTML_BREAK_RE: Lazy<Regex> = pattern!(r"(?i)\A<\s*br\s*/?\s*>");
static URL_RE: Lazy<Regex> = pattern!(
    r"\A(?:(?:https?|file|ftp|gopher|mms|news|nntp|telnet)://[a-zA-Z0-9~$\-_.#+!%/?=&]+(?::[0-9]+)?(?:[a-zA-Z0-9~$\-_.#+!%/?=&]+)?|mailto:[a-zA-Z._@]+)"
);
static TOGGLE_RE: Lazy<Regex> = pattern!(r"\A(?:''|//|--|__|\^\^|~~)");
static WORD_RE: Lazy<Regex> = pattern!(r"\A[^\W_]+");

/// Rules that only fire at the start of a line, in priority order.
const LINE_START_RULES: &[Rule] = &[
    comment_marker,
    null_dot,
    separator,
    table_caption,
    table_row_start,
    blockquote_start,
    numbered_item,
    bulleted_item,
    heading,
    term,
    definition,
];

/// Rules that only fire between a table row start and its row end.
const ROW_RULES: &[Rule] = &[table_end, table_row_end, cell_boundary];

const INLINE_RULES: &[Rule] = &[
    blockquote_end,
    comment,
    macro_call,
    start_tag_macro_start,
    start_tag_macro_end,
    inline_block_start,
    inline_block_end,
    image_link,
    link,
    link_with_text,
    html_break,
    url,
    toggle,
    pipe,
    word,
];

/// Lazy tokenizer over one source text. Each lexer is used for exactly one
/// pass; after the first error it yields nothing more.
pub struct Lexer<'a> {
    source: &'a str,
    cursor: usize,
    line: usize,
    in_row: bool,
    failed: bool,
}

pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer::new(source)
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            cursor: 0,
            line: 1,
            in_row: false,
            failed: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn at_line_start(&self) -> bool {
        self.cursor == 0 || self.source.as_bytes()[self.cursor - 1] == b'\n'
    }

    fn scan_rules(&self, rest: &str) -> Result<Matched, MarkupError> {
        if let Some(matched) = eols(rest, self.line)? {
            return Ok(matched);
        }

        let line_start: &[Rule] = if self.at_line_start() { LINE_START_RULES } else { &[] };
        let row: &[Rule] = if self.in_row { ROW_RULES } else { &[] };

        for rule in line_start.iter().chain(row).chain(INLINE_RULES) {
            if let Some(matched) = rule(rest, self.line)? {
                return Ok(matched);
            }
        }

        Ok(other_character(rest))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, MarkupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.source.len() {
            return None;
        }

        let start = self.cursor;
        let rest = &self.source[start..];
        let (kind, value, length) = match self.scan_rules(rest) {
            Ok(matched) => matched,
            Err(error) => {
                self.failed = true;
                return Some(Err(error));
            }
        };

        let end = start + length;
        let raw = &self.source[start..end];
        let token = Token {
            kind,
            value,
            raw: raw.to_string(),
            span: start..end,
            location: Location::new(self.line, rest),
        };

        self.cursor = end;
        let newlines = raw.matches('\n').count();
        self.line += newlines;
        // A table row never spans lines.
        if newlines > 0 {
            self.in_row = false;
        }
        match kind {
            Kind::TableRowStart => self.in_row = true,
            Kind::TableRowEnd | Kind::TableEnd => self.in_row = false,
            _ => {}
        }

        trace!(kind = ?token.kind, line = token.location.line, raw = %token.raw, "token");
        Some(Ok(token))
    }
}

fn text(value: &str) -> TokenValue {
    TokenValue::Text(value.to_string())
}

/// True when `rest[length..]` starts a new line or the input ends there.
fn ends_line(rest: &str, length: usize) -> bool {
    let after = &rest[length..];
    after.is_empty() || after.starts_with('\n')
}

/// Line-leading marker whose value is the marker run without surrounding blanks.
fn marker(re: &Regex, kind: Kind, rest: &str) -> Option<Matched> {
    let captures = re.captures(rest)?;
    let whole = captures.get(0)?;
    let run = captures.get(1)?;
    Some((kind, text(run.as_str()), whole.end()))
}

/// An optional `name:` or `name(args):` macro reference at the start of `rest`.
fn macro_prefix(rest: &str, line: usize) -> Result<(Option<MacroRef>, usize), MarkupError> {
    let Some(captures) = PREFIX_RE.captures(rest) else {
        return Ok((None, 0));
    };
    let (Some(name), Some(opener)) = (captures.get(1), captures.get(2)) else {
        return Ok((None, 0));
    };

    let mut consumed = opener.end();
    let args = if opener.as_str() == "(" {
        let (length, args) = parse_parameter_list(&rest[consumed..], line, Terminator::Paren)?;
        consumed += length;
        args
    } else if rest[consumed..].starts_with("//") || is_url_scheme(name.as_str()) {
        // `http://...` and `mailto:...` are links, not macros.
        return Ok((None, 0));
    } else {
        CallArguments::default()
    };

    let prefix = MacroRef {
        name: name.as_str().to_string(),
        args,
    };
    Ok((Some(prefix), consumed))
}

fn is_url_scheme(name: &str) -> bool {
    const SCHEMES: &[&str] = &[
        "http", "https", "file", "ftp", "gopher", "mms", "news", "nntp", "telnet", "mailto",
    ];
    SCHEMES.iter().any(|scheme| scheme.eq_ignore_ascii_case(name))
}

fn leading_blanks(rest: &str) -> usize {
    rest.len() - rest.trim_start_matches([' ', '\t']).len()
}

/// Scans the head of a table cell that starts right after its opening `|`.
fn table_cell(rest: &str, line: usize, location: Location) -> Result<(CellSpec, usize), MarkupError> {
    let (prefix, mut consumed) = macro_prefix(rest, line)?;
    consumed += leading_blanks(&rest[consumed..]);

    let header = rest[consumed..].starts_with('!');
    if header {
        consumed += 1;
    }

    if !CELL_REST_RE.is_match(&rest[consumed..]) {
        return Err(MarkupError::parse("Missing closing “|” for table cell", location));
    }

    Ok((CellSpec { header, prefix }, consumed))
}

fn eols(rest: &str, _line: usize) -> RuleResult {
    Ok(EOLS_RE.find(rest).map(|m| {
        let newlines = m.as_str().matches('\n').count();
        (Kind::Eols, TokenValue::Newlines(newlines), m.end())
    }))
}

/// Whole-line `<!---`, `--->` and `/***` markers, newline included.
fn comment_marker(rest: &str, _line: usize) -> RuleResult {
    let markers = [
        (&HTML_COMMENT_START_RE, Kind::HtmlCommentStart),
        (&HTML_COMMENT_END_RE, Kind::HtmlCommentEnd),
        (&C_COMMENT_START_RE, Kind::CCommentStart),
    ];
    Ok(markers.into_iter().find_map(|(re, kind)| {
        re.find(rest).map(|m| (kind, TokenValue::None, m.end()))
    }))
}

fn null_dot(rest: &str, _line: usize) -> RuleResult {
    Ok(NULL_DOT_RE
        .find(rest)
        .filter(|m| ends_line(rest, m.end()))
        .map(|m| (Kind::NullDot, TokenValue::None, m.end())))
}

fn separator(rest: &str, _line: usize) -> RuleResult {
    Ok(SEPARATOR_RE
        .find(rest)
        .filter(|m| ends_line(rest, m.end()))
        .map(|m| (Kind::Separator, TokenValue::None, m.end())))
}

fn table_caption(rest: &str, line: usize) -> RuleResult {
    let Some(captures) = CAPTION_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let (prefix, consumed) = macro_prefix(inner.as_str(), line)?;
    let caption = inner.as_str()[consumed..].trim().to_string();
    let value = TokenValue::Caption {
        text: caption,
        prefix,
    };
    Ok(Some((Kind::TableCaption, value, whole.end())))
}

fn table_row_start(rest: &str, line: usize) -> RuleResult {
    let Some(bar) = ROW_START_RE.find(rest) else {
        return Ok(None);
    };
    let location = Location::new(line, rest);
    let (cell, consumed) = table_cell(&rest[bar.end()..], line, location)?;
    Ok(Some((Kind::TableRowStart, TokenValue::Cell(cell), bar.end() + consumed)))
}

fn blockquote_start(rest: &str, line: usize) -> RuleResult {
    let Some(opener) = BLOCKQUOTE_START_RE.find(rest) else {
        return Ok(None);
    };
    let (prefix, consumed) = macro_prefix(&rest[opener.end()..], line)?;
    let after_prefix = opener.end() + consumed;

    let Some(gap) = BLOCKQUOTE_GAP_RE.find(&rest[after_prefix..]) else {
        return Ok(None);
    };
    Ok(Some((
        Kind::BlockquoteStart,
        TokenValue::Prefix(prefix),
        after_prefix + gap.end(),
    )))
}

fn numbered_item(rest: &str, _line: usize) -> RuleResult {
    Ok(marker(&NUMBERED_RE, Kind::NListItem, rest))
}

fn bulleted_item(rest: &str, _line: usize) -> RuleResult {
    Ok(marker(&BULLETED_RE, Kind::UListItem, rest))
}

fn heading(rest: &str, _line: usize) -> RuleResult {
    Ok(marker(&HEADING_RE, Kind::Heading, rest))
}

fn term(rest: &str, _line: usize) -> RuleResult {
    Ok(marker(&TERM_RE, Kind::DTerm, rest))
}

fn definition(rest: &str, _line: usize) -> RuleResult {
    Ok(marker(&DEFINITION_RE, Kind::DDefinition, rest))
}

fn table_end(rest: &str, _line: usize) -> RuleResult {
    Ok(TABLE_END_RE
        .find(rest)
        .map(|m| (Kind::TableEnd, TokenValue::None, m.end())))
}

fn table_row_end(rest: &str, _line: usize) -> RuleResult {
    Ok(ROW_END_RE
        .find(rest)
        .map(|m| (Kind::TableRowEnd, TokenValue::None, m.end())))
}

fn cell_boundary(rest: &str, line: usize) -> RuleResult {
    if !rest.starts_with('|') {
        return Ok(None);
    }
    let location = Location::new(line, rest);
    let (cell, consumed) = table_cell(&rest[1..], line, location)?;
    Ok(Some((Kind::PipeChar, TokenValue::Cell(cell), 1 + consumed)))
}

fn blockquote_end(rest: &str, _line: usize) -> RuleResult {
    Ok(BLOCKQUOTE_END_RE
        .find(rest)
        .map(|m| (Kind::BlockquoteEnd, TokenValue::None, m.end())))
}

fn comment(rest: &str, _line: usize) -> RuleResult {
    Ok(COMMENT_RE
        .find(rest)
        .map(|m| (Kind::Comment, TokenValue::None, m.end())))
}

fn macro_call(rest: &str, line: usize) -> RuleResult {
    let Some(captures) = MACRO_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let (length, args) = parse_parameter_list(&rest[whole.end()..], line, Terminator::Macro)?;
    let call = MacroRef {
        name: name.as_str().to_string(),
        args,
    };
    Ok(Some((Kind::Macro, TokenValue::Call(call), whole.end() + length)))
}

fn start_tag_macro_start(rest: &str, line: usize) -> RuleResult {
    let Some(captures) = START_TAG_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let mut consumed = whole.end();
    let args = match rest[consumed..].chars().next() {
        Some('(') => {
            let (length, args) =
                parse_parameter_list(&rest[consumed + 1..], line, Terminator::Paren)?;
            consumed += 1 + length;
            args
        }
        Some(':') => {
            consumed += 1;
            CallArguments::default()
        }
        _ => {
            return Err(MarkupError::syntax(
                "Missing “:” in start tag macro call",
                Location::new(line, rest),
            ))
        }
    };
    consumed += leading_blanks(&rest[consumed..]);

    let call = MacroRef {
        name: name.as_str().to_string(),
        args,
    };
    Ok(Some((Kind::StartTagMacroStart, TokenValue::Call(call), consumed)))
}

fn start_tag_macro_end(rest: &str, _line: usize) -> RuleResult {
    Ok(rest
        .starts_with("@@")
        .then(|| (Kind::StartTagMacroEnd, text("@@"), 2)))
}

fn inline_block_start(rest: &str, _line: usize) -> RuleResult {
    let Some(captures) = INLINE_BLOCK_START_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let call = MacroRef {
        name: name.as_str().to_string(),
        args: CallArguments::default(),
    };
    Ok(Some((Kind::InlineBlockStart, TokenValue::Call(call), whole.end())))
}

fn inline_block_end(rest: &str, _line: usize) -> RuleResult {
    Ok(rest
        .starts_with("}}}")
        .then(|| (Kind::InlineBlockEnd, text("}}}"), 3)))
}

fn image_link(rest: &str, _line: usize) -> RuleResult {
    let Some(captures) = IMAGE_LINK_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(filename)) = (captures.get(0), captures.get(2)) else {
        return Ok(None);
    };

    let value = TokenValue::Image {
        title: captures.get(1).map(|m| m.as_str().to_string()),
        filename: filename.as_str().to_string(),
        url: captures.get(3).map(|m| m.as_str().to_string()),
    };
    Ok(Some((Kind::ImgLink, value, whole.end())))
}

fn link(rest: &str, _line: usize) -> RuleResult {
    let Some(captures) = LINK_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(target)) = (captures.get(0), captures.get(1)) else {
        return Ok(None);
    };

    let value = TokenValue::Link {
        text: None,
        target: target.as_str().to_string(),
    };
    Ok(Some((Kind::LinkA, value, whole.end())))
}

fn link_with_text(rest: &str, _line: usize) -> RuleResult {
    let Some(captures) = LINK_WITH_TEXT_RE.captures(rest) else {
        return Ok(None);
    };
    let (Some(whole), Some(label), Some(target)) = (captures.get(0), captures.get(1), captures.get(2))
    else {
        return Ok(None);
    };

    let value = TokenValue::Link {
        text: Some(label.as_str().to_string()),
        target: target.as_str().to_string(),
    };
    Ok(Some((Kind::LinkAB, value, whole.end())))
}

fn html_break(rest: &str, _line: usize) -> RuleResult {
    Ok(HTML_BREAK_RE
        .find(rest)
        .map(|m| (Kind::HtmlBreak, TokenValue::None, m.end())))
}

fn url(rest: &str, _line: usize) -> RuleResult {
    Ok(URL_RE
        .find(rest)
        .map(|m| (Kind::CatchUrl, text(m.as_str()), m.end())))
}

fn toggle(rest: &str, _line: usize) -> RuleResult {
    let Some(m) = TOGGLE_RE.find(rest) else {
        return Ok(None);
    };
    let kind = match m.as_str() {
        "''" => Kind::Bold,
        "//" => Kind::Italic,
        "--" => Kind::Strikethrough,
        "__" => Kind::Underline,
        "^^" => Kind::Superscript,
        _ => Kind::Subscript,
    };
    Ok(Some((kind, text(m.as_str()), m.end())))
}

fn pipe(rest: &str, _line: usize) -> RuleResult {
    Ok(rest
        .starts_with('|')
        .then(|| (Kind::PipeChar, text("|"), 1)))
}

fn word(rest: &str, _line: usize) -> RuleResult {
    Ok(WORD_RE
        .find(rest)
        .map(|m| (Kind::Word, text(m.as_str()), m.end())))
}

fn other_character(rest: &str) -> Matched {
    let length = rest.chars().next().map_or(1, char::len_utf8);
    (Kind::OtherCharacters, text(&rest[..length]), length)
}
