use crate::location::Location;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: Kind,
    pub value: TokenValue,
    /// The untrimmed source slice the token was matched from.
    pub raw: String,
    /// Byte range of `raw` within the source.
    pub span: Range<usize>,
    pub location: Location,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum Kind {
    // Inline toggles
    Bold,          // ''
    Italic,        // //
    Strikethrough, // --
    Underline,     // __
    Superscript,   // ^^
    Subscript,     // ~~

    // Line-leading markers
    NListItem,   // #
    UListItem,   // * or •
    Heading,     // !
    DTerm,       // ;
    DDefinition, // :
    Separator,   // ----
    NullDot,     // a lone .

    // Macro forms
    Macro,              // <<name ...>>
    StartTagMacroStart, // @@name: or @@name(...):
    StartTagMacroEnd,   // @@
    InlineBlockStart,   // {{name{
    InlineBlockEnd,     // }}}
    BlockquoteStart,    // <<< or <<<name: or <<<name(...):
    BlockquoteEnd,      // >>>

    // Links
    LinkA,    // [[target]]
    LinkAB,   // [[text|target]]
    ImgLink,  // [img[title|file][url]]
    CatchUrl, // bare http://...

    // Tables
    TableRowStart,
    TableRowEnd,
    TableEnd,
    TableCaption,
    PipeChar,

    Comment,          // /% ... %/
    HtmlCommentStart, // <!--- on a line of its own
    HtmlCommentEnd,   // ---> on a line of its own
    CCommentStart,    // /*** on a line of its own
    HtmlBreak,
    Eols,
    Word,
    OtherCharacters,
}

/// Literal arguments of a macro call, as written at the call site.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize)]
pub struct CallArguments {
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

impl CallArguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// A macro named inline by a call or by a `name:` / `name(...):` prefix.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub struct MacroRef {
    pub name: String,
    pub args: CallArguments,
}

/// What the lexer found at the opening of a table cell.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CellSpec {
    pub header: bool,
    pub prefix: Option<MacroRef>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenValue {
    /// Plain decoded text (words, delimiters, stripped list markers).
    Text(String),
    /// Number of newlines in an EOLS run.
    Newlines(usize),
    Call(MacroRef),
    /// Optional macro prefix of a blockquote.
    Prefix(Option<MacroRef>),
    Cell(CellSpec),
    Caption {
        text: String,
        prefix: Option<MacroRef>,
    },
    Link {
        text: Option<String>,
        target: String,
    },
    Image {
        title: Option<String>,
        filename: String,
        url: Option<String>,
    },
    None,
}

impl Token {
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(text) => text,
            _ => &self.raw,
        }
    }

    /// Nesting level of a list item or heading: the length of its marker run.
    pub fn level(&self) -> usize {
        self.text().chars().count()
    }

    pub fn newlines(&self) -> usize {
        match self.value {
            TokenValue::Newlines(count) => count,
            _ => 0,
        }
    }
}
