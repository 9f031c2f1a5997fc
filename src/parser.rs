use crate::binder::get_macro_for;
use crate::compiler::{CompileResult, Compiler};
use crate::error::MarkupError;
use crate::lexer::tokenize;
use crate::location::Location;
use crate::macros::{Environment, MacroDescriptor, MacroLibrary};
use crate::token::{CallArguments, CellSpec, Kind, MacroRef, Token, TokenValue};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    Bold,
    Italic,
    Strikethrough,
    Underline,
    Superscript,
    Subscript,
}

impl Toggle {
    fn from_kind(kind: Kind) -> Option<Self> {
        match kind {
            Kind::Bold => Some(Toggle::Bold),
            Kind::Italic => Some(Toggle::Italic),
            Kind::Strikethrough => Some(Toggle::Strikethrough),
            Kind::Underline => Some(Toggle::Underline),
            Kind::Superscript => Some(Toggle::Superscript),
            Kind::Subscript => Some(Toggle::Subscript),
            _ => None,
        }
    }

    fn delimiter(self) -> &'static str {
        match self {
            Toggle::Bold => "''",
            Toggle::Italic => "//",
            Toggle::Strikethrough => "--",
            Toggle::Underline => "__",
            Toggle::Superscript => "^^",
            Toggle::Subscript => "~~",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Kind of the permanent bottom entry of the list stack.
    None,
    Numbered,
    Unnumbered,
}

#[derive(Debug, Clone, Copy)]
struct ListEntry {
    kind: ListKind,
    level: usize,
}

const LIST_SENTINEL: ListEntry = ListEntry {
    kind: ListKind::None,
    level: 0,
};

/// An open inline construct. These close in strict LIFO order.
#[derive(Debug, Clone)]
enum InlineFrame<'l> {
    Toggle(Toggle),
    StartTag(&'l MacroDescriptor, CallArguments),
    InlineBlock(&'l MacroDescriptor, CallArguments),
}

impl InlineFrame<'_> {
    fn describe(&self) -> String {
        match self {
            InlineFrame::Toggle(toggle) => format!("{0} … {0}", toggle.delimiter()),
            InlineFrame::StartTag(descriptor, _) => format!("@@{}: … @@", descriptor.name()),
            InlineFrame::InlineBlock(descriptor, _) => {
                format!("{{{{{}{{ … }}}}}}", descriptor.name())
            }
        }
    }

    fn closed_by(&self, kind: Kind) -> bool {
        match self {
            InlineFrame::Toggle(toggle) => Toggle::from_kind(kind) == Some(*toggle),
            InlineFrame::StartTag(..) => kind == Kind::StartTagMacroEnd,
            InlineFrame::InlineBlock(..) => kind == Kind::InlineBlockEnd,
        }
    }
}

/// Drives the lexer over a source text and reports its structure to a
/// `Compiler`. Holds nothing but the macro library, so one parser may be
/// used for any number of documents.
pub struct Parser<'l> {
    library: &'l MacroLibrary,
}

impl<'l> Parser<'l> {
    pub fn new(library: &'l MacroLibrary) -> Self {
        Self { library }
    }

    pub fn parse<C: Compiler + ?Sized>(&self, source: &str, compiler: &mut C) -> CompileResult {
        ParseRun::new(self.library, source, compiler).run()
    }
}

pub fn parse<C: Compiler + ?Sized>(
    source: &str,
    library: &MacroLibrary,
    compiler: &mut C,
) -> CompileResult {
    Parser::new(library).parse(source, compiler)
}

/// State of one parse. Created per call and dropped with it.
struct ParseRun<'l, 's, 'c, C: Compiler + ?Sized> {
    library: &'l MacroLibrary,
    source: &'s str,
    compiler: &'c mut C,

    toggles: [bool; 6],
    inline: Vec<InlineFrame<'l>>,
    /// Frames ended at a block boundary but not closed in the markup. The
    /// next inline content reopens them.
    suspended: Vec<InlineFrame<'l>>,
    lists: Vec<ListEntry>,
    paragraph: bool,
    heading: bool,
    table: bool,
    row: bool,
    cell: bool,
    deflist: bool,
    term: bool,
    definition: bool,
    blockquote: bool,
    /// A single newline was seen inside the open paragraph.
    pending_break: bool,
    html_comment: bool,
    c_comment: bool,
    /// Kind and newline count of the previous significant token.
    last: Option<(Kind, usize)>,
}

impl<'l, 's, 'c, C: Compiler + ?Sized> ParseRun<'l, 's, 'c, C> {
    fn new(library: &'l MacroLibrary, source: &'s str, compiler: &'c mut C) -> Self {
        Self {
            library,
            source,
            compiler,
            toggles: [false; 6],
            inline: Vec::new(),
            suspended: Vec::new(),
            lists: vec![LIST_SENTINEL],
            paragraph: false,
            heading: false,
            table: false,
            row: false,
            cell: false,
            deflist: false,
            term: false,
            definition: false,
            blockquote: false,
            pending_break: false,
            html_comment: false,
            c_comment: false,
            last: None,
        }
    }

    fn run(mut self) -> CompileResult {
        self.compiler.begin_document()?;

        for token in tokenize(self.source) {
            let token = token?;
            if self.is_stripped(&token) {
                continue;
            }

            self.close_after_previous(&token)?;
            self.handle(&token)?;
            self.last = Some((token.kind, token.newlines()));
        }

        self.finish()
    }

    /// Tokens that leave no trace in the output. Comment marker lines are
    /// only stripped where they open or close a comment; anywhere else they
    /// are plain characters.
    fn is_stripped(&mut self, token: &Token) -> bool {
        match token.kind {
            Kind::Comment | Kind::NullDot => true,
            Kind::HtmlCommentStart => !std::mem::replace(&mut self.html_comment, true),
            Kind::HtmlCommentEnd => std::mem::replace(&mut self.html_comment, false),
            Kind::CCommentStart => !std::mem::replace(&mut self.c_comment, true),
            _ => false,
        }
    }

    /// Closings that depend on what the previous token was.
    fn close_after_previous(&mut self, token: &Token) -> CompileResult {
        match self.last {
            Some((Kind::Eols, 1)) => {
                if self.lists.len() > 1 && !matches!(token.kind, Kind::NListItem | Kind::UListItem) {
                    self.suspend_inline_frames()?;
                    self.close_lists()?;
                }
                if self.deflist && !matches!(token.kind, Kind::DTerm | Kind::DDefinition) {
                    self.suspend_inline_frames()?;
                    self.close_definition_list()?;
                }
            }
            Some((Kind::TableRowEnd | Kind::TableCaption, _)) => {
                if self.table && !matches!(token.kind, Kind::TableRowStart | Kind::TableCaption) {
                    self.close_table()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle(&mut self, token: &Token) -> CompileResult {
        if let Some(toggle) = Toggle::from_kind(token.kind) {
            return self.toggle(toggle, token);
        }

        match token.kind {
            Kind::Eols => self.line_breaks(token.newlines()),

            Kind::NListItem => self.list_item(ListKind::Numbered, token),
            Kind::UListItem => self.list_item(ListKind::Unnumbered, token),

            Kind::Heading => {
                self.close_block_content()?;
                self.close_containers()?;
                self.compiler.begin_heading(token.level())?;
                self.heading = true;
                Ok(())
            }

            Kind::DTerm | Kind::DDefinition => {
                self.close_block_content()?;
                self.close_lists()?;
                self.close_table()?;
                if !self.deflist {
                    self.compiler.begin_definition_list()?;
                    self.deflist = true;
                }
                if token.kind == Kind::DTerm {
                    self.compiler.begin_definition_term()?;
                    self.term = true;
                } else {
                    self.compiler.begin_definition_def()?;
                    self.definition = true;
                }
                Ok(())
            }

            Kind::Separator => {
                self.close_block_content()?;
                self.close_containers()?;
                self.compiler.separator()
            }

            Kind::BlockquoteStart => self.blockquote_start(token),
            Kind::BlockquoteEnd => self.blockquote_end(token),

            Kind::TableRowStart => {
                self.close_block_content()?;
                self.close_lists()?;
                self.close_definition_list()?;
                if !self.table {
                    debug!(line = token.location.line, "table opened");
                    self.compiler.begin_table()?;
                    self.table = true;
                }
                self.end_row()?;
                self.compiler.begin_table_row()?;
                self.row = true;
                self.begin_cell(cell_of(token)?, token)
            }
            Kind::TableRowEnd => self.end_row(),
            Kind::TableEnd => {
                self.end_row()?;
                self.close_table()
            }
            Kind::TableCaption => self.caption(token),
            Kind::PipeChar => match &token.value {
                TokenValue::Cell(cell) => {
                    if !self.row {
                        return Err(MarkupError::internal(
                            "cell boundary outside of a table row",
                            token.location.clone(),
                        ));
                    }
                    self.suspend_inline_frames()?;
                    self.end_cell()?;
                    self.begin_cell(cell, token)
                }
                _ => self.characters(token.text()),
            },

            Kind::Macro => self.macro_call(token),
            Kind::StartTagMacroStart => {
                self.inline_macro_start(token, InlineFrame::StartTag)
            }
            Kind::InlineBlockStart => {
                self.inline_macro_start(token, InlineFrame::InlineBlock)
            }
            Kind::StartTagMacroEnd | Kind::InlineBlockEnd => self.close_frame(token),

            Kind::LinkA | Kind::LinkAB => match &token.value {
                TokenValue::Link { text, target } => {
                    self.open_inline()?;
                    self.compiler.handle_link(target, text.as_deref())
                }
                _ => Err(unexpected_value(token)),
            },
            Kind::CatchUrl => {
                self.open_inline()?;
                self.compiler.handle_link(token.text(), Some(token.text()))
            }
            Kind::ImgLink => match &token.value {
                TokenValue::Image {
                    title,
                    filename,
                    url,
                } => {
                    self.open_inline()?;
                    self.compiler
                        .handle_img_link(title.as_deref(), filename, url.as_deref())
                }
                _ => Err(unexpected_value(token)),
            },
            Kind::HtmlBreak => {
                self.open_inline()?;
                self.compiler.linebreak()
            }

            Kind::Word => {
                self.open_inline()?;
                self.compiler.word(token.text())
            }
            Kind::OtherCharacters
            | Kind::HtmlCommentStart
            | Kind::HtmlCommentEnd
            | Kind::CCommentStart => self.characters(token.text()),

            // Toggles are handled above; comments and null dots never get here.
            Kind::Bold
            | Kind::Italic
            | Kind::Strikethrough
            | Kind::Underline
            | Kind::Superscript
            | Kind::Subscript
            | Kind::Comment
            | Kind::NullDot => Ok(()),
        }
    }

    fn finish(mut self) -> CompileResult {
        let end = Location::end_of(self.source);
        if let Some(frame) = self.inline.last().or(self.suspended.last()) {
            return Err(MarkupError::parse(
                format!("Input ended inside {}", frame.describe()),
                end,
            ));
        }
        if self.blockquote {
            return Err(MarkupError::parse("Input ended inside <<< … >>>", end));
        }

        self.close_block_content()?;
        self.close_containers()?;
        self.compiler.end_document()
    }

    fn at_root(&self) -> bool {
        !self.paragraph && !self.heading && !self.deflist && !self.table && self.lists.len() == 1
    }

    /// Prepares for inline content: flushes a pending soft break and opens a
    /// paragraph when the content sits directly on the document root.
    fn open_inline(&mut self) -> CompileResult {
        if self.pending_break {
            self.pending_break = false;
            self.compiler.other_characters("\n")?;
        }
        if self.at_root() {
            self.compiler.begin_paragraph()?;
            self.paragraph = true;
        }
        for frame in std::mem::take(&mut self.suspended) {
            self.open_frame(frame)?;
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> CompileResult {
        if self.at_root() && text.trim().is_empty() {
            return Ok(());
        }
        self.open_inline()?;
        self.compiler.other_characters(text)
    }

    fn line_breaks(&mut self, newlines: usize) -> CompileResult {
        if newlines >= 2 {
            self.close_block_content()?;
            self.close_lists()?;
            self.close_definition_list()?;
            return Ok(());
        }

        if self.heading || self.term || self.definition {
            self.suspend_inline_frames()?;
            self.close_line_blocks()?;
        } else if self.paragraph {
            self.pending_break = true;
        }
        Ok(())
    }

    fn toggle(&mut self, toggle: Toggle, token: &Token) -> CompileResult {
        if self.toggles[toggle as usize] {
            self.close_frame(token)
        } else {
            self.open_inline()?;
            self.open_frame(InlineFrame::Toggle(toggle))
        }
    }

    fn open_frame(&mut self, frame: InlineFrame<'l>) -> CompileResult {
        match &frame {
            InlineFrame::Toggle(toggle) => {
                self.toggles[*toggle as usize] = true;
                self.begin_toggle(*toggle)?;
            }
            InlineFrame::StartTag(descriptor, args) | InlineFrame::InlineBlock(descriptor, args) => {
                self.compiler.start_start_tag_macro(descriptor, args)?;
            }
        }
        self.inline.push(frame);
        Ok(())
    }

    fn end_frame(&mut self, frame: &InlineFrame<'l>) -> CompileResult {
        match frame {
            InlineFrame::Toggle(toggle) => self.end_toggle(*toggle),
            InlineFrame::StartTag(descriptor, _) | InlineFrame::InlineBlock(descriptor, _) => {
                self.compiler.end_start_tag_macro(descriptor)
            }
        }
    }

    /// Handles a closing delimiter. It must close the innermost open frame,
    /// or the innermost suspended one when nothing has been reopened yet.
    fn close_frame(&mut self, token: &Token) -> CompileResult {
        let reopened = !self.inline.is_empty();
        let frames = if reopened {
            &mut self.inline
        } else {
            &mut self.suspended
        };
        let frame = match frames.pop() {
            Some(frame) if frame.closed_by(token.kind) => frame,
            innermost => return Err(mismatched_end(token, innermost.as_ref())),
        };

        if let InlineFrame::Toggle(toggle) = &frame {
            self.toggles[*toggle as usize] = false;
        }
        if reopened {
            self.end_frame(&frame)?;
        }
        Ok(())
    }

    fn begin_toggle(&mut self, toggle: Toggle) -> CompileResult {
        match toggle {
            Toggle::Bold => self.compiler.begin_bold(),
            Toggle::Italic => self.compiler.begin_italic(),
            Toggle::Strikethrough => self.compiler.begin_strikethrough(),
            Toggle::Underline => self.compiler.begin_underline(),
            Toggle::Superscript => self.compiler.begin_superscript(),
            Toggle::Subscript => self.compiler.begin_subscript(),
        }
    }

    fn end_toggle(&mut self, toggle: Toggle) -> CompileResult {
        match toggle {
            Toggle::Bold => self.compiler.end_bold(),
            Toggle::Italic => self.compiler.end_italic(),
            Toggle::Strikethrough => self.compiler.end_strikethrough(),
            Toggle::Underline => self.compiler.end_underline(),
            Toggle::Superscript => self.compiler.end_superscript(),
            Toggle::Subscript => self.compiler.end_subscript(),
        }
    }

    /// Ends the open inline frames at a block boundary. They stay open in
    /// the markup, so their flags are kept and the next inline content
    /// reopens them.
    fn suspend_inline_frames(&mut self) -> CompileResult {
        let frames = std::mem::take(&mut self.inline);
        for frame in frames.iter().rev() {
            self.end_frame(frame)?;
        }
        self.suspended.extend(frames);
        Ok(())
    }

    /// Ends every inline frame for good, suspended ones included.
    fn discard_inline_frames(&mut self) -> CompileResult {
        let frames = std::mem::take(&mut self.inline);
        for frame in frames.iter().rev() {
            self.end_frame(frame)?;
        }
        self.suspended.clear();
        self.toggles = [false; 6];
        Ok(())
    }

    /// Ends everything that lives inside a single block: inline frames,
    /// headings, terms, definitions and the paragraph.
    fn close_block_content(&mut self) -> CompileResult {
        self.suspend_inline_frames()?;
        self.close_line_blocks()?;
        self.close_paragraph()
    }

    fn close_line_blocks(&mut self) -> CompileResult {
        if self.heading {
            self.compiler.end_heading()?;
            self.heading = false;
        }
        if self.term {
            self.compiler.end_definition_term()?;
            self.term = false;
        }
        if self.definition {
            self.compiler.end_definition_def()?;
            self.definition = false;
        }
        Ok(())
    }

    fn close_paragraph(&mut self) -> CompileResult {
        self.pending_break = false;
        if self.paragraph {
            self.compiler.end_paragraph()?;
            self.paragraph = false;
        }
        Ok(())
    }

    fn close_containers(&mut self) -> CompileResult {
        self.close_lists()?;
        self.close_definition_list()?;
        self.close_table()
    }

    fn close_definition_list(&mut self) -> CompileResult {
        self.close_line_blocks()?;
        if self.deflist {
            self.compiler.end_definition_list()?;
            self.deflist = false;
        }
        Ok(())
    }

    fn close_table(&mut self) -> CompileResult {
        if !self.table {
            return Ok(());
        }
        self.end_row()?;
        self.compiler.end_table()?;
        self.table = false;
        debug!("table closed");
        Ok(())
    }

    fn begin_cell(&mut self, cell: &CellSpec, token: &Token) -> CompileResult {
        let (descriptor, args) = self.resolve_prefix(cell.prefix.as_ref(), &token.location)?;
        self.compiler.begin_table_cell(cell.header, descriptor, &args)?;
        self.cell = true;
        Ok(())
    }

    fn end_cell(&mut self) -> CompileResult {
        if self.cell {
            self.compiler.end_table_cell()?;
            self.cell = false;
        }
        Ok(())
    }

    fn end_row(&mut self) -> CompileResult {
        self.suspend_inline_frames()?;
        self.end_cell()?;
        if self.row {
            self.compiler.end_table_row()?;
            self.row = false;
        }
        Ok(())
    }

    fn caption(&mut self, token: &Token) -> CompileResult {
        let TokenValue::Caption { text, prefix } = &token.value else {
            return Err(unexpected_value(token));
        };

        self.close_block_content()?;
        self.close_lists()?;
        self.close_definition_list()?;
        if !self.table {
            debug!(line = token.location.line, "table opened by caption");
            self.compiler.begin_table()?;
            self.table = true;
        }

        let (descriptor, args) = self.resolve_prefix(prefix.as_ref(), &token.location)?;
        self.compiler.set_table_caption(text, descriptor, &args)
    }

    fn list_item(&mut self, kind: ListKind, token: &Token) -> CompileResult {
        self.close_block_content()?;
        self.close_definition_list()?;
        self.close_table()?;

        let level = token.level();
        let top = *self
            .lists
            .last()
            .ok_or_else(|| MarkupError::internal("list stack lost its sentinel", token.location.clone()))?;

        match (top.level.cmp(&level), top.kind == kind) {
            // Same list, next item.
            (Ordering::Equal, true) => {
                self.end_list_item(kind)?;
                self.begin_list_item(kind, level)
            }
            // Deeper: a new list nested in the current item.
            (Ordering::Less, _) => self.open_list(kind, level),
            // Shallower: close lists until this item's own list is on top.
            // Without one, the item starts a fresh list.
            (Ordering::Greater, _) => {
                while let Some(top) = self.lists.last().copied() {
                    if top.kind == ListKind::None || (top.kind == kind && top.level == level) {
                        break;
                    }
                    self.end_list_item(top.kind)?;
                    self.end_list(top.kind)?;
                    self.lists.pop();
                }
                if self.lists.len() == 1 {
                    self.open_list(kind, level)
                } else {
                    self.end_list_item(kind)?;
                    self.begin_list_item(kind, level)
                }
            }
            // Same level, other kind: replace the list.
            (Ordering::Equal, false) => {
                if top.kind == ListKind::None {
                    return Err(MarkupError::internal(
                        "list item at the level of the list stack sentinel",
                        token.location.clone(),
                    ));
                }
                self.end_list_item(top.kind)?;
                self.end_list(top.kind)?;
                self.lists.pop();
                self.open_list(kind, level)
            }
        }
    }

    fn open_list(&mut self, kind: ListKind, level: usize) -> CompileResult {
        self.begin_list(kind)?;
        self.lists.push(ListEntry { kind, level });
        self.begin_list_item(kind, level)
    }

    fn close_lists(&mut self) -> CompileResult {
        while let Some(top) = self.lists.last().copied() {
            if top.kind == ListKind::None {
                break;
            }
            self.end_list_item(top.kind)?;
            self.end_list(top.kind)?;
            self.lists.pop();
        }
        Ok(())
    }

    fn begin_list(&mut self, kind: ListKind) -> CompileResult {
        match kind {
            ListKind::Numbered => self.compiler.begin_nlist(),
            ListKind::Unnumbered => self.compiler.begin_ulist(),
            ListKind::None => Ok(()),
        }
    }

    fn end_list(&mut self, kind: ListKind) -> CompileResult {
        match kind {
            ListKind::Numbered => self.compiler.end_nlist(),
            ListKind::Unnumbered => self.compiler.end_ulist(),
            ListKind::None => Ok(()),
        }
    }

    fn begin_list_item(&mut self, kind: ListKind, level: usize) -> CompileResult {
        match kind {
            ListKind::Numbered => self.compiler.begin_nlist_item(level),
            ListKind::Unnumbered => self.compiler.begin_ulist_item(level),
            ListKind::None => Ok(()),
        }
    }

    fn end_list_item(&mut self, kind: ListKind) -> CompileResult {
        match kind {
            ListKind::Numbered => self.compiler.end_nlist_item(),
            ListKind::Unnumbered => self.compiler.end_ulist_item(),
            ListKind::None => Ok(()),
        }
    }

    fn blockquote_start(&mut self, token: &Token) -> CompileResult {
        if self.blockquote {
            return Err(MarkupError::parse(
                "Blockquotes cannot be nested",
                token.location.clone(),
            ));
        }
        let prefix = match &token.value {
            TokenValue::Prefix(prefix) => prefix.as_ref(),
            _ => return Err(unexpected_value(token)),
        };

        self.close_block_content()?;
        self.close_containers()?;

        let (descriptor, args) = self.resolve_prefix(prefix, &token.location)?;
        debug!(line = token.location.line, macro_name = ?descriptor.map(|d| d.name()), "blockquote opened");
        self.compiler.begin_blockquote(descriptor, &args)?;
        self.blockquote = true;
        Ok(())
    }

    fn blockquote_end(&mut self, token: &Token) -> CompileResult {
        if !self.blockquote {
            return Err(MarkupError::parse(
                "Unexpected end of blockquote",
                token.location.clone(),
            ));
        }

        self.discard_inline_frames()?;
        self.close_block_content()?;
        self.close_containers()?;
        self.compiler.end_blockquote()?;
        self.blockquote = false;
        debug!(line = token.location.line, "blockquote closed");
        Ok(())
    }

    fn macro_call(&mut self, token: &Token) -> CompileResult {
        let call = call_of(token)?;
        let descriptor = self.library.get(&call.name, &token.location)?;

        let isolated = preceded_by_paragraph_break(self.source, token.span.start)
            && followed_by_paragraph_break(self.source, token.span.end);
        let environment = if isolated && descriptor.supports(Environment::Block) {
            Environment::Block
        } else {
            Environment::Inline
        };
        debug!(name = %call.name, %environment, isolated, line = token.location.line, "macro call");

        match environment {
            Environment::Block => {
                self.close_block_content()?;
                self.close_containers()?;
            }
            Environment::Inline => {
                if !descriptor.supports(Environment::Inline) {
                    return Err(MarkupError::unsuitable(
                        format!("Macro “{}” cannot be used inline", call.name),
                        token.location.clone(),
                    ));
                }
                self.open_inline()?;
            }
        }

        self.compiler
            .call_macro(environment, descriptor, &call.args, &token.location)
    }

    fn inline_macro_start(
        &mut self,
        token: &Token,
        frame: fn(&'l MacroDescriptor, CallArguments) -> InlineFrame<'l>,
    ) -> CompileResult {
        let call = call_of(token)?;
        let descriptor = self.library.get(&call.name, &token.location)?;
        if !descriptor.supports(Environment::Inline) {
            return Err(MarkupError::unsuitable(
                format!("Macro “{}” cannot be used inline", call.name),
                token.location.clone(),
            ));
        }
        require_tag_params(descriptor, &token.location)?;

        self.open_inline()?;
        self.open_frame(frame(descriptor, call.args.clone()))
    }

    fn resolve_prefix(
        &self,
        prefix: Option<&MacroRef>,
        location: &Location,
    ) -> Result<(Option<&'l MacroDescriptor>, CallArguments), MarkupError> {
        let (descriptor, args) = get_macro_for(self.library, prefix, location)?;
        if let Some(descriptor) = descriptor {
            require_tag_params(descriptor, location)?;
        }
        Ok((descriptor, args))
    }
}

fn require_tag_params(descriptor: &MacroDescriptor, location: &Location) -> Result<(), MarkupError> {
    if descriptor.capabilities().has_tag_params {
        Ok(())
    } else {
        Err(MarkupError::unsuitable(
            format!("Macro “{}” provides no tag parameters", descriptor.name()),
            location.clone(),
        ))
    }
}

fn call_of(token: &Token) -> Result<&MacroRef, MarkupError> {
    match &token.value {
        TokenValue::Call(call) => Ok(call),
        _ => Err(unexpected_value(token)),
    }
}

fn cell_of(token: &Token) -> Result<&CellSpec, MarkupError> {
    match &token.value {
        TokenValue::Cell(cell) => Ok(cell),
        _ => Err(unexpected_value(token)),
    }
}

fn unexpected_value(token: &Token) -> MarkupError {
    MarkupError::internal(
        format!("{:?} token carries {:?}", token.kind, token.value),
        token.location.clone(),
    )
}

fn mismatched_end(token: &Token, innermost: Option<&InlineFrame>) -> MarkupError {
    let message = match innermost {
        Some(frame) => format!("Unexpected end of “{}” inside {}", token.raw, frame.describe()),
        None => format!("Unexpected end of “{}”", token.raw),
    };
    MarkupError::parse(message, token.location.clone())
}

/// True if only blank space separates `offset` from the start of the input
/// or from a preceding blank line.
fn preceded_by_paragraph_break(source: &str, offset: usize) -> bool {
    let before = &source[..offset];
    let trimmed = before.trim_end_matches([' ', '\t', '\n']);
    trimmed.is_empty() || before[trimmed.len()..].matches('\n').count() >= 2
}

fn followed_by_paragraph_break(source: &str, offset: usize) -> bool {
    let after = &source[offset..];
    let trimmed = after.trim_start_matches([' ', '\t', '\n']);
    trimmed.is_empty() || after[..after.len() - trimmed.len()].matches('\n').count() >= 2
}
