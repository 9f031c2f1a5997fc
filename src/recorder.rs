use crate::compiler::{CompileResult, Compiler};
use crate::location::Location;
use crate::macros::{Environment, MacroDescriptor};
use crate::parser::{ListKind, Toggle};
use crate::token::CallArguments;
use serde::Serialize;

/// One `Compiler` call, as recorded by `EventRecorder`.
#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    BeginDocument,
    EndDocument,
    BeginParagraph,
    EndParagraph,
    BeginStyle {
        style: Toggle,
    },
    EndStyle {
        style: Toggle,
    },
    BeginList {
        kind: ListKind,
    },
    EndList {
        kind: ListKind,
    },
    BeginListItem {
        kind: ListKind,
        level: usize,
    },
    EndListItem {
        kind: ListKind,
    },
    BeginHeading {
        level: usize,
    },
    EndHeading,
    BeginBlockquote {
        macro_name: Option<String>,
        args: CallArguments,
    },
    EndBlockquote,
    BeginTable,
    EndTable,
    TableCaption {
        text: String,
        macro_name: Option<String>,
        args: CallArguments,
    },
    BeginTableRow,
    EndTableRow,
    BeginTableCell {
        header: bool,
        macro_name: Option<String>,
        args: CallArguments,
    },
    EndTableCell,
    BeginDefinitionList,
    EndDefinitionList,
    BeginTerm,
    EndTerm,
    BeginDefinition,
    EndDefinition,
    Link {
        target: String,
        text: Option<String>,
    },
    ImageLink {
        title: Option<String>,
        filename: String,
        url: Option<String>,
    },
    Word {
        text: String,
    },
    OtherCharacters {
        text: String,
    },
    Separator,
    Linebreak,
    CallMacro {
        environment: Environment,
        name: String,
        args: CallArguments,
        line: usize,
    },
    BeginStartTag {
        name: String,
        args: CallArguments,
    },
    EndStartTag {
        name: String,
    },
}

impl Event {
    /// +1 for events that open a construct, -1 for those that close one.
    pub fn depth_change(&self) -> i32 {
        match self {
            Event::BeginDocument
            | Event::BeginParagraph
            | Event::BeginStyle { .. }
            | Event::BeginList { .. }
            | Event::BeginListItem { .. }
            | Event::BeginHeading { .. }
            | Event::BeginBlockquote { .. }
            | Event::BeginTable
            | Event::BeginTableRow
            | Event::BeginTableCell { .. }
            | Event::BeginDefinitionList
            | Event::BeginTerm
            | Event::BeginDefinition
            | Event::BeginStartTag { .. } => 1,
            Event::EndDocument
            | Event::EndParagraph
            | Event::EndStyle { .. }
            | Event::EndList { .. }
            | Event::EndListItem { .. }
            | Event::EndHeading
            | Event::EndBlockquote
            | Event::EndTable
            | Event::EndTableRow
            | Event::EndTableCell
            | Event::EndDefinitionList
            | Event::EndTerm
            | Event::EndDefinition
            | Event::EndStartTag { .. } => -1,
            _ => 0,
        }
    }
}

/// A `Compiler` that keeps every event it is sent.
#[derive(Debug, Default)]
pub struct EventRecorder {
    pub events: Vec<Event>,
}

impl EventRecorder {
    fn push(&mut self, event: Event) -> CompileResult {
        self.events.push(event);
        Ok(())
    }
}

fn name_of(descriptor: Option<&MacroDescriptor>) -> Option<String> {
    descriptor.map(|d| d.name().to_string())
}

impl Compiler for EventRecorder {
    fn begin_document(&mut self) -> CompileResult {
        self.push(Event::BeginDocument)
    }
    fn end_document(&mut self) -> CompileResult {
        self.push(Event::EndDocument)
    }

    fn begin_paragraph(&mut self) -> CompileResult {
        self.push(Event::BeginParagraph)
    }
    fn end_paragraph(&mut self) -> CompileResult {
        self.push(Event::EndParagraph)
    }

    fn begin_bold(&mut self) -> CompileResult {
        self.push(Event::BeginStyle { style: Toggle::Bold })
    }
    fn end_bold(&mut self) -> CompileResult {
        self.push(Event::EndStyle { style: Toggle::Bold })
    }
    fn begin_italic(&mut self) -> CompileResult {
        self.push(Event::BeginStyle { style: Toggle::Italic })
    }
    fn end_italic(&mut self) -> CompileResult {
        self.push(Event::EndStyle { style: Toggle::Italic })
    }
    fn begin_strikethrough(&mut self) -> CompileResult {
        self.push(Event::BeginStyle {
            style: Toggle::Strikethrough,
        })
    }
    fn end_strikethrough(&mut self) -> CompileResult {
        self.push(Event::EndStyle {
            style: Toggle::Strikethrough,
        })
    }
    fn begin_underline(&mut self) -> CompileResult {
        self.push(Event::BeginStyle {
            style: Toggle::Underline,
        })
    }
    fn end_underline(&mut self) -> CompileResult {
        self.push(Event::EndStyle {
            style: Toggle::Underline,
        })
    }
    fn begin_superscript(&mut self) -> CompileResult {
        self.push(Event::BeginStyle {
            style: Toggle::Superscript,
        })
    }
    fn end_superscript(&mut self) -> CompileResult {
        self.push(Event::EndStyle {
            style: Toggle::Superscript,
        })
    }
    fn begin_subscript(&mut self) -> CompileResult {
        self.push(Event::BeginStyle {
            style: Toggle::Subscript,
        })
    }
    fn end_subscript(&mut self) -> CompileResult {
        self.push(Event::EndStyle {
            style: Toggle::Subscript,
        })
    }

    fn begin_nlist(&mut self) -> CompileResult {
        self.push(Event::BeginList {
            kind: ListKind::Numbered,
        })
    }
    fn end_nlist(&mut self) -> CompileResult {
        self.push(Event::EndList {
            kind: ListKind::Numbered,
        })
    }
    fn begin_nlist_item(&mut self, level: usize) -> CompileResult {
        self.push(Event::BeginListItem {
            kind: ListKind::Numbered,
            level,
        })
    }
    fn end_nlist_item(&mut self) -> CompileResult {
        self.push(Event::EndListItem {
            kind: ListKind::Numbered,
        })
    }
    fn begin_ulist(&mut self) -> CompileResult {
        self.push(Event::BeginList {
            kind: ListKind::Unnumbered,
        })
    }
    fn end_ulist(&mut self) -> CompileResult {
        self.push(Event::EndList {
            kind: ListKind::Unnumbered,
        })
    }
    fn begin_ulist_item(&mut self, level: usize) -> CompileResult {
        self.push(Event::BeginListItem {
            kind: ListKind::Unnumbered,
            level,
        })
    }
    fn end_ulist_item(&mut self) -> CompileResult {
        self.push(Event::EndListItem {
            kind: ListKind::Unnumbered,
        })
    }

    fn begin_heading(&mut self, level: usize) -> CompileResult {
        self.push(Event::BeginHeading { level })
    }
    fn end_heading(&mut self) -> CompileResult {
        self.push(Event::EndHeading)
    }

    fn begin_blockquote(
        &mut self,
        macro_descriptor: Option<&MacroDescriptor>,
        args: &CallArguments,
    ) -> CompileResult {
        self.push(Event::BeginBlockquote {
            macro_name: name_of(macro_descriptor),
            args: args.clone(),
        })
    }
    fn end_blockquote(&mut self) -> CompileResult {
        self.push(Event::EndBlockquote)
    }

    fn begin_table(&mut self) -> CompileResult {
        self.push(Event::BeginTable)
    }
    fn end_table(&mut self) -> CompileResult {
        self.push(Event::EndTable)
    }
    fn set_table_caption(
        &mut self,
        caption: &str,
        macro_descriptor: Option<&MacroDescriptor>,
        args: &CallArguments,
    ) -> CompileResult {
        self.push(Event::TableCaption {
            text: caption.to_string(),
            macro_name: name_of(macro_descriptor),
            args: args.clone(),
        })
    }
    fn begin_table_row(&mut self) -> CompileResult {
        self.push(Event::BeginTableRow)
    }
    fn end_table_row(&mut self) -> CompileResult {
        self.push(Event::EndTableRow)
    }
    fn begin_table_cell(
        &mut self,
        header: bool,
        macro_descriptor: Option<&MacroDescriptor>,
        args: &CallArguments,
    ) -> CompileResult {
        self.push(Event::BeginTableCell {
            header,
            macro_name: name_of(macro_descriptor),
            args: args.clone(),
        })
    }
    fn end_table_cell(&mut self) -> CompileResult {
        self.push(Event::EndTableCell)
    }

    fn begin_definition_list(&mut self) -> CompileResult {
        self.push(Event::BeginDefinitionList)
    }
    fn end_definition_list(&mut self) -> CompileResult {
        self.push(Event::EndDefinitionList)
    }
    fn begin_definition_term(&mut self) -> CompileResult {
        self.push(Event::BeginTerm)
    }
    fn end_definition_term(&mut self) -> CompileResult {
        self.push(Event::EndTerm)
    }
    fn begin_definition_def(&mut self) -> CompileResult {
        self.push(Event::BeginDefinition)
    }
    fn end_definition_def(&mut self) -> CompileResult {
        self.push(Event::EndDefinition)
    }

    fn handle_link(&mut self, target: &str, text: Option<&str>) -> CompileResult {
        self.push(Event::Link {
            target: target.to_string(),
            text: text.map(str::to_string),
        })
    }
    fn handle_img_link(
        &mut self,
        title: Option<&str>,
        filename: &str,
        url: Option<&str>,
    ) -> CompileResult {
        self.push(Event::ImageLink {
            title: title.map(str::to_string),
            filename: filename.to_string(),
            url: url.map(str::to_string),
        })
    }

    fn word(&mut self, text: &str) -> CompileResult {
        self.push(Event::Word {
            text: text.to_string(),
        })
    }
    fn other_characters(&mut self, text: &str) -> CompileResult {
        self.push(Event::OtherCharacters {
            text: text.to_string(),
        })
    }
    fn separator(&mut self) -> CompileResult {
        self.push(Event::Separator)
    }
    fn linebreak(&mut self) -> CompileResult {
        self.push(Event::Linebreak)
    }

    fn call_macro(
        &mut self,
        environment: Environment,
        macro_descriptor: &MacroDescriptor,
        args: &CallArguments,
        location: &Location,
    ) -> CompileResult {
        self.push(Event::CallMacro {
            environment,
            name: macro_descriptor.name().to_string(),
            args: args.clone(),
            line: location.line,
        })
    }

    fn start_start_tag_macro(
        &mut self,
        macro_descriptor: &MacroDescriptor,
        args: &CallArguments,
    ) -> CompileResult {
        self.push(Event::BeginStartTag {
            name: macro_descriptor.name().to_string(),
            args: args.clone(),
        })
    }
    fn end_start_tag_macro(&mut self, macro_descriptor: &MacroDescriptor) -> CompileResult {
        self.push(Event::EndStartTag {
            name: macro_descriptor.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_tag() {
        let event = Event::BeginListItem {
            kind: ListKind::Numbered,
            level: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "event": "begin_list_item", "kind": "numbered", "level": 2 })
        );
        assert_eq!(
            serde_json::to_value(Event::EndDocument).unwrap(),
            serde_json::json!({ "event": "end_document" })
        );
    }

    #[test]
    fn depth_change_pairs_up() {
        assert_eq!(Event::BeginTable.depth_change(), 1);
        assert_eq!(Event::EndTable.depth_change(), -1);
        assert_eq!(Event::Separator.depth_change(), 0);
    }
}
