use crate::error::MarkupError;
use crate::location::Location;
use crate::macros::{Environment, MacroDescriptor};
use crate::token::CallArguments;

pub type CompileResult = Result<(), MarkupError>;

/// Receiver of the structural events the parser emits.
///
/// Every `begin_*` is matched by exactly one `end_*`, in LIFO order, between
/// one `begin_document` and one `end_document`. All methods default to doing
/// nothing so a backend only implements the events it cares about. A backend
/// error aborts the parse.
pub trait Compiler {
    fn begin_document(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_document(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_paragraph(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_paragraph(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_bold(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_bold(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_italic(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_italic(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_strikethrough(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_strikethrough(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_underline(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_underline(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_superscript(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_superscript(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_subscript(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_subscript(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_nlist(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_nlist(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_nlist_item(&mut self, _level: usize) -> CompileResult {
        Ok(())
    }
    fn end_nlist_item(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_ulist(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_ulist(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_ulist_item(&mut self, _level: usize) -> CompileResult {
        Ok(())
    }
    fn end_ulist_item(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_heading(&mut self, _level: usize) -> CompileResult {
        Ok(())
    }
    fn end_heading(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_blockquote(
        &mut self,
        _macro_descriptor: Option<&MacroDescriptor>,
        _args: &CallArguments,
    ) -> CompileResult {
        Ok(())
    }
    fn end_blockquote(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_table(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_table(&mut self) -> CompileResult {
        Ok(())
    }
    fn set_table_caption(
        &mut self,
        _caption: &str,
        _macro_descriptor: Option<&MacroDescriptor>,
        _args: &CallArguments,
    ) -> CompileResult {
        Ok(())
    }
    fn begin_table_row(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_table_row(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_table_cell(
        &mut self,
        _header: bool,
        _macro_descriptor: Option<&MacroDescriptor>,
        _args: &CallArguments,
    ) -> CompileResult {
        Ok(())
    }
    fn end_table_cell(&mut self) -> CompileResult {
        Ok(())
    }

    fn begin_definition_list(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_definition_list(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_definition_term(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_definition_term(&mut self) -> CompileResult {
        Ok(())
    }
    fn begin_definition_def(&mut self) -> CompileResult {
        Ok(())
    }
    fn end_definition_def(&mut self) -> CompileResult {
        Ok(())
    }

    /// `text` is `None` for `[[Target]]`, where the target doubles as text.
    fn handle_link(&mut self, _target: &str, _text: Option<&str>) -> CompileResult {
        Ok(())
    }
    fn handle_img_link(
        &mut self,
        _title: Option<&str>,
        _filename: &str,
        _url: Option<&str>,
    ) -> CompileResult {
        Ok(())
    }

    fn word(&mut self, _text: &str) -> CompileResult {
        Ok(())
    }
    fn other_characters(&mut self, _text: &str) -> CompileResult {
        Ok(())
    }
    fn separator(&mut self) -> CompileResult {
        Ok(())
    }
    fn linebreak(&mut self) -> CompileResult {
        Ok(())
    }

    fn call_macro(
        &mut self,
        _environment: Environment,
        _macro_descriptor: &MacroDescriptor,
        _args: &CallArguments,
        _location: &Location,
    ) -> CompileResult {
        Ok(())
    }

    /// Opens `@@name: ... @@` and `{{name{ ... }}}`.
    fn start_start_tag_macro(
        &mut self,
        _macro_descriptor: &MacroDescriptor,
        _args: &CallArguments,
    ) -> CompileResult {
        Ok(())
    }
    fn end_start_tag_macro(&mut self, _macro_descriptor: &MacroDescriptor) -> CompileResult {
        Ok(())
    }
}
