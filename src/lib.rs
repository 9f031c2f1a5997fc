//! Lexer and structural parser for WikklyText, a TiddlyWiki-flavoured wiki
//! markup with typed macro calls.
//!
//! The parser turns markup into a stream of begin/end events delivered to a
//! [`Compiler`]; rendering is up to the backend implementing that trait.

pub mod binder;
pub mod compiler;
pub mod config;
pub mod error;
pub mod lexer;
pub mod location;
pub mod macros;
pub mod params;
pub mod parser;
pub mod recorder;
pub mod token;

pub use binder::{bind_and_call, get_macro_for};
pub use compiler::{CompileResult, Compiler};
pub use config::{Config, MacroDeclaration};
pub use error::{ConfigError, MarkupError};
pub use lexer::{tokenize, Lexer};
pub use location::Location;
pub use macros::{
    BoundArguments, Capabilities, Environment, MacroContext, MacroDescriptor, MacroLibrary,
    MacroMethod, MarkupSource, ParamSpec, Value, ValueKind,
};
pub use params::{parse_parameter_list, Terminator};
pub use parser::{parse, ListKind, Parser, Toggle};
pub use recorder::{Event, EventRecorder};
pub use token::{CallArguments, CellSpec, Kind, MacroRef, Token, TokenValue};
