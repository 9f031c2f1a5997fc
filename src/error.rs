use crate::location::Location;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Every way a parse can fail. All of them abort the running parse.
#[derive(Debug, Error)]
pub enum MarkupError {
    /// Malformed literal or parameter list.
    #[error("SyntaxError: {message}\n  --> {location}")]
    Syntax { message: String, location: Location },

    #[error("UnknownMacro: macro named “{name}” not found\n  --> {location}")]
    UnknownMacro { name: String, location: Location },

    /// The macro exists but lacks the environment or capability asked for.
    #[error("UnsuitableMacro: {message}\n  --> {location}")]
    UnsuitableMacro { message: String, location: Location },

    /// Structural violation of the markup.
    #[error("ParseError: {message}\n  --> {location}")]
    Parse { message: String, location: Location },

    #[error("ErrorInMacroCall: error calling “{macro_name}”: {message}\n  --> {location}")]
    ErrorInMacroCall {
        macro_name: String,
        message: String,
        location: Location,
        #[source]
        source: Option<Box<dyn Error + Send + Sync + 'static>>,
    },

    /// A state the parser considers unreachable. Always a parser bug.
    #[error("InternalError: {message}\n  --> {location}")]
    Internal { message: String, location: Location },

    #[error("a macro named “{name}” already exists")]
    DuplicateMacro { name: String },
}

impl MarkupError {
    pub fn syntax(message: impl Into<String>, location: Location) -> Self {
        MarkupError::Syntax {
            message: message.into(),
            location,
        }
    }

    pub fn parse(message: impl Into<String>, location: Location) -> Self {
        MarkupError::Parse {
            message: message.into(),
            location,
        }
    }

    pub fn unsuitable(message: impl Into<String>, location: Location) -> Self {
        MarkupError::UnsuitableMacro {
            message: message.into(),
            location,
        }
    }

    pub fn internal(message: impl Into<String>, location: Location) -> Self {
        MarkupError::Internal {
            message: message.into(),
            location,
        }
    }

    pub fn in_macro_call(
        macro_name: impl Into<String>,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        MarkupError::ErrorInMacroCall {
            macro_name: macro_name.into(),
            message: message.into(),
            location,
            source: None,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            MarkupError::Syntax { location, .. }
            | MarkupError::UnknownMacro { location, .. }
            | MarkupError::UnsuitableMacro { location, .. }
            | MarkupError::Parse { location, .. }
            | MarkupError::ErrorInMacroCall { location, .. }
            | MarkupError::Internal { location, .. } => Some(location),
            MarkupError::DuplicateMacro { .. } => None,
        }
    }

    pub fn set_location(&mut self, new_location: Location) {
        match self {
            MarkupError::Syntax { location, .. }
            | MarkupError::UnknownMacro { location, .. }
            | MarkupError::UnsuitableMacro { location, .. }
            | MarkupError::Parse { location, .. }
            | MarkupError::ErrorInMacroCall { location, .. }
            | MarkupError::Internal { location, .. } => *location = new_location,
            MarkupError::DuplicateMacro { .. } => {}
        }
    }

    /// Re-bases a location that is relative to a macro argument onto the
    /// document, given the line of the macro call.
    pub fn shift_lines(mut self, call_site_line: usize) -> Self {
        if let Some(location) = self.location() {
            let shifted = location.shifted(call_site_line.saturating_sub(1));
            self.set_location(shifted);
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid macro declaration “{name}”: {reason}")]
    InvalidDeclaration { name: String, reason: String },

    #[error(transparent)]
    Library(#[from] MarkupError),
}
