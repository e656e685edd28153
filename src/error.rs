use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::lexer::Symbol;
use crate::value::ValueKind;

/// A 0-based position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 0-based line number
    pub line: usize,
    /// 0-based column (character offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

impl Position {
    /// Advance past `text`, tracking line breaks.
    pub(crate) fn advanced_by(self, text: &str) -> Position {
        let mut next = self;
        next.offset += text.len();
        match text.rfind('\n') {
            Some(last_newline) => {
                next.line += text.matches('\n').count();
                next.column = text[last_newline + 1..].chars().count();
            }
            None => next.column += text.chars().count(),
        }
        next
    }
}

/// Where a token came from: the source name and a position inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File path, or `<input>` for in-memory sources.
    pub source: Arc<str>,
    pub position: Position,
}

impl Location {
    pub fn new(source: Arc<str>, position: Position) -> Self {
        Location { source, position }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.source,
            self.position.line + 1,
            self.position.column + 1
        )
    }
}

/// Everything that can stop a load or a lookup.
///
/// Every variant is terminal for the operation that raised it. Redefinition
/// warnings are not errors; see [`crate::diagnostics::Warning`].
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unexpected {found} token at {location} instead of {expected}")]
    Syntax {
        expected: &'static str,
        found: Symbol,
        location: Location,
    },

    #[error("unrecognized input '{text}' at {location}")]
    UnrecognizedInput { text: String, location: Location },

    #[error("failed to convert '{text}' at {location} to a {target} value")]
    Conversion {
        text: String,
        target: ValueKind,
        location: Location,
    },

    #[error(
        "the key '{key}' is not found in the parameter collection{}",
        did_you_mean(.suggestion)
    )]
    KeyNotFound {
        key: String,
        suggestion: Option<String>,
    },

    #[error("failed to get a {expected} value from the key '{key}' which has type {actual}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error(
        "the key '{key}' holds the enum token '#{token}' which is not one of: {}",
        .accepted.join(" ")
    )]
    InvalidEnumToken {
        key: String,
        token: String,
        accepted: Vec<String>,
    },

    #[error("cannot append a value to the undefined key '{key}'")]
    UndefinedKey { key: String },

    #[error("cannot append a value to the key '{key}' because its axis is shared with a group")]
    SharedAxis { key: String },

    #[error("the key '{key}' is bound to axis {axis} which does not exist")]
    UnknownAxis { key: String, axis: usize },

    #[error("the key '{key}' has {found} values but axis {axis} has size {expected}")]
    AxisMismatch {
        key: String,
        axis: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "the key '{key}' at {location} has {found} values but its group has {expected}"
    )]
    GroupSizeMismatch {
        key: String,
        expected: usize,
        found: usize,
        location: Location,
    },

    #[error("cannot override the undefined key '{key}' at {location}")]
    DanglingOverride { key: String, location: Location },

    #[error("defining the key '{key}' makes the number of combinations overflow")]
    TooManyCombinations { key: String },

    #[error("cyclic reference: {}", .chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    #[error("collection index {index} is out of range for a collection of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("file '{}' is not accessible: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file '{}' imports itself", .path.display())]
    ImportCycle { path: PathBuf },

    #[error("failed to write key values: {0}")]
    Output(#[from] std::io::Error),
}

impl ParameterError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ParameterError::Syntax { .. } => "syntax-error",
            ParameterError::UnrecognizedInput { .. } => "unrecognized-input",
            ParameterError::Conversion { .. } => "conversion-error",
            ParameterError::KeyNotFound { .. } => "key-not-found",
            ParameterError::TypeMismatch { .. } => "type-mismatch",
            ParameterError::InvalidEnumToken { .. } => "invalid-enum-token",
            ParameterError::UndefinedKey { .. } => "undefined-key",
            ParameterError::SharedAxis { .. } => "shared-axis",
            ParameterError::UnknownAxis { .. } => "unknown-axis",
            ParameterError::AxisMismatch { .. } => "axis-mismatch",
            ParameterError::GroupSizeMismatch { .. } => "group-size-mismatch",
            ParameterError::DanglingOverride { .. } => "dangling-override",
            ParameterError::TooManyCombinations { .. } => "too-many-combinations",
            ParameterError::CyclicReference { .. } => "cyclic-reference",
            ParameterError::IndexOutOfRange { .. } => "index-out-of-range",
            ParameterError::FileAccess { .. } => "file-access",
            ParameterError::ImportCycle { .. } => "import-cycle",
            ParameterError::Output(_) => "output-error",
        }
    }

    /// The source location the error points at, if it has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            ParameterError::Syntax { location, .. }
            | ParameterError::UnrecognizedInput { location, .. }
            | ParameterError::Conversion { location, .. }
            | ParameterError::GroupSizeMismatch { location, .. }
            | ParameterError::DanglingOverride { location, .. } => Some(location),
            _ => None,
        }
    }
}

pub type Result<T, E = ParameterError> = std::result::Result<T, E>;

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(key) => format!(" (did you mean '{}'?)", key),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> Location {
        Location::new(
            Arc::from("run.cfg"),
            Position {
                line,
                column,
                offset: 0,
            },
        )
    }

    #[test]
    fn location_renders_one_based() {
        assert_eq!(at(0, 0).to_string(), "run.cfg:1:1");
        assert_eq!(at(4, 7).to_string(), "run.cfg:5:8");
    }

    #[test]
    fn position_tracks_newlines() {
        let start = Position::default();
        let next = start.advanced_by("ab\ncde");
        assert_eq!(next.line, 1);
        assert_eq!(next.column, 3);
        assert_eq!(next.offset, 6);

        let same_line = next.advanced_by("fg");
        assert_eq!(same_line.line, 1);
        assert_eq!(same_line.column, 5);
    }

    #[test]
    fn key_not_found_mentions_suggestion() {
        let err = ParameterError::KeyNotFound {
            key: "ky".to_string(),
            suggestion: Some("key".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "the key 'ky' is not found in the parameter collection (did you mean 'key'?)"
        );

        let err = ParameterError::KeyNotFound {
            key: "ky".to_string(),
            suggestion: None,
        };
        assert_eq!(
            err.to_string(),
            "the key 'ky' is not found in the parameter collection"
        );
    }

    #[test]
    fn invalid_enum_token_lists_accepted_tokens() {
        let err = ParameterError::InvalidEnumToken {
            key: "t".to_string(),
            token: "unknown".to_string(),
            accepted: vec!["neumann".to_string(), "dirichlet".to_string()],
        };
        assert!(err.to_string().ends_with("neumann dirichlet"));
    }

    #[test]
    fn syntax_error_names_symbols() {
        let err = ParameterError::Syntax {
            expected: "<equal>",
            found: Symbol::Comma,
            location: at(1, 2),
        };
        assert_eq!(
            err.to_string(),
            "unexpected <comma> token at run.cfg:2:3 instead of <equal>"
        );
    }
}
