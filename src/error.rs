use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::Mark;

/// The result type used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// What went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The allocator refused a request.
    #[error("Memory allocation failed")]
    Oom,
    /// An alias was found while aliases are disabled.
    #[error("Alias not allowed by configuration")]
    Alias,
    /// A file could not be opened, read or written.
    #[error("Could not open file")]
    FileOpen,
    /// A mapping key is not described by the schema.
    #[error("Invalid key")]
    InvalidKey,
    /// A value could not be bound, or a validator rejected it.
    #[error("Invalid value")]
    InvalidValue,
    /// An alias names no complete anchor.
    #[error("No anchor found for alias")]
    InvalidAlias,
    /// The engine reached a state it should not be able to reach.
    #[error("Internal error")]
    InternalError,
    /// Binary data is not valid base64.
    #[error("Invalid Base64 string")]
    InvalidBase64,
    /// Decoded binary data exceeds the schema maximum.
    #[error("Data too long")]
    Base64MaxLen,
    /// A type that may only appear as a mapping field appears elsewhere.
    #[error("Value requires parent mapping")]
    MappingRequired,
    /// The parser produced an event the current schema position cannot take.
    #[error("Unexpected event")]
    UnexpectedEvent,
    /// A string is shorter than the schema minimum.
    #[error("String length too short")]
    StringLengthMin,
    /// A string is longer than the schema maximum.
    #[error("String length too long")]
    StringLengthMax,
    /// A schema width is not one the data accessor supports.
    #[error("Data size must be 1, 2, 4, or 8 bytes")]
    InvalidDataSize,
    /// The root value of a schema must be a pointer.
    #[error("Top-level schema value must be pointer")]
    TopLevelNonPtr,
    /// The schema uses a value type where it is not allowed.
    #[error("Bad type in schema")]
    BadTypeInSchema,
    /// A schema range is inconsistent.
    #[error("Bad schema: min exceeds max")]
    BadMinMaxSchema,
    /// The sequence count argument does not match the root schema.
    #[error("Bad parameter: seq_count")]
    BadParamSeqCount,
    /// A required data argument is missing.
    #[error("Bad parameter: NULL data")]
    BadParamNullData,
    /// A bitfield region does not fit the value width.
    #[error("Bit value beyond bitfield size")]
    BadBitvalInSchema,
    /// A sequence has fewer entries than the schema minimum.
    #[error("Sequence with too few entries")]
    SequenceEntriesMin,
    /// A sequence has more entries than the schema maximum.
    #[error("Sequence with too many entries")]
    SequenceEntriesMax,
    /// A fixed sequence schema has an inconsistent entry count.
    #[error("Sequence fixed has unequal min max")]
    SequenceFixedCount,
    /// A dynamic sequence is nested directly inside another sequence.
    #[error("Non-fixed sequence in sequence")]
    SequenceInSequence,
    /// A required mapping field is absent.
    #[error("Missing required mapping field")]
    MappingFieldMissing,
    /// A copy target was supplied for a root the engine allocates itself.
    #[error("Data target must be NULL")]
    DataTargetNonNull,
    /// The YAML parser failed.
    #[error("Parser error")]
    LibyamlParser,
    /// The YAML emitter failed.
    #[error("Emitter error")]
    LibyamlEmitter,
}

/// One step of the path from the root to the value an error occurred in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathEntry {
    /// Inside the value of a mapping field.
    Field {
        /// The field's key.
        name: String,
        /// Where the key was found, if the value came from a document.
        mark: Option<Mark>,
    },
    /// Inside a sequence entry.
    Entry {
        /// Zero-based entry index.
        index: u64,
        /// Where the entry starts, if the value came from a document.
        mark: Option<Mark>,
    },
}

impl fmt::Display for PathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self {
            PathEntry::Field { name, mark } => {
                write!(f, "in mapping field '{name}'")?;
                mark
            }
            PathEntry::Entry { index, mark } => {
                write!(f, "in sequence entry '{index}'")?;
                mark
            }
        };
        if let Some(mark) = mark {
            write!(f, " ({mark})")?;
        }
        Ok(())
    }
}

/// The error type returned by every fallible operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    problem: Option<String>,
    backtrace: Vec<PathEntry>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            problem: None,
            backtrace: Vec::new(),
        }
    }

    pub(crate) fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub(crate) fn with_backtrace(mut self, backtrace: Vec<PathEntry>) -> Self {
        if self.backtrace.is_empty() {
            self.backtrace = backtrace;
        }
        self
    }

    /// Record that the error happened inside `entry`, which encloses every
    /// entry already recorded.
    pub(crate) fn within(mut self, entry: PathEntry) -> Self {
        self.backtrace.push(entry);
        self
    }

    /// The category of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Extra detail: the parser's complaint, the missing field, the I/O error.
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    /// Enclosing fields and sequence entries, innermost first.
    pub fn backtrace(&self) -> &[PathEntry] {
        &self.backtrace
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(problem) = &self.problem {
            write!(f, ": {problem}")?;
        }
        for entry in &self.backtrace {
            write!(f, "\n  {entry}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_backtrace() {
        let err = Error::new(ErrorKind::InvalidValue)
            .with_problem("bad")
            .with_backtrace(vec![
                PathEntry::Entry {
                    index: 2,
                    mark: Some(Mark { line: 3, column: 4 }),
                },
                PathEntry::Field {
                    name: String::from("list"),
                    mark: None,
                },
            ]);
        assert_eq!(
            err.to_string(),
            "Invalid value: bad\n  in sequence entry '2' (line: 4, column: 5)\n  in mapping field 'list'"
        );
    }

    #[test]
    fn first_backtrace_wins() {
        let inner = vec![PathEntry::Entry {
            index: 0,
            mark: None,
        }];
        let err = Error::new(ErrorKind::Oom)
            .with_backtrace(inner.clone())
            .with_backtrace(Vec::new());
        assert_eq!(err.backtrace(), inner.as_slice());
    }
}
