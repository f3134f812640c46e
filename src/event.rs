//! The boundary with the YAML parser and emitter.
//!
//! Parser events are converted into owned, cloneable [`Event`]s as soon as
//! they arrive so that anchors can record and replay them. Outgoing events are
//! converted back just before they reach the emitter.

use alloc::string::{String, ToString};
use core::fmt;

use libyaml_safer::{Emitter, Encoding, Parser};
pub(crate) use libyaml_safer::{MappingStyle, ScalarStyle, SequenceStyle};

use crate::{Error, ErrorKind, Result};

/// A position in the YAML input. Both fields count from zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark {
    /// The line.
    pub line: u64,
    /// The column.
    pub column: u64,
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line: {}, column: {}", self.line + 1, self.column + 1)
    }
}

impl From<libyaml_safer::Mark> for Mark {
    fn from(mark: libyaml_safer::Mark) -> Self {
        Mark {
            line: mark.line,
            column: mark.column,
        }
    }
}

/// An owned parser event.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Event {
    pub data: EventData,
    pub mark: Mark,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EventData {
    StreamStart,
    StreamEnd,
    DocumentStart {
        implicit: bool,
    },
    DocumentEnd {
        implicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        value: String,
        style: ScalarStyle,
    },
    SequenceStart {
        anchor: Option<String>,
        style: SequenceStyle,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        style: MappingStyle,
    },
    MappingEnd,
}

impl EventData {
    pub fn name(&self) -> &'static str {
        match self {
            EventData::StreamStart => "STREAM_START",
            EventData::StreamEnd => "STREAM_END",
            EventData::DocumentStart { .. } => "DOC_START",
            EventData::DocumentEnd { .. } => "DOC_END",
            EventData::Alias { .. } => "ALIAS",
            EventData::Scalar { .. } => "SCALAR",
            EventData::SequenceStart { .. } => "SEQUENCE_START",
            EventData::SequenceEnd => "SEQUENCE_END",
            EventData::MappingStart { .. } => "MAPPING_START",
            EventData::MappingEnd => "MAPPING_END",
        }
    }

    /// The anchor this event defines, if any.
    pub fn anchor(&self) -> Option<&str> {
        match self {
            EventData::Scalar { anchor, .. }
            | EventData::SequenceStart { anchor, .. }
            | EventData::MappingStart { anchor, .. } => anchor.as_deref(),
            _ => None,
        }
    }

    /// `+1` for events that open a collection, `-1` for those closing one.
    pub fn depth_change(&self) -> i32 {
        match self {
            EventData::SequenceStart { .. } | EventData::MappingStart { .. } => 1,
            EventData::SequenceEnd | EventData::MappingEnd => -1,
            _ => 0,
        }
    }
}

impl From<libyaml_safer::Event> for Event {
    fn from(event: libyaml_safer::Event) -> Self {
        use libyaml_safer::EventData as Raw;

        let mark = Mark::from(event.start_mark);
        let data = match event.data {
            Raw::StreamStart { .. } => EventData::StreamStart,
            Raw::StreamEnd { .. } => EventData::StreamEnd,
            Raw::DocumentStart { implicit, .. } => EventData::DocumentStart { implicit },
            Raw::DocumentEnd { implicit, .. } => EventData::DocumentEnd { implicit },
            Raw::Alias { anchor, .. } => EventData::Alias { anchor },
            Raw::Scalar {
                anchor,
                value,
                style,
                ..
            } => EventData::Scalar {
                anchor,
                value,
                style,
            },
            Raw::SequenceStart { anchor, style, .. } => EventData::SequenceStart { anchor, style },
            Raw::SequenceEnd { .. } => EventData::SequenceEnd,
            Raw::MappingStart { anchor, style, .. } => EventData::MappingStart { anchor, style },
            Raw::MappingEnd { .. } => EventData::MappingEnd,
            #[allow(unreachable_patterns)]
            _ => EventData::StreamEnd,
        };
        Event { data, mark }
    }
}

/// Pulls events out of the YAML parser.
pub(crate) struct Source<'r> {
    parser: Parser<'r>,
}

impl<'r> Source<'r> {
    pub fn new(input: &'r mut &[u8]) -> Self {
        let mut parser = Parser::new();
        parser.set_input_string(input);
        Source { parser }
    }

    pub fn next_event(&mut self) -> Result<Event> {
        match self.parser.parse() {
            Ok(event) => Ok(Event::from(event)),
            Err(err) => Err(Error::new(ErrorKind::LibyamlParser).with_problem(err.to_string())),
        }
    }
}

/// Pushes events into the YAML emitter.
pub(crate) struct Sink<'w> {
    emitter: Emitter<'w>,
}

impl<'w> Sink<'w> {
    pub fn new(output: &'w mut Vec<u8>) -> Self {
        let mut emitter = Emitter::new();
        emitter.set_output(output);
        Sink { emitter }
    }

    pub fn emit(&mut self, data: EventData) -> Result<()> {
        use libyaml_safer::Event as Raw;

        let event = match data {
            EventData::StreamStart => Raw::stream_start(Encoding::Utf8),
            EventData::StreamEnd => Raw::stream_end(),
            EventData::DocumentStart { implicit } => Raw::document_start(None, &[], implicit),
            EventData::DocumentEnd { implicit } => Raw::document_end(implicit),
            EventData::Alias { anchor } => Raw::alias(&anchor),
            EventData::Scalar {
                anchor,
                value,
                style,
            } => Raw::scalar(anchor.as_deref(), None, &value, true, true, style),
            EventData::SequenceStart { anchor, style } => {
                Raw::sequence_start(anchor.as_deref(), None, true, style)
            }
            EventData::SequenceEnd => Raw::sequence_end(),
            EventData::MappingStart { anchor, style } => {
                Raw::mapping_start(anchor.as_deref(), None, true, style)
            }
            EventData::MappingEnd => Raw::mapping_end(),
        };
        self.emitter
            .emit(event)
            .map_err(|err| Error::new(ErrorKind::LibyamlEmitter).with_problem(err.to_string()))
    }
}
