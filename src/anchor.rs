//! Anchor recording and alias replay.
//!
//! While any anchor is open every parser event is appended to one shared
//! list; each anchor remembers the slice of that list it spans. An alias is
//! expanded by replaying its anchor's slice as if it were fresh input.
//! Aliases inside a recording resolve against the anchors that were defined
//! when they were first read, so later redefinitions do not leak into a
//! replay.

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;

use crate::event::{Event, EventData, Source};
use crate::{ErrorKind, Result};

struct Anchor {
    name: String,
    start: usize,
    /// `None` while the anchored node is still being parsed.
    end: Option<usize>,
}

#[derive(Default)]
pub(crate) struct AnchorTable {
    events: Vec<Event>,
    /// Number of anchors defined when each recorded event was read.
    scopes: Vec<usize>,
    anchors: Vec<Anchor>,
    /// Open anchors with the nesting depth at which they started.
    open: Vec<(usize, i32)>,
    depth: i32,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin capturing an anchor; the next recorded event is its first.
    pub fn record_start(&mut self, name: &str) {
        self.open.push((self.anchors.len(), self.depth));
        self.anchors.push(Anchor {
            name: String::from(name),
            start: self.events.len(),
            end: None,
        });
    }

    /// Feed one live parser event.
    pub fn record_event(&mut self, event: &Event) {
        if let Some(name) = event.data.anchor() {
            self.record_start(name);
        }
        self.depth += event.data.depth_change();
        if self.open.is_empty() {
            return;
        }
        self.events.push(event.clone());
        self.scopes.push(self.anchors.len());
        while let Some(&(index, depth)) = self.open.last() {
            if depth != self.depth {
                break;
            }
            self.anchors[index].end = Some(self.events.len());
            self.open.pop();
        }
    }

    #[cfg(test)]
    fn lookup(&self, name: &str) -> Result<Range<usize>> {
        self.lookup_in(name, self.anchors.len())
    }

    /// The recorded events for the most recent anchor called `name` among
    /// the first `scope` anchors.
    pub fn lookup_in(&self, name: &str, scope: usize) -> Result<Range<usize>> {
        let anchor = self.anchors[..scope.min(self.anchors.len())]
            .iter()
            .rev()
            .find(|anchor| anchor.name == name)
            .ok_or(ErrorKind::InvalidAlias)?;
        match anchor.end {
            Some(end) => Ok(anchor.start..end),
            None => Err(ErrorKind::InvalidAlias.into()),
        }
    }

    pub fn event(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// How many anchors were visible to the recorded event at `index`.
    pub fn scope(&self, index: usize) -> usize {
        self.scopes
            .get(index)
            .copied()
            .unwrap_or(self.anchors.len())
    }

    pub fn defined(&self) -> usize {
        self.anchors.len()
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.scopes.clear();
        self.anchors.clear();
        self.open.clear();
        self.depth = 0;
    }

    #[cfg(test)]
    fn recorded(&self) -> usize {
        self.events.len()
    }
}

/// An event stream with aliases expanded.
pub(crate) struct Reader<'r> {
    source: Source<'r>,
    anchors: AnchorTable,
    replay: Vec<Range<usize>>,
    no_alias: bool,
}

impl<'r> Reader<'r> {
    pub fn new(source: Source<'r>, no_alias: bool) -> Self {
        Reader {
            source,
            anchors: AnchorTable::new(),
            replay: Vec::new(),
            no_alias,
        }
    }

    pub fn next_event(&mut self) -> Result<Event> {
        loop {
            let (event, scope) = match self.replay.last_mut() {
                Some(cursor) if cursor.start < cursor.end => {
                    let event = self
                        .anchors
                        .event(cursor.start)
                        .cloned()
                        .ok_or(ErrorKind::InternalError)?;
                    let scope = self.anchors.scope(cursor.start);
                    cursor.start += 1;
                    (event, scope)
                }
                Some(_) => {
                    self.replay.pop();
                    continue;
                }
                None => {
                    let event = self.source.next_event()?;
                    if !self.no_alias {
                        self.anchors.record_event(&event);
                    }
                    (event, self.anchors.defined())
                }
            };

            let anchor = match event.data {
                EventData::Alias { anchor } => anchor,
                data => {
                    return Ok(Event {
                        data,
                        mark: event.mark,
                    })
                }
            };
            if self.no_alias {
                return Err(ErrorKind::Alias.into());
            }
            let range = self.anchors.lookup_in(&anchor, scope)?;
            if self
                .replay
                .iter()
                .any(|active| active.end == range.end && active.start > range.start)
            {
                return Err(ErrorKind::InvalidAlias.into());
            }
            self.replay.push(range);
        }
    }

    /// Forget all anchors; called at the end of each document.
    pub fn reset_anchors(&mut self) {
        self.anchors.reset();
        self.replay.clear();
    }
}
