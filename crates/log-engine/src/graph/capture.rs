//! Capture records
//!
//! A capture is one immutable history entry on an object. Captures are only
//! ever appended; destroying an object leaves them in place.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ObjId, PropValue};

/// Back-reference to a capture: owning object, global sequence id and
/// position in the owner's capture list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureRef {
    pub obj: ObjId,
    pub capture: u64,
    pub index: usize,
}

/// Payload of a capture
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureWhat {
    /// The raw text of the line being processed
    Line { text: String },
    /// Free text supplied by a rule
    Text { text: String },
    /// Property change; `None` means the property was removed
    Prop {
        name: String,
        value: Option<PropValue>,
    },
    /// One side of a bidirectional link
    Link { other: ObjId, outbound: bool },
    /// One-way reference to another object
    Mention { other: ObjId },
    /// An entry was queued on `target` under `name`
    Dispatch { target: ObjId, name: String },
    /// A queued entry was taken off this object's `name` queue
    Run {
        name: String,
        origin: CaptureRef,
    },
    Send { message: String },
    /// A rendezvous completed; `origin` is the matching send capture
    Recv {
        message: String,
        origin: CaptureRef,
    },
    /// The object was destroyed by this line
    Released { text: String },
}

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capture {
    /// Global, monotonic sequence id
    pub id: u64,
    pub time: DateTime<Utc>,
    /// Line number in the source that produced it
    pub line: u64,
    /// Byte offset of that line
    pub offset: u64,
    /// Source index
    pub source: usize,
    pub thread: String,
    pub what: CaptureWhat,
}

impl Capture {
    /// Text carried by line-like captures.
    pub fn text(&self) -> Option<&str> {
        match &self.what {
            CaptureWhat::Line { text }
            | CaptureWhat::Text { text }
            | CaptureWhat::Released { text } => Some(text),
            _ => None,
        }
    }

    /// `(name, value)` for property captures.
    pub fn prop(&self) -> Option<(&str, Option<&PropValue>)> {
        match &self.what {
            CaptureWhat::Prop { name, value } => Some((name, value.as_ref())),
            _ => None,
        }
    }
}
