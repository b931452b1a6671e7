//! logan engine: streaming multi-file log parsing and object tracking
//!
//! # Modules
//!
//! - [`source`]: inputs, rotation and parent/child topology, byte sources
//! - [`reader`]: chunked line splitting over a byte source
//! - [`line`]: raw and prepared lines, header parsing seam
//! - [`pattern`]: printf-like rule patterns compiled to regexes
//! - [`schema`]: modules, rules and built-in schemas
//! - [`processing`]: per-line dispatch, object handles, follow and IPC sync
//! - [`graph`]: objects, captures and property values
//! - [`session`]: timestamp-ordered merge of all sources
//! - [`search`]: post-parse queries, optionally at a point in time
//! - [`sink`]: progress and warning reporting
//! - [`config`]: engine settings layered over the core config
//! - [`error`]: domain errors
//!
//! # Flow
//!
//! ```text
//! ByteSource -> ChunkedReader -> LinePreparer -> ParseSession (merge) -> Processing -> ObjectGraph
//!                                                     |                        |
//!                                                ProgressSink            Schema rules
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod line;
pub mod pattern;
pub mod processing;
pub mod reader;
pub mod schema;
pub mod search;
pub mod session;
pub mod sink;
pub mod source;

// settings
pub use config::{EngineSettings, EngineSettingsBuilder, IpcMode, PatternMode};

// errors
pub use error::EngineError;

// objects
pub use graph::{Capture, CaptureWhat, Obj, ObjId, ObjectGraph, PropValue};

// lines and patterns
pub use line::{LinePreparer, PreparedLine, RawLine};
pub use pattern::{CompiledPattern, Groups};

// dispatch
pub use processing::{Follow, ObjMut, Processing, Rendezvous};
pub use schema::{Schema, SchemaBuilder};

// sessions
pub use search::{SearchOp, SearchQuery};
pub use session::{ParseSession, ParseSessionBuilder, ParseSummary, SourcePosition};
pub use sink::{ProgressSink, TracingSink, Warning, WarningKind};
pub use source::{ByteSource, FileSource, LogSource, MemorySource, Topology};
