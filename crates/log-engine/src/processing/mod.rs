//! Processing context
//!
//! [`Processing`] owns the mutable state of one parse: the object graph,
//! per-thread state, the send/recv table and scratch storage. Rule code
//! receives it as `&mut Processing` and reaches objects through
//! [`Processing::obj`].
//!
//! The position of the line being handled is a [`ParseCursor`]. Rendezvous
//! handlers run with the cursor captured when their `recv` was parked; the
//! cursor is swapped in for the call and swapped back afterwards.

mod follow;
mod handle;
mod sync;

pub use follow::{Follow, FollowConsumer, FollowHandler};
pub use handle::ObjMut;
pub use sync::{RecvHandler, Rendezvous};

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use logan_core::metrics as m;
use tracing::trace;

use crate::config::PatternMode;
use crate::error::EngineError;
use crate::graph::{Capture, CaptureRef, CaptureWhat, ObjId, ObjectGraph, PropValue, is_null_pointer};
use crate::line::PreparedLine;
use crate::pattern::Groups;
use crate::schema::{Rule, RuleOutcome, Schema};
use crate::sink::{Warning, WarningKind};
use crate::source::LogSource;

use follow::{ArmedFollow, FollowResult};
use sync::SyncTable;

/// Position and identity of the line being processed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseCursor {
    pub timestamp: DateTime<Utc>,
    /// Index of the source in the session
    pub source: usize,
    pub file: String,
    /// Rotation family of the source
    pub family: String,
    pub line: u64,
    pub offset: Range<u64>,
    pub thread: String,
    pub module: String,
    pub raw: String,
    pub text: String,
    pub continuation: bool,
}

/// Per-(family, thread) state
#[derive(Default)]
pub struct ThreadState {
    pub name: String,
    /// Scratch data for schema rules
    pub extra: HashMap<String, PropValue>,
    follows: HashMap<String, ArmedFollow>,
    any: Option<String>,
}

impl ThreadState {
    /// Whether a follow is armed for `module`.
    pub fn is_following(&self, module: &str) -> bool {
        self.follows.contains_key(module)
    }
}

/// Handle returned by [`Processing::plain_if`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlainRuleId(u64);

/// Mutable state of one parse
pub struct Processing {
    cursor: ParseCursor,
    graph: ObjectGraph,
    threads: HashMap<(String, String), ThreadState>,
    sync: SyncTable,
    ipc: bool,
    global: HashMap<String, PropValue>,
    plain: Vec<(PlainRuleId, Arc<Rule>)>,
    next_plain: u64,
    recv_wait: HashMap<usize, usize>,
    warnings: Vec<Warning>,
    pattern_mode: PatternMode,
}

impl Default for Processing {
    fn default() -> Self {
        Self::new(PatternMode::Lenient)
    }
}

impl Processing {
    pub fn new(pattern_mode: PatternMode) -> Self {
        Self {
            cursor: ParseCursor::default(),
            graph: ObjectGraph::new(),
            threads: HashMap::new(),
            sync: SyncTable::default(),
            ipc: false,
            global: HashMap::new(),
            plain: Vec::new(),
            next_plain: 0,
            recv_wait: HashMap::new(),
            warnings: Vec::new(),
            pattern_mode,
        }
    }

    // --- accessors ---

    pub fn cursor(&self) -> &ParseCursor {
        &self.cursor
    }

    /// Replaces the cursor. Used by drivers and tests that feed lines
    /// without a session.
    pub fn set_cursor(&mut self, cursor: ParseCursor) {
        self.cursor = cursor;
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.cursor.timestamp
    }

    pub fn thread(&self) -> &str {
        &self.cursor.thread
    }

    pub fn module(&self) -> &str {
        &self.cursor.module
    }

    /// Message text of the current line.
    pub fn text(&self) -> &str {
        &self.cursor.text
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ObjectGraph {
        self.graph
    }

    pub fn is_ipc_active(&self) -> bool {
        self.ipc
    }

    pub fn set_ipc(&mut self, active: bool) {
        self.ipc = active;
    }

    pub fn pattern_mode(&self) -> PatternMode {
        self.pattern_mode
    }

    /// Schema-scoped scratch storage.
    pub fn global(&self, name: &str) -> Option<&PropValue> {
        self.global.get(name)
    }

    pub fn global_mut(&mut self) -> &mut HashMap<String, PropValue> {
        &mut self.global
    }

    /// State of the current thread, created on first use.
    pub fn thread_state(&mut self) -> &mut ThreadState {
        let key = (self.cursor.family.clone(), self.cursor.thread.clone());
        let name = self.cursor.thread.clone();
        self.threads.entry(key).or_insert_with(|| ThreadState {
            name,
            ..ThreadState::default()
        })
    }

    /// Whether `source` has a parked recv.
    pub fn is_waiting(&self, source: usize) -> bool {
        self.recv_wait.get(&source).is_some_and(|n| *n > 0)
    }

    // --- objects ---

    /// Resolves `token`, creating and registering a new object when it is
    /// not live. Null pointers yield a detached handle that ignores every
    /// operation.
    pub fn obj(&mut self, token: &str) -> ObjMut<'_> {
        if is_null_pointer(token) {
            return ObjMut::new(self, None);
        }
        let id = self.resolve_or_insert(token);
        ObjMut::new(self, Some(id))
    }

    /// Resolves `token` without creating anything.
    pub fn obj_if(&mut self, token: &str) -> Option<ObjMut<'_>> {
        if is_null_pointer(token) {
            return None;
        }
        let id = self.graph.resolve(token)?;
        self.graph.touch(token, id);
        Some(ObjMut::new(self, Some(id)))
    }

    /// Handle for a known object id.
    pub fn obj_by_id(&mut self, id: ObjId) -> ObjMut<'_> {
        let id = self.graph.get(id).map(|o| o.id());
        ObjMut::new(self, id)
    }

    pub(crate) fn resolve_or_insert(&mut self, token: &str) -> ObjId {
        if let Some(id) = self.graph.resolve(token) {
            self.graph.touch(token, id);
            return id;
        }
        let id = self.graph.insert(token, self.cursor.timestamp);
        self.graph.register(token, id);
        id
    }

    /// Appends a capture stamped with the current cursor.
    pub(crate) fn push_capture(&mut self, id: ObjId, what: CaptureWhat) -> Option<CaptureRef> {
        self.graph.get(id)?;
        let capture = Capture {
            id: self.graph.next_capture_id(),
            time: self.cursor.timestamp,
            line: self.cursor.line,
            offset: self.cursor.offset.start,
            source: self.cursor.source,
            thread: self.cursor.thread.clone(),
            what,
        };
        self.graph.push_capture(id, capture)
    }

    pub(crate) fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    // --- warnings ---

    /// Queues a soft warning for the sink.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        self.warnings.push(Warning::new(kind, message));
    }

    /// Warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    // --- dynamic plain rules ---

    /// Adds a catch-all rule for the rest of the parse.
    pub fn plain_if<C, F>(&mut self, cond: C, f: F) -> Result<PlainRuleId, EngineError>
    where
        C: Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync + 'static,
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        let rule = Rule::new(None, Some(Arc::new(cond)), Arc::new(f))?;
        let id = PlainRuleId(self.next_plain);
        self.next_plain += 1;
        self.plain.push((id, Arc::new(rule)));
        Ok(id)
    }

    /// Removes a rule added by [`Processing::plain_if`].
    pub fn remove_plain(&mut self, id: PlainRuleId) -> bool {
        let before = self.plain.len();
        self.plain.retain(|(rule_id, _)| *rule_id != id);
        self.plain.len() != before
    }

    // --- cursor switching ---

    /// Runs `f` with `cursor` installed, then restores the current one.
    pub(crate) fn run_as<T>(
        &mut self,
        cursor: ParseCursor,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let saved = std::mem::replace(&mut self.cursor, cursor);
        let result = f(self);
        self.cursor = saved;
        result
    }

    // --- line dispatch ---

    /// Handles one prepared line: armed follows first, then the line's
    /// module rules, the schema-level rules and finally plain rules. The
    /// first rule that matches consumes the line.
    pub fn process_line(
        &mut self,
        schema: &Schema,
        source: &LogSource,
        line: &PreparedLine,
    ) -> Result<(), EngineError> {
        self.cursor = ParseCursor {
            timestamp: line.timestamp,
            source: source.id(),
            file: source.name().to_owned(),
            family: source.family().to_owned(),
            line: line.number,
            offset: line.offset.clone(),
            thread: line.thread.clone(),
            module: line.module.clone(),
            raw: line.raw.clone(),
            text: line.text.clone(),
            continuation: line.continuation,
        };
        metrics::counter!(m::ENGINE_LINES_PROCESSED_TOTAL).increment(1);

        if self.run_follow()? {
            return Ok(());
        }

        let text = line.text.as_str();
        for rule in schema.rules_for(&line.module, text) {
            if rule.apply(self, text)? == RuleOutcome::Matched {
                return Ok(());
            }
        }
        for rule in schema.default_rules_for(text) {
            if rule.apply(self, text)? == RuleOutcome::Matched {
                return Ok(());
            }
        }
        for rule in schema.plain_rules() {
            if rule.apply(self, text)? == RuleOutcome::Matched {
                return Ok(());
            }
        }
        let dynamic: Vec<Arc<Rule>> = self.plain.iter().map(|(_, r)| Arc::clone(r)).collect();
        for rule in dynamic {
            if rule.apply(self, text)? == RuleOutcome::Matched {
                return Ok(());
            }
        }

        trace!(line = line.number, module = %line.module, "no rule matched");
        Ok(())
    }

    /// Gives the line to an armed follow. The module slot wins; the
    /// most recently engaged follow of the thread only sees continuation
    /// lines. Returns whether the line was consumed.
    fn run_follow(&mut self) -> Result<bool, EngineError> {
        let key = (self.cursor.family.clone(), self.cursor.thread.clone());
        let Some(state) = self.threads.get_mut(&key) else {
            return Ok(false);
        };

        let module = if state.follows.contains_key(&self.cursor.module) {
            self.cursor.module.clone()
        } else if self.cursor.continuation {
            match &state.any {
                Some(m) if state.follows.contains_key(m) => m.clone(),
                _ => return Ok(false),
            }
        } else {
            return Ok(false);
        };

        let Some(mut armed) = state.follows.remove(&module) else {
            return Ok(false);
        };
        state.any = Some(module.clone());

        match armed.step(self)? {
            FollowResult::Continue => {
                // a follow installed by the callback takes precedence
                self.threads
                    .entry(key)
                    .or_default()
                    .follows
                    .entry(module)
                    .or_insert(armed);
                Ok(true)
            }
            FollowResult::Done => Ok(true),
            FollowResult::Decline => Ok(false),
        }
    }

    pub(crate) fn arm_follow(&mut self, armed: ArmedFollow) {
        let module = self.cursor.module.clone();
        let state = self.thread_state();
        state.any = Some(module.clone());
        state.follows.insert(module, armed);
    }

    // --- end of parse ---

    /// Reports every recv that never met its send. Clears all waits.
    pub fn finish(&mut self) -> Vec<Warning> {
        self.recv_wait.clear();
        let unmatched = self.sync.drain_unmatched();
        for key in &unmatched {
            metrics::counter!(m::ENGINE_SYNC_UNMATCHED_TOTAL).increment(1);
            self.warn(
                WarningKind::UnmatchedSync,
                format!("recv '{key}' never matched a send"),
            );
        }
        self.take_warnings()
    }
}
