//! Object graph
//!
//! Tracked entities ([`Obj`]) live in an append-only arena indexed by
//! [`ObjId`]. The live alias table maps pointer-like tokens to the object
//! currently using them; destroying an object drops its aliases from that
//! table while the object and its captures stay in the arena, so a later
//! object can reuse the same pointer without touching the old history.

mod capture;
mod value;

pub use capture::{Capture, CaptureRef, CaptureWhat};
pub use value::PropValue;

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Sequential object id, stable for the life of a parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjId(usize);

impl ObjId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an object sorts in result lists: creation time, then sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Placement {
    pub time: DateTime<Utc>,
    pub seq: u64,
}

/// A tracked entity
#[derive(Debug, Clone, Serialize)]
pub struct Obj {
    id: ObjId,
    pointer: String,
    class_name: Option<String>,
    props: BTreeMap<String, PropValue>,
    captures: Vec<Capture>,
    aliases: BTreeSet<String>,
    #[serde(skip)]
    last_alias: Option<String>,
    #[serde(skip)]
    dispatches: HashMap<String, VecDeque<CaptureRef>>,
    placement: Placement,
    ipcid: Option<String>,
    destroyed: bool,
}

impl Obj {
    pub fn id(&self) -> ObjId {
        self.id
    }

    /// Token the object was first resolved by
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn props(&self) -> &BTreeMap<String, PropValue> {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.props.get(name)
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Aliases that currently resolve to this object
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn ipcid(&self) -> Option<&str> {
        self.ipcid.as_deref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Pending entries of the `name` dispatch queue.
    pub fn queued(&self, name: &str) -> usize {
        self.dispatches.get(name).map_or(0, VecDeque::len)
    }

    /// Property names this object ever had, including removed ones.
    pub fn prop_names(&self) -> impl Iterator<Item = &str> {
        self.captures.iter().filter_map(|c| c.prop().map(|(name, _)| name))
    }
}

/// Object arena plus live alias table
#[derive(Debug, Default)]
pub struct ObjectGraph {
    objs: Vec<Obj>,
    live: HashMap<String, ObjId>,
    next_seq: u64,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ObjId) -> Option<&Obj> {
        self.objs.get(id.0)
    }

    pub fn objs(&self) -> &[Obj] {
        &self.objs
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    /// Live lookup by alias. Never creates.
    pub fn resolve(&self, token: &str) -> Option<ObjId> {
        self.live.get(token).copied()
    }

    /// Number of aliases currently registered.
    pub fn live_aliases(&self) -> usize {
        self.live.len()
    }

    /// Sequence id the next capture will get.
    pub fn peek_seq(&self) -> u64 {
        self.next_seq
    }

    /// `{className: {propName}}` over every classed object.
    ///
    /// `pointer` and `className` are always searchable.
    pub fn search_props(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut out: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for obj in &self.objs {
            let Some(class) = obj.class_name() else {
                continue;
            };
            let names = out.entry(class.to_owned()).or_default();
            if names.is_empty() {
                names.insert("className".to_owned());
                names.insert("pointer".to_owned());
            }
            names.extend(obj.prop_names().map(str::to_owned));
        }
        out
    }

    /// Value of `name` on `id` as it was after the capture with sequence
    /// id `seek`, replayed from property captures.
    pub fn prop_at(&self, id: ObjId, name: &str, seek: u64) -> Option<PropValue> {
        let obj = self.get(id)?;
        let mut value = None;
        for capture in obj.captures.iter().take_while(|c| c.id <= seek) {
            if let Some((prop, v)) = capture.prop() {
                if prop == name {
                    value = v.cloned();
                }
            }
        }
        value
    }

    pub(crate) fn insert(&mut self, pointer: &str, time: DateTime<Utc>) -> ObjId {
        let id = ObjId::new(self.objs.len());
        self.objs.push(Obj {
            id,
            pointer: pointer.to_owned(),
            class_name: None,
            props: BTreeMap::new(),
            captures: Vec::new(),
            aliases: BTreeSet::new(),
            last_alias: None,
            dispatches: HashMap::new(),
            placement: Placement {
                time,
                seq: self.next_seq,
            },
            ipcid: None,
            destroyed: false,
        });
        id
    }

    /// Points `token` at `id`. A token held by another live object moves.
    pub(crate) fn register(&mut self, token: &str, id: ObjId) {
        if let Some(previous) = self.live.insert(token.to_owned(), id) {
            if previous != id {
                if let Some(old) = self.objs.get_mut(previous.0) {
                    old.aliases.remove(token);
                }
            }
        }
        if let Some(obj) = self.objs.get_mut(id.0) {
            obj.aliases.insert(token.to_owned());
            obj.last_alias = Some(token.to_owned());
        }
    }

    pub(crate) fn touch(&mut self, token: &str, id: ObjId) {
        if let Some(obj) = self.objs.get_mut(id.0) {
            obj.last_alias = Some(token.to_owned());
        }
    }

    pub(crate) fn last_alias(&self, id: ObjId) -> Option<String> {
        self.get(id).and_then(|o| o.last_alias.clone())
    }

    /// Drops every live alias of `id` and marks it destroyed.
    pub(crate) fn unregister_all(&mut self, id: ObjId) {
        let Some(obj) = self.objs.get_mut(id.0) else {
            return;
        };
        obj.destroyed = true;
        for alias in std::mem::take(&mut obj.aliases) {
            if self.live.get(&alias) == Some(&id) {
                self.live.remove(&alias);
            }
        }
    }

    pub(crate) fn next_capture_id(&mut self) -> u64 {
        let id = self.next_seq;
        self.next_seq += 1;
        id
    }

    pub(crate) fn push_capture(&mut self, id: ObjId, capture: Capture) -> Option<CaptureRef> {
        let obj = self.objs.get_mut(id.0)?;
        let reference = CaptureRef {
            obj: id,
            capture: capture.id,
            index: obj.captures.len(),
        };
        obj.captures.push(capture);
        Some(reference)
    }

    pub(crate) fn set_class(&mut self, id: ObjId, class_name: &str) {
        if let Some(obj) = self.objs.get_mut(id.0) {
            obj.class_name = Some(class_name.to_owned());
        }
    }

    pub(crate) fn set_prop(&mut self, id: ObjId, name: &str, value: Option<PropValue>) {
        if let Some(obj) = self.objs.get_mut(id.0) {
            match value {
                Some(v) => {
                    obj.props.insert(name.to_owned(), v);
                }
                None => {
                    obj.props.remove(name);
                }
            }
        }
    }

    pub(crate) fn set_ipcid(&mut self, id: ObjId, ipcid: String) {
        if let Some(obj) = self.objs.get_mut(id.0) {
            obj.ipcid = Some(ipcid);
        }
    }

    pub(crate) fn enqueue(&mut self, target: ObjId, name: &str, entry: CaptureRef) {
        if let Some(obj) = self.objs.get_mut(target.0) {
            obj.dispatches
                .entry(name.to_owned())
                .or_default()
                .push_back(entry);
        }
    }

    pub(crate) fn dequeue(&mut self, id: ObjId, name: &str) -> Option<CaptureRef> {
        self.objs
            .get_mut(id.0)?
            .dispatches
            .get_mut(name)?
            .pop_front()
    }
}

/// `(null)`, `(nil)`, `null`, `nullptr`, empty, or a hex value of zero.
pub fn is_null_pointer(token: &str) -> bool {
    let t = token.trim();
    if t.is_empty() || matches!(t, "(null)" | "(nil)" | "null" | "nullptr") {
        return true;
    }
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    !digits.is_empty() && digits.bytes().all(|b| b == b'0')
}

/// Canonical form of a pointer token: no `0x`, no leading zeros, lowercase.
pub fn normalize_pointer(token: &str) -> String {
    let t = token.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        return "0".to_owned();
    }
    trimmed.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(graph: &mut ObjectGraph, what: CaptureWhat) -> Capture {
        Capture {
            id: graph.next_capture_id(),
            time: DateTime::UNIX_EPOCH,
            line: 1,
            offset: 0,
            source: 0,
            thread: "Main".to_owned(),
            what,
        }
    }

    #[test]
    fn null_pointer_forms() {
        for t in ["(null)", "(nil)", "null", "nullptr", "", "0", "0x0", "0x00000000"] {
            assert!(is_null_pointer(t), "{t}");
        }
        for t in ["0x1", "7f00", "abc"] {
            assert!(!is_null_pointer(t), "{t}");
        }
    }

    #[test]
    fn pointer_normalization() {
        assert_eq!(normalize_pointer("0x00007F00AA"), "7f00aa");
        assert_eq!(normalize_pointer("7f00aa"), "7f00aa");
        assert_eq!(normalize_pointer("0x0"), "0");
    }

    #[test]
    fn register_moves_token_between_objects() {
        let mut g = ObjectGraph::new();
        let a = g.insert("0x1", DateTime::UNIX_EPOCH);
        let b = g.insert("0x2", DateTime::UNIX_EPOCH);
        g.register("k", a);
        g.register("k", b);
        assert_eq!(g.resolve("k"), Some(b));
        assert!(g.get(a).unwrap().aliases().is_empty());
    }

    #[test]
    fn unregister_keeps_history() {
        let mut g = ObjectGraph::new();
        let a = g.insert("0x1", DateTime::UNIX_EPOCH);
        g.register("0x1", a);
        let c = capture(&mut g, CaptureWhat::Text { text: "hi".to_owned() });
        g.push_capture(a, c);
        g.unregister_all(a);
        assert_eq!(g.resolve("0x1"), None);
        assert_eq!(g.live_aliases(), 0);
        let obj = g.get(a).unwrap();
        assert!(obj.is_destroyed());
        assert_eq!(obj.captures().len(), 1);
    }

    #[test]
    fn prop_at_replays_history() {
        let mut g = ObjectGraph::new();
        let a = g.insert("0x1", DateTime::UNIX_EPOCH);
        for value in ["open", "closed"] {
            let c = capture(
                &mut g,
                CaptureWhat::Prop {
                    name: "state".to_owned(),
                    value: Some(value.into()),
                },
            );
            g.push_capture(a, c);
        }
        assert_eq!(g.prop_at(a, "state", 0), Some("open".into()));
        assert_eq!(g.prop_at(a, "state", 1), Some("closed".into()));
        assert_eq!(g.prop_at(a, "other", 1), None);
    }

    #[test]
    fn dispatch_queue_is_fifo() {
        let mut g = ObjectGraph::new();
        let a = g.insert("0x1", DateTime::UNIX_EPOCH);
        for n in 0..3 {
            g.enqueue(
                a,
                "tx",
                CaptureRef {
                    obj: a,
                    capture: n,
                    index: 0,
                },
            );
        }
        assert_eq!(g.get(a).unwrap().queued("tx"), 3);
        assert_eq!(g.dequeue(a, "tx").map(|r| r.capture), Some(0));
        assert_eq!(g.dequeue(a, "tx").map(|r| r.capture), Some(1));
        assert_eq!(g.dequeue(a, "none"), None);
    }
}
