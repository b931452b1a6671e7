//! Object handle
//!
//! [`ObjMut`] pairs an object id with the processing context so rule code can
//! chain operations: `p.obj(ptr).create("nsHttpChannel").prop("url", url)`.
//! A handle without an id (a null pointer) accepts every call and does
//! nothing.

use std::fmt;

use logan_core::metrics as m;

use crate::error::EngineError;
use crate::graph::{CaptureRef, CaptureWhat, Obj, ObjId, PropValue, is_null_pointer};
use crate::sink::WarningKind;

use super::Processing;
use super::follow::Follow;
use super::sync::Rendezvous;

/// Mutable handle on one object
pub struct ObjMut<'p> {
    proc: &'p mut Processing,
    id: Option<ObjId>,
    last: Option<CaptureRef>,
}

impl<'p> ObjMut<'p> {
    pub(crate) fn new(proc: &'p mut Processing, id: Option<ObjId>) -> Self {
        Self {
            proc,
            id,
            last: None,
        }
    }

    pub fn id(&self) -> Option<ObjId> {
        self.id
    }

    pub fn get(&self) -> Option<&Obj> {
        self.id.and_then(|id| self.proc.graph.get(id))
    }

    /// Reference to the capture made by the most recent call on this handle.
    pub fn last_capture(&self) -> Option<CaptureRef> {
        self.last
    }

    fn record(&mut self, what: CaptureWhat) {
        if let Some(id) = self.id {
            self.last = self.proc.push_capture(id, what);
        }
    }

    fn raw(&self) -> String {
        self.proc.cursor.raw.clone()
    }

    /// Sets the class and captures the current line. An object that already
    /// has a class is destroyed first and a fresh one is created under the
    /// alias it was last resolved by.
    pub fn create(mut self, class_name: &str) -> Self {
        let Some(mut id) = self.id else {
            return self;
        };

        let existing = self
            .proc
            .graph
            .get(id)
            .and_then(|o| o.class_name().map(str::to_owned));
        if let Some(existing) = existing {
            self.proc.warn(
                WarningKind::ObjectRecreated,
                format!(
                    "{class_name} created over live {existing} {id} at {}:{}",
                    self.proc.cursor.file, self.proc.cursor.line
                ),
            );
            metrics::counter!(m::ENGINE_OBJECTS_RECREATED_TOTAL).increment(1);

            let token = self.proc.graph.last_alias(id);
            self.release(id);
            id = match token {
                Some(token) => self.proc.resolve_or_insert(&token),
                None => {
                    let pointer = self
                        .proc
                        .graph
                        .get(id)
                        .map(|o| o.pointer().to_owned())
                        .unwrap_or_default();
                    self.proc.graph.insert(&pointer, self.proc.cursor.timestamp)
                }
            };
            self.id = Some(id);
        }

        self.proc.graph.set_class(id, class_name);
        let raw = self.raw();
        self.record(CaptureWhat::Line { text: raw });
        metrics::counter!(m::ENGINE_OBJECTS_CREATED_TOTAL).increment(1);
        self
    }

    /// Adds a lookup key. Null pointers are ignored.
    pub fn alias(mut self, token: &str) -> Self {
        let Some(id) = self.id else {
            return self;
        };
        if is_null_pointer(token) {
            return self;
        }
        let graph = self.proc.graph_mut();
        if graph.resolve(token) == Some(id) {
            graph.touch(token, id);
        } else {
            graph.register(token, id);
        }
        self
    }

    fn release(&mut self, id: ObjId) -> Option<CaptureRef> {
        let raw = self.raw();
        let capture = self.proc.push_capture(id, CaptureWhat::Released { text: raw });
        self.proc.graph.unregister_all(id);
        capture
    }

    /// Captures the line as a release and drops every live alias.
    pub fn destroy(mut self) -> Self {
        if let Some(id) = self.id {
            self.last = self.release(id);
        }
        self
    }

    /// [`ObjMut::destroy`] only when the class is `class_name`.
    pub fn destroy_if(self, class_name: &str) -> Self {
        if self.get().and_then(Obj::class_name) == Some(class_name) {
            self.destroy()
        } else {
            self
        }
    }

    /// Captures the current raw line.
    pub fn capture(mut self) -> Self {
        let raw = self.raw();
        self.record(CaptureWhat::Line { text: raw });
        self
    }

    pub fn capture_text(mut self, text: impl Into<String>) -> Self {
        self.record(CaptureWhat::Text { text: text.into() });
        self
    }

    fn set_prop(mut self, name: &str, value: Option<PropValue>) -> Self {
        if let Some(id) = self.id {
            self.proc.graph.set_prop(id, name, value.clone());
            self.record(CaptureWhat::Prop {
                name: name.to_owned(),
                value,
            });
        }
        self
    }

    fn current(&self, name: &str) -> Option<PropValue> {
        self.get().and_then(|o| o.prop(name)).cloned()
    }

    pub fn prop(self, name: &str, value: impl Into<PropValue>) -> Self {
        self.set_prop(name, Some(value.into()))
    }

    /// Appends as `old,new` when the old value is truthy.
    pub fn prop_merge(self, name: &str, value: impl Into<PropValue>) -> Self {
        let value = value.into();
        let merged = match self.current(name) {
            Some(old) if old.is_truthy() => PropValue::Text(format!("{old},{value}")),
            _ => value,
        };
        self.set_prop(name, Some(merged))
    }

    /// Computes the new value from the old one; `None` removes the property.
    pub fn prop_with(self, name: &str, f: impl FnOnce(Option<&PropValue>) -> Option<PropValue>) -> Self {
        let old = self.current(name);
        let value = f(old.as_ref());
        self.set_prop(name, value)
    }

    pub fn unset(self, name: &str) -> Self {
        self.set_prop(name, None)
    }

    /// Two-way reference, captured on both objects.
    pub fn link(mut self, other: ObjId) -> Self {
        let Some(id) = self.id else {
            return self;
        };
        if self.proc.graph.get(other).is_none() {
            return self;
        }
        self.record(CaptureWhat::Link {
            other,
            outbound: true,
        });
        self.proc.push_capture(
            other,
            CaptureWhat::Link {
                other: id,
                outbound: false,
            },
        );
        self
    }

    /// One-way reference to the object `token` resolves to.
    pub fn mention(mut self, token: &str) -> Self {
        if self.id.is_none() || is_null_pointer(token) {
            return self;
        }
        let other = self.proc.resolve_or_insert(token);
        self.mention_obj(other)
    }

    pub fn mention_obj(mut self, other: ObjId) -> Self {
        self.record(CaptureWhat::Mention { other });
        self
    }

    /// Arms `follow` on the current thread and module.
    pub fn follow(mut self, follow: Follow) -> Result<Self, EngineError> {
        let Some(id) = self.id else {
            return Ok(self);
        };
        if let Some(armed) = follow.arm(id, self.proc)? {
            self.proc.arm_follow(armed);
        }
        Ok(self)
    }

    /// Queues a reference to this line on `target` under `name`.
    pub fn dispatch(mut self, target: ObjId, name: &str) -> Self {
        self.record(CaptureWhat::Dispatch {
            target,
            name: name.to_owned(),
        });
        if let Some(entry) = self.last {
            self.proc.graph.enqueue(target, name, entry);
        }
        self
    }

    /// Takes the oldest entry of this object's `name` queue.
    pub fn run(mut self, name: &str) -> Self {
        let Some(id) = self.id else {
            return self;
        };
        if let Some(origin) = self.proc.graph.dequeue(id, name) {
            self.record(CaptureWhat::Run {
                name: name.to_owned(),
                origin,
            });
        }
        self
    }

    pub fn ipcid(mut self, ipcid: impl ToString) -> Self {
        if let Some(id) = self.id {
            self.proc.graph.set_ipcid(id, ipcid.to_string());
        }
        self
    }

    fn ipc_key(&self) -> Option<(ObjId, String)> {
        if !self.proc.is_ipc_active() {
            return None;
        }
        let id = self.id?;
        let ipcid = self.proc.graph.get(id)?.ipcid()?.to_owned();
        Some((id, ipcid))
    }

    /// Announces `message`. No-op without IPC correlation or an ipcid.
    pub fn send(mut self, message: &str) -> Result<Self, EngineError> {
        if let Some((id, ipcid)) = self.ipc_key() {
            self.proc.sync_send(id, message, &ipcid)?;
        }
        Ok(self)
    }

    /// Waits for `message`; `handler` runs once the matching send is seen.
    pub fn recv<F>(mut self, message: &str, handler: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&mut Processing, Rendezvous) -> Result<(), EngineError> + Send + 'static,
    {
        if let Some((id, ipcid)) = self.ipc_key() {
            self.proc.sync_recv(id, message, &ipcid, Box::new(handler))?;
        }
        Ok(self)
    }
}

impl fmt::Debug for ObjMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjMut")
            .field("id", &self.id)
            .field("last", &self.last)
            .finish()
    }
}
