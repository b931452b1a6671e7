//! send/recv rendezvous
//!
//! Records are keyed `message::ipcid`. A key holds either one parked recv
//! or a FIFO of sends that arrived first, never both.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::EngineError;
use crate::graph::{CaptureRef, CaptureWhat, ObjId};
use crate::sink::WarningKind;

use super::{ParseCursor, Processing};

/// Runs once the counterpart of a recv is seen
pub type RecvHandler = Box<dyn FnOnce(&mut Processing, Rendezvous) -> Result<(), EngineError> + Send>;

/// A completed send/recv pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendezvous {
    pub message: String,
    pub key: String,
    pub receiver: ObjId,
    pub sender: ObjId,
    /// The sender's `Send` capture
    pub origin: CaptureRef,
}

struct SendRecord {
    sender: ObjId,
    origin: CaptureRef,
}

struct RecvRecord {
    handler: RecvHandler,
    receiver: ObjId,
    cursor: ParseCursor,
}

enum SyncRecord {
    Sends(VecDeque<SendRecord>),
    Recv(RecvRecord),
}

#[derive(Default)]
pub(crate) struct SyncTable {
    records: HashMap<String, SyncRecord>,
}

impl SyncTable {
    /// Keys of parked recvs, sorted, and empties the table.
    pub(crate) fn drain_unmatched(&mut self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .records
            .drain()
            .filter_map(|(key, record)| matches!(record, SyncRecord::Recv(_)).then_some(key))
            .collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

pub(crate) fn sync_key(message: &str, ipcid: &str) -> String {
    format!("{message}::{ipcid}")
}

impl Processing {
    /// `sender` sent `message`. Completes a parked recv or queues the send.
    pub(crate) fn sync_send(
        &mut self,
        sender: ObjId,
        message: &str,
        ipcid: &str,
    ) -> Result<(), EngineError> {
        let Some(origin) = self.push_capture(
            sender,
            CaptureWhat::Send {
                message: message.to_owned(),
            },
        ) else {
            return Ok(());
        };
        let key = sync_key(message, ipcid);

        match self.sync.records.remove(&key) {
            Some(SyncRecord::Recv(parked)) => {
                self.release_wait(parked.cursor.source);
                debug!(key = %key, "send completes parked recv");
                let rendezvous = Rendezvous {
                    message: message.to_owned(),
                    key,
                    receiver: parked.receiver,
                    sender,
                    origin,
                };
                let handler = parked.handler;
                self.run_as(parked.cursor, |p| p.complete(handler, rendezvous))
            }
            Some(SyncRecord::Sends(mut queue)) => {
                queue.push_back(SendRecord { sender, origin });
                self.sync.records.insert(key, SyncRecord::Sends(queue));
                Ok(())
            }
            None => {
                let queue = VecDeque::from([SendRecord { sender, origin }]);
                self.sync.records.insert(key, SyncRecord::Sends(queue));
                Ok(())
            }
        }
    }

    /// `receiver` waits for `message`. Pairs with the oldest queued send or
    /// parks until one arrives, marking the current source as waiting.
    pub(crate) fn sync_recv(
        &mut self,
        receiver: ObjId,
        message: &str,
        ipcid: &str,
        handler: RecvHandler,
    ) -> Result<(), EngineError> {
        let key = sync_key(message, ipcid);

        match self.sync.records.remove(&key) {
            Some(SyncRecord::Sends(mut queue)) => {
                let oldest = queue.pop_front();
                if !queue.is_empty() {
                    self.sync.records.insert(key.clone(), SyncRecord::Sends(queue));
                }
                match oldest {
                    Some(send) => {
                        let rendezvous = Rendezvous {
                            message: message.to_owned(),
                            key,
                            receiver,
                            sender: send.sender,
                            origin: send.origin,
                        };
                        self.complete(handler, rendezvous)
                    }
                    None => {
                        self.park(key, receiver, handler);
                        Ok(())
                    }
                }
            }
            Some(SyncRecord::Recv(previous)) => {
                self.release_wait(previous.cursor.source);
                self.warn(
                    WarningKind::DuplicateRecv,
                    format!(
                        "recv '{key}' replaces one parked at {}:{}",
                        previous.cursor.file, previous.cursor.line
                    ),
                );
                self.park(key, receiver, handler);
                Ok(())
            }
            None => {
                self.park(key, receiver, handler);
                Ok(())
            }
        }
    }

    fn park(&mut self, key: String, receiver: ObjId, handler: RecvHandler) {
        let cursor = self.cursor.clone();
        *self.recv_wait.entry(cursor.source).or_default() += 1;
        debug!(key = %key, file = %cursor.file, line = cursor.line, "recv parked");
        self.sync.records.insert(
            key,
            SyncRecord::Recv(RecvRecord {
                handler,
                receiver,
                cursor,
            }),
        );
    }

    fn release_wait(&mut self, source: usize) {
        if let Some(n) = self.recv_wait.get_mut(&source) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.recv_wait.remove(&source);
            }
        }
    }

    /// Records the receipt on the receiver and runs the handler.
    fn complete(&mut self, handler: RecvHandler, rendezvous: Rendezvous) -> Result<(), EngineError> {
        self.push_capture(
            rendezvous.receiver,
            CaptureWhat::Recv {
                message: rendezvous.message.clone(),
                origin: rendezvous.origin,
            },
        );
        handler(self, rendezvous)
    }

    /// Pending sync records, parked recvs and queued sends alike.
    pub fn pending_syncs(&self) -> usize {
        self.sync.len()
    }
}
