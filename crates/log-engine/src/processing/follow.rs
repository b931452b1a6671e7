//! Follow continuations
//!
//! A follow claims the next lines of the current thread and module before
//! the rule tables see them. One follow is armed per (thread, module);
//! arming another replaces it.
//!
//! Callback results: `true` consumes the line and keeps the follow armed,
//! `false` expires it. A pattern follow's consumer always consumes the
//! matched line; a `false` from the mismatch callback (or no callback)
//! hands the line on to the normal rules.

use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::graph::ObjId;
use crate::pattern::{CompiledPattern, Groups, PatternInput, compile};

use super::Processing;

/// Called with the captures of a line matching a pattern follow
pub type FollowConsumer =
    Arc<dyn Fn(&mut Processing, ObjId, &Groups) -> Result<bool, EngineError> + Send + Sync>;

/// Called with each line offered to a handler follow
pub type FollowHandler = Arc<dyn Fn(&mut Processing, ObjId) -> Result<bool, EngineError> + Send + Sync>;

/// A follow to arm with [`ObjMut::follow`](super::ObjMut::follow)
pub struct Follow {
    spec: Spec,
}

enum Spec {
    Lines(usize),
    Pattern {
        pattern: PatternInput,
        consumer: FollowConsumer,
        on_error: Option<FollowHandler>,
    },
    Handler(FollowHandler),
}

impl Follow {
    /// Capture the next `n` lines verbatim on the object.
    pub fn lines(n: usize) -> Self {
        Self {
            spec: Spec::Lines(n),
        }
    }

    /// Run `consumer` on lines matching `pattern`; stop at the first mismatch.
    pub fn pattern<F>(pattern: impl Into<PatternInput>, consumer: F) -> Self
    where
        F: Fn(&mut Processing, ObjId, &Groups) -> Result<bool, EngineError> + Send + Sync + 'static,
    {
        Self {
            spec: Spec::Pattern {
                pattern: pattern.into(),
                consumer: Arc::new(consumer),
                on_error: None,
            },
        }
    }

    /// Like [`Follow::pattern`], with `on_error` deciding what a mismatch does.
    pub fn pattern_or<F, E>(pattern: impl Into<PatternInput>, consumer: F, on_error: E) -> Self
    where
        F: Fn(&mut Processing, ObjId, &Groups) -> Result<bool, EngineError> + Send + Sync + 'static,
        E: Fn(&mut Processing, ObjId) -> Result<bool, EngineError> + Send + Sync + 'static,
    {
        Self {
            spec: Spec::Pattern {
                pattern: pattern.into(),
                consumer: Arc::new(consumer),
                on_error: Some(Arc::new(on_error)),
            },
        }
    }

    /// Offer every line to `handler`.
    pub fn handler<F>(handler: F) -> Self
    where
        F: Fn(&mut Processing, ObjId) -> Result<bool, EngineError> + Send + Sync + 'static,
    {
        Self {
            spec: Spec::Handler(Arc::new(handler)),
        }
    }

    /// Compiles the follow for `obj`. `None` for a zero line count.
    pub(crate) fn arm(
        self,
        obj: ObjId,
        p: &Processing,
    ) -> Result<Option<ArmedFollow>, EngineError> {
        let kind = match self.spec {
            Spec::Lines(0) => return Ok(None),
            Spec::Lines(n) => Armed::Lines(n),
            Spec::Pattern {
                pattern,
                consumer,
                on_error,
            } => Armed::Pattern {
                pattern: compile(pattern, p.pattern_mode())?,
                consumer,
                on_error,
            },
            Spec::Handler(handler) => Armed::Handler(handler),
        };
        Ok(Some(ArmedFollow { obj, kind }))
    }
}

impl fmt::Debug for Follow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.spec {
            Spec::Lines(n) => write!(f, "Follow::lines({n})"),
            Spec::Pattern { pattern, .. } => write!(f, "Follow::pattern({:?})", pattern.source()),
            Spec::Handler(_) => f.write_str("Follow::handler"),
        }
    }
}

pub(crate) enum FollowResult {
    /// Line consumed, stay armed
    Continue,
    /// Line consumed, expire
    Done,
    /// Line not consumed, expire
    Decline,
}

enum Armed {
    Lines(usize),
    Pattern {
        pattern: CompiledPattern,
        consumer: FollowConsumer,
        on_error: Option<FollowHandler>,
    },
    Handler(FollowHandler),
}

pub(crate) struct ArmedFollow {
    obj: ObjId,
    kind: Armed,
}

impl ArmedFollow {
    /// Offers the current line.
    pub(crate) fn step(&mut self, p: &mut Processing) -> Result<FollowResult, EngineError> {
        let obj = self.obj;
        match &mut self.kind {
            Armed::Lines(remaining) => {
                p.obj_by_id(obj).capture();
                *remaining -= 1;
                Ok(if *remaining == 0 {
                    FollowResult::Done
                } else {
                    FollowResult::Continue
                })
            }
            Armed::Pattern {
                pattern,
                consumer,
                on_error,
            } => match pattern.captures(p.text()) {
                Some(groups) => Ok(if consumer(p, obj, &groups)? {
                    FollowResult::Continue
                } else {
                    FollowResult::Done
                }),
                None => {
                    let keep = match on_error {
                        Some(on_error) => on_error(p, obj)?,
                        None => false,
                    };
                    Ok(if keep {
                        FollowResult::Continue
                    } else {
                        FollowResult::Decline
                    })
                }
            },
            Armed::Handler(handler) => Ok(if handler(p, obj)? {
                FollowResult::Continue
            } else {
                FollowResult::Decline
            }),
        }
    }
}
