//! Built-in `moz` schema
//!
//! Header shapes understood by [`MozPreparer`]:
//!
//! ```text
//! 2020-01-01 00:00:00.000000 UTC - [Parent 123: Main Thread]: D/nsHttp message
//! [Parent 123: Main Thread]: D/nsHttp message
//! [rr 123 45678]2020-01-01 00:00:00.000000 UTC - [Main]: D/nsHttp message
//! ```
//!
//! A line matching none of them continues the previous one.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::line::{LinePreparer, PreparedLine, RawLine};
use crate::processing::Follow;

use super::{Schema, SchemaBuilder};

const FULL_HEADER: &str =
    r"^(\d{4}-\d{2}-\d{2}) (\d{2}:\d{2}:\d{2}\.\d+)(?: \w+)? - \[([^\]]+)\]: ([A-Z])/(\S+) (.*)$";
const SHORT_HEADER: &str = r"^\[([^\]]+)\]: ([A-Z])/(\S+) (.*)$";
const REPLAY_PREFIX: &str = r"^\[rr (\d+) (\d+)\]\s*(.*)$";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Line preparer for MOZ_LOG output
#[derive(Debug, Clone)]
pub struct MozPreparer {
    full: Regex,
    short: Regex,
    replay: Regex,
}

struct Header<'a> {
    timestamp: DateTime<Utc>,
    thread: &'a str,
    level: &'a str,
    module: &'a str,
    text: &'a str,
}

impl MozPreparer {
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            full: Regex::new(FULL_HEADER)?,
            short: Regex::new(SHORT_HEADER)?,
            replay: Regex::new(REPLAY_PREFIX)?,
        })
    }

    fn header<'a>(&self, text: &'a str) -> Option<Header<'a>> {
        if let Some(c) = self.full.captures(text) {
            let stamp = format!("{} {}", &c[1], &c[2]);
            let timestamp = NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT)
                .map(|t| t.and_utc())
                .unwrap_or(DateTime::UNIX_EPOCH);
            return Some(Header {
                timestamp,
                thread: c.get(3)?.as_str(),
                level: c.get(4)?.as_str(),
                module: c.get(5)?.as_str(),
                text: c.get(6)?.as_str(),
            });
        }
        let c = self.short.captures(text)?;
        Some(Header {
            timestamp: DateTime::UNIX_EPOCH,
            thread: c.get(1)?.as_str(),
            level: c.get(2)?.as_str(),
            module: c.get(3)?.as_str(),
            text: c.get(4)?.as_str(),
        })
    }
}

impl LinePreparer for MozPreparer {
    fn prepare(&self, raw: &RawLine, previous: Option<&PreparedLine>) -> PreparedLine {
        let (replay_id, body) = match self.replay.captures(&raw.text) {
            Some(c) => (
                c.get(2).and_then(|m| m.as_str().parse().ok()),
                c.get(3).map_or("", |m| m.as_str()),
            ),
            None => (None, raw.text.as_str()),
        };

        match self.header(body) {
            Some(h) => PreparedLine {
                raw: raw.text.clone(),
                text: h.text.to_owned(),
                timestamp: h.timestamp,
                thread: h.thread.to_owned(),
                module: h.module.to_owned(),
                level: h.level.to_owned(),
                replay_id,
                offset: raw.offset.clone(),
                number: raw.number,
                continuation: false,
            },
            None => {
                let mut line = PreparedLine::continuation(raw, previous);
                line.replay_id = replay_id;
                line.text = body.to_owned();
                line
            }
        }
    }
}

/// Builds the `moz` schema with a small set of necko rules.
pub fn schema(settings: &EngineSettings) -> Result<Arc<Schema>, EngineError> {
    SchemaBuilder::new("moz", MozPreparer::new()?)
        .settings(settings)
        .module("nsHttp", |m| {
            m.tag("NET");

            m.rule("Creating nsHttpChannel [this=%p]", |p, g| {
                p.obj(g.get(0)).create("nsHttpChannel");
                Ok(())
            });
            m.rule("Destroying nsHttpChannel [this=%p]", |p, g| {
                p.obj(g.get(0)).destroy();
                Ok(())
            });
            m.rule("nsHttpChannel::Init [this=%p]", |p, g| {
                p.obj(g.get(0)).capture().follow(Follow::pattern(
                    "uri=%s",
                    |p, obj, g| {
                        p.obj_by_id(obj).prop("url", g.get(0)).capture();
                        Ok(false)
                    },
                ))?;
                Ok(())
            });
            m.rule(
                "nsHttpChannel::OnStartRequest [this=%p request=%p status=%x]",
                |p, g| {
                    p.obj(g.get(0)).capture().prop("status", g.get(2));
                    Ok(())
                },
            );
            m.rule("Creating HttpChannelChild @%p", |p, g| {
                p.obj(g.get(0)).create("HttpChannelChild");
                Ok(())
            });
            m.rule("Destroying HttpChannelChild @%p", |p, g| {
                p.obj(g.get(0)).destroy();
                Ok(())
            });
            m.rule("HttpChannelChild::ContinueAsyncOpen this=%p gid=%u", |p, g| {
                p.obj(g.get(0))
                    .capture()
                    .ipcid(g.get(1))
                    .send("HttpChannel::AsyncOpen")?;
                Ok(())
            });
            m.rule("Creating HttpChannelParent [this=%p]", |p, g| {
                p.obj(g.get(0)).create("HttpChannelParent");
                Ok(())
            });
            m.rule("Destroying HttpChannelParent [this=%p]", |p, g| {
                p.obj(g.get(0)).destroy();
                Ok(())
            });
            m.rule("HttpChannelParent::RecvAsyncOpen [this=%p, gid=%u]", |p, g| {
                p.obj(g.get(0))
                    .capture()
                    .ipcid(g.get(1))
                    .recv("HttpChannel::AsyncOpen", |p, rv| {
                        p.obj_by_id(rv.receiver).link(rv.sender);
                        Ok(())
                    })?;
                Ok(())
            });
        })
        .module("nsSocketTransport", |m| {
            m.rule("creating nsSocketTransport @%p", |p, g| {
                p.obj(g.get(0)).create("nsSocketTransport");
                Ok(())
            });
            m.rule("destroying nsSocketTransport @%p", |p, g| {
                p.obj(g.get(0)).destroy();
                Ok(())
            });
            m.rule("nsSocketTransport::Init [this=%p host=%s:%hu proxy=%s:%hu]", |p, g| {
                p.obj(g.get(0))
                    .capture()
                    .prop("host", g.get(1))
                    .prop("port", g.parse::<u32>(2)?);
                Ok(())
            });
        })
        .summary_props("nsHttpChannel", ["url", "status"])
        .summary_props("nsSocketTransport", ["host", "port"])
        .build()
}
