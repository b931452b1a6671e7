//! Parse session
//!
//! A [`ParseSession`] owns everything one parse mutates: the open streams,
//! their lookahead lines and the [`Processing`] context. Streams are merged
//! by timestamp with `base_order` as the tie-breaker. A stream with a
//! parked recv is skipped until its send shows up, unless every stream is
//! waiting, in which case the earliest line is taken anyway.
//!
//! ```ignore
//! let mut session = ParseSessionBuilder::new(schema)
//!     .settings(settings)
//!     .source("log-main.1.moz_log", size, FileSource::open(path).await?)
//!     .build()?;
//! let summary = session.run(&mut TracingSink::new()).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logan_core::metrics as m;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::graph::{ObjId, ObjectGraph};
use crate::line::PreparedLine;
use crate::processing::Processing;
use crate::reader::ChunkedReader;
use crate::schema::Schema;
use crate::search::{SearchQuery, search};
use crate::sink::{ProgressSink, Warning};
use crate::source::{ByteSource, LogSource, Topology};

/// Totals of a finished parse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub lines: u64,
    pub bytes: u64,
    pub objects: usize,
    pub warnings: usize,
    /// Lines taken from a waiting stream because every stream was waiting
    pub forced: u64,
    pub ipc: bool,
}

/// How far a parse got in one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    /// Bytes read so far
    pub offset: u64,
    /// Number of the last line handed to the rules, 0 before the first
    pub line: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Ready,
    Finished,
    Failed,
}

struct Stream<S> {
    source: LogSource,
    reader: ChunkedReader<S>,
    lookahead: Option<PreparedLine>,
    previous: Option<PreparedLine>,
}

/// Builder for [`ParseSession`]
pub struct ParseSessionBuilder<S> {
    schema: Arc<Schema>,
    settings: EngineSettings,
    sources: Vec<(String, u64, S)>,
}

impl<S: ByteSource> ParseSessionBuilder<S> {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            settings: EngineSettings::default(),
            sources: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds an input. `name` drives rotation and parent/child detection.
    pub fn source(mut self, name: impl Into<String>, size: u64, source: S) -> Self {
        self.sources.push((name.into(), size, source));
        self
    }

    pub fn build(self) -> Result<ParseSession<S>, EngineError> {
        self.settings.validate()?;
        if self.sources.is_empty() {
            return Err(EngineError::Session("no sources to parse".to_owned()));
        }

        let mut sources: Vec<LogSource> = self
            .sources
            .iter()
            .enumerate()
            .map(|(id, (name, size, _))| LogSource::from_name(id, name.clone(), *size))
            .collect();
        let topology = Topology::analyze(&mut sources);
        let ipc = self.settings.ipc.resolve(topology.suggests_ipc());

        let mut processing = Processing::new(self.schema.pattern_mode());
        processing.set_ipc(ipc);

        let chunk_size = self.settings.chunk_size;
        let streams = sources
            .into_iter()
            .zip(self.sources)
            .map(|(source, (name, size, bytes))| Stream {
                reader: ChunkedReader::new(bytes, name, size, chunk_size),
                source,
                lookahead: None,
                previous: None,
            })
            .collect();

        Ok(ParseSession {
            schema: self.schema,
            settings: self.settings,
            streams,
            topology,
            processing,
            state: SessionState::Ready,
            summary: ParseSummary {
                ipc,
                ..ParseSummary::default()
            },
        })
    }
}

/// One parse over a fixed set of sources
pub struct ParseSession<S> {
    schema: Arc<Schema>,
    settings: EngineSettings,
    streams: Vec<Stream<S>>,
    topology: Topology,
    processing: Processing,
    state: SessionState,
    summary: ParseSummary,
}

impl<S: ByteSource> ParseSession<S> {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn sources(&self) -> impl Iterator<Item = &LogSource> {
        self.streams.iter().map(|s| &s.source)
    }

    /// Read offset and current line of every source, in session order.
    pub fn positions(&self) -> impl Iterator<Item = (&LogSource, SourcePosition)> {
        self.streams.iter().map(|s| {
            let position = SourcePosition {
                offset: s.reader.read_offset(),
                line: s.previous.as_ref().map_or(0, |l| l.number),
            };
            (&s.source, position)
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn processing(&self) -> &Processing {
        &self.processing
    }

    /// Objects found so far. Stays readable after a failed parse.
    pub fn graph(&self) -> &ObjectGraph {
        self.processing.graph()
    }

    pub fn summary(&self) -> &ParseSummary {
        &self.summary
    }

    /// Reads every source to the end, feeding lines to the schema in
    /// timestamp order. A rule error aborts the parse; objects created
    /// up to that point remain in [`ParseSession::graph`].
    pub async fn run<K: ProgressSink>(&mut self, sink: &mut K) -> Result<ParseSummary, EngineError> {
        if self.state != SessionState::Ready {
            return Err(EngineError::Session("session already ran".to_owned()));
        }

        let total: u64 = self.streams.iter().map(|s| s.source.size()).sum();
        let title = self
            .streams
            .iter()
            .map(|s| s.source.name())
            .collect::<Vec<_>>()
            .join(", ");
        sink.reset_progress();
        sink.title(&title);
        sink.add_to_max_progress(total);
        info!(
            schema = self.schema.name(),
            sources = self.streams.len(),
            bytes = total,
            ipc = self.summary.ipc,
            "parse started"
        );

        for warning in self.topology.warnings.clone() {
            self.report(sink, &warning);
        }

        match self.merge(sink).await {
            Ok(()) => {}
            Err(e) => {
                self.state = SessionState::Failed;
                error!(error = %e, "parse aborted");
                return Err(e);
            }
        }

        for warning in self.processing.finish() {
            self.report(sink, &warning);
        }

        let props = self.processing.graph().search_props();
        sink.fill_class_names(&props);
        sink.fill_search_by();
        sink.searching_enabled(true);
        sink.load_progress(100);

        self.summary.objects = self.processing.graph().len();
        self.state = SessionState::Finished;
        info!(
            lines = self.summary.lines,
            objects = self.summary.objects,
            warnings = self.summary.warnings,
            forced = self.summary.forced,
            "parse finished"
        );
        Ok(self.summary.clone())
    }

    async fn merge<K: ProgressSink>(&mut self, sink: &mut K) -> Result<(), EngineError> {
        for index in 0..self.streams.len() {
            self.advance(index, sink).await?;
        }

        while let Some(index) = self.pick() {
            let stream = &mut self.streams[index];
            let Some(line) = stream.lookahead.take() else {
                continue;
            };

            self.processing
                .process_line(&self.schema, &stream.source, &line)
                .map_err(|source| EngineError::RuleFailed {
                    file: stream.source.name().to_owned(),
                    line: line.number,
                    raw: line.raw.clone(),
                    source: Box::new(source),
                })?;
            self.summary.lines += 1;
            stream.previous = Some(line);

            for warning in self.processing.take_warnings() {
                self.report(sink, &warning);
            }
            self.advance(index, sink).await?;
        }
        Ok(())
    }

    /// Index of the stream holding the earliest line, preferring streams
    /// that are not waiting on a recv.
    fn pick(&mut self) -> Option<usize> {
        let mut ready: Option<((DateTime<Utc>, usize), usize)> = None;
        let mut waiting: Option<((DateTime<Utc>, usize), usize)> = None;

        for (index, stream) in self.streams.iter().enumerate() {
            let Some(line) = &stream.lookahead else {
                continue;
            };
            let key = (line.timestamp, stream.source.base_order());
            let slot = if self.processing.is_waiting(stream.source.id()) {
                &mut waiting
            } else {
                &mut ready
            };
            if slot.is_none_or(|(best, _)| key < best) {
                *slot = Some((key, index));
            }
        }

        if let Some((_, index)) = ready {
            return Some(index);
        }
        let (_, index) = waiting?;
        debug!(
            file = self.streams[index].source.name(),
            "every stream waits on a recv, taking the earliest line"
        );
        metrics::counter!(m::ENGINE_FORCED_DISPATCH_TOTAL).increment(1);
        self.summary.forced += 1;
        Some(index)
    }

    /// Prepares the next lookahead line of stream `index`, reading slices
    /// as needed.
    async fn advance<K: ProgressSink>(&mut self, index: usize, sink: &mut K) -> Result<(), EngineError> {
        let stream = &mut self.streams[index];
        loop {
            if let Some(raw) = stream.reader.pop_line() {
                let line = self.schema.preparer().prepare(&raw, stream.previous.as_ref());
                stream.lookahead = Some(line);
                return Ok(());
            }
            if stream.reader.is_eof() {
                stream.lookahead = None;
                return Ok(());
            }
            let read = stream.reader.fill().await? as u64;
            if read > 0 {
                sink.add_to_load_progress(read);
                metrics::counter!(m::ENGINE_BYTES_READ_TOTAL).increment(read);
                self.summary.bytes += read;
            }
        }
    }

    fn report<K: ProgressSink>(&mut self, sink: &mut K, warning: &Warning) {
        metrics::counter!(m::ENGINE_WARNINGS_TOTAL, m::LABEL_WARNING_KIND => warning.kind.as_str())
            .increment(1);
        self.summary.warnings += 1;
        sink.warn(warning);
    }

    /// Evaluates `query` over the parsed objects and reports each hit to
    /// `sink`, ordered by placement.
    pub fn search<K: ProgressSink>(
        &self,
        query: &SearchQuery,
        sink: &mut K,
    ) -> Result<Vec<ObjId>, EngineError> {
        let hits = search(self.processing.graph(), query)?;
        for id in &hits {
            if let Some(obj) = self.processing.graph().get(*id) {
                sink.add_result(obj);
            }
        }
        Ok(hits)
    }
}
