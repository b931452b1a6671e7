//! `logan search` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logan_engine::{Obj, Schema, SearchQuery};

use crate::cli::SearchArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::sink::CliSink;

use super::{load_config, parse_files};

/// Execute the `search` command.
pub async fn execute(
    args: SearchArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    // reject a bad operator before spending time on the parse
    let mut query = SearchQuery::parse(args.class.as_str(), &args.prop, &args.op, args.value.as_str())?;
    if let Some(seek) = args.seek {
        query = query.seek(seek);
    }

    let config = load_config(config_path).await?;
    let mut sink = CliSink::new();
    let session = parse_files(&args.files, &config, &mut sink).await?;

    session.search(&query, &mut sink)?;
    let total = sink.results.len();
    info!(hits = total, "search finished");

    let max = config.search.max_results;
    let results = sink
        .results
        .iter()
        .filter_map(|id| session.graph().get(*id))
        .take(max)
        .map(|obj| ObjRow::new(obj, session.schema()))
        .collect();

    let report = SearchReport {
        query: describe(&args),
        total,
        truncated: total > max,
        results,
    };
    writer.render(&report)
}

fn describe(args: &SearchArgs) -> String {
    let class = if args.class.is_empty() { "*" } else { &args.class };
    let mut text = format!("{class}.{} {} {:?}", args.prop, args.op, args.value);
    if let Some(seek) = args.seek {
        text.push_str(&format!(" @{seek}"));
    }
    text
}

/// One matching object
#[derive(Debug, Serialize)]
pub struct ObjRow {
    pub id: String,
    pub class_name: String,
    pub pointer: String,
    pub created: String,
    pub captures: usize,
    pub props: BTreeMap<String, String>,
}

impl ObjRow {
    /// Shows the schema's summary properties of the class, or every
    /// property when it names none.
    pub fn new(obj: &Obj, schema: &Schema) -> Self {
        let class_name = obj.class_name().unwrap_or_default().to_owned();
        let summary = schema.summary_props(&class_name);
        let props = if summary.is_empty() {
            obj.props()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect()
        } else {
            summary
                .iter()
                .filter_map(|name| obj.prop(name).map(|v| (name.clone(), v.to_string())))
                .collect()
        };
        Self {
            id: obj.id().to_string(),
            class_name,
            pointer: obj.pointer().to_owned(),
            created: obj.placement().time.to_rfc3339(),
            captures: obj.captures().len(),
            props,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub query: String,
    pub total: usize,
    pub truncated: bool,
    pub results: Vec<ObjRow>,
}

impl Render for SearchReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Search: {}", self.query.bold())?;
        writeln!(w, "  Matches: {}", self.total)?;
        if self.total == 0 {
            return Ok(());
        }
        writeln!(w)?;
        for row in &self.results {
            let props = row
                .props
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(
                w,
                "{:<6} {} {} {:<20} {}",
                row.id,
                row.class_name.cyan(),
                row.pointer,
                row.created,
                props
            )?;
        }
        if self.truncated {
            writeln!(
                w,
                "  ... {} more (raise search.max_results)",
                self.total - self.results.len()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(seek: Option<u64>) -> SearchArgs {
        SearchArgs {
            files: Vec::new(),
            class: String::new(),
            prop: "url".to_owned(),
            op: "contains".to_owned(),
            value: "example".to_owned(),
            seek,
        }
    }

    #[test]
    fn test_describe_query() {
        assert_eq!(describe(&args(None)), "*.url contains \"example\"");
        assert_eq!(describe(&args(Some(9))), "*.url contains \"example\" @9");
    }

    #[test]
    fn test_render_truncated() {
        let report = SearchReport {
            query: "nsHttpChannel.url contains \"x\"".to_owned(),
            total: 3,
            truncated: true,
            results: vec![ObjRow {
                id: "#0".to_owned(),
                class_name: "nsHttpChannel".to_owned(),
                pointer: "0x1".to_owned(),
                created: "2020-01-01T00:00:00+00:00".to_owned(),
                captures: 2,
                props: BTreeMap::from([("url".to_owned(), "http://x/".to_owned())]),
            }],
        };
        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("Matches: 3"));
        assert!(output.contains("url=http://x/"));
        assert!(output.contains("2 more"));
    }

    #[tokio::test]
    async fn test_bad_operator_fails_before_parsing() {
        let mut bad = args(None);
        bad.op = "~=".to_owned();
        bad.files = vec!["/nonexistent/log".into()];
        let err = execute(bad, Path::new("/nonexistent/logan.toml"), &OutputWriter::new(crate::cli::OutputFormat::Text))
            .await
            .expect_err("operator must be rejected");
        assert_eq!(err.exit_code(), 4);
    }
}
