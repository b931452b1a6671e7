//! Post-parse object search
//!
//! A [`SearchQuery`] selects objects of one class whose property (or raw
//! captured text, with the `*` field) satisfies an operator. With a seek id
//! the property is read as it was at that capture sequence id, replayed from
//! the object's property captures, and objects that did not exist yet are
//! left out.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::EngineError;
use crate::graph::{Obj, ObjId, ObjectGraph, PropValue, normalize_pointer};

/// Field name that searches raw captured line text
pub const RAW_TEXT_FIELD: &str = "*";

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOp {
    /// `==`
    Eq,
    /// `!!`: the property is set
    Defined,
    /// `!`: the property is not set
    Undefined,
    /// `>`
    Gt,
    /// `<`
    Lt,
    Contains,
    NotContains,
    /// `rx`
    Regex,
    /// `!rx`
    NotRegex,
}

impl FromStr for SearchOp {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => Self::Eq,
            "!!" => Self::Defined,
            "!" => Self::Undefined,
            ">" => Self::Gt,
            "<" => Self::Lt,
            "contains" => Self::Contains,
            "!contains" => Self::NotContains,
            "rx" => Self::Regex,
            "!rx" => Self::NotRegex,
            other => return Err(EngineError::Query(format!("unexpected operator '{other}'"))),
        })
    }
}

impl fmt::Display for SearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Defined => "!!",
            Self::Undefined => "!",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Contains => "contains",
            Self::NotContains => "!contains",
            Self::Regex => "rx",
            Self::NotRegex => "!rx",
        })
    }
}

/// What the operator looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchField {
    Prop(String),
    RawText,
}

impl From<&str> for SearchField {
    fn from(name: &str) -> Self {
        if name == RAW_TEXT_FIELD {
            Self::RawText
        } else {
            Self::Prop(name.to_owned())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// `None` matches every class
    pub class_name: Option<String>,
    pub field: SearchField,
    pub op: SearchOp,
    pub value: String,
    /// Capture sequence id to evaluate at
    pub seek: Option<u64>,
}

impl SearchQuery {
    pub fn new(
        class_name: impl Into<String>,
        field: &str,
        op: SearchOp,
        value: impl Into<String>,
    ) -> Self {
        let class_name = class_name.into();
        Self {
            class_name: (!class_name.is_empty()).then_some(class_name),
            field: SearchField::from(field),
            op,
            value: value.into(),
            seek: None,
        }
    }

    /// Parses the operator from its text form.
    pub fn parse(
        class_name: impl Into<String>,
        field: &str,
        op: &str,
        value: impl Into<String>,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(class_name, field, op.parse()?, value))
    }

    pub fn seek(mut self, seek: u64) -> Self {
        self.seek = Some(seek);
        self
    }
}

struct Matcher<'q> {
    op: SearchOp,
    value: &'q str,
    regex: Option<Regex>,
    pointer: bool,
}

impl<'q> Matcher<'q> {
    fn new(query: &'q SearchQuery) -> Result<Self, EngineError> {
        let regex = match query.op {
            SearchOp::Regex | SearchOp::NotRegex => Some(
                Regex::new(&query.value)
                    .map_err(|e| EngineError::Query(format!("invalid regex '{}': {e}", query.value)))?,
            ),
            _ => None,
        };
        Ok(Self {
            op: query.op,
            value: &query.value,
            regex,
            pointer: query.field == SearchField::Prop("pointer".to_owned()),
        })
    }

    /// Positive test on a present value.
    fn test(&self, actual: &str) -> bool {
        match self.op {
            SearchOp::Eq if self.pointer => normalize_pointer(actual) == normalize_pointer(self.value),
            SearchOp::Eq => actual == self.value,
            SearchOp::Defined | SearchOp::Undefined => true,
            SearchOp::Gt => PropValue::from(actual).compare(self.value) == Some(Ordering::Greater),
            SearchOp::Lt => PropValue::from(actual).compare(self.value) == Some(Ordering::Less),
            SearchOp::Contains | SearchOp::NotContains => actual.contains(self.value),
            SearchOp::Regex | SearchOp::NotRegex => {
                self.regex.as_ref().is_some_and(|rx| rx.is_match(actual))
            }
        }
    }

    fn negated(&self) -> bool {
        matches!(
            self.op,
            SearchOp::Undefined | SearchOp::NotContains | SearchOp::NotRegex
        )
    }

    fn matches_value(&self, actual: Option<&PropValue>) -> bool {
        let hit = match (actual, self.op) {
            (Some(v), SearchOp::Gt) => v.compare(self.value) == Some(Ordering::Greater),
            (Some(v), SearchOp::Lt) => v.compare(self.value) == Some(Ordering::Less),
            (Some(v), _) => self.test(&v.to_string()),
            (None, _) => false,
        };
        hit != self.negated()
    }

    fn matches_texts<'a>(&self, mut texts: impl Iterator<Item = &'a str>) -> bool {
        texts.any(|t| self.test(t)) != self.negated()
    }
}

fn value_of(graph: &ObjectGraph, obj: &Obj, name: &str, seek: Option<u64>) -> Option<PropValue> {
    match name {
        "className" => obj.class_name().map(PropValue::from),
        "pointer" => Some(PropValue::from(obj.pointer())),
        _ => match seek {
            Some(seek) => graph.prop_at(obj.id(), name, seek),
            None => obj.prop(name).cloned(),
        },
    }
}

/// Objects matching `query`, ordered by placement.
pub fn search(graph: &ObjectGraph, query: &SearchQuery) -> Result<Vec<ObjId>, EngineError> {
    let matcher = Matcher::new(query)?;

    let mut hits: Vec<&Obj> = graph
        .objs()
        .iter()
        .filter(|obj| match &query.class_name {
            Some(class) => obj.class_name() == Some(class.as_str()),
            None => true,
        })
        .filter(|obj| match query.seek {
            Some(seek) => obj.placement().seq <= seek,
            None => true,
        })
        .filter(|obj| match &query.field {
            SearchField::RawText => matcher.matches_texts(
                obj.captures()
                    .iter()
                    .filter(|c| query.seek.is_none_or(|seek| c.id <= seek))
                    .filter_map(|c| c.text()),
            ),
            SearchField::Prop(name) => {
                let value = value_of(graph, obj, name, query.seek);
                matcher.matches_value(value.as_ref())
            }
        })
        .collect();

    hits.sort_by_key(|obj| obj.placement());
    Ok(hits.into_iter().map(Obj::id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{ParseCursor, Processing};

    /// Advances the capture sequence until the next capture gets `id`.
    fn pad_to(p: &mut Processing, id: u64) {
        while p.graph().peek_seq() < id {
            p.obj("0xfiller").capture_text("pad");
        }
    }

    fn state_machine() -> (Processing, ObjId) {
        let mut p = Processing::default();
        p.set_cursor(ParseCursor {
            raw: "Creating Conn [this=0x1]".to_owned(),
            ..ParseCursor::default()
        });
        pad_to(&mut p, 4);
        let id = p.obj("0x1").create("Conn").id().unwrap();
        pad_to(&mut p, 5);
        p.obj("0x1").prop("state", "open");
        pad_to(&mut p, 9);
        p.obj("0x1").prop("state", "closed");
        (p, id)
    }

    #[test]
    fn point_in_time_query() {
        let (p, id) = state_machine();
        let at7 = SearchQuery::new("Conn", "state", SearchOp::Eq, "open").seek(7);
        assert_eq!(search(p.graph(), &at7).unwrap(), vec![id]);
        let closed_at7 = SearchQuery::new("Conn", "state", SearchOp::Eq, "closed").seek(7);
        assert!(search(p.graph(), &closed_at7).unwrap().is_empty());

        let at10 = SearchQuery::new("Conn", "state", SearchOp::Eq, "closed").seek(10);
        assert_eq!(search(p.graph(), &at10).unwrap(), vec![id]);
        assert_eq!(p.graph().prop_at(id, "state", 7), Some("open".into()));
        assert_eq!(p.graph().prop_at(id, "state", 10), Some("closed".into()));
    }

    #[test]
    fn objects_created_after_seek_are_excluded() {
        let (p, _) = state_machine();
        let q = SearchQuery::new("Conn", "className", SearchOp::Eq, "Conn").seek(2);
        assert!(search(p.graph(), &q).unwrap().is_empty());
    }

    #[test]
    fn live_value_without_seek() {
        let (p, id) = state_machine();
        let q = SearchQuery::new("Conn", "state", SearchOp::Eq, "closed");
        assert_eq!(search(p.graph(), &q).unwrap(), vec![id]);
    }

    #[test]
    fn pointer_comparison_is_normalized() {
        let (p, id) = state_machine();
        let q = SearchQuery::new("Conn", "pointer", SearchOp::Eq, "0x00000001");
        assert_eq!(search(p.graph(), &q).unwrap(), vec![id]);
    }

    #[test]
    fn defined_and_undefined() {
        let (p, id) = state_machine();
        let defined = SearchQuery::new("Conn", "state", SearchOp::Defined, "");
        assert_eq!(search(p.graph(), &defined).unwrap(), vec![id]);
        let undefined = SearchQuery::new("Conn", "url", SearchOp::Undefined, "");
        assert_eq!(search(p.graph(), &undefined).unwrap(), vec![id]);
        let before = SearchQuery::new("Conn", "state", SearchOp::Undefined, "").seek(4);
        assert_eq!(search(p.graph(), &before).unwrap(), vec![id]);
    }

    #[test]
    fn contains_regex_and_raw_text() {
        let (p, id) = state_machine();
        let q = SearchQuery::parse("Conn", "state", "contains", "los").unwrap();
        assert_eq!(search(p.graph(), &q).unwrap(), vec![id]);
        let q = SearchQuery::parse("Conn", "state", "!rx", "^op").unwrap();
        assert_eq!(search(p.graph(), &q).unwrap(), vec![id]);
        let q = SearchQuery::parse("Conn", "*", "contains", "Creating Conn").unwrap();
        assert_eq!(search(p.graph(), &q).unwrap(), vec![id]);
        let q = SearchQuery::parse("Conn", "*", "!contains", "Creating").unwrap();
        assert!(search(p.graph(), &q).unwrap().is_empty());
    }

    #[test]
    fn numeric_comparison() {
        let mut p = Processing::default();
        let a = p.obj("0xa").create("N").prop("n", 10).id().unwrap();
        p.obj("0xb").create("N").prop("n", 9);
        let q = SearchQuery::parse("N", "n", ">", "9.5").unwrap();
        assert_eq!(search(p.graph(), &q).unwrap(), vec![a]);
    }

    #[test]
    fn unknown_operator_is_query_error() {
        let err = SearchQuery::parse("Conn", "state", "~=", "x").unwrap_err();
        assert!(matches!(err, EngineError::Query(_)));
        let bad_rx = SearchQuery::parse("Conn", "state", "rx", "(").unwrap();
        assert!(search(&ObjectGraph::new(), &bad_rx).is_err());
    }

    #[test]
    fn any_class_and_ordering() {
        let mut p = Processing::default();
        let b = p.obj("0xb").create("B").prop("k", "v").id().unwrap();
        let a = p.obj("0xa").create("A").prop("k", "v").id().unwrap();
        let q = SearchQuery::new("", "k", SearchOp::Eq, "v");
        assert_eq!(search(p.graph(), &q).unwrap(), vec![b, a]);
    }
}
