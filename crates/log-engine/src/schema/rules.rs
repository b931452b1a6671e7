//! Rules and per-module rule tables

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::graph::PropValue;
use crate::pattern::{CompiledPattern, Groups};
use crate::processing::Processing;

/// Code run when a rule matches
pub type RuleConsumer = Arc<dyn Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync>;

/// Predicate over the processing state. A truthy `Some` lets the rule fire
/// and is handed to the consumer through [`Groups::condition`].
pub type Condition =
    Arc<dyn Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync>;

/// Result of trying one rule against a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Matched,
    NoMatch,
}

/// A compiled rule
pub struct Rule {
    pattern: Option<CompiledPattern>,
    condition: Option<Condition>,
    consumer: RuleConsumer,
}

impl Rule {
    pub(crate) fn new(
        pattern: Option<CompiledPattern>,
        condition: Option<Condition>,
        consumer: RuleConsumer,
    ) -> Result<Self, EngineError> {
        if pattern.is_none() && condition.is_none() {
            return Err(EngineError::Schema(
                "rule needs a pattern, a condition or both".to_owned(),
            ));
        }
        Ok(Self {
            pattern,
            condition,
            consumer,
        })
    }

    pub fn pattern(&self) -> Option<&CompiledPattern> {
        self.pattern.as_ref()
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    /// Runs the rule against `text`: pattern first, then condition.
    pub fn apply(&self, p: &mut Processing, text: &str) -> Result<RuleOutcome, EngineError> {
        let mut groups = match &self.pattern {
            Some(pattern) => match pattern.captures(text) {
                Some(groups) => groups,
                None => return Ok(RuleOutcome::NoMatch),
            },
            None => Groups::default(),
        };

        if let Some(condition) = &self.condition {
            match condition(p)? {
                Some(value) if value.is_truthy() => groups = groups.with_condition(value),
                _ => return Ok(RuleOutcome::NoMatch),
            }
        }

        (self.consumer)(p, &groups)?;
        Ok(RuleOutcome::Matched)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("pattern", &self.pattern.as_ref().map(CompiledPattern::source))
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// Leading run of word characters of `text`.
pub(crate) fn leading_token(text: &str) -> &str {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

/// Index key for a pattern, `None` when the pattern cannot be indexed.
pub(crate) fn grade1(pattern: &str) -> Option<&str> {
    let token = leading_token(pattern);
    if token.is_empty() || pattern[token.len()..].starts_with('%') {
        return None;
    }
    Some(token)
}

/// Rules of one module
#[derive(Debug, Default)]
pub struct Module {
    name: String,
    rules: Vec<Arc<Rule>>,
    index: HashMap<String, Vec<usize>>,
    flat: Vec<usize>,
    indexed: bool,
}

impl Module {
    pub(crate) fn new(name: impl Into<String>, indexed: bool) -> Self {
        Self {
            name: name.into(),
            indexed,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn add(&mut self, rule: Rule) {
        let position = self.rules.len();
        let key = if self.indexed {
            rule.pattern().and_then(|p| grade1(p.source())).map(str::to_owned)
        } else {
            None
        };
        match key {
            Some(key) => self.index.entry(key).or_default().push(position),
            None => self.flat.push(position),
        }
        self.rules.push(Arc::new(rule));
    }

    /// Candidate rules for `text`: indexed rules for its leading token in
    /// registration order, then the flat list.
    pub fn rules_for(&self, text: &str) -> Vec<Arc<Rule>> {
        if !self.indexed {
            return self.rules.clone();
        }
        let indexed = self
            .index
            .get(leading_token(text))
            .map(Vec::as_slice)
            .unwrap_or_default();
        indexed
            .iter()
            .chain(self.flat.iter())
            .map(|&i| Arc::clone(&self.rules[i]))
            .collect()
    }
}
