//! Schemas
//!
//! A [`Schema`] bundles a [`LinePreparer`] with per-module rule tables. It is
//! built once through [`SchemaBuilder`] and then shared read-only as
//! `Arc<Schema>`; all mutable parse state lives in
//! [`Processing`](crate::processing::Processing).
//!
//! ```ignore
//! let schema = SchemaBuilder::new("demo", MozPreparer::new()?)
//!     .module("nsHttp", |m| {
//!         m.rule("Creating nsHttpChannel [this=%p]", |p, g| {
//!             p.obj(g.get(0)).create("nsHttpChannel");
//!             Ok(())
//!         });
//!     })
//!     .build()?;
//! ```

pub mod moz;
mod rules;

pub use rules::{Condition, Module, Rule, RuleConsumer, RuleOutcome};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::config::{EngineSettings, PatternMode};
use crate::error::EngineError;
use crate::graph::PropValue;
use crate::line::LinePreparer;
use crate::pattern::{Groups, PatternInput, compile};
use crate::processing::Processing;

/// Rule description before compilation
pub struct RuleSpec {
    pub pattern: Option<PatternInput>,
    pub condition: Option<Condition>,
    pub consumer: RuleConsumer,
}

impl RuleSpec {
    fn compile(self, mode: PatternMode) -> Result<Rule, EngineError> {
        let pattern = self.pattern.map(|p| compile(p, mode)).transpose()?;
        Rule::new(pattern, self.condition, self.consumer)
    }
}

fn consumer<F>(f: F) -> RuleConsumer
where
    F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn condition<C>(c: C) -> Condition
where
    C: Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync + 'static,
{
    Arc::new(c)
}

/// Collects the rules of one module
#[derive(Default)]
pub struct ModuleBuilder {
    specs: Vec<RuleSpec>,
    tags: Vec<String>,
}

impl ModuleBuilder {
    pub fn rule<F>(&mut self, pattern: impl Into<PatternInput>, f: F) -> &mut Self
    where
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.add(RuleSpec {
            pattern: Some(pattern.into()),
            condition: None,
            consumer: consumer(f),
        })
    }

    pub fn rule_if<C, F>(&mut self, pattern: impl Into<PatternInput>, cond: C, f: F) -> &mut Self
    where
        C: Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync + 'static,
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.add(RuleSpec {
            pattern: Some(pattern.into()),
            condition: Some(condition(cond)),
            consumer: consumer(f),
        })
    }

    pub fn add(&mut self, spec: RuleSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    /// Also route lines logged under `tag` to this module.
    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.push(tag.into());
        self
    }
}

/// Immutable, shareable schema
pub struct Schema {
    name: String,
    preparer: Box<dyn LinePreparer>,
    modules: HashMap<String, Module>,
    tags: HashMap<String, String>,
    default: Module,
    plain: Vec<Arc<Rule>>,
    summary_props: BTreeMap<String, Vec<String>>,
    pattern_mode: PatternMode,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preparer(&self) -> &dyn LinePreparer {
        self.preparer.as_ref()
    }

    pub fn pattern_mode(&self) -> PatternMode {
        self.pattern_mode
    }

    /// Module for a line's module name or one of its extra tags.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name).or_else(|| {
            self.tags
                .get(name)
                .and_then(|module| self.modules.get(module))
        })
    }

    /// Candidate rules of `module` for `text`. Unknown modules have none.
    pub fn rules_for(&self, module: &str, text: &str) -> Vec<Arc<Rule>> {
        self.module(module)
            .map(|m| m.rules_for(text))
            .unwrap_or_default()
    }

    /// Candidate schema-level rules for `text`.
    pub fn default_rules_for(&self, text: &str) -> Vec<Arc<Rule>> {
        self.default.rules_for(text)
    }

    pub fn plain_rules(&self) -> &[Arc<Rule>] {
        &self.plain
    }

    /// Properties worth showing next to an object of `class_name`.
    pub fn summary_props(&self, class_name: &str) -> &[String] {
        self.summary_props
            .get(class_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("modules", &self.modules.len())
            .field("default_rules", &self.default.len())
            .field("plain_rules", &self.plain.len())
            .finish()
    }
}

/// Builder for [`Schema`]. Errors surface from [`SchemaBuilder::build`].
pub struct SchemaBuilder {
    name: String,
    preparer: Box<dyn LinePreparer>,
    prefix_index: bool,
    pattern_mode: PatternMode,
    modules: Vec<(String, ModuleBuilder)>,
    default: ModuleBuilder,
    plain: Vec<RuleSpec>,
    summary_props: BTreeMap<String, Vec<String>>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>, preparer: impl LinePreparer + 'static) -> Self {
        Self {
            name: name.into(),
            preparer: Box::new(preparer),
            prefix_index: true,
            pattern_mode: PatternMode::Lenient,
            modules: Vec::new(),
            default: ModuleBuilder::default(),
            plain: Vec::new(),
            summary_props: BTreeMap::new(),
        }
    }

    /// Copies `prefix_index` and `pattern_mode` from engine settings.
    pub fn settings(self, settings: &EngineSettings) -> Self {
        self.prefix_index(settings.prefix_index)
            .pattern_mode(settings.pattern_mode)
    }

    pub fn prefix_index(mut self, enabled: bool) -> Self {
        self.prefix_index = enabled;
        self
    }

    pub fn pattern_mode(mut self, mode: PatternMode) -> Self {
        self.pattern_mode = mode;
        self
    }

    /// Adds rules to module `name`. Calling it twice for one name appends.
    pub fn module(mut self, name: impl Into<String>, install: impl FnOnce(&mut ModuleBuilder)) -> Self {
        let name = name.into();
        match self.modules.iter_mut().find(|(n, _)| *n == name) {
            Some((_, builder)) => install(builder),
            None => {
                let mut builder = ModuleBuilder::default();
                install(&mut builder);
                self.modules.push((name, builder));
            }
        }
        self
    }

    /// Schema-level rule, tried after the line's own module.
    pub fn rule<F>(mut self, pattern: impl Into<PatternInput>, f: F) -> Self
    where
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.default.rule(pattern, f);
        self
    }

    pub fn rule_if<C, F>(mut self, pattern: impl Into<PatternInput>, cond: C, f: F) -> Self
    where
        C: Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync + 'static,
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.default.rule_if(pattern, cond, f);
        self
    }

    /// Catch-all rule tried when nothing else matched.
    pub fn plain_if<C, F>(mut self, cond: C, f: F) -> Self
    where
        C: Fn(&Processing) -> Result<Option<PropValue>, EngineError> + Send + Sync + 'static,
        F: Fn(&mut Processing, &Groups) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        self.plain.push(RuleSpec {
            pattern: None,
            condition: Some(condition(cond)),
            consumer: consumer(f),
        });
        self
    }

    pub fn summary_props<I, S>(mut self, class_name: impl Into<String>, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summary_props
            .insert(class_name.into(), props.into_iter().map(Into::into).collect());
        self
    }

    /// Compiles every rule and freezes the tables.
    pub fn build(self) -> Result<Arc<Schema>, EngineError> {
        let mode = self.pattern_mode;
        let mut modules = HashMap::new();
        let mut tags = HashMap::new();

        for (name, builder) in self.modules {
            let mut module = Module::new(name.clone(), self.prefix_index);
            for spec in builder.specs {
                module.add(spec.compile(mode)?);
            }
            for tag in builder.tags {
                if let Some(other) = tags.insert(tag.clone(), name.clone()) {
                    return Err(EngineError::Schema(format!(
                        "tag '{tag}' claimed by both '{other}' and '{name}'"
                    )));
                }
            }
            modules.insert(name, module);
        }

        let mut default = Module::new(String::new(), self.prefix_index);
        for spec in self.default.specs {
            default.add(spec.compile(mode)?);
        }

        let plain = self
            .plain
            .into_iter()
            .map(|spec| spec.compile(mode).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(Schema {
            name: self.name,
            preparer: self.preparer,
            modules,
            tags,
            default,
            plain,
            summary_props: self.summary_props,
            pattern_mode: mode,
        }))
    }
}

/// Names accepted by [`builtin`].
pub const BUILTIN_SCHEMAS: &[&str] = &["moz"];

/// Looks up a schema shipped with the engine.
pub fn builtin(name: &str, settings: &EngineSettings) -> Result<Arc<Schema>, EngineError> {
    match name {
        "moz" => moz::schema(settings),
        other => Err(EngineError::UnknownSchema(other.to_owned())),
    }
}
