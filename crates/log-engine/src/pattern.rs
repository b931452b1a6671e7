//! printf-style rule pattern compiler
//!
//! Rule authors write patterns the way the logging code wrote the line,
//! e.g. `"Creating nsHttpChannel [this=%p]"`. [`compile`] escapes the
//! literal parts, turns each recognized placeholder into one capture group
//! and anchors the result at both ends.
//!
//! | placeholder | group |
//! |---|---|
//! | `%p` | hex pointer with optional `0x`, or `(null)` / `(nil)` |
//! | `%d` | optionally signed decimal |
//! | `%u`, `%hu` | unsigned decimal |
//! | `%s` | non-whitespace run |
//! | `%*s` | any characters, greedy |
//! | `%x`, `%X`, `%08x` | hex integer with optional `0x` |
//! | `%f`, `%.2f`, `%3.1f` | floating point |
//! | `%*$` | rest of the line |
//! | `%%` | a literal `%` |

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::config::PatternMode;
use crate::error::EngineError;
use crate::graph::PropValue;

const POINTER: &str = r"((?:0x)?[0-9a-fA-F]+|\(null\)|\(nil\))";
const SIGNED: &str = r"([-+]?\d+)";
const UNSIGNED: &str = r"(\d+)";
const WORD: &str = r"(\S*)";
const ANY: &str = r"(.*)";
const HEX: &str = r"((?:0x)?[0-9a-fA-F]+)";
const FLOAT: &str = r"([-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)";

/// A pattern turned into an anchored regex
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    /// The printf-style text the pattern was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Number of capture groups (placeholders).
    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Matches the whole `text`; `None` when it does not match.
    pub fn captures(&self, text: &str) -> Option<Groups> {
        let caps = self.regex.captures(text)?;
        let values = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_owned()).unwrap_or_default())
            .collect();
        Some(Groups::from_values(values))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Either pattern text or an already compiled pattern
#[derive(Debug, Clone)]
pub enum PatternInput {
    Source(String),
    Compiled(CompiledPattern),
}

impl PatternInput {
    /// The printf-style text, whichever form this is.
    pub fn source(&self) -> &str {
        match self {
            Self::Source(s) => s,
            Self::Compiled(c) => c.source(),
        }
    }
}

impl From<&str> for PatternInput {
    fn from(s: &str) -> Self {
        Self::Source(s.to_owned())
    }
}

impl From<String> for PatternInput {
    fn from(s: String) -> Self {
        Self::Source(s)
    }
}

impl From<CompiledPattern> for PatternInput {
    fn from(c: CompiledPattern) -> Self {
        Self::Compiled(c)
    }
}

/// Compiles a pattern. Passing a [`CompiledPattern`] returns it unchanged.
pub fn compile(
    input: impl Into<PatternInput>,
    mode: PatternMode,
) -> Result<CompiledPattern, EngineError> {
    let source = match input.into() {
        PatternInput::Compiled(compiled) => return Ok(compiled),
        PatternInput::Source(source) => source,
    };

    let expr = translate(&source, mode)?;
    let regex = Regex::new(&expr).map_err(|e| EngineError::Pattern {
        pattern: source.clone(),
        reason: e.to_string(),
    })?;

    Ok(CompiledPattern { source, regex })
}

/// Builds the anchored regex text for `source`.
fn translate(source: &str, mode: PatternMode) -> Result<String, EngineError> {
    let mut out = String::with_capacity(source.len() * 2 + 2);
    out.push('^');

    let mut literal = String::new();
    let mut rest = source;

    while let Some(pos) = rest.find('%') {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        match placeholder(after) {
            Some((Token::Percent, used)) => {
                literal.push('%');
                rest = &after[used..];
            }
            Some((Token::Group(group), used)) => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(group);
                rest = &after[used..];
            }
            None => {
                if mode == PatternMode::Strict {
                    let shown: String = after.chars().take(1).collect();
                    return Err(EngineError::Pattern {
                        pattern: source.to_owned(),
                        reason: format!("unknown placeholder '%{shown}'"),
                    });
                }
                literal.push('%');
                rest = after;
            }
        }
    }

    literal.push_str(rest);
    out.push_str(&regex::escape(&literal));
    out.push('$');
    Ok(out)
}

enum Token {
    Percent,
    Group(&'static str),
}

/// Recognizes the placeholder right after a `%`. Returns the token and the
/// number of bytes it spans.
fn placeholder(after: &str) -> Option<(Token, usize)> {
    let bytes = after.as_bytes();
    match bytes.first()? {
        b'%' => return Some((Token::Percent, 1)),
        b'p' => return Some((Token::Group(POINTER), 1)),
        b'd' => return Some((Token::Group(SIGNED), 1)),
        b'u' => return Some((Token::Group(UNSIGNED), 1)),
        b's' => return Some((Token::Group(WORD), 1)),
        b'x' | b'X' => return Some((Token::Group(HEX), 1)),
        b'f' => return Some((Token::Group(FLOAT), 1)),
        b'h' if bytes.get(1) == Some(&b'u') => return Some((Token::Group(UNSIGNED), 2)),
        b'*' => {
            return match bytes.get(1)? {
                b's' => Some((Token::Group(ANY), 2)),
                b'$' => Some((Token::Group(ANY), 2)),
                _ => None,
            };
        }
        _ => {}
    }

    // width / precision forms: %08x, %.2f, %3.1f
    let width = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let mut i = width;
    let mut precision = false;
    if bytes.get(i) == Some(&b'.') {
        let digits = bytes[i + 1..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        precision = true;
        i += 1 + digits;
    }
    if width == 0 && !precision {
        return None;
    }
    match bytes.get(i)? {
        b'x' | b'X' if !precision => Some((Token::Group(HEX), i + 1)),
        b'f' => Some((Token::Group(FLOAT), i + 1)),
        _ => None,
    }
}

/// Values captured by a rule
///
/// Missing groups read as the empty string. Condition rules carry the
/// condition's result in [`Groups::condition`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Groups {
    values: Vec<String>,
    condition: Option<PropValue>,
}

impl Groups {
    pub fn from_values(values: Vec<String>) -> Self {
        Self {
            values,
            condition: None,
        }
    }

    pub(crate) fn with_condition(mut self, value: PropValue) -> Self {
        self.condition = Some(value);
        self
    }

    /// Group `index` (zero-based), or `""` if there is no such group.
    pub fn get(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Parses group `index` as `T`.
    pub fn parse<T>(&self, index: usize) -> Result<T, EngineError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.get(index);
        value.parse::<T>().map_err(|e| EngineError::Capture {
            index,
            value: value.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Result of the rule's condition, for condition rules.
    pub fn condition(&self) -> Option<&PropValue> {
        self.condition.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}
