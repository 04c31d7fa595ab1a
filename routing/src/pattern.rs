use crate::errors::CompileError;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    StarSeen,
    ParamSeen { start: usize },
}

const SEGMENT_WILDCARD: &str = "[^/]*";
const RECURSIVE_WILDCARD: &str = ".*";

/// A compiled path glob.
///
/// Grammar:
/// - `*` matches within one segment
/// - `**` matches across segments
/// - `{name}` matches one segment, like `*`
///
/// The whole path has to match. Specificity counts the literal `/` of the
/// source, plus one when the last segment carries a literal `.`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    specificity: usize,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let mut expr = String::with_capacity(source.len() * 2 + 2);
        expr.push('^');

        let mut state = State::Initial;
        let mut slashes = 0;
        let mut dot_in_last_segment = false;

        for (offset, c) in source.char_indices() {
            if state == State::StarSeen {
                if c == '*' {
                    expr.push_str(RECURSIVE_WILDCARD);
                    state = State::Initial;
                    continue;
                }
                expr.push_str(SEGMENT_WILDCARD);
                state = State::Initial;
            }

            match state {
                State::ParamSeen { .. } => match c {
                    '}' => {
                        expr.push_str(SEGMENT_WILDCARD);
                        state = State::Initial;
                    }
                    '/' | '{' => {
                        return Err(CompileError::UnexpectedChar {
                            pattern: source.to_owned(),
                            offset,
                            found: c,
                        });
                    }
                    _ => {}
                },
                _ => match c {
                    '*' => state = State::StarSeen,
                    '{' => state = State::ParamSeen { start: offset },
                    '/' => {
                        expr.push('/');
                        slashes += 1;
                        dot_in_last_segment = false;
                    }
                    '.' => {
                        expr.push_str("\\.");
                        dot_in_last_segment = true;
                    }
                    _ => {
                        let mut buf = [0u8; 4];
                        expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                    }
                },
            }
        }

        match state {
            State::StarSeen => expr.push_str(SEGMENT_WILDCARD),
            State::ParamSeen { start } => {
                return Err(CompileError::UnterminatedParam {
                    pattern: source.to_owned(),
                    offset: start,
                });
            }
            State::Initial => {}
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source_err| CompileError::Regex {
            pattern: source.to_owned(),
            source: source_err,
        })?;

        Ok(Self {
            source: source.to_owned(),
            regex,
            specificity: slashes + usize::from(dot_in_last_segment),
        })
    }

    /// Full-string match against a request path (no query string).
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn specificity(&self) -> usize {
        self.specificity
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Converts the glob into router path syntax.
    ///
    /// Wildcard segments become numbered captures, left to right from 0:
    /// `*` turns into `{paramN}` and `**` into the remainder capture
    /// `{paramN:.+}`. Named segments are kept as they are.
    pub fn router_path(&self) -> String {
        let mut next = 0;
        let mut capture = |remainder: bool| {
            let name = format!("param{next}");
            next += 1;
            if remainder {
                format!("{{{name}:.+}}")
            } else {
                format!("{{{name}}}")
            }
        };

        self.source
            .split('/')
            .map(|segment| {
                if segment == "**" {
                    capture(true)
                } else if segment == "*" {
                    capture(false)
                } else if let Some(prefix) = segment.strip_suffix("**") {
                    format!("{prefix}{}", capture(true))
                } else if let Some(prefix) = segment.strip_suffix('*') {
                    format!("{prefix}{}", capture(false))
                } else {
                    segment.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
