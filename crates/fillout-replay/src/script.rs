use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use fillout_questions::{AnswerForm, SCREEN_ID_FIELD};

/// Line that closes one recorded step
pub const STEP_SEPARATOR: &str = "---";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReplayParseError {
    #[error("Line {line}: expected key=value, found {content:?}")]
    MalformedLine { line: usize, content: String },
}

/// Ordered answer submissions captured from a recorded session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayScript {
    steps: Vec<AnswerForm>,
}

impl ReplayScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a replay file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;

        let script = Self::parse(&content)
            .with_context(|| format!("Failed to parse replay file {}", path.display()))?;

        debug!(path = %path.display(), steps = script.len(), "Loaded replay script");
        Ok(script)
    }

    pub fn parse(text: &str) -> Result<Self, ReplayParseError> {
        let mut script = Self::new();
        let mut current = AnswerForm::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');

            if line == STEP_SEPARATOR {
                if !current.is_empty() {
                    script.steps.push(std::mem::take(&mut current));
                }
                continue;
            }

            if line.trim().is_empty() {
                continue;
            }

            let (key, values) = line
                .split_once('=')
                .ok_or_else(|| ReplayParseError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                })?;

            let key = unescape(key);
            for value in split_values(values) {
                current.add(key.clone(), unescape(value));
            }
        }

        // Tolerate a final step without its closing separator
        if !current.is_empty() {
            script.steps.push(current);
        }

        Ok(script)
    }

    pub fn step(&self, index: usize) -> Option<&AnswerForm> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render one step, including its closing separator line
    pub fn format_step(step: &AnswerForm) -> String {
        let mut out = String::new();
        for (key, values) in step.fields() {
            if key == SCREEN_ID_FIELD {
                continue;
            }
            let joined: Vec<String> = values.iter().map(|v| escape(v)).collect();
            out.push_str(&escape(key));
            out.push('=');
            out.push_str(&joined.join(","));
            out.push('\n');
        }
        out.push_str(STEP_SEPARATOR);
        out.push('\n');
        out
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            ',' => escaped.push_str("\\,"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Split a value list on commas that are not escaped
fn split_values(raw: &str) -> Vec<&str> {
    let mut values = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (index, c) in raw.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                values.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    values.push(&raw[start..]);
    values
}

fn unescape(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('\\') => unescaped.push('\\'),
            Some(',') => unescaped.push(','),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let raw = "line one\r\nline two \\ done";
        assert_eq!(escape(raw), "line one\\r\\nline two \\\\ done");
        assert_eq!(unescape(&escape(raw)), raw);
    }

    #[test]
    fn test_split_values_respects_escaped_commas() {
        assert_eq!(split_values("1,4,6"), ["1", "4", "6"]);
        assert_eq!(split_values("Yes\\, I agree,No"), ["Yes\\, I agree", "No"]);
        assert_eq!(split_values("C:\\\\,x"), ["C:\\\\", "x"]);
        assert_eq!(split_values(""), [""]);
    }

    #[test]
    fn test_unknown_escape_is_kept() {
        assert_eq!(unescape("C:\\temp\\"), "C:\\temp\\");
    }
}
