use serde_json::{Map, Value};

use crate::codec;
use crate::errors::HistoryError;
use crate::turn::Turn;

const DELIMITER: &str = "---";

/// A persisted chat-history file: optional front matter plus the turn body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    /// Inline settings from the front matter block.
    pub settings: Map<String, Value>,
    pub body: String,
}

impl Document {
    /// Split `text` into front matter and body.
    ///
    /// Text starting with `---` must close the block with a `---` line and
    /// the block must be a YAML mapping. Text without front matter is all body.
    pub fn parse(text: &str) -> Result<Self, HistoryError> {
        let Some(rest) = text.strip_prefix(DELIMITER) else {
            return Ok(Self {
                settings: Map::new(),
                body: text.to_string(),
            });
        };

        let rest = rest
            .strip_prefix('\n')
            .ok_or(HistoryError::UnterminatedFrontMatter)?;
        let (yaml, body) = split_front_matter(rest).ok_or(HistoryError::UnterminatedFrontMatter)?;

        Ok(Self {
            settings: parse_settings(yaml)?,
            body: body.to_string(),
        })
    }

    pub fn turns(&self) -> Vec<Turn> {
        codec::parse(&self.body)
    }
}

/// Returns `(yaml, body)` split at the closing delimiter line.
fn split_front_matter(rest: &str) -> Option<(&str, &str)> {
    if let Some(body) = rest.strip_prefix("---\n") {
        return Some(("", body));
    }
    if rest == DELIMITER {
        return Some(("", ""));
    }
    if let Some(pos) = rest.find("\n---\n") {
        return Some((&rest[..=pos], &rest[pos + 5..]));
    }
    rest.strip_suffix("\n---").map(|yaml| (yaml, ""))
}

fn parse_settings(yaml: &str) -> Result<Map<String, Value>, HistoryError> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_yaml_ng::from_str(yaml)
        .map_err(|e| HistoryError::InvalidFrontMatter(e.to_string()))?;
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(HistoryError::InvalidFrontMatter(format!(
            "expected a mapping, found {other}"
        ))),
    }
}
