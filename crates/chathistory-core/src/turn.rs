use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One speaker's utterance as it appears in the document.
///
/// `content` is everything after the speaker name up to the next speaker
/// line, so it keeps the line break that ends the name line. A document
/// ending in `"@Lun"` has content `""`, one ending in `"@Luna\n"` has `"\n"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub name: String,
    pub content: String,
}

impl Turn {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Copy of this turn with leading and trailing newlines removed from the content.
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.clone(),
            content: self.content.trim_matches('\n').to_string(),
        }
    }
}

/// Distinct speaker names of one turn sequence.
///
/// Built once per generation request and never mutated afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    pub fn from_turns(turns: &[Turn]) -> Self {
        turns.iter().map(|t| t.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// True when some known name starts with `partial`.
    pub fn could_start(&self, partial: &str) -> bool {
        self.names.iter().any(|n| n.starts_with(partial))
    }

    /// Longest known name `line` starts with, immediately followed by a colon.
    pub fn prefix_of(&self, line: &str) -> Option<&str> {
        self.names
            .iter()
            .filter(|n| !n.is_empty())
            .filter(|n| {
                line.strip_prefix(n.as_str())
                    .is_some_and(|rest| rest.starts_with(':'))
            })
            .max_by_key(|n| n.len())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}
