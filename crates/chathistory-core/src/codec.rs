//! Chat-history text <-> turn list.
//!
//! A speaker line is `@` at the start of a line followed by the speaker name.
//! Everything after the name up to the next speaker line is that turn's
//! content, line breaks included.

use crate::errors::HistoryError;
use crate::messages::PromptRole;
use crate::turn::Turn;
use crate::SIGIL;

/// Parse a document body into turns.
///
/// Text that does not start with a speaker line becomes a single `user` turn,
/// so hand-typed documents without markup still work.
pub fn parse(text: &str) -> Vec<Turn> {
    if text.is_empty() {
        return Vec::new();
    }
    if !text.starts_with(SIGIL) {
        return vec![Turn::new(PromptRole::User.as_str(), text)];
    }
    split_turns(text)
}

/// Like [`parse`], but a non-empty body must start with a speaker line.
pub fn parse_strict(text: &str) -> Result<Vec<Turn>, HistoryError> {
    if !text.is_empty() && !text.starts_with(SIGIL) {
        return Err(HistoryError::MissingSigil);
    }
    Ok(split_turns(text))
}

/// Render turns as `@name\ncontent\n\n` blocks.
pub fn serialize(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push(SIGIL);
        out.push_str(&turn.name);
        out.push('\n');
        out.push_str(&turn.content);
        out.push_str("\n\n");
    }
    out
}

fn split_turns(text: &str) -> Vec<Turn> {
    let markers = marker_offsets(text);
    let mut turns = Vec::with_capacity(markers.len());

    for (i, &start) in markers.iter().enumerate() {
        let end = markers.get(i + 1).copied().unwrap_or(text.len());
        let segment = &text[start + SIGIL.len_utf8()..end];
        let name_len = segment.find('\n').unwrap_or(segment.len());
        let (name, content) = segment.split_at(name_len);
        turns.push(Turn::new(name, content));
    }

    turns
}

/// Byte offsets of every line that starts with the sigil.
fn marker_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with(SIGIL) {
            offsets.push(line_start);
        }
        line_start += line.len();
    }
    offsets
}
