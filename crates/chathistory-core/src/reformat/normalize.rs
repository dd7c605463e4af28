use std::sync::OnceLock;

use regex::Regex;

use crate::SIGIL;

fn spaces_before_newline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +\n").expect("static regex"))
}

/// Per-fragment whitespace cleanup.
///
/// Removes spaces before line breaks and makes sure every speaker line is
/// preceded by a blank line. A fragment starting with `"\n@"` gets the extra
/// line break too, since the previous fragment cannot have ended in
/// whitespace. Idempotent.
pub fn normalize_whitespace(text: &str) -> String {
    let text = spaces_before_newline().replace_all(text, "\n");

    let mut out = String::with_capacity(text.len() + 2);
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if c == '\n' && prev != Some('\n') && text[i + 1..].starts_with(SIGIL) {
            out.push('\n');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_spaces_before_newlines() {
        assert_eq!(normalize_whitespace("a   \nb \n"), "a\nb\n");
    }

    #[test]
    fn keeps_other_spaces() {
        assert_eq!(normalize_whitespace("a  b \t\n"), "a  b \t\n");
    }

    #[test]
    fn speaker_line_gets_blank_line() {
        assert_eq!(normalize_whitespace("Hi.\n@Bob\nYo"), "Hi.\n\n@Bob\nYo");
    }

    #[test]
    fn already_blank_line_is_kept() {
        assert_eq!(normalize_whitespace("Hi.\n\n@Bob\nYo"), "Hi.\n\n@Bob\nYo");
    }

    #[test]
    fn fragment_starting_with_speaker_line() {
        assert_eq!(normalize_whitespace("\n@Bob\n"), "\n\n@Bob\n");
        assert_eq!(normalize_whitespace("@Bob\n"), "@Bob\n");
    }

    #[test]
    fn adjacent_speaker_lines() {
        let once = normalize_whitespace("x\n@A\n@B\n");
        assert_eq!(once, "x\n\n@A\n\n@B\n");
        assert_eq!(normalize_whitespace(&once), once);
    }

    #[test]
    fn sigil_mid_line_is_untouched() {
        assert_eq!(normalize_whitespace("mail a@b.c\n"), "mail a@b.c\n");
    }

    #[test]
    fn space_removal_exposes_speaker_line() {
        assert_eq!(normalize_whitespace("Hi.  \n@Bob"), "Hi.\n\n@Bob");
    }
}
