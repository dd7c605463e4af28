//! Decide how a conversation resumes: who speaks next, how to finish a
//! half-typed speaker name, and how much padding the last turn needs.
//!
//! None of these fail; every edge case resolves to "no suggestion".

use crate::messages::PromptRole;
use crate::turn::Turn;

/// Propose the speaker of the next turn.
///
/// Prefers the most recent named character that is neither the user nor the
/// last speaker, so several characters take turns. Falls back to alternating
/// between `user` and `assistant`.
pub fn guess_next_speaker(turns: &[Turn], user: &str) -> Option<String> {
    let last = turns.last()?;

    if last.content.trim().is_empty() {
        return None;
    }
    // A trailing space means the same speaker keeps typing.
    if last.content.ends_with(' ') {
        return None;
    }

    let candidate = turns.iter().rev().find(|t| {
        PromptRole::from_literal(&t.name).is_none() && t.name != user && t.name != last.name
    });
    if let Some(turn) = candidate {
        return Some(turn.name.clone());
    }

    if last.name != user {
        Some(user.to_string())
    } else {
        Some(PromptRole::Assistant.as_str().to_string())
    }
}

/// Suffix that completes a half-typed speaker name on the last turn.
///
/// Only applies when the last turn's content is exactly empty, i.e. the
/// document ends right after the partial name.
pub fn autocomplete_name(turns: &[Turn], extra_names: &[&str]) -> Option<String> {
    let (last, earlier) = turns.split_last()?;
    if !last.content.is_empty() {
        return None;
    }

    let partial = last.name.as_str();
    let mut candidates = earlier.iter().rev().map(|t| t.name.as_str());

    // Already a full name.
    if candidates.clone().any(|c| c == partial) {
        return None;
    }

    candidates
        .by_ref()
        .chain(extra_names.iter().copied())
        .find(|c| c.starts_with(partial))
        .map(|c| c[partial.len()..].to_string())
}

/// Text to append to the last turn so a new speaker line can follow.
pub fn final_message_padding(content: &str) -> Option<&'static str> {
    if content.is_empty() {
        return Some("\n");
    }
    if content == "\n" {
        return None;
    }
    if content.ends_with(' ') {
        return None;
    }
    if content.ends_with("\n\n") {
        return None;
    }
    if content.ends_with('\n') {
        return Some("\n");
    }
    Some("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(pairs: &[(&str, &str)]) -> Vec<Turn> {
        pairs.iter().map(|(n, c)| Turn::new(*n, *c)).collect()
    }

    // --- guess_next_speaker ---

    #[test]
    fn no_guess_for_empty_history() {
        assert_eq!(guess_next_speaker(&[], "user"), None);
    }

    #[test]
    fn round_robin_to_other_character() {
        let t = turns(&[("A", "hello"), ("B", "hi")]);
        assert_eq!(guess_next_speaker(&t, "B").as_deref(), Some("A"));
    }

    #[test]
    fn trailing_space_means_same_speaker() {
        let t = turns(&[("user", "hi ")]);
        assert_eq!(guess_next_speaker(&t, "user"), None);
    }

    #[test]
    fn whitespace_only_content_means_no_guess() {
        assert_eq!(guess_next_speaker(&turns(&[("user", "\n")]), "user"), None);
        assert_eq!(guess_next_speaker(&turns(&[("user", "\n\t\n")]), "user"), None);
        assert_eq!(guess_next_speaker(&turns(&[("user", "")]), "user"), None);
    }

    #[test]
    fn character_answers_user() {
        let t = turns(&[("user", "\nhi\n\n"), ("Luna", "\nhello\n\n"), ("user", "\nhow are you?\n\n")]);
        assert_eq!(guess_next_speaker(&t, "user").as_deref(), Some("Luna"));
    }

    #[test]
    fn user_answers_character_when_no_other_character() {
        let t = turns(&[("user", "\nhi\n\n"), ("Luna", "\nhello\n\n")]);
        assert_eq!(guess_next_speaker(&t, "user").as_deref(), Some("user"));
    }

    #[test]
    fn alternates_to_assistant_without_characters() {
        let t = turns(&[("system", "\nrules\n\n"), ("user", "\nhi\n\n")]);
        assert_eq!(guess_next_speaker(&t, "user").as_deref(), Some("assistant"));
    }

    #[test]
    fn assistant_speaker_hands_back_to_user() {
        let t = turns(&[("user", "\nhi\n\n"), ("assistant", "\nhello\n\n")]);
        assert_eq!(guess_next_speaker(&t, "user").as_deref(), Some("user"));
    }

    #[test]
    fn picks_most_recent_other_character() {
        let t = turns(&[("A", "1"), ("B", "2"), ("user", "3"), ("C", "4")]);
        assert_eq!(guess_next_speaker(&t, "user").as_deref(), Some("B"));
    }

    // --- autocomplete_name ---

    #[test]
    fn completes_partial_name() {
        let t = turns(&[("Alice", "x"), ("Al", "")]);
        assert_eq!(autocomplete_name(&t, &[]).as_deref(), Some("ice"));
    }

    #[test]
    fn exact_name_needs_no_completion() {
        let t = turns(&[("Alice", "x"), ("Alice", "")]);
        assert_eq!(autocomplete_name(&t, &[]), None);
    }

    #[test]
    fn only_exactly_empty_content_is_completed() {
        let t = turns(&[("Alice", "x"), ("Al", "\n")]);
        assert_eq!(autocomplete_name(&t, &[]), None);
    }

    #[test]
    fn most_recent_candidate_wins() {
        let t = turns(&[("Alicia", "x"), ("Alice", "y"), ("Ali", "")]);
        assert_eq!(autocomplete_name(&t, &[]).as_deref(), Some("ce"));
    }

    #[test]
    fn extra_names_are_candidates() {
        let t = turns(&[("Luna", "x"), ("as", "")]);
        let extra = ["Bob", "system", "user", "assistant"];
        assert_eq!(autocomplete_name(&t, &extra).as_deref(), Some("sistant"));
    }

    #[test]
    fn history_names_beat_extra_names() {
        let t = turns(&[("Bobby", "x"), ("Bo", "")]);
        assert_eq!(autocomplete_name(&t, &["Bob"]).as_deref(), Some("bby"));
    }

    #[test]
    fn no_candidate_means_no_completion() {
        let t = turns(&[("Alice", "x"), ("Zed", "")]);
        assert_eq!(autocomplete_name(&t, &["user"]), None);
        assert_eq!(autocomplete_name(&[], &["user"]), None);
    }

    #[test]
    fn single_empty_turn_uses_extra_names() {
        let t = turns(&[("us", "")]);
        assert_eq!(autocomplete_name(&t, &["user"]).as_deref(), Some("er"));
    }

    // --- final_message_padding ---

    #[test]
    fn padding_rule_table() {
        assert_eq!(final_message_padding(""), Some("\n"));
        assert_eq!(final_message_padding("\n"), None);
        assert_eq!(final_message_padding("hi "), None);
        assert_eq!(final_message_padding("hi\n\n"), None);
        assert_eq!(final_message_padding("hi\n"), Some("\n"));
        assert_eq!(final_message_padding("hi"), Some("\n\n"));
    }

    #[test]
    fn padded_content_is_ready_for_a_new_speaker() {
        for content in ["\nhello", "\nhello\n", "\nhello\n\n"] {
            let mut padded = content.to_string();
            if let Some(pad) = final_message_padding(content) {
                padded.push_str(pad);
            }
            assert!(padded.ends_with("\n\n"), "not padded: {padded:?}");
            assert_eq!(final_message_padding(&padded), None);
        }
    }
}
