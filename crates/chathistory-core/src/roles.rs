//! Turn list -> role-tagged message list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::messages::{Message, PromptRole};
use crate::turn::Turn;
use crate::SIGIL;

/// Maps speaker names to prompt roles.
///
/// Role literals map to themselves, the configured user name maps to
/// [`PromptRole::User`], every other name is an assistant.
#[derive(Clone, Debug)]
pub struct NameMap {
    roles: HashMap<String, PromptRole>,
}

impl NameMap {
    pub fn new(user: &str) -> Self {
        let mut roles: HashMap<String, PromptRole> = PromptRole::ALL
            .into_iter()
            .map(|r| (r.as_str().to_string(), r))
            .collect();
        roles.insert(user.to_string(), PromptRole::User);
        Self { roles }
    }

    pub fn role_of(&self, name: &str) -> PromptRole {
        self.roles.get(name).copied().unwrap_or(PromptRole::Assistant)
    }
}

/// Where trailing-empty-assistant removal runs relative to role merging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyTailRemoval {
    BeforeMerge,
    #[default]
    AfterMerge,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MappingOptions {
    pub prefix_with_name: bool,
    pub merge_repeated_roles: bool,
    pub empty_tail: EmptyTailRemoval,
}

/// Runs the full turn -> message pipeline with the configured transforms.
#[derive(Clone, Debug)]
pub struct MessageMapper {
    names: NameMap,
    options: MappingOptions,
}

impl MessageMapper {
    pub fn new(user: &str, options: MappingOptions) -> Self {
        Self {
            names: NameMap::new(user),
            options,
        }
    }

    pub fn map(&self, turns: &[Turn]) -> Vec<Message> {
        let mut turns = turns.to_vec();
        if self.options.prefix_with_name {
            prefix_with_names(&mut turns);
        }

        let mut messages = to_messages(&turns, &self.names);

        // A named user line is text the backend has to continue.
        if self.options.prefix_with_name {
            if let Some(last) = messages.last_mut() {
                if last.role == PromptRole::User {
                    last.role = PromptRole::Assistant;
                }
            }
        }

        match self.options.empty_tail {
            EmptyTailRemoval::BeforeMerge => {
                drop_empty_assistant_tail(&mut messages);
                if self.options.merge_repeated_roles {
                    messages = merge_repeated_roles(messages);
                }
            }
            EmptyTailRemoval::AfterMerge => {
                if self.options.merge_repeated_roles {
                    messages = merge_repeated_roles(messages);
                }
                drop_empty_assistant_tail(&mut messages);
            }
        }

        mark_continuation(&mut messages);
        messages
    }
}

/// Rewrite non-role speakers' content as `"name: content"`.
pub fn prefix_with_names(turns: &mut [Turn]) {
    for turn in turns {
        if PromptRole::from_literal(&turn.name).is_some() {
            continue;
        }
        let mut content = format!("{}:", turn.name);
        if !turn.content.is_empty() {
            content.push(' ');
            content.push_str(&turn.content);
        }
        turn.content = content;
    }
}

pub fn to_messages(turns: &[Turn], names: &NameMap) -> Vec<Message> {
    turns
        .iter()
        .map(|t| Message::new(names.role_of(&t.name), t.content.clone()))
        .collect()
}

/// Join adjacent messages that share a role, newline-separated, in order.
pub fn merge_repeated_roles(messages: Vec<Message>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(prev) if prev.role == message.role => {
                prev.content.push('\n');
                prev.content.push_str(&message.content);
            }
            _ => merged.push(message),
        }
    }
    merged
}

/// Drop a final empty assistant message; it is an unstarted continuation slot.
pub fn drop_empty_assistant_tail(messages: &mut Vec<Message>) {
    if messages
        .last()
        .is_some_and(|m| m.role == PromptRole::Assistant && m.content.is_empty())
    {
        messages.pop();
    }
}

/// Flag a final assistant message so the backend continues it.
pub fn mark_continuation(messages: &mut [Message]) {
    if let Some(last) = messages.last_mut() {
        if last.role == PromptRole::Assistant {
            last.prefix = Some(true);
        }
    }
}

/// Render messages back into chat-history markup, one block per message.
pub fn messages_to_chathistory(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        out.push(SIGIL);
        out.push_str(message.role.as_str());
        out.push('\n');
        out.push_str(&message.content);
        out.push_str("\n\n");
    }
    out
}

/// Render turns as markdown, one `### name` heading per turn.
///
/// Content is written as is; callers trim it first.
pub fn turns_to_markdown(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        out.push_str("### ");
        out.push_str(&turn.name);
        out.push('\n');
        out.push_str(&turn.content);
        out.push_str("\n\n");
    }
    out
}
