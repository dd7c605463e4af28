//! Settings schema with compiled defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chathistory_core::roles::{EmptyTailRemoval, MappingOptions};

/// Wire protocol used to talk to the generation backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiMode {
    /// OpenAI-compatible `/chat/completions` with server-sent events.
    #[default]
    #[serde(rename = "openai-chat")]
    OpenAiChat,
}

/// Effective settings of one session.
///
/// Every field has a default, so any subset of keys may appear in a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// When false the session does nothing.
    pub active: bool,
    /// Display name of the human participant.
    pub user: String,
    pub api_mode: ApiMode,
    pub api_url: Option<String>,
    pub api_call_headers: BTreeMap<String, String>,
    /// Merged verbatim into the request body (model, temperature, ...).
    pub api_call_props: Map<String, Value>,
    pub prefix_messages_with_name: bool,
    pub add_final_message_padding: bool,
    pub guess_next_speaker: bool,
    /// Merge adjacent messages that share a role.
    pub enforce_nonrepeating_roles: bool,
    pub postfix_output_with_user: bool,
    pub empty_tail_removal: EmptyTailRemoval,
    /// Resolved against the template directory. Empty disables it.
    pub system_prompt_file: String,
    /// Where per-request debug artifacts go. Unset disables them.
    pub debug_dir: Option<PathBuf>,
    pub profile: Option<String>,
    pub profiles: BTreeMap<String, Map<String, Value>>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            active: true,
            user: "user".to_string(),
            api_mode: ApiMode::OpenAiChat,
            api_url: None,
            api_call_headers: BTreeMap::new(),
            api_call_props: Map::new(),
            prefix_messages_with_name: false,
            add_final_message_padding: true,
            guess_next_speaker: true,
            enforce_nonrepeating_roles: false,
            postfix_output_with_user: true,
            empty_tail_removal: EmptyTailRemoval::AfterMerge,
            system_prompt_file: "sys-prompt.txt".to_string(),
            debug_dir: None,
            profile: None,
            profiles: BTreeMap::new(),
        }
    }
}

impl ChatSettings {
    pub fn mapping_options(&self) -> MappingOptions {
        MappingOptions {
            prefix_with_name: self.prefix_messages_with_name,
            merge_repeated_roles: self.enforce_nonrepeating_roles,
            empty_tail: self.empty_tail_removal,
        }
    }

    pub fn system_prompt_file(&self) -> Option<&str> {
        (!self.system_prompt_file.is_empty()).then_some(self.system_prompt_file.as_str())
    }
}
