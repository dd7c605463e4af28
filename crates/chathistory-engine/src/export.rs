//! Read-only markdown view of a chat-history document.

use chathistory_core::roles::turns_to_markdown;
use chathistory_core::Turn;
use tracing::debug;

/// File name the CLI writes the markdown view to.
pub const MARKDOWN_FILE: &str = "_markdown.md";

/// Render `turns` as markdown with `{{user}}` filled in and every turn's
/// content stripped of surrounding line breaks.
pub fn export_markdown(turns: &[Turn], user: &str) -> String {
    let rendered: Vec<Turn> = turns
        .iter()
        .map(|turn| {
            let content = if user.is_empty() {
                turn.content.clone()
            } else {
                turn.content.replace("{{user}}", user)
            };
            Turn::new(turn.name.as_str(), content).trimmed()
        })
        .collect();
    debug!(turns = rendered.len(), "exporting markdown");
    turns_to_markdown(&rendered)
}
