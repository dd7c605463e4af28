pub mod backend;
pub mod codec;
pub mod document;
pub mod errors;
pub mod heuristics;
pub mod messages;
pub mod reformat;
pub mod roles;
pub mod template;
pub mod turn;

/// Character that starts a speaker line in a chat-history document.
pub const SIGIL: char = '@';

pub use document::Document;
pub use errors::{BackendError, HistoryError, TemplateError};
pub use messages::{Message, PromptRole};
pub use turn::{NameSet, Turn};
