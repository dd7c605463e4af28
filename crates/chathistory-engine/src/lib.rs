//! Session driver: heuristics, templates, generation and reformatting for
//! one continuation of a chat-history document, plus its markdown export.

pub mod error;
pub mod export;
pub mod session;
pub mod templates;

pub use error::SessionError;
pub use export::{export_markdown, MARKDOWN_FILE};
pub use session::{RunSummary, Session};
pub use templates::PlainTemplates;
