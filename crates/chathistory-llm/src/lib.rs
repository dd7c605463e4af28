//! Generation backends.
//!
//! [`OpenAiChatBackend`] talks to OpenAI-compatible chat completion servers;
//! [`ScriptedBackend`] plays back canned fragments for tests.

pub mod mock;
pub mod openai;
pub mod sse;

pub use mock::{Script, ScriptedBackend};
pub use openai::OpenAiChatBackend;
