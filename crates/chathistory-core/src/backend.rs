use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::BackendError;
use crate::messages::Message;

/// One increment of generated output.
///
/// `content` is conversation text and goes through the reformatter. `aside`
/// carries side-channel output such as reasoning, which is logged but never
/// written into the document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub content: Option<String>,
    pub aside: Option<String>,
}

impl Fragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            aside: None,
        }
    }

    pub fn aside(text: impl Into<String>) -> Self {
        Self {
            content: None,
            aside: Some(text.into()),
        }
    }
}

/// Everything a backend needs to produce one continuation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// Extra request properties (model, sampling parameters, ...) passed through verbatim.
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            props: Map::new(),
        }
    }

    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, BackendError>> + Send>>;

/// A text-generation service that continues a message list.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_flattens_props_next_to_messages() {
        let mut props = Map::new();
        props.insert("model".into(), Value::from("local"));
        props.insert("temperature".into(), Value::from(0.7));
        let request = GenerationRequest::new(vec![Message::user("hi")]).with_props(props);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "local");
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn fragment_constructors() {
        assert_eq!(Fragment::content("x").content.as_deref(), Some("x"));
        assert!(Fragment::content("x").aside.is_none());
        assert_eq!(Fragment::aside("y").aside.as_deref(), Some("y"));
        assert!(Fragment::aside("y").content.is_none());
    }
}
