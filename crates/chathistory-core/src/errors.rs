/// Structural problems in a persisted chat-history document. Fatal to a session.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("front matter is missing its closing `---` line")]
    UnterminatedFrontMatter,
    #[error("front matter is not a key-value mapping: {0}")]
    InvalidFrontMatter(String),
    #[error("history must start with a `@name` line")]
    MissingSigil,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("refusing to read outside the template directory: {0}")]
    UnsafePath(String),
    #[error("failed to read template include {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the generation backend.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed fragment payload: {0}")]
    MalformedPayload(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether the failure means the backend could not be reached or stopped answering.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Status { .. }
                | Self::StreamInterrupted(_)
                | Self::MalformedPayload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_classification() {
        assert!(BackendError::Network("refused".into()).is_unavailable());
        assert!(BackendError::Status { status: 502, body: "bad gateway".into() }.is_unavailable());
        assert!(BackendError::MalformedPayload("eof".into()).is_unavailable());
        assert!(BackendError::StreamInterrupted("idle".into()).is_unavailable());
        assert!(!BackendError::InvalidRequest("no url".into()).is_unavailable());
    }

    #[test]
    fn history_error_display() {
        assert_eq!(
            HistoryError::MissingSigil.to_string(),
            "history must start with a `@name` line"
        );
    }
}
