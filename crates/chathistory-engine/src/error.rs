use chathistory_core::errors::{BackendError, TemplateError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session aborted")]
    Aborted,
}

impl SessionError {
    /// Whether retrying later might succeed.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_unavailable())
    }
}
