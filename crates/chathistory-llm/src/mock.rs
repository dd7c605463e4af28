use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use chathistory_core::backend::{Fragment, FragmentStream, GenerationBackend, GenerationRequest};
use chathistory_core::errors::BackendError;

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum Script {
    /// Yield these items, then end.
    Fragments(Vec<Result<Fragment, BackendError>>),
    /// Yield these items, then never end.
    Stall(Vec<Result<Fragment, BackendError>>),
    /// Return an error from `generate` itself.
    Error(BackendError),
    /// Wait a duration, then resolve the inner script.
    Delay(Duration, Box<Script>),
}

impl Script {
    /// Content fragments, in order.
    pub fn text<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fragments(fragments.into_iter().map(|f| Ok(Fragment::content(f))).collect())
    }

    pub fn delayed(delay: Duration, inner: Script) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Backend that plays back one [`Script`] per call and records every request.
pub struct ScriptedBackend {
    scripts: Vec<Script>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let Some(script) = self.scripts.get(idx) else {
            return Err(BackendError::InvalidRequest(format!(
                "ScriptedBackend: no script configured for call {idx}"
            )));
        };
        resolve_script(script.clone()).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_script(script: Script) -> Result<FragmentStream, BackendError> {
    let mut current = script;
    loop {
        match current {
            Script::Fragments(items) => return Ok(Box::pin(stream::iter(items))),
            Script::Stall(items) => return Ok(Box::pin(stream::iter(items).chain(stream::pending()))),
            Script::Error(e) => return Err(e),
            Script::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathistory_core::messages::Message;

    async fn drain(stream: FragmentStream) -> Vec<Result<Fragment, BackendError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn plays_scripts_in_order() {
        let backend = ScriptedBackend::new(vec![Script::text(["a", "b"]), Script::text(["c"])]);
        let request = GenerationRequest::default();

        let first = drain(backend.generate(&request).await.unwrap()).await;
        assert_eq!(first.len(), 2);
        let second = drain(backend.generate(&request).await.unwrap()).await;
        assert_eq!(second[0].as_ref().unwrap(), &Fragment::content("c"));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_scripts_error() {
        let backend = ScriptedBackend::new(vec![]);
        let result = backend.generate(&GenerationRequest::default()).await;
        assert!(matches!(result, Err(BackendError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn error_script() {
        let backend = ScriptedBackend::new(vec![Script::Error(BackendError::Network("down".into()))]);
        let result = backend.generate(&GenerationRequest::default()).await;
        assert!(matches!(result, Err(BackendError::Network(_))));
    }

    #[tokio::test]
    async fn records_requests() {
        let backend = ScriptedBackend::new(vec![Script::text(["ok"])]);
        let request = GenerationRequest::new(vec![Message::user("hi")]);
        let _ = backend.generate(&request).await.unwrap();
        assert_eq!(backend.requests()[0].messages, request.messages);
    }

    #[tokio::test]
    async fn delay_waits_before_resolving() {
        tokio::time::pause();
        let backend = ScriptedBackend::new(vec![Script::delayed(
            Duration::from_secs(10),
            Script::text(["late"]),
        )]);
        let start = tokio::time::Instant::now();
        let items = drain(backend.generate(&GenerationRequest::default()).await.unwrap()).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn stall_never_ends() {
        tokio::time::pause();
        let backend = ScriptedBackend::new(vec![Script::Stall(vec![Ok(Fragment::content("x"))])]);
        let mut stream = backend.generate(&GenerationRequest::default()).await.unwrap();
        assert!(stream.next().await.is_some());
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next()).await;
        assert!(next.is_err());
    }
}
