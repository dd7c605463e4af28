//! Streaming reformatter: raw generated text -> chat-history markup.
//!
//! Fragments pass through three stages in order:
//!
//! 1. [`SpeakerPrefixes`]: `Name: ` line prefixes become `@Name` lines
//! 2. [`WhitespaceBuffer`]: trailing whitespace is held until confirmed
//! 3. [`normalize_whitespace`]: per-fragment whitespace cleanup
//!
//! Stages only ever hold text back; they never reorder it and never drop
//! anything but whitespace.

mod buffer;
mod normalize;
mod prefix;

pub use buffer::WhitespaceBuffer;
pub use normalize::normalize_whitespace;
pub use prefix::SpeakerPrefixes;

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

use crate::turn::NameSet;

/// One buffering step of the reformatter.
pub trait Stage {
    /// Accept the next fragment; returns whatever is safe to emit now.
    fn feed(&mut self, fragment: &str) -> Option<String>;
    /// Upstream ended; release everything still held.
    fn finish(&mut self) -> Option<String>;
}

/// The three stages chained together.
#[derive(Debug)]
pub struct Reformatter {
    prefixes: SpeakerPrefixes,
    whitespace: WhitespaceBuffer,
}

impl Reformatter {
    pub fn new(names: NameSet) -> Self {
        Self {
            prefixes: SpeakerPrefixes::new(names),
            whitespace: WhitespaceBuffer::new(),
        }
    }

    pub fn feed(&mut self, fragment: &str) -> Option<String> {
        let text = self.prefixes.feed(fragment)?;
        self.whitespace
            .feed(&text)
            .map(|text| normalize_whitespace(&text))
    }

    pub fn finish(mut self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(text) = self.prefixes.finish() {
            out.extend(self.whitespace.feed(&text));
        }
        out.extend(self.whitespace.finish());
        out.iter().map(|text| normalize_whitespace(text)).collect()
    }

    /// Run a complete fragment sequence through a fresh pipeline.
    pub fn reformat_all<'a>(names: NameSet, fragments: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut reformatter = Self::new(names);
        let mut out: Vec<String> = fragments
            .into_iter()
            .filter_map(|f| reformatter.feed(f))
            .collect();
        out.extend(reformatter.finish());
        out
    }

    /// Lazily reformat a fallible fragment stream.
    ///
    /// The first upstream error is passed through and ends the stream; text
    /// still held by the stages at that point is discarded.
    pub fn reformat_stream<S, E>(names: NameSet, fragments: S) -> ReformatStream<S>
    where
        S: Stream<Item = Result<String, E>>,
    {
        ReformatStream {
            inner: fragments,
            reformatter: Some(Self::new(names)),
            pending: VecDeque::new(),
        }
    }
}

pin_project! {
    /// Stream adapter returned by [`Reformatter::reformat_stream`].
    ///
    /// Pulls upstream only when it has nothing buffered to yield; dropping it
    /// discards whatever the stages were holding.
    pub struct ReformatStream<S> {
        #[pin]
        inner: S,
        reformatter: Option<Reformatter>,
        pending: VecDeque<String>,
    }
}

impl<S, E> Stream for ReformatStream<S>
where
    S: Stream<Item = Result<String, E>>,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(text) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(text)));
            }
            let Some(reformatter) = this.reformatter.as_mut() else {
                return Poll::Ready(None);
            };
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(fragment))) => {
                    this.pending.extend(reformatter.feed(&fragment));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.reformatter = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    if let Some(reformatter) = this.reformatter.take() {
                        this.pending.extend(reformatter.finish());
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
