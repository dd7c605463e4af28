use super::Stage;

/// Withholds trailing whitespace until non-whitespace text follows it.
///
/// A whitespace run is therefore never split across two output fragments,
/// which is what lets [`normalize_whitespace`](super::normalize_whitespace)
/// work one fragment at a time.
#[derive(Debug, Default)]
pub struct WhitespaceBuffer {
    held: String,
}

impl WhitespaceBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stage for WhitespaceBuffer {
    fn feed(&mut self, fragment: &str) -> Option<String> {
        self.held.push_str(fragment);
        let split = self.held.trim_end().len();
        if split == 0 {
            return None;
        }
        let trailing = self.held.split_off(split);
        Some(std::mem::replace(&mut self.held, trailing))
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.held);
        (!rest.is_empty()).then_some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_trailing_whitespace() {
        let mut stage = WhitespaceBuffer::new();
        assert_eq!(stage.feed("Hello.\n").as_deref(), Some("Hello."));
        assert_eq!(stage.feed("\n").as_deref(), None);
        assert_eq!(stage.feed("@Bob").as_deref(), Some("\n\n@Bob"));
    }

    #[test]
    fn plain_text_passes_straight_through() {
        let mut stage = WhitespaceBuffer::new();
        assert_eq!(stage.feed("a b").as_deref(), Some("a b"));
        assert_eq!(stage.finish(), None);
    }

    #[test]
    fn flushes_held_whitespace_at_end() {
        let mut stage = WhitespaceBuffer::new();
        assert_eq!(stage.feed("done \n").as_deref(), Some("done"));
        assert_eq!(stage.finish().as_deref(), Some(" \n"));
    }

    #[test]
    fn interior_whitespace_is_not_held() {
        let mut stage = WhitespaceBuffer::new();
        assert_eq!(stage.feed("a\n\nb\nc  ").as_deref(), Some("a\n\nb\nc"));
        assert_eq!(stage.feed("d").as_deref(), Some("  d"));
    }
}
