use crate::turn::NameSet;
use crate::SIGIL;

use super::Stage;

/// Turns `Name: text` lines into `@Name` speaker lines.
///
/// Only names in the snapshot count; anything else that looks like a prefix
/// is ordinary content. A prefix is only recognized at the start of a line,
/// never in the text following a stripped prefix or a left-trim. The first
/// non-blank text of a new speaker is left-trimmed once. A trailing partial
/// line is held back only while it could still grow into a known name.
#[derive(Debug)]
pub struct SpeakerPrefixes {
    names: NameSet,
    buffer: String,
    new_speaker: bool,
    line_start: bool,
}

impl SpeakerPrefixes {
    pub fn new(names: NameSet) -> Self {
        Self {
            names,
            buffer: String::new(),
            new_speaker: true,
            line_start: true,
        }
    }
}

impl Stage for SpeakerPrefixes {
    fn feed(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);
        let pending = std::mem::take(&mut self.buffer);

        let mut out = String::new();

        for (i, raw) in pending.split_inclusive('\n').enumerate() {
            let at_line_start = i > 0 || self.line_start;
            let mut line = raw;

            if at_line_start {
                if let Some(name) = self.names.prefix_of(line) {
                    out.push(SIGIL);
                    out.push_str(name);
                    out.push('\n');
                    line = &line[name.len() + 1..];
                    line = line.strip_prefix(' ').unwrap_or(line);
                    self.new_speaker = true;
                }
            }

            if self.new_speaker {
                line = line.trim_start();
                self.new_speaker = line.is_empty();
            }

            self.line_start = raw.ends_with('\n');
            let untouched = line.len() == raw.len();
            if !self.line_start && at_line_start && untouched && self.names.could_start(line) {
                // Still at the start of a line while held.
                self.buffer = line.to_string();
                self.line_start = true;
            } else {
                out.push_str(line);
            }
        }

        (!out.is_empty()).then_some(out)
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        (!rest.is_empty()).then_some(rest)
    }
}
