use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use futures::{future, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use chathistory_core::backend::{GenerationBackend, GenerationRequest};
use chathistory_core::heuristics;
use chathistory_core::messages::PromptRole;
use chathistory_core::reformat::Reformatter;
use chathistory_core::roles::{messages_to_chathistory, MessageMapper};
use chathistory_core::template::{resolve_local_path, TemplateContext, TemplateRenderer};
use chathistory_core::{NameSet, Turn, SIGIL};
use chathistory_settings::ChatSettings;
use chathistory_telemetry::{self as artifacts, ArtifactLog};

use crate::error::SessionError;
use crate::templates::PlainTemplates;

/// Counts describing one finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Text written before generation started (completion, padding, speaker line).
    pub prelude: String,
    /// Reformatted fragments written.
    pub fragments: usize,
    /// Whether the closing user line was written.
    pub postfixed: bool,
}

/// Continues one chat-history document by one generation request.
pub struct Session {
    settings: ChatSettings,
    backend: Arc<dyn GenerationBackend>,
    renderer: Arc<dyn TemplateRenderer>,
    template_dir: PathBuf,
    artifacts: ArtifactLog,
}

/// What gets sent to the backend, derived from the padded turn list.
struct Prepared {
    request: GenerationRequest,
    names: NameSet,
}

impl Session {
    pub fn new(settings: ChatSettings, backend: Arc<dyn GenerationBackend>) -> Self {
        let artifacts = match &settings.debug_dir {
            Some(dir) => ArtifactLog::in_dir(dir),
            None => ArtifactLog::disabled(),
        };
        Self {
            settings,
            backend,
            renderer: Arc::new(PlainTemplates),
            template_dir: PathBuf::from("."),
            artifacts,
        }
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Write the continuation of `turns` to `out`.
    ///
    /// Everything written is flushed immediately, so an interrupted run leaves
    /// a valid prefix of its output behind.
    #[instrument(skip_all, fields(backend = %self.backend.name(), turns = turns.len()))]
    pub async fn run<W>(
        &self,
        mut turns: Vec<Turn>,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SessionError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.write_config_artifact();
        if !self.settings.active {
            info!("session inactive, nothing to do");
            return Ok(RunSummary::default());
        }

        let prelude = self.extend_history(&mut turns);
        let mut tail = DocumentTail::default();
        if let Some(last) = turns.last() {
            tail.push(&format!("{SIGIL}{}{}", last.name, last.content));
        }
        if !prelude.is_empty() {
            write_flushed(out, &prelude).await?;
        }

        let Prepared { request, names } = self.prepare(turns).await?;

        info!(messages = request.messages.len(), "sending request");
        let stream = self.backend.generate(&request).await?;

        let mut response = self.artifacts.stream(artifacts::RESPONSE);
        let mut thinking = self.artifacts.stream(artifacts::THINKING);
        let content = stream.filter_map(|item| {
            let item = item.map(|fragment| {
                if let Some(aside) = &fragment.aside {
                    thinking.append(aside);
                    debug!(len = aside.len(), "aside fragment");
                }
                if let Some(content) = &fragment.content {
                    response.append(content);
                }
                fragment.content
            });
            future::ready(item.transpose())
        });
        let mut reformatted = pin!(Reformatter::reformat_stream(names, content));
        let mut fragments = 0;

        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(fragments, "session cancelled, discarding buffered output");
                    return Err(SessionError::Aborted);
                }
                item = reformatted.next() => item,
            };
            let Some(text) = item else { break };
            let text = text?;
            tail.push(&text);
            write_flushed(out, &text).await?;
            fragments += 1;
        }

        let postfixed = self.settings.postfix_output_with_user;
        if postfixed {
            let postfix = format!("{}{SIGIL}{}\n", tail.separator(), self.settings.user);
            write_flushed(out, &postfix).await?;
        }

        info!(fragments, "request finished");
        Ok(RunSummary {
            prelude,
            fragments,
            postfixed,
        })
    }

    /// Complete a partial speaker name, pad the last turn and open the next
    /// speaker's turn. Returns the text to append to the document.
    fn extend_history(&self, turns: &mut Vec<Turn>) -> String {
        let user = self.settings.user.as_str();
        let mut prelude = String::new();

        let mut extra_names = vec![user];
        extra_names.extend(PromptRole::ALL.map(|r| r.as_str()));
        if let Some(suffix) = heuristics::autocomplete_name(turns, &extra_names) {
            if let Some(last) = turns.last_mut() {
                last.name.push_str(&suffix);
            }
            debug!(%suffix, "completed speaker name");
            prelude.push_str(&suffix);
        }

        if self.settings.add_final_message_padding {
            if let Some(last) = turns.last_mut() {
                if let Some(padding) = heuristics::final_message_padding(&last.content) {
                    last.content.push_str(padding);
                    prelude.push_str(padding);
                }
            }
        }

        if self.settings.guess_next_speaker {
            if let Some(name) = heuristics::guess_next_speaker(turns, user) {
                debug!(speaker = %name, "guessed next speaker");
                prelude.push(SIGIL);
                prelude.push_str(&name);
                prelude.push('\n');
                turns.push(Turn::new(name, "\n"));
            }
        }

        prelude
    }

    /// Add the system prompt, render templates and map to messages.
    async fn prepare(&self, mut turns: Vec<Turn>) -> Result<Prepared, SessionError> {
        let system = PromptRole::System.as_str();
        if turns.first().map(|t| t.name.as_str()) != Some(system) {
            if let Some(prompt) = self.read_system_prompt().await? {
                turns.insert(0, Turn::new(system, prompt));
            }
        }

        let ctx = TemplateContext {
            user: self.settings.user.clone(),
            characters: characters(&turns),
            base_dir: self.template_dir.clone(),
        };
        for turn in &mut turns {
            let rendered = self.renderer.render(&turn.content, &ctx)?;
            turn.content = rendered.trim_matches('\n').to_string();
        }

        let mapper = MessageMapper::new(&self.settings.user, self.settings.mapping_options());
        let messages = mapper.map(&turns);
        self.artifacts
            .write(artifacts::PROCESSED_CHATHISTORY, &messages_to_chathistory(&messages));

        let request =
            GenerationRequest::new(messages).with_props(self.settings.api_call_props.clone());
        if self.artifacts.is_enabled() {
            match serde_json::to_string_pretty(&request) {
                Ok(json) => self.artifacts.write(artifacts::REQUEST, &json),
                Err(e) => warn!(error = %e, "failed to serialize request artifact"),
            }
        }

        Ok(Prepared {
            request,
            names: NameSet::from_turns(&turns),
        })
    }

    async fn read_system_prompt(&self) -> Result<Option<String>, SessionError> {
        let Some(file) = self.settings.system_prompt_file() else {
            return Ok(None);
        };
        let path = resolve_local_path(&self.template_dir, file)?;
        if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            return Ok(None);
        }
        debug!(path = %path.display(), "adding system prompt");
        Ok(Some(tokio::fs::read_to_string(&path).await?))
    }

    fn write_config_artifact(&self) {
        if !self.artifacts.is_enabled() {
            return;
        }
        match serde_yaml_ng::to_string(&self.settings) {
            Ok(yaml) => self.artifacts.write(artifacts::PROCESSED_CONFIG, &yaml),
            Err(e) => warn!(error = %e, "failed to serialize config artifact"),
        }
    }
}

/// Last two characters of the document as written so far.
#[derive(Debug, Default)]
struct DocumentTail {
    chars: String,
}

impl DocumentTail {
    fn push(&mut self, text: &str) {
        self.chars.push_str(text);
        let keep_from = self
            .chars
            .char_indices()
            .rev()
            .nth(1)
            .map_or(0, |(i, _)| i);
        self.chars.drain(..keep_from);
    }

    /// Line breaks needed so a new speaker line follows a blank line.
    fn separator(&self) -> &'static str {
        if self.chars.is_empty() || self.chars.ends_with("\n\n") {
            ""
        } else if self.chars.ends_with('\n') {
            "\n"
        } else {
            "\n\n"
        }
    }
}

/// Distinct non-role speakers in order of first appearance.
fn characters(turns: &[Turn]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for turn in turns {
        if PromptRole::from_literal(&turn.name).is_none() && !seen.contains(&turn.name) {
            seen.push(turn.name.clone());
        }
    }
    seen
}

async fn write_flushed<W>(out: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}
