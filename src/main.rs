//! `chathistory` - continue a chat-history document with an LLM.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use chathistory_core::Document;
use chathistory_engine::{export_markdown, Session, MARKDOWN_FILE};
use chathistory_llm::OpenAiChatBackend;
use chathistory_settings::{load_settings, ApiMode, ChatSettings};
use chathistory_telemetry::{init_logging, LogConfig, LogFormat};

const WATCH_INTERVAL: Duration = Duration::from_millis(200);
/// Log target prefix shared by the binary and every workspace crate.
const LOG_TARGET: &str = "chathistory";

#[derive(Parser, Debug)]
#[command(name = "chathistory", about = "Continue a chat-history document with an LLM")]
struct Cli {
    /// Document to continue. Output is appended to it. Reads stdin when omitted.
    path: Option<PathBuf>,

    /// Re-run every time this document changes.
    #[arg(short, long, conflicts_with = "path")]
    watch: Option<PathBuf>,

    /// Directory templates and the system prompt are resolved against.
    #[arg(short = 't', long)]
    template_directory: Option<PathBuf>,

    /// Write a markdown view of the document instead of continuing it.
    #[arg(long)]
    markdown: bool,

    /// Debug logging for chathistory itself.
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

/// What to do with a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(log_config(&cli));
    let action = if cli.markdown { Action::Markdown } else { Action::Continue };
    let template_dir = cli.template_directory.as_deref();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            on_signal.cancel();
        }
    });

    match (&cli.watch, &cli.path) {
        (Some(path), _) => watch(path, action, template_dir, &cancel).await,
        (None, Some(path)) => run_file(path, action, template_dir, &cancel).await,
        (None, None) => run_stdin(action, template_dir, &cancel).await,
    }
}

fn log_config(cli: &Cli) -> LogConfig {
    let module_levels = if cli.verbose {
        vec![(LOG_TARGET.to_string(), Level::DEBUG)]
    } else {
        Vec::new()
    };
    LogConfig {
        module_levels,
        format: if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty },
        ..LogConfig::default()
    }
}

/// Continue the document at `path`, appending the output to it, or write its
/// markdown view next to it.
async fn run_file(
    path: &Path,
    action: Action,
    template_dir: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    if action == Action::Markdown {
        let target = document_dir(path).join(MARKDOWN_FILE);
        let markdown = render_markdown(&text)?;
        tokio::fs::write(&target, markdown)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        info!(path = %target.display(), "markdown written");
        return Ok(());
    }

    let template_dir = template_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| document_dir(path));

    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open {} for appending", path.display()))?;

    run_document(&text, template_dir, &mut file, cancel)
        .await
        .with_context(|| format!("failed to continue {}", path.display()))
}

/// Process a document read from stdin, writing the result to stdout.
async fn run_stdin(action: Action, template_dir: Option<&Path>, cancel: &CancellationToken) -> Result<()> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("failed to read stdin")?;

    let mut stdout = tokio::io::stdout();
    if action == Action::Markdown {
        stdout.write_all(render_markdown(&text)?.as_bytes()).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let template_dir = match template_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("failed to resolve working directory")?,
    };
    run_document(&text, template_dir, &mut stdout, cancel).await
}

/// Poll `path` and process it whenever someone else modifies it.
async fn watch(
    path: &Path,
    action: Action,
    template_dir: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut last_modified = modified(path)?;
    info!(path = %path.display(), "watching");

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(WATCH_INTERVAL) => {}
        }

        let current = modified(path)?;
        if current == last_modified {
            continue;
        }
        info!(path = %path.display(), "document changed");
        if let Err(e) = run_file(path, action, template_dir, cancel).await {
            warn!(error = format!("{e:#}"), "run failed");
        }
        last_modified = modified(path)?;
    }
}

/// Parse a document and resolve its settings from the working directory up.
fn load_document(text: &str) -> Result<(Document, ChatSettings)> {
    let document = Document::parse(text).context("failed to parse document")?;
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let settings = load_settings(&cwd, &document.settings).context("failed to load settings")?;
    Ok((document, settings))
}

fn render_markdown(text: &str) -> Result<String> {
    let (document, settings) = load_document(text)?;
    Ok(export_markdown(&document.turns(), &settings.user))
}

async fn run_document<W>(
    text: &str,
    template_dir: PathBuf,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let (document, settings) = load_document(text)?;

    if !settings.active {
        info!("document is inactive, skipping");
        return Ok(());
    }

    let backend = build_backend(&settings)?;
    let session = Session::new(settings, backend).with_template_dir(template_dir);
    let summary = session.run(document.turns(), out, cancel).await?;
    info!(
        fragments = summary.fragments,
        postfixed = summary.postfixed,
        "run complete"
    );
    Ok(())
}

fn build_backend(settings: &ChatSettings) -> Result<Arc<OpenAiChatBackend>> {
    let Some(url) = settings.api_url.as_deref().filter(|u| !u.is_empty()) else {
        bail!("api_url is not configured");
    };
    match settings.api_mode {
        ApiMode::OpenAiChat => {
            let backend = OpenAiChatBackend::new(url, &settings.api_call_headers)
                .context("failed to configure backend")?;
            Ok(Arc::new(backend))
        }
    }
}

fn document_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("failed to stat {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_mode() {
        let cli = Cli::try_parse_from(["chathistory", "chat.txt", "-t", "tpl"]).unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("chat.txt")));
        assert_eq!(cli.template_directory, Some(PathBuf::from("tpl")));
        assert!(cli.watch.is_none());
    }

    #[test]
    fn watch_conflicts_with_path() {
        assert!(Cli::try_parse_from(["chathistory", "a.txt", "--watch", "b.txt"]).is_err());
        let cli = Cli::try_parse_from(["chathistory", "-w", "b.txt"]).unwrap();
        assert_eq!(cli.watch, Some(PathBuf::from("b.txt")));
    }

    #[test]
    fn verbose_raises_own_crates_to_debug() {
        let cli = Cli::try_parse_from(["chathistory", "-v", "chat.txt"]).unwrap();
        let config = log_config(&cli);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.module_levels, vec![("chathistory".to_string(), Level::DEBUG)]);

        let quiet = Cli::try_parse_from(["chathistory", "chat.txt"]).unwrap();
        assert!(log_config(&quiet).module_levels.is_empty());
    }

    #[tokio::test]
    async fn markdown_mode_writes_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        let original = "---\nuser: Sam\n---\n@Sam\nhi {{user}}\n\n@Luna\nhello\n";
        std::fs::write(&path, original).unwrap();

        run_file(&path, Action::Markdown, None, &CancellationToken::new())
            .await
            .unwrap();

        let markdown = std::fs::read_to_string(dir.path().join(MARKDOWN_FILE)).unwrap();
        assert_eq!(markdown, "### Sam\nhi Sam\n\n### Luna\nhello\n\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn document_dir_defaults_to_cwd() {
        assert_eq!(document_dir(Path::new("chat.txt")), PathBuf::from("."));
        assert_eq!(document_dir(Path::new("a/chat.txt")), PathBuf::from("a"));
    }

    #[test]
    fn backend_requires_url() {
        let settings = ChatSettings::default();
        assert!(build_backend(&settings).is_err());
        let settings = ChatSettings {
            api_url: Some("http://localhost:8080/v1/chat/completions".into()),
            ..ChatSettings::default()
        };
        assert!(build_backend(&settings).is_ok());
    }

    #[tokio::test]
    async fn inactive_document_writes_nothing() {
        let mut out = Vec::new();
        run_document(
            "---\nactive: false\n---\n@user\nhi\n",
            PathBuf::from("."),
            &mut out,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(out.is_empty());
    }
}
