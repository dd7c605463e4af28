//! Directive expansion for turn content.
//!
//! Supported directives:
//! - `{{auto_insert_chars}}`: one `{{insert_text chars/<name>.txt}}` per character
//! - `{{insert_text PATH}}`: contents of PATH, relative to the template directory
//! - `{{user}}`: the configured user name
//!
//! Anything else between braces is left alone.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::debug;

use chathistory_core::errors::TemplateError;
use chathistory_core::template::{resolve_local_path, TemplateContext, TemplateRenderer};

fn auto_insert_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{auto_insert_chars\}\}").expect("static regex"))
}

fn insert_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{insert_text\s+(.*?)\}\}").expect("static regex"))
}

/// Renderer for the plain `{{...}}` directives.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTemplates;

impl PlainTemplates {
    fn expand_chars(content: &str, ctx: &TemplateContext) -> String {
        let includes = ctx
            .characters
            .iter()
            .map(|name| format!("{{{{insert_text chars/{name}.txt}}}}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        auto_insert_chars()
            .replace_all(content, regex::NoExpand(&includes))
            .into_owned()
    }

    fn expand_includes(content: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(content.len());
        let mut last = 0;
        for caps in insert_text().captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&content[last..whole.start()]);
            out.push_str(&Self::read_include(&caps, ctx)?);
            last = whole.end();
        }
        out.push_str(&content[last..]);
        Ok(out)
    }

    fn read_include(caps: &Captures<'_>, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let raw = caps.get(1).map_or("", |m| m.as_str());
        let path = resolve_local_path(&ctx.base_dir, raw)?;
        debug!(path = %path.display(), "inserting template file");
        std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

impl TemplateRenderer for PlainTemplates {
    fn render(&self, content: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
        let content = Self::expand_chars(content, ctx);
        let content = Self::expand_includes(&content, ctx)?;
        if ctx.user.is_empty() {
            return Ok(content);
        }
        Ok(content.replace("{{user}}", &ctx.user))
    }
}
