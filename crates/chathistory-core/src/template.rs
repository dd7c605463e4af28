use std::path::{Component, Path, PathBuf};

use crate::errors::TemplateError;

/// Values a template may refer to while rendering one turn.
#[derive(Clone, Debug, Default)]
pub struct TemplateContext {
    /// Display name of the human participant.
    pub user: String,
    /// Every non-role speaker in the conversation, in order of first appearance.
    pub characters: Vec<String>,
    /// Directory includes are resolved against. Includes may not leave it.
    pub base_dir: PathBuf,
}

/// Expands template directives in turn content before it reaches the backend.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, content: &str, ctx: &TemplateContext) -> Result<String, TemplateError>;
}

/// Join `path` onto `base`, refusing anything that could leave `base`.
pub fn resolve_local_path(base: &Path, path: &str) -> Result<PathBuf, TemplateError> {
    let relative = Path::new(path.trim());
    let escapes = relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(TemplateError::UnsafePath(path.to_string()));
    }
    Ok(base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths_stay_inside_base() {
        let base = Path::new("/tmp/chats");
        assert_eq!(
            resolve_local_path(base, "chars/Luna.txt").unwrap(),
            base.join("chars/Luna.txt")
        );
        assert_eq!(resolve_local_path(base, " ./a.txt ").unwrap(), base.join("./a.txt"));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let base = Path::new("/tmp/chats");
        for path in ["../secret.txt", "chars/../../x", "/etc/passwd", ""] {
            assert!(
                matches!(resolve_local_path(base, path), Err(TemplateError::UnsafePath(_))),
                "{path:?} should be rejected"
            );
        }
    }
}
