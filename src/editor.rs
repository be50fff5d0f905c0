// Editor surface boundary: the engine reads slot sources and applies
// language switches through this seam, never through concrete UI types

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::language::EditorSlot;

/// What the engine needs from whatever is editing the sources
pub trait EditorSurface: Send + Sync {
    /// Current source text for a slot
    fn source_text(&self, slot: EditorSlot) -> String;

    /// Language currently assigned to a slot
    fn language_for(&self, slot: EditorSlot) -> String;

    /// Apply a language switch; callers must only invoke this after the
    /// language loaded successfully
    fn set_language(&self, slot: EditorSlot, language: &str);
}

/// In-memory editor state, one source buffer and language per slot
pub struct Workspace {
    sources: RwLock<HashMap<EditorSlot, String>>,
    languages: RwLock<HashMap<EditorSlot, String>>,
}

impl Workspace {
    pub fn new() -> Self {
        let mut languages = HashMap::new();
        languages.insert(EditorSlot::Markup, "html".to_string());
        languages.insert(EditorSlot::Style, "css".to_string());
        languages.insert(EditorSlot::Script, "javascript".to_string());

        Self {
            sources: RwLock::new(HashMap::new()),
            languages: RwLock::new(languages),
        }
    }

    pub fn set_source(&self, slot: EditorSlot, source: impl Into<String>) {
        self.sources.write().insert(slot, source.into());
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSurface for Workspace {
    fn source_text(&self, slot: EditorSlot) -> String {
        self.sources.read().get(&slot).cloned().unwrap_or_default()
    }

    fn language_for(&self, slot: EditorSlot) -> String {
        self.languages
            .read()
            .get(&slot)
            .cloned()
            .unwrap_or_else(|| "html".to_string())
    }

    fn set_language(&self, slot: EditorSlot, language: &str) {
        self.languages.write().insert(slot, language.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_defaults() {
        let workspace = Workspace::new();
        assert_eq!(workspace.language_for(EditorSlot::Markup), "html");
        assert_eq!(workspace.language_for(EditorSlot::Style), "css");
        assert_eq!(workspace.language_for(EditorSlot::Script), "javascript");
        assert_eq!(workspace.source_text(EditorSlot::Script), "");
    }

    #[test]
    fn test_workspace_updates() {
        let workspace = Workspace::new();
        workspace.set_source(EditorSlot::Script, "console.log('x')");
        workspace.set_language(EditorSlot::Script, "typescript");
        assert_eq!(workspace.source_text(EditorSlot::Script), "console.log('x')");
        assert_eq!(workspace.language_for(EditorSlot::Script), "typescript");
    }
}
