// Language plugin registration and lookup

use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{Result, TinkerError};

use super::host::CompilerHost;
use super::interpreted::InterpretedLanguage;
use super::native::{JsonLanguage, NativeLanguage};
use super::traits::{Language, LanguageError};
use super::transpiled::TranspiledLanguage;

/// Language plugin registry
///
/// Canonical names and aliases share one case-insensitive namespace; a
/// registration that would collide is rejected whole.
pub struct LanguageRegistry {
    plugins: DashMap<String, Arc<dyn Language>>,
    aliases: DashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self {
            plugins: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    pub fn register(&self, language: Arc<dyn Language>) -> Result<()> {
        let name = language.name().to_lowercase();

        if self.plugins.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(TinkerError::Language(Box::new(
                LanguageError::DuplicateLanguage { language: name },
            )));
        }

        let mut new_aliases = Vec::new();
        for alias in language.aliases() {
            let alias = alias.to_lowercase();
            if alias == name {
                continue;
            }
            if self.plugins.contains_key(&alias) {
                return Err(TinkerError::Language(Box::new(
                    LanguageError::AliasCollision {
                        alias,
                        existing: name,
                    },
                )));
            }
            if let Some(existing) = self.aliases.get(&alias) {
                return Err(TinkerError::Language(Box::new(
                    LanguageError::AliasCollision {
                        alias: alias.clone(),
                        existing: existing.value().clone(),
                    },
                )));
            }
            new_aliases.push(alias);
        }

        for alias in new_aliases {
            self.aliases.insert(alias, name.clone());
        }
        self.plugins.insert(name, language);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        let name = self.normalize(name);
        if self.plugins.remove(&name).is_none() {
            return Err(TinkerError::Language(Box::new(
                LanguageError::UnknownLanguage {
                    language: name,
                    available: self.list(),
                },
            )));
        }
        self.aliases.retain(|_, canonical| canonical != &name);
        Ok(())
    }

    /// Resolve a raw name or alias to the canonical language name
    ///
    /// Unknown names pass through unchanged; absence is the caller's concern.
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase();
        if self.plugins.contains_key(&lowered) {
            return lowered;
        }
        if let Some(canonical) = self.aliases.get(&lowered) {
            return canonical.value().clone();
        }
        raw.to_string()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Language>> {
        let name = self.normalize(name);
        self.plugins.get(&name).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .plugins
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Find the language owning a file extension (without leading dot)
    pub fn language_for_extension(&self, extension: &str) -> Option<String> {
        let extension = extension.to_lowercase();
        self.plugins.iter().find_map(|entry| {
            if entry
                .value()
                .file_extensions()
                .contains(&extension.as_str())
            {
                Some(entry.key().clone())
            } else {
                None
            }
        })
    }

    /// Register the built-in language set
    pub fn load_builtin_plugins(&self, compilers: &Arc<CompilerHost>) -> Result<()> {
        self.register(Arc::new(NativeLanguage::html()))?;
        self.register(Arc::new(NativeLanguage::css()))?;
        self.register(Arc::new(NativeLanguage::javascript()))?;
        self.register(Arc::new(JsonLanguage::new()))?;
        self.register(Arc::new(TranspiledLanguage::typescript(compilers.clone())))?;
        self.register(Arc::new(TranspiledLanguage::markdown(compilers.clone())))?;
        self.register(Arc::new(InterpretedLanguage::python(compilers.clone())))?;
        Ok(())
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::traits::EditorSlot;

    fn registry_with_builtins() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        let compilers = Arc::new(CompilerHost::new());
        registry.load_builtin_plugins(&compilers).unwrap();
        registry
    }

    #[test]
    fn test_builtin_plugins_register() {
        let registry = registry_with_builtins();
        let names = registry.list();
        for expected in [
            "html",
            "css",
            "javascript",
            "json",
            "typescript",
            "markdown",
            "python",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_normalize_aliases_case_insensitive() {
        let registry = registry_with_builtins();
        assert_eq!(registry.normalize("ts"), "typescript");
        assert_eq!(registry.normalize("TypeScript"), "typescript");
        assert_eq!(registry.normalize("TS"), "typescript");
        assert_eq!(registry.normalize("md"), "markdown");
        // unknown names pass through unchanged
        assert_eq!(registry.normalize("cobol"), "cobol");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = registry_with_builtins();
        let result = registry.register(Arc::new(NativeLanguage::html()));
        assert!(result.is_err());
    }

    #[test]
    fn test_unregister_removes_aliases() {
        let registry = registry_with_builtins();
        registry.unregister("typescript").unwrap();
        assert!(registry.get("ts").is_none());
        assert_eq!(registry.normalize("ts"), "ts");
    }

    #[test]
    fn test_language_for_extension() {
        let registry = registry_with_builtins();
        assert_eq!(
            registry.language_for_extension("HTML"),
            Some("html".to_string())
        );
        assert_eq!(
            registry.language_for_extension("ts"),
            Some("typescript".to_string())
        );
        assert_eq!(registry.language_for_extension("zig"), None);
    }

    #[test]
    fn test_builtin_slots() {
        let registry = registry_with_builtins();
        assert_eq!(registry.get("html").unwrap().slot(), EditorSlot::Markup);
        assert_eq!(registry.get("css").unwrap().slot(), EditorSlot::Style);
        assert_eq!(registry.get("python").unwrap().slot(), EditorSlot::Script);
    }
}
