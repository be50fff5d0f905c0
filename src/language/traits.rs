// Core Language trait definition for the Tinkerbox plugin architecture

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Editor roles a language can be assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorSlot {
    Markup,
    Style,
    Script,
}

impl EditorSlot {
    pub const ALL: [EditorSlot; 3] = [EditorSlot::Markup, EditorSlot::Style, EditorSlot::Script];

    pub fn as_str(&self) -> &'static str {
        match self {
            EditorSlot::Markup => "markup",
            EditorSlot::Style => "style",
            EditorSlot::Script => "script",
        }
    }
}

impl fmt::Display for EditorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of compiling or running one language's source text
///
/// Exactly one of `output` (on success) or `error` (on failure) is meaningful.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

impl RuntimeResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms: None,
        }
    }

    pub fn ok_timed(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..Self::ok(output)
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let mut message = error.into();
        if message.is_empty() {
            message = "unknown failure".to_string();
        }
        Self {
            success: false,
            output: None,
            error: Some(message),
            duration_ms: None,
        }
    }

    pub fn failed_timed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..Self::failed(error)
        }
    }
}

/// Main trait for language plugin implementations
///
/// A plugin identifies itself (name, aliases, editor slot, file extensions),
/// names the vendor resources it needs, and turns source text into an
/// executable artifact. `execute` must only be called after the language
/// loader reports the language ready; violations surface as a failed
/// `RuntimeResult`, never a panic.
#[async_trait]
pub trait Language: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn slot(&self) -> EditorSlot;
    fn file_extensions(&self) -> &[&str];

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Vendor key of the compiler bundle this language needs, if any
    fn compiler_vendor(&self) -> Option<&str> {
        None
    }

    /// Vendor key of the in-sandbox runtime this language needs, if any
    fn runtime_vendor(&self) -> Option<&str> {
        None
    }

    /// Transform source text into an executable artifact
    async fn execute(&self, source: &str) -> RuntimeResult;
}

/// All vendor keys a language depends on
pub fn vendor_keys(language: &dyn Language) -> Vec<String> {
    language
        .compiler_vendor()
        .into_iter()
        .chain(language.runtime_vendor())
        .map(str::to_string)
        .collect()
}

/// Language plugin errors with detailed context
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("Language not registered: {language}")]
    UnknownLanguage {
        language: String,
        available: Vec<String>,
    },

    #[error("Language already registered: {language}")]
    DuplicateLanguage { language: String },

    #[error("Alias {alias} collides with registered language {existing}")]
    AliasCollision { alias: String, existing: String },

    #[error("Loading language {language} failed: {error}")]
    LoadFailed { language: String, error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_result_invariant() {
        let ok = RuntimeResult::ok("artifact");
        assert!(ok.success);
        assert_eq!(ok.output.as_deref(), Some("artifact"));
        assert!(ok.error.is_none());

        let failed = RuntimeResult::failed("syntax error");
        assert!(!failed.success);
        assert!(failed.output.is_none());
        assert_eq!(failed.error.as_deref(), Some("syntax error"));
    }

    #[test]
    fn test_failed_result_never_has_empty_error() {
        let failed = RuntimeResult::failed("");
        assert_eq!(failed.error.as_deref(), Some("unknown failure"));
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(EditorSlot::Markup.to_string(), "markup");
        assert_eq!(EditorSlot::Script.as_str(), "script");
        assert_eq!(EditorSlot::ALL.len(), 3);
    }
}
