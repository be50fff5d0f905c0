// Native languages need no external compiler or runtime

use async_trait::async_trait;

use super::traits::{EditorSlot, Language, RuntimeResult};

/// Pass-through language: the source text is already the artifact
pub struct NativeLanguage {
    name: &'static str,
    display_name: &'static str,
    slot: EditorSlot,
    extensions: &'static [&'static str],
    aliases: &'static [&'static str],
}

impl NativeLanguage {
    pub fn html() -> Self {
        Self {
            name: "html",
            display_name: "HTML",
            slot: EditorSlot::Markup,
            extensions: &["html", "htm"],
            aliases: &[],
        }
    }

    pub fn css() -> Self {
        Self {
            name: "css",
            display_name: "CSS",
            slot: EditorSlot::Style,
            extensions: &["css"],
            aliases: &[],
        }
    }

    pub fn javascript() -> Self {
        Self {
            name: "javascript",
            display_name: "JavaScript",
            slot: EditorSlot::Script,
            extensions: &["js", "mjs"],
            aliases: &["js", "ecmascript"],
        }
    }

    /// A pass-through plugin with caller-chosen identity, for plugin authors
    pub fn custom(
        name: &'static str,
        display_name: &'static str,
        slot: EditorSlot,
        extensions: &'static [&'static str],
        aliases: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            display_name,
            slot,
            extensions,
            aliases,
        }
    }
}

#[async_trait]
impl Language for NativeLanguage {
    fn name(&self) -> &str {
        self.name
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn slot(&self) -> EditorSlot {
        self.slot
    }

    fn file_extensions(&self) -> &[&str] {
        self.extensions
    }

    fn aliases(&self) -> &[&str] {
        self.aliases
    }

    async fn execute(&self, source: &str) -> RuntimeResult {
        RuntimeResult::ok(source)
    }
}

/// JSON passes through only if it parses
pub struct JsonLanguage;

impl JsonLanguage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonLanguage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Language for JsonLanguage {
    fn name(&self) -> &str {
        "json"
    }

    fn display_name(&self) -> &str {
        "JSON"
    }

    fn slot(&self) -> EditorSlot {
        EditorSlot::Script
    }

    fn file_extensions(&self) -> &[&str] {
        &["json"]
    }

    async fn execute(&self, source: &str) -> RuntimeResult {
        match serde_json::from_str::<serde_json::Value>(source) {
            Ok(_) => RuntimeResult::ok(source),
            Err(error) => RuntimeResult::failed(format!("JSON parse error: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_native_pass_through() {
        let html = NativeLanguage::html();
        let result = html.execute("<p>hi</p>").await;
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_json_valid() {
        let json = JsonLanguage::new();
        let result = json.execute(r#"{"a": [1, 2, 3]}"#).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_json_invalid() {
        let json = JsonLanguage::new();
        let result = json.execute("{not json").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("JSON parse error"));
    }
}
