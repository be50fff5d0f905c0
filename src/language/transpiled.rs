// Transpiled languages: source goes through a vendor-loaded compiler

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::host::CompilerHost;
use super::traits::{EditorSlot, Language, RuntimeResult};

/// Language whose source is transformed by a loaded compiler bundle
pub struct TranspiledLanguage {
    name: &'static str,
    display_name: &'static str,
    slot: EditorSlot,
    extensions: &'static [&'static str],
    aliases: &'static [&'static str],
    compiler_key: &'static str,
    compilers: Arc<CompilerHost>,
}

impl TranspiledLanguage {
    pub fn typescript(compilers: Arc<CompilerHost>) -> Self {
        Self {
            name: "typescript",
            display_name: "TypeScript",
            slot: EditorSlot::Script,
            extensions: &["ts", "tsx"],
            aliases: &["ts"],
            compiler_key: "typescript-compiler",
            compilers,
        }
    }

    pub fn markdown(compilers: Arc<CompilerHost>) -> Self {
        Self {
            name: "markdown",
            display_name: "Markdown",
            slot: EditorSlot::Markup,
            extensions: &["md", "markdown"],
            aliases: &["md"],
            compiler_key: "markdown-compiler",
            compilers,
        }
    }

    pub fn custom(
        name: &'static str,
        display_name: &'static str,
        slot: EditorSlot,
        extensions: &'static [&'static str],
        aliases: &'static [&'static str],
        compiler_key: &'static str,
        compilers: Arc<CompilerHost>,
    ) -> Self {
        Self {
            name,
            display_name,
            slot,
            extensions,
            aliases,
            compiler_key,
            compilers,
        }
    }
}

#[async_trait]
impl Language for TranspiledLanguage {
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

    fn compiler_vendor(&self) -> Option<&str> {
        Some(self.compiler_key)
    }

    async fn execute(&self, source: &str) -> RuntimeResult {
        let compiler = match self.compilers.get(self.compiler_key) {
            Some(compiler) => compiler,
            None => {
                return RuntimeResult::failed(format!(
                    "resource not loaded: compiler {} for {} is unavailable",
                    self.compiler_key, self.name
                ))
            }
        };

        let started = Instant::now();
        let outcome = compiler.transform(source).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => RuntimeResult::ok_timed(output, duration_ms),
            Err(diagnostic) => {
                RuntimeResult::failed_timed(format!("compile error: {diagnostic}"), duration_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::host::Compiler;

    struct ScriptedCompiler {
        fail: bool,
    }

    #[async_trait]
    impl Compiler for ScriptedCompiler {
        async fn transform(&self, source: &str) -> std::result::Result<String, String> {
            if self.fail {
                Err("unexpected token".to_string())
            } else {
                Ok(format!("/* compiled */ {source}"))
            }
        }
    }

    #[tokio::test]
    async fn test_execute_without_compiler_reports_resource_not_loaded() {
        let compilers = Arc::new(CompilerHost::new());
        let language = TranspiledLanguage::typescript(compilers);
        let result = language.execute("let x = 1;").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("resource not loaded"));
    }

    #[tokio::test]
    async fn test_execute_transforms_and_times() {
        let compilers = Arc::new(CompilerHost::new());
        compilers.register(
            "typescript-compiler",
            Arc::new(ScriptedCompiler { fail: false }),
        );
        let language = TranspiledLanguage::typescript(compilers);

        let result = language.execute("let x = 1;").await;
        assert!(result.success);
        assert!(result.output.unwrap().starts_with("/* compiled */"));
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn test_compile_failure_is_data_not_panic() {
        let compilers = Arc::new(CompilerHost::new());
        compilers.register(
            "typescript-compiler",
            Arc::new(ScriptedCompiler { fail: true }),
        );
        let language = TranspiledLanguage::typescript(compilers);

        let result = language.execute("let x = ;").await;
        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("compile error"));
        assert!(error.contains("unexpected token"));
    }
}
