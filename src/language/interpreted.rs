// Languages whose runtime executes inside the sandbox document rather than
// transforming text ahead of time

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use super::host::CompilerHost;
use super::traits::{EditorSlot, Language, RuntimeResult};

/// Language executed by a vendor-loaded runtime inside the sandbox
///
/// `execute` emits a dispatch stub that hands the embedded source to the
/// runtime's global entrypoint once the document is running. The runtime gets
/// a warm-up call exactly once per process; repeated runs skip it.
pub struct InterpretedLanguage {
    name: &'static str,
    display_name: &'static str,
    slot: EditorSlot,
    extensions: &'static [&'static str],
    aliases: &'static [&'static str],
    runtime_key: &'static str,
    entrypoint: &'static str,
    compilers: Arc<CompilerHost>,
    warmed: OnceCell<()>,
}

impl InterpretedLanguage {
    pub fn python(compilers: Arc<CompilerHost>) -> Self {
        Self {
            name: "python",
            display_name: "Python",
            slot: EditorSlot::Script,
            extensions: &["py"],
            aliases: &["py", "python3"],
            runtime_key: "python-runtime",
            entrypoint: "window.__tinkerbox_run_python",
            compilers,
            warmed: OnceCell::new(),
        }
    }

    async fn warm_up(&self) {
        self.warmed
            .get_or_init(|| async {
                if let Some(runtime) = self.compilers.get(self.runtime_key) {
                    // Prime the runtime so first real execution is not paying
                    // interpreter startup inside the sandbox
                    let _ = runtime.transform("").await;
                }
                debug!(language = %self.name, "Runtime warm-up complete");
            })
            .await;
    }
}

#[async_trait]
impl Language for InterpretedLanguage {
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

    fn runtime_vendor(&self) -> Option<&str> {
        Some(self.runtime_key)
    }

    async fn execute(&self, source: &str) -> RuntimeResult {
        if !self.compilers.contains(self.runtime_key) {
            return RuntimeResult::failed(format!(
                "resource not loaded: runtime {} for {} is unavailable",
                self.runtime_key, self.name
            ));
        }

        self.warm_up().await;

        // The runtime bundle defines the entrypoint inside the document;
        // embed the source as a JSON string so it survives any content
        let embedded = match serde_json::to_string(source) {
            Ok(embedded) => embedded,
            Err(error) => {
                return RuntimeResult::failed(format!("failed to embed source: {error}"))
            }
        };
        RuntimeResult::ok(format!("{}({embedded});", self.entrypoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::host::Compiler;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRuntime {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Compiler for CountingRuntime {
        async fn transform(&self, _source: &str) -> std::result::Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_requires_runtime_loaded() {
        let compilers = Arc::new(CompilerHost::new());
        let python = InterpretedLanguage::python(compilers);
        let result = python.execute("print('x')").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("resource not loaded"));
    }

    #[tokio::test]
    async fn test_emits_dispatch_stub() {
        let compilers = Arc::new(CompilerHost::new());
        compilers.register(
            "python-runtime",
            Arc::new(CountingRuntime {
                calls: Arc::new(AtomicU32::new(0)),
            }),
        );
        let python = InterpretedLanguage::python(compilers);

        let result = python.execute("print('hi')").await;
        assert!(result.success);
        let output = result.output.unwrap();
        assert!(output.starts_with("window.__tinkerbox_run_python("));
        assert!(output.contains("print('hi')"));
    }

    #[tokio::test]
    async fn test_warm_up_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let compilers = Arc::new(CompilerHost::new());
        compilers.register(
            "python-runtime",
            Arc::new(CountingRuntime {
                calls: calls.clone(),
            }),
        );
        let python = InterpretedLanguage::python(compilers);

        python.execute("print(1)").await;
        python.execute("print(2)").await;
        python.execute("print(3)").await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
