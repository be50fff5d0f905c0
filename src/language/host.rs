// Compiler host: where fetched vendor bundles install their transform capability
// Script injection finishing does not mean the capability exists yet, so the
// vendor resolver polls `contains` before declaring a bundle usable

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A loaded compiler's transform entrypoint
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Transform source text; `Err` carries the compiler's own diagnostic
    async fn transform(&self, source: &str) -> std::result::Result<String, String>;
}

/// Registry of installed compiler capabilities, keyed by vendor key
#[derive(Default)]
pub struct CompilerHost {
    compilers: DashMap<String, Arc<dyn Compiler>>,
}

impl CompilerHost {
    pub fn new() -> Self {
        Self {
            compilers: DashMap::new(),
        }
    }

    pub fn register(&self, key: impl Into<String>, compiler: Arc<dyn Compiler>) {
        let key = key.into();
        debug!(capability = %key, "Compiler capability installed");
        self.compilers.insert(key, compiler);
    }

    pub fn unregister(&self, key: &str) {
        self.compilers.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Compiler>> {
        self.compilers.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.compilers.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.compilers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn clear(&self) {
        self.compilers.clear();
    }
}

/// Compiler backed by an external interpreter running a fetched bundle
///
/// Source text is piped to the child's stdin; the transformed artifact is read
/// from stdout. A non-zero exit reports the child's stderr as the diagnostic.
pub struct CommandCompiler {
    interpreter: Vec<String>,
    bundle: PathBuf,
}

impl CommandCompiler {
    pub fn new(interpreter: Vec<String>, bundle: PathBuf) -> Self {
        let interpreter = if interpreter.is_empty() {
            vec!["node".to_string()]
        } else {
            interpreter
        };
        Self {
            interpreter,
            bundle,
        }
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn transform(&self, source: &str) -> std::result::Result<String, String> {
        let program = which::which(&self.interpreter[0])
            .map_err(|_| format!("interpreter not found: {}", self.interpreter[0]))?;

        let mut command = tokio::process::Command::new(program);
        command
            .args(&self.interpreter[1..])
            .arg(&self.bundle)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|error| format!("failed to spawn compiler: {error}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .await
                .map_err(|error| format!("failed to write compiler input: {error}"))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|error| format!("compiler did not complete: {error}"))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = stderr.trim();
            if diagnostic.is_empty() {
                Err(format!(
                    "compiler exited with status {}",
                    output.status.code().unwrap_or(-1)
                ))
            } else {
                Err(diagnostic.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseCompiler;

    #[async_trait]
    impl Compiler for UppercaseCompiler {
        async fn transform(&self, source: &str) -> std::result::Result<String, String> {
            Ok(source.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let host = CompilerHost::new();
        assert!(!host.contains("ts"));

        host.register("ts", Arc::new(UppercaseCompiler));
        assert!(host.contains("ts"));

        let compiler = host.get("ts").unwrap();
        assert_eq!(compiler.transform("abc").await.unwrap(), "ABC");

        host.unregister("ts");
        assert!(host.get("ts").is_none());
    }

    #[test]
    fn test_command_compiler_defaults_interpreter() {
        let compiler = CommandCompiler::new(Vec::new(), PathBuf::from("/tmp/bundle.js"));
        assert_eq!(compiler.interpreter, vec!["node".to_string()]);
    }
}
