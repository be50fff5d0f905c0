// Execution sandbox protocol: builds the self-contained document, defines the
// host <-> sandbox message contract, and runs instances as isolated child
// processes with no shared memory and a single ordered message channel

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SandboxError;

/// Console levels intercepted inside the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One captured output line from the sandbox
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub args: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Wire messages a sandbox instance may send the host
///
/// `console` entries feed the host's message list; `loaded` is the readiness
/// signal emitted once the document finished loading. Anything that fails to
/// parse into this shape is dropped on receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SandboxMessage {
    Console {
        level: ConsoleLevel,
        args: Vec<String>,
    },
    Loaded,
}

/// Parse one line from the sandbox channel; non-conforming input yields None
pub fn parse_message(line: &str) -> Option<SandboxMessage> {
    serde_json::from_str(line.trim()).ok()
}

/// Console/error interception shim injected into every document
///
/// Redefines the four console levels to serialize each argument (objects as
/// pretty-printed JSON, primitives as-is), post the message to the host, and
/// still invoke the original. Uncaught errors and unhandled rejections report
/// through the same channel at level `error`.
const CONSOLE_SHIM: &str = r#"(function () {
  function post(payload) {
    var line = JSON.stringify(payload);
    if (typeof globalThis.__tinkerbox_emit === "function") {
      globalThis.__tinkerbox_emit(line);
    } else if (window.parent && window.parent !== window) {
      window.parent.postMessage(payload, "*");
    }
  }
  function serialize(value) {
    if (value !== null && typeof value === "object") {
      try {
        return JSON.stringify(value, null, 2);
      } catch (cycle) {
        return String(value);
      }
    }
    return String(value);
  }
  ["log", "info", "warn", "error"].forEach(function (level) {
    var original = console[level];
    console[level] = function () {
      var args = Array.prototype.slice.call(arguments).map(serialize);
      post({ type: "console", level: level, args: args });
      original.apply(console, arguments);
    };
  });
  window.onerror = function (message, source, line) {
    post({ type: "console", level: "error", args: [String(message) + " (line " + line + ")"] });
  };
  window.onunhandledrejection = function (event) {
    post({ type: "console", level: "error", args: ["Unhandled rejection: " + serialize(event.reason)] });
  };
  window.addEventListener("load", function () {
    post({ type: "loaded" });
  });
})();
"#;

/// Build one self-contained executable document from the compiled artifacts
///
/// The user script runs inside a guarded block so a thrown error reports
/// through the console channel instead of aborting the document.
pub fn build_document(markup: &str, style: &str, script: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <style>\n{style}\n</style>\n\
         <script>\n{CONSOLE_SHIM}</script>\n\
         </head>\n\
         <body>\n\
         {markup}\n\
         <script>\n\
         try {{\n{script}\n}} catch (error) {{\n  console.error(String(error));\n}}\n\
         </script>\n\
         </body>\n\
         </html>\n"
    )
}

/// A live sandbox instance
///
/// Dropping the handle tears the instance down; replacing the stored handle
/// with a newer one is how the engine supersedes a run.
pub struct SandboxHandle {
    pub id: Uuid,
    /// Ordered message stream; taken by the consumer exactly once
    pub messages: Option<mpsc::Receiver<SandboxMessage>>,
    _keepalive: Box<dyn Any + Send>,
}

impl SandboxHandle {
    pub fn new(messages: mpsc::Receiver<SandboxMessage>, keepalive: Box<dyn Any + Send>) -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Some(messages),
            _keepalive: keepalive,
        }
    }
}

/// Launches isolated execution contexts
#[async_trait]
pub trait SandboxHost: Send + Sync {
    async fn launch(&self, document: &str) -> std::result::Result<SandboxHandle, SandboxError>;
}

/// Runs each document in a child process via a configurable runner command
///
/// The document is staged into a per-instance temp directory; the runner is
/// invoked with the document path and is expected to execute it and write
/// one JSON message per line on stdout. The child has no shared memory with
/// the host; stdout is the single ordered channel back.
pub struct ProcessSandboxHost {
    runner: Vec<String>,
}

impl ProcessSandboxHost {
    pub fn new(runner: Vec<String>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SandboxHost for ProcessSandboxHost {
    async fn launch(&self, document: &str) -> std::result::Result<SandboxHandle, SandboxError> {
        let command_name = self
            .runner
            .first()
            .cloned()
            .unwrap_or_default();
        if command_name.is_empty() {
            return Err(SandboxError::RunnerNotFound {
                command: String::new(),
                suggestion: Some("set engine.sandbox_runner in playground.yml".to_string()),
            });
        }

        let program = which::which(&command_name).map_err(|_| SandboxError::RunnerNotFound {
            command: command_name.clone(),
            suggestion: Some(
                "install a sandbox runner or set engine.sandbox_runner in playground.yml"
                    .to_string(),
            ),
        })?;

        let staging = tempfile::tempdir().map_err(|error| SandboxError::DocumentStaging {
            message: error.to_string(),
        })?;
        let document_path = staging.path().join("playground.html");
        tokio::fs::write(&document_path, document)
            .await
            .map_err(|error| SandboxError::DocumentStaging {
                message: error.to_string(),
            })?;

        let mut child = tokio::process::Command::new(program)
            .args(&self.runner[1..])
            .arg(&document_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| SandboxError::SpawnFailed {
                command: command_name.clone(),
                error: error.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SandboxError::SpawnFailed {
            command: command_name.clone(),
            error: "stdout not captured".to_string(),
        })?;

        let (sender, receiver) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_message(&line) {
                        Some(message) => {
                            if sender.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!(line = %line, "Dropping malformed sandbox message");
                        }
                    },
                    Ok(None) => break,
                    Err(error) => {
                        warn!(error = %error, "Sandbox channel read failed");
                        break;
                    }
                }
            }
        });

        let handle = SandboxHandle::new(receiver, Box::new((child, staging)));
        debug!(instance_id = %handle.id, "Sandbox instance launched");
        Ok(handle)
    }
}
