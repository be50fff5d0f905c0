// Execution engine: drives one end-to-end run across the editor slots,
// gating sandbox creation on every slot compiling, and keeps only the most
// recent sandbox instance visible to the console feed

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::PlaygroundConfig;
use crate::editor::EditorSurface;
use crate::error::{Result, SandboxError, TinkerError};
use crate::language::host::CompilerHost;
use crate::language::{EditorSlot, LanguageLoader, LanguageRegistry, RuntimeResult};
use crate::resource::{HttpResourceFetcher, ResourceLoader};
use crate::sandbox::{
    build_document, ConsoleMessage, SandboxHandle, SandboxHost, SandboxMessage,
};
use crate::vendor::{register_builtin_vendors, VendorResolver};

/// Engine lifecycle states, observable by the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Idle,
    Compiling,
    Running,
    Success,
    Error,
}

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on waiting for a sandbox instance to report ready
    pub ready_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ready_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// Result of compiling one editor slot
#[derive(Debug, Clone, Serialize)]
pub struct SlotOutcome {
    pub slot: EditorSlot,
    pub language: String,
    pub result: RuntimeResult,
}

/// Orchestrates language loading, slot compilation and sandboxed execution
pub struct Engine {
    registry: Arc<LanguageRegistry>,
    languages: Arc<LanguageLoader>,
    resolver: Arc<VendorResolver>,
    resources: Arc<ResourceLoader>,
    sandbox_host: Arc<dyn SandboxHost>,
    editor: Arc<dyn EditorSurface>,
    config: EngineConfig,
    status_tx: watch::Sender<EngineStatus>,
    console: Arc<Mutex<Vec<ConsoleMessage>>>,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<SandboxHandle>>,
    last_results: Mutex<Vec<SlotOutcome>>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<LanguageRegistry>,
        languages: Arc<LanguageLoader>,
        resolver: Arc<VendorResolver>,
        resources: Arc<ResourceLoader>,
        sandbox_host: Arc<dyn SandboxHost>,
        editor: Arc<dyn EditorSurface>,
        config: EngineConfig,
    ) -> Self {
        let (status_tx, _status_rx) = watch::channel(EngineStatus::Idle);
        Self {
            registry,
            languages,
            resolver,
            resources,
            sandbox_host,
            editor,
            config,
            status_tx,
            console: Arc::new(Mutex::new(Vec::new())),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
            last_results: Mutex::new(Vec::new()),
        }
    }

    /// Wire the standard component stack around a config and editor surface
    pub fn bootstrap(config: &PlaygroundConfig, editor: Arc<dyn EditorSurface>) -> Result<Self> {
        let compilers = Arc::new(CompilerHost::new());
        let cache_dir = config
            .engine
            .cache_dir
            .clone()
            .unwrap_or_else(HttpResourceFetcher::default_cache_dir);
        let fetcher = Arc::new(HttpResourceFetcher::new(
            cache_dir,
            compilers.clone(),
            config.engine.compiler_interpreter.clone(),
        ));
        let resources = Arc::new(ResourceLoader::new(fetcher));
        let resolver = Arc::new(VendorResolver::new(
            resources.clone(),
            compilers.clone(),
            config.engine.resolver_config(),
        ));
        register_builtin_vendors(&resolver)?;
        config.apply_vendor_overrides(&resolver)?;

        let registry = Arc::new(LanguageRegistry::new());
        registry.load_builtin_plugins(&compilers)?;
        let languages = Arc::new(LanguageLoader::new(registry.clone(), resolver.clone()));
        let sandbox_host = Arc::new(crate::sandbox::ProcessSandboxHost::new(
            config.engine.sandbox_runner.clone(),
        ));

        Ok(Self::new(
            registry,
            languages,
            resolver,
            resources,
            sandbox_host,
            editor,
            config.engine.engine_config(),
        ))
    }

    pub fn status(&self) -> EngineStatus {
        *self.status_tx.borrow()
    }

    /// Subscribable status value
    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    /// Snapshot of the append-only console feed
    pub fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.console.lock().clone()
    }

    pub fn clear_console(&self) {
        self.console.lock().clear();
    }

    /// Per-slot outcomes of the most recent completed compile phase
    pub fn last_results(&self) -> Vec<SlotOutcome> {
        self.last_results.lock().clone()
    }

    pub fn is_language_loaded(&self, name: &str) -> bool {
        self.languages.is_language_loaded(name)
    }

    pub fn get_language_error(&self, name: &str) -> Option<String> {
        self.languages.get_language_error(name)
    }

    pub fn registry(&self) -> &Arc<LanguageRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<VendorResolver> {
        &self.resolver
    }

    pub fn resources(&self) -> &Arc<ResourceLoader> {
        &self.resources
    }

    /// Handle a language-switch request from the editor
    ///
    /// The switch is applied only after the language loads; on failure the
    /// editor keeps its previous assignment and the error propagates.
    pub async fn request_language_switch(&self, slot: EditorSlot, language: &str) -> Result<()> {
        let name = self.registry.normalize(language);
        self.languages.ensure_language(&name).await?;
        self.editor.set_language(slot, &name);
        Ok(())
    }

    /// One end-to-end run
    ///
    /// Compile failures end the run with status `Error` and are reported
    /// through `last_results`, not as an `Err`; resource and sandbox faults
    /// reject. A newer `run_once` supersedes this one: the superseded run
    /// stops publishing state as soon as it notices.
    pub async fn run_once(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation = generation, "Engine run started");
        self.set_status_if_current(generation, EngineStatus::Compiling);

        let compiles = EditorSlot::ALL.iter().map(|slot| self.compile_slot(*slot));
        let outcomes = futures::future::join_all(compiles).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(slot_outcome) => results.push(slot_outcome),
                Err(error) => {
                    self.set_status_if_current(generation, EngineStatus::Error);
                    return Err(error);
                }
            }
        }

        if !self.is_current(generation) {
            debug!(generation = generation, "Run superseded during compile");
            return Ok(());
        }
        *self.last_results.lock() = results.clone();

        if results.iter().any(|outcome| !outcome.result.success) {
            // Fail fast: a broken slot invalidates the whole run, so no
            // sandbox instance is created
            self.set_status_if_current(generation, EngineStatus::Error);
            return Ok(());
        }

        self.set_status_if_current(generation, EngineStatus::Running);

        let document = {
            let artifact = |slot: EditorSlot| {
                results
                    .iter()
                    .find(|outcome| outcome.slot == slot)
                    .and_then(|outcome| outcome.result.output.clone())
                    .unwrap_or_default()
            };
            build_document(
                &artifact(EditorSlot::Markup),
                &artifact(EditorSlot::Style),
                &artifact(EditorSlot::Script),
            )
        };

        let mut handle = match self.sandbox_host.launch(&document).await {
            Ok(handle) => handle,
            Err(error) => {
                self.set_status_if_current(generation, EngineStatus::Error);
                return Err(TinkerError::Sandbox(Box::new(error)));
            }
        };

        if !self.is_current(generation) {
            debug!(generation = generation, "Run superseded before install");
            return Ok(());
        }

        let messages = handle.messages.take();
        crate::logging::utils::log_sandbox_replaced(&handle.id.to_string(), generation);
        // Replacing the stored handle drops the previous instance outright
        *self.current.lock() = Some(handle);

        let ready = match messages {
            Some(messages) => self.spawn_message_pump(messages, generation),
            None => {
                self.set_status_if_current(generation, EngineStatus::Error);
                return Err(TinkerError::Sandbox(Box::new(SandboxError::ChannelClosed)));
            }
        };

        match tokio::time::timeout(self.config.ready_timeout, ready).await {
            Ok(Ok(())) => {
                self.set_status_if_current(generation, EngineStatus::Success);
                info!(generation = generation, "Engine run succeeded");
                Ok(())
            }
            Ok(Err(_)) => {
                self.set_status_if_current(generation, EngineStatus::Error);
                Err(TinkerError::Sandbox(Box::new(SandboxError::ChannelClosed)))
            }
            Err(_) => {
                warn!(generation = generation, "Sandbox never reported ready");
                self.set_status_if_current(generation, EngineStatus::Error);
                Err(TinkerError::Sandbox(Box::new(SandboxError::ReadyTimeout {
                    timeout: self.config.ready_timeout,
                })))
            }
        }
    }

    async fn compile_slot(&self, slot: EditorSlot) -> Result<SlotOutcome> {
        let raw = self.editor.language_for(slot);
        let name = self.registry.normalize(&raw);
        crate::logging::utils::log_compile_start(slot.as_str(), &name);

        self.languages.ensure_language(&name).await?;

        let source = self.editor.source_text(slot);
        let started = Instant::now();
        let result = match self.registry.get(&name) {
            Some(language) => language.execute(&source).await,
            // Languages without a registry entry pass through unchanged
            None => RuntimeResult::ok(source),
        };
        crate::logging::utils::log_compile_completion(
            slot.as_str(),
            result.success,
            started.elapsed().as_millis(),
        );

        Ok(SlotOutcome {
            slot,
            language: name,
            result,
        })
    }

    /// Forward console messages from one instance into the feed until the
    /// instance is superseded; resolves the returned channel on readiness
    fn spawn_message_pump(
        &self,
        mut messages: mpsc::Receiver<SandboxMessage>,
        generation: u64,
    ) -> oneshot::Receiver<()> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let console = self.console.clone();
        let current_generation = self.generation.clone();

        tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            while let Some(message) = messages.recv().await {
                if current_generation.load(Ordering::SeqCst) != generation {
                    // Stale instance; discard everything it still says
                    break;
                }
                match message {
                    SandboxMessage::Loaded => {
                        if let Some(sender) = ready_tx.take() {
                            let _ = sender.send(());
                        }
                    }
                    SandboxMessage::Console { level, args } => {
                        console.lock().push(ConsoleMessage {
                            level,
                            args,
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        });

        ready_rx
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_status_if_current(&self, generation: u64, status: EngineStatus) {
        if self.is_current(generation) {
            self.status_tx.send_replace(status);
        }
    }
}
