// Generic loader for named external resources (script/style bundles)
// Provides per-resource state tracking, request de-duplication, bounded retry with
// exponential backoff, per-attempt timeouts, and dependency ordering

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ResourceError, Result, TinkerError};
use crate::language::host::{CommandCompiler, CompilerHost};

/// Default retry budget per load call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default bound for one fetch attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// What kind of payload a resource is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Script,
    Style,
}

/// Lifecycle state of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Pending,
    Loading,
    Loaded,
    Error,
}

/// Runtime state for one load attempt of one resource
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub status: ResourceStatus,
    pub retry_count: u32,
    pub load_time_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl ResourceRecord {
    fn new() -> Self {
        Self {
            status: ResourceStatus::Pending,
            retry_count: 0,
            load_time_ms: None,
            last_error: None,
        }
    }
}

/// Everything needed to fetch and install one resource
#[derive(Debug, Clone)]
pub struct LoadSpec {
    pub url: Url,
    pub kind: ResourceKind,
    /// Resource ids that must be loaded before this one
    pub dependencies: Vec<String>,
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    /// Compiler capability key this payload installs, if any
    pub capability: Option<String>,
}

impl LoadSpec {
    pub fn new(url: Url, kind: ResourceKind) -> Self {
        Self {
            url,
            kind,
            dependencies: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            capability: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }
}

/// Performs the actual fetch-and-install for one resource
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, id: &str, spec: &LoadSpec) -> std::result::Result<(), ResourceError>;
}

type SharedOutcome = std::result::Result<(), String>;

/// Callback invoked when a resource finishes loading
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Resource loader with de-duplication and bounded retry
///
/// Concurrent `load` calls for the same id share one underlying attempt set and
/// observe the same terminal outcome. Records transition
/// `Pending -> Loading -> {Loaded | Error}`; a later `load` call on an errored
/// record starts a fresh attempt set.
pub struct ResourceLoader {
    fetcher: Arc<dyn ResourceFetcher>,
    records: DashMap<String, ResourceRecord>,
    specs: DashMap<String, LoadSpec>,
    inflight: DashMap<String, watch::Receiver<Option<SharedOutcome>>>,
    subscribers: Mutex<HashMap<String, Vec<CompletionCallback>>>,
}

impl ResourceLoader {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            records: DashMap::new(),
            specs: DashMap::new(),
            inflight: DashMap::new(),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-register a spec so other resources can name it as a dependency
    pub fn register_spec(&self, id: impl Into<String>, spec: LoadSpec) {
        self.specs.insert(id.into(), spec);
    }

    /// Current record for a resource, if a load was ever requested
    pub fn record(&self, id: &str) -> Option<ResourceRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    pub fn status(&self, id: &str) -> ResourceStatus {
        self.records
            .get(id)
            .map(|entry| entry.value().status)
            .unwrap_or(ResourceStatus::Pending)
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.status(id) == ResourceStatus::Loaded
    }

    /// Subscribe to a resource's completion
    ///
    /// Pending subscribers run synchronously when the load completes;
    /// subscribing after completion runs the callback immediately.
    pub fn on_resource_loaded(&self, id: &str, callback: CompletionCallback) {
        if self.is_loaded(id) {
            callback();
            return;
        }
        self.subscribers
            .lock()
            .entry(id.to_string())
            .or_default()
            .push(callback);
    }

    /// Drop all records, specs and pending subscribers
    pub fn clear(&self) {
        self.records.clear();
        self.specs.clear();
        self.subscribers.lock().clear();
    }

    /// Load a resource, de-duplicating against any in-flight load for the same id
    pub async fn load(&self, id: &str, spec: LoadSpec) -> Result<()> {
        self.load_boxed(id.to_string(), spec).await
    }

    fn load_boxed(&self, id: String, spec: LoadSpec) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.is_loaded(&id) {
                return Ok(());
            }

            // Join an in-flight load instead of starting a second one
            if let Some(entry) = self.inflight.get(&id) {
                let receiver = entry.value().clone();
                drop(entry);
                return self.await_outcome(&id, receiver).await;
            }

            let (sender, receiver) = watch::channel(None);
            match self.inflight.entry(id.clone()) {
                dashmap::mapref::entry::Entry::Occupied(existing) => {
                    // Lost the race to another caller
                    let receiver = existing.get().clone();
                    drop(existing);
                    return self.await_outcome(&id, receiver).await;
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(receiver);
                }
            }

            self.specs.insert(id.clone(), spec.clone());
            let outcome = self.drive_load(&id, &spec).await;

            let shared = match &outcome {
                Ok(()) => Ok(()),
                Err(error) => Err(error.to_string()),
            };
            // Publish before removing so late joiners still observe the outcome
            let _ = sender.send(Some(shared));
            self.inflight.remove(&id);

            outcome
        })
    }

    async fn await_outcome(
        &self,
        id: &str,
        mut receiver: watch::Receiver<Option<SharedOutcome>>,
    ) -> Result<()> {
        loop {
            if let Some(outcome) = receiver.borrow().clone() {
                return outcome.map_err(|message| {
                    TinkerError::Resource(Box::new(ResourceError::LoadFailed {
                        id: id.to_string(),
                        message,
                    }))
                });
            }
            if receiver.changed().await.is_err() {
                return Err(TinkerError::Resource(Box::new(ResourceError::LoadFailed {
                    id: id.to_string(),
                    message: "load abandoned before completion".to_string(),
                })));
            }
        }
    }

    async fn drive_load(&self, id: &str, spec: &LoadSpec) -> Result<()> {
        self.update_record(id, |record| {
            record.status = ResourceStatus::Loading;
            record.last_error = None;
        });

        if let Err(error) = self.load_dependencies(id, spec).await {
            self.fail_record(id, &error.to_string());
            return Err(error);
        }

        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 0..=spec.max_retries {
            match self.attempt_fetch(id, spec, attempt).await {
                Ok(()) => {
                    let elapsed = started.elapsed().as_millis() as u64;
                    self.update_record(id, |record| {
                        record.status = ResourceStatus::Loaded;
                        record.load_time_ms = Some(elapsed);
                        record.last_error = None;
                    });
                    debug!(resource_id = %id, load_time_ms = elapsed, "Resource loaded");
                    self.notify_subscribers(id);
                    return Ok(());
                }
                Err(error) => {
                    last_error = error.to_string();
                    self.update_record(id, |record| {
                        record.retry_count = attempt + 1;
                        record.last_error = Some(last_error.clone());
                    });
                    if attempt < spec.max_retries {
                        let delay = backoff_delay(attempt);
                        warn!(
                            resource_id = %id,
                            attempt = attempt + 1,
                            delay_secs = delay.as_secs(),
                            error = %last_error,
                            "Resource load attempt failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.fail_record(id, &last_error);
        Err(TinkerError::Resource(Box::new(
            ResourceError::RetriesExhausted {
                id: id.to_string(),
                attempts: spec.max_retries + 1,
                last_error,
            },
        )))
    }

    async fn attempt_fetch(
        &self,
        id: &str,
        spec: &LoadSpec,
        attempt: u32,
    ) -> std::result::Result<(), ResourceError> {
        match tokio::time::timeout(spec.attempt_timeout, self.fetcher.fetch(id, spec)).await {
            Ok(result) => result,
            Err(_) => Err(ResourceError::AttemptTimeout {
                id: id.to_string(),
                timeout: spec.attempt_timeout,
                attempt,
            }),
        }
    }

    /// Dependencies load in parallel before the resource itself; a dependency
    /// failure fails this resource without a retry budget of its own
    async fn load_dependencies(&self, id: &str, spec: &LoadSpec) -> Result<()> {
        if spec.dependencies.is_empty() {
            return Ok(());
        }

        let mut loads = Vec::with_capacity(spec.dependencies.len());
        for dependency in &spec.dependencies {
            let dep_spec = self.specs.get(dependency).map(|entry| entry.value().clone());
            match dep_spec {
                Some(dep_spec) => loads.push(self.load_boxed(dependency.clone(), dep_spec)),
                None => {
                    return Err(TinkerError::Resource(Box::new(
                        ResourceError::DependencyUnknown {
                            id: id.to_string(),
                            dependency: dependency.clone(),
                        },
                    )))
                }
            }
        }

        let results = futures::future::join_all(loads).await;
        for (dependency, result) in spec.dependencies.iter().zip(results) {
            if let Err(error) = result {
                return Err(TinkerError::Resource(Box::new(
                    ResourceError::DependencyFailed {
                        id: id.to_string(),
                        dependency: dependency.clone(),
                        error: error.to_string(),
                    },
                )));
            }
        }
        Ok(())
    }

    fn update_record(&self, id: &str, apply: impl FnOnce(&mut ResourceRecord)) {
        let mut record = self
            .records
            .entry(id.to_string())
            .or_insert_with(ResourceRecord::new);
        // Loaded is terminal for a record; never regress it
        if record.status == ResourceStatus::Loaded {
            return;
        }
        apply(record.value_mut());
    }

    fn fail_record(&self, id: &str, message: &str) {
        self.update_record(id, |record| {
            record.status = ResourceStatus::Error;
            record.last_error = Some(message.to_string());
        });
    }

    fn notify_subscribers(&self, id: &str) {
        let callbacks = self.subscribers.lock().remove(id);
        if let Some(callbacks) = callbacks {
            for callback in callbacks {
                callback();
            }
        }
    }
}

/// Exponential backoff delay after a failed attempt (0-indexed)
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Bounded poll for a condition that becomes true asynchronously
///
/// Returns true as soon as `check` passes, false once `max_checks` polls at
/// `interval` spacing have all failed.
pub async fn wait_for<F>(mut check: F, max_checks: u32, interval: Duration) -> bool
where
    F: FnMut() -> bool + Send,
{
    for _ in 0..max_checks {
        if check() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Fetches resources over HTTP and installs them under the cache directory
///
/// Script payloads that declare a capability are registered with the compiler
/// host as command compilers run by the configured interpreter.
pub struct HttpResourceFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
    compilers: Arc<CompilerHost>,
    interpreter: Vec<String>,
}

impl HttpResourceFetcher {
    pub fn new(cache_dir: PathBuf, compilers: Arc<CompilerHost>, interpreter: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
            compilers,
            interpreter,
        }
    }

    /// Default cache directory under the platform cache root
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tinkerbox")
            .join("vendors")
    }

    fn payload_path(&self, id: &str, kind: ResourceKind) -> PathBuf {
        let extension = match kind {
            ResourceKind::Script => "js",
            ResourceKind::Style => "css",
        };
        self.cache_dir.join(format!("{id}.{extension}"))
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, id: &str, spec: &LoadSpec) -> std::result::Result<(), ResourceError> {
        let response = self
            .client
            .get(spec.url.clone())
            .send()
            .await
            .map_err(|error| ResourceError::FetchFailed {
                id: id.to_string(),
                url: Some(spec.url.to_string()),
                message: error.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::FetchFailed {
                id: id.to_string(),
                url: Some(spec.url.to_string()),
                message: format!("server returned {status}"),
                status: Some(status.as_u16()),
            });
        }

        let payload = response
            .bytes()
            .await
            .map_err(|error| ResourceError::FetchFailed {
                id: id.to_string(),
                url: Some(spec.url.to_string()),
                message: error.to_string(),
                status: Some(status.as_u16()),
            })?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|error| ResourceError::InstallFailed {
                id: id.to_string(),
                message: error.to_string(),
            })?;

        let path = self.payload_path(id, spec.kind);
        tokio::fs::write(&path, &payload)
            .await
            .map_err(|error| ResourceError::InstallFailed {
                id: id.to_string(),
                message: error.to_string(),
            })?;

        if let Some(capability) = &spec.capability {
            let compiler = CommandCompiler::new(self.interpreter.clone(), path.clone());
            self.compilers.register(capability.clone(), Arc::new(compiler));
        }

        debug!(resource_id = %id, path = %path.display(), "Resource installed");
        Ok(())
    }
}
