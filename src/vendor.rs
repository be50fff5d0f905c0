// Vendor resolver: maps logical resource keys to candidate mirror URLs and
// drives the resource loader through them until one succeeds

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, TinkerError, VendorError};
use crate::language::host::CompilerHost;
use crate::resource::{wait_for, LoadSpec, ResourceKind, ResourceLoader};

/// Bounded polling defaults for capabilities that initialize asynchronously
pub const DEFAULT_CAPABILITY_CHECKS: u32 = 50;
pub const DEFAULT_CAPABILITY_INTERVAL: Duration = Duration::from_millis(100);

/// One downloadable resource bundle and where to find it
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub key: String,
    pub package: String,
    pub version: String,
    /// Path within the package; mirrors serve the package root without it
    pub path: Option<String>,
    /// Explicit override URL tried before any mirror
    pub external: Option<Url>,
    pub primary_mirror: Url,
    pub fallback_mirrors: Vec<Url>,
    /// Lower loads first when several critical vendors must preload
    pub priority: u32,
    pub critical: bool,
    pub kind: ResourceKind,
    /// Compiler-host key to poll for after the payload installs
    pub capability: Option<String>,
    /// Resource ids that must load before this vendor
    pub dependencies: Vec<String>,
}

impl VendorConfig {
    pub fn new(
        key: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
        kind: ResourceKind,
        primary_mirror: Url,
    ) -> Self {
        Self {
            key: key.into(),
            package: package.into(),
            version: version.into(),
            path: None,
            external: None,
            primary_mirror,
            fallback_mirrors: Vec::new(),
            priority: 100,
            critical: false,
            kind,
            capability: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_external(mut self, external: Url) -> Self {
        self.external = Some(external);
        self
    }

    pub fn with_fallback_mirrors(mut self, mirrors: Vec<Url>) -> Self {
        self.fallback_mirrors = mirrors;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    fn mirror_url(&self, mirror: &Url) -> std::result::Result<Url, VendorError> {
        let mut spec = String::from(mirror.as_str());
        if !spec.ends_with('/') {
            spec.push('/');
        }
        spec.push_str(&format!("{}@{}", self.package, self.version));
        if let Some(path) = &self.path {
            spec.push('/');
            spec.push_str(path.trim_start_matches('/'));
        }
        Url::parse(&spec).map_err(|_| VendorError::InvalidMirror {
            key: self.key.clone(),
            url: spec,
        })
    }
}

/// Where the resolver checks for installed capabilities
pub trait CapabilitySource: Send + Sync {
    fn is_ready(&self, key: &str) -> bool;
}

impl CapabilitySource for CompilerHost {
    fn is_ready(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// Tuning for vendor loads
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    pub capability_checks: u32,
    pub capability_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::resource::DEFAULT_MAX_RETRIES,
            attempt_timeout: crate::resource::DEFAULT_ATTEMPT_TIMEOUT,
            capability_checks: DEFAULT_CAPABILITY_CHECKS,
            capability_interval: DEFAULT_CAPABILITY_INTERVAL,
        }
    }
}

/// Resolves vendor keys to ordered candidate URLs and loads the first that works
pub struct VendorResolver {
    loader: Arc<ResourceLoader>,
    vendors: DashMap<String, VendorConfig>,
    capabilities: Arc<dyn CapabilitySource>,
    config: ResolverConfig,
}

impl VendorResolver {
    pub fn new(
        loader: Arc<ResourceLoader>,
        capabilities: Arc<dyn CapabilitySource>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            loader,
            vendors: DashMap::new(),
            capabilities,
            config,
        }
    }

    pub fn register_vendor(&self, config: VendorConfig) -> Result<()> {
        if self.vendors.contains_key(&config.key) {
            return Err(TinkerError::Vendor(Box::new(VendorError::DuplicateVendor {
                key: config.key,
            })));
        }
        if let Err(error) = semver::Version::parse(&config.version) {
            return Err(TinkerError::Vendor(Box::new(VendorError::InvalidVersion {
                key: config.key,
                version: config.version,
                error: error.to_string(),
            })));
        }
        self.vendors.insert(config.key.clone(), config);
        Ok(())
    }

    pub fn unregister_vendor(&self, key: &str) -> bool {
        self.vendors.remove(key).is_some()
    }

    /// Point a registered vendor at an explicit override URL
    pub fn set_external(&self, key: &str, external: Url) -> Result<()> {
        match self.vendors.get_mut(key) {
            Some(mut entry) => {
                entry.external = Some(external);
                Ok(())
            }
            None => Err(TinkerError::Vendor(Box::new(VendorError::UnknownVendor {
                key: key.to_string(),
                available: self.vendors.iter().map(|e| e.key().clone()).collect(),
            }))),
        }
    }

    pub fn get(&self, key: &str) -> Option<VendorConfig> {
        self.vendors.get(key).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<VendorConfig> {
        let mut vendors: Vec<VendorConfig> = self
            .vendors
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        vendors.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.key.cmp(&b.key)));
        vendors
    }

    /// Ordered candidate URLs: external override, primary mirror, fallbacks
    ///
    /// Always yields at least one URL for a registered vendor.
    pub fn resolve_urls(&self, key: &str) -> Result<Vec<Url>> {
        let config = self.get(key).ok_or_else(|| {
            TinkerError::Vendor(Box::new(VendorError::UnknownVendor {
                key: key.to_string(),
                available: self.vendors.iter().map(|e| e.key().clone()).collect(),
            }))
        })?;

        let mut urls = Vec::new();
        if let Some(external) = &config.external {
            urls.push(external.clone());
        }
        urls.push(
            config
                .mirror_url(&config.primary_mirror)
                .map_err(|error| TinkerError::Vendor(Box::new(error)))?,
        );
        for mirror in &config.fallback_mirrors {
            urls.push(
                config
                    .mirror_url(mirror)
                    .map_err(|error| TinkerError::Vendor(Box::new(error)))?,
            );
        }
        Ok(urls)
    }

    /// Load a vendor, walking its candidate URLs until one succeeds
    pub async fn load_vendor(&self, key: &str) -> Result<()> {
        let config = self.get(key).ok_or_else(|| {
            TinkerError::Vendor(Box::new(VendorError::UnknownVendor {
                key: key.to_string(),
                available: self.vendors.iter().map(|e| e.key().clone()).collect(),
            }))
        })?;

        if self.loader.is_loaded(key) {
            return Ok(());
        }

        let urls = self.resolve_urls(key)?;
        let mut last_error = String::new();

        for url in &urls {
            let spec = LoadSpec::new(url.clone(), config.kind)
                .with_dependencies(config.dependencies.clone())
                .with_max_retries(self.config.max_retries)
                .with_attempt_timeout(self.config.attempt_timeout);
            let spec = match &config.capability {
                Some(capability) => spec.with_capability(capability.clone()),
                None => spec,
            };

            match self.loader.load(key, spec).await {
                Ok(()) => {
                    if let Some(capability) = &config.capability {
                        // Injection completing does not guarantee the capability
                        // initialized; poll before declaring success
                        let ready = wait_for(
                            || self.capabilities.is_ready(capability),
                            self.config.capability_checks,
                            self.config.capability_interval,
                        )
                        .await;
                        if !ready {
                            last_error = VendorError::CapabilityTimeout {
                                key: key.to_string(),
                                checks: self.config.capability_checks,
                            }
                            .to_string();
                            warn!(vendor = %key, url = %url, "Capability never appeared, trying next mirror");
                            continue;
                        }
                    }
                    debug!(vendor = %key, url = %url, "Vendor loaded");
                    return Ok(());
                }
                Err(error) => {
                    last_error = error.to_string();
                    warn!(vendor = %key, url = %url, error = %last_error, "Mirror failed");
                }
            }
        }

        Err(TinkerError::Vendor(Box::new(VendorError::AllMirrorsFailed {
            key: key.to_string(),
            attempted: urls.len(),
            last_error,
        })))
    }

    /// Preload every critical vendor, lowest priority value first
    pub async fn load_critical(&self) -> Result<()> {
        let critical: Vec<VendorConfig> =
            self.list().into_iter().filter(|v| v.critical).collect();
        for vendor in critical {
            self.load_vendor(&vendor.key).await?;
        }
        Ok(())
    }
}

/// Register the vendor set backing the built-in languages
pub fn register_builtin_vendors(resolver: &VendorResolver) -> Result<()> {
    let primary = Url::parse("https://cdn.jsdelivr.net/npm/").expect("static mirror URL");
    let fallbacks = vec![
        Url::parse("https://unpkg.com/").expect("static mirror URL"),
        Url::parse("https://fastly.jsdelivr.net/npm/").expect("static mirror URL"),
    ];

    resolver.register_vendor(
        VendorConfig::new(
            "typescript-compiler",
            "typescript",
            "5.3.3",
            ResourceKind::Script,
            primary.clone(),
        )
        .with_path("lib/typescript.js")
        .with_fallback_mirrors(fallbacks.clone())
        .with_capability("typescript-compiler")
        .with_priority(10),
    )?;

    resolver.register_vendor(
        VendorConfig::new(
            "markdown-compiler",
            "marked",
            "9.1.2",
            ResourceKind::Script,
            primary.clone(),
        )
        .with_path("marked.min.js")
        .with_fallback_mirrors(fallbacks.clone())
        .with_capability("markdown-compiler")
        .with_priority(20),
    )?;

    resolver.register_vendor(
        VendorConfig::new(
            "python-runtime",
            "brython",
            "3.12.0",
            ResourceKind::Script,
            primary,
        )
        .with_path("brython.min.js")
        .with_fallback_mirrors(fallbacks)
        .with_capability("python-runtime")
        .with_priority(30),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> VendorConfig {
        VendorConfig::new(
            "ts",
            "typescript",
            "5.3.3",
            ResourceKind::Script,
            Url::parse("https://cdn.jsdelivr.net/npm/").unwrap(),
        )
        .with_path("lib/typescript.js")
        .with_fallback_mirrors(vec![Url::parse("https://unpkg.com").unwrap()])
    }

    #[test]
    fn test_mirror_url_construction() {
        let config = sample_config();
        let url = config.mirror_url(&config.primary_mirror).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.jsdelivr.net/npm/typescript@5.3.3/lib/typescript.js"
        );

        // mirrors without a trailing slash still join cleanly
        let url = config.mirror_url(&config.fallback_mirrors[0]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://unpkg.com/typescript@5.3.3/lib/typescript.js"
        );
    }

    #[test]
    fn test_mirror_url_without_path() {
        let config = VendorConfig::new(
            "md",
            "marked",
            "9.1.2",
            ResourceKind::Script,
            Url::parse("https://cdn.jsdelivr.net/npm/").unwrap(),
        );
        let url = config.mirror_url(&config.primary_mirror).unwrap();
        assert_eq!(url.as_str(), "https://cdn.jsdelivr.net/npm/marked@9.1.2");
    }
}
