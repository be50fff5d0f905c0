// Vendor resolver behavior: candidate URL ordering, mirror fallback,
// aggregate failures and capability polling

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use tinkerbox::{
    Compiler, CompilerHost, LoadSpec, ResolverConfig, ResourceError, ResourceFetcher,
    ResourceKind, ResourceLoader, ResourceStatus, VendorConfig, VendorResolver,
};

struct NoopCompiler;

#[async_trait]
impl Compiler for NoopCompiler {
    async fn transform(&self, source: &str) -> Result<String, String> {
        Ok(source.to_string())
    }
}

/// Fetcher that fails any URL on a listed host and, on success, installs the
/// spec's capability into the compiler host (mirroring the HTTP fetcher)
struct MirrorFetcher {
    fail_hosts: Vec<String>,
    install_capability: bool,
    compilers: Arc<CompilerHost>,
    attempts: Mutex<Vec<String>>,
}

impl MirrorFetcher {
    fn new(compilers: Arc<CompilerHost>, fail_hosts: Vec<&str>) -> Self {
        Self {
            fail_hosts: fail_hosts.into_iter().map(String::from).collect(),
            install_capability: true,
            compilers,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn without_capability_install(mut self) -> Self {
        self.install_capability = false;
        self
    }

    fn attempted_urls(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl ResourceFetcher for MirrorFetcher {
    async fn fetch(&self, id: &str, spec: &LoadSpec) -> Result<(), ResourceError> {
        self.attempts.lock().push(spec.url.to_string());
        let host = spec.url.host_str().unwrap_or_default().to_string();
        if self.fail_hosts.contains(&host) {
            return Err(ResourceError::FetchFailed {
                id: id.to_string(),
                url: Some(spec.url.to_string()),
                message: "connection refused".to_string(),
                status: None,
            });
        }
        if self.install_capability {
            if let Some(capability) = &spec.capability {
                self.compilers.register(capability.clone(), Arc::new(NoopCompiler));
            }
        }
        Ok(())
    }
}

fn fast_config() -> ResolverConfig {
    ResolverConfig {
        max_retries: 0,
        attempt_timeout: Duration::from_secs(1),
        capability_checks: 3,
        capability_interval: Duration::from_millis(10),
    }
}

fn resolver_with(fail_hosts: Vec<&str>) -> (Arc<VendorResolver>, Arc<MirrorFetcher>, Arc<ResourceLoader>) {
    let compilers = Arc::new(CompilerHost::new());
    let fetcher = Arc::new(MirrorFetcher::new(compilers.clone(), fail_hosts));
    let loader = Arc::new(ResourceLoader::new(fetcher.clone()));
    let resolver = Arc::new(VendorResolver::new(loader.clone(), compilers, fast_config()));
    (resolver, fetcher, loader)
}

fn sample_vendor() -> VendorConfig {
    VendorConfig::new(
        "widget-compiler",
        "widget",
        "1.2.3",
        ResourceKind::Script,
        Url::parse("https://primary.test/npm/").unwrap(),
    )
    .with_path("dist/widget.js")
    .with_fallback_mirrors(vec![Url::parse("https://fallback.test/npm/").unwrap()])
}

#[tokio::test]
async fn test_resolve_urls_ordering() {
    let (resolver, _, _) = resolver_with(vec![]);
    resolver
        .register_vendor(
            sample_vendor().with_external(Url::parse("https://internal.test/widget.js").unwrap()),
        )
        .unwrap();

    let urls = resolver.resolve_urls("widget-compiler").unwrap();
    let urls: Vec<String> = urls.into_iter().map(|u| u.to_string()).collect();
    assert_eq!(
        urls,
        vec![
            "https://internal.test/widget.js".to_string(),
            "https://primary.test/npm/widget@1.2.3/dist/widget.js".to_string(),
            "https://fallback.test/npm/widget@1.2.3/dist/widget.js".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_resolve_always_yields_a_candidate() {
    let (resolver, _, _) = resolver_with(vec![]);
    resolver
        .register_vendor(VendorConfig::new(
            "bare",
            "bare",
            "0.1.0",
            ResourceKind::Style,
            Url::parse("https://primary.test/npm/").unwrap(),
        ))
        .unwrap();

    let urls = resolver.resolve_urls("bare").unwrap();
    assert_eq!(urls.len(), 1);
}

#[tokio::test]
async fn test_mirror_fallback_succeeds() {
    let (resolver, fetcher, loader) = resolver_with(vec!["primary.test"]);
    resolver.register_vendor(sample_vendor()).unwrap();

    resolver.load_vendor("widget-compiler").await.unwrap();

    assert_eq!(loader.status("widget-compiler"), ResourceStatus::Loaded);
    let attempts = fetcher.attempted_urls();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].contains("primary.test"));
    assert!(attempts[1].contains("fallback.test"));
}

#[tokio::test]
async fn test_all_mirrors_failing_aggregates() {
    let (resolver, _, _) = resolver_with(vec!["primary.test", "fallback.test"]);
    resolver.register_vendor(sample_vendor()).unwrap();

    let error = resolver.load_vendor("widget-compiler").await.unwrap_err();
    let message = error.to_string();
    assert!(message.contains("All 2 mirrors failed"));
    assert!(message.contains("widget-compiler"));
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn test_unknown_vendor_rejected() {
    let (resolver, _, _) = resolver_with(vec![]);
    let error = resolver.load_vendor("nope").await.unwrap_err();
    assert!(error.to_string().contains("Unknown vendor"));
}

#[tokio::test]
async fn test_duplicate_vendor_rejected() {
    let (resolver, _, _) = resolver_with(vec![]);
    resolver.register_vendor(sample_vendor()).unwrap();
    let error = resolver.register_vendor(sample_vendor()).unwrap_err();
    assert!(error.to_string().contains("already registered"));
}

#[tokio::test]
async fn test_invalid_version_rejected() {
    let (resolver, _, _) = resolver_with(vec![]);
    let error = resolver
        .register_vendor(VendorConfig::new(
            "bad",
            "bad",
            "latest",
            ResourceKind::Script,
            Url::parse("https://primary.test/npm/").unwrap(),
        ))
        .unwrap_err();
    assert!(error.to_string().contains("Invalid vendor version"));
}

#[tokio::test(start_paused = true)]
async fn test_capability_polling_times_out() {
    let compilers = Arc::new(CompilerHost::new());
    let fetcher = Arc::new(
        MirrorFetcher::new(compilers.clone(), vec![]).without_capability_install(),
    );
    let loader = Arc::new(ResourceLoader::new(fetcher));
    let resolver = VendorResolver::new(loader, compilers, fast_config());

    resolver
        .register_vendor(sample_vendor().with_capability("widget-compiler"))
        .unwrap();

    let error = resolver.load_vendor("widget-compiler").await.unwrap_err();
    assert!(error.to_string().contains("capability"));
}

#[tokio::test(start_paused = true)]
async fn test_capability_appearing_late_succeeds() {
    let compilers = Arc::new(CompilerHost::new());
    let fetcher = Arc::new(
        MirrorFetcher::new(compilers.clone(), vec![]).without_capability_install(),
    );
    let loader = Arc::new(ResourceLoader::new(fetcher));
    let resolver = VendorResolver::new(loader, compilers.clone(), fast_config());

    resolver
        .register_vendor(sample_vendor().with_capability("widget-compiler"))
        .unwrap();

    // the bundle initializes asynchronously after injection
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(15)).await;
        compilers.register("widget-compiler", Arc::new(NoopCompiler));
    });

    resolver.load_vendor("widget-compiler").await.unwrap();
}

#[tokio::test]
async fn test_load_critical_respects_priority() {
    let (resolver, fetcher, _) = resolver_with(vec![]);
    let mirror = Url::parse("https://primary.test/npm/").unwrap();

    resolver
        .register_vendor(
            VendorConfig::new("later", "later", "1.0.0", ResourceKind::Script, mirror.clone())
                .with_priority(20)
                .critical(),
        )
        .unwrap();
    resolver
        .register_vendor(
            VendorConfig::new("first", "first", "1.0.0", ResourceKind::Script, mirror.clone())
                .with_priority(5)
                .critical(),
        )
        .unwrap();
    resolver
        .register_vendor(VendorConfig::new(
            "optional",
            "optional",
            "1.0.0",
            ResourceKind::Script,
            mirror,
        ))
        .unwrap();

    resolver.load_critical().await.unwrap();

    let attempts = fetcher.attempted_urls();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].contains("first@1.0.0"));
    assert!(attempts[1].contains("later@1.0.0"));
}

#[tokio::test]
async fn test_external_override_takes_precedence() {
    let (resolver, fetcher, _) = resolver_with(vec![]);
    resolver.register_vendor(sample_vendor()).unwrap();
    resolver
        .set_external(
            "widget-compiler",
            Url::parse("https://internal.test/widget.js").unwrap(),
        )
        .unwrap();

    resolver.load_vendor("widget-compiler").await.unwrap();

    let attempts = fetcher.attempted_urls();
    assert_eq!(attempts, vec!["https://internal.test/widget.js".to_string()]);
}
