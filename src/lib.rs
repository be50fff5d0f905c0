// Tinkerbox - Library module
// Multi-language playground engine: vendor resource loading with mirror
// fallback, per-language compilation strategies, and process-isolated
// sandboxed execution

pub mod cli;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod language;
pub mod logging;
pub mod resource;
pub mod sandbox;
pub mod vendor;

// Re-export main types for easier access
pub use config::{EngineTuning, PlaygroundConfig, SlotConfig, SlotsConfig, VendorOverride};
pub use editor::{EditorSurface, Workspace};
pub use engine::{Engine, EngineConfig, EngineStatus, SlotOutcome};
pub use error::{
    exit_codes, CliError, ConfigError, ResourceError, Result, SandboxError, TinkerError,
    VendorError,
};
pub use language::{
    CommandCompiler, Compiler, CompilerHost, EditorSlot, InterpretedLanguage, JsonLanguage,
    Language, LanguageError, LanguageLoader, LanguageRegistry, NativeLanguage, RuntimeResult,
    TranspiledLanguage,
};
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use resource::{
    HttpResourceFetcher, LoadSpec, ResourceFetcher, ResourceKind, ResourceLoader, ResourceRecord,
    ResourceStatus,
};
pub use sandbox::{
    build_document, ConsoleLevel, ConsoleMessage, ProcessSandboxHost, SandboxHandle, SandboxHost,
    SandboxMessage,
};
pub use vendor::{
    register_builtin_vendors, CapabilitySource, ResolverConfig, VendorConfig, VendorResolver,
};

/// Crate metadata
pub const NAME: &str = "tinkerbox";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
