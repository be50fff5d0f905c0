// Language plugin architecture for Tinkerbox
// Registry, loader and per-category invocation strategies

pub mod host;
pub mod interpreted;
pub mod loader;
pub mod native;
pub mod registry;
pub mod traits;
pub mod transpiled;

// Re-export main types for easier access
pub use host::{CommandCompiler, Compiler, CompilerHost};
pub use interpreted::InterpretedLanguage;
pub use loader::LanguageLoader;
pub use native::{JsonLanguage, NativeLanguage};
pub use registry::LanguageRegistry;
pub use traits::{vendor_keys, EditorSlot, Language, LanguageError, RuntimeResult};
pub use transpiled::TranspiledLanguage;
