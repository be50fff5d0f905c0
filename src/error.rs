// Error handling framework for Tinkerbox
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TinkerError>;

/// Main error type for Tinkerbox with per-domain sub-hierarchies
#[derive(Debug, Error)]
pub enum TinkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Resource load failed: {0}")]
    Resource(#[from] Box<ResourceError>),

    #[error("Vendor resolution failed: {0}")]
    Vendor(#[from] Box<VendorError>),

    #[error("Language error: {0}")]
    Language(#[from] Box<crate::language::LanguageError>),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] Box<SandboxError>),

    #[error("CLI argument error: {0}")]
    Cli(#[from] Box<CliError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Configuration file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Missing required field: {field}")]
    MissingField {
        field: String,
        file_path: Option<PathBuf>,
    },

    #[error("Invalid configuration value: {message}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
    },

    #[error("Source file not found for {slot} slot: {path}")]
    SourceFileMissing { slot: String, path: PathBuf },
}

/// Resource loader errors
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Fetch failed for resource {id}: {message}")]
    FetchFailed {
        id: String,
        url: Option<String>,
        message: String,
        status: Option<u16>,
    },

    #[error("Resource {id} timed out after {timeout:?} (attempt {attempt})")]
    AttemptTimeout {
        id: String,
        timeout: Duration,
        attempt: u32,
    },

    #[error("Resource {id} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Resource {id} failed: {message}")]
    LoadFailed { id: String, message: String },

    #[error("Dependency {dependency} of resource {id} failed: {error}")]
    DependencyFailed {
        id: String,
        dependency: String,
        error: String,
    },

    #[error("Dependency {dependency} of resource {id} has no registered spec")]
    DependencyUnknown { id: String, dependency: String },

    #[error("Install step failed for resource {id}: {message}")]
    InstallFailed { id: String, message: String },
}

/// Vendor resolver errors
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("Unknown vendor key: {key}")]
    UnknownVendor {
        key: String,
        available: Vec<String>,
    },

    #[error("Vendor key already registered: {key}")]
    DuplicateVendor { key: String },

    #[error("Invalid vendor version for {key}: {version}")]
    InvalidVersion {
        key: String,
        version: String,
        error: String,
    },

    #[error("Invalid mirror URL for {key}: {url}")]
    InvalidMirror { key: String, url: String },

    #[error("All {attempted} mirrors failed for vendor {key}: {last_error}")]
    AllMirrorsFailed {
        key: String,
        attempted: usize,
        last_error: String,
    },

    #[error("Vendor {key} loaded but capability never appeared ({checks} checks)")]
    CapabilityTimeout { key: String, checks: u32 },
}

/// Sandbox and execution-context errors
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Sandbox runner not found: {command}")]
    RunnerNotFound {
        command: String,
        suggestion: Option<String>,
    },

    #[error("Failed to spawn sandbox process: {command}")]
    SpawnFailed { command: String, error: String },

    #[error("Sandbox did not report ready within {timeout:?}")]
    ReadyTimeout { timeout: Duration },

    #[error("Failed to stage sandbox document: {message}")]
    DocumentStaging { message: String },

    #[error("Sandbox channel closed before ready")]
    ChannelClosed,
}

/// CLI argument errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid argument: {argument}")]
    InvalidArgument {
        argument: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("Conflicting arguments: {first} and {second}")]
    ConflictingArguments {
        first: String,
        second: String,
        suggestion: String,
    },
}

/// Exit codes for the CLI surface
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const RESOURCE_ERROR: i32 = 3;
    pub const COMPILE_FAILURE: i32 = 4;
    pub const SANDBOX_ERROR: i32 = 5;
    pub const TIMEOUT_ERROR: i32 = 6;
    pub const CLI_ERROR: i32 = 7;
}

impl TinkerError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TinkerError::Config(_) => exit_codes::CONFIG_ERROR,
            TinkerError::Resource(resource_err) => match resource_err.as_ref() {
                ResourceError::AttemptTimeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::RESOURCE_ERROR,
            },
            TinkerError::Vendor(vendor_err) => match vendor_err.as_ref() {
                VendorError::CapabilityTimeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::RESOURCE_ERROR,
            },
            TinkerError::Language(_) => exit_codes::COMPILE_FAILURE,
            TinkerError::Sandbox(sandbox_err) => match sandbox_err.as_ref() {
                SandboxError::ReadyTimeout { .. } => exit_codes::TIMEOUT_ERROR,
                _ => exit_codes::SANDBOX_ERROR,
            },
            TinkerError::Cli(_) => exit_codes::CLI_ERROR,
            TinkerError::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        let formatter = ErrorFormatter::new(use_colors);
        formatter.format_error(self)
    }
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &TinkerError) -> String {
        use tracing::error;

        match error {
            TinkerError::Config(_) => {
                error!(error_type = "config", error = %error, "Configuration error occurred");
            }
            TinkerError::Resource(_) => {
                error!(error_type = "resource", error = %error, "Resource load failed");
            }
            TinkerError::Vendor(_) => {
                error!(error_type = "vendor", error = %error, "Vendor resolution failed");
            }
            TinkerError::Language(_) => {
                error!(error_type = "language", error = %error, "Language error occurred");
            }
            TinkerError::Sandbox(_) => {
                error!(error_type = "sandbox", error = %error, "Sandbox error occurred");
            }
            TinkerError::Cli(_) => {
                error!(error_type = "cli", error = %error, "CLI error occurred");
            }
            TinkerError::Io(_) => {
                error!(error_type = "io", error = %error, "IO operation failed");
            }
        }

        let mut output = String::new();

        if self.use_colors {
            output.push_str("\x1b[31m");
        }
        output.push_str("Error: ");
        if self.use_colors {
            output.push_str("\x1b[0m");
        }
        output.push_str(&error.to_string());

        match error {
            TinkerError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            TinkerError::Resource(resource_err) => {
                self.add_resource_context(&mut output, resource_err.as_ref());
            }
            TinkerError::Vendor(vendor_err) => {
                self.add_vendor_context(&mut output, vendor_err.as_ref());
            }
            TinkerError::Sandbox(sandbox_err) => {
                self.add_sandbox_context(&mut output, sandbox_err.as_ref());
            }
            TinkerError::Cli(cli_err) => {
                self.add_cli_context(&mut output, cli_err.as_ref());
            }
            _ => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            ConfigError::InvalidValue { expected, .. } => {
                output.push_str(&format!("\n  Expected: {expected}"));
            }
            _ => {}
        }
    }

    fn add_resource_context(&self, output: &mut String, error: &ResourceError) {
        match error {
            ResourceError::FetchFailed { url: Some(url), .. } => {
                output.push_str(&format!("\n  URL: {url}"));
            }
            ResourceError::RetriesExhausted { attempts, .. } => {
                output.push_str(&format!("\n  Attempts: {attempts}"));
                output
                    .push_str("\n  Help: Check network connectivity or configure a fallback mirror");
            }
            _ => {}
        }
    }

    fn add_vendor_context(&self, output: &mut String, error: &VendorError) {
        match error {
            VendorError::UnknownVendor { available, .. } if !available.is_empty() => {
                output.push_str(&format!("\n  Available vendors: {}", available.join(", ")));
            }
            VendorError::AllMirrorsFailed { attempted, .. } => {
                output.push_str(&format!("\n  Mirrors attempted: {attempted}"));
            }
            _ => {}
        }
    }

    fn add_sandbox_context(&self, output: &mut String, error: &SandboxError) {
        match error {
            SandboxError::RunnerNotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            SandboxError::ReadyTimeout { timeout } => {
                output.push_str(&format!("\n  Timeout: {timeout:?}"));
            }
            _ => {}
        }
    }

    fn add_cli_context(&self, output: &mut String, error: &CliError) {
        match error {
            CliError::InvalidArgument {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            CliError::ConflictingArguments { suggestion, .. } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            CliError::InvalidArgument { suggestion: None, .. } => {}
        }
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}

impl From<serde_yaml::Error> for TinkerError {
    fn from(error: serde_yaml::Error) -> Self {
        TinkerError::Config(Box::<ConfigError>::from(error))
    }
}
