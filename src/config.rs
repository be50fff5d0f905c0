// Configuration handling for Tinkerbox: the playground.yml project file
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::editor::{EditorSurface, Workspace};
use crate::engine::EngineConfig;
use crate::error::{ConfigError, Result, TinkerError};
use crate::language::EditorSlot;
use crate::vendor::{ResolverConfig, VendorResolver};

pub const DEFAULT_CONFIG_FILE: &str = "playground.yml";

/// Top-level playground project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub slots: SlotsConfig,

    #[serde(default)]
    pub engine: EngineTuning,

    /// Per-vendor overrides, e.g. pinning a key to an internal mirror
    #[serde(default)]
    pub vendors: Vec<VendorOverride>,
}

/// One editor slot's source and language assignment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotConfig {
    pub language: Option<String>,
    /// Path to a source file, relative to the config file
    pub file: Option<PathBuf>,
    /// Inline source; mutually exclusive with `file`
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotsConfig {
    #[serde(default)]
    pub markup: SlotConfig,
    #[serde(default)]
    pub style: SlotConfig,
    #[serde(default)]
    pub script: SlotConfig,
}

impl SlotsConfig {
    pub fn slot(&self, slot: EditorSlot) -> &SlotConfig {
        match slot {
            EditorSlot::Markup => &self.markup,
            EditorSlot::Style => &self.style,
            EditorSlot::Script => &self.script,
        }
    }
}

/// Engine tuning knobs with conservative defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    pub max_retries: u32,
    pub attempt_timeout_secs: u64,
    pub ready_timeout_secs: u64,
    pub capability_checks: u32,
    pub capability_interval_ms: u64,
    /// Command that executes a staged document and emits JSON messages
    pub sandbox_runner: Vec<String>,
    /// Command that runs fetched compiler bundles
    pub compiler_interpreter: Vec<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            max_retries: crate::resource::DEFAULT_MAX_RETRIES,
            attempt_timeout_secs: 30,
            ready_timeout_secs: 10,
            capability_checks: crate::vendor::DEFAULT_CAPABILITY_CHECKS,
            capability_interval_ms: 100,
            sandbox_runner: vec!["tinkerbox-runner".to_string()],
            compiler_interpreter: vec!["node".to_string()],
            cache_dir: None,
        }
    }
}

impl EngineTuning {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_retries: self.max_retries,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            capability_checks: self.capability_checks,
            capability_interval: Duration::from_millis(self.capability_interval_ms),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            ready_timeout: Duration::from_secs(self.ready_timeout_secs),
        }
    }
}

/// Override for one registered vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOverride {
    pub key: String,
    /// Explicit URL tried before any mirror
    pub external: String,
}

impl PlaygroundConfig {
    /// Load and validate a playground.yml
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|_| {
            TinkerError::Config(Box::new(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(format!(
                    "create a {DEFAULT_CONFIG_FILE} or pass --config"
                )),
            }))
        })?;
        let config = Self::from_yaml(&contents).map_err(|error| match error {
            TinkerError::Config(boxed) => match *boxed {
                ConfigError::InvalidYaml {
                    message,
                    line,
                    column,
                    ..
                } => TinkerError::Config(Box::new(ConfigError::InvalidYaml {
                    message,
                    line,
                    column,
                    file_path: Some(path.to_path_buf()),
                })),
                other => TinkerError::Config(Box::new(other)),
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: PlaygroundConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for slot in EditorSlot::ALL {
            let slot_config = self.slots.slot(slot);
            if slot_config.file.is_some() && slot_config.source.is_some() {
                return Err(TinkerError::Config(Box::new(ConfigError::InvalidValue {
                    message: format!("{slot} slot sets both file and source"),
                    field: format!("slots.{slot}"),
                    value: "file + source".to_string(),
                    expected: "exactly one of file or source".to_string(),
                })));
            }
        }

        if self.engine.attempt_timeout_secs == 0 {
            return Err(TinkerError::Config(Box::new(ConfigError::InvalidValue {
                message: "attempt timeout must be positive".to_string(),
                field: "engine.attempt_timeout_secs".to_string(),
                value: "0".to_string(),
                expected: "a positive number of seconds".to_string(),
            })));
        }
        if self.engine.ready_timeout_secs == 0 {
            return Err(TinkerError::Config(Box::new(ConfigError::InvalidValue {
                message: "sandbox ready timeout must be positive".to_string(),
                field: "engine.ready_timeout_secs".to_string(),
                value: "0".to_string(),
                expected: "a positive number of seconds".to_string(),
            })));
        }
        if self.engine.sandbox_runner.is_empty() {
            return Err(TinkerError::Config(Box::new(ConfigError::MissingField {
                field: "engine.sandbox_runner".to_string(),
                file_path: None,
            })));
        }

        for vendor in &self.vendors {
            if Url::parse(&vendor.external).is_err() {
                return Err(TinkerError::Config(Box::new(ConfigError::InvalidValue {
                    message: format!("vendor override for {} is not a URL", vendor.key),
                    field: "vendors.external".to_string(),
                    value: vendor.external.clone(),
                    expected: "an absolute http(s) URL".to_string(),
                })));
            }
        }

        Ok(())
    }

    /// Apply external-URL overrides to registered vendors
    pub fn apply_vendor_overrides(&self, resolver: &VendorResolver) -> Result<()> {
        for vendor in &self.vendors {
            let external =
                Url::parse(&vendor.external).map_err(|_| {
                    TinkerError::Config(Box::new(ConfigError::InvalidValue {
                        message: format!("vendor override for {} is not a URL", vendor.key),
                        field: "vendors.external".to_string(),
                        value: vendor.external.clone(),
                        expected: "an absolute http(s) URL".to_string(),
                    }))
                })?;
            resolver.set_external(&vendor.key, external)?;
        }
        Ok(())
    }

    /// Populate a workspace with the configured slot sources and languages
    ///
    /// Relative source paths resolve against `base_dir` (the config file's
    /// directory).
    pub fn apply_to_workspace(&self, workspace: &Workspace, base_dir: &Path) -> Result<()> {
        for slot in EditorSlot::ALL {
            let slot_config = self.slots.slot(slot);

            if let Some(language) = &slot_config.language {
                workspace.set_language(slot, language);
            }

            if let Some(source) = &slot_config.source {
                workspace.set_source(slot, source.clone());
            } else if let Some(file) = &slot_config.file {
                let path = if file.is_absolute() {
                    file.clone()
                } else {
                    base_dir.join(file)
                };
                let source = std::fs::read_to_string(&path).map_err(|_| {
                    TinkerError::Config(Box::new(ConfigError::SourceFileMissing {
                        slot: slot.to_string(),
                        path,
                    }))
                })?;
                workspace.set_source(slot, source);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlaygroundConfig::default();
        assert_eq!(config.engine.max_retries, 3);
        assert_eq!(config.engine.attempt_timeout_secs, 30);
        assert_eq!(config.engine.capability_checks, 50);
        assert!(config.vendors.is_empty());
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = PlaygroundConfig::from_yaml("slots:\n  script:\n    language: typescript\n")
            .unwrap();
        assert_eq!(
            config.slots.script.language.as_deref(),
            Some("typescript")
        );
        assert!(config.slots.markup.language.is_none());
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r##"
slots:
  markup:
    language: markdown
    source: "# Title"
  style:
    language: css
    file: style.css
  script:
    language: python
    source: "print('hi')"
engine:
  max_retries: 1
  ready_timeout_secs: 5
  sandbox_runner: ["node", "/opt/runner.js"]
vendors:
  - key: python-runtime
    external: "https://internal.example/brython.js"
"##;
        let config = PlaygroundConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.engine.max_retries, 1);
        assert_eq!(config.engine.ready_timeout_secs, 5);
        assert_eq!(config.vendors.len(), 1);
        assert_eq!(config.slots.style.file.as_deref(), Some(Path::new("style.css")));
    }

    #[test]
    fn test_rejects_file_and_source_together() {
        let yaml = "slots:\n  script:\n    file: a.js\n    source: \"x\"\n";
        assert!(PlaygroundConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let yaml = "engine:\n  ready_timeout_secs: 0\n";
        assert!(PlaygroundConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_vendor_override() {
        let yaml = "vendors:\n  - key: x\n    external: \"not a url\"\n";
        assert!(PlaygroundConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let error = PlaygroundConfig::from_yaml("slots: [").unwrap_err();
        assert!(error.to_string().contains("Invalid YAML"));
    }

    #[test]
    fn test_apply_to_workspace_inline_sources() {
        let config = PlaygroundConfig::from_yaml(
            "slots:\n  script:\n    language: typescript\n    source: \"let x = 1;\"\n",
        )
        .unwrap();
        let workspace = Workspace::new();
        config
            .apply_to_workspace(&workspace, Path::new("."))
            .unwrap();
        assert_eq!(workspace.language_for(EditorSlot::Script), "typescript");
        assert_eq!(workspace.source_text(EditorSlot::Script), "let x = 1;");
    }
}
