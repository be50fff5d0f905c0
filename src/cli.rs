// CLI interface for Tinkerbox using clap
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::Path;
use std::sync::Arc;

use crate::config::{PlaygroundConfig, DEFAULT_CONFIG_FILE};
use crate::editor::Workspace;
use crate::engine::{Engine, EngineStatus};
use crate::error::{exit_codes, Result, TinkerError};

#[derive(Parser)]
#[command(
    name = "tinkerbox",
    about = "Tinkerbox - a multi-language playground engine",
    version = crate::VERSION,
    long_about = "Tinkerbox compiles multi-language playground projects and runs them in an isolated sandbox process, relaying console output back to the terminal."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile the configured slots and run them in the sandbox (default)
    Run,

    /// List registered languages and their readiness
    Languages,

    /// List registered vendors and their load state
    Vendors,

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completion for
        shell: Shell,
    },
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        self.init_logging();

        if self.verbose && self.quiet {
            return Err(TinkerError::Cli(Box::new(
                crate::error::CliError::ConflictingArguments {
                    first: "--verbose".to_string(),
                    second: "--quiet".to_string(),
                    suggestion:
                        "Use either --verbose for more output or --quiet for less output, but not both"
                            .to_string(),
                },
            )));
        }

        match &self.command {
            Some(Commands::Run) | None => self.execute_run(),
            Some(Commands::Languages) => self.list_languages(),
            Some(Commands::Vendors) => self.list_vendors(),
            Some(Commands::GenerateCompletion { shell }) => {
                let mut cmd = Self::command();
                let name = cmd.get_name().to_string();
                generate(*shell, &mut cmd, name, &mut std::io::stdout());
                Ok(exit_codes::SUCCESS)
            }
        }
    }

    fn load_config(&self) -> Result<PlaygroundConfig> {
        let path = Path::new(&self.config);
        if path.exists() {
            PlaygroundConfig::from_file(path)
        } else if self.config == DEFAULT_CONFIG_FILE {
            // No project file is fine; run with empty defaults
            Ok(PlaygroundConfig::default())
        } else {
            Err(TinkerError::Config(Box::new(
                crate::error::ConfigError::NotFound {
                    path: path.to_path_buf(),
                    suggestion: Some("check the --config path".to_string()),
                },
            )))
        }
    }

    fn build_engine(&self, config: &PlaygroundConfig) -> Result<(Engine, Arc<Workspace>)> {
        let workspace = Arc::new(Workspace::new());
        let base_dir = Path::new(&self.config)
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.apply_to_workspace(&workspace, base_dir)?;
        let engine = Engine::bootstrap(config, workspace.clone())?;
        Ok((engine, workspace))
    }

    fn execute_run(&self) -> Result<i32> {
        let config = self.load_config()?;
        let (engine, _workspace) = self.build_engine(&config)?;

        let runtime = tokio::runtime::Runtime::new().map_err(TinkerError::Io)?;
        let outcome = runtime.block_on(engine.run_once());

        for message in engine.console_messages() {
            println!("[{}] {}", message.level, message.args.join(" "));
        }

        match engine.status() {
            EngineStatus::Success => Ok(exit_codes::SUCCESS),
            _ => {
                for slot_outcome in engine.last_results() {
                    if !slot_outcome.result.success {
                        let error = slot_outcome
                            .result
                            .error
                            .as_deref()
                            .unwrap_or("unknown failure");
                        eprintln!(
                            "{} ({}): {error}",
                            slot_outcome.slot, slot_outcome.language
                        );
                    }
                }
                match outcome {
                    Err(error) => Err(error),
                    Ok(()) => Ok(exit_codes::COMPILE_FAILURE),
                }
            }
        }
    }

    fn list_languages(&self) -> Result<i32> {
        let config = self.load_config()?;
        let (engine, _workspace) = self.build_engine(&config)?;

        println!(
            "{:<12} {:<14} {:<8} {:<16} {}",
            "NAME", "DISPLAY", "SLOT", "EXTENSIONS", "STATE"
        );
        for name in engine.registry().list() {
            let language = match engine.registry().get(&name) {
                Some(language) => language,
                None => continue,
            };
            let state = if engine.is_language_loaded(&name) {
                "loaded".to_string()
            } else if let Some(error) = engine.get_language_error(&name) {
                format!("error: {error}")
            } else {
                "not loaded".to_string()
            };
            println!(
                "{:<12} {:<14} {:<8} {:<16} {state}",
                name,
                language.display_name(),
                language.slot(),
                language.file_extensions().join(","),
            );
        }
        Ok(exit_codes::SUCCESS)
    }

    fn list_vendors(&self) -> Result<i32> {
        let config = self.load_config()?;
        let (engine, _workspace) = self.build_engine(&config)?;

        println!(
            "{:<22} {:<22} {:<8} {}",
            "KEY", "PACKAGE", "MIRRORS", "STATE"
        );
        for vendor in engine.resolver().list() {
            let mirrors =
                1 + vendor.fallback_mirrors.len() + usize::from(vendor.external.is_some());
            let state = match engine.resources().record(&vendor.key) {
                Some(record) => format!("{:?}", record.status).to_lowercase(),
                None => "pending".to_string(),
            };
            println!(
                "{:<22} {:<22} {:<8} {state}",
                vendor.key,
                format!("{}@{}", vendor.package, vendor.version),
                mirrors,
            );
        }
        Ok(exit_codes::SUCCESS)
    }

    fn init_logging(&self) {
        use crate::logging::{init_logging, LogConfig};

        let log_config = LogConfig::from_cli(self.verbose, self.quiet, self.color.clone());

        if let Err(error) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {error}");
            // Continue execution even if logging fails
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing_version() {
        // clap handles --version internally, so this errors with exit code 0
        let cli = Cli::try_parse_from(["tinkerbox", "--version"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parsing_help() {
        let cli = Cli::try_parse_from(["tinkerbox", "--help"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_default_config() {
        let cli = Cli::try_parse_from(["tinkerbox"]).unwrap();
        assert_eq!(cli.config, "playground.yml");
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.color.is_none());
    }

    #[test]
    fn test_cli_run_command() {
        let cli = Cli::try_parse_from(["tinkerbox", "run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
    }

    #[test]
    fn test_cli_languages_command() {
        let cli = Cli::try_parse_from(["tinkerbox", "languages"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Languages)));
    }

    #[test]
    fn test_cli_color_options() {
        let cli_always = Cli::try_parse_from(["tinkerbox", "--color", "always"]).unwrap();
        assert_eq!(cli_always.color, Some("always".to_string()));

        let cli_never = Cli::try_parse_from(["tinkerbox", "--color", "never"]).unwrap();
        assert_eq!(cli_never.color, Some("never".to_string()));
    }

    #[test]
    fn test_conflicting_verbosity_flags() {
        let cli = Cli::try_parse_from(["tinkerbox", "--verbose", "--quiet"]).unwrap();
        assert!(cli.run().is_err());
    }
}
