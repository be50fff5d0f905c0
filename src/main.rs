// Tinkerbox - Main entry point
use clap::Parser;
use std::process;
use tinkerbox::cli::Cli;
use tinkerbox::logging::LogConfig;

fn main() {
    let cli = Cli::parse();
    let use_colors = LogConfig::from_cli(cli.verbose, cli.quiet, cli.color.clone()).should_use_colors();

    let exit_code = match cli.run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error.user_message(use_colors));
            error.exit_code()
        }
    };

    process::exit(exit_code);
}
