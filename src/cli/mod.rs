//! Command-line interface for unreal-ci
//!
//! - `run`: build, test and package the configured matrix
//! - `validate`: check a configuration file
//! - `paths`: show the synthesized paths and command lines for one host
//! - `completions`: generate shell completions

pub mod completions;
pub mod paths;
pub mod run;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use unreal_ci::infrastructure::Config;
use unreal_ci::model::{EditorPlatform, EngineVersion};

/// CLI arguments for unreal-ci
#[derive(Parser, Debug)]
#[command(name = "unreal-ci")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, test and package every engine version on every platform
    Run {
        /// Configuration file
        #[arg(short, long, default_value = "unreal-ci.yaml")]
        config: PathBuf,
        /// Only run these engine versions
        #[arg(long = "engine", value_name = "VERSION")]
        engines: Vec<EngineVersion>,
        /// Only run on these editor platforms
        #[arg(long = "platform", value_name = "PLATFORM")]
        platforms: Vec<EditorPlatform>,
        /// Override the configured log level
        #[arg(long)]
        log_level: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a configuration file without running anything
    Validate {
        /// Configuration file
        #[arg(short, long, default_value = "unreal-ci.yaml")]
        config: PathBuf,
    },

    /// Show toolchain paths and command lines for one host
    Paths {
        /// Configuration file
        #[arg(short, long, default_value = "unreal-ci.yaml")]
        config: PathBuf,
        /// Editor platform
        #[arg(short, long)]
        platform: EditorPlatform,
        /// Engine version
        #[arg(short, long)]
        engine: EngineVersion,
        /// Working copy root as the host sees it
        #[arg(long)]
        repo: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Loads and validates a configuration file
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    Ok(config)
}

/// Parse and execute CLI arguments
pub fn run() -> Result<ExitCode> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            config,
            engines,
            platforms,
            log_level,
            json,
        } => {
            let options = run::RunOptions {
                engines,
                platforms,
                log_level,
                json,
            };
            let succeeded = run::run_matrix(&config, &options)?;
            return Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Validate { config } => {
            let loaded = load_config(&config)?;
            println!("{}", run::describe(&loaded));
        }
        Command::Paths {
            config,
            platform,
            engine,
            repo,
        } => {
            let loaded = load_config(&config)?;
            println!("{}", paths::render(&loaded, platform, engine, repo.as_deref()));
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{completions}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
