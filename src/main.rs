//! unreal-ci - build, test and package Unreal Engine plugins and projects
//!
//! ## Commands
//!
//! - `unreal-ci run` - Run the configured engine version × platform matrix
//! - `unreal-ci validate` - Check a configuration file
//! - `unreal-ci paths` - Show synthesized paths and command lines for a host
//! - `unreal-ci completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the configuration
//! unreal-ci validate -c unreal-ci.yaml
//!
//! # Run everything
//! unreal-ci run -c unreal-ci.yaml
//!
//! # Only 5.3 on the Mac, report as JSON
//! unreal-ci run -c unreal-ci.yaml --engine 5.3 --platform mac --json
//! ```
//!
//! The exit status is non-zero when the configuration is invalid or any
//! phase of any pair failed.

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            if std::env::var("UNREAL_CI_VERBOSE").is_ok() {
                eprintln!("{e:?}");
            } else {
                for cause in e.chain().skip(1) {
                    eprintln!("  caused by: {cause}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
