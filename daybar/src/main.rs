mod bar;
mod clock;
mod colors;
mod config;
mod error;
mod render;
mod signal;
mod text;
mod track;
mod wayland;

use std::process::ExitCode;

use crate::config::USAGE;
use crate::error::ConfigError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = match config::load(std::env::args().skip(1)) {
        Ok(settings) => settings,
        Err(ConfigError::Help) => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("daybar: {e}");
            if e.wants_usage() {
                eprintln!("{USAGE}");
            }
            return ExitCode::FAILURE;
        }
    };

    match wayland::run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("daybar: {e:#}");
            ExitCode::FAILURE
        }
    }
}
