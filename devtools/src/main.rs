// External crates
use clap::Parser;
use tracing::debug;

// Internal imports
use devtools_core::{dt_error, dt_error_hint, dt_warning, tracing_init, DevToolsError};

// Local modules
mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

fn main() {
    let args = Args::parse();

    let logging = if args.debug {
        tracing_init::init_with_defaults("debug")
    } else {
        tracing_init::init()
    };
    if let Err(e) = logging {
        dt_warning!("{}", e);
    }
    debug!(?args, "Starting devtools");

    if let Err(e) = execute_command(args) {
        dt_error!("{:#}", e);
        if let Some(hint) = e.downcast_ref::<DevToolsError>().and_then(hint_for) {
            dt_error_hint!("{}", hint);
        }
        std::process::exit(1);
    }
}

fn hint_for(error: &DevToolsError) -> Option<&'static str> {
    match error {
        DevToolsError::NotADirectory(_) => Some("--make and --relative expect existing folders"),
        DevToolsError::InvalidDescriptor { .. } => {
            Some("plugin.yml needs name, version, main and api")
        }
        DevToolsError::Config(_) => Some("Check the file given with --config or DEVTOOLS_CONFIG"),
        _ => None,
    }
}
