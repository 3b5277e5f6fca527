use anyhow::{Context, Result};
use clap::CommandFactory;
use devtools_archive::{describe_lines, ArchiveBuilder, BuildRequest, PharArchive};
use devtools_core::{dt_info, dt_println, dt_success, dt_warning, BuilderConfig, DevToolsError};
use devtools_fetch::{DependencyFetcher, HttpRepository};
use devtools_plugin::PluginDescriptor;
use std::path::Path;
use tracing::{debug, info};

use crate::cli::Args;

pub fn execute_command(args: Args) -> Result<()> {
    if let Some(archive) = &args.inspect {
        return inspect(archive);
    }

    let Some(source) = args.make.clone() else {
        print_usage()?;
        return Ok(());
    };

    let config = BuilderConfig::load(args.config.as_deref())
        .context("Failed to load builder configuration")?;
    debug!(?config, "Loaded configuration");

    let mut request = BuildRequest::new(&source)
        .output(&args.out)
        .compress(args.compress);
    if let Some(base) = &args.relative {
        request = request.relative_to(base);
    }
    if let Some(entry) = args.entry.as_deref().filter(|e| !e.is_empty()) {
        request = request.entry(entry);
    }

    let outcome = ArchiveBuilder::new(config.clone())
        .show_progress(!args.quiet)
        .build(&request)?;
    info!(files = outcome.entries.len(), "Build finished");

    if args.no_fetch {
        debug!("Dependency download disabled");
    } else {
        fetch_dependencies(&config, &outcome.descriptor);
    }

    dt_println!("Done!");
    Ok(())
}

fn print_usage() -> Result<()> {
    dt_println!("== PocketMine-MP DevTools CLI interface ==");
    dt_println!();
    Args::command()
        .print_help()
        .context("Failed to print usage")?;
    Ok(())
}

/// Dependency problems are reported but never fail the command
fn fetch_dependencies(config: &BuilderConfig, descriptor: &PluginDescriptor) {
    if descriptor.depend().is_empty() && descriptor.soft_depend().is_empty() {
        return;
    }

    let repository = match HttpRepository::new(&config.repository) {
        Ok(repository) => repository,
        Err(e) => {
            dt_warning!("Skipping dependency download: {}", e);
            return;
        }
    };

    let fetcher = DependencyFetcher::new(repository, &config.plugins_dir);
    let report = fetcher.fetch_all(descriptor);

    for (name, path) in &report.installed {
        dt_success!("Installed {} to {}", name, path.display());
    }
    for name in &report.not_found {
        dt_warning!("{}", DevToolsError::DependencyNotFound(name.clone()));
    }
    for (name, candidates) in &report.ambiguous {
        dt_warning!(
            "{}",
            DevToolsError::DependencyAmbiguous {
                name: name.clone(),
                candidates: *candidates,
            }
        );
    }
    for (name, reason) in &report.failed {
        dt_warning!("Could not fetch {}: {}", name, reason);
    }
}

fn inspect(path: &Path) -> Result<()> {
    let archive = PharArchive::open(path)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    match archive.metadata() {
        Some(metadata) => {
            for line in describe_lines(metadata) {
                dt_println!("{}", line);
            }
        }
        None => dt_info!("{} carries no metadata", path.display()),
    }

    dt_println!("----------------");
    for entry in archive.entries() {
        let marker = if entry.is_compressed() { " (gz)" } else { "" };
        dt_println!("{} [{} bytes]{}", entry.name, entry.size, marker);
    }
    if archive.signature().is_some() {
        dt_success!("Signature verified");
    }
    Ok(())
}
