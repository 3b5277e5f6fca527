//! The build pipeline: descriptor, stub, metadata, files, compression,
//! commit. Each step finishes before the next starts, and any failure
//! leaves the target path untouched.

use chrono::{DateTime, Utc};
use devtools_core::error::{DevToolsError, Result};
use devtools_core::{dt_println, BuilderConfig};
use devtools_plugin::{DescriptorParser, PluginDescriptor};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::collector::{FileCollector, FileEntry};
use crate::metadata::ArchiveMetadata;
use crate::phar::PharWriter;
use crate::progress::AddProgress;
use crate::stub::{normalize_entry, StubGenerator};
use crate::writer::{ArchiveWriter, Compression, SignatureAlgorithm};

pub const DEFAULT_OUTPUT: &str = "output.phar";

/// What to build and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub source_dir: PathBuf,
    pub relative_base: Option<PathBuf>,
    pub output: PathBuf,
    pub entry: Option<String>,
    pub compress: bool,
}

impl BuildRequest {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            relative_base: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            entry: None,
            compress: false,
        }
    }

    pub fn relative_to(mut self, base: impl Into<PathBuf>) -> Self {
        self.relative_base = Some(base.into());
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Result of a committed build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub descriptor: PluginDescriptor,
    pub output: PathBuf,
    pub entries: Vec<FileEntry>,
    pub compressed: bool,
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    config: BuilderConfig,
    show_progress: bool,
}

impl ArchiveBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            show_progress: true,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build a PHAR at `request.output`
    pub fn build(&self, request: &BuildRequest) -> Result<BuildOutcome> {
        self.build_with(request, |target, created_at| {
            let timestamp = u32::try_from(created_at.timestamp()).unwrap_or_default();
            PharWriter::create(target).map(|writer| writer.with_timestamp(timestamp))
        })
    }

    /// Run the pipeline against any writer; `open` is called once the
    /// source and descriptor have been validated, with the instant recorded
    /// as `creationDate`.
    pub fn build_with<W, F>(&self, request: &BuildRequest, open: F) -> Result<BuildOutcome>
    where
        W: ArchiveWriter,
        F: FnOnce(&Path, DateTime<Utc>) -> Result<W>,
    {
        let source_dir = resolve_dir(&request.source_dir)?;
        let relative_base = match &request.relative_base {
            Some(base) => resolve_dir(base)?,
            None => source_dir.clone(),
        };
        debug!(
            source = %source_dir.display(),
            base = %relative_base.display(),
            "Resolved build directories"
        );

        let descriptor = self.load_descriptor(&source_dir)?;

        dt_println!();
        dt_println!("Creating {}...", request.output.display());
        let created_at = Utc::now();
        let mut writer = open(&request.output, created_at)?;

        let metadata = ArchiveMetadata::from_descriptor(&descriptor, created_at);
        writer.set_metadata(metadata.to_php_value());

        let stub = match &request.entry {
            Some(entry) => {
                dt_println!("Setting entry point to {}", normalize_entry(entry));
                StubGenerator::entry_stub(entry)
            }
            None => {
                dt_println!("No entry point set");
                StubGenerator::new(&self.config.host_name, &self.config.builder_banner)
                    .describe_stub(&descriptor, created_at)
            }
        };
        writer.set_stub(&stub)?;
        writer.set_signature_algorithm(SignatureAlgorithm::Sha1);
        writer.start_buffering()?;

        dt_println!("Adding files...");
        let mut collector = FileCollector::new(&source_dir);
        if relative_base != source_dir {
            collector = collector.with_relative_base(&relative_base);
        }
        if let Some(output) = resolve_output(&request.output) {
            collector = collector.excluding(output);
        }
        let entries = collector.collect()?;

        let progress = AddProgress::new(self.show_progress);
        for (index, entry) in entries.iter().enumerate() {
            writer.add_file(&entry.relative, &entry.absolute)?;
            progress.file_added(index + 1, &entry.relative);
        }
        progress.finish(entries.len());

        if request.compress {
            dt_println!("Compressing...");
            writer.compress_files(Compression::Gzip)?;
        }

        writer.stop_buffering()?;
        info!(
            plugin = %descriptor.full_name(),
            output = %request.output.display(),
            files = entries.len(),
            compressed = request.compress,
            "Archive built"
        );

        Ok(BuildOutcome {
            descriptor,
            output: request.output.clone(),
            entries,
            compressed: request.compress,
        })
    }

    fn load_descriptor(&self, source_dir: &Path) -> Result<PluginDescriptor> {
        let path = source_dir.join(&self.config.descriptor_file);
        let raw = std::fs::read(&path).map_err(|e| {
            DevToolsError::invalid_descriptor(
                self.config.descriptor_file.as_str(),
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        DescriptorParser::from_config(&self.config).parse_bytes(&raw)
    }
}

fn resolve_dir(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(resolved) if resolved.is_dir() => Ok(resolved),
        _ => Err(DevToolsError::NotADirectory(path.to_path_buf())),
    }
}

/// Absolute form of the archive path, so an earlier build written into the
/// source tree is never packed into the next one
fn resolve_output(output: &Path) -> Option<PathBuf> {
    let name = output.file_name()?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}
