use devtools_core::error::{DevToolsError, Result};
use devtools_plugin::{sanitize_name, PluginDescriptor};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::repository::PluginRepository;

/// What happened to each dependency name, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub installed: Vec<(String, PathBuf)>,
    pub not_found: Vec<String>,
    pub ambiguous: Vec<(String, usize)>,
    pub failed: Vec<(String, String)>,
}

impl FetchReport {
    /// True when every name was installed
    pub fn is_clean(&self) -> bool {
        self.not_found.is_empty() && self.ambiguous.is_empty() && self.failed.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.installed.len() + self.not_found.len() + self.ambiguous.len() + self.failed.len()
    }

    fn record(&mut self, name: &str, outcome: Result<PathBuf>) {
        match outcome {
            Ok(path) => {
                info!(dependency = %name, path = %path.display(), "Installed dependency");
                self.installed.push((name.to_string(), path));
            }
            Err(DevToolsError::DependencyNotFound(_)) => {
                warn!(dependency = %name, "Dependency not found in repository");
                self.not_found.push(name.to_string());
            }
            Err(DevToolsError::DependencyAmbiguous { candidates, .. }) => {
                warn!(dependency = %name, candidates, "Dependency matches several plugins");
                self.ambiguous.push((name.to_string(), candidates));
            }
            Err(e) => {
                warn!(dependency = %name, error = %e, "Dependency fetch failed");
                self.failed.push((name.to_string(), e.to_string()));
            }
        }
    }
}

/// Installs a descriptor's dependencies into the plugins directory
pub struct DependencyFetcher<R> {
    repository: R,
    plugins_dir: PathBuf,
}

impl<R: PluginRepository> DependencyFetcher<R> {
    pub fn new(repository: R, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            plugins_dir: plugins_dir.into(),
        }
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Hard dependencies first, then soft ones. A name listed in both is
    /// fetched twice.
    pub fn fetch_all(&self, descriptor: &PluginDescriptor) -> FetchReport {
        let mut report = FetchReport::default();
        self.fetch_pass(descriptor.depend(), &mut report);
        self.fetch_pass(descriptor.soft_depend(), &mut report);
        report
    }

    pub fn fetch_pass<'a, I>(&self, names: I, report: &mut FetchReport)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let names: Vec<&String> = names.into_iter().collect();
        if names.is_empty() {
            return;
        }

        if let Err(e) = fs::create_dir_all(&self.plugins_dir) {
            let reason = format!(
                "cannot create plugins directory {}: {}",
                self.plugins_dir.display(),
                e
            );
            warn!(path = %self.plugins_dir.display(), error = %e, "Plugins directory unavailable");
            report
                .failed
                .extend(names.into_iter().map(|name| (name.clone(), reason.clone())));
            return;
        }

        for name in names {
            let outcome = self.fetch_one(name);
            report.record(name, outcome);
        }
    }

    fn fetch_one(&self, name: &str) -> Result<PathBuf> {
        let file_name = sanitize_name(name).ok_or_else(|| {
            DevToolsError::invalid_descriptor(
                "depend",
                format!("'{}' has no usable characters", name),
            )
        })?;

        let mut candidates = self.repository.search(name)?;
        let candidate = match candidates.len() {
            0 => return Err(DevToolsError::DependencyNotFound(name.to_string())),
            1 => candidates.remove(0),
            n => {
                return Err(DevToolsError::DependencyAmbiguous {
                    name: name.to_string(),
                    candidates: n,
                })
            }
        };

        let bytes = self.repository.download(&candidate)?;
        let path = self.plugins_dir.join(format!("{}.phar", file_name));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}
