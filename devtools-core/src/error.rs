use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevToolsError {
    #[error("Invalid plugin descriptor ({field}): {reason}")]
    InvalidDescriptor { field: String, reason: String },

    #[error("{} is not a folder", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to {operation} archive {}: {source}", .path.display())]
    ArchiveWrite {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin {0} not found in plugin repository")]
    DependencyNotFound(String),

    #[error("More than one plugin ({candidates}) matches the search for {name}")]
    DependencyAmbiguous { name: String, candidates: usize },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed archive: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DevToolsError {
    pub fn invalid_descriptor(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DevToolsError::InvalidDescriptor {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn archive_write(
        source: std::io::Error,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Self {
        DevToolsError::ArchiveWrite {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error should abort the build. Dependency lookups that
    /// come back empty or ambiguous are reported but never fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DevToolsError::DependencyNotFound(_)
                | DevToolsError::DependencyAmbiguous { .. }
                | DevToolsError::Network(_)
        )
    }
}

impl From<serde_yaml_ng::Error> for DevToolsError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        DevToolsError::invalid_descriptor("document", err.to_string())
    }
}

impl From<serde_json::Error> for DevToolsError {
    fn from(err: serde_json::Error) -> Self {
        DevToolsError::Network(format!("unexpected response body: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DevToolsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_errors_are_not_fatal() {
        assert!(!DevToolsError::DependencyNotFound("Economy".into()).is_fatal());
        assert!(!DevToolsError::DependencyAmbiguous {
            name: "Core".into(),
            candidates: 2
        }
        .is_fatal());
        assert!(DevToolsError::NotADirectory(PathBuf::from("/nope")).is_fatal());
        assert!(DevToolsError::invalid_descriptor("name", "empty").is_fatal());
    }

    #[test]
    fn test_messages_are_single_line() {
        let err = DevToolsError::archive_write(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/tmp/out.phar",
            "create",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("/tmp/out.phar"));
        assert!(rendered.contains("create"));
        assert!(!rendered.contains('\n'));
    }

    #[test]
    fn test_yaml_error_maps_to_invalid_descriptor() {
        let yaml_err = serde_yaml_ng::from_str::<serde_yaml_ng::Value>("a: [b")
            .expect_err("unterminated sequence should fail");
        let err: DevToolsError = yaml_err.into();
        assert!(matches!(err, DevToolsError::InvalidDescriptor { .. }));
    }
}
