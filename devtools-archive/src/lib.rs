//! PHAR packaging for plugins.
//!
//! [`ArchiveBuilder`] drives the pipeline; [`PharWriter`] and
//! [`PharArchive`] handle the on-disk format.

pub mod builder;
pub mod collector;
pub mod metadata;
pub mod phar;
pub mod php_serde;
pub mod progress;
pub mod reader;
pub mod stub;
pub mod writer;

pub use builder::{ArchiveBuilder, BuildOutcome, BuildRequest, DEFAULT_OUTPUT};
pub use collector::{is_hidden, FileCollector, FileEntry};
pub use metadata::{describe_lines, ArchiveMetadata};
pub use phar::PharWriter;
pub use php_serde::{PhpKey, PhpValue};
pub use reader::{PharArchive, PharEntry};
pub use stub::StubGenerator;
pub use writer::{ArchiveWriter, Compression, SignatureAlgorithm};
