use std::path::Path;

use devtools_core::error::Result;

use crate::php_serde::PhpValue;

/// Signature appended after the archive body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
}

impl SignatureAlgorithm {
    pub fn flag(self) -> u32 {
        match self {
            SignatureAlgorithm::Sha1 => 0x0002,
        }
    }

    pub fn digest_len(self) -> usize {
        match self {
            SignatureAlgorithm::Sha1 => 20,
        }
    }
}

/// Per-entry compression applied to every file in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// zlib deflate stream without header, what the host calls GZ
    Gzip,
}

impl Compression {
    pub fn flag(self) -> u32 {
        match self {
            Compression::Gzip => 0x0000_1000,
        }
    }
}

/// A buffered archive session.
///
/// Calls are made in build order: metadata, stub, signature, then
/// `start_buffering`, any number of `add_file`, optional compression, and
/// finally `stop_buffering`, which makes the archive visible at its target
/// path. Dropping a writer before `stop_buffering` leaves the target untouched.
pub trait ArchiveWriter {
    fn set_metadata(&mut self, metadata: PhpValue);
    fn set_stub(&mut self, stub: &str) -> Result<()>;
    fn set_signature_algorithm(&mut self, algorithm: SignatureAlgorithm);
    fn start_buffering(&mut self) -> Result<()>;
    /// Add `source` under `name`; a repeated name replaces the earlier entry
    fn add_file(&mut self, name: &str, source: &Path) -> Result<()>;
    fn compress_files(&mut self, compression: Compression) -> Result<()>;
    fn stop_buffering(&mut self) -> Result<()>;
}
