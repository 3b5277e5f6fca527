//! PHAR archive writer.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! stub ... __HALT_COMPILER(); ?>\r\n
//! u32 manifest length
//!   u32 entry count, u16 api, u32 global flags, u32 alias length,
//!   u32 metadata length, metadata (PHP serialize)
//!   per entry: u32 name length, name, u32 size, u32 timestamp,
//!              u32 stored size, u32 crc32, u32 flags, u32 metadata length
//! entry contents, in manifest order
//! signature digest, u32 signature flag, "GBMB"
//! ```

use chrono::Utc;
use devtools_core::error::{DevToolsError, Result};
use flate2::write::DeflateEncoder;
use flate2::Crc;
use indexmap::IndexMap;
use sha1::{Digest, Sha1};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::php_serde::PhpValue;
use crate::stub::HALT_COMPILER;
use crate::writer::{ArchiveWriter, Compression, SignatureAlgorithm};

pub(crate) const STUB_TAIL: &[u8] = b" ?>\r\n";
pub(crate) const MANIFEST_API: [u8; 2] = [0x11, 0x10];
pub(crate) const FLAG_SIGNATURE: u32 = 0x0001_0000;
pub(crate) const COMPRESSION_MASK: u32 = 0x0000_F000;
pub(crate) const SIGNATURE_MAGIC: &[u8; 4] = b"GBMB";
const ENTRY_PERMISSIONS: u32 = 0o666;
const DEFAULT_STUB: &str = "<?php __HALT_COMPILER();";

#[derive(Debug)]
struct PendingEntry {
    data: Vec<u8>,
    crc32: u32,
    compressed: Option<(Compression, Vec<u8>)>,
}

impl PendingEntry {
    fn stored(&self) -> &[u8] {
        match &self.compressed {
            Some((_, bytes)) => bytes,
            None => &self.data,
        }
    }

    fn flags(&self) -> u32 {
        let compression = self.compressed.as_ref().map_or(0, |(c, _)| c.flag());
        ENTRY_PERMISSIONS | compression
    }
}

/// Writes a PHAR through a staging file next to the target, renamed into
/// place on `stop_buffering`.
#[derive(Debug)]
pub struct PharWriter {
    target: PathBuf,
    stub: String,
    metadata: Option<PhpValue>,
    signature: SignatureAlgorithm,
    entries: IndexMap<String, PendingEntry>,
    staging: Option<NamedTempFile>,
    timestamp: u32,
}

impl PharWriter {
    /// Prepare a writer for `target`. Nothing is written until
    /// `start_buffering`.
    pub fn create(target: &Path) -> Result<Self> {
        if target.is_dir() {
            return Err(DevToolsError::archive_write(
                io::Error::other("target is a directory"),
                target,
                "create",
            ));
        }
        let dir = staging_dir(target);
        if !dir.is_dir() {
            return Err(DevToolsError::archive_write(
                io::Error::new(io::ErrorKind::NotFound, "parent directory does not exist"),
                target,
                "create",
            ));
        }

        Ok(Self {
            target: target.to_path_buf(),
            stub: DEFAULT_STUB.to_string(),
            metadata: None,
            signature: SignatureAlgorithm::default(),
            entries: IndexMap::new(),
            staging: None,
            timestamp: u32::try_from(Utc::now().timestamp()).unwrap_or_default(),
        })
    }

    /// Timestamp recorded on every entry
    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn write_error(&self, source: io::Error, operation: impl Into<String>) -> DevToolsError {
        DevToolsError::archive_write(source, &self.target, operation)
    }

    fn open_staging(&self) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(".devtools-")
            .suffix(".phar.tmp")
            .tempfile_in(staging_dir(&self.target))
            .map_err(|e| self.write_error(e, "stage"))
    }

    /// Serialize the whole archive, signature included
    pub(crate) fn encode(&self) -> Result<Vec<u8>> {
        let metadata = self
            .metadata
            .as_ref()
            .map(PhpValue::serialize)
            .unwrap_or_default();

        let mut global_flags = FLAG_SIGNATURE;
        for entry in self.entries.values() {
            if let Some((compression, _)) = &entry.compressed {
                global_flags |= compression.flag();
            }
        }

        let mut manifest = Vec::new();
        put_u32(&mut manifest, len_u32(self.entries.len(), "entry count")?);
        manifest.extend_from_slice(&MANIFEST_API);
        put_u32(&mut manifest, global_flags);
        put_u32(&mut manifest, 0);
        put_u32(&mut manifest, len_u32(metadata.len(), "metadata")?);
        manifest.extend_from_slice(metadata.as_bytes());

        for (name, entry) in &self.entries {
            put_u32(&mut manifest, len_u32(name.len(), "entry name")?);
            manifest.extend_from_slice(name.as_bytes());
            put_u32(&mut manifest, len_u32(entry.data.len(), name)?);
            put_u32(&mut manifest, self.timestamp);
            put_u32(&mut manifest, len_u32(entry.stored().len(), name)?);
            put_u32(&mut manifest, entry.crc32);
            put_u32(&mut manifest, entry.flags());
            put_u32(&mut manifest, 0);
        }

        let mut out = Vec::with_capacity(
            self.stub.len()
                + manifest.len()
                + self.entries.values().map(|e| e.stored().len()).sum::<usize>()
                + 64,
        );
        out.extend_from_slice(self.stub.as_bytes());
        out.extend_from_slice(STUB_TAIL);
        put_u32(&mut out, len_u32(manifest.len(), "manifest")?);
        out.extend_from_slice(&manifest);
        for entry in self.entries.values() {
            out.extend_from_slice(entry.stored());
        }

        match self.signature {
            SignatureAlgorithm::Sha1 => {
                let digest = Sha1::digest(&out);
                out.extend_from_slice(&digest);
            }
        }
        put_u32(&mut out, self.signature.flag());
        out.extend_from_slice(SIGNATURE_MAGIC);
        Ok(out)
    }
}

impl ArchiveWriter for PharWriter {
    fn set_metadata(&mut self, metadata: PhpValue) {
        self.metadata = Some(metadata);
    }

    /// Keeps the stub up to and including `__HALT_COMPILER();`
    fn set_stub(&mut self, stub: &str) -> Result<()> {
        let end = stub
            .to_ascii_lowercase()
            .find(&HALT_COMPILER.to_ascii_lowercase())
            .map(|pos| pos + HALT_COMPILER.len())
            .ok_or_else(|| {
                DevToolsError::Archive(format!("stub does not contain {}", HALT_COMPILER))
            })?;
        self.stub = stub[..end].to_string();
        Ok(())
    }

    fn set_signature_algorithm(&mut self, algorithm: SignatureAlgorithm) {
        self.signature = algorithm;
    }

    fn start_buffering(&mut self) -> Result<()> {
        if self.staging.is_none() {
            let staging = self.open_staging()?;
            debug!(staging = %staging.path().display(), "Opened staging file");
            self.staging = Some(staging);
        }
        Ok(())
    }

    fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let data = fs::read(source).map_err(|e| self.write_error(e, format!("add {} to", name)))?;
        let mut crc = Crc::new();
        crc.update(&data);
        self.entries.insert(
            name.to_string(),
            PendingEntry {
                data,
                crc32: crc.sum(),
                compressed: None,
            },
        );
        Ok(())
    }

    fn compress_files(&mut self, compression: Compression) -> Result<()> {
        let target = self.target.clone();
        for (name, entry) in self.entries.iter_mut() {
            if entry.compressed.is_some() {
                continue;
            }
            let deflated = match compression {
                Compression::Gzip => deflate(&entry.data),
            }
            .map_err(|e| {
                DevToolsError::archive_write(e, &target, format!("compress {} in", name))
            })?;
            entry.compressed = Some((compression, deflated));
        }
        Ok(())
    }

    fn stop_buffering(&mut self) -> Result<()> {
        let bytes = self.encode()?;
        let mut staging = match self.staging.take() {
            Some(staging) => staging,
            None => self.open_staging()?,
        };

        staging
            .write_all(&bytes)
            .map_err(|e| self.write_error(e, "write"))?;
        staging
            .as_file()
            .sync_all()
            .map_err(|e| self.write_error(e, "sync"))?;
        staging
            .persist(&self.target)
            .map_err(|e| self.write_error(e.error, "commit"))?;

        debug!(
            path = %self.target.display(),
            entries = self.entries.len(),
            bytes = bytes.len(),
            "Committed archive"
        );
        Ok(())
    }
}

fn deflate(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn staging_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn len_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| DevToolsError::Archive(format!("{} is too large for the phar format", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write source");
        path
    }

    #[test]
    fn test_encode_layout() {
        let temp_dir = TempDir::new().expect("temp dir");
        let file = source(&temp_dir, "a.txt", "hello");
        let mut writer = PharWriter::create(&temp_dir.path().join("out.phar"))
            .expect("create writer")
            .with_timestamp(42);
        writer
            .set_stub("<?php echo 1; __HALT_COMPILER(); trailing")
            .expect("valid stub");
        writer.add_file("a.txt", &file).expect("add file");

        let bytes = writer.encode().expect("encode");
        let stub_end = b"<?php echo 1; __HALT_COMPILER(); ?>\r\n".len();
        assert!(bytes.starts_with(b"<?php echo 1; __HALT_COMPILER(); ?>\r\n"));
        assert!(bytes.ends_with(b"\x02\x00\x00\x00GBMB"));

        let count = &bytes[stub_end + 4..stub_end + 8];
        assert_eq!(count, 1u32.to_le_bytes());
        assert_eq!(&bytes[stub_end + 8..stub_end + 10], MANIFEST_API);
        assert_eq!(
            &bytes[stub_end + 10..stub_end + 14],
            FLAG_SIGNATURE.to_le_bytes()
        );

        let signed_len = bytes.len() - 28;
        let digest = Sha1::digest(&bytes[..signed_len]);
        assert_eq!(&bytes[signed_len..signed_len + 20], digest.as_slice());
    }

    #[test]
    fn test_stub_without_halt_compiler_is_rejected() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut writer = PharWriter::create(&temp_dir.path().join("out.phar")).expect("create");
        assert!(writer.set_stub("<?php echo 'no marker';").is_err());
    }

    #[test]
    fn test_repeated_name_replaces_entry() {
        let temp_dir = TempDir::new().expect("temp dir");
        let first = source(&temp_dir, "first.txt", "one");
        let second = source(&temp_dir, "second.txt", "two");
        let mut writer = PharWriter::create(&temp_dir.path().join("out.phar")).expect("create");
        writer.add_file("same.txt", &first).expect("add first");
        writer.add_file("same.txt", &second).expect("add second");
        assert_eq!(writer.len(), 1);
        assert_eq!(writer.entries["same.txt"].data, b"two");
    }

    #[test]
    fn test_dropped_session_leaves_no_target() {
        let temp_dir = TempDir::new().expect("temp dir");
        let target = temp_dir.path().join("out.phar");
        let file = source(&temp_dir, "a.txt", "hello");
        {
            let mut writer = PharWriter::create(&target).expect("create");
            writer.start_buffering().expect("start");
            writer.add_file("a.txt", &file).expect("add");
        }
        assert!(!target.exists());
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".phar.tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_parent_directory() {
        let temp_dir = TempDir::new().expect("temp dir");
        let err = PharWriter::create(&temp_dir.path().join("missing/out.phar"))
            .expect_err("missing parent should fail");
        assert!(matches!(err, DevToolsError::ArchiveWrite { .. }));
    }

    #[test]
    fn test_add_missing_source_names_entry() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut writer = PharWriter::create(&temp_dir.path().join("out.phar")).expect("create");
        let err = writer
            .add_file("src/Main.php", &temp_dir.path().join("absent.php"))
            .expect_err("missing source should fail");
        assert!(err.to_string().contains("add src/Main.php to"));
    }
}
