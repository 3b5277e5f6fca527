//! Reading PHAR archives back, for inspection and verification.

use devtools_core::error::{DevToolsError, Result};
use flate2::read::DeflateDecoder;
use flate2::Crc;
use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;

use crate::phar::{COMPRESSION_MASK, FLAG_SIGNATURE, SIGNATURE_MAGIC};
use crate::php_serde::PhpValue;
use crate::stub::HALT_COMPILER;
use crate::writer::SignatureAlgorithm;

/// One manifest record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PharEntry {
    pub name: String,
    pub size: u32,
    pub timestamp: u32,
    pub stored_size: u32,
    pub crc32: u32,
    pub flags: u32,
    offset: usize,
}

impl PharEntry {
    pub fn is_compressed(&self) -> bool {
        self.flags & COMPRESSION_MASK != 0
    }
}

/// A parsed archive whose signature, when present, has been verified
#[derive(Debug, Clone)]
pub struct PharArchive {
    bytes: Vec<u8>,
    stub_len: usize,
    flags: u32,
    metadata: Option<PhpValue>,
    entries: Vec<PharEntry>,
    signature: Option<SignatureAlgorithm>,
}

impl PharArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(bytes)
    }

    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let marker = find(&bytes, HALT_COMPILER.as_bytes())
            .ok_or_else(|| malformed(format!("no {} marker", HALT_COMPILER)))?;
        let stub_len = marker + HALT_COMPILER.len();

        let mut pos = stub_len;
        if bytes[pos..].starts_with(b" ?>") {
            pos += 3;
            if bytes[pos..].starts_with(b"\r\n") {
                pos += 2;
            } else if bytes[pos..].starts_with(b"\n") {
                pos += 1;
            }
        }

        let mut reader = ByteReader { bytes: &bytes, pos };
        let manifest_len = reader.read_u32()? as usize;
        let manifest_end = reader
            .pos
            .checked_add(manifest_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| malformed("manifest runs past end of file"))?;

        let count = reader.read_u32()? as usize;
        reader.take(2)?;
        let flags = reader.read_u32()?;
        let alias_len = reader.read_u32()? as usize;
        reader.take(alias_len)?;
        let metadata_len = reader.read_u32()? as usize;
        let metadata = match reader.take(metadata_len)? {
            [] => None,
            raw => Some(PhpValue::unserialize(raw)?),
        };

        let mut entries = Vec::with_capacity(count.min(4096));
        let mut offset = manifest_end;
        for _ in 0..count {
            let name_len = reader.read_u32()? as usize;
            let name = String::from_utf8_lossy(reader.take(name_len)?).into_owned();
            let size = reader.read_u32()?;
            let timestamp = reader.read_u32()?;
            let stored_size = reader.read_u32()?;
            let crc32 = reader.read_u32()?;
            let entry_flags = reader.read_u32()?;
            let entry_metadata_len = reader.read_u32()? as usize;
            reader.take(entry_metadata_len)?;

            entries.push(PharEntry {
                name,
                size,
                timestamp,
                stored_size,
                crc32,
                flags: entry_flags,
                offset,
            });
            offset += stored_size as usize;
        }
        if reader.pos > manifest_end {
            return Err(malformed("manifest is longer than its declared length"));
        }
        if offset > bytes.len() {
            return Err(malformed("entry data runs past end of file"));
        }

        let signature = if flags & FLAG_SIGNATURE != 0 {
            Some(verify_signature(&bytes, offset)?)
        } else {
            None
        };

        Ok(Self {
            bytes,
            stub_len,
            flags,
            metadata,
            entries,
            signature,
        })
    }

    /// Stub text through `__HALT_COMPILER();`
    pub fn stub(&self) -> String {
        String::from_utf8_lossy(&self.bytes[..self.stub_len]).into_owned()
    }

    pub fn metadata(&self) -> Option<&PhpValue> {
        self.metadata.as_ref()
    }

    pub fn entries(&self) -> &[PharEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&PharEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn signature(&self) -> Option<SignatureAlgorithm> {
        self.signature
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & COMPRESSION_MASK != 0
    }

    /// Entry contents, inflated and checked against the recorded CRC
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| malformed(format!("no entry named {}", name)))?;
        let stored = &self.bytes[entry.offset..entry.offset + entry.stored_size as usize];

        let data = if entry.is_compressed() {
            let mut inflated = Vec::with_capacity(entry.size as usize);
            DeflateDecoder::new(stored)
                .read_to_end(&mut inflated)
                .map_err(|e| malformed(format!("cannot inflate {}: {}", name, e)))?;
            inflated
        } else {
            stored.to_vec()
        };

        if data.len() != entry.size as usize {
            return Err(malformed(format!("size mismatch for {}", name)));
        }
        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(malformed(format!("crc mismatch for {}", name)));
        }
        Ok(data)
    }
}

fn verify_signature(bytes: &[u8], data_end: usize) -> Result<SignatureAlgorithm> {
    let trailer = bytes.len().checked_sub(8).filter(|&t| t >= data_end);
    let trailer = trailer.ok_or_else(|| malformed("missing signature trailer"))?;
    if &bytes[trailer + 4..] != SIGNATURE_MAGIC {
        return Err(malformed("missing GBMB signature magic"));
    }

    let mut flag = [0u8; 4];
    flag.copy_from_slice(&bytes[trailer..trailer + 4]);
    let algorithm = match u32::from_le_bytes(flag) {
        0x0002 => SignatureAlgorithm::Sha1,
        other => return Err(malformed(format!("unsupported signature type {:#06x}", other))),
    };

    if trailer - data_end != algorithm.digest_len() {
        return Err(malformed("signature length does not match its type"));
    }
    let digest = Sha1::digest(&bytes[..data_end]);
    if digest.as_slice() != &bytes[data_end..trailer] {
        return Err(malformed("signature does not match archive contents"));
    }
    Ok(algorithm)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn malformed(reason: impl Into<String>) -> DevToolsError {
    DevToolsError::Archive(reason.into())
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| malformed("unexpected end of manifest"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phar::PharWriter;
    use crate::writer::{ArchiveWriter, Compression};
    use std::fs;
    use tempfile::TempDir;

    fn written(compress: bool) -> (TempDir, Vec<u8>) {
        let temp_dir = TempDir::new().expect("temp dir");
        let source = temp_dir.path().join("Main.php");
        fs::write(&source, "<?php echo 'hi';".repeat(20)).expect("write source");

        let mut writer = PharWriter::create(&temp_dir.path().join("out.phar")).expect("create");
        writer.set_metadata(PhpValue::list(["x"]));
        writer.add_file("src/Main.php", &source).expect("add");
        if compress {
            writer.compress_files(Compression::Gzip).expect("compress");
        }
        let bytes = writer.encode().expect("encode");
        (temp_dir, bytes)
    }

    #[test]
    fn test_reads_back_uncompressed() {
        let (_dir, bytes) = written(false);
        let archive = PharArchive::parse(bytes).expect("parse");
        assert_eq!(archive.signature(), Some(SignatureAlgorithm::Sha1));
        assert!(!archive.is_compressed());
        assert_eq!(archive.metadata(), Some(&PhpValue::list(["x"])));
        assert_eq!(
            archive.read("src/Main.php").expect("read"),
            "<?php echo 'hi';".repeat(20).into_bytes()
        );
    }

    #[test]
    fn test_reads_back_compressed() {
        let (_dir, bytes) = written(true);
        let archive = PharArchive::parse(bytes).expect("parse");
        let entry = archive.entry("src/Main.php").expect("entry");
        assert!(entry.is_compressed());
        assert!(entry.stored_size < entry.size);
        assert!(archive.is_compressed());
        assert_eq!(archive.read("src/Main.php").expect("inflate").len(), entry.size as usize);
    }

    #[test]
    fn test_tampered_body_fails_signature() {
        let (_dir, mut bytes) = written(false);
        let stub_len = bytes
            .windows(HALT_COMPILER.len())
            .position(|w| w == HALT_COMPILER.as_bytes())
            .expect("marker");
        // flip a byte inside the entry data, just before the signature
        let idx = bytes.len() - 30;
        assert!(idx > stub_len);
        bytes[idx] ^= 0xff;
        let err = PharArchive::parse(bytes).expect_err("tampering must be detected");
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn test_rejects_non_phar() {
        assert!(PharArchive::parse(b"just some text".to_vec()).is_err());
        assert!(PharArchive::parse(b"<?php __HALT_COMPILER(); ?>\r\n\x01".to_vec()).is_err());
    }
}
