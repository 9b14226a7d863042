use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::records::{EntityRecord, MapHeader, MapSnapshot};

const MAGIC: &[u8; 4] = b"GMAP";
pub const MAP_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("failed to read/write map file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("map file {path} has invalid format: {message}")]
    InvalidFormat { path: PathBuf, message: String },
}

/// Encodes and writes the snapshot. The file is replaced in one rename, so a
/// reader never sees a half-written map.
pub fn write_map_file(path: &Path, snapshot: &MapSnapshot) -> Result<(), MapFileError> {
    let bytes = encode_map(snapshot, path)?;
    replace_atomically(path, &bytes).map_err(|source| MapFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        records = snapshot.records.len(),
        bytes = bytes.len(),
        "map_file_written"
    );
    Ok(())
}

pub fn read_map_file(path: &Path) -> Result<MapSnapshot, MapFileError> {
    let bytes = fs::read(path).map_err(|source| MapFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_map(&bytes, path)
}

/// Layout, little-endian: magic, u16 version, u32 width, height, cell width,
/// cell height, u32 record count, u32 payload length, 32-byte SHA-256 of the
/// payload, payload.
pub fn encode_map(snapshot: &MapSnapshot, path: &Path) -> Result<Vec<u8>, MapFileError> {
    let payload = encode_records(&snapshot.records, path)?;
    let header = &snapshot.header;

    let mut bytes = Vec::<u8>::with_capacity(payload.len() + 62);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&MAP_FORMAT_VERSION.to_le_bytes());
    for field in [
        header.width,
        header.height,
        header.cell_width,
        header.cell_height,
    ] {
        bytes.extend_from_slice(&field.to_le_bytes());
    }
    bytes.extend_from_slice(&len_u32(snapshot.records.len(), path)?.to_le_bytes());
    bytes.extend_from_slice(&len_u32(payload.len(), path)?.to_le_bytes());
    bytes.extend_from_slice(&sha256_bytes(&payload));
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_map(bytes: &[u8], path: &Path) -> Result<MapSnapshot, MapFileError> {
    let mut reader = Reader::new(bytes, path);

    if reader.take(4)? != MAGIC {
        return Err(invalid_format(path, "invalid magic"));
    }
    let version = reader.u16()?;
    if version != MAP_FORMAT_VERSION {
        return Err(invalid_format(
            path,
            &format!("unsupported version {version}"),
        ));
    }
    let header = MapHeader {
        width: reader.u32()?,
        height: reader.u32()?,
        cell_width: reader.u32()?,
        cell_height: reader.u32()?,
    };
    let record_count = reader.u32()? as usize;
    let payload_len = reader.u32()? as usize;
    let expected_hash = reader.take(32)?;
    let payload = reader.take(payload_len)?;
    if !reader.is_done() {
        return Err(invalid_format(path, "unexpected trailing bytes"));
    }
    if expected_hash != sha256_bytes(payload) {
        return Err(invalid_format(path, "payload hash mismatch"));
    }

    let records = decode_records(payload, record_count, path)?;
    Ok(MapSnapshot { header, records })
}

fn encode_records(records: &[EntityRecord], path: &Path) -> Result<Vec<u8>, MapFileError> {
    let mut payload = Vec::new();
    for record in records {
        payload.extend_from_slice(&record.type_key.to_le_bytes());
        payload.extend_from_slice(&record.x.to_le_bytes());
        payload.extend_from_slice(&record.y.to_le_bytes());
        let text = record.description.as_bytes();
        let text_len = u16::try_from(text.len())
            .map_err(|_| invalid_format(path, "description too long for u16 length"))?;
        payload.extend_from_slice(&text_len.to_le_bytes());
        payload.extend_from_slice(text);
    }
    Ok(payload)
}

fn decode_records(
    payload: &[u8],
    count: usize,
    path: &Path,
) -> Result<Vec<EntityRecord>, MapFileError> {
    let mut reader = Reader::new(payload, path);
    // Each record needs at least 14 bytes, which bounds a hostile count.
    let mut records = Vec::with_capacity(count.min(payload.len() / 14));
    for _ in 0..count {
        let type_key = reader.i32()?;
        let x = reader.i32()?;
        let y = reader.i32()?;
        let text_len = reader.u16()? as usize;
        let description = std::str::from_utf8(reader.take(text_len)?)
            .map_err(|_| invalid_format(path, "invalid UTF-8 description"))?
            .to_string();
        records.push(EntityRecord {
            type_key,
            x,
            y,
            description,
        });
    }
    if !reader.is_done() {
        return Err(invalid_format(path, "payload length mismatch"));
    }
    Ok(records)
}

struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            cursor: 0,
            path,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MapFileError> {
        let end = self.cursor.saturating_add(len);
        if end > self.bytes.len() {
            return Err(invalid_format(self.path, "unexpected end of file"));
        }
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], MapFileError> {
        self.take(N)?
            .try_into()
            .map_err(|_| invalid_format(self.path, "short integer field"))
    }

    fn u16(&mut self) -> Result<u16, MapFileError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, MapFileError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, MapFileError> {
        self.array().map(i32::from_le_bytes)
    }

    fn is_done(&self) -> bool {
        self.cursor == self.bytes.len()
    }
}

fn replace_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn len_u32(len: usize, path: &Path) -> Result<u32, MapFileError> {
    u32::try_from(len).map_err(|_| invalid_format(path, "length does not fit in u32"))
}

fn sha256_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

fn invalid_format(path: &Path, message: &str) -> MapFileError {
    MapFileError::InvalidFormat {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
