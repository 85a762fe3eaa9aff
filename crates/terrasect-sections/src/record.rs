//! Persisted boundary normals of a generated source.
//!
//! The TSNR (Terrasect Normal Record) format is a versioned little-endian
//! binary layout. Objects and keys are written in sorted order, so encoding a
//! decoded record reproduces the input bytes.
//!
//! ## Binary Layout
//!
//! | Size | Field |
//! |------|-------|
//! | 4 | Magic bytes `"TSNR"` |
//! | 1 | Format version (`u8`, currently 1) |
//! | 1 | Quantisation digits (`u8`) |
//! | 4 | Object count (`u32`) |
//!
//! Then per object:
//!
//! | Size | Field |
//! |------|-------|
//! | 2 | Name length `L` (`u16`) |
//! | L | UTF-8 name |
//! | 4 | Entry count `N` (`u32`) |
//! | N×32 | Entries: key `x`, `y` (`i64`), normal `x`, `y`, `z` (`f32`) |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::Vec3;
use tracing::{info, warn};

use crate::error::RecordError;
use crate::names::{RECORD_DIR, RECORD_EXTENSION};
use crate::normals::NormalTable;

/// Magic bytes identifying the TSNR format.
const MAGIC: [u8; 4] = *b"TSNR";

/// Current format version.
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 1 + 4;
const ENTRY_LEN: usize = 8 + 8 + 4 * 3;

/// Boundary normals of every section and LOD level of one source object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalRecord {
    digits: u32,
    objects: BTreeMap<String, NormalTable>,
}

impl NormalRecord {
    /// Creates an empty record whose tables quantise to `digits` decimals.
    pub fn new(digits: u32) -> Self {
        Self {
            digits,
            objects: BTreeMap::new(),
        }
    }

    /// Decimal digits every table is quantised to.
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Adds (or replaces) the table of an object.
    pub fn insert(&mut self, object: impl Into<String>, table: NormalTable) -> Result<(), RecordError> {
        if table.digits() != self.digits {
            return Err(RecordError::DigitsMismatch {
                expected: self.digits,
                actual: table.digits(),
            });
        }
        self.objects.insert(object.into(), table);
        Ok(())
    }

    /// Table of an object.
    pub fn get(&self, object: &str) -> Option<&NormalTable> {
        self.objects.get(object)
    }

    /// Objects and their tables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalTable)> + '_ {
        self.objects.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` when no object is recorded.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serializes the record in the TSNR format.
    ///
    /// Fails instead of truncating when a name, a count or the digits do
    /// not fit their header field.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let digits =
            u8::try_from(self.digits).map_err(|_| RecordError::DigitsOutOfRange(self.digits))?;
        let body: usize = self
            .objects
            .iter()
            .map(|(name, table)| 2 + name.len() + 4 + table.len() * ENTRY_LEN)
            .sum();
        let mut buf = Vec::with_capacity(HEADER_LEN + body);

        buf.extend_from_slice(&MAGIC);
        buf.push(FORMAT_VERSION);
        buf.push(digits);
        buf.extend_from_slice(&count_u32(self.objects.len())?.to_le_bytes());

        for (name, table) in &self.objects {
            let name_len =
                u16::try_from(name.len()).map_err(|_| RecordError::NameTooLong(name.len()))?;
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(&count_u32(table.len())?.to_le_bytes());
            for (&(x, y), normal) in table.iter() {
                buf.extend_from_slice(&x.to_le_bytes());
                buf.extend_from_slice(&y.to_le_bytes());
                for c in normal.to_array() {
                    buf.extend_from_slice(&c.to_le_bytes());
                }
            }
        }
        Ok(buf)
    }

    /// Deserializes a record from the TSNR format.
    pub fn decode(data: &[u8]) -> Result<Self, RecordError> {
        if data.len() < MAGIC.len() || data[..MAGIC.len()] != MAGIC {
            return Err(RecordError::InvalidMagic);
        }
        let mut reader = Reader { data, pos: MAGIC.len() };

        let version = reader.u8()?;
        if version != FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        let digits = u32::from(reader.u8()?);
        let count = reader.u32()?;

        let mut record = NormalRecord::new(digits);
        for _ in 0..count {
            let name_len = reader.u16()? as usize;
            let name = String::from_utf8(reader.take(name_len)?.to_vec())
                .map_err(RecordError::InvalidName)?;
            let entries = reader.u32()?;
            let mut table = NormalTable::new(digits);
            for _ in 0..entries {
                let x = reader.i64()?;
                let y = reader.i64()?;
                let normal = Vec3::new(reader.f32()?, reader.f32()?, reader.f32()?);
                table.insert((x, y), normal);
            }
            record.objects.insert(name, table);
        }
        Ok(record)
    }

    /// Path of the record of `source` under `data_dir`.
    pub fn path(data_dir: &Path, source: &str) -> PathBuf {
        data_dir
            .join(RECORD_DIR)
            .join(format!("{source}.{RECORD_EXTENSION}"))
    }

    /// Writes the record of `source`, creating the record directory.
    pub fn save(&self, data_dir: &Path, source: &str) -> Result<PathBuf, RecordError> {
        let path = Self::path(data_dir, source);
        let dir = data_dir.join(RECORD_DIR);
        std::fs::create_dir_all(&dir).map_err(|source| RecordError::Io {
            path: dir.clone(),
            source,
        })?;
        let bytes = self.encode()?;
        std::fs::write(&path, bytes).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        info!(
            "Saved normals of {} objects to {}",
            self.objects.len(),
            path.display()
        );
        Ok(path)
    }

    /// Reads the record of `source`.
    ///
    /// A missing record directory is only warned about; the read of the file
    /// itself then fails with [`RecordError::Io`].
    pub fn load(data_dir: &Path, source: &str) -> Result<Self, RecordError> {
        let dir = data_dir.join(RECORD_DIR);
        if !dir.exists() {
            warn!("{} does not exist", dir.display());
        }
        let path = Self::path(data_dir, source);
        let data = std::fs::read(&path).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        Self::decode(&data)
    }
}

fn count_u32(count: usize) -> Result<u32, RecordError> {
    u32::try_from(count).map_err(|_| RecordError::TooManyEntries(count))
}

/// Bounds-checked little-endian cursor.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(RecordError::Truncated {
                expected: end,
                actual: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RecordError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, RecordError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, RecordError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, RecordError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, RecordError> {
        self.array().map(i64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, RecordError> {
        self.array().map(f32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NormalRecord {
        let mut record = NormalRecord::new(2);
        let mut a = NormalTable::new(2);
        a.insert((-400, 0), Vec3::Z);
        a.insert((0, 125), Vec3::new(0.6, 0.0, 0.8));
        let mut b = NormalTable::new(2);
        b.insert((i64::MIN, i64::MAX), Vec3::new(0.0, -0.6, 0.8));
        record.insert("Terrain_SECT2", a).unwrap();
        record.insert("Terrain_SECT1_LOD.0", b).unwrap();
        record
    }

    #[test]
    fn test_header_layout() {
        let bytes = NormalRecord::new(3).encode().unwrap();
        assert_eq!(bytes, [b'T', b'S', b'N', b'R', 1, 3, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encoding_is_byte_stable() {
        let bytes = sample().encode().unwrap();
        let decoded = NormalRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(decoded.encode().unwrap(), bytes);
        // Objects are written in name order regardless of insertion order.
        let first: Vec<&str> = decoded.iter().map(|(name, _)| name).collect();
        assert_eq!(first, ["Terrain_SECT1_LOD.0", "Terrain_SECT2"]);
    }

    #[test]
    fn test_digit_mismatch_rejected() {
        let mut record = NormalRecord::new(2);
        let result = record.insert("x", NormalTable::new(0));
        assert!(matches!(
            result,
            Err(RecordError::DigitsMismatch { expected: 2, actual: 0 })
        ));
    }

    #[test]
    fn test_corrupt_data() {
        assert!(matches!(NormalRecord::decode(b"NOPE"), Err(RecordError::InvalidMagic)));
        assert!(matches!(NormalRecord::decode(b"TS"), Err(RecordError::InvalidMagic)));

        let mut bytes = sample().encode().unwrap();
        bytes[4] = 9;
        assert!(matches!(
            NormalRecord::decode(&bytes),
            Err(RecordError::UnsupportedVersion(9))
        ));

        let bytes = sample().encode().unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(
            NormalRecord::decode(cut),
            Err(RecordError::Truncated { actual, .. }) if actual == cut.len()
        ));
    }

    #[test]
    fn test_oversized_fields_fail_to_encode() {
        let mut record = NormalRecord::new(2);
        let long = "x".repeat(70_000);
        record.insert(long, NormalTable::new(2)).unwrap();
        assert!(matches!(record.encode(), Err(RecordError::NameTooLong(70_000))));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            record.save(dir.path(), "Terrain"),
            Err(RecordError::NameTooLong(_))
        ));
        assert!(!NormalRecord::path(dir.path(), "Terrain").exists());

        let mut record = NormalRecord::new(300);
        record.insert("a", NormalTable::new(300)).unwrap();
        assert!(matches!(record.encode(), Err(RecordError::DigitsOutOfRange(300))));
    }

    #[test]
    fn test_longest_name_round_trips() {
        let mut record = NormalRecord::new(0);
        let mut table = NormalTable::new(0);
        table.insert((1, -1), Vec3::Z);
        record.insert("n".repeat(usize::from(u16::MAX)), table).unwrap();
        let bytes = record.encode().unwrap();
        assert_eq!(NormalRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut bytes = NormalRecord::new(0).encode().unwrap();
        bytes[6] = 1;
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            NormalRecord::decode(&bytes),
            Err(RecordError::InvalidName(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample().save(dir.path(), "Terrain").unwrap();
        assert_eq!(
            path,
            dir.path().join("TERRASECT_LOD_SECTIONS").join("Terrain.nrm")
        );
        let loaded = NormalRecord::load(dir.path(), "Terrain").unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NormalRecord::load(dir.path(), "Terrain"),
            Err(RecordError::Io { .. })
        ));

        sample().save(dir.path(), "Terrain").unwrap();
        assert!(matches!(
            NormalRecord::load(dir.path(), "Other"),
            Err(RecordError::Io { .. })
        ));
    }
}
