//! On-disk archive of named arrays.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::ArrayD;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

pub mod key;

/// Version tag written into every archive.
pub const ARCHIVE_VERSION: u32 = 1;

/// A self-describing array: shape plus real or complex data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArchiveArray {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

impl ArchiveArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
        }
    }
}

/// A mapping from array names to arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeArchive {
    version: u32,
    arrays: BTreeMap<String, ArchiveArray>,
}

impl ModeArchive {
    pub fn new() -> Self {
        Self {
            version: ARCHIVE_VERSION,
            arrays: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, array: ArchiveArray) {
        self.arrays.insert(name.into(), array);
    }

    pub fn get(&self, name: &str) -> Option<&ArchiveArray> {
        self.arrays.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ArchiveArray> {
        self.arrays.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Reads an archive written by [`save_archive`].
pub fn load_archive(path: impl AsRef<Path>) -> Result<ModeArchive> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let archive: ModeArchive = bincode::deserialize_from(reader).map_err(|e| Error::CorruptCache {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    if archive.version != ARCHIVE_VERSION {
        return Err(Error::CorruptCache {
            path: path.to_owned(),
            reason: format!(
                "unsupported archive version {} (expected {ARCHIVE_VERSION})",
                archive.version
            ),
        });
    }
    Ok(archive)
}

/// Writes `archive` to `path`.
///
/// The data is written to a temporary file in the destination directory and
/// renamed into place, so a reader never observes a partially written archive.
pub fn save_archive(path: impl AsRef<Path>, archive: &ModeArchive) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        bincode::serialize_into(&mut writer, archive)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    fn sample() -> ModeArchive {
        let mut archive = ModeArchive::new();
        archive.insert("x", ArchiveArray::Real(arr1(&[0.0, 0.5, 1.0]).into_dyn()));
        archive.insert(
            "n_eff",
            ArchiveArray::Complex(
                arr2(&[[Complex64::new(1.9, 1e-5), Complex64::new(1.7, 2e-5)]]).into_dyn(),
            ),
        );
        archive
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("Waveguide_0000.bin");
        let archive = sample();
        save_archive(&path, &archive)?;
        let loaded = load_archive(&path)?;
        assert_eq!(loaded, archive);
        assert_eq!(loaded.get("n_eff").unwrap().shape(), &[1, 2]);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["n_eff", "x"]);
        Ok(())
    }

    #[test]
    fn test_overwrite_replaces_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.bin");
        save_archive(&path, &sample())?;
        let mut other = sample();
        other.remove("x");
        save_archive(&path, &other)?;
        assert_eq!(load_archive(&path)?.len(), 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_garbage_is_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("archive.bin");
        std::fs::write(&path, b"not an archive")?;
        let err = load_archive(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptCache { .. }));
        Ok(())
    }
}
