//! Fixed cells backed by GDS files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use gds21::{GdsElement, GdsLibrary, GdsStruct};
use log::debug;

use crate::error::{Error, Result};

/// A fixed layout cell loaded from a GDS file.
#[derive(Debug, Clone)]
pub struct Cell {
    pub name: ArcStr,
    pub gds_path: PathBuf,
    pub library: GdsLibrary,
}

impl Cell {
    /// The top-level struct of the library.
    pub fn top(&self) -> Option<&GdsStruct> {
        self.library.structs.iter().find(|s| s.name == self.name.as_str())
    }
}

/// Loads `file_name` from `gds_dir` and returns its top cell.
pub fn import_gds(gds_dir: impl AsRef<Path>, file_name: &str) -> Result<Cell> {
    let gds_path = gds_dir.as_ref().join(file_name);
    debug!("importing {:?}", gds_path);
    let library = GdsLibrary::load(&gds_path).map_err(|e| Error::Gds(e.to_string()))?;
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let name = top_cell(&library, stem).ok_or_else(|| Error::NoCells(gds_path.clone()))?;

    Ok(Cell {
        name: ArcStr::from(name),
        gds_path,
        library,
    })
}

/// Name of the top cell of `library`.
///
/// Top cells are structs that no other struct instantiates. When there are
/// several, the one named `preferred` wins, otherwise the last one defined.
pub fn top_cell<'a>(library: &'a GdsLibrary, preferred: &str) -> Option<&'a str> {
    let referenced: HashSet<&str> = library
        .structs
        .iter()
        .flat_map(|s| s.elems.iter())
        .filter_map(|elem| match elem {
            GdsElement::GdsStructRef(r) => Some(r.name.as_str()),
            GdsElement::GdsArrayRef(r) => Some(r.name.as_str()),
            _ => None,
        })
        .collect();

    let tops: Vec<&str> = library
        .structs
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| !referenced.contains(name))
        .collect();

    tops.iter()
        .find(|name| **name == preferred)
        .or_else(|| tops.last())
        .copied()
        .or_else(|| library.structs.last().map(|s| s.name.as_str()))
}
