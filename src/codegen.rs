//! Generates a Rust module exposing every GDS file in a directory as a cell.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tera::Context;

use crate::error::{Error, Result};
use crate::TEMPLATES;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImportGdsParams {
    /// Absolute GDS directory as a Rust string literal.
    pub gds_dir: String,
    /// Module path used in the generated doc examples.
    pub module: Option<String>,
    pub cells: Vec<CellEntry>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellEntry {
    pub name: String,
    pub file_name: String,
    pub file_literal: String,
}

/// Function name for a GDS file stem.
///
/// Lowercases the stem and replaces every character that cannot appear in an
/// identifier with `_`. Keywords and a bare `_` get a trailing `_`.
pub fn cell_name(stem: &str) -> String {
    let mut name: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if KEYWORDS.contains(&name.as_str()) || name == "_" {
        name.push('_');
    }
    name
}

/// `*.gds` files in `gds_dir`, sorted by name.
pub fn gds_files(gds_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(gds_dir)? {
        let path = entry?.path();
        let is_gds = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gds"))
            .unwrap_or(false);
        if path.is_file() && is_gds {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn import_gds_params(gds_dir: impl AsRef<Path>, module: Option<&str>) -> Result<ImportGdsParams> {
    let gds_dir = gds_dir.as_ref().canonicalize()?;
    let files = gds_files(&gds_dir)?;
    if files.is_empty() {
        warn!("no GDS files found in {:?}", gds_dir);
    }

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut cells = Vec::with_capacity(files.len());
    for path in files {
        let (Some(stem), Some(file_name)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.file_name().and_then(|s| s.to_str()),
        ) else {
            warn!("skipping GDS file with non UTF-8 name {:?}", path);
            continue;
        };
        let name = cell_name(stem);
        if seen.contains_key(&name) {
            return Err(Error::DuplicateCell { name, path });
        }
        cells.push(CellEntry {
            name: name.clone(),
            file_name: file_name.to_string(),
            file_literal: format!("{file_name:?}"),
        });
        seen.insert(name, path.clone());
    }

    Ok(ImportGdsParams {
        gds_dir: format!("{:?}", gds_dir.to_string_lossy()),
        module: module.map(str::to_string),
        cells,
    })
}

pub fn generate_import_gds_script(gds_dir: impl AsRef<Path>, module: Option<&str>) -> Result<String> {
    let params = import_gds_params(gds_dir, module)?;
    Ok(TEMPLATES.render("import_gds.rs", &Context::from_serialize(params)?)?)
}

pub fn save_import_gds_script(
    path: impl AsRef<Path>,
    gds_dir: impl AsRef<Path>,
    module: Option<&str>,
) -> Result<()> {
    let script = generate_import_gds_script(gds_dir, module)?;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, script)?;
    info!("wrote cell module to {:?}", path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::tests::write_gds;

    #[test]
    fn test_cell_name() {
        assert_eq!(cell_name("MMI1x2"), "mmi1x2");
        assert_eq!(cell_name("grating-coupler.te"), "grating_coupler_te");
        assert_eq!(cell_name("2x2"), "_2x2");
        assert_eq!(cell_name("type"), "type_");
        assert_eq!(cell_name(""), "__");
        assert_eq!(cell_name("-"), "__");
        assert_eq!(cell_name("_"), "__");
        assert_eq!(cell_name("_x"), "_x");
    }

    #[test]
    fn test_generate_script() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_gds(dir.path(), "mmi1x2.gds", &[("mmi1x2", vec![])]);
        write_gds(dir.path(), "Crossing.gds", &[("crossing", vec![])]);
        std::fs::write(dir.path().join("notes.txt"), "not a layout")?;

        let script = generate_import_gds_script(dir.path(), Some("cspdk_cells::fixed"))?;
        let gds_dir = dir.path().canonicalize()?;
        assert!(script.contains(&format!(
            "pub const GDS_DIR: &str = {:?};",
            gds_dir.to_string_lossy()
        )));
        assert!(script.contains("pub fn crossing() -> Result<Cell> {"));
        assert!(script.contains("import_gds(GDS_DIR, \"Crossing.gds\")"));
        assert!(script.contains("pub fn mmi1x2() -> Result<Cell> {"));
        assert!(script.contains("let cell = cspdk_cells::fixed::mmi1x2().unwrap();"));
        assert!(!script.contains("notes"));
        assert!(script.find("fn crossing").unwrap() < script.find("fn mmi1x2").unwrap());
        Ok(())
    }

    #[test]
    fn test_generate_without_module() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_gds(dir.path(), "ring.gds", &[("ring", vec![])]);
        let script = generate_import_gds_script(dir.path(), None)?;
        assert!(script.contains("pub fn ring() -> Result<Cell> {"));
        assert!(!script.contains("no_run"));
        Ok(())
    }

    #[test]
    fn test_duplicate_cell_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_gds(dir.path(), "mmi-1x2.gds", &[("a", vec![])]);
        write_gds(dir.path(), "mmi_1x2.gds", &[("b", vec![])]);
        assert!(matches!(
            generate_import_gds_script(dir.path(), None),
            Err(Error::DuplicateCell { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let params = import_gds_params(dir.path(), None)?;
        assert!(params.cells.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_script() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let gds_dir = dir.path().join("gds");
        std::fs::create_dir(&gds_dir)?;
        write_gds(&gds_dir, "taper.gds", &[("taper", vec![])]);

        let out = dir.path().join("src").join("cells.rs");
        save_import_gds_script(&out, &gds_dir, None)?;
        assert!(std::fs::read_to_string(out)?.contains("pub fn taper()"));
        Ok(())
    }
}
