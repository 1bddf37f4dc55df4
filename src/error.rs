use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("gds error: {0}")]
    Gds(String),

    #[error("error rendering template: {0}")]
    Template(#[from] tera::Error),

    #[error("error parsing TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("error serializing/deserializing JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error encoding/decoding mode archive: {0}")]
    Archive(#[from] bincode::Error),

    #[error("invalid waveguide configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown setting `{0}`")]
    UnknownSetting(String),

    #[error("invalid value for setting `{name}`: {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("material not found: {0}")]
    UnknownMaterial(String),

    #[error("field name must be one of 'Ex', 'Ey', 'Ez', 'Hx', 'Hy', 'Hz', got `{0}`")]
    UnknownField(String),

    #[error("value must be one of 'real', 'imag', 'abs', 'phase', 'dB', got `{0}`")]
    InvalidFieldValue(String),

    #[error("mode_index = {mode_index} must be less than num_modes {num_modes}")]
    ModeIndexOutOfRange { mode_index: usize, num_modes: usize },

    #[error("corrupt mode cache at {path:?}: {reason}")]
    CorruptCache { path: PathBuf, reason: String },

    #[error("mode solver error: {0}")]
    Solver(String),

    #[error("mismatched simulation grids: {0}")]
    GridMismatch(String),

    #[error("mismatched array shapes: {0}")]
    ShapeMismatch(String),

    #[error("invalid parameter sweep: {0}")]
    Sweep(String),

    #[error("duplicate cell name `{name}` generated from {path:?}")]
    DuplicateCell { name: String, path: PathBuf },

    #[error("no cells found in GDS file {0:?}")]
    NoCells(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
