//! Process design kit utilities for the SiN 300 nm C-band platform.
//!
//! Two tools live here:
//!
//! * [`codegen`] turns a directory of GDS files into a Rust module with one
//!   function per fixed cell (see [`cells::import_gds`]).
//! * [`modes`] wraps an external waveguide mode solver, deriving a content hash
//!   from the [`config::WaveguideConfig`] and caching solver results on disk.
use lazy_static::lazy_static;
use tera::Tera;

pub mod cache;
pub mod cells;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod materials;
pub mod modes;
pub mod paths;
pub mod plan;
pub mod solver;
pub mod sweep;

#[cfg(test)]
pub(crate) mod tests;

pub use error::{Error, Result};

/// Default cache directory for waveguide mode data.
pub const MODES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build/modes");

lazy_static! {
    pub static ref TEMPLATES: Tera =
        match Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/*")) {
            Ok(t) => t,
            Err(e) => panic!("Error parsing templates: {e}"),
        };
}
