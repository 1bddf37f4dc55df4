//! Optical materials.
//!
//! A [`MaterialSpec`] is what a user writes in a waveguide configuration; a
//! [`Medium`] is the resolved optical model handed to the mode solver.

use itertools::Itertools;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::cache::key::{format_float, SettingValue};
use crate::error::{Error, Result};

/// Speed of light in vacuum, in µm/s.
pub const C_0: f64 = 2.997_924_58e14;

/// A single Sellmeier term `b λ² / (λ² - c)`, with `c` in µm².
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellmeierTerm {
    pub b: f64,
    pub c: f64,
}

impl SellmeierTerm {
    /// Creates a term from its resonance wavelength in µm.
    pub fn from_resonance(b: f64, wavelength: f64) -> Self {
        Self {
            b,
            c: wavelength * wavelength,
        }
    }
}

/// An optical medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Medium {
    /// Non-dispersive medium with a fixed complex relative permittivity.
    Constant { permittivity: Complex64 },
    /// Lossless dispersive medium, `eps(λ) = eps_inf + Σ b λ² / (λ² - c)`.
    Sellmeier {
        #[serde(default = "unit_eps_inf")]
        eps_inf: f64,
        terms: Vec<SellmeierTerm>,
    },
}

fn unit_eps_inf() -> f64 {
    1.0
}

impl Medium {
    /// Medium with real refractive index `n`.
    pub fn from_index(n: f64) -> Self {
        Self::Constant {
            permittivity: Complex64::new(n * n, 0.0),
        }
    }

    /// Medium with complex refractive index `n + ik`.
    pub fn from_nk(n: f64, k: f64) -> Self {
        let nk = Complex64::new(n, k);
        Self::Constant {
            permittivity: nk * nk,
        }
    }

    /// Complex relative permittivity at frequency `freq` (Hz).
    pub fn eps_model(&self, freq: f64) -> Complex64 {
        match self {
            Self::Constant { permittivity } => *permittivity,
            Self::Sellmeier { eps_inf, terms } => {
                let wl2 = (C_0 / freq).powi(2);
                let eps = terms
                    .iter()
                    .fold(*eps_inf, |acc, t| acc + t.b * wl2 / (wl2 - t.c));
                Complex64::new(eps, 0.0)
            }
        }
    }

    /// Complex refractive index at frequency `freq` (Hz).
    pub fn nk_model(&self, freq: f64) -> Complex64 {
        self.eps_model(freq).sqrt()
    }
}

impl SettingValue for Medium {
    fn serialize_setting(&self) -> String {
        match self {
            Self::Constant { permittivity } => format!(
                "Constant(permittivity=({}, {}))",
                format_float(permittivity.re),
                format_float(permittivity.im)
            ),
            Self::Sellmeier { eps_inf, terms } => format!(
                "Sellmeier(eps_inf={}, terms=[{}])",
                format_float(*eps_inf),
                terms
                    .iter()
                    .map(|t| format!("({}, {})", format_float(t.b), format_float(t.c)))
                    .join(", ")
            ),
        }
    }
}

/// A material as written in a configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialSpec {
    /// Name of a material in the built-in library.
    Name(String),
    /// Real refractive index.
    Index(f64),
    /// Real and imaginary parts of the refractive index.
    Nk(f64, f64),
    /// Explicit optical model.
    Medium(Medium),
}

impl From<&str> for MaterialSpec {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for MaterialSpec {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<f64> for MaterialSpec {
    fn from(value: f64) -> Self {
        Self::Index(value)
    }
}

impl From<(f64, f64)> for MaterialSpec {
    fn from((n, k): (f64, f64)) -> Self {
        Self::Nk(n, k)
    }
}

impl From<Medium> for MaterialSpec {
    fn from(value: Medium) -> Self {
        Self::Medium(value)
    }
}

impl SettingValue for MaterialSpec {
    fn serialize_setting(&self) -> String {
        match self {
            // Quoted so that no material name can collide with the `None` token.
            Self::Name(name) => format!("{name:?}"),
            Self::Index(n) => format_float(*n),
            Self::Nk(n, k) => format!("({}, {})", format_float(*n), format_float(*k)),
            Self::Medium(medium) => medium.serialize_setting(),
        }
    }
}

/// Looks up a material in the built-in library. Names are case-insensitive.
pub fn library_medium(name: &str) -> Option<Medium> {
    let sellmeier = |terms: &[(f64, f64)]| Medium::Sellmeier {
        eps_inf: 1.0,
        terms: terms
            .iter()
            .map(|&(b, wl)| SellmeierTerm::from_resonance(b, wl))
            .collect(),
    };
    match name.to_ascii_lowercase().as_str() {
        "si" => Some(sellmeier(&[
            (10.668_429_3, 0.301_516_485),
            (0.003_043_474_8, 1.134_751_15),
            (1.541_334_08, 1104.0),
        ])),
        "sio2" => Some(sellmeier(&[
            (0.696_166_3, 0.068_404_3),
            (0.407_942_6, 0.116_241_4),
            (0.897_479_4, 9.896_161),
        ])),
        "sin" | "si3n4" => Some(sellmeier(&[(3.0249, 0.135_340_6), (40314.0, 1239.842)])),
        "air" => Some(Medium::from_index(1.0)),
        _ => None,
    }
}

/// Resolves a material specification into an optical medium.
pub fn get_medium(spec: &MaterialSpec) -> Result<Medium> {
    match spec {
        MaterialSpec::Name(name) => {
            library_medium(name).ok_or_else(|| Error::UnknownMaterial(name.clone()))
        }
        MaterialSpec::Index(n) => Ok(Medium::from_index(*n)),
        MaterialSpec::Nk(n, k) => Ok(Medium::from_nk(*n, *k)),
        MaterialSpec::Medium(medium) => Ok(medium.clone()),
    }
}
