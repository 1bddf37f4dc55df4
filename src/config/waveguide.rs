use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use derive_builder::Builder;
use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::key::{cache_key, format_float, SettingValue};
use crate::error::{Error, Result};
use crate::materials::MaterialSpec;
use crate::sweep::ParamValue;
use crate::MODES_PATH;

/// One or more free-space wavelengths, in µm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WavelengthsRepr", into = "Vec<f64>")]
pub struct Wavelengths(Vec<f64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum WavelengthsRepr {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl From<WavelengthsRepr> for Wavelengths {
    fn from(value: WavelengthsRepr) -> Self {
        match value {
            WavelengthsRepr::Scalar(x) => Self(vec![x]),
            WavelengthsRepr::Sequence(v) => Self(v),
        }
    }
}

impl From<Wavelengths> for Vec<f64> {
    fn from(value: Wavelengths) -> Self {
        value.0
    }
}

impl From<f64> for Wavelengths {
    fn from(value: f64) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<f64>> for Wavelengths {
    fn from(value: Vec<f64>) -> Self {
        Self(value)
    }
}

impl From<&[f64]> for Wavelengths {
    fn from(value: &[f64]) -> Self {
        Self(value.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Wavelengths {
    fn from(value: [f64; N]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Array1<f64>> for Wavelengths {
    fn from(value: Array1<f64>) -> Self {
        Self(value.to_vec())
    }
}

impl Wavelengths {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    /// Index of the wavelength closest to `wavelength`, or the middle one if `None`.
    pub fn nearest(&self, wavelength: Option<f64>) -> usize {
        match wavelength {
            Some(target) => self
                .0
                .iter()
                .position_min_by(|a, b| (*a - target).abs().total_cmp(&(*b - target).abs()))
                .unwrap_or(0),
            None => self.0.len() / 2,
        }
    }
}

impl SettingValue for Wavelengths {
    fn serialize_setting(&self) -> String {
        self.0.as_slice().serialize_setting()
    }
}

/// Whether, and how, the group index is computed.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupIndexStep {
    /// `true` uses the solver's default fractional frequency step.
    Enabled(bool),
    /// Fractional frequency step used for numerical differentiation.
    Step(f64),
}

impl Default for GroupIndexStep {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl GroupIndexStep {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }
}

impl From<bool> for GroupIndexStep {
    fn from(value: bool) -> Self {
        Self::Enabled(value)
    }
}

impl From<f64> for GroupIndexStep {
    fn from(value: f64) -> Self {
        Self::Step(value)
    }
}

impl SettingValue for GroupIndexStep {
    fn serialize_setting(&self) -> String {
        match self {
            Self::Enabled(enabled) => enabled.to_string(),
            Self::Step(step) => format_float(*step),
        }
    }
}

/// Floating point precision of the solver.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
}

impl Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Double => write!(f, "double"),
        }
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            _ => Err(Error::InvalidSetting {
                name: "precision".to_string(),
                reason: format!("expected `single` or `double`, got `{s}`"),
            }),
        }
    }
}

impl SettingValue for Precision {
    fn serialize_setting(&self) -> String {
        self.to_string()
    }
}

/// Waveguide cross-section to be mode-solved.
///
/// All dimensions are in µm.
///
/// ```text
///     ________________________________________________
///                                             ^
///                                             ¦
///                                       clad_thickness
///                    |<--core_width-->|       ¦
///                    .________________.      _v_
///                    |       ^        |
///     <-side_margin->|       ¦        |
///     _______________'       ¦        '_______________
///           ^          core_thickness
///     slab_thickness         ¦
///           v                v
///     ________________________________________________
///                            ^
///                      box_thickness
///                            v
///     ________________________________________________
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Debug), setter(into))]
#[serde(deny_unknown_fields)]
pub struct WaveguideConfig {
    /// Free-space wavelength(s).
    pub wavelength: Wavelengths,
    pub core_width: f64,
    /// Core thickness (height).
    pub core_thickness: f64,
    pub core_material: MaterialSpec,
    /// Top cladding material.
    pub clad_material: MaterialSpec,
    /// Bottom cladding material. Defaults to the top cladding.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub box_material: Option<MaterialSpec>,
    /// Thickness of the slab region in a rib waveguide.
    #[builder(default)]
    #[serde(default)]
    pub slab_thickness: f64,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub clad_thickness: Option<f64>,
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub box_thickness: Option<f64>,
    /// Domain extension to the side of the core.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub side_margin: Option<f64>,
    /// Angle of the core sidewall with respect to the substrate normal.
    #[builder(default)]
    #[serde(default)]
    pub sidewall_angle: f64,
    /// Thickness of the side-surface loss layer.
    #[builder(default)]
    #[serde(default)]
    pub sidewall_thickness: f64,
    /// Absorption coefficient of the side-surface loss layer.
    #[builder(default)]
    #[serde(default)]
    pub sidewall_k: f64,
    /// Thickness of the top-surface loss layer.
    #[builder(default)]
    #[serde(default)]
    pub surface_thickness: f64,
    /// Absorption coefficient of the top-surface loss layer.
    #[builder(default)]
    #[serde(default)]
    pub surface_k: f64,
    /// Radius of a circular bend, if simulating one.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub bend_radius: Option<f64>,
    #[builder(default = "2")]
    #[serde(default = "default_num_modes")]
    pub num_modes: usize,
    #[builder(default)]
    #[serde(default)]
    pub group_index_step: GroupIndexStep,
    #[builder(default)]
    #[serde(default)]
    pub precision: Precision,
    /// Wavelength resolution of the computation grid.
    #[builder(default = "20")]
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: usize,
    /// Grid scaling factor in cladding regions.
    #[builder(default = "1.2")]
    #[serde(default = "default_max_grid_scaling")]
    pub max_grid_scaling: f64,
    /// Cache directory. `None` disables the cache.
    #[builder(default = "default_cache_path()")]
    #[serde(
        default = "default_cache_path",
        deserialize_with = "deserialize_cache_path"
    )]
    pub cache_path: Option<PathBuf>,
    /// Recompute and overwrite cached results.
    #[builder(default)]
    #[serde(default)]
    pub overwrite: bool,
}

fn default_num_modes() -> usize {
    2
}

fn default_grid_resolution() -> usize {
    20
}

fn default_max_grid_scaling() -> f64 {
    1.2
}

fn default_cache_path() -> Option<PathBuf> {
    Some(PathBuf::from(MODES_PATH))
}

/// An empty path disables the cache.
fn deserialize_cache_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}

pub fn parse_waveguide_config(path: impl AsRef<Path>) -> Result<WaveguideConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: WaveguideConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl WaveguideConfig {
    #[inline]
    pub fn builder() -> WaveguideConfigBuilder {
        WaveguideConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.wavelength.is_empty() {
            return invalid("at least one wavelength is required".to_string());
        }
        if let Some(wl) = self.wavelength.as_slice().iter().find(|wl| !(**wl > 0.0)) {
            return invalid(format!("wavelengths must be positive, got {wl}"));
        }
        for (name, value) in [
            ("core_width", self.core_width),
            ("core_thickness", self.core_thickness),
        ] {
            if !(value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        for (name, value) in [
            ("slab_thickness", self.slab_thickness),
            ("sidewall_thickness", self.sidewall_thickness),
            ("sidewall_k", self.sidewall_k),
            ("surface_thickness", self.surface_thickness),
            ("surface_k", self.surface_k),
        ] {
            if value < 0.0 {
                return invalid(format!("{name} must not be negative, got {value}"));
            }
        }
        for (name, value) in [
            ("clad_thickness", self.clad_thickness),
            ("box_thickness", self.box_thickness),
            ("side_margin", self.side_margin),
            ("bend_radius", self.bend_radius),
        ] {
            if let Some(value) = value {
                if !(value > 0.0) {
                    return invalid(format!("{name} must be positive, got {value}"));
                }
            }
        }
        if self.num_modes == 0 {
            return invalid("num_modes must be at least 1".to_string());
        }
        if self.grid_resolution == 0 {
            return invalid("grid_resolution must be at least 1".to_string());
        }
        if let GroupIndexStep::Step(step) = self.group_index_step {
            if !(step > 0.0 && step < 1.0) {
                return invalid(format!(
                    "group_index_step must be in (0, 1), got {step}"
                ));
            }
        }
        if !(self.max_grid_scaling >= 1.0) {
            return invalid(format!(
                "max_grid_scaling must be at least 1, got {}",
                self.max_grid_scaling
            ));
        }
        Ok(())
    }

    /// Serialized values of every declared setting, in declaration order.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("wavelength", self.wavelength.serialize_setting()),
            ("core_width", self.core_width.serialize_setting()),
            ("core_thickness", self.core_thickness.serialize_setting()),
            ("core_material", self.core_material.serialize_setting()),
            ("clad_material", self.clad_material.serialize_setting()),
            ("box_material", self.box_material.serialize_setting()),
            ("slab_thickness", self.slab_thickness.serialize_setting()),
            ("clad_thickness", self.clad_thickness.serialize_setting()),
            ("box_thickness", self.box_thickness.serialize_setting()),
            ("side_margin", self.side_margin.serialize_setting()),
            ("sidewall_angle", self.sidewall_angle.serialize_setting()),
            ("sidewall_thickness", self.sidewall_thickness.serialize_setting()),
            ("sidewall_k", self.sidewall_k.serialize_setting()),
            ("surface_thickness", self.surface_thickness.serialize_setting()),
            ("surface_k", self.surface_k.serialize_setting()),
            ("bend_radius", self.bend_radius.serialize_setting()),
            ("num_modes", self.num_modes.serialize_setting()),
            ("group_index_step", self.group_index_step.serialize_setting()),
            ("precision", self.precision.serialize_setting()),
            ("grid_resolution", self.grid_resolution.serialize_setting()),
            ("max_grid_scaling", self.max_grid_scaling.serialize_setting()),
            ("cache_path", self.cache_path.serialize_setting()),
            ("overwrite", self.overwrite.serialize_setting()),
        ]
    }

    /// Content hash of this configuration.
    pub fn cache_key(&self) -> String {
        cache_key(&self.settings())
    }

    /// Overrides the setting `name` with `value`.
    ///
    /// `self` is left unchanged if the new value is rejected.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let mut updated = self.clone();
        updated.apply(name, value)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidSetting {
            name: name.to_string(),
            reason: format!("{reason}, got `{value}`"),
        };
        let number = || value.as_f64().ok_or_else(|| invalid("expected a number"));
        let count = || value.as_usize().ok_or_else(|| invalid("expected a count"));
        let is_none = matches!(value, ParamValue::Str(s) if s == "None");
        let material = || -> Result<MaterialSpec> {
            match value {
                ParamValue::Str(s) => Ok(MaterialSpec::Name(s.clone())),
                ParamValue::List(items) => match items.as_slice() {
                    [n, k] => match (n.as_f64(), k.as_f64()) {
                        (Some(n), Some(k)) => Ok(MaterialSpec::Nk(n, k)),
                        _ => Err(invalid("expected (n, k)")),
                    },
                    _ => Err(invalid("expected (n, k)")),
                },
                v => v
                    .as_f64()
                    .map(MaterialSpec::Index)
                    .ok_or_else(|| invalid("expected a material")),
            }
        };
        let boolean = || match value {
            ParamValue::Str(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ParamValue::Str(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(invalid("expected `true` or `false`")),
        };

        match name {
            "wavelength" => {
                self.wavelength = match value {
                    ParamValue::List(items) => items
                        .iter()
                        .map(ParamValue::as_f64)
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("expected numbers"))?
                        .into(),
                    _ => number()?.into(),
                }
            }
            "core_width" => self.core_width = number()?,
            "core_thickness" => self.core_thickness = number()?,
            "core_material" => self.core_material = material()?,
            "clad_material" => self.clad_material = material()?,
            "box_material" => self.box_material = if is_none { None } else { Some(material()?) },
            "slab_thickness" => self.slab_thickness = number()?,
            "clad_thickness" => self.clad_thickness = if is_none { None } else { Some(number()?) },
            "box_thickness" => self.box_thickness = if is_none { None } else { Some(number()?) },
            "side_margin" => self.side_margin = if is_none { None } else { Some(number()?) },
            "sidewall_angle" => self.sidewall_angle = number()?,
            "sidewall_thickness" => self.sidewall_thickness = number()?,
            "sidewall_k" => self.sidewall_k = number()?,
            "surface_thickness" => self.surface_thickness = number()?,
            "surface_k" => self.surface_k = number()?,
            "bend_radius" => self.bend_radius = if is_none { None } else { Some(number()?) },
            "num_modes" => self.num_modes = count()?,
            "group_index_step" => {
                self.group_index_step = match boolean() {
                    Ok(enabled) => GroupIndexStep::Enabled(enabled),
                    Err(_) => GroupIndexStep::Step(number()?),
                }
            }
            "precision" => {
                self.precision = match value {
                    ParamValue::Str(s) => s.parse()?,
                    _ => return Err(invalid("expected `single` or `double`")),
                }
            }
            "grid_resolution" => self.grid_resolution = count()?,
            "max_grid_scaling" => self.max_grid_scaling = number()?,
            "cache_path" => {
                self.cache_path = match value {
                    _ if is_none => None,
                    ParamValue::Str(s) => Some(PathBuf::from(s)),
                    _ => return Err(invalid("expected a path")),
                }
            }
            "overwrite" => self.overwrite = boolean()?,
            _ => return Err(Error::UnknownSetting(name.to_string())),
        }
        Ok(())
    }
}

impl Display for WaveguideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Waveguide({})",
            self.settings()
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .join(", ")
        )
    }
}
