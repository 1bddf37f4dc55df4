//! Interface to the electromagnetic mode solver.
//!
//! The crate does not solve for modes itself. A [`ModeSolver`] receives a
//! fully resolved [`RectangularDielectric`] and returns a [`ModeSolution`];
//! [`external::ExternalSolver`] forwards the request to a separate program.

use std::fmt::{self, Display};
use std::str::FromStr;

use ndarray::{Array1, Array2, Array4};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::config::waveguide::{GroupIndexStep, Precision, WaveguideConfig};
use crate::error::{Error, Result};
use crate::materials::{get_medium, Medium, C_0};

pub mod external;

/// Mode-solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSpec {
    pub num_modes: usize,
    /// Initial guess for the effective index.
    pub target_neff: f64,
    pub bend_radius: Option<f64>,
    pub bend_axis: usize,
    /// Number of PML layers on each side of the domain.
    pub num_pml: (usize, usize),
    pub precision: Precision,
    pub group_index_step: GroupIndexStep,
}

/// Fully resolved waveguide cross-section, ready to hand to a solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangularDielectric {
    pub wavelength: Vec<f64>,
    pub core_width: f64,
    pub core_thickness: f64,
    pub core_medium: Medium,
    pub clad_medium: Medium,
    pub box_medium: Option<Medium>,
    pub slab_thickness: f64,
    pub clad_thickness: Option<f64>,
    pub box_thickness: Option<f64>,
    pub side_margin: Option<f64>,
    pub sidewall_angle: f64,
    pub sidewall_thickness: f64,
    pub sidewall_medium: Option<Medium>,
    pub surface_thickness: f64,
    pub surface_medium: Option<Medium>,
    pub propagation_axis: usize,
    pub normal_axis: usize,
    pub mode_spec: ModeSpec,
    pub grid_resolution: usize,
    pub max_grid_scaling: f64,
}

impl RectangularDielectric {
    /// Resolves materials and assembles the simulation for `config`.
    ///
    /// Materials are evaluated at the mean frequency of the requested
    /// wavelengths. Loss layers are only added when their `k` is nonzero.
    pub fn from_config(config: &WaveguideConfig) -> Result<Self> {
        let core_medium = get_medium(&config.core_material)?;
        let clad_medium = get_medium(&config.clad_material)?;
        let box_medium = config.box_material.as_ref().map(get_medium).transpose()?;

        let freq0 = C_0 / config.wavelength.mean();
        let n_core = core_medium.nk_model(freq0);
        let n_clad = clad_medium.nk_model(freq0);

        let loss_layer = |k: f64| (k != 0.0).then(|| Medium::from_nk(n_clad.re, n_clad.im + k));

        let mode_spec = ModeSpec {
            num_modes: config.num_modes,
            target_neff: n_core.re,
            bend_radius: config.bend_radius,
            bend_axis: 1,
            num_pml: if config.bend_radius.is_some() {
                (12, 12)
            } else {
                (0, 0)
            },
            precision: config.precision,
            group_index_step: config.group_index_step,
        };

        Ok(Self {
            wavelength: config.wavelength.as_slice().to_vec(),
            core_width: config.core_width,
            core_thickness: config.core_thickness,
            core_medium,
            clad_medium,
            box_medium,
            slab_thickness: config.slab_thickness,
            clad_thickness: config.clad_thickness,
            box_thickness: config.box_thickness,
            side_margin: config.side_margin,
            sidewall_angle: config.sidewall_angle,
            sidewall_thickness: config.sidewall_thickness,
            sidewall_medium: loss_layer(config.sidewall_k),
            surface_thickness: config.surface_thickness,
            surface_medium: loss_layer(config.surface_k),
            propagation_axis: 2,
            normal_axis: 1,
            mode_spec,
            grid_resolution: config.grid_resolution,
            max_grid_scaling: config.max_grid_scaling,
        })
    }
}

/// One of the six field components.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FieldComponent {
    Ex,
    Ey,
    Ez,
    Hx,
    Hy,
    Hz,
}

impl FieldComponent {
    pub const ALL: [FieldComponent; 6] = [
        FieldComponent::Ex,
        FieldComponent::Ey,
        FieldComponent::Ez,
        FieldComponent::Hx,
        FieldComponent::Hy,
        FieldComponent::Hz,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ex => "Ex",
            Self::Ey => "Ey",
            Self::Ez => "Ez",
            Self::Hx => "Hx",
            Self::Hy => "Hy",
            Self::Hz => "Hz",
        }
    }
}

impl Display for FieldComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldComponent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

/// Field components, each shaped `[nx, ny, n_wavelengths, num_modes]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComponents {
    #[serde(rename = "Ex")]
    pub ex: Array4<Complex64>,
    #[serde(rename = "Ey")]
    pub ey: Array4<Complex64>,
    #[serde(rename = "Ez")]
    pub ez: Array4<Complex64>,
    #[serde(rename = "Hx")]
    pub hx: Array4<Complex64>,
    #[serde(rename = "Hy")]
    pub hy: Array4<Complex64>,
    #[serde(rename = "Hz")]
    pub hz: Array4<Complex64>,
}

impl FieldComponents {
    pub fn get(&self, component: FieldComponent) -> &Array4<Complex64> {
        match component {
            FieldComponent::Ex => &self.ex,
            FieldComponent::Ey => &self.ey,
            FieldComponent::Ez => &self.ez,
            FieldComponent::Hx => &self.hx,
            FieldComponent::Hy => &self.hy,
            FieldComponent::Hz => &self.hz,
        }
    }
}

/// Solver output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSolution {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub fields: FieldComponents,
    /// Complex effective index, `[n_wavelengths, num_modes]`.
    pub n_complex: Array2<Complex64>,
    /// Effective mode area, `[n_wavelengths, num_modes]`.
    pub mode_area: Array2<f64>,
    /// Group index, present when requested in the [`ModeSpec`].
    #[serde(default)]
    pub n_group: Option<Array2<f64>>,
    /// Relative permittivity on the grid at the centre wavelength, `[nx, ny]`.
    pub permittivity: Array2<Complex64>,
}

/// Array dimensions implied by a simulation request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SolutionShape {
    pub n_wavelengths: usize,
    pub num_modes: usize,
    /// Whether `n_group` must be present.
    pub group_index: bool,
}

impl SolutionShape {
    pub fn of(simulation: &RectangularDielectric) -> Self {
        Self {
            n_wavelengths: simulation.wavelength.len(),
            num_modes: simulation.mode_spec.num_modes,
            group_index: simulation.mode_spec.group_index_step.is_enabled(),
        }
    }

    /// Describes the first array whose shape differs from the expected one
    /// on an `nx` by `ny` grid.
    pub(crate) fn mismatch(
        &self,
        (nx, ny): (usize, usize),
        fields: &FieldComponents,
        per_mode: &[(&str, &[usize])],
        n_group: Option<&[usize]>,
        (eps_name, eps): (&str, &[usize]),
    ) -> Option<String> {
        let differs = |name: &str, shape: &[usize], expected: &[usize]| {
            (shape != expected)
                .then(|| format!("`{name}` has shape {shape:?}, expected {expected:?}"))
        };
        let field_shape = [nx, ny, self.n_wavelengths, self.num_modes];
        let mode_shape = [self.n_wavelengths, self.num_modes];

        FieldComponent::ALL
            .into_iter()
            .find_map(|c| differs(c.as_str(), fields.get(c).shape(), &field_shape))
            .or_else(|| {
                per_mode
                    .iter()
                    .find_map(|&(name, shape)| differs(name, shape, &mode_shape))
            })
            .or_else(|| match n_group {
                Some(shape) => differs("n_group", shape, &mode_shape),
                None if self.group_index => Some("`n_group` is missing".to_string()),
                None => None,
            })
            .or_else(|| differs(eps_name, eps, &[nx, ny]))
    }
}

impl ModeSolution {
    /// Checks that every array has the shape implied by the grid and `expected`.
    pub fn check(&self, expected: SolutionShape) -> Result<()> {
        let mismatch = expected.mismatch(
            (self.x.len(), self.y.len()),
            &self.fields,
            &[
                ("n_complex", self.n_complex.shape()),
                ("mode_area", self.mode_area.shape()),
            ],
            self.n_group.as_ref().map(|n_group| n_group.shape()),
            ("permittivity", self.permittivity.shape()),
        );
        match mismatch {
            Some(reason) => Err(Error::Solver(reason)),
            None => Ok(()),
        }
    }
}

pub trait ModeSolver: Send + Sync {
    /// Computes the modes of `simulation`.
    fn solve(&self, simulation: &RectangularDielectric) -> Result<ModeSolution>;
}
