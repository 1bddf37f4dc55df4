use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{arr1, Array2, Array4};
use num_complex::Complex64;

use crate::config::waveguide::WaveguideConfig;
use crate::error::Result;
use crate::solver::{FieldComponents, ModeSolution, ModeSolver, RectangularDielectric};

/// Builds a solution on a uniform 3 x 2 grid.
///
/// Even modes are TE (`Ex = Hy = 1`), odd modes are TM (`Ey = 1`, `Hx = -1`).
/// Mode `m` at wavelength `w` has `n_eff = 2 - 0.1 m - 0.01 w + 1e-4 (m + 1) i`.
pub(crate) fn fake_solution(n_wavelengths: usize, num_modes: usize, group_index: bool) -> ModeSolution {
    let (nx, ny) = (3, 2);
    let shape = (nx, ny, n_wavelengths, num_modes);
    let one = Complex64::new(1.0, 0.0);
    let te = |m: usize| if m % 2 == 0 { one } else { Complex64::default() };
    let tm = |m: usize| if m % 2 == 1 { one } else { Complex64::default() };

    let fields = FieldComponents {
        ex: Array4::from_shape_fn(shape, |(_, _, _, m)| te(m)),
        ey: Array4::from_shape_fn(shape, |(_, _, _, m)| tm(m)),
        ez: Array4::zeros(shape),
        hx: Array4::from_shape_fn(shape, |(_, _, _, m)| -tm(m)),
        hy: Array4::from_shape_fn(shape, |(_, _, _, m)| te(m)),
        hz: Array4::zeros(shape),
    };

    let n_complex = Array2::from_shape_fn((n_wavelengths, num_modes), |(w, m)| {
        Complex64::new(
            2.0 - 0.1 * m as f64 - 0.01 * w as f64,
            1e-4 * (m + 1) as f64,
        )
    });
    let mode_area = Array2::from_shape_fn((n_wavelengths, num_modes), |(_, m)| 0.5 + 0.1 * m as f64);
    let n_group = group_index
        .then(|| Array2::from_shape_fn((n_wavelengths, num_modes), |(w, m)| 2.2 - 0.1 * m as f64 + 0.01 * w as f64));

    ModeSolution {
        x: arr1(&[0.0, 1.0, 2.0]),
        y: arr1(&[0.0, 1.0]),
        fields,
        n_complex,
        mode_area,
        n_group,
        permittivity: Array2::from_elem((nx, ny), Complex64::new(4.0, 0.0)),
    }
}

/// In-process solver returning [`fake_solution`] and counting invocations.
#[derive(Debug, Default)]
pub(crate) struct FakeSolver {
    calls: AtomicUsize,
}

impl FakeSolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModeSolver for FakeSolver {
    fn solve(&self, simulation: &RectangularDielectric) -> Result<ModeSolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_solution(
            simulation.wavelength.len(),
            simulation.mode_spec.num_modes,
            simulation.mode_spec.group_index_step.is_enabled(),
        ))
    }
}

/// A small strip waveguide caching into `cache_dir`.
pub(crate) fn strip_config(cache_dir: &Path) -> WaveguideConfig {
    let mut config = WaveguideConfig::builder()
        .wavelength([1.5, 1.55, 1.6])
        .core_width(1.0)
        .core_thickness(0.3)
        .core_material("sin")
        .clad_material("sio2")
        .build()
        .unwrap();
    config.cache_path = Some(cache_dir.to_owned());
    config
}
