//! Cached waveguide mode data.
//!
//! A [`Waveguide`] pairs a [`WaveguideConfig`] with a [`ModeSolver`]. Mode
//! data is computed at most once per instance, and at most once per cache key
//! across runs when a cache directory is configured:
//!
//! * no cache directory: always solve, never persist;
//! * cache file present and `overwrite` unset: load it without solving;
//! * otherwise: solve, then persist.

use std::f64::consts::{E, PI};
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use ndarray::{Array1, Array2, Array3, ArrayView2};
use num_complex::Complex64;
use once_cell::unsync::OnceCell;

use crate::cache::{load_archive, save_archive};
use crate::config::waveguide::WaveguideConfig;
use crate::error::{Error, Result};
use crate::paths::out_modes;
use crate::solver::{ModeSolver, RectangularDielectric, SolutionShape};

pub mod data;
pub mod field;
pub mod overlap;

pub use data::ModeData;
pub use field::{FieldMap, FieldQuery, FieldValue};

/// Propagation loss in dB/cm for each entry of `n_eff`.
///
/// Row `w` of `n_eff` is evaluated at `wavelength_um[w]`.
pub fn loss_db_per_cm(n_eff: ArrayView2<Complex64>, wavelength_um: &[f64]) -> Result<Array2<f64>> {
    if n_eff.nrows() != wavelength_um.len() {
        return Err(Error::ShapeMismatch(format!(
            "n_eff has {} rows for {} wavelengths",
            n_eff.nrows(),
            wavelength_um.len()
        )));
    }
    let db_per_neper = 20.0 * E.log10();
    let mut loss = n_eff.mapv(|n| n.im);
    for (mut row, wl) in loss.outer_iter_mut().zip(wavelength_um) {
        let wl_m = wl * 1e-6;
        row.mapv_inplace(|k| db_per_neper * (2.0 * PI * k / wl_m) * 1e-2);
    }
    Ok(loss)
}

pub struct Waveguide {
    config: WaveguideConfig,
    solver: Arc<dyn ModeSolver>,
    simulation: OnceCell<RectangularDielectric>,
    data: OnceCell<ModeData>,
    loss: OnceCell<Array2<f64>>,
}

impl Waveguide {
    /// Name used as the cache file prefix.
    pub const TYPE_NAME: &'static str = "Waveguide";

    pub fn new(config: WaveguideConfig, solver: Arc<dyn ModeSolver>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            solver,
            simulation: OnceCell::new(),
            data: OnceCell::new(),
            loss: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &WaveguideConfig {
        &self.config
    }

    pub fn cache_key(&self) -> String {
        self.config.cache_key()
    }

    /// Cache file for this configuration, creating the cache directory.
    ///
    /// Returns `None` when caching is disabled.
    pub fn filepath(&self) -> Result<Option<PathBuf>> {
        match &self.config.cache_path {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(Some(out_modes(dir, Self::TYPE_NAME, &self.cache_key())))
            }
            None => Ok(None),
        }
    }

    /// The simulation handed to the solver, built on first access.
    pub fn simulation(&self) -> Result<&RectangularDielectric> {
        self.simulation
            .get_or_try_init(|| RectangularDielectric::from_config(&self.config))
    }

    /// Mode data, loaded from the cache or computed on first access.
    pub fn data(&self) -> Result<&ModeData> {
        self.data.get_or_try_init(|| self.load_or_solve())
    }

    /// Array dimensions this configuration yields.
    pub fn expected_shape(&self) -> SolutionShape {
        SolutionShape {
            n_wavelengths: self.config.wavelength.len(),
            num_modes: self.config.num_modes,
            group_index: self.config.group_index_step.is_enabled(),
        }
    }

    fn load_or_solve(&self) -> Result<ModeData> {
        let filepath = self.filepath()?;
        if let Some(path) = &filepath {
            if path.exists() && !self.config.overwrite {
                info!("load data from {:?}", path);
                let data = ModeData::from_archive(load_archive(path)?, path)?;
                data.check(self.expected_shape(), path)?;
                return Ok(data);
            }
        }

        let simulation = self.simulation()?;
        debug!("solving modes for {}", self);
        let solution = self.solver.solve(simulation)?;
        solution.check(self.expected_shape())?;
        let data = ModeData::from_solution(solution);

        if let Some(path) = &filepath {
            info!("store data into {:?}", path);
            save_archive(path, &data.to_archive())?;
        }
        Ok(data)
    }

    pub fn x(&self) -> Result<&Array1<f64>> {
        Ok(&self.data()?.x)
    }

    pub fn y(&self) -> Result<&Array1<f64>> {
        Ok(&self.data()?.y)
    }

    /// Complex effective index, `[n_wavelengths, num_modes]`.
    pub fn n_eff(&self) -> Result<&Array2<Complex64>> {
        Ok(&self.data()?.n_eff)
    }

    /// Group index, if `group_index_step` was enabled.
    pub fn n_group(&self) -> Result<Option<&Array2<f64>>> {
        Ok(self.data()?.n_group.as_ref())
    }

    pub fn mode_area(&self) -> Result<&Array2<f64>> {
        Ok(&self.data()?.mode_area)
    }

    pub fn fraction_te(&self) -> Result<&Array1<f64>> {
        Ok(&self.data()?.fraction_te)
    }

    pub fn fraction_tm(&self) -> Result<&Array1<f64>> {
        Ok(&self.data()?.fraction_tm)
    }

    /// Propagation loss in dB/cm, `[n_wavelengths, num_modes]`.
    pub fn loss_db_per_cm(&self) -> Result<&Array2<f64>> {
        self.loss.get_or_try_init(|| {
            loss_db_per_cm(self.n_eff()?.view(), self.config.wavelength.as_slice())
        })
    }

    /// Refractive index of the cross-section, indexed `[iy, ix]`.
    pub fn index(&self) -> Result<Array2<Complex64>> {
        Ok(self.data()?.eps.mapv(|e| e.sqrt()).reversed_axes())
    }

    /// Overlap integrals with the modes of `other`, `[n_wavelengths, modes, other_modes]`.
    pub fn overlap(&self, other: &Waveguide, conjugate: bool) -> Result<Array3<Complex64>> {
        overlap::mode_overlap(self.data()?, other.data()?, conjugate)
    }

    /// A field map of one mode.
    ///
    /// The mode index is checked before any data is computed.
    pub fn field(&self, query: &FieldQuery) -> Result<FieldMap> {
        if query.mode_index >= self.config.num_modes {
            return Err(Error::ModeIndexOutOfRange {
                mode_index: query.mode_index,
                num_modes: self.config.num_modes,
            });
        }
        let w = self.config.wavelength.nearest(query.wavelength);
        let wavelength = self.config.wavelength.as_slice()[w];
        Ok(field::extract_field(self.data()?, query, w, wavelength))
    }
}

impl Display for Waveguide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config)
    }
}

impl fmt::Debug for Waveguide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waveguide")
            .field("config", &self.config)
            .field("solved", &self.data.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    use super::*;
    use crate::materials::MaterialSpec;
    use crate::tests::{fake_solution, strip_config, FakeSolver};

    fn waveguide(config: WaveguideConfig) -> (Arc<FakeSolver>, Waveguide) {
        let solver = Arc::new(FakeSolver::new());
        let wg = Waveguide::new(config, solver.clone()).unwrap();
        (solver, wg)
    }

    #[test]
    fn test_solves_once_per_instance() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = strip_config(dir.path());
        config.cache_path = None;
        let (solver, wg) = waveguide(config);

        assert_eq!(wg.n_eff()?.shape(), &[3, 2]);
        wg.mode_area()?;
        wg.fraction_te()?;
        wg.loss_db_per_cm()?;
        assert_eq!(solver.calls(), 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_cache_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (first_solver, first) = waveguide(strip_config(dir.path()));
        let computed = first.data()?.clone();
        assert_eq!(first_solver.calls(), 1);

        let path = first.filepath()?.unwrap();
        assert!(path.exists());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("Waveguide_{}.bin", first.cache_key())
        );

        let (second_solver, second) = waveguide(strip_config(dir.path()));
        assert_eq!(second.data()?, &computed);
        assert_eq!(second_solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_overwrite_recomputes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = strip_config(dir.path());
        config.overwrite = true;
        let (_, first) = waveguide(config.clone());
        first.data()?;

        let (solver, second) = waveguide(config);
        assert!(second.filepath()?.unwrap().exists());
        second.data()?;
        assert_eq!(solver.calls(), 1);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_uncreatable_cache_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"")?;
        let (solver, wg) = waveguide(strip_config(&blocker.join("modes")));
        assert!(matches!(wg.data(), Err(Error::Io(_))));
        assert_eq!(solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_corrupt_cache_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (solver, wg) = waveguide(strip_config(dir.path()));
        std::fs::write(wg.filepath()?.unwrap(), b"garbage")?;
        assert!(matches!(wg.data(), Err(Error::CorruptCache { .. })));
        assert_eq!(solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_mismatched_cache_is_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (solver, wg) = waveguide(strip_config(dir.path()));
        let single_wavelength = ModeData::from_solution(fake_solution(1, 2, false));
        save_archive(wg.filepath()?.unwrap(), &single_wavelength.to_archive())?;

        assert!(matches!(
            wg.loss_db_per_cm(),
            Err(Error::CorruptCache { .. })
        ));
        let query = FieldQuery::new("Ex", "real", 1, Some(1.6))?;
        assert!(matches!(wg.field(&query), Err(Error::CorruptCache { .. })));
        assert!(matches!(wg.overlap(&wg, false), Err(Error::CorruptCache { .. })));
        assert_eq!(solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_cache_without_requested_group_index_is_corrupt() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = strip_config(dir.path());
        config.group_index_step = true.into();
        let (_, wg) = waveguide(config);
        let data = ModeData::from_solution(fake_solution(3, 2, false));
        save_archive(wg.filepath()?.unwrap(), &data.to_archive())?;

        assert!(matches!(wg.n_group(), Err(Error::CorruptCache { .. })));
        Ok(())
    }

    #[test]
    fn test_mode_index_checked_before_solving() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (solver, wg) = waveguide(strip_config(dir.path()));
        let query = FieldQuery::new("Ex", "real", 2, None)?;
        assert!(matches!(
            wg.field(&query),
            Err(Error::ModeIndexOutOfRange {
                mode_index: 2,
                num_modes: 2
            })
        ));
        assert_eq!(solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_field_uses_nearest_wavelength() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        let map = wg.field(&FieldQuery::new("Ey", "abs", 1, Some(1.61))?)?;
        assert_eq!(map.wavelength, 1.6);
        assert_eq!(map.values.shape(), &[2, 3]);
        assert!(map.values.iter().all(|v| *v == 1.0));

        let map = wg.field(&FieldQuery::new("Ex", "real", 0, None)?)?;
        assert_eq!(map.wavelength, 1.55);
        Ok(())
    }

    #[test]
    fn test_unknown_material_fails_on_first_access() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = strip_config(dir.path());
        config.clad_material = MaterialSpec::from("vibranium");
        let (solver, wg) = waveguide(config);
        assert!(matches!(wg.n_eff(), Err(Error::UnknownMaterial(_))));
        assert_eq!(solver.calls(), 0);
        Ok(())
    }

    #[test]
    fn test_group_index() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        assert!(wg.n_group()?.is_none());

        let mut config = strip_config(dir.path());
        config.group_index_step = true.into();
        let (_, wg) = waveguide(config);
        assert_eq!(wg.n_group()?.unwrap().shape(), &[3, 2]);
        Ok(())
    }

    #[test]
    fn test_polarization() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        assert_eq!(wg.fraction_te()?.to_vec(), vec![1.0, 0.0]);
        assert_eq!(wg.fraction_tm()?.to_vec(), vec![0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_loss_closed_form() {
        let n_eff = arr2(&[[Complex64::new(1.9, 1e-4)], [Complex64::new(1.8, 2e-4)]]);
        let loss = loss_db_per_cm(n_eff.view(), &[1.55, 1.31]).unwrap();
        assert_abs_diff_eq!(loss[[0, 0]], 35.2097, epsilon = 1e-3);
        let expected = 20.0 * E.log10() * (2.0 * PI * 2e-4 / 1.31e-6) * 1e-2;
        assert_abs_diff_eq!(loss[[1, 0]], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_loss_needs_one_wavelength_per_row() {
        let n_eff = arr2(&[[Complex64::new(1.9, 1e-4)], [Complex64::new(1.8, 2e-4)]]);
        assert!(matches!(
            loss_db_per_cm(n_eff.view(), &[1.55]),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_loss_accessor() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        let loss = wg.loss_db_per_cm()?;
        let expected = loss_db_per_cm(wg.n_eff()?.view(), &[1.5, 1.55, 1.6])?;
        assert_eq!(loss, &expected);
        assert!(loss[[0, 1]] > loss[[0, 0]]);
        Ok(())
    }

    #[test]
    fn test_index_and_overlap() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        let index = wg.index()?;
        assert_eq!(index.shape(), &[2, 3]);
        assert_abs_diff_eq!(index[[0, 0]].re, 2.0, epsilon = 1e-12);

        let overlap = wg.overlap(&wg, true)?;
        assert_eq!(overlap.shape(), &[3, 2, 2]);
        assert_abs_diff_eq!(overlap[[1, 0, 0]].re, 3.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_simulation_is_memoized() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (_, wg) = waveguide(strip_config(dir.path()));
        let first: *const RectangularDielectric = wg.simulation()?;
        let second: *const RectangularDielectric = wg.simulation()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = strip_config(dir.path());
        config.num_modes = 0;
        assert!(Waveguide::new(config, Arc::new(FakeSolver::new())).is_err());
    }

    #[test]
    fn test_display_mirrors_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = strip_config(dir.path());
        let expected = config.to_string();
        let (_, wg) = waveguide(config);
        assert_eq!(wg.to_string(), expected);
    }
}
