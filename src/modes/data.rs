use std::path::Path;

use ndarray::{Array1, Array2, Array4, ArrayD, Axis, Dimension};
use num_complex::Complex64;

use crate::cache::{ArchiveArray, ModeArchive};
use crate::error::{Error, Result};
use crate::solver::{FieldComponent, FieldComponents, ModeSolution, SolutionShape};

/// Computed mode data, as stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeData {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub fields: FieldComponents,
    pub n_eff: Array2<Complex64>,
    pub mode_area: Array2<f64>,
    pub n_group: Option<Array2<f64>>,
    pub fraction_te: Array1<f64>,
    pub fraction_tm: Array1<f64>,
    /// Relative permittivity, `[nx, ny]`.
    pub eps: Array2<Complex64>,
}

impl ModeData {
    pub fn from_solution(solution: ModeSolution) -> Self {
        let (fraction_te, fraction_tm) = polarization_fractions(&solution.fields);
        Self {
            x: solution.x,
            y: solution.y,
            fields: solution.fields,
            n_eff: solution.n_complex,
            mode_area: solution.mode_area,
            n_group: solution.n_group,
            fraction_te,
            fraction_tm,
            eps: solution.permittivity,
        }
    }

    pub fn num_modes(&self) -> usize {
        self.n_eff.ncols()
    }

    pub fn to_archive(&self) -> ModeArchive {
        let mut archive = ModeArchive::new();
        for component in FieldComponent::ALL {
            archive.insert(
                component.as_str(),
                ArchiveArray::Complex(self.fields.get(component).clone().into_dyn()),
            );
        }
        archive.insert("x", ArchiveArray::Real(self.x.clone().into_dyn()));
        archive.insert("y", ArchiveArray::Real(self.y.clone().into_dyn()));
        archive.insert("n_eff", ArchiveArray::Complex(self.n_eff.clone().into_dyn()));
        archive.insert("mode_area", ArchiveArray::Real(self.mode_area.clone().into_dyn()));
        if let Some(n_group) = &self.n_group {
            archive.insert("n_group", ArchiveArray::Real(n_group.clone().into_dyn()));
        }
        archive.insert(
            "fraction_te",
            ArchiveArray::Real(self.fraction_te.clone().into_dyn()),
        );
        archive.insert(
            "fraction_tm",
            ArchiveArray::Real(self.fraction_tm.clone().into_dyn()),
        );
        archive.insert("eps", ArchiveArray::Complex(self.eps.clone().into_dyn()));
        archive
    }

    /// Rebuilds mode data from an archive loaded from `path`.
    ///
    /// Every array except `n_group` is required.
    pub fn from_archive(mut archive: ModeArchive, path: &Path) -> Result<Self> {
        let mut reader = ArchiveReader {
            archive: &mut archive,
            path,
        };
        let fields = FieldComponents {
            ex: reader.complex("Ex")?,
            ey: reader.complex("Ey")?,
            ez: reader.complex("Ez")?,
            hx: reader.complex("Hx")?,
            hy: reader.complex("Hy")?,
            hz: reader.complex("Hz")?,
        };
        let n_group = if reader.archive.get("n_group").is_some() {
            Some(reader.real("n_group")?)
        } else {
            None
        };
        Ok(Self {
            x: reader.real("x")?,
            y: reader.real("y")?,
            fields,
            n_eff: reader.complex("n_eff")?,
            mode_area: reader.real("mode_area")?,
            n_group,
            fraction_te: reader.real("fraction_te")?,
            fraction_tm: reader.real("fraction_tm")?,
            eps: reader.complex("eps")?,
        })
    }
}

impl ModeData {
    /// Checks data loaded from `path` against the shape its configuration implies.
    pub fn check(&self, expected: SolutionShape, path: &Path) -> Result<()> {
        let mismatch = expected
            .mismatch(
                (self.x.len(), self.y.len()),
                &self.fields,
                &[
                    ("n_eff", self.n_eff.shape()),
                    ("mode_area", self.mode_area.shape()),
                ],
                self.n_group.as_ref().map(|n_group| n_group.shape()),
                ("eps", self.eps.shape()),
            )
            .or_else(|| {
                [("fraction_te", &self.fraction_te), ("fraction_tm", &self.fraction_tm)]
                    .into_iter()
                    .find(|(_, fraction)| fraction.len() != expected.num_modes)
                    .map(|(name, fraction)| {
                        format!(
                            "`{name}` has {} entries, expected {}",
                            fraction.len(),
                            expected.num_modes
                        )
                    })
            });
        match mismatch {
            Some(reason) => Err(Error::CorruptCache {
                path: path.to_owned(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

struct ArchiveReader<'a> {
    archive: &'a mut ModeArchive,
    path: &'a Path,
}

impl<'a> ArchiveReader<'a> {
    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptCache {
            path: self.path.to_owned(),
            reason,
        }
    }

    fn take(&mut self, name: &str) -> Result<ArchiveArray> {
        self.archive
            .remove(name)
            .ok_or_else(|| self.corrupt(format!("missing array `{name}`")))
    }

    fn shaped<T, D: Dimension>(&self, name: &str, array: ArrayD<T>) -> Result<ndarray::Array<T, D>> {
        array
            .into_dimensionality::<D>()
            .map_err(|e| self.corrupt(format!("array `{name}` has the wrong shape: {e}")))
    }

    fn real<D: Dimension>(&mut self, name: &str) -> Result<ndarray::Array<f64, D>> {
        match self.take(name)? {
            ArchiveArray::Real(array) => self.shaped(name, array),
            ArchiveArray::Complex(_) => Err(self.corrupt(format!("array `{name}` should be real"))),
        }
    }

    fn complex<D: Dimension>(&mut self, name: &str) -> Result<ndarray::Array<Complex64, D>> {
        match self.take(name)? {
            ArchiveArray::Complex(array) => self.shaped(name, array),
            ArchiveArray::Real(_) => Err(self.corrupt(format!("array `{name}` should be complex"))),
        }
    }
}

/// TE and TM fractions of each mode, summed over the grid and all wavelengths.
pub fn polarization_fractions(fields: &FieldComponents) -> (Array1<f64>, Array1<f64>) {
    let energy = |field: &Array4<Complex64>, mode: usize| -> f64 {
        field
            .index_axis(Axis(3), mode)
            .iter()
            .map(|e| e.norm_sqr())
            .sum()
    };

    let num_modes = fields.ex.len_of(Axis(3));
    let mut te = Array1::zeros(num_modes);
    let mut tm = Array1::zeros(num_modes);
    for mode in 0..num_modes {
        let a_te = energy(&fields.ex, mode);
        let a_tm = energy(&fields.ey, mode);
        te[mode] = a_te / (a_te + a_tm);
        tm[mode] = a_tm / (a_te + a_tm);
    }
    (te, tm)
}
