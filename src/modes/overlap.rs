use ndarray::{Array1, Array3};
use num_complex::Complex64;

use super::data::ModeData;
use crate::error::{Error, Result};

/// Widths of the cells centred on `coords`.
///
/// Cell boundaries are the midpoints between neighbouring coordinates; the
/// outer cells extend half a spacing past the first and last points.
pub fn cell_sizes(coords: &Array1<f64>) -> Array1<f64> {
    let n = coords.len();
    if n < 2 {
        return Array1::ones(n);
    }
    let mut bounds = Vec::with_capacity(n + 1);
    bounds.push(coords[0] - (coords[1] - coords[0]) / 2.0);
    bounds.extend(coords.windows(2).into_iter().map(|w| (w[0] + w[1]) / 2.0));
    bounds.push(coords[n - 1] + (coords[n - 1] - coords[n - 2]) / 2.0);
    Array1::from_shape_fn(n, |i| bounds[i + 1] - bounds[i])
}

/// Overlap integrals `0.25 ∫ (E_a × H_b − H_a × E_b) · ẑ dA` between every
/// pair of modes of `a` and `b`, shaped `[n_wavelengths, modes_a, modes_b]`.
///
/// With `conjugate`, the fields of `a` are conjugated.
pub fn mode_overlap(a: &ModeData, b: &ModeData, conjugate: bool) -> Result<Array3<Complex64>> {
    if a.x != b.x || a.y != b.y {
        return Err(Error::GridMismatch(format!(
            "{}x{} grid vs {}x{} grid",
            a.x.len(),
            a.y.len(),
            b.x.len(),
            b.y.len()
        )));
    }
    let (nx, ny, n_wl, modes_a) = a.fields.ex.dim();
    let (_, _, n_wl_b, modes_b) = b.fields.ex.dim();
    if n_wl != n_wl_b {
        return Err(Error::GridMismatch(format!(
            "{n_wl} wavelengths vs {n_wl_b} wavelengths"
        )));
    }

    let dx = cell_sizes(&a.x);
    let dy = cell_sizes(&a.y);
    let maybe_conj = |c: Complex64| if conjugate { c.conj() } else { c };
    let (fa, fb) = (&a.fields, &b.fields);

    let mut out = Array3::zeros((n_wl, modes_a, modes_b));
    for ((w, i, j), value) in out.indexed_iter_mut() {
        let mut sum = Complex64::default();
        for ix in 0..nx {
            for iy in 0..ny {
                let ia = [ix, iy, w, i];
                let ib = [ix, iy, w, j];
                let (ex_a, ey_a) = (maybe_conj(fa.ex[ia]), maybe_conj(fa.ey[ia]));
                let (hx_a, hy_a) = (maybe_conj(fa.hx[ia]), maybe_conj(fa.hy[ia]));
                let e_cross_h = ex_a * fb.hy[ib] - ey_a * fb.hx[ib];
                let h_cross_e = hx_a * fb.ey[ib] - hy_a * fb.ex[ib];
                sum += (e_cross_h - h_cross_e) * (dx[ix] * dy[iy]);
            }
        }
        *value = sum * 0.25;
    }
    Ok(out)
}
