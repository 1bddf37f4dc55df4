use std::fmt::{self, Display};
use std::str::FromStr;

use ndarray::{s, Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::data::ModeData;
use crate::error::{Error, Result};
use crate::solver::FieldComponent;

/// How a complex field is reduced to real values.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    #[serde(rename = "real")]
    Real,
    #[serde(rename = "imag")]
    Imag,
    #[serde(rename = "abs")]
    Abs,
    #[serde(rename = "phase")]
    Phase,
    /// `20 log10 |f|`, normalized so the maximum is 0.
    #[serde(rename = "dB")]
    Db,
}

impl FieldValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Imag => "imag",
            Self::Abs => "abs",
            Self::Phase => "phase",
            Self::Db => "dB",
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [Self::Real, Self::Imag, Self::Abs, Self::Phase, Self::Db]
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| Error::InvalidFieldValue(s.to_string()))
    }
}

/// A request for one field component of one mode at one wavelength.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FieldQuery {
    pub component: FieldComponent,
    pub value: FieldValue,
    pub mode_index: usize,
    /// Wavelength to select (nearest match); the middle one if `None`.
    pub wavelength: Option<f64>,
}

impl FieldQuery {
    /// Parses a query from the component and value names.
    pub fn new(
        field_name: &str,
        value: &str,
        mode_index: usize,
        wavelength: Option<f64>,
    ) -> Result<Self> {
        Ok(Self {
            component: field_name.parse()?,
            value: value.parse()?,
            mode_index,
            wavelength,
        })
    }
}

/// A real-valued field map on the simulation grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap {
    pub component: FieldComponent,
    pub value: FieldValue,
    pub wavelength: f64,
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    /// Values indexed `[iy, ix]`.
    pub values: Array2<f64>,
}

pub(crate) fn extract_field(
    data: &ModeData,
    query: &FieldQuery,
    wavelength_index: usize,
    wavelength: f64,
) -> FieldMap {
    let field = data
        .fields
        .get(query.component)
        .slice(s![.., .., wavelength_index, query.mode_index]);

    let reduce: fn(&Complex64) -> f64 = match query.value {
        FieldValue::Real => |c| c.re,
        FieldValue::Imag => |c| c.im,
        FieldValue::Abs | FieldValue::Db => |c| c.norm(),
        FieldValue::Phase => |c| c.arg(),
    };
    let mut values = field.map(reduce);
    if query.value == FieldValue::Db {
        values.mapv_inplace(|a| 20.0 * a.log10());
        let max = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() {
            values.mapv_inplace(|v| v - max);
        }
    }

    FieldMap {
        component: query.component,
        value: query.value,
        wavelength,
        x: data.x.clone(),
        y: data.y.clone(),
        values: values.reversed_axes(),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::tests::fake_solution;

    #[test]
    fn test_parse_query() -> Result<()> {
        let query = FieldQuery::new("Ey", "dB", 1, Some(1.55))?;
        assert_eq!(query.component, FieldComponent::Ey);
        assert_eq!(query.value, FieldValue::Db);
        assert!(matches!(
            FieldQuery::new("Ew", "real", 0, None),
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(
            FieldQuery::new("Ex", "db", 0, None),
            Err(Error::InvalidFieldValue(_))
        ));
        Ok(())
    }

    #[test]
    fn test_extract_field() -> Result<()> {
        let mut solution = fake_solution(1, 2, false);
        solution.fields.ex[[2, 1, 0, 0]] = Complex64::new(0.0, 10.0);
        let data = ModeData::from_solution(solution);

        let abs = extract_field(&data, &FieldQuery::new("Ex", "abs", 0, None)?, 0, 1.55);
        assert_eq!(abs.values.shape(), &[2, 3]);
        assert_abs_diff_eq!(abs.values[[1, 2]], 10.0);
        assert_abs_diff_eq!(abs.values[[0, 0]], 1.0);

        let db = extract_field(&data, &FieldQuery::new("Ex", "dB", 0, None)?, 0, 1.55);
        assert_abs_diff_eq!(db.values[[1, 2]], 0.0);
        assert_abs_diff_eq!(db.values[[0, 0]], -20.0, epsilon = 1e-12);

        let phase = extract_field(&data, &FieldQuery::new("Ex", "phase", 0, None)?, 0, 1.55);
        assert_abs_diff_eq!(phase.values[[1, 2]], std::f64::consts::FRAC_PI_2);

        let imag = extract_field(&data, &FieldQuery::new("Ey", "imag", 1, None)?, 0, 1.55);
        assert!(imag.values.iter().all(|v| *v == 0.0));
        Ok(())
    }
}
