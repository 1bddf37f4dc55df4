//! Parameter sweeps given as `name=value[,value...]` strings.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use itertools::Itertools;

use crate::error::{Error, Result};

/// Maximum length of a sweep point's [`save_name`].
pub const MAX_SAVE_NAME_LEN: usize = 96;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(i) => usize::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

/// Parses a number: a float if it contains `.`, an integer otherwise.
fn parse_number(s: &str) -> Option<ParamValue> {
    let s = s.trim();
    if s.contains('.') {
        s.parse().ok().map(ParamValue::Float)
    } else {
        s.parse().ok().map(ParamValue::Int)
    }
}

/// Parses a parameter value.
///
/// A value containing `,` becomes a list of numbers, or a list of trimmed
/// strings if any element is not a number. Other values become a number or,
/// failing that, a trimmed string.
pub fn parse_param(value: &str) -> ParamValue {
    if value.contains(',') {
        let items = value.split(',');
        match items.clone().map(parse_number).collect::<Option<Vec<_>>>() {
            Some(numbers) => ParamValue::List(numbers),
            None => ParamValue::List(
                items
                    .map(|item| ParamValue::Str(item.trim().to_string()))
                    .collect(),
            ),
        }
    } else {
        parse_number(value).unwrap_or_else(|| ParamValue::Str(value.trim().to_string()))
    }
}

/// Parses `name=value`.
pub fn parse_assignment(assignment: &str) -> Result<(String, ParamValue)> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| Error::Sweep(format!("expected `name=value`, got `{assignment}`")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Sweep(format!(
            "missing parameter name in `{assignment}`"
        )));
    }
    Ok((name.to_string(), parse_param(value)))
}

pub fn parse_assignments<S: AsRef<str>>(
    assignments: &[S],
) -> Result<BTreeMap<String, ParamValue>> {
    assignments
        .iter()
        .map(|a| parse_assignment(a.as_ref()))
        .collect()
}

/// Expands list-valued parameters into sweep points.
///
/// Lists are swept in lock-step and must all have the same length. Scalar
/// parameters are applied to every point. Without lists there is one point.
pub fn expand_sweep(params: &BTreeMap<String, ParamValue>) -> Result<Vec<BTreeMap<String, ParamValue>>> {
    let lengths = params
        .values()
        .filter_map(|v| match v {
            ParamValue::List(items) => Some(items.len()),
            _ => None,
        })
        .unique()
        .collect::<Vec<_>>();
    let sweep_len = match lengths.as_slice() {
        [] => 1,
        [len] => *len,
        _ => {
            return Err(Error::Sweep(
                "all array parameters must have the same length".to_string(),
            ))
        }
    };

    Ok((0..sweep_len)
        .map(|i| {
            params
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        ParamValue::List(items) => items[i].clone(),
                        v => v.clone(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .collect())
}

/// Name for one sweep point: `prefix_nam=value_...`, truncated to
/// [`MAX_SAVE_NAME_LEN`] characters.
pub fn save_name(prefix: &str, point: &BTreeMap<String, ParamValue>) -> String {
    let mut name = std::iter::once(prefix.to_string())
        .chain(
            point
                .iter()
                .map(|(k, v)| format!("{}={}", k.chars().take(3).collect::<String>(), v)),
        )
        .join("_");
    if let Some((idx, _)) = name.char_indices().nth(MAX_SAVE_NAME_LEN) {
        name.truncate(idx);
    }
    name
}
