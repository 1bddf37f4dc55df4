//! Cache-key derivation.
//!
//! Every setting that can change a solver result implements [`SettingValue`].
//! A type without an implementation cannot be registered as a setting, so
//! serialization never fails at request time.

use std::path::PathBuf;

use itertools::Itertools;
use log::debug;
use sha2::{Digest, Sha256};

/// Number of hex characters in a cache key.
pub const CACHE_KEY_LEN: usize = 16;

/// Token used for unset optional settings.
pub const NONE_TOKEN: &str = "None";

pub trait SettingValue {
    /// Stable textual form of this value.
    ///
    /// Semantically equal values must serialize identically.
    fn serialize_setting(&self) -> String;
}

/// Shortest round-trip representation, with `-0.0` folded into `0`.
pub fn format_float(x: f64) -> String {
    if x == 0.0 {
        "0".to_string()
    } else {
        format!("{x}")
    }
}

impl SettingValue for f64 {
    fn serialize_setting(&self) -> String {
        format_float(*self)
    }
}

impl SettingValue for usize {
    fn serialize_setting(&self) -> String {
        self.to_string()
    }
}

impl SettingValue for bool {
    fn serialize_setting(&self) -> String {
        self.to_string()
    }
}

impl SettingValue for [f64] {
    fn serialize_setting(&self) -> String {
        format!("[{}]", self.iter().map(|x| format_float(*x)).join(", "))
    }
}

impl SettingValue for PathBuf {
    fn serialize_setting(&self) -> String {
        format!("{:?}", self.to_string_lossy())
    }
}

impl<T: SettingValue> SettingValue for Option<T> {
    fn serialize_setting(&self) -> String {
        match self {
            Some(value) => value.serialize_setting(),
            None => NONE_TOKEN.to_string(),
        }
    }
}

/// Derives a cache key from `(name, serialized value)` pairs.
///
/// Pairs are sorted by name, joined as `name=value` with `_`, hashed with
/// SHA-256 and truncated to [`CACHE_KEY_LEN`] hex characters.
pub fn cache_key<S: AsRef<str>>(settings: &[(S, String)]) -> String {
    let named_args = settings
        .iter()
        .sorted_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()))
        .map(|(name, value)| format!("{}={}", name.as_ref(), value))
        .join("_");
    debug!("deriving cache key from `{named_args}`");
    let digest = Sha256::digest(named_args.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(CACHE_KEY_LEN);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let a = [("b", "1".to_string()), ("a", "2".to_string())];
        let b = [("a", "2".to_string()), ("b", "1".to_string())];
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_key_shape() {
        let key = cache_key(&[("core_width", "0.5".to_string())]);
        assert_eq!(key.len(), CACHE_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(1.55), "1.55");
        assert_eq!(format_float(2.0), "2");
        assert_eq!(vec![1.5, 1.55].as_slice().serialize_setting(), "[1.5, 1.55]");
    }

    #[test]
    fn test_none_is_distinct() {
        let none: Option<f64> = None;
        assert_eq!(none.serialize_setting(), NONE_TOKEN);
        assert_ne!(Some(0.0).serialize_setting(), NONE_TOKEN);
    }
}
