use std::path::{Path, PathBuf};

/// Cache file for mode data of type `type_name` with cache key `key`.
pub fn out_modes(cache_dir: impl AsRef<Path>, type_name: &str, key: &str) -> PathBuf {
    PathBuf::from(cache_dir.as_ref()).join(format!("{type_name}_{key}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_modes() {
        let path = out_modes("/tmp/modes", "Waveguide", "0123456789abcdef");
        assert_eq!(
            path,
            PathBuf::from("/tmp/modes/Waveguide_0123456789abcdef.bin")
        );
    }
}
