//! Path fingerprints used as cache keys.
//!
//! Every cached thumbnail is addressed by a `(dir_key, item_key)` pair of
//! 32-bit CRCs over the path string. The same function is used for both
//! keys so a directory key is simply the key of the directory's own path.

use std::path::Path;

/// 32-bit fingerprint of a path string.
///
/// Deterministic and stable across runs: the same path always produces the
/// same key, on every platform with the same path representation.
pub fn item_key(path: &str) -> u32 {
    crc32fast::hash(path.as_bytes())
}

/// Fingerprint of the directory that contains `path`.
///
/// For a path with no parent component the key of the path itself is
/// returned, so scan roots and their keys stay consistent.
pub fn dir_key(path: &str) -> u32 {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            item_key(&parent.to_string_lossy())
        }
        _ => item_key(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = item_key("/photos/holiday/IMG_0001.jpg");
        let b = item_key("/photos/holiday/IMG_0001.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_stable_across_runs() {
        // CRC-32 (IEEE) reference values; these must never change between
        // releases or the on-disk cache becomes unreachable.
        assert_eq!(item_key("hello"), 0x3610a686);
        assert_eq!(item_key(""), 0);
    }

    #[test]
    fn test_distinct_paths_get_distinct_keys() {
        assert_ne!(
            item_key("/photos/a.jpg"),
            item_key("/photos/b.jpg"),
        );
    }

    #[test]
    fn test_dir_key_matches_parent_item_key() {
        assert_eq!(dir_key("/photos/holiday/IMG_0001.jpg"), item_key("/photos/holiday"));
        // Items in the same folder share a directory key
        assert_eq!(
            dir_key("/photos/holiday/a.jpg"),
            dir_key("/photos/holiday/b.png"),
        );
    }

    #[test]
    fn test_dir_key_of_bare_name_falls_back_to_itself() {
        assert_eq!(dir_key("orphan.jpg"), item_key("orphan.jpg"));
    }
}
