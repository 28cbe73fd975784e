//! Artifact path resolution for hierarchical entry names.
//!
//! `"VAE/Loss"` under root `/out` with extension `json` resolves to
//! `/out/VAE/Loss.json`: ancestor segments become directories, the leaf
//! segment becomes the file stem.

use std::path::{Path, PathBuf};

/// Split an entry name into its non-empty slash-separated segments.
pub fn segments(entry: &str) -> impl Iterator<Item = &str> {
    entry.split('/').filter(|s| !s.is_empty())
}

/// Directory holding an entry's artifacts.
pub fn entry_dir(root: &Path, entry: &str) -> PathBuf {
    let parts: Vec<&str> = segments(entry).collect();
    let mut dir = root.to_path_buf();
    if let Some((_, ancestors)) = parts.split_last() {
        for part in ancestors {
            dir.push(part);
        }
    }
    dir
}

/// Full artifact path for `entry` with the handler-chosen extension.
pub fn artifact_path(root: &Path, entry: &str, ext: &str) -> PathBuf {
    let leaf = segments(entry).last().unwrap_or("entry");
    let file_name = if ext.is_empty() {
        leaf.to_string()
    } else {
        format!("{}.{}", leaf, ext.trim_start_matches('.'))
    };
    entry_dir(root, entry).join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entry_resolves_under_root() {
        let p = artifact_path(Path::new("/out"), "VAE/Loss", "json");
        assert_eq!(p, PathBuf::from("/out/VAE/Loss.json"));
    }

    #[test]
    fn test_flat_entry_and_dir() {
        assert_eq!(
            artifact_path(Path::new("out"), "Loss", ".txt"),
            PathBuf::from("out/Loss.txt")
        );
        assert_eq!(entry_dir(Path::new("out"), "Loss"), PathBuf::from("out"));
        assert_eq!(
            entry_dir(Path::new("out"), "a/b/c"),
            PathBuf::from("out/a/b")
        );
    }

    #[test]
    fn test_redundant_slashes_are_ignored() {
        assert_eq!(
            artifact_path(Path::new("/r"), "/A//B/", "png"),
            PathBuf::from("/r/A/B.png")
        );
    }
}
