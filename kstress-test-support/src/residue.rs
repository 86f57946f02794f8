//! Checks for what a stressor left behind.

use std::fs;
use std::io;
use std::path::{ Path, PathBuf };

/// Every entry below `base`, depth first.
pub fn leftover_entries(base: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![base.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path.clone());
            }
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

/// Panics with the offending paths if anything is left under `base`.
pub fn assert_clean(base: &Path) {
    let leftovers = leftover_entries(base).unwrap_or_else(|err| {
        panic!("cannot scan {}: {}", base.display(), err)
    });
    assert!(leftovers.is_empty(), "residue under {}: {:?}", base.display(), leftovers);
}
