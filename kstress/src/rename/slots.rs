//! Rotating pair of candidate names.

use std::fs;
use std::path::{ Path, PathBuf };

/// Two name slots: one names the live file, the other the next name to use.
///
/// A successful rename is a single [`rotate`](SlotPair::rotate): the slot
/// that was "next" becomes "current".
#[derive(Debug, Clone)]
pub struct SlotPair {
    slots: [PathBuf; 2],
    current: usize,
}

impl SlotPair {
    pub fn new(first: PathBuf) -> Self {
        Self {
            slots: [first, PathBuf::new()],
            current: 0,
        }
    }

    /// Name of the live file
    pub fn current(&self) -> &Path {
        &self.slots[self.current]
    }

    /// Name the next rename will move the file to
    pub fn next(&self) -> &Path {
        &self.slots[self.current ^ 1]
    }

    pub fn set_next(&mut self, name: PathBuf) {
        self.slots[self.current ^ 1] = name;
    }

    pub fn rotate(&mut self) {
        self.current ^= 1;
    }

    /// Unlink whatever exists at either slot, resolved against `base`.
    pub fn unlink_all(&self, base: &Path) {
        for slot in self.slots.iter().filter(|s| !s.as_os_str().is_empty()) {
            let _ = fs::remove_file(base.join(slot));
        }
    }

    /// How many of the two slots name an existing file
    pub fn existing(&self, base: &Path) -> usize {
        self.slots
            .iter()
            .filter(|s| !s.as_os_str().is_empty())
            .filter(|s| base.join(s).exists())
            .count()
    }
}
