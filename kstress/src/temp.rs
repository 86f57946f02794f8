//! Temp path naming and directory provisioning.
//!
//! Names embed the stressor name, owner pid, instance and a sequence number,
//! so concurrently running instances never collide.

use std::fs::{ self, DirBuilder };
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{ Path, PathBuf };

use nix::unistd::Pid;
use tracing::debug;

use crate::constants::TEMP_DIR_MODE;

/// Deterministic, collision-free path generator rooted at a base directory.
#[derive(Debug, Clone)]
pub struct TempPaths {
    base: PathBuf,
}

impl TempPaths {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self { base: base.as_ref().to_path_buf() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory name relative to the base
    pub fn dir_name(&self, name: &str, owner: Pid, instance: u32) -> PathBuf {
        PathBuf::from(format!("tmp-{}-{}-{}", name, owner, instance))
    }

    /// File name relative to the base, inside `dir_name(name, owner, instance)`
    pub fn file_name(&self, name: &str, owner: Pid, instance: u32, seq: u64) -> PathBuf {
        self.dir_name(name, owner, instance).join(format!("tmp-{}-{}-{}-{:08x}", name, owner, instance, seq))
    }

    /// Resolve a base-relative path
    pub fn resolve<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.base.join(relative)
    }

    /// Create the instance directory; fails if it already exists
    pub fn dir_mk(&self, name: &str, owner: Pid, instance: u32) -> io::Result<PathBuf> {
        let dir = self.resolve(self.dir_name(name, owner, instance));
        DirBuilder::new().mode(TEMP_DIR_MODE).create(&dir)?;
        Ok(dir)
    }

    pub fn dir_rm(&self, name: &str, owner: Pid, instance: u32) -> io::Result<()> {
        fs::remove_dir(self.resolve(self.dir_name(name, owner, instance)))
    }
}

impl Default for TempPaths {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Two sibling instance directories created and removed together.
pub struct TempDirPair {
    paths: TempPaths,
    name: &'static str,
    owner: Pid,
    instances: [u32; 2],
    live: [bool; 2],
}

impl TempDirPair {
    /// Create both directories, rolling back the first if the second fails
    pub fn acquire(
        paths: &TempPaths,
        name: &'static str,
        owner: Pid,
        instances: [u32; 2]
    ) -> io::Result<Self> {
        let mut pair = Self {
            paths: paths.clone(),
            name,
            owner,
            instances,
            live: [false; 2],
        };
        for (idx, instance) in instances.into_iter().enumerate() {
            // on error the drop below removes whatever was created
            let dir = pair.paths.dir_mk(name, owner, instance)?;
            pair.live[idx] = true;
            debug!(dir = %dir.display(), "temp directory created");
        }
        Ok(pair)
    }

    pub fn instances(&self) -> [u32; 2] {
        self.instances
    }

    /// Remove both directories. Safe to call more than once.
    pub fn release(&mut self) -> io::Result<()> {
        let mut first_err = None;
        for idx in 0..2 {
            if !self.live[idx] {
                continue;
            }
            self.live[idx] = false;
            if let Err(err) = self.paths.dir_rm(self.name, self.owner, self.instances[idx]) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for TempDirPair {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique_per_instance_and_sequence() {
        let paths = TempPaths::new("/tmp/base");
        let owner = Pid::from_raw(42);

        assert_eq!(paths.dir_name("rename", owner, 3), PathBuf::from("tmp-rename-42-3"));
        let a = paths.file_name("rename", owner, 0, 1);
        let b = paths.file_name("rename", owner, 0, 2);
        let c = paths.file_name("rename", owner, 1, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("tmp-rename-42-0"));
        assert_eq!(paths.resolve(&a), PathBuf::from("/tmp/base").join(&a));
    }

    #[test]
    fn test_dir_pair_lifecycle() {
        let scratch = tempfile::tempdir().unwrap();
        let paths = TempPaths::new(scratch.path());
        let owner = Pid::this();

        let mut pair = TempDirPair::acquire(&paths, "pair", owner, [0, 1]).unwrap();
        assert!(paths.resolve(paths.dir_name("pair", owner, 0)).is_dir());
        assert!(paths.resolve(paths.dir_name("pair", owner, 1)).is_dir());

        pair.release().unwrap();
        pair.release().unwrap();
        assert!(!paths.resolve(paths.dir_name("pair", owner, 0)).exists());
        assert!(!paths.resolve(paths.dir_name("pair", owner, 1)).exists());
    }

    #[test]
    fn test_dir_pair_is_exclusive_and_rolls_back() {
        let scratch = tempfile::tempdir().unwrap();
        let paths = TempPaths::new(scratch.path());
        let owner = Pid::this();

        // Second directory already exists, so acquire must fail and undo the first
        paths.dir_mk("busy", owner, 1).unwrap();
        let err = TempDirPair::acquire(&paths, "busy", owner, [0, 1]).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(!paths.resolve(paths.dir_name("busy", owner, 0)).exists());

        paths.dir_rm("busy", owner, 1).unwrap();
    }
}
