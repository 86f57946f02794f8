//! Negative-test probes for `renameat` and `renameat2`.
//!
//! Each probe issues a rename the kernel must reject. Names are relative to
//! the work directory `base`; the source is resolved against a directory
//! descriptor and the target against `AT_FDCWD` through its absolute path,
//! so a bogus source descriptor can never be silently ignored.

use std::fs::File;
use std::os::fd::{ AsRawFd, RawFd };
use std::path::Path;

use crate::args::StressArgs;
use crate::insights::record_probe;
use crate::rename::sys::{ self, AT_FDCWD, RENAME_EXCHANGE, RENAME_NOREPLACE, RENAME_WHITEOUT };

/// Tally of one probe battery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Probes the kernel accepted although it should have rejected them
    pub unexpected: u32,
    /// The battery stopped early
    pub aborted: bool,
}

impl ProbeReport {
    /// Returns `true` if the probe unexpectedly succeeded.
    fn expect_rejected(&mut self, args: &StressArgs, probe: &'static str, result: nix::Result<()>) -> bool {
        let rejected = result.is_err();
        record_probe(probe, rejected);
        if !rejected {
            self.unexpected += 1;
            args.report_failure(format_args!("{} unexpectedly succeeded", probe));
        }
        !rejected
    }

    /// For probes that move the file if accepted: on unexpected success swap
    /// `names` so later probes address the file where it now lives.
    fn expect_rejected_or_swap<'p>(
        &mut self,
        args: &StressArgs,
        probe: &'static str,
        result: nix::Result<()>,
        names: &mut (&'p Path, &'p Path)
    ) {
        if self.expect_rejected(args, probe, result) {
            std::mem::swap(&mut names.0, &mut names.1);
        }
    }
}

/// `renameat` with a bad descriptor and with a regular-file descriptor.
pub fn exercise_renameat(
    args: &StressArgs,
    base: &Path,
    old: &Path,
    new: &Path,
    bad_fd: RawFd
) -> ProbeReport {
    let mut report = ProbeReport::default();
    let new_abs = base.join(new);

    report.expect_rejected(
        args,
        "renameat on a bad file descriptor",
        sys::renameat(bad_fd, old, AT_FDCWD, new_abs.as_path())
    );

    if let Ok(file) = File::open(base.join(old)) {
        report.expect_rejected(
            args,
            "renameat on a file descriptor rather than a directory descriptor",
            sys::renameat(file.as_raw_fd(), old, AT_FDCWD, new_abs.as_path())
        );
    }

    report
}

/// Illegal flag and descriptor combinations for `renameat2`.
///
/// `dirfd` must refer to `base`. If a probe that would move the file does
/// succeed, the battery's own view of old/new is swapped so later probes
/// still address the file where it now lives; the caller's names are left
/// untouched.
pub fn exercise_renameat2(
    args: &StressArgs,
    base: &Path,
    dirfd: RawFd,
    old: &Path,
    new: &Path,
    bad_fd: RawFd
) -> ProbeReport {
    let mut report = ProbeReport::default();
    let mut names = (old, new);
    let rename2 = |from: &Path, to: &Path, flags| {
        sys::renameat2(dirfd, from, AT_FDCWD, base.join(to).as_path(), flags)
    };

    let illegal_flags = [
        ("renameat2 with invalid flags", !0),
        ("renameat2 with RENAME_EXCHANGE | RENAME_NOREPLACE", RENAME_EXCHANGE | RENAME_NOREPLACE),
        ("renameat2 with RENAME_EXCHANGE | RENAME_WHITEOUT", RENAME_EXCHANGE | RENAME_WHITEOUT),
        ("renameat2 RENAME_EXCHANGE on a non-existent target", RENAME_EXCHANGE),
    ];
    for (probe, flags) in illegal_flags {
        let result = rename2(names.0, names.1, flags);
        report.expect_rejected_or_swap(args, probe, result, &mut names);
    }

    // Exchanging a file with itself is assumed to be a no-op; coverage only.
    let _ = sys::renameat2(dirfd, names.0, dirfd, names.0, RENAME_EXCHANGE);

    // A file always exists at its own name.
    if report.expect_rejected(
        args,
        "renameat2 RENAME_NOREPLACE on an existing file",
        sys::renameat2(dirfd, names.0, dirfd, names.0, RENAME_NOREPLACE)
    ) {
        report.aborted = true;
        return report;
    }

    let result = sys::renameat2(bad_fd, names.0, AT_FDCWD, base.join(names.1).as_path(), RENAME_NOREPLACE);
    report.expect_rejected_or_swap(args, "renameat2 on a bad file descriptor", result, &mut names);

    let (old, new) = names;
    if let Ok(file) = File::open(base.join(old)) {
        report.expect_rejected(
            args,
            "renameat2 on a file descriptor rather than a directory descriptor",
            sys::renameat2(file.as_raw_fd(), old, AT_FDCWD, base.join(new).as_path(), RENAME_NOREPLACE)
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::RunControl;
    use crate::fd::bad_descriptor;
    use std::fs;
    use std::path::PathBuf;

    fn scratch() -> (tempfile::TempDir, File) {
        let dir = tempfile::tempdir().unwrap();
        fs::File::create(dir.path().join("old")).unwrap();
        let dirfd = File::open(dir.path()).unwrap();
        (dir, dirfd)
    }

    #[test]
    fn test_renameat_probes_are_rejected() {
        let (dir, _dirfd) = scratch();
        let args = StressArgs::new("rename", RunControl::new());

        let report = exercise_renameat(
            &args,
            dir.path(),
            &PathBuf::from("old"),
            &PathBuf::from("new"),
            bad_descriptor()
        );

        assert_eq!(report, ProbeReport::default());
        assert_eq!(args.snapshot().failures, 0);
        assert!(dir.path().join("old").exists());
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn test_renameat2_probes_are_rejected() {
        let (dir, dirfd) = scratch();
        let args = StressArgs::new("rename", RunControl::new());

        let report = exercise_renameat2(
            &args,
            dir.path(),
            dirfd.as_raw_fd(),
            &PathBuf::from("old"),
            &PathBuf::from("new"),
            bad_descriptor()
        );

        assert_eq!(report.unexpected, 0);
        assert!(!report.aborted);
        assert_eq!(args.snapshot().failures, 0);
        // the self-exchange must leave the file where it was
        assert!(dir.path().join("old").exists());
        assert!(!dir.path().join("new").exists());
    }

    #[test]
    fn test_unexpected_success_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::File::create(dir.path().join("old")).unwrap();
        let args = StressArgs::new("rename", RunControl::new());
        let mut report = ProbeReport::default();

        let succeeded = report.expect_rejected(&args, "always succeeds", Ok(()));
        assert!(succeeded);
        assert!(!report.expect_rejected(&args, "always fails", Err(nix::errno::Errno::EINVAL)));
        assert_eq!(report.unexpected, 1);
        assert_eq!(args.snapshot().failures, 1);
    }

    #[test]
    fn test_unexpected_move_swaps_names() {
        let args = StressArgs::new("rename", RunControl::new());
        let (old, new) = (PathBuf::from("old"), PathBuf::from("new"));
        let mut report = ProbeReport::default();
        let mut names = (old.as_path(), new.as_path());

        report.expect_rejected_or_swap(&args, "rejected", Err(nix::errno::Errno::EINVAL), &mut names);
        assert_eq!(names, (old.as_path(), new.as_path()));

        report.expect_rejected_or_swap(&args, "renameat2 RENAME_EXCHANGE on a non-existent target", Ok(()), &mut names);
        assert_eq!(names, (new.as_path(), old.as_path()));
        assert_eq!(report.unexpected, 1);
        assert_eq!(args.snapshot().failures, 1);
    }
}
