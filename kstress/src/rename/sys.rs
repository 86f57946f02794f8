//! Raw `renameat`/`renameat2` wrappers.
//!
//! Descriptors are taken as raw numbers on purpose: the probes pass invalid
//! and wrong-type descriptors that an owned or borrowed handle cannot express.

use std::ffi::c_uint;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::NixPath;

pub use libc::AT_FDCWD;

pub const RENAME_NOREPLACE: c_uint = libc::RENAME_NOREPLACE as c_uint;
pub const RENAME_EXCHANGE: c_uint = libc::RENAME_EXCHANGE as c_uint;
pub const RENAME_WHITEOUT: c_uint = libc::RENAME_WHITEOUT as c_uint;

pub fn renameat<P1, P2>(old_dirfd: RawFd, old: &P1, new_dirfd: RawFd, new: &P2) -> nix::Result<()>
    where P1: ?Sized + NixPath, P2: ?Sized + NixPath
{
    let ret = old.with_nix_path(|old| {
        new.with_nix_path(|new| unsafe {
            libc::renameat(old_dirfd, old.as_ptr(), new_dirfd, new.as_ptr())
        })
    })??;
    Errno::result(ret).map(drop)
}

pub fn renameat2<P1, P2>(
    old_dirfd: RawFd,
    old: &P1,
    new_dirfd: RawFd,
    new: &P2,
    flags: c_uint
) -> nix::Result<()>
    where P1: ?Sized + NixPath, P2: ?Sized + NixPath
{
    let ret = old.with_nix_path(|old| {
        new.with_nix_path(|new| unsafe {
            libc::renameat2(old_dirfd, old.as_ptr(), new_dirfd, new.as_ptr(), flags)
        })
    })??;
    Errno::result(ret).map(drop)
}
