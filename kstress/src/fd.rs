//! Descriptors for negative testing.

use std::os::fd::RawFd;

use nix::sys::resource::{ getrlimit, Resource };

/// A descriptor number that cannot refer to an open file.
///
/// Descriptors are always below the `RLIMIT_NOFILE` soft limit, so the limit
/// itself is never valid. Falls back to `-1` if the limit is unavailable or
/// does not fit a descriptor.
pub fn bad_descriptor() -> RawFd {
    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((soft, _)) => RawFd::try_from(soft).unwrap_or(-1),
        Err(_) => -1,
    }
}
