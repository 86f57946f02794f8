//! Consumer tally shared across `fork()`.
//!
//! The consumer writes what it saw into anonymous shared memory so the parent
//! can read it back after reaping. Purely observational.

use std::io;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };

/// What the consumer observed
#[repr(C)]
#[derive(Debug, Default)]
pub struct ConsumerTally {
    received: AtomicU64,
    mismatches: AtomicU64,
    /// Expected and received values of the first mismatch
    first_expected: AtomicU64,
    first_received: AtomicU64,
    stopped: AtomicBool,
}

impl ConsumerTally {
    #[inline]
    pub fn record_receive(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mismatch(&self, expected: u64, received: u64) {
        if self.mismatches.load(Ordering::Relaxed) == 0 {
            self.first_expected.store(expected, Ordering::Relaxed);
            self.first_received.store(received, Ordering::Relaxed);
        }
        self.mismatches.fetch_add(1, Ordering::Release);
    }

    pub fn record_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::Acquire)
    }

    /// `(expected, received)` of the first mismatch, if there was one
    pub fn first_mismatch(&self) -> Option<(u64, u64)> {
        (self.mismatches() > 0).then(|| {
            (self.first_expected.load(Ordering::Relaxed), self.first_received.load(Ordering::Relaxed))
        })
    }

    /// Whether the consumer left its loop on the sentinel
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// A [`ConsumerTally`] in `MAP_SHARED | MAP_ANONYMOUS` memory.
pub struct SharedTally {
    ptr: NonNull<ConsumerTally>,
}

// Only atomics live behind the pointer.
unsafe impl Send for SharedTally {}
unsafe impl Sync for SharedTally {}

impl SharedTally {
    const SIZE: usize = std::mem::size_of::<ConsumerTally>();

    pub fn new() -> io::Result<Self> {
        // Safety: anonymous mapping, no fd; the kernel hands back zeroed
        // memory, which is a valid ConsumerTally.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                Self::SIZE,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(ptr as *mut ConsumerTally)
            .map(|ptr| Self { ptr })
            .ok_or_else(|| io::Error::other("mmap returned null"))
    }
}

impl Deref for SharedTally {
    type Target = ConsumerTally;

    fn deref(&self) -> &ConsumerTally {
        unsafe { self.ptr.as_ref() }
    }
}

impl Drop for SharedTally {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, Self::SIZE);
        }
    }
}
