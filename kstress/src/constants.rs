//! kstress constants
//!
//! Framing and cadence constants shared by the stressors.

use std::ffi::c_long;

/// Size of a message queue payload
pub const MSG_PAYLOAD_SIZE: usize = 8;

/// Type tag carried by every message (single producer, single consumer)
pub const MSG_TYPE: c_long = 1;

/// Termination sentinel, NUL padded to the payload size
pub const MSG_STOP: [u8; MSG_PAYLOAD_SIZE] = *b"STOPMSG\0";

/// Query queue statistics when `seq & MSG_STATS_MASK == 0`
pub const MSG_STATS_MASK: u64 = 0x1f;

/// Yield the scheduler when `seq & MSG_YIELD_MASK == 0`
pub const MSG_YIELD_MASK: u64 = 0xff;

/// Permission bits of a freshly created message queue
pub const MSGQ_MODE: i32 = 0o600;

/// Permission bits of stressor temp directories
pub const TEMP_DIR_MODE: u32 = 0o700;
