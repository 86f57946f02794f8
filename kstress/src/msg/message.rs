//! Message framing: a type tag plus a fixed 8-byte payload.

use std::ffi::c_long;

use crate::constants::{ MSG_PAYLOAD_SIZE, MSG_STOP, MSG_TYPE };

/// Decoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Sequence(u64),
    Stop,
}

/// Wire layout expected by `msgsnd`/`msgrcv`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Message {
    mtype: c_long,
    payload: [u8; MSG_PAYLOAD_SIZE],
}

impl Message {
    /// Normal traffic: the sequence counter in native byte order
    pub fn sequence(value: u64) -> Self {
        Self {
            mtype: MSG_TYPE,
            payload: value.to_ne_bytes(),
        }
    }

    /// Termination sentinel
    pub fn stop() -> Self {
        Self {
            mtype: MSG_TYPE,
            payload: MSG_STOP,
        }
    }

    /// Receive buffer
    pub fn empty() -> Self {
        Self {
            mtype: 0,
            payload: [0; MSG_PAYLOAD_SIZE],
        }
    }

    pub fn mtype(&self) -> c_long {
        self.mtype
    }

    pub fn payload(&self) -> &[u8; MSG_PAYLOAD_SIZE] {
        &self.payload
    }

    #[inline]
    pub fn is_stop(&self) -> bool {
        self.payload == MSG_STOP
    }

    /// The sentinel is checked by text before any counter interpretation.
    #[inline]
    pub fn decode(&self) -> Payload {
        if self.is_stop() {
            Payload::Stop
        } else {
            Payload::Sequence(u64::from_ne_bytes(self.payload))
        }
    }
}
