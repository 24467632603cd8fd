// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Error taxonomy for the whole crate.
//!
//! Every failure maps onto one of a small set of variants; errors bubble to
//! the API boundary unchanged and are never retried or logged away inside the
//! library. For the C boundary, each error packs into a negative 32-bit code
//! `-(res | (mod << 28))` where `mod` classifies the source domain.

use nix::errno::Errno;
use thiserror::Error;

/// Source-domain tag stored in bits 28..30 of a packed return code.
const MOD_SYSTEM: u32 = 0;
const MOD_RM: u32 = 1;
const MOD_ENGINE: u32 = 2;

const RES_MASK: u32 = (1 << 29) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Null handle, bad alignment, unrecognised flag combination, zero size.
    #[error("invalid argument")]
    InvalidArgument,
    /// No backend probed, or the feature is missing on this platform.
    #[error("not implemented on this platform")]
    NotImplemented,
    /// Kernel allocation failure, or a command-buffer window ran out.
    #[error("out of memory")]
    OutOfMemory,
    /// Internal invariant violated (ring overrun, unreachable pin target).
    #[error("invariant violated")]
    Fault,
    /// A fence did not signal within the caller's budget.
    #[error("timed out")]
    Timeout,
    /// Raw errno from an ioctl, preserved verbatim.
    #[error("kernel error: {0}")]
    Kernel(Errno),
    /// Non-zero status word from the resource-manager driver.
    #[error("resource manager status {0:#x}")]
    RmStatus(u32),
    /// Failure reported by engine microcode.
    #[error("engine status {0:#x}")]
    Engine(u32),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Packs this error into the C-boundary return code.
    pub fn code(self) -> i32 {
        let (res, module) = match self {
            Error::InvalidArgument => (Errno::EINVAL as u32, MOD_SYSTEM),
            Error::NotImplemented => (Errno::ENOSYS as u32, MOD_SYSTEM),
            Error::OutOfMemory => (Errno::ENOMEM as u32, MOD_SYSTEM),
            Error::Fault => (Errno::EFAULT as u32, MOD_SYSTEM),
            Error::Timeout => (Errno::ETIMEDOUT as u32, MOD_SYSTEM),
            Error::Kernel(errno) => (errno as u32, MOD_SYSTEM),
            Error::RmStatus(status) => (status & RES_MASK, MOD_RM),
            Error::Engine(status) => (status & RES_MASK, MOD_ENGINE),
        };
        -(((res & RES_MASK) | (module << 28)) as i32)
    }

    /// Reconstructs an error from a packed code. Zero and positive values are
    /// not errors and return `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        let raw = (-code) as u32;
        let res = raw & RES_MASK;
        Some(match (raw >> 28) & 3 {
            MOD_RM => Error::RmStatus(res),
            MOD_ENGINE => Error::Engine(res),
            _ => match Errno::from_raw(res as i32) {
                Errno::EINVAL => Error::InvalidArgument,
                Errno::ENOSYS => Error::NotImplemented,
                Errno::ENOMEM => Error::OutOfMemory,
                Errno::EFAULT => Error::Fault,
                Errno::ETIMEDOUT => Error::Timeout,
                errno => Error::Kernel(errno),
            },
        })
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        match errno {
            Errno::EINVAL => Error::InvalidArgument,
            Errno::ENOSYS => Error::NotImplemented,
            Errno::ENOMEM => Error::OutOfMemory,
            Errno::ETIMEDOUT => Error::Timeout,
            errno => Error::Kernel(errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_negative_and_round_trip() {
        for err in [
            Error::InvalidArgument,
            Error::NotImplemented,
            Error::OutOfMemory,
            Error::Fault,
            Error::Timeout,
            Error::Kernel(Errno::EBUSY),
            Error::RmStatus(0x57),
            Error::Engine(0x100),
        ] {
            let code = err.code();
            assert!(code < 0);
            assert_eq!(Error::from_code(code), Some(err));
        }
        assert_eq!(Error::from_code(0), None);
    }

    #[test]
    fn module_tag_occupies_high_bits() {
        let code = Error::RmStatus(0x22).code();
        let raw = (-code) as u32;
        assert_eq!((raw >> 28) & 3, 1);
        assert_eq!(raw & ((1 << 29) - 1), 0x22);
    }
}
