// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Discrete-GPU backend over the resource-manager driver.
//!
//! Everything is an object in the RM hierarchy: a root client owns a device,
//! which owns a subdevice, an address space, channels and memory. Submission
//! goes through user-mode GPFIFO rings and a doorbell page; completion is
//! tracked in a pool of semaphore cells the engines release into.

pub mod channel;
pub mod device;
pub mod ioctl;
pub mod map;

pub(crate) use channel::RmChannel;
pub(crate) use device::{create_device, probe, RmDevice};
pub(crate) use map::RmMapRaw;

/// Handle plus parent of one RM object; freeing needs both.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Object {
    pub handle: u32,
    pub parent: u32,
}
