// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Semaphore methods of the video decoder (class c9b0, `clc9b0.h`) and video
//! encoder (class c9b7, `clc9b7.h`) falcon frontends. The two classes share
//! the semaphore method layout.

use crate::regs::Field;

pub mod nvdec {
    pub const SEMAPHORE_A: u32 = 0x0240;
    pub const SEMAPHORE_B: u32 = 0x0244;
    pub const SEMAPHORE_C: u32 = 0x0248;
    pub const SEMAPHORE_D: u32 = 0x0304;
}

pub mod nvenc {
    pub const SEMAPHORE_A: u32 = 0x0240;
    pub const SEMAPHORE_B: u32 = 0x0244;
    pub const SEMAPHORE_C: u32 = 0x0248;
    pub const SEMAPHORE_D: u32 = 0x0304;
}

pub const SEMAPHORE_D_STRUCTURE_SIZE: Field = Field::new(0, 0);
pub const SEMAPHORE_D_STRUCTURE_SIZE_ONE: u32 = 0;
pub const SEMAPHORE_D_OPERATION: Field = Field::new(17, 16);
pub const SEMAPHORE_D_OPERATION_RELEASE: u32 = 0;
pub const SEMAPHORE_D_OPERATION_TRAP: u32 = 3;
pub const SEMAPHORE_D_PAYLOAD_SIZE: Field = Field::new(24, 24);
pub const SEMAPHORE_D_PAYLOAD_SIZE_32BIT: u32 = 0;
