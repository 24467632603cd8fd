// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! host1x channel opcodes, host-class sync methods, and the Tegra Host
//! Interface (THI) register indirection, per the L4T `host1x.h` definitions.

use crate::regs::Field;

/// host1x client class ids (`include/linux/host1x.h`).
pub const CLASS_HOST1X: u32 = 0x01;
pub const CLASS_NVENC: u32 = 0x21;
pub const CLASS_VIC: u32 = 0x5d;
pub const CLASS_NVJPG: u32 = 0xc0;
pub const CLASS_NVDEC: u32 = 0xf0;
pub const CLASS_OFA: u32 = 0xf8;

// Channel opcodes occupy bits 31:28 of each command word.
pub const SETCL_OPCODE: Field = Field::new(31, 28);
pub const SETCL_OPCODE_VALUE: u32 = 0;
pub const SETCL_OFFSET: Field = Field::new(27, 16);
pub const SETCL_CLASSID: Field = Field::new(15, 6);
pub const SETCL_MASK: Field = Field::new(5, 0);

pub const INCR_OPCODE: Field = Field::new(31, 28);
pub const INCR_OPCODE_VALUE: u32 = 1;
pub const INCR_OFFSET: Field = Field::new(27, 16);
pub const INCR_COUNT: Field = Field::new(15, 0);

pub const NONINCR_OPCODE: Field = Field::new(31, 28);
pub const NONINCR_OPCODE_VALUE: u32 = 2;
pub const NONINCR_OFFSET: Field = Field::new(27, 16);
pub const NONINCR_COUNT: Field = Field::new(15, 0);

pub const MASK_OPCODE: Field = Field::new(31, 28);
pub const MASK_OPCODE_VALUE: u32 = 3;
pub const MASK_OFFSET: Field = Field::new(27, 16);
pub const MASK_MASK: Field = Field::new(15, 0);

/// Host-class methods used for in-stream syncpoint waits.
pub const HOST_LOAD_SYNCPT_PAYLOAD: u32 = 0x0138;
pub const HOST_WAIT_SYNCPT: u32 = 0x0140;

/// THI registers, shared by every multimedia engine behind host1x. Method
/// writes go through METHOD0 (destination offset / 4) then METHOD1 (data).
pub const THI_INCR_SYNCPT: u32 = 0x0000;
pub const THI_METHOD0: u32 = 0x0040;
pub const THI_METHOD1: u32 = 0x0044;

// INCR_SYNCPT field positions changed in host1x v6: the index widened from 8
// to 10 bits and the condition moved up.
pub const THI_INCR_SYNCPT_INDX: Field = Field::new(7, 0);
pub const THI_INCR_SYNCPT_COND: Field = Field::new(15, 8);
pub const THI_INCR_SYNCPT_INDX_V6: Field = Field::new(9, 0);
pub const THI_INCR_SYNCPT_COND_V6: Field = Field::new(17, 10);
pub const THI_INCR_SYNCPT_COND_OP_DONE: u32 = 1;

pub const fn setcl(class_id: u32) -> u32 {
    SETCL_OPCODE.val(SETCL_OPCODE_VALUE)
        | SETCL_CLASSID.val(class_id)
        | SETCL_MASK.val(0)
        | SETCL_OFFSET.val(0)
}

pub const fn incr(offset_words: u32, count: u32) -> u32 {
    INCR_OPCODE.val(INCR_OPCODE_VALUE) | INCR_OFFSET.val(offset_words) | INCR_COUNT.val(count)
}

pub const fn nonincr(offset_words: u32, count: u32) -> u32 {
    NONINCR_OPCODE.val(NONINCR_OPCODE_VALUE)
        | NONINCR_OFFSET.val(offset_words)
        | NONINCR_COUNT.val(count)
}

pub const fn mask(offset_words: u32, mask: u32) -> u32 {
    MASK_OPCODE.val(MASK_OPCODE_VALUE) | MASK_OFFSET.val(offset_words) | MASK_MASK.val(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_land_in_top_nibble() {
        assert_eq!(setcl(CLASS_NVDEC) >> 28, 0);
        assert_eq!(incr(THI_METHOD0 >> 2, 2) >> 28, 1);
        assert_eq!(nonincr(THI_INCR_SYNCPT >> 2, 1) >> 28, 2);
        assert_eq!(mask(HOST_LOAD_SYNCPT_PAYLOAD >> 2, 3) >> 28, 3);
    }

    #[test]
    fn incr_encodes_thi_method0() {
        let w = incr(THI_METHOD0 >> 2, 2);
        assert_eq!(INCR_OFFSET.get(w), 0x10);
        assert_eq!(INCR_COUNT.get(w), 2);
    }
}
