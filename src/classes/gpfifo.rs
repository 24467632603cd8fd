// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ampere channel GPFIFO methods (class c76f, `clc76f.h`), plus the usermode
//! doorbell region (class c361) and the USERD control-page layout.

use crate::regs::{Field, Field64};

/// Size of one GP entry in bytes.
pub const GP_ENTRY_SIZE: usize = 8;

/// Low half of a GP entry: bits 31:2 hold `gpu_addr >> 2`.
pub const GP_ENTRY0_GET: Field = Field::new(31, 2);
/// High half: bits 7:0 hold `gpu_addr >> 32`, bits 30:10 the gather length.
pub const GP_ENTRY1_GET_HI: Field = Field::new(7, 0);
pub const GP_ENTRY1_LENGTH: Field64 = Field64::new(30, 10);

/// Method header, "increment" addressing: one header word, then `COUNT` data
/// words written to consecutive method addresses.
pub const DMA_INCR_OPCODE: Field = Field::new(31, 29);
pub const DMA_INCR_OPCODE_VALUE: u32 = 1;
pub const DMA_INCR_COUNT: Field = Field::new(28, 16);
pub const DMA_INCR_SUBCHANNEL: Field = Field::new(15, 13);
pub const DMA_INCR_ADDRESS: Field = Field::new(11, 0);

// Host methods.
pub const NOP: u32 = 0x0008;
pub const NON_STALL_INTERRUPT: u32 = 0x0020;
pub const MEM_OP_A: u32 = 0x0028;
pub const MEM_OP_B: u32 = 0x002c;
pub const MEM_OP_C: u32 = 0x0030;
pub const MEM_OP_D: u32 = 0x0034;
pub const SYNCPOINTA: u32 = 0x0048;
pub const SYNCPOINTB: u32 = 0x004c;
pub const SET_REFERENCE: u32 = 0x0050;
pub const SEM_ADDR_LO: u32 = 0x005c;
pub const SEM_ADDR_HI: u32 = 0x0060;
pub const SEM_PAYLOAD_LO: u32 = 0x0064;
pub const SEM_PAYLOAD_HI: u32 = 0x0068;
pub const SEM_EXECUTE: u32 = 0x006c;

pub const NON_STALL_INTERRUPT_HANDLE: Field = Field::new(31, 0);

pub const SEM_EXECUTE_OPERATION: Field = Field::new(2, 0);
pub const SEM_EXECUTE_OPERATION_ACQUIRE: u32 = 0;
pub const SEM_EXECUTE_OPERATION_RELEASE: u32 = 1;
pub const SEM_EXECUTE_OPERATION_ACQ_STRICT_GEQ: u32 = 2;
pub const SEM_EXECUTE_OPERATION_ACQ_CIRC_GEQ: u32 = 3;
pub const SEM_EXECUTE_ACQUIRE_SWITCH_TSG: Field = Field::new(12, 12);
pub const SEM_EXECUTE_ACQUIRE_SWITCH_TSG_EN: u32 = 1;
pub const SEM_EXECUTE_RELEASE_WFI: Field = Field::new(20, 20);
pub const SEM_EXECUTE_RELEASE_WFI_DIS: u32 = 0;
pub const SEM_EXECUTE_PAYLOAD_SIZE: Field = Field::new(24, 24);
pub const SEM_EXECUTE_PAYLOAD_SIZE_32BIT: u32 = 0;
pub const SEM_EXECUTE_RELEASE_TIMESTAMP: Field = Field::new(25, 25);
pub const SEM_EXECUTE_RELEASE_TIMESTAMP_DIS: u32 = 0;

pub const SYNCPOINTB_OPERATION: Field = Field::new(0, 0);
pub const SYNCPOINTB_OPERATION_WAIT: u32 = 0;
pub const SYNCPOINTB_WAIT_SWITCH: Field = Field::new(4, 4);
pub const SYNCPOINTB_WAIT_SWITCH_EN: u32 = 1;
pub const SYNCPOINTB_SYNCPT_INDEX: Field = Field::new(23, 8);

pub const MEM_OP_D_OPERATION: Field = Field::new(31, 27);
pub const MEM_OP_D_OPERATION_L2_SYSMEM_INVALIDATE: u32 = 0x0e;
pub const MEM_OP_D_OPERATION_L2_FLUSH_DIRTY: u32 = 0x10;

/// USERD control page: byte offset of the `GPPut` ring tail.
pub const USERD_GP_PUT: usize = 0x8c;
/// Byte offset of the doorbell register in the usermode region (c361).
pub const USERMODE_NOTIFY_CHANNEL_PENDING: usize = 0x90;
/// Size of the usermode mmio region.
pub const USERMODE_SIZE: usize = 0x10000;

/// Builds one method header addressing `method` on `subchannel` with `count`
/// following data words.
pub const fn incr_header(method: u32, subchannel: u32, count: u32) -> u32 {
    DMA_INCR_OPCODE.val(DMA_INCR_OPCODE_VALUE)
        | DMA_INCR_COUNT.val(count)
        | DMA_INCR_SUBCHANNEL.val(subchannel)
        | DMA_INCR_ADDRESS.val(method >> 2)
}

/// Builds a GP entry for a gather at `gpu_addr`. The length is patched in at
/// `end()` once the word count is known.
pub const fn gp_entry(gpu_addr: u64) -> u64 {
    let entry0 = GP_ENTRY0_GET.val((gpu_addr >> 2) as u32);
    let entry1 = GP_ENTRY1_GET_HI.val((gpu_addr >> 32) as u32);
    entry0 as u64 | ((entry1 as u64) << 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_method_address_in_words() {
        let w = incr_header(SEM_PAYLOAD_LO, 6, 1);
        assert_eq!(DMA_INCR_ADDRESS.get(w), SEM_PAYLOAD_LO >> 2);
        assert_eq!(DMA_INCR_SUBCHANNEL.get(w), 6);
        assert_eq!(DMA_INCR_COUNT.get(w), 1);
        assert_eq!(DMA_INCR_OPCODE.get(w), DMA_INCR_OPCODE_VALUE);
    }

    #[test]
    fn gp_entry_splits_address() {
        let entry = gp_entry(0x12_3456_7800);
        assert_eq!(entry as u32, GP_ENTRY0_GET.val((0x12_3456_7800u64 >> 2) as u32));
        assert_eq!((entry >> 32) as u32, 0x12);
        let entry = entry | GP_ENTRY1_LENGTH.val(5) << 32;
        assert_eq!((entry >> 32) as u32 >> 10 & 0x1fffff, 5);
    }
}
