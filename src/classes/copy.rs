// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ampere DMA copy engine methods (class c7b5, `clc7b5.h`).

use crate::regs::Field;

pub const SET_SEMAPHORE_A: u32 = 0x0240;
pub const SET_SEMAPHORE_B: u32 = 0x0244;
pub const SET_SEMAPHORE_PAYLOAD: u32 = 0x0248;
pub const LAUNCH_DMA: u32 = 0x0300;
pub const OFFSET_IN_UPPER: u32 = 0x0400;
pub const OFFSET_IN_LOWER: u32 = 0x0404;
pub const OFFSET_OUT_UPPER: u32 = 0x0408;
pub const OFFSET_OUT_LOWER: u32 = 0x040c;
pub const PITCH_IN: u32 = 0x0410;
pub const PITCH_OUT: u32 = 0x0414;
pub const LINE_LENGTH_IN: u32 = 0x0418;
pub const LINE_COUNT: u32 = 0x041c;
pub const SET_REMAP_CONST_A: u32 = 0x0700;
pub const SET_REMAP_CONST_B: u32 = 0x0704;
pub const SET_REMAP_COMPONENTS: u32 = 0x0708;
pub const SET_DST_BLOCK_SIZE: u32 = 0x070c;
pub const SET_DST_WIDTH: u32 = 0x0710;
pub const SET_DST_HEIGHT: u32 = 0x0714;
pub const SET_DST_DEPTH: u32 = 0x0718;
pub const SET_SRC_BLOCK_SIZE: u32 = 0x0728;
pub const SET_SRC_WIDTH: u32 = 0x072c;
pub const SET_SRC_HEIGHT: u32 = 0x0730;
pub const SET_SRC_DEPTH: u32 = 0x0734;

pub const LAUNCH_DMA_DATA_TRANSFER_TYPE: Field = Field::new(1, 0);
pub const LAUNCH_DMA_DATA_TRANSFER_TYPE_NONE: u32 = 0;
pub const LAUNCH_DMA_DATA_TRANSFER_TYPE_PIPELINED: u32 = 1;
pub const LAUNCH_DMA_DATA_TRANSFER_TYPE_NON_PIPELINED: u32 = 2;
pub const LAUNCH_DMA_FLUSH_ENABLE: Field = Field::new(2, 2);
pub const LAUNCH_DMA_FLUSH_ENABLE_TRUE: u32 = 1;
pub const LAUNCH_DMA_SEMAPHORE_TYPE: Field = Field::new(4, 3);
pub const LAUNCH_DMA_SEMAPHORE_TYPE_NONE: u32 = 0;
pub const LAUNCH_DMA_SEMAPHORE_TYPE_RELEASE_ONE_WORD: u32 = 1;
pub const LAUNCH_DMA_INTERRUPT_TYPE: Field = Field::new(6, 5);
pub const LAUNCH_DMA_INTERRUPT_TYPE_NONE: u32 = 0;
pub const LAUNCH_DMA_INTERRUPT_TYPE_NON_BLOCKING: u32 = 2;
pub const LAUNCH_DMA_SRC_MEMORY_LAYOUT: Field = Field::new(7, 7);
pub const LAUNCH_DMA_DST_MEMORY_LAYOUT: Field = Field::new(8, 8);
pub const LAUNCH_DMA_MEMORY_LAYOUT_BLOCKLINEAR: u32 = 0;
pub const LAUNCH_DMA_MEMORY_LAYOUT_PITCH: u32 = 1;
pub const LAUNCH_DMA_MULTI_LINE_ENABLE: Field = Field::new(9, 9);
pub const LAUNCH_DMA_REMAP_ENABLE: Field = Field::new(10, 10);
pub const LAUNCH_DMA_SRC_TYPE: Field = Field::new(12, 12);
pub const LAUNCH_DMA_DST_TYPE: Field = Field::new(13, 13);
pub const LAUNCH_DMA_TYPE_VIRTUAL: u32 = 0;

pub const REMAP_DST_X: Field = Field::new(2, 0);
pub const REMAP_DST_X_CONST_A: u32 = 4;
pub const REMAP_COMPONENT_SIZE: Field = Field::new(17, 16);
pub const REMAP_COMPONENT_SIZE_ONE: u32 = 0;
pub const REMAP_NUM_SRC_COMPONENTS: Field = Field::new(21, 20);
pub const REMAP_NUM_DST_COMPONENTS: Field = Field::new(25, 24);
pub const REMAP_NUM_COMPONENTS_ONE: u32 = 0;

pub const BLOCK_SIZE_WIDTH: Field = Field::new(3, 0);
pub const BLOCK_SIZE_HEIGHT: Field = Field::new(7, 4);
pub const BLOCK_SIZE_DEPTH: Field = Field::new(11, 8);
pub const BLOCK_SIZE_ONE_GOB: u32 = 0;
pub const BLOCK_SIZE_GOB_HEIGHT: Field = Field::new(15, 12);
pub const BLOCK_SIZE_GOB_HEIGHT_FERMI_8: u32 = 1;
