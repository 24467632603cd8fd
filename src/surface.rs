// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Surface transfers over the copy engine.
//!
//! Emits the fixed method sequence for a 2D copy between two surfaces, either
//! pitch-linear or block-linear (GOB-tiled). Both maps must be pinned to the
//! submitting copy channel beforehand where the backend needs pins.

use crate::classes::copy as cl;
use crate::cmdbuf::CommandBuffer;
use crate::error::Result;
use crate::{Engine, Map, RelocKind};

/// One side of a transfer.
pub struct SurfaceInfo<'a> {
    pub map: &'a Map,
    pub map_offset: u32,
    /// Transfer width in bytes.
    pub width: u32,
    pub height: u32,
    /// Line stride in bytes.
    pub stride: u32,
    pub tiled: bool,
    /// GOB rows per block; meaningful only when tiled.
    pub gob_height: u8,
}

impl SurfaceInfo<'_> {
    fn reloc_kind(&self) -> RelocKind {
        if self.tiled {
            RelocKind::Tiled
        } else {
            RelocKind::Pitch
        }
    }

    fn block_size(&self) -> u32 {
        cl::BLOCK_SIZE_WIDTH.val(cl::BLOCK_SIZE_ONE_GOB)
            | cl::BLOCK_SIZE_HEIGHT.val(self.gob_height.trailing_zeros())
            | cl::BLOCK_SIZE_DEPTH.val(cl::BLOCK_SIZE_ONE_GOB)
            | cl::BLOCK_SIZE_GOB_HEIGHT.val(cl::BLOCK_SIZE_GOB_HEIGHT_FERMI_8)
    }
}

/// Appends a `src` → `dst` copy to `cmdbuf` as one gather on the copy engine.
pub fn surface_transfer(
    cmdbuf: &mut CommandBuffer,
    src: &SurfaceInfo,
    dst: &SurfaceInfo,
) -> Result<()> {
    let mut launch = cl::LAUNCH_DMA_DATA_TRANSFER_TYPE
        .val(cl::LAUNCH_DMA_DATA_TRANSFER_TYPE_NON_PIPELINED)
        | cl::LAUNCH_DMA_FLUSH_ENABLE.val(cl::LAUNCH_DMA_FLUSH_ENABLE_TRUE)
        | cl::LAUNCH_DMA_MULTI_LINE_ENABLE.val(1);

    cmdbuf.begin(Engine::Copy)?;

    cmdbuf.push_reloc(cl::OFFSET_IN_UPPER, src.map, src.map_offset, src.reloc_kind(), 0)?;
    cmdbuf.push_reloc(cl::OFFSET_OUT_UPPER, dst.map, dst.map_offset, dst.reloc_kind(), 0)?;

    if src.tiled {
        launch |= cl::LAUNCH_DMA_SRC_MEMORY_LAYOUT.val(cl::LAUNCH_DMA_MEMORY_LAYOUT_BLOCKLINEAR);
        cmdbuf.push_value(cl::SET_SRC_BLOCK_SIZE, src.block_size())?;
        cmdbuf.push_value(cl::SET_SRC_WIDTH, src.stride)?;
        cmdbuf.push_value(cl::SET_SRC_HEIGHT, src.height)?;
        cmdbuf.push_value(cl::SET_SRC_DEPTH, 1)?;
    } else {
        launch |= cl::LAUNCH_DMA_SRC_MEMORY_LAYOUT.val(cl::LAUNCH_DMA_MEMORY_LAYOUT_PITCH);
        cmdbuf.push_value(cl::PITCH_IN, src.stride)?;
    }

    if dst.tiled {
        launch |= cl::LAUNCH_DMA_DST_MEMORY_LAYOUT.val(cl::LAUNCH_DMA_MEMORY_LAYOUT_BLOCKLINEAR);
        cmdbuf.push_value(cl::SET_DST_BLOCK_SIZE, dst.block_size())?;
        cmdbuf.push_value(cl::SET_DST_WIDTH, dst.stride)?;
        cmdbuf.push_value(cl::SET_DST_HEIGHT, dst.height)?;
        cmdbuf.push_value(cl::SET_DST_DEPTH, 1)?;
    } else {
        launch |= cl::LAUNCH_DMA_DST_MEMORY_LAYOUT.val(cl::LAUNCH_DMA_MEMORY_LAYOUT_PITCH);
        cmdbuf.push_value(cl::PITCH_OUT, dst.stride)?;
    }

    cmdbuf.push_value(cl::LINE_LENGTH_IN, src.width)?;
    cmdbuf.push_value(cl::LINE_COUNT, src.height.min(dst.height))?;

    cmdbuf.push_value(cl::LAUNCH_DMA, launch)?;

    cmdbuf.end()
}
