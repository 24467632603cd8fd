// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hand-written subset of the Tegra kernel uapi: nvmap, nvhost, nvgpu and the
//! Tegra DRM job interface. Struct and constant names track the kernel
//! headers they mirror (`nvmap.h`, `nvhost_ioctl.h`, `nvgpu.h`,
//! `tegra_drm.h`); only what this crate exercises is defined.

#![allow(dead_code)]

use nix::{
    ioctl_read, ioctl_readwrite, ioctl_write_int_bad, ioctl_write_ptr, request_code_none,
};

use crate::RelocKind;

// Random tag marking our allocations, to suppress kernel warnings about
// untagged clients.
pub const MEM_TAG: u32 = 0xfeed << 16;

// ---------------------------------------------------------------------------
// nvmap (`nvmap.h`), magic 'N'.

/// `struct nvmap_create_handle`; the leading word is a union of size (in)
/// with id and fd (out) depending on the ioctl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmapCreateHandle {
    pub size_or_fd: u32,
    pub handle: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmapAllocHandle {
    pub handle: u32,
    pub heap_mask: u32,
    pub flags: u32,
    pub align: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmapCacheOp {
    pub addr: u64,
    pub handle: u32,
    pub len: u32,
    pub op: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvmapCreateHandleFromVa {
    pub va: u64,
    pub size: u32,
    pub flags: u32,
    pub handle: u32,
}

pub const NVMAP_HANDLE_UNCACHEABLE: u32 = 0;
pub const NVMAP_HANDLE_WRITE_COMBINE: u32 = 1;
pub const NVMAP_HANDLE_CACHEABLE: u32 = 3;

pub const NVMAP_HEAP_CARVEOUT_GENERIC: u32 = 1 << 0;
pub const NVMAP_HEAP_IOVMM: u32 = 1 << 30;

pub const NVMAP_CACHE_OP_WB: i32 = 0;
pub const NVMAP_CACHE_OP_INV: i32 = 1;
pub const NVMAP_CACHE_OP_WB_INV: i32 = 2;

ioctl_readwrite!(nvmap_create, b'N', 0, NvmapCreateHandle);
ioctl_write_ptr!(nvmap_alloc, b'N', 3, NvmapAllocHandle);
ioctl_write_int_bad!(nvmap_free, request_code_none!(b'N', 4));
ioctl_write_ptr!(nvmap_cache, b'N', 12, NvmapCacheOp);
ioctl_readwrite!(nvmap_get_fd, b'N', 15, NvmapCreateHandle);
ioctl_readwrite!(nvmap_from_va, b'N', 16, NvmapCreateHandleFromVa);

// ---------------------------------------------------------------------------
// nvhost (`nvhost_ioctl.h`), magic 'H'. The control node carries the syncpt
// ioctls; per-engine channel nodes carry the rest.

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostCtrlSyncptReadArgs {
    pub id: u32,
    pub value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostCtrlSyncptWaitexArgs {
    pub id: u32,
    pub thresh: u32,
    pub timeout: i32,
    pub value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostGetParamArg {
    pub param: u32,
    pub value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostSetTimeoutArgs {
    pub timeout: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostClkRateArgs {
    pub rate: u32,
    pub moduleid: u32,
}

/// `struct nvhost_cmdbuf`: one gather, as (memory handle, byte offset, word
/// count).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostCmdbuf {
    pub mem: u32,
    pub offset: u32,
    pub words: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostCmdbufExt {
    pub pre_fence: i32,
    pub reserved: u32,
}

/// `struct nvhost_reloc`: patch location and target for a kernel-side fixup.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostReloc {
    pub cmdbuf_mem: u32,
    pub cmdbuf_offset: u32,
    pub target: u32,
    pub target_offset: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostRelocType {
    pub reloc_type: u32,
    pub padding: u32,
}

impl NvhostRelocType {
    pub fn from_kind(kind: RelocKind) -> NvhostRelocType {
        let reloc_type = match kind {
            RelocKind::Default => NVHOST_RELOC_TYPE_DEFAULT,
            RelocKind::Pitch => NVHOST_RELOC_TYPE_PITCH_LINEAR,
            RelocKind::Tiled => NVHOST_RELOC_TYPE_BLOCK_LINEAR,
        };
        NvhostRelocType { reloc_type, padding: 0 }
    }
}

pub const NVHOST_RELOC_TYPE_DEFAULT: u32 = 0;
pub const NVHOST_RELOC_TYPE_PITCH_LINEAR: u32 = 1;
pub const NVHOST_RELOC_TYPE_BLOCK_LINEAR: u32 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostRelocShift {
    pub shift: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostSyncptIncr {
    pub syncpt_id: u32,
    pub syncpt_incrs: u32,
}

/// `struct nvhost_submit_args`, version 2.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostSubmitArgs {
    pub submit_version: u32,
    pub num_syncpt_incrs: u32,
    pub num_cmdbufs: u32,
    pub num_relocs: u32,
    pub num_waitchks: u32,
    pub timeout: u32,
    pub flags: u32,
    pub fence: u32,
    pub syncpt_incrs: u64,
    pub cmdbuf_exts: u64,
    pub checksum_methods: u32,
    pub checksum_falcon_methods: u32,
    pub pad: u64,
    pub reloc_types: u64,
    pub cmdbufs: u64,
    pub relocs: u64,
    pub reloc_shifts: u64,
    pub waitchks: u64,
    pub waitbases: u64,
    pub class_ids: u64,
    pub fences: u64,
}

pub const NVHOST_SUBMIT_VERSION_V2: u32 = 2;

/// `struct nvhost_channel_buffer` table entry for the channel map-buffer
/// ioctl; `address` receives the engine-side iova.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostChannelBuffer {
    pub handle: u32,
    pub reserved: u32,
    pub address: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvhostChannelMapBufferArgs {
    pub num_buffers: u32,
    pub reserved: u32,
    pub table_address: u64,
}

ioctl_readwrite!(nvhost_ctrl_syncpt_read, b'H', 1, NvhostCtrlSyncptReadArgs);
ioctl_readwrite!(nvhost_ctrl_syncpt_waitex, b'H', 6, NvhostCtrlSyncptWaitexArgs);

ioctl_readwrite!(nvhost_channel_get_clk_rate, b'H', 9, NvhostClkRateArgs);
ioctl_write_ptr!(nvhost_channel_set_clk_rate, b'H', 10, NvhostClkRateArgs);
ioctl_write_ptr!(nvhost_channel_set_timeout, b'H', 11, NvhostSetTimeoutArgs);
ioctl_readwrite!(nvhost_channel_get_syncpoint, b'H', 16, NvhostGetParamArg);
ioctl_readwrite!(nvhost_channel_submit, b'H', 26, NvhostSubmitArgs);
ioctl_readwrite!(nvhost_channel_map_buffer, b'H', 32, NvhostChannelMapBufferArgs);
ioctl_readwrite!(nvhost_channel_unmap_buffer, b'H', 33, NvhostChannelMapBufferArgs);

// `NVHOST_MODULE_*` clock/module identifiers.
pub const NVHOST_MODULE_MSENC: u32 = 4;
pub const NVHOST_MODULE_VIC: u32 = 7;
pub const NVHOST_MODULE_NVDEC: u32 = 8;
pub const NVHOST_MODULE_NVJPG: u32 = 9;
pub const NVHOST_MODULE_OFA: u32 = 10;

// ---------------------------------------------------------------------------
// nvgpu (`nvgpu.h`). The gpu-ctrl node uses magic 'G', address spaces 'A',
// TSGs 'T', and gpu channels share 'H' with nvhost.

/// Leading fields of `struct nvgpu_gpu_characteristics`, through the class
/// ids; the kernel copies `min(buf_size, sizeof)` so the tail may be omitted.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuGpuCharacteristics {
    pub arch: u32,
    pub impl_: u32,
    pub rev: u32,
    pub num_gpc: u32,
    pub l2_cache_size: u64,
    pub on_board_video_memory_size: u64,
    pub num_tpc_per_gpc: u32,
    pub bus_type: u32,
    pub big_page_size: u32,
    pub compression_page_size: u32,
    pub pde_coverage_bit_count: u32,
    pub available_big_page_sizes: u32,
    pub gpu_va_bit_count: u32,
    pub reserved: u32,
    pub flags: u64,
    pub twod_class: u32,
    pub threed_class: u32,
    pub compute_class: u32,
    pub gpfifo_class: u32,
    pub inline_to_memory_class: u32,
    pub dma_copy_class: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuGpuGetCharacteristicsArgs {
    pub gpu_characteristics_buf_size: u64,
    pub gpu_characteristics_buf_addr: u64,
}

pub const NVGPU_GPU_FLAGS_HAS_SYNCPOINTS: u64 = 1 << 3;
pub const NVGPU_GPU_FLAGS_SUPPORT_SYNCPOINT_ADDRESS: u64 = 1 << 25;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAllocAsArgs {
    pub big_page_size: u32,
    pub as_fd: i32,
    pub flags: u32,
    pub reserved: u32,
    pub va_range_start: u64,
    pub va_range_end: u64,
    pub va_range_split: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuGpuOpenTsgArgs {
    pub tsg_fd: i32,
    pub reserved: u32,
}

/// `struct nvgpu_gpu_open_channel_args`: in/out union over one word
/// (`runlist_id` in, `channel_fd` out).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuGpuOpenChannelArgs {
    pub primary: i32,
    pub padding: [i32; 3],
}

ioctl_readwrite!(nvgpu_gpu_get_characteristics, b'G', 5, NvgpuGpuGetCharacteristicsArgs);
ioctl_readwrite!(nvgpu_gpu_alloc_as, b'G', 8, NvgpuAllocAsArgs);
ioctl_readwrite!(nvgpu_gpu_open_tsg, b'G', 9, NvgpuGpuOpenTsgArgs);
ioctl_readwrite!(nvgpu_gpu_open_channel, b'G', 11, NvgpuGpuOpenChannelArgs);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAsBindChannelArgs {
    pub channel_fd: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAsMapBufferExArgs {
    pub flags: u32,
    pub compr_kind: i16,
    pub incompr_kind: i16,
    pub dmabuf_fd: u32,
    pub page_size: u32,
    pub buffer_offset: u64,
    pub mapping_size: u64,
    pub offset: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAsUnmapBufferArgs {
    pub offset: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAsGetSyncRoMapArgs {
    pub base_gpuva: u64,
    pub sync_size: u32,
    pub num_syncpoints: u32,
}

pub const NVGPU_AS_MAP_BUFFER_FLAGS_CACHEABLE: u32 = 1 << 2;
pub const NVGPU_AS_MAP_BUFFER_FLAGS_DIRECT_KIND_CTRL: u32 = 1 << 8;
pub const NV_KIND_INVALID: i16 = -1;

ioctl_readwrite!(nvgpu_as_bind_channel, b'A', 1, NvgpuAsBindChannelArgs);
ioctl_readwrite!(nvgpu_as_unmap_buffer, b'A', 5, NvgpuAsUnmapBufferArgs);
ioctl_readwrite!(nvgpu_as_map_buffer_ex, b'A', 7, NvgpuAsMapBufferExArgs);
ioctl_read!(nvgpu_as_get_sync_ro_map, b'A', 14, NvgpuAsGetSyncRoMapArgs);

ioctl_write_ptr!(nvgpu_tsg_bind_channel, b'T', 1, i32);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuSetNvmapFdArgs {
    pub fd: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuAllocObjCtxArgs {
    pub class_num: u32,
    pub flags: u32,
    pub obj_id: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuChannelSetupBindArgs {
    pub num_gpfifo_entries: u32,
    pub num_inflight_jobs: u32,
    pub flags: u32,
    pub reserved: [u32; 13],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuFence {
    pub id: u32,
    pub value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvgpuSubmitGpfifoArgs {
    pub gpfifo: u64,
    pub num_entries: u32,
    pub flags: u32,
    pub fence: NvgpuFence,
}

pub const NVGPU_SUBMIT_GPFIFO_FLAGS_FENCE_WAIT: u32 = 1 << 0;
pub const NVGPU_SUBMIT_GPFIFO_FLAGS_FENCE_GET: u32 = 1 << 1;
pub const NVGPU_SUBMIT_GPFIFO_FLAGS_HW_FORMAT: u32 = 1 << 2;

ioctl_write_ptr!(nvgpu_channel_set_nvmap_fd, b'H', 5, NvgpuSetNvmapFdArgs);
ioctl_readwrite!(nvgpu_channel_submit_gpfifo, b'H', 107, NvgpuSubmitGpfifoArgs);
ioctl_readwrite!(nvgpu_channel_alloc_obj_ctx, b'H', 108, NvgpuAllocObjCtxArgs);
ioctl_readwrite!(nvgpu_channel_setup_bind, b'H', 128, NvgpuChannelSetupBindArgs);

// ---------------------------------------------------------------------------
// Tegra DRM (`tegra_drm.h`), job uapi. Driver commands sit above
// DRM_COMMAND_BASE (0x40) with magic 'd'.

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmVersion {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_patchlevel: i32,
    pub name_len: usize,
    pub name: u64,
    pub date_len: usize,
    pub date: u64,
    pub desc_len: usize,
    pub desc: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmGemClose {
    pub handle: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmPrimeHandle {
    pub handle: u32,
    pub flags: u32,
    pub fd: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraChannelOpen {
    pub host1x_class: u32,
    pub flags: u32,
    pub context: u32,
    pub version: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraChannelClose {
    pub context: u32,
    pub padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraChannelMap {
    pub context: u32,
    pub handle: u32,
    pub flags: u32,
    pub mapping: u32,
}

pub const DRM_TEGRA_CHANNEL_MAP_READ_WRITE: u32 = (1 << 0) | (1 << 1);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraChannelUnmap {
    pub context: u32,
    pub mapping: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraSyncpointAllocate {
    pub id: u32,
    pub padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraSyncpointFree {
    pub id: u32,
    pub padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraSyncpointWait {
    pub timeout_ns: i64,
    pub id: u32,
    pub threshold: u32,
    pub value: u32,
    pub padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DrmTegraSubmitBuf {
    pub mapping: u32,
    pub flags: u32,
    pub reloc_target_offset: u64,
    pub reloc_gather_offset_words: u32,
    pub reloc_shift: u32,
}

impl DrmTegraSubmitBuf {
    pub fn reloc(mapping: u32, target_offset: u32, gather_offset_words: u32, shift: u32) -> Self {
        DrmTegraSubmitBuf {
            mapping,
            flags: 0,
            reloc_target_offset: target_offset as u64,
            reloc_gather_offset_words: gather_offset_words,
            reloc_shift: shift,
        }
    }
}

pub const DRM_TEGRA_SUBMIT_CMD_GATHER_UPTR: u32 = 0;
pub const DRM_TEGRA_SUBMIT_CMD_WAIT_SYNCPT: u32 = 1;

/// `struct drm_tegra_submit_cmd`. The payload union is laid out flat; the
/// first payload word doubles as the gather word count and the wait syncpoint
/// id depending on `type_`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraSubmitCmd {
    pub type_: u32,
    pub flags: u32,
    pub payload: [u32; 4],
}

impl DrmTegraSubmitCmd {
    pub fn gather_uptr() -> Self {
        DrmTegraSubmitCmd { type_: DRM_TEGRA_SUBMIT_CMD_GATHER_UPTR, flags: 0, payload: [0; 4] }
    }

    pub fn wait_syncpt(id: u32, value: u32) -> Self {
        DrmTegraSubmitCmd {
            type_: DRM_TEGRA_SUBMIT_CMD_WAIT_SYNCPT,
            flags: 0,
            payload: [id, value, 0, 0],
        }
    }

    pub fn bump_gather_words(&mut self) {
        debug_assert_eq!(self.type_, DRM_TEGRA_SUBMIT_CMD_GATHER_UPTR);
        self.payload[0] += 1;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraSubmitSyncpt {
    pub id: u32,
    pub flags: u32,
    pub increments: u32,
    pub value: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmTegraChannelSubmit {
    pub context: u32,
    pub num_bufs: u32,
    pub num_cmds: u32,
    pub gather_data_words: u32,
    pub bufs_ptr: u64,
    pub cmds_ptr: u64,
    pub gather_data_ptr: u64,
    pub syncobj_in: u32,
    pub syncobj_out: u32,
    pub syncpt: DrmTegraSubmitSyncpt,
}

const DRM_COMMAND_BASE: u32 = 0x40;

ioctl_readwrite!(drm_version, b'd', 0x00, DrmVersion);
ioctl_write_ptr!(drm_gem_close, b'd', 0x09, DrmGemClose);
ioctl_readwrite!(drm_prime_fd_to_handle, b'd', 0x2e, DrmPrimeHandle);

ioctl_readwrite!(drm_tegra_channel_open, b'd', DRM_COMMAND_BASE + 0x10, DrmTegraChannelOpen);
ioctl_readwrite!(drm_tegra_channel_close, b'd', DRM_COMMAND_BASE + 0x11, DrmTegraChannelClose);
ioctl_readwrite!(drm_tegra_channel_map, b'd', DRM_COMMAND_BASE + 0x12, DrmTegraChannelMap);
ioctl_readwrite!(drm_tegra_channel_unmap, b'd', DRM_COMMAND_BASE + 0x13, DrmTegraChannelUnmap);
ioctl_readwrite!(drm_tegra_channel_submit, b'd', DRM_COMMAND_BASE + 0x14, DrmTegraChannelSubmit);
ioctl_readwrite!(
    drm_tegra_syncpoint_allocate,
    b'd',
    DRM_COMMAND_BASE + 0x20,
    DrmTegraSyncpointAllocate
);
ioctl_readwrite!(drm_tegra_syncpoint_free, b'd', DRM_COMMAND_BASE + 0x21, DrmTegraSyncpointFree);
ioctl_readwrite!(drm_tegra_syncpoint_wait, b'd', DRM_COMMAND_BASE + 0x22, DrmTegraSyncpointWait);
