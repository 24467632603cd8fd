// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hand-written subset of the resource-manager driver uapi.
//!
//! Structs mirror the driver's `nvos.h`, `nv-ioctl.h` and control headers;
//! each carries the name it maps to. Only the fields and commands this crate
//! exercises are defined.

#![allow(dead_code)]

use std::mem::size_of;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::{request_code_readwrite, request_code_write};

use crate::regs::Field;

/// `NV_IOCTL_MAGIC` from `nv-ioctl-numbers.h`.
pub const NV_IOCTL_MAGIC: u8 = b'F';

// Escape numbers, from `nv-ioctl-numbers.h` and `nv_escape.h`.
pub const NV_ESC_CARD_INFO: u32 = 200;
pub const NV_ESC_REGISTER_FD: u32 = 201;
pub const NV_ESC_ALLOC_OS_EVENT: u32 = 206;
pub const NV_ESC_FREE_OS_EVENT: u32 = 207;
pub const NV_ESC_RM_FREE: u32 = 0x29;
pub const NV_ESC_RM_CONTROL: u32 = 0x2a;
pub const NV_ESC_RM_ALLOC: u32 = 0x2b;
pub const NV_ESC_RM_VID_HEAP_CONTROL: u32 = 0x4a;
pub const NV_ESC_RM_MAP_MEMORY: u32 = 0x4e;
pub const NV_ESC_RM_UNMAP_MEMORY: u32 = 0x4f;
pub const NV_ESC_RM_MAP_MEMORY_DMA: u32 = 0x57;

pub unsafe fn nv_esc_iowr<T>(fd: RawFd, nr: u32, data: &mut T) -> nix::Result<()> {
    let req = request_code_readwrite!(NV_IOCTL_MAGIC, nr, size_of::<T>());
    Errno::result(libc::ioctl(fd, req as _, data as *mut T)).map(drop)
}

pub unsafe fn nv_esc_iow<T>(fd: RawFd, nr: u32, data: &mut T) -> nix::Result<()> {
    let req = request_code_write!(NV_IOCTL_MAGIC, nr, size_of::<T>());
    Errno::result(libc::ioctl(fd, req as _, data as *mut T)).map(drop)
}

/// `nv_ioctl_card_info_t` (`nv-ioctl.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvIoctlCardInfo {
    pub flags: u16,
    pub pci_domain: u32,
    pub pci_bus: u8,
    pub pci_slot: u8,
    pub pci_function: u8,
    pub vendor_id: u16,
    pub device_id: u16,
    pub gpu_id: u32,
    pub interrupt_line: u16,
    pub reg_address: u64,
    pub reg_size: u64,
    pub fb_address: u64,
    pub fb_size: u64,
    pub minor_number: u32,
    pub dev_name: [u8; 10],
}

/// `NV_IOCTL_CARD_INFO_FLAG_PRESENT`.
pub const CARD_INFO_FLAG_PRESENT: u16 = 0x0001;

/// `nv_ioctl_alloc_os_event_t` (`nv-ioctl.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvIoctlAllocOsEvent {
    pub client: u32,
    pub device: u32,
    pub fd: u32,
    pub status: u32,
}

/// `nv_ioctl_free_os_event_t` (`nv-ioctl.h`).
pub type NvIoctlFreeOsEvent = NvIoctlAllocOsEvent;

/// `NVOS00_PARAMETERS`, for `NV_ESC_RM_FREE` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos00Parameters {
    pub root: u32,
    pub object_parent: u32,
    pub object_old: u32,
    pub status: u32,
}

/// `NVOS64_PARAMETERS`, for `NV_ESC_RM_ALLOC` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos64Parameters {
    pub root: u32,
    pub object_parent: u32,
    pub object_new: u32,
    pub class: u32,
    pub alloc_parms: u64,
    pub rights_requested: u64,
    pub params_size: u32,
    pub flags: u32,
    pub status: u32,
}

/// `NVOS54_PARAMETERS`, for `NV_ESC_RM_CONTROL` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos54Parameters {
    pub client: u32,
    pub object: u32,
    pub cmd: u32,
    pub flags: u32,
    pub params: u64,
    pub params_size: u32,
    pub status: u32,
}

/// `NVOS33_PARAMETERS` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos33Parameters {
    pub client: u32,
    pub device: u32,
    pub memory: u32,
    pub offset: u64,
    pub length: u64,
    pub linear_address: u64,
    pub status: u32,
    pub flags: u32,
}

/// `nv_ioctl_nvos33_parameters_with_fd` (`nv-unix-nvos-params-wrappers.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos33ParametersWithFd {
    pub params: Nvos33Parameters,
    pub fd: i32,
}

/// `NVOS34_PARAMETERS`, for `NV_ESC_RM_UNMAP_MEMORY` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos34Parameters {
    pub client: u32,
    pub device: u32,
    pub memory: u32,
    pub linear_address: u64,
    pub status: u32,
    pub flags: u32,
}

/// `NVOS46_PARAMETERS`, for mapping memory into a DMA (GPU) address space.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos46Parameters {
    pub client: u32,
    pub device: u32,
    pub dma: u32,
    pub memory: u32,
    pub offset: u64,
    pub length: u64,
    pub flags: u32,
    pub dma_offset: u64,
    pub status: u32,
}

/// The `AllocOsDesc` member of the `NVOS32_PARAMETERS` data union.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvos32AllocOsDesc {
    pub memory: u32,
    pub type_: u32,
    pub flags: u32,
    pub attr: u32,
    pub attr2: u32,
    pub descriptor: u64,
    pub limit: u64,
    pub descriptor_type: u32,
}

/// `NVOS32_PARAMETERS`, for `NV_ESC_RM_VID_HEAP_CONTROL` (`nvos.h`). The
/// 144-byte data union is narrowed to the one member we use, padded to the
/// kernel's size so the ioctl size encoding matches.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Nvos32Parameters {
    pub root: u32,
    pub object_parent: u32,
    pub function: u32,
    pub h_vaspace: u32,
    pub ivc_heap_number: i16,
    pub status: u32,
    pub total: u64,
    pub free: u64,
    pub alloc_os_desc: Nvos32AllocOsDesc,
    pub data_pad: [u8; 144 - size_of::<Nvos32AllocOsDesc>()],
}

impl Default for Nvos32Parameters {
    fn default() -> Self {
        Self {
            root: 0,
            object_parent: 0,
            function: 0,
            h_vaspace: 0,
            ivc_heap_number: 0,
            status: 0,
            total: 0,
            free: 0,
            alloc_os_desc: Nvos32AllocOsDesc::default(),
            data_pad: [0; 144 - size_of::<Nvos32AllocOsDesc>()],
        }
    }
}

pub const NVOS32_FUNCTION_ALLOC_OS_DESCRIPTOR: u32 = 27;
pub const NVOS32_DESCRIPTOR_TYPE_VIRTUAL_ADDRESS: u32 = 0;

// Memory classes and object classes, from `g_allclasses.h`.
pub const NV01_ROOT_CLIENT: u32 = 0x0000_0041;
pub const NV01_DEVICE_0: u32 = 0x0000_0080;
pub const NV20_SUBDEVICE_0: u32 = 0x0000_2080;
pub const NV01_MEMORY_SYSTEM: u32 = 0x0000_003e;
pub const NV01_MEMORY_LOCAL_USER: u32 = 0x0000_0040;
pub const NV01_MEMORY_VIRTUAL: u32 = 0x0000_0070;
pub const NV01_EVENT_OS_EVENT: u32 = 0x0000_0079;
pub const RM_USER_SHARED_DATA: u32 = 0x0000_00de;

/// `NV_MEMORY_ALLOCATION_PARAMS` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvMemoryAllocationParams {
    pub owner: u32,
    pub type_: u32,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: i32,
    pub attr: u32,
    pub attr2: u32,
    pub format: u32,
    pub compr_covg: u32,
    pub zcull_covg: u32,
    pub range_lo: u64,
    pub range_hi: u64,
    pub size: u64,
    pub alignment: u64,
    pub offset: u64,
    pub limit: u64,
    pub address: u64,
    pub ctag_offset: u32,
    pub h_vaspace: u32,
    pub internal_flags: u32,
    pub tag: u32,
}

/// `NV_MEMORY_VIRTUAL_ALLOCATION_PARAMS` (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvMemoryVirtualAllocationParams {
    pub offset: u64,
    pub limit: u64,
    pub h_vaspace: u32,
}

/// `NVOS32_TYPE_IMAGE`.
pub const NVOS32_TYPE_IMAGE: u32 = 0;

// `NVOS32_ATTR_*` bit fields (`nvos.h`).
pub const OS32_ATTR_PAGE_SIZE: Field = Field::new(24, 23);
pub const OS32_ATTR_PAGE_SIZE_DEFAULT: u32 = 0;
pub const OS32_ATTR_PAGE_SIZE_4KB: u32 = 1;
pub const OS32_ATTR_PAGE_SIZE_HUGE: u32 = 3;
pub const OS32_ATTR_LOCATION: Field = Field::new(26, 25);
pub const OS32_ATTR_LOCATION_VIDMEM: u32 = 0;
pub const OS32_ATTR_LOCATION_PCI: u32 = 1;
pub const OS32_ATTR_PHYSICALITY: Field = Field::new(28, 27);
pub const OS32_ATTR_PHYSICALITY_NONCONTIGUOUS: u32 = 1;
pub const OS32_ATTR_PHYSICALITY_CONTIGUOUS: u32 = 2;
pub const OS32_ATTR_COHERENCY: Field = Field::new(31, 29);
pub const OS32_ATTR_COHERENCY_UNCACHED: u32 = 0;
pub const OS32_ATTR_COHERENCY_CACHED: u32 = 1;
pub const OS32_ATTR_COHERENCY_WRITE_COMBINE: u32 = 2;
pub const OS32_ATTR_COHERENCY_WRITE_BACK: u32 = 5;

// `NVOS32_ATTR2_*` bit fields.
pub const OS32_ATTR2_GPU_CACHEABLE: Field = Field::new(1, 0);
pub const OS32_ATTR2_GPU_CACHEABLE_YES: u32 = 1;
pub const OS32_ATTR2_GPU_CACHEABLE_NO: u32 = 2;
pub const OS32_ATTR2_ZBC: Field = Field::new(3, 2);
pub const OS32_ATTR2_ZBC_PREFER_NO_ZBC: u32 = 1;
pub const OS32_ATTR2_PAGE_SIZE_HUGE: Field = Field::new(21, 20);
pub const OS32_ATTR2_PAGE_SIZE_HUGE_DEFAULT: u32 = 0;

// `NVOS32_ALLOC_FLAGS_*`.
pub const NVOS32_ALLOC_FLAGS_ALIGNMENT_FORCE: u32 = 0x0000_0004;
pub const NVOS32_ALLOC_FLAGS_PERSISTENT_VIDMEM: u32 = 0x0000_8000;
pub const NVOS32_ALLOC_FLAGS_MAP_NOT_REQUIRED: u32 = 0x0010_0000;

/// `NV0005_ALLOC_PARAMETERS` (`cl0005.h`), alloc params of
/// `NV01_EVENT_OS_EVENT`; `data` carries the event fd.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv0005AllocParameters {
    pub parent_client: u32,
    pub src_resource: u32,
    pub class: u32,
    pub notify_index: u32,
    pub data: u64,
}

pub const NV01_EVENT_NONSTALL_INTR: u32 = 0x4000_0000;
pub const NV01_EVENT_WITHOUT_EVENT_DATA: u32 = 0x8000_0000;

/// `NV0080_ALLOC_PARAMETERS` (`cl0080.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv0080AllocParameters {
    pub device_id: u32,
    pub client_share: u32,
    pub target_client: u32,
    pub target_device: u32,
    pub flags: u32,
    pub va_space_size: u64,
    pub va_start_internal: u64,
    pub va_limit_internal: u64,
    pub va_mode: u32,
}

/// `NV2080_ALLOC_PARAMETERS` (`cl2080.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv2080AllocParameters {
    pub sub_device_id: u32,
}

/// `NV0000_CTRL_CMD_GPU_GET_ID_INFO_V2` (`ctrl0000gpu.h`).
pub const NV0000_CTRL_CMD_GPU_GET_ID_INFO_V2: u32 = 0x205;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv0000CtrlGpuGetIdInfoV2Params {
    pub gpu_id: u32,
    pub gpu_flags: u32,
    pub device_instance: u32,
    pub sub_device_instance: u32,
}

/// `NV0000_CTRL_GPU_ID_INFO_SOC` flag bit.
pub const GPU_ID_INFO_SOC: Field = Field::new(5, 5);

/// `NV2080_CTRL_CMD_GPU_GET_ENGINES_V2` (`ctrl2080gpu.h`).
pub const NV2080_CTRL_CMD_GPU_GET_ENGINES_V2: u32 = 0x2080_0170;
pub const NV2080_GPU_MAX_ENGINES_LIST_SIZE: usize = 64;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Nv2080CtrlGpuGetEnginesV2Params {
    pub engine_count: u32,
    pub engine_list: [u32; NV2080_GPU_MAX_ENGINES_LIST_SIZE],
}

impl Default for Nv2080CtrlGpuGetEnginesV2Params {
    fn default() -> Self {
        Self { engine_count: 0, engine_list: [0; NV2080_GPU_MAX_ENGINES_LIST_SIZE] }
    }
}

/// `NV0080_CTRL_CMD_GPU_GET_CLASSLIST_V2` (`ctrl0080gpu.h`).
pub const NV0080_CTRL_CMD_GPU_GET_CLASSLIST_V2: u32 = 0x80_0292;
pub const NV0080_CTRL_GPU_CLASSLIST_MAX_SIZE: usize = 256;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Nv0080CtrlGpuGetClasslistV2Params {
    pub num_classes: u32,
    pub class_list: [u32; NV0080_CTRL_GPU_CLASSLIST_MAX_SIZE],
}

impl Default for Nv0080CtrlGpuGetClasslistV2Params {
    fn default() -> Self {
        Self { num_classes: 0, class_list: [0; NV0080_CTRL_GPU_CLASSLIST_MAX_SIZE] }
    }
}

/// `NV2080_CTRL_CMD_GPU_GET_ENGINE_CLASSLIST` (`ctrl2080gpu.h`). Two-call
/// protocol: first with a null list to learn the count, then with a buffer.
pub const NV2080_CTRL_CMD_GPU_GET_ENGINE_CLASSLIST: u32 = 0x2080_012a;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv2080CtrlGpuGetEngineClasslistParams {
    pub engine_type: u32,
    pub num_classes: u32,
    pub class_list: u64,
}

/// `NV2080_CTRL_CMD_CE_GET_CAPS_V2` (`ctrl2080ce.h`).
pub const NV2080_CTRL_CMD_CE_GET_CAPS_V2: u32 = 0x2080_2a03;
pub const NV2080_CTRL_CE_CAPS_TBL_SIZE: usize = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv2080CtrlCeGetCapsV2Params {
    pub ce_engine_type: u32,
    pub caps_tbl: [u8; NV2080_CTRL_CE_CAPS_TBL_SIZE],
}

/// `NV2080_CTRL_CE_CAPS_CE_GRCE`: table byte 0, bit 0.
pub const CE_CAPS_GRCE_INDEX: usize = 0;
pub const CE_CAPS_GRCE_MASK: u8 = 0x01;

/// `NV0080_CTRL_CMD_BSP_GET_CAPS_V2` (`ctrl0080bsp.h`).
pub const NV0080_CTRL_CMD_BSP_GET_CAPS_V2: u32 = 0x80_1c02;
pub const NV0080_CTRL_BSP_CAPS_TBL_SIZE: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv0080CtrlBspGetCapsParamsV2 {
    pub caps_tbl: [u8; NV0080_CTRL_BSP_CAPS_TBL_SIZE],
    pub instance_id: u32,
}

/// `NVA06F_CTRL_CMD_BIND` (`ctrla06f.h`).
pub const NVA06F_CTRL_CMD_BIND: u32 = 0xa06f_0104;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nva06fCtrlBindParams {
    pub engine_type: u32,
}

/// `NVA06F_CTRL_CMD_GPFIFO_SCHEDULE` (`ctrla06f.h`).
pub const NVA06F_CTRL_CMD_GPFIFO_SCHEDULE: u32 = 0xa06f_0103;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nva06fCtrlGpfifoScheduleParams {
    pub enable: u8,
    pub skip_submit: u8,
}

/// `NVC36F_CTRL_CMD_GPFIFO_GET_WORK_SUBMIT_TOKEN` (`ctrlc36f.h`).
pub const NVC36F_CTRL_CMD_GPFIFO_GET_WORK_SUBMIT_TOKEN: u32 = 0xc36f_0108;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvc36fCtrlGpfifoGetWorkSubmitTokenParams {
    pub work_submit_token: u32,
}

/// `NV2080_CTRL_CMD_EVENT_SET_NOTIFICATION` (`ctrl2080event.h`).
pub const NV2080_CTRL_CMD_EVENT_SET_NOTIFICATION: u32 = 0x2080_0301;
pub const NV2080_CTRL_EVENT_SET_NOTIFICATION_ACTION_DISABLE: u32 = 0;
pub const NV2080_CTRL_EVENT_SET_NOTIFICATION_ACTION_SINGLE: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv2080CtrlEventSetNotificationParams {
    pub event: u32,
    pub action: u32,
}

/// `NV_CHANNEL_ALLOC_PARAMS` (`alloc_channel.h`).
pub const NV_MAX_SUBDEVICES: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvMemoryDescParams {
    pub base: u64,
    pub size: u64,
    pub address_space: u32,
    pub cache_attrib: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvChannelAllocParams {
    pub object_error: u32,
    pub object_buffer: u32,
    pub gpfifo_offset: u64,
    pub gpfifo_entries: u32,
    pub flags: u32,
    pub context_share: u32,
    pub h_vaspace: u32,
    pub userd_memory: [u32; NV_MAX_SUBDEVICES],
    pub userd_offset: [u64; NV_MAX_SUBDEVICES],
    pub engine_type: u32,
    pub cid: u32,
    pub sub_device_id: u32,
    pub object_ecc_error: u32,
    pub instance_mem: NvMemoryDescParams,
    pub userd_mem: NvMemoryDescParams,
    pub ramfc_mem: NvMemoryDescParams,
    pub mthdbuf_mem: NvMemoryDescParams,
    pub phys_channel_group: u32,
    pub internal_flags: u32,
    pub error_notifier_mem: NvMemoryDescParams,
    pub ecc_error_notifier_mem: NvMemoryDescParams,
    pub process_id: u32,
    pub sub_process_id: u32,
}

/// `NVB0B5_ALLOCATION_PARAMETERS` (`clb0b5sw.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nvb0b5AllocationParameters {
    pub version: u32,
    pub engine_type: u32,
}

/// Falcon engine allocation parameters: `NV_BSP_ALLOCATION_PARAMETERS`,
/// `NV_MSENC_ALLOCATION_PARAMETERS`, `NV_NVJPG_ALLOCATION_PARAMETERS` and
/// `NV_OFA_ALLOCATION_PARAMETERS` share this layout (`nvos.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NvFalconAllocationParameters {
    pub size: u32,
    pub prohibit_multiple_instances: u32,
    pub engine_instance: u32,
}

// `NV2080_ENGINE_TYPE_*` (`cl2080_notification.h`).
pub const fn engine_type_copy(instance: u32) -> u32 {
    0x09 + instance
}
pub const fn engine_type_nvdec(instance: u32) -> u32 {
    0x13 + instance
}
pub const fn engine_type_nvenc(instance: u32) -> u32 {
    0x1b + instance
}
pub const fn engine_type_nvjpeg(instance: u32) -> u32 {
    0x2b + instance
}
pub const fn engine_type_ofa(instance: u32) -> u32 {
    0x33 + instance
}
pub const NV2080_ENGINE_TYPE_VIC: u32 = 0x24;

// `NV2080_NOTIFIERS_*` (`cl2080_notification.h`).
pub const fn notifier_ce(instance: u32) -> u32 {
    106 + instance
}
pub const fn notifier_nvdec(instance: u32) -> u32 {
    122 + instance
}
pub const fn notifier_nvenc(instance: u32) -> u32 {
    118 + instance
}
pub const fn notifier_nvjpeg(instance: u32) -> u32 {
    134 + instance
}
pub const fn notifier_ofa(instance: u32) -> u32 {
    142 + instance
}

/// `NV00DE_ALLOC_PARAMETERS` (`cl00de.h`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv00deAllocParameters {
    pub polled_data_mask: u64,
}

/// `NV00DE_CTRL_CMD_REQUEST_DATA_POLL` (`ctrl00de.h`).
pub const NV00DE_CTRL_CMD_REQUEST_DATA_POLL: u32 = 0xde_0001;
pub const NV00DE_RUSD_POLL_CLOCK: u64 = 1 << 0;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv00deCtrlRequestDataPollParams {
    pub polled_data_mask: u64,
}

/// Clock section of `NV00DE_SHARED_DATA` (`cl00de.h`), seqlock-protected.
/// Narrowed to the polled-clock subset this crate requests.
pub const RUSD_CLK_PUBLIC_DOMAIN_GRAPHICS: usize = 0;
pub const RUSD_CLK_PUBLIC_DOMAIN_MCLK: usize = 1;
pub const RUSD_CLK_PUBLIC_DOMAIN_VIDEO: usize = 2;
pub const RUSD_CLK_PUBLIC_DOMAIN_COUNT: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RusdClkPublicDomainInfo {
    pub target_clk_mhz: u32,
    pub actual_clk_mhz: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv00deSharedData {
    pub seq: u64,
    pub clk_public_domain_infos: [RusdClkPublicDomainInfo; RUSD_CLK_PUBLIC_DOMAIN_COUNT],
}

/// `NV0000_CTRL_CMD_OS_UNIX_FLUSH_USER_CACHE` (`ctrl0000unix.h`).
pub const NV0000_CTRL_CMD_OS_UNIX_FLUSH_USER_CACHE: u32 = 0x3d02;
pub const NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_FLUSH: u32 = 1;
pub const NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_INVALIDATE: u32 = 2;
pub const NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_FLUSH_INVALIDATE: u32 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Nv0000CtrlOsUnixFlushUserCacheParams {
    pub offset: u64,
    pub length: u64,
    pub cache_ops: u32,
    pub device: u32,
    pub object: u32,
}
