// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tegra device bring-up: chip identification, kernel node discovery, the
//! GPU address space and syncpoint plumbing.

use std::os::fd::RawFd;
use std::sync::atomic::AtomicU64;

use log::{debug, info, warn};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

use super::ioctl::*;
use crate::channel::ChannelBackend;
use crate::constraints::CodecSupport;
use crate::device::{BackendDevice, DeviceInner};
use crate::error::{Error, Result};
use crate::map::{Pin, PinToken};
use crate::{DriverKind, Fence, NvdecGeneration, NvencGeneration, NvjpgGeneration};

/// Candidate sysfs locations of the SoC chip id, tried in order.
const CHIP_ID_PATHS: [&str; 3] = [
    "/sys/module/tegra_fuse/parameters/tegra_chip_id",
    "/sys/module/fuse/parameters/tegra_chip_id",
    "/sys/devices/soc0/soc_id",
];

pub(crate) struct TegraDevice {
    pub page_size: usize,
    pub chip_id: u32,
    host1x_version: u32,
    /// Page-table kind of block-linear mappings, chip dependent.
    pub bl_kind: i16,

    pub nvmap_fd: RawFd,
    pub gpu_ctrl_fd: RawFd,
    /// `/dev/nvhost-ctrl`, or the Tegra DRM render node when present.
    pub host_fd: RawFd,
    drm: bool,

    pub as_fd: RawFd,
    pub tsg_fd: RawFd,

    pub copy_class: u32,
    syncpt_va_base: u64,
    syncpt_page_size: u64,
}

fn chip_nvdec(chip_id: u32) -> NvdecGeneration {
    match chip_id {
        0x21 => NvdecGeneration::V20, // T210
        0x18 => NvdecGeneration::V30, // T186
        0x19 => NvdecGeneration::V40, // T194
        0x23 => NvdecGeneration::V50, // T234
        _ => NvdecGeneration::None,
    }
}

fn chip_nvjpg(chip_id: u32) -> NvjpgGeneration {
    match chip_id {
        0x21 => NvjpgGeneration::V10,
        0x18 => NvjpgGeneration::V11,
        0x19 => NvjpgGeneration::V12,
        0x23 => NvjpgGeneration::V13,
        _ => NvjpgGeneration::None,
    }
}

/// See `drivers/gpu/host1x/dev.c` for the version-per-SoC table.
fn chip_host1x(chip_id: u32) -> Option<u32> {
    match chip_id {
        0x21 => Some(5),
        0x18 => Some(6),
        0x19 => Some(7),
        0x23 => Some(8),
        _ => None,
    }
}

fn chip_block_linear_kind(chip_id: u32) -> Option<i16> {
    match chip_id {
        // NV_MMU_PTE_KIND_GENERIC_16BX2
        0x21 | 0x18 | 0x19 => Some(0xfe),
        // NV_MMU_PTE_KIND_GENERIC_MEMORY
        0x23 => Some(0x06),
        _ => None,
    }
}

fn read_chip_id() -> Option<u32> {
    for path in CHIP_ID_PATHS {
        let Ok(contents) = std::fs::read_to_string(path) else { continue };
        let trimmed = contents.trim();
        let parsed = if let Some(hex) = trimmed.strip_prefix("0x") {
            u32::from_str_radix(hex, 16).ok()
        } else {
            trimmed.parse().ok()
        };
        if let Some(id) = parsed {
            return Some(id);
        }
    }
    None
}

/// Finds the Tegra DRM render node, if one exists.
fn open_drm_node() -> Option<RawFd> {
    let entries = std::fs::read_dir("/dev/dri").ok()?;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("renderD") {
            continue;
        }
        let Ok(fd) = open(&entry.path(), OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty()) else {
            continue;
        };

        let mut name = [0u8; 0x20];
        let mut version =
            DrmVersion { name_len: name.len(), name: name.as_mut_ptr() as u64, ..Default::default() };
        if unsafe { drm_version(fd, &mut version) }.is_ok() && name.starts_with(b"tegra") {
            return Some(fd);
        }
        let _ = nix::unistd::close(fd);
    }
    None
}

pub(crate) fn probe() -> bool {
    if std::path::Path::new("/dev/nvmap").exists() {
        std::path::Path::new("/dev/nvhost-ctrl").exists()
            || std::path::Path::new("/dev/dri").exists()
    } else {
        false
    }
}

pub(crate) fn create_device(page_size: usize) -> Result<DeviceInner> {
    let mut dev = TegraDevice {
        page_size,
        chip_id: 0,
        host1x_version: 0,
        bl_kind: 0,
        nvmap_fd: -1,
        gpu_ctrl_fd: -1,
        host_fd: -1,
        drm: false,
        as_fd: -1,
        tsg_fd: -1,
        copy_class: 0,
        syncpt_va_base: 0,
        syncpt_page_size: 0,
    };

    match dev.initialize() {
        Ok(()) => {}
        Err(e) => {
            dev.teardown();
            return Err(e);
        }
    }

    let nvdec = chip_nvdec(dev.chip_id);
    Ok(DeviceInner {
        driver: DriverKind::Tegra,
        page_size,
        nvdec,
        nvenc: NvencGeneration::None,
        nvjpg: chip_nvjpg(dev.chip_id),
        support: CodecSupport::default(),
        tegra_layout: nvdec <= NvdecGeneration::V20,
        channel_serial: AtomicU64::new(0),
        backend: BackendDevice::Tegra(dev),
    })
}

impl TegraDevice {
    fn initialize(&mut self) -> Result<()> {
        self.chip_id = read_chip_id().ok_or(Error::NotImplemented)?;
        self.host1x_version = chip_host1x(self.chip_id).ok_or(Error::NotImplemented)?;
        self.bl_kind = chip_block_linear_kind(self.chip_id).ok_or(Error::NotImplemented)?;

        let flags = OFlag::O_RDWR | OFlag::O_SYNC | OFlag::O_CLOEXEC;
        self.nvmap_fd = open("/dev/nvmap", flags, Mode::empty()).map_err(Error::from)?;
        self.gpu_ctrl_fd = open("/dev/nvhost-ctrl-gpu", flags, Mode::empty()).map_err(Error::from)?;

        if let Some(fd) = open_drm_node() {
            self.host_fd = fd;
            self.drm = true;
        } else {
            self.host_fd = open("/dev/nvhost-ctrl", flags, Mode::empty()).map_err(Error::from)?;
        }

        // GPU characteristics: ring sizes, class ids and syncpoint support.
        let mut characteristics = NvgpuGpuCharacteristics::default();
        let mut args = NvgpuGpuGetCharacteristicsArgs {
            gpu_characteristics_buf_size: std::mem::size_of::<NvgpuGpuCharacteristics>() as u64,
            gpu_characteristics_buf_addr: &mut characteristics as *mut _ as u64,
        };
        unsafe { nvgpu_gpu_get_characteristics(self.gpu_ctrl_fd, &mut args) }
            .map_err(Error::from)?;

        if characteristics.flags & NVGPU_GPU_FLAGS_HAS_SYNCPOINTS == 0 {
            return Err(Error::NotImplemented);
        }
        self.copy_class = characteristics.dma_copy_class;

        // One GPU address space for the copy channel and map GPU views.
        let mut as_args = NvgpuAllocAsArgs {
            big_page_size: characteristics.big_page_size,
            va_range_start: 0x0004000000,
            va_range_end: 0x2000000000,
            ..Default::default()
        };
        unsafe { nvgpu_gpu_alloc_as(self.gpu_ctrl_fd, &mut as_args) }.map_err(Error::from)?;
        self.as_fd = as_args.as_fd;

        let mut tsg_args = NvgpuGpuOpenTsgArgs::default();
        unsafe { nvgpu_gpu_open_tsg(self.gpu_ctrl_fd, &mut tsg_args) }.map_err(Error::from)?;
        self.tsg_fd = tsg_args.tsg_fd;

        // Read-only syncpoint aperture, when this kernel exposes one; lets
        // the copy engine wait on syncpoints without host methods.
        if characteristics.flags & NVGPU_GPU_FLAGS_SUPPORT_SYNCPOINT_ADDRESS != 0 {
            let mut ro_map = NvgpuAsGetSyncRoMapArgs::default();
            unsafe { nvgpu_as_get_sync_ro_map(self.as_fd, &mut ro_map) }.map_err(Error::from)?;
            self.syncpt_va_base = ro_map.base_gpuva;
            self.syncpt_page_size = ro_map.sync_size as u64;
        }

        info!(
            "tegra: chip {:#x} host1x v{} {} copy class {:#x}",
            self.chip_id,
            self.host1x_version,
            if self.drm { "drm" } else { "nvhost" },
            self.copy_class
        );
        Ok(())
    }

    fn teardown(&mut self) {
        for fd in [self.tsg_fd, self.as_fd, self.host_fd, self.gpu_ctrl_fd, self.nvmap_fd] {
            if fd >= 0 {
                let _ = nix::unistd::close(fd);
            }
        }
        self.tsg_fd = -1;
        self.as_fd = -1;
        self.host_fd = -1;
        self.gpu_ctrl_fd = -1;
        self.nvmap_fd = -1;
    }

    pub fn is_drm(&self) -> bool {
        self.drm
    }

    pub fn host1x_version(&self) -> u32 {
        self.host1x_version
    }

    pub fn syncpt_window(&self) -> Option<(u64, u64)> {
        if self.syncpt_va_base != 0 {
            Some((self.syncpt_va_base, self.syncpt_page_size))
        } else {
            None
        }
    }

    // Fence wait and poll delegate to the kernel's syncpoint primitives.

    pub fn wait(&self, fence: Fence, timeout_us: u64) -> Result<()> {
        if self.drm {
            // The deadline is absolute on the monotonic clock.
            let ts = nix::time::clock_gettime(nix::time::ClockId::CLOCK_MONOTONIC)
                .map_err(Error::from)?;
            let now = ts.tv_sec() as i64 * 1_000_000_000 + ts.tv_nsec() as i64;
            let mut args = DrmTegraSyncpointWait {
                timeout_ns: now.saturating_add(timeout_us.saturating_mul(1000) as i64),
                id: fence.id(),
                threshold: fence.value(),
                ..Default::default()
            };
            match unsafe { drm_tegra_syncpoint_wait(self.host_fd, &mut args) } {
                Ok(_) => Ok(()),
                Err(Errno::ETIMEDOUT) => Err(Error::Timeout),
                Err(errno) => Err(errno.into()),
            }
        } else {
            let mut args = NvhostCtrlSyncptWaitexArgs {
                id: fence.id(),
                thresh: fence.value(),
                timeout: timeout_us.min(i32::MAX as u64) as i32,
                value: 0,
            };
            match unsafe { nvhost_ctrl_syncpt_waitex(self.host_fd, &mut args) } {
                Ok(_) => Ok(()),
                Err(Errno::EAGAIN) | Err(Errno::ETIMEDOUT) => Err(Error::Timeout),
                Err(errno) => Err(errno.into()),
            }
        }
    }

    pub fn poll(&self, fence: Fence) -> Result<bool> {
        let value = if self.drm {
            // A wait with threshold zero is satisfied immediately and reports
            // the live counter value.
            let mut args = DrmTegraSyncpointWait { id: fence.id(), ..Default::default() };
            unsafe { drm_tegra_syncpoint_wait(self.host_fd, &mut args) }.map_err(Error::from)?;
            args.value
        } else {
            let mut args = NvhostCtrlSyncptReadArgs { id: fence.id(), value: 0 };
            unsafe { nvhost_ctrl_syncpt_read(self.host_fd, &mut args) }.map_err(Error::from)?;
            args.value
        };
        Ok(fence.reached_by(value))
    }

    // Pinning: registering a map with a channel's engine context.

    /// Establishes an engine-side mapping of `raw` for `channel`. Returns
    /// `None` when this path has nothing to record (the kernel will relocate
    /// instead).
    pub fn pin(
        &self,
        raw: &super::map::TegraMapRaw,
        channel: &crate::channel::Channel,
    ) -> Result<Option<Pin>> {
        let ChannelBackend::Host1x(ch) = channel.backend() else {
            return Ok(None);
        };

        if self.drm {
            let mut args = DrmTegraChannelMap {
                context: ch.drm_context,
                handle: raw.gem,
                flags: DRM_TEGRA_CHANNEL_MAP_READ_WRITE,
                mapping: 0,
            };
            unsafe { drm_tegra_channel_map(self.host_fd, &mut args) }.map_err(Error::from)?;
            Ok(Some(Pin {
                channel: channel.serial(),
                engine: channel.engine(),
                id: args.mapping as u64,
                token: PinToken::DrmMapping { context: ch.drm_context, mapping: args.mapping },
            }))
        } else {
            let mut buffer =
                NvhostChannelBuffer { handle: raw.state.handle, reserved: 0, address: 0 };
            let mut args = NvhostChannelMapBufferArgs {
                num_buffers: 1,
                reserved: 0,
                table_address: &mut buffer as *mut _ as u64,
            };
            unsafe { nvhost_channel_map_buffer(ch.fd, &mut args) }.map_err(Error::from)?;
            Ok(Some(Pin {
                channel: channel.serial(),
                engine: channel.engine(),
                id: buffer.address,
                token: PinToken::HostIova { fd: ch.fd },
            }))
        }
    }

    /// Re-establishes `pin` for a reallocated map, producing a fresh
    /// engine-side id on the same channel.
    pub fn repin(&self, raw: &super::map::TegraMapRaw, pin: &Pin) -> Result<Pin> {
        match pin.token {
            PinToken::DrmMapping { context, .. } => {
                let mut args = DrmTegraChannelMap {
                    context,
                    handle: raw.gem,
                    flags: DRM_TEGRA_CHANNEL_MAP_READ_WRITE,
                    mapping: 0,
                };
                unsafe { drm_tegra_channel_map(self.host_fd, &mut args) }.map_err(Error::from)?;
                Ok(Pin {
                    channel: pin.channel,
                    engine: pin.engine,
                    id: args.mapping as u64,
                    token: PinToken::DrmMapping { context, mapping: args.mapping },
                })
            }
            PinToken::HostIova { fd } => {
                let mut buffer =
                    NvhostChannelBuffer { handle: raw.state.handle, reserved: 0, address: 0 };
                let mut args = NvhostChannelMapBufferArgs {
                    num_buffers: 1,
                    reserved: 0,
                    table_address: &mut buffer as *mut _ as u64,
                };
                unsafe { nvhost_channel_map_buffer(fd, &mut args) }.map_err(Error::from)?;
                Ok(Pin {
                    channel: pin.channel,
                    engine: pin.engine,
                    id: buffer.address,
                    token: PinToken::HostIova { fd },
                })
            }
        }
    }

    pub fn unpin(&self, raw: &super::map::TegraMapRaw, pin: &Pin) {
        match pin.token {
            PinToken::DrmMapping { context, mapping } => {
                let mut args = DrmTegraChannelUnmap { context, mapping };
                if let Err(e) = unsafe { drm_tegra_channel_unmap(self.host_fd, &mut args) } {
                    debug!("tegra: channel unmap failed: {e}");
                }
            }
            PinToken::HostIova { fd } => {
                let mut buffer = NvhostChannelBuffer {
                    handle: raw.state.handle,
                    reserved: 0,
                    address: pin.id,
                };
                let mut args = NvhostChannelMapBufferArgs {
                    num_buffers: 1,
                    reserved: 0,
                    table_address: &mut buffer as *mut _ as u64,
                };
                // The channel may already be gone; its teardown released the
                // mapping with it.
                if let Err(e) = unsafe { nvhost_channel_unmap_buffer(fd, &mut args) } {
                    debug!("tegra: buffer unmap failed: {e}");
                }
            }
        }
    }

    /// Imports an nvmap dmabuf into a GEM handle on the render node.
    pub fn gem_import(&self, dmabuf_fd: RawFd) -> Result<u32> {
        let mut args = DrmPrimeHandle { handle: 0, flags: 0, fd: dmabuf_fd };
        unsafe { drm_prime_fd_to_handle(self.host_fd, &mut args) }.map_err(Error::from)?;
        Ok(args.handle)
    }

    pub fn gem_close(&self, gem: u32) {
        let args = DrmGemClose { handle: gem, pad: 0 };
        if let Err(e) = unsafe { drm_gem_close(self.host_fd, &args) } {
            warn!("tegra: gem close failed: {e}");
        }
    }
}

impl Drop for TegraDevice {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_tables_are_consistent() {
        for chip in [0x21u32, 0x18, 0x19, 0x23] {
            assert_ne!(chip_nvdec(chip), NvdecGeneration::None);
            assert_ne!(chip_nvjpg(chip), NvjpgGeneration::None);
            assert!(chip_host1x(chip).is_some());
            assert!(chip_block_linear_kind(chip).is_some());
        }
        assert_eq!(chip_nvdec(0x42), NvdecGeneration::None);
        assert!(chip_host1x(0x42).is_none());
    }

    #[test]
    fn early_decoders_use_the_tegra_surface_layout() {
        assert!(chip_nvdec(0x21) <= NvdecGeneration::V20);
        assert!(chip_nvdec(0x18) > NvdecGeneration::V20);
    }
}
