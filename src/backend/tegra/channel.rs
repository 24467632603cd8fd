// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tegra channels.
//!
//! Multimedia engines are host1x clients: one syncpoint per channel, jobs
//! submitted either through the legacy per-engine nvhost node or the DRM job
//! interface. The copy engine is a GPU unit and goes through an nvgpu GPFIFO
//! channel bound to the device's address space and TSG.

use std::os::fd::RawFd;

use log::debug;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;

use super::device::TegraDevice;
use super::ioctl::*;
use crate::cmdbuf::{CmdbufKind, CommandBuffer};
use crate::error::{Error, Result};
use crate::{Engine, Fence};

/// Ring size requested for nvgpu copy channels, in GP entries.
const GPFIFO_RING_ENTRIES: u32 = 0x2000;

/// Kernel-side job timeout for host1x submissions.
const SUBMIT_TIMEOUT_MS: u32 = 1000;

fn engine_chardev(engine: Engine) -> Result<(&'static str, u32)> {
    Ok(match engine {
        Engine::Nvdec => ("/dev/nvhost-nvdec", NVHOST_MODULE_NVDEC),
        Engine::Nvenc => ("/dev/nvhost-msenc", NVHOST_MODULE_MSENC),
        Engine::Nvjpg => ("/dev/nvhost-nvjpg", NVHOST_MODULE_NVJPG),
        Engine::Ofa => ("/dev/nvhost-ofa", NVHOST_MODULE_OFA),
        Engine::Vic => ("/dev/nvhost-vic", NVHOST_MODULE_VIC),
        Engine::Host | Engine::Copy => return Err(Error::InvalidArgument),
    })
}

pub(crate) struct Host1xChannel {
    /// Legacy nvhost channel node. On the DRM path this only serves the
    /// clock-rate ioctls and may be absent.
    pub fd: RawFd,
    /// DRM channel context; zero on the legacy path.
    pub drm_context: u32,
    module_id: u32,
    pub syncpt: u32,
    drm: bool,
}

impl Host1xChannel {
    pub fn new(dev: &TegraDevice, engine: Engine) -> Result<Host1xChannel> {
        let (path, module_id) = engine_chardev(engine)?;
        let flags = OFlag::O_RDWR | OFlag::O_SYNC | OFlag::O_CLOEXEC;

        let mut channel =
            Host1xChannel { fd: -1, drm_context: 0, module_id, syncpt: 0, drm: dev.is_drm() };

        if channel.drm {
            let class = engine.host1x_class().ok_or(Error::InvalidArgument)?;
            let mut open_args = DrmTegraChannelOpen { host1x_class: class, ..Default::default() };
            unsafe { drm_tegra_channel_open(dev.host_fd, &mut open_args) }.map_err(Error::from)?;
            channel.drm_context = open_args.context;

            let res = (|| -> Result<()> {
                let mut syncpt = DrmTegraSyncpointAllocate::default();
                unsafe { drm_tegra_syncpoint_allocate(dev.host_fd, &mut syncpt) }
                    .map_err(Error::from)?;
                channel.syncpt = syncpt.id;

                // The chardev still carries the clock-rate ioctls on kernels
                // that expose both interfaces; without it the kernel's own
                // frequency governor is in charge.
                channel.fd = open(path, flags, Mode::empty()).unwrap_or(-1);
                if channel.fd >= 0 {
                    channel.set_clock_rate(u32::MAX)?;
                }
                Ok(())
            })();
            if let Err(e) = res {
                channel.finalize(dev);
                return Err(e);
            }
        } else {
            channel.fd = open(path, flags, Mode::empty()).map_err(Error::from)?;

            let res = (|| -> Result<()> {
                let mut syncpt = NvhostGetParamArg::default();
                unsafe { nvhost_channel_get_syncpoint(channel.fd, &mut syncpt) }
                    .map_err(Error::from)?;
                channel.syncpt = syncpt.value;

                let timeout = NvhostSetTimeoutArgs { timeout: SUBMIT_TIMEOUT_MS };
                unsafe { nvhost_channel_set_timeout(channel.fd, &timeout) }.map_err(Error::from)?;

                channel.set_clock_rate(u32::MAX)
            })();
            if let Err(e) = res {
                channel.finalize(dev);
                return Err(e);
            }
        }

        debug!(
            "tegra: {} channel on {path}, syncpt {}",
            if channel.drm { "drm" } else { "nvhost" },
            channel.syncpt
        );
        Ok(channel)
    }

    pub fn finalize(&mut self, dev: &TegraDevice) {
        if self.drm {
            if self.syncpt != 0 {
                let mut args = DrmTegraSyncpointFree { id: self.syncpt, padding: 0 };
                let _ = unsafe { drm_tegra_syncpoint_free(dev.host_fd, &mut args) };
                self.syncpt = 0;
            }
            if self.drm_context != 0 {
                let mut args = DrmTegraChannelClose { context: self.drm_context, padding: 0 };
                let _ = unsafe { drm_tegra_channel_close(dev.host_fd, &mut args) };
                self.drm_context = 0;
            }
        }
        if self.fd >= 0 {
            let _ = nix::unistd::close(self.fd);
            self.fd = -1;
        }
    }

    pub fn submit(
        &mut self,
        dev: &TegraDevice,
        engine: Engine,
        cmdbuf: &mut CommandBuffer,
    ) -> Result<Fence> {
        // Close the job with one op-done syncpoint increment in its own
        // gather; the returned fence is its threshold.
        cmdbuf.begin(engine)?;
        cmdbuf.add_syncpt_incr(self.syncpt)?;
        cmdbuf.end()?;

        if self.drm {
            let gather_data_words = cmdbuf.num_words();
            let gather_data_ptr = cmdbuf.words_ptr() as u64;
            let CmdbufKind::Host1x(hx) = cmdbuf.kind_mut() else {
                return Err(Error::InvalidArgument);
            };

            let mut args = DrmTegraChannelSubmit {
                context: self.drm_context,
                num_bufs: hx.bufs.len() as u32,
                num_cmds: hx.cmds.len() as u32,
                gather_data_words,
                bufs_ptr: hx.bufs.as_ptr() as u64,
                cmds_ptr: hx.cmds.as_ptr() as u64,
                gather_data_ptr,
                syncpt: DrmTegraSubmitSyncpt { id: self.syncpt, increments: 1, ..Default::default() },
                ..Default::default()
            };
            unsafe { drm_tegra_channel_submit(dev.host_fd, &mut args) }.map_err(Error::from)?;
            Ok(Fence::new(self.syncpt, args.syncpt.value))
        } else {
            let CmdbufKind::Host1x(hx) = cmdbuf.kind_mut() else {
                return Err(Error::InvalidArgument);
            };

            let mut args = NvhostSubmitArgs {
                submit_version: NVHOST_SUBMIT_VERSION_V2,
                num_syncpt_incrs: hx.syncpt_incrs.len() as u32,
                num_cmdbufs: hx.cmdbufs.len() as u32,
                num_relocs: hx.relocs.len() as u32,
                syncpt_incrs: hx.syncpt_incrs.as_ptr() as u64,
                cmdbuf_exts: hx.cmdbuf_exts.as_ptr() as u64,
                reloc_types: hx.reloc_types.as_ptr() as u64,
                cmdbufs: hx.cmdbufs.as_ptr() as u64,
                relocs: hx.relocs.as_ptr() as u64,
                reloc_shifts: hx.reloc_shifts.as_ptr() as u64,
                class_ids: hx.class_ids.as_ptr() as u64,
                fences: hx.fences.as_ptr() as u64,
                ..Default::default()
            };
            unsafe { nvhost_channel_submit(self.fd, &mut args) }.map_err(Error::from)?;
            Ok(Fence::new(self.syncpt, args.fence))
        }
    }

    pub fn get_clock_rate(&self) -> Result<u32> {
        if self.fd < 0 {
            return Err(Error::NotImplemented);
        }
        let mut args = NvhostClkRateArgs { rate: 0, moduleid: self.module_id };
        unsafe { nvhost_channel_get_clk_rate(self.fd, &mut args) }.map_err(Error::from)?;
        Ok(args.rate)
    }

    pub fn set_clock_rate(&self, rate: u32) -> Result<()> {
        if self.fd < 0 {
            return Err(Error::NotImplemented);
        }
        let args = NvhostClkRateArgs { rate, moduleid: self.module_id };
        unsafe { nvhost_channel_set_clk_rate(self.fd, &args) }.map_err(Error::from)?;
        Ok(())
    }
}

pub(crate) struct TegraGpfifoChannel {
    pub fd: RawFd,
}

impl TegraGpfifoChannel {
    pub fn new(dev: &TegraDevice) -> Result<TegraGpfifoChannel> {
        let mut open_args = NvgpuGpuOpenChannelArgs { primary: -1, padding: [0; 3] };
        unsafe { nvgpu_gpu_open_channel(dev.gpu_ctrl_fd, &mut open_args) }.map_err(Error::from)?;

        let mut channel = TegraGpfifoChannel { fd: open_args.primary };

        let res = (|| -> Result<()> {
            let nvmap = NvgpuSetNvmapFdArgs { fd: dev.nvmap_fd as u32 };
            unsafe { nvgpu_channel_set_nvmap_fd(channel.fd, &nvmap) }.map_err(Error::from)?;

            let mut bind = NvgpuAsBindChannelArgs { channel_fd: channel.fd as u32 };
            unsafe { nvgpu_as_bind_channel(dev.as_fd, &mut bind) }.map_err(Error::from)?;

            unsafe { nvgpu_tsg_bind_channel(dev.tsg_fd, &channel.fd) }.map_err(Error::from)?;

            let mut setup = NvgpuChannelSetupBindArgs {
                num_gpfifo_entries: GPFIFO_RING_ENTRIES,
                ..Default::default()
            };
            unsafe { nvgpu_channel_setup_bind(channel.fd, &mut setup) }.map_err(Error::from)?;

            let mut obj =
                NvgpuAllocObjCtxArgs { class_num: dev.copy_class, ..Default::default() };
            unsafe { nvgpu_channel_alloc_obj_ctx(channel.fd, &mut obj) }.map_err(Error::from)?;
            Ok(())
        })();
        if let Err(e) = res {
            channel.finalize(dev);
            return Err(e);
        }

        Ok(channel)
    }

    pub fn finalize(&mut self, _dev: &TegraDevice) {
        if self.fd >= 0 {
            let _ = nix::unistd::close(self.fd);
            self.fd = -1;
        }
    }

    pub fn submit(&mut self, _dev: &TegraDevice, cmdbuf: &mut CommandBuffer) -> Result<Fence> {
        let CmdbufKind::Gpfifo(gp) = cmdbuf.kind() else { return Err(Error::InvalidArgument) };

        let mut args = NvgpuSubmitGpfifoArgs {
            gpfifo: gp.entries.as_ptr() as u64,
            num_entries: gp.entries.len() as u32,
            flags: NVGPU_SUBMIT_GPFIFO_FLAGS_FENCE_GET,
            fence: NvgpuFence::default(),
        };
        unsafe { nvgpu_channel_submit_gpfifo(self.fd, &mut args) }.map_err(Error::from)?;
        Ok(Fence::new(args.fence.id, args.fence.value))
    }
}
