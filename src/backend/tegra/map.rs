// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tegra memory objects, backed by nvmap.
//!
//! An nvmap handle is allocated (or wrapped around caller memory), exported
//! as a dmabuf for mmap() and GPU mapping, and optionally imported as a GEM
//! handle when the DRM job interface is in use. The GPU view goes through the
//! nvgpu address space with an explicit page-table kind: pitch by default,
//! plus the chip's block-linear kind for framebuffer usage.

use libc::c_void;
use log::warn;
use nix::sys::mman::{mmap, munmap, MapFlags as MmanFlags, ProtFlags};

use super::device::TegraDevice;
use super::ioctl::*;
use crate::error::{Error, Result};
use crate::map::MapState;
use crate::{CacheFlags, CpuCache, GpuCache, MapFlags, Usage};

pub(crate) struct TegraMapRaw {
    pub state: MapState,
    /// dmabuf exported from the nvmap handle.
    pub fd: i32,
    /// GEM import of the dmabuf, on the DRM path.
    pub gem: u32,
    /// Address registered with the driver for cache maintenance. Differs
    /// from `cpu_addr` for wrapped memory: the driver only accepts its own
    /// mapping there, while clients keep using their original pointer.
    pub cache_op_addr: *mut c_void,
}

fn nvmap_handle_flags(flags: MapFlags) -> u32 {
    match flags.cpu() {
        CpuCache::Uncacheable => NVMAP_HANDLE_UNCACHEABLE,
        CpuCache::Unmapped | CpuCache::WriteCombine => NVMAP_HANDLE_WRITE_COMBINE,
        CpuCache::Cacheable => NVMAP_HANDLE_CACHEABLE,
    }
}

fn nvmap_heap_mask(flags: MapFlags) -> u32 {
    match flags.usage() {
        Usage::Generic | Usage::Framebuffer => NVMAP_HEAP_CARVEOUT_GENERIC,
        Usage::Engine | Usage::Cmdbuf => NVMAP_HEAP_IOVMM,
    }
}

fn nvmap_cache_op_kind(flags: CacheFlags) -> Option<i32> {
    if flags == CacheFlags::WRITEBACK {
        Some(NVMAP_CACHE_OP_WB)
    } else if flags == CacheFlags::INVALIDATE {
        Some(NVMAP_CACHE_OP_INV)
    } else if flags == CacheFlags::WRITEBACK | CacheFlags::INVALIDATE {
        Some(NVMAP_CACHE_OP_WB_INV)
    } else {
        None
    }
}

impl TegraMapRaw {
    pub fn allocate(dev: &TegraDevice, size: usize, align: usize, flags: MapFlags) -> Result<Self> {
        let mut create = NvmapCreateHandle { size_or_fd: size as u32, handle: 0 };
        unsafe { nvmap_create(dev.nvmap_fd, &mut create) }.map_err(Error::from)?;

        let mut raw = TegraMapRaw {
            state: MapState { flags, size, handle: create.handle, ..Default::default() },
            fd: -1,
            gem: 0,
            cache_op_addr: std::ptr::null_mut(),
        };

        let views = (|| -> Result<()> {
            let alloc = NvmapAllocHandle {
                handle: raw.state.handle,
                heap_mask: nvmap_heap_mask(flags),
                flags: nvmap_handle_flags(flags) | MEM_TAG,
                align: align as u32,
            };
            unsafe { nvmap_alloc(dev.nvmap_fd, &alloc) }.map_err(Error::from)?;

            raw.export(dev)?;
            if flags.cpu() != CpuCache::Unmapped {
                raw.map_cpu(dev)?;
            }
            if flags.gpu() != GpuCache::Unmapped {
                raw.map_gpu(dev)?;
            }
            raw.cache_op_addr = raw.state.cpu_addr;

            if dev.is_drm() {
                raw.gem = dev.gem_import(raw.fd)?;
            }
            Ok(())
        })();
        if let Err(e) = views {
            raw.finalize(dev);
            return Err(e);
        }

        Ok(raw)
    }

    pub fn from_ptr(
        dev: &TegraDevice,
        addr: *mut c_void,
        size: usize,
        flags: MapFlags,
    ) -> Result<Self> {
        let mut create = NvmapCreateHandleFromVa {
            va: addr as u64,
            size: size as u32,
            flags: nvmap_handle_flags(flags) | MEM_TAG,
            handle: 0,
        };
        unsafe { nvmap_from_va(dev.nvmap_fd, &mut create) }.map_err(Error::from)?;

        let mut raw = TegraMapRaw {
            state: MapState {
                flags,
                size,
                handle: create.handle,
                own_mem: false,
                ..Default::default()
            },
            fd: -1,
            gem: 0,
            cache_op_addr: std::ptr::null_mut(),
        };

        let views = (|| -> Result<()> {
            raw.export(dev)?;
            if flags.cpu() != CpuCache::Unmapped {
                raw.map_cpu(dev)?;
            }
            if flags.gpu() != GpuCache::Unmapped {
                raw.map_gpu(dev)?;
            }

            // The driver-side mapping of wrapped memory faults on access with
            // recent kernels, but cache maintenance only accepts a registered
            // address. Keep the driver mapping for maintenance and hand the
            // caller's own pointer back out.
            raw.cache_op_addr = raw.state.cpu_addr;
            raw.state.cpu_addr =
                if flags.cpu() != CpuCache::Unmapped { addr } else { std::ptr::null_mut() };

            if dev.is_drm() {
                raw.gem = dev.gem_import(raw.fd)?;
            }
            Ok(())
        })();
        if let Err(e) = views {
            raw.finalize(dev);
            return Err(e);
        }

        Ok(raw)
    }

    /// Exports the nvmap handle as a dmabuf fd.
    fn export(&mut self, dev: &TegraDevice) -> Result<()> {
        let mut args = NvmapCreateHandle { size_or_fd: 0, handle: self.state.handle };
        unsafe { nvmap_get_fd(dev.nvmap_fd, &mut args) }.map_err(Error::from)?;
        self.fd = args.size_or_fd as i32;
        Ok(())
    }

    fn map_cpu(&mut self, _dev: &TegraDevice) -> Result<()> {
        let len = std::num::NonZeroUsize::new(self.state.size).ok_or(Error::InvalidArgument)?;
        let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(self.fd) };
        let addr = unsafe {
            mmap(None, len, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, MmanFlags::MAP_SHARED, fd, 0)
        }
        .map_err(Error::from)?;
        self.state.cpu_addr = addr.as_ptr();
        Ok(())
    }

    fn map_gpu(&mut self, dev: &TegraDevice) -> Result<()> {
        let cacheable = self.state.flags.gpu() == GpuCache::Cacheable;
        self.state.gpu_addr_pitch = self.map_buffer(dev, cacheable, true)?;
        if self.state.flags.usage() == Usage::Framebuffer {
            self.state.gpu_addr_block = self.map_buffer(dev, cacheable, false)?;
        }
        Ok(())
    }

    /// Maps the dmabuf into the GPU address space with an explicit page-table
    /// kind.
    fn map_buffer(&self, dev: &TegraDevice, cacheable: bool, pitch: bool) -> Result<u64> {
        let mut args = NvgpuAsMapBufferExArgs {
            flags: if cacheable { NVGPU_AS_MAP_BUFFER_FLAGS_CACHEABLE } else { 0 }
                | NVGPU_AS_MAP_BUFFER_FLAGS_DIRECT_KIND_CTRL,
            compr_kind: NV_KIND_INVALID,
            incompr_kind: if pitch { 0 } else { dev.bl_kind },
            dmabuf_fd: self.fd as u32,
            page_size: dev.page_size as u32,
            ..Default::default()
        };
        unsafe { nvgpu_as_map_buffer_ex(dev.as_fd, &mut args) }.map_err(Error::from)?;
        Ok(args.offset)
    }

    fn unmap_gpu(&mut self, dev: &TegraDevice) {
        for addr in [self.state.gpu_addr_pitch, self.state.gpu_addr_block] {
            if addr == 0 {
                continue;
            }
            let mut args = NvgpuAsUnmapBufferArgs { offset: addr };
            if let Err(e) = unsafe { nvgpu_as_unmap_buffer(dev.as_fd, &mut args) } {
                warn!("tegra: as unmap failed: {e}");
            }
        }
        self.state.gpu_addr_pitch = 0;
        self.state.gpu_addr_block = 0;
    }

    fn unmap_cpu(&mut self) {
        // The driver mapping lives in cache_op_addr both for owned and
        // wrapped memory; the caller's pointer is never ours to unmap.
        if !self.cache_op_addr.is_null() {
            let addr = std::ptr::NonNull::new(self.cache_op_addr).unwrap();
            if let Err(e) = unsafe { munmap(addr, self.state.size) } {
                warn!("tegra: munmap failed: {e}");
            }
        }
        self.cache_op_addr = std::ptr::null_mut();
        self.state.cpu_addr = std::ptr::null_mut();
    }

    pub fn cache_op(
        &self,
        dev: &TegraDevice,
        offset: usize,
        len: usize,
        flags: CacheFlags,
    ) -> Result<()> {
        let op = nvmap_cache_op_kind(flags).ok_or(Error::InvalidArgument)?;
        let args = NvmapCacheOp {
            addr: self.cache_op_addr as u64 + offset as u64,
            handle: self.state.handle,
            len: len as u32,
            op,
        };
        unsafe { nvmap_cache(dev.nvmap_fd, &args) }.map_err(Error::from)?;
        Ok(())
    }

    pub fn finalize(&mut self, dev: &TegraDevice) {
        if self.state.handle == 0 {
            return;
        }

        self.unmap_gpu(dev);
        self.unmap_cpu();

        if self.gem != 0 {
            dev.gem_close(self.gem);
            self.gem = 0;
        }
        if self.fd >= 0 {
            let _ = nix::unistd::close(self.fd);
            self.fd = -1;
        }

        let _ = unsafe { nvmap_free(dev.nvmap_fd, self.state.handle as i32) };
        self.state.handle = 0;
    }
}
