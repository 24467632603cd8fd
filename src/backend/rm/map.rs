// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource-manager memory objects.
//!
//! Allocation goes through the RM memory classes (system or video memory
//! depending on location); wrapping caller memory goes through the
//! OS-descriptor heap-control escape instead. The CPU view is established by
//! mapping the memory object onto a freshly opened device fd and mmap()ing
//! that fd; the GPU view maps into the device's single virtual address space,
//! so the pitch and block addresses coincide here.

use libc::c_void;
use log::warn;
use nix::fcntl::{open, OFlag};
use nix::sys::mman::{mmap, munmap, MapFlags as MmanFlags, ProtFlags};
use nix::sys::stat::Mode;

use super::device::RmDevice;
use super::ioctl::*;
use super::Object;
use crate::error::{Error, Result};
use crate::map::MapState;
use crate::{CacheFlags, CpuCache, GpuCache, Location, MapFlags, Usage};

#[derive(Default)]
pub(crate) struct RmMapRaw {
    pub state: MapState,
    pub object: Object,
    /// Driver-side cookie of the CPU mapping, needed to undo it.
    pub linear_address: u64,
}

fn memory_class(flags: MapFlags) -> u32 {
    match flags.location() {
        Location::Host => NV01_MEMORY_SYSTEM,
        Location::Device => NV01_MEMORY_LOCAL_USER,
    }
}

/// Composes `NVOS32` attr words and allocation flags for `flags`.
fn alloc_attrs(flags: MapFlags, from_ptr: bool) -> (u32, u32, u32) {
    let cpu_coherency = match flags.cpu() {
        CpuCache::Cacheable => OS32_ATTR_COHERENCY.val(OS32_ATTR_COHERENCY_CACHED),
        CpuCache::WriteCombine => OS32_ATTR_COHERENCY.val(OS32_ATTR_COHERENCY_WRITE_COMBINE),
        CpuCache::Uncacheable | CpuCache::Unmapped => {
            OS32_ATTR_COHERENCY.val(OS32_ATTR_COHERENCY_UNCACHED)
        }
    };
    let gpu_cache = match flags.gpu() {
        GpuCache::Cacheable => OS32_ATTR2_GPU_CACHEABLE.val(OS32_ATTR2_GPU_CACHEABLE_YES),
        GpuCache::Uncacheable | GpuCache::Unmapped => {
            OS32_ATTR2_GPU_CACHEABLE.val(OS32_ATTR2_GPU_CACHEABLE_NO)
        }
    };
    let location = match flags.location() {
        Location::Host => OS32_ATTR_LOCATION.val(OS32_ATTR_LOCATION_PCI),
        Location::Device => OS32_ATTR_LOCATION.val(OS32_ATTR_LOCATION_VIDMEM),
    };

    let (mut attr, attr2, alloc_flags) = match flags.usage() {
        Usage::Generic => (
            OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_4KB)
                | OS32_ATTR_PHYSICALITY.val(OS32_ATTR_PHYSICALITY_CONTIGUOUS),
            OS32_ATTR2_ZBC.val(OS32_ATTR2_ZBC_PREFER_NO_ZBC) | gpu_cache,
            NVOS32_ALLOC_FLAGS_PERSISTENT_VIDMEM,
        ),
        Usage::Framebuffer => (
            if flags.location() == Location::Device {
                OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_HUGE)
            } else {
                OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_DEFAULT)
            } | OS32_ATTR_PHYSICALITY.val(OS32_ATTR_PHYSICALITY_NONCONTIGUOUS),
            OS32_ATTR2_ZBC.val(OS32_ATTR2_ZBC_PREFER_NO_ZBC)
                | OS32_ATTR2_PAGE_SIZE_HUGE.val(OS32_ATTR2_PAGE_SIZE_HUGE_DEFAULT)
                | gpu_cache,
            NVOS32_ALLOC_FLAGS_PERSISTENT_VIDMEM,
        ),
        Usage::Engine => (
            OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_DEFAULT)
                | OS32_ATTR_PHYSICALITY.val(OS32_ATTR_PHYSICALITY_NONCONTIGUOUS),
            OS32_ATTR2_ZBC.val(OS32_ATTR2_ZBC_PREFER_NO_ZBC) | gpu_cache,
            NVOS32_ALLOC_FLAGS_PERSISTENT_VIDMEM,
        ),
        Usage::Cmdbuf => (
            OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_4KB)
                | OS32_ATTR_PHYSICALITY.val(OS32_ATTR_PHYSICALITY_NONCONTIGUOUS),
            OS32_ATTR2_ZBC.val(OS32_ATTR2_ZBC_PREFER_NO_ZBC) | gpu_cache,
            0,
        ),
    };
    attr |= cpu_coherency | location;

    // Wrapped host memory is always treated as pageable system memory; the
    // kernel only accepts cached or write-back coherency for it.
    if from_ptr {
        attr = (attr & !OS32_ATTR_LOCATION.mask()) | OS32_ATTR_LOCATION.val(OS32_ATTR_LOCATION_PCI);
        attr = (attr & !OS32_ATTR_PAGE_SIZE.mask())
            | OS32_ATTR_PAGE_SIZE.val(OS32_ATTR_PAGE_SIZE_DEFAULT);
        attr = (attr & !OS32_ATTR_PHYSICALITY.mask())
            | OS32_ATTR_PHYSICALITY.val(OS32_ATTR_PHYSICALITY_NONCONTIGUOUS);
        if flags.cpu() != CpuCache::Cacheable {
            attr = (attr & !OS32_ATTR_COHERENCY.mask())
                | OS32_ATTR_COHERENCY.val(OS32_ATTR_COHERENCY_WRITE_BACK);
        }
    }

    (
        alloc_flags | NVOS32_ALLOC_FLAGS_ALIGNMENT_FORCE | NVOS32_ALLOC_FLAGS_MAP_NOT_REQUIRED,
        attr,
        attr2,
    )
}

impl RmMapRaw {
    /// Wraps an already allocated RM object (RUSD, usermode mmio) so it can
    /// be CPU-mapped and torn down like any other map.
    pub fn from_object(object: Object, size: usize) -> Self {
        RmMapRaw {
            state: MapState { size, handle: object.handle, ..Default::default() },
            object,
            linear_address: 0,
        }
    }

    pub fn allocate(dev: &RmDevice, size: usize, align: usize, flags: MapFlags) -> Result<Self> {
        let class = memory_class(flags);
        let (alloc_flags, attr, attr2) = alloc_attrs(flags, false);

        let mut params = NvMemoryAllocationParams {
            owner: dev.root.handle,
            type_: NVOS32_TYPE_IMAGE,
            flags: alloc_flags,
            attr,
            attr2,
            size: size as u64,
            alignment: align as u64,
            ..Default::default()
        };
        let object = dev.rm_alloc(dev.device, class, &mut params)?;

        let mut raw = RmMapRaw {
            state: MapState { flags, size, handle: object.handle, ..Default::default() },
            object,
            linear_address: 0,
        };

        let views = (|| -> Result<()> {
            if flags.cpu() != CpuCache::Unmapped {
                raw.map_cpu(dev, class == NV01_MEMORY_SYSTEM)?;
            }
            if flags.gpu() != GpuCache::Unmapped {
                raw.map_gpu(dev)?;
            }
            Ok(())
        })();
        if let Err(e) = views {
            raw.finalize(dev);
            return Err(e);
        }

        Ok(raw)
    }

    /// Wraps `addr` (caller memory) in an OS descriptor. The driver refuses
    /// to re-export such memory through its own mapping path, so the CPU view
    /// stays the caller's pointer.
    pub fn from_ptr(
        dev: &RmDevice,
        addr: *mut c_void,
        size: usize,
        flags: MapFlags,
    ) -> Result<Self> {
        let (alloc_flags, attr, attr2) = alloc_attrs(flags, true);

        let mut params = Nvos32Parameters {
            root: dev.root.handle,
            object_parent: dev.device.handle,
            function: NVOS32_FUNCTION_ALLOC_OS_DESCRIPTOR,
            alloc_os_desc: Nvos32AllocOsDesc {
                type_: NVOS32_TYPE_IMAGE,
                flags: alloc_flags,
                attr,
                attr2,
                descriptor: addr as u64,
                limit: size as u64 - 1,
                descriptor_type: NVOS32_DESCRIPTOR_TYPE_VIRTUAL_ADDRESS,
                ..Default::default()
            },
            ..Default::default()
        };
        unsafe { nv_esc_iowr(dev.ctl_fd, NV_ESC_RM_VID_HEAP_CONTROL, &mut params) }
            .map_err(Error::from)?;
        if params.status != 0 {
            return Err(Error::RmStatus(params.status));
        }

        let object = Object { handle: params.alloc_os_desc.memory, parent: dev.device.handle };
        let mut raw = RmMapRaw {
            state: MapState {
                flags,
                size,
                handle: object.handle,
                own_mem: false,
                cpu_addr: if flags.cpu() != CpuCache::Unmapped {
                    addr
                } else {
                    std::ptr::null_mut()
                },
                ..Default::default()
            },
            object,
            linear_address: 0,
        };

        if flags.gpu() != GpuCache::Unmapped {
            if let Err(e) = raw.map_gpu(dev) {
                raw.finalize(dev);
                return Err(e);
            }
        }

        Ok(raw)
    }

    /// Establishes the CPU view: maps the memory object onto a fresh device
    /// fd, then mmap()s it. `system` objects map through the control node.
    pub fn map_cpu(&mut self, dev: &RmDevice, system: bool) -> Result<()> {
        let path = if system { "/dev/nvidiactl" } else { dev.card_path.as_str() };
        let map_fd =
            open(path, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty()).map_err(Error::from)?;
        let guard = crate::utils::ScopeGuard::new(|| {
            let _ = nix::unistd::close(map_fd);
        });

        let mut params = Nvos33ParametersWithFd {
            params: Nvos33Parameters {
                client: dev.root.handle,
                device: dev.device.handle,
                memory: self.object.handle,
                offset: 0,
                length: self.state.size as u64,
                ..Default::default()
            },
            fd: map_fd,
        };
        unsafe { nv_esc_iowr(dev.ctl_fd, NV_ESC_RM_MAP_MEMORY, &mut params) }
            .map_err(Error::from)?;
        if params.params.status != 0 {
            return Err(Error::RmStatus(params.params.status));
        }
        self.linear_address = params.params.linear_address;

        let len = std::num::NonZeroUsize::new(self.state.size).ok_or(Error::InvalidArgument)?;
        let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(map_fd) };
        let addr = unsafe {
            mmap(None, len, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, MmanFlags::MAP_SHARED, fd, 0)
        }
        .map_err(Error::from)?;

        self.state.cpu_addr = addr.as_ptr();
        drop(guard);
        Ok(())
    }

    fn unmap_cpu(&mut self, dev: &RmDevice) {
        if self.state.own_mem && !self.state.cpu_addr.is_null() {
            let addr = std::ptr::NonNull::new(self.state.cpu_addr).unwrap();
            if let Err(e) = unsafe { munmap(addr, self.state.size) } {
                warn!("rm: munmap failed: {e}");
            }
        }
        self.state.cpu_addr = std::ptr::null_mut();

        if self.linear_address != 0 {
            let mut params = Nvos34Parameters {
                client: dev.root.handle,
                device: dev.subdevice.handle,
                memory: self.object.handle,
                linear_address: self.linear_address,
                ..Default::default()
            };
            let _ = unsafe { nv_esc_iowr(dev.ctl_fd, NV_ESC_RM_UNMAP_MEMORY, &mut params) };
            self.linear_address = 0;
        }
    }

    /// Establishes the GPU view. All engines share one address space, so the
    /// pitch and block addresses are the same mapping.
    pub fn map_gpu(&mut self, dev: &RmDevice) -> Result<()> {
        let mut params = Nvos46Parameters {
            client: dev.root.handle,
            device: dev.device.handle,
            dma: dev.vaspace.handle,
            memory: self.object.handle,
            offset: 0,
            length: self.state.size as u64,
            ..Default::default()
        };
        unsafe { nv_esc_iowr(dev.ctl_fd, NV_ESC_RM_MAP_MEMORY_DMA, &mut params) }
            .map_err(Error::from)?;
        if params.status != 0 {
            return Err(Error::RmStatus(params.status));
        }

        self.state.gpu_addr_pitch = params.dma_offset;
        self.state.gpu_addr_block = params.dma_offset;
        Ok(())
    }

    fn unmap_gpu(&mut self, dev: &RmDevice) {
        if self.state.gpu_addr_pitch == 0 {
            return;
        }
        let mut params = Nvos34Parameters {
            client: dev.root.handle,
            device: dev.subdevice.handle,
            memory: self.object.handle,
            linear_address: self.state.gpu_addr_pitch,
            ..Default::default()
        };
        let _ = unsafe { nv_esc_iowr(dev.ctl_fd, NV_ESC_RM_UNMAP_MEMORY, &mut params) };
        self.state.gpu_addr_pitch = 0;
        self.state.gpu_addr_block = 0;
    }

    /// CPU cache maintenance through the driver. The kernel rejects
    /// everything except invalidating cached host memory, and generic maps
    /// always live in video memory, so the other cases succeed without work.
    pub fn cache_op(
        &self,
        dev: &RmDevice,
        offset: usize,
        len: usize,
        flags: CacheFlags,
    ) -> Result<()> {
        if self.state.flags.usage() == Usage::Generic || flags != CacheFlags::INVALIDATE {
            return Ok(());
        }

        let op = if flags == CacheFlags::WRITEBACK {
            NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_FLUSH
        } else if flags == CacheFlags::INVALIDATE {
            NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_INVALIDATE
        } else if flags == CacheFlags::WRITEBACK | CacheFlags::INVALIDATE {
            NV0000_CTRL_OS_UNIX_FLAGS_USER_CACHE_FLUSH_INVALIDATE
        } else {
            return Err(Error::InvalidArgument);
        };

        dev.rm_control(
            dev.root,
            NV0000_CTRL_CMD_OS_UNIX_FLUSH_USER_CACHE,
            &mut Nv0000CtrlOsUnixFlushUserCacheParams {
                offset: offset as u64,
                length: len as u64,
                cache_ops: op,
                device: dev.device.handle,
                object: self.object.handle,
            },
        )
    }

    /// Tears down in view order: GPU, CPU, then the object itself.
    pub fn finalize(&mut self, dev: &RmDevice) {
        if self.object.handle == 0 {
            return;
        }
        self.unmap_gpu(dev);
        self.unmap_cpu(dev);
        dev.rm_free(self.object);
        self.object = Object::default();
        self.state.handle = 0;
    }
}
