// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Memory objects with optional CPU and GPU views.
//!
//! A [`Map`] owns (or wraps) a backing allocation and tracks where it is
//! visible: a CPU virtual address, a pitch-linear GPU address, and for
//! framebuffer usage a second block-linear GPU address over the same pages.
//! Engines that live behind their own IOMMU context additionally need the map
//! *pinned* to the consuming channel; the pin table records one engine-side
//! id per channel and is consulted when command buffers emit relocations.

use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};

use libc::c_void;

use crate::channel::Channel;
use crate::device::{BackendDevice, Device, DeviceInner};
use crate::error::{Error, Result};
use crate::{CacheFlags, CpuCache, Engine, MapFlags, MAP_ALIGN};

/// Attributes shared by both backends' map representations.
#[derive(Debug)]
pub(crate) struct MapState {
    pub flags: MapFlags,
    pub size: usize,
    pub handle: u32,
    pub cpu_addr: *mut c_void,
    pub gpu_addr_pitch: u64,
    pub gpu_addr_block: u64,
    pub own_mem: bool,
}

impl Default for MapState {
    fn default() -> Self {
        Self {
            flags: MapFlags::default(),
            size: 0,
            handle: 0,
            cpu_addr: std::ptr::null_mut(),
            gpu_addr_pitch: 0,
            gpu_addr_block: 0,
            own_mem: true,
        }
    }
}

/// One entry of the pin table. Pins never own their channel: they carry the
/// channel's device-unique serial for identity and just enough kernel state to
/// undo the mapping.
#[derive(Debug)]
pub(crate) struct Pin {
    pub channel: u64,
    pub engine: Engine,
    pub id: u64,
    pub token: PinToken,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PinToken {
    /// DRM channel mapping: undone through the render node.
    DrmMapping { context: u32, mapping: u32 },
    /// Legacy nvhost mapping: undone through the channel fd.
    HostIova { fd: RawFd },
}

/// Backend payload of a map.
pub(crate) enum RawMap {
    #[cfg(feature = "rm")]
    Rm(crate::backend::rm::RmMapRaw),
    #[cfg(feature = "tegra")]
    Tegra(crate::backend::tegra::TegraMapRaw),
}

impl RawMap {
    pub fn state(&self) -> &MapState {
        match self {
            #[cfg(feature = "rm")]
            RawMap::Rm(raw) => &raw.state,
            #[cfg(feature = "tegra")]
            RawMap::Tegra(raw) => &raw.state,
        }
    }
}

pub(crate) struct MapInner {
    pub device: Arc<DeviceInner>,
    pub raw: RawMap,
    pub pins: Mutex<Vec<Pin>>,
}

// A MapInner is shared between the owning Map, command buffers and channels.
// The raw CPU pointer refers to a process-wide mapping whose accesses are
// synchronized by the submission contract (no mutation between submit and
// fence signal), so handing the pointer across threads is sound.
unsafe impl Send for MapInner {}
unsafe impl Sync for MapInner {}

impl MapInner {
    pub fn state(&self) -> &MapState {
        self.raw.state()
    }

    pub fn size(&self) -> usize {
        self.state().size
    }

    pub fn cpu_addr(&self) -> *mut c_void {
        self.state().cpu_addr
    }

    pub fn gpu_addr_pitch(&self) -> u64 {
        self.state().gpu_addr_pitch
    }

    pub fn gpu_addr_block(&self) -> u64 {
        self.state().gpu_addr_block
    }

    /// Engine-side id of the pin registered by any channel driving `engine`.
    /// Command buffers know their current engine, not the submitting channel.
    pub fn find_pin_by_engine(&self, engine: Engine) -> Option<u64> {
        self.pins.lock().unwrap().iter().find(|p| p.engine == engine).map(|p| p.id)
    }
}

impl Drop for MapInner {
    fn drop(&mut self) {
        // Unpin in reverse registration order, then tear down the views.
        let pins = std::mem::take(&mut *self.pins.lock().unwrap());
        for pin in pins.iter().rev() {
            match &self.raw {
                #[cfg(feature = "rm")]
                RawMap::Rm(_) => {}
                #[cfg(feature = "tegra")]
                RawMap::Tegra(raw) => {
                    if let BackendDevice::Tegra(dev) = &self.device.backend {
                        dev.unpin(raw, pin);
                    }
                }
            }
        }

        match &mut self.raw {
            #[cfg(feature = "rm")]
            RawMap::Rm(raw) => {
                if let BackendDevice::Rm(dev) = &self.device.backend {
                    raw.finalize(dev);
                }
            }
            #[cfg(feature = "tegra")]
            RawMap::Tegra(raw) => {
                if let BackendDevice::Tegra(dev) = &self.device.backend {
                    raw.finalize(dev);
                }
            }
        }
    }
}

/// A memory object with optional CPU and GPU virtual mappings.
pub struct Map {
    pub(crate) inner: Arc<MapInner>,
}

fn validate_layout(size: usize, align: usize) -> Result<usize> {
    if size == 0 || align == 0 || !align.is_power_of_two() {
        return Err(Error::InvalidArgument);
    }
    // The engine command stream ignores the low 8 address bits.
    Ok(align.max(MAP_ALIGN))
}

impl Map {
    /// Allocates fresh backing memory of at least `size` bytes.
    pub fn new(device: &Device, size: usize, align: usize, flags: MapFlags) -> Result<Map> {
        let align = validate_layout(size, align)?;
        let inner = Self::allocate(&device.inner, size, align, flags)?;
        Ok(Map { inner: Arc::new(inner) })
    }

    /// Wraps an existing virtual range instead of allocating.
    ///
    /// # Safety
    ///
    /// `addr` must be valid for reads and writes of `size` bytes and stay
    /// alive until the map is dropped; the hardware will DMA into it.
    pub unsafe fn from_ptr(
        device: &Device,
        addr: *mut c_void,
        size: usize,
        align: usize,
        flags: MapFlags,
    ) -> Result<Map> {
        if addr.is_null() {
            return Err(Error::InvalidArgument);
        }
        let _ = validate_layout(size, align)?;
        let raw = match &device.inner.backend {
            #[cfg(feature = "rm")]
            BackendDevice::Rm(dev) => {
                RawMap::Rm(crate::backend::rm::RmMapRaw::from_ptr(dev, addr, size, flags)?)
            }
            #[cfg(feature = "tegra")]
            BackendDevice::Tegra(dev) => {
                RawMap::Tegra(crate::backend::tegra::TegraMapRaw::from_ptr(dev, addr, size, flags)?)
            }
        };
        Ok(Map {
            inner: Arc::new(MapInner {
                device: Arc::clone(&device.inner),
                raw,
                pins: Mutex::new(Vec::new()),
            }),
        })
    }

    fn allocate(
        device: &Arc<DeviceInner>,
        size: usize,
        align: usize,
        flags: MapFlags,
    ) -> Result<MapInner> {
        let raw = match &device.backend {
            #[cfg(feature = "rm")]
            BackendDevice::Rm(dev) => {
                RawMap::Rm(crate::backend::rm::RmMapRaw::allocate(dev, size, align, flags)?)
            }
            #[cfg(feature = "tegra")]
            BackendDevice::Tegra(dev) => {
                RawMap::Tegra(crate::backend::tegra::TegraMapRaw::allocate(dev, size, align, flags)?)
            }
        };
        Ok(MapInner { device: Arc::clone(device), raw, pins: Mutex::new(Vec::new()) })
    }

    /// Grows the map in place: the handle keeps its identity, the storage is
    /// replaced. Previously registered pins are re-established on the new
    /// storage (their engine-side ids will differ) and CPU contents are
    /// carried over. Shrinking is not supported.
    pub fn realloc(&mut self, size: usize, align: usize) -> Result<()> {
        if size <= self.inner.size() {
            return Err(Error::InvalidArgument);
        }
        let align = validate_layout(size, align)?;

        let new = Arc::new(Self::allocate(
            &self.inner.device,
            size,
            align,
            self.inner.state().flags,
        )?);

        // Re-pin in registration order. Failure drops `new`, whose partial
        // pins unwind in its destructor; the original map is untouched.
        {
            let old_pins = self.inner.pins.lock().unwrap();
            let mut new_pins = new.pins.lock().unwrap();
            for pin in old_pins.iter() {
                new_pins.push(pin_like(&new, pin)?);
            }
        }

        let src = self.inner.cpu_addr();
        let dst = new.cpu_addr();
        if !src.is_null() && !dst.is_null() {
            // The size check above makes old the minimum, but take min()
            // anyway in case the check is ever relaxed.
            let len = self.inner.size().min(new.size());
            unsafe { std::ptr::copy_nonoverlapping(src as *const u8, dst as *mut u8, len) };
        }

        // The old storage is finalized when its last user (e.g. an in-flight
        // command buffer) lets go of it.
        self.inner = new;
        Ok(())
    }

    /// Registers this map with `channel`'s engine context. Idempotent per
    /// channel: a second pin returns success without mutation. Engines that
    /// share the device address space need no pin and record nothing.
    pub fn pin(&self, channel: &Channel) -> Result<()> {
        // Held across the backend call: pinning is off the hot path and this
        // keeps the check-then-insert atomic.
        let mut pins = self.inner.pins.lock().unwrap();
        if pins.iter().any(|p| p.channel == channel.serial()) {
            return Ok(());
        }

        match (&self.inner.device.backend, &self.inner.raw) {
            #[cfg(feature = "rm")]
            (BackendDevice::Rm(_), RawMap::Rm(_)) => {
                // All engines resolve through the single device vaspace.
                Ok(())
            }
            #[cfg(feature = "tegra")]
            (BackendDevice::Tegra(dev), RawMap::Tegra(raw)) => {
                if !channel.engine().is_multimedia() {
                    return Ok(());
                }
                if let Some(pin) = dev.pin(raw, channel)? {
                    pins.push(pin);
                }
                Ok(())
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::Fault),
        }
    }

    /// Performs CPU cache maintenance over `[offset, offset + len)`.
    ///
    /// Only cacheable CPU views need real work; write-combined views get a
    /// store fence, and uncached or unmapped views return immediately.
    pub fn cache_op(&self, offset: usize, len: usize, flags: CacheFlags) -> Result<()> {
        if !flags.is_valid() || offset.checked_add(len).map_or(true, |end| end > self.inner.size())
        {
            return Err(Error::InvalidArgument);
        }

        match self.inner.state().flags.cpu() {
            CpuCache::Cacheable => match (&self.inner.device.backend, &self.inner.raw) {
                #[cfg(feature = "rm")]
                (BackendDevice::Rm(dev), RawMap::Rm(raw)) => raw.cache_op(dev, offset, len, flags),
                #[cfg(feature = "tegra")]
                (BackendDevice::Tegra(dev), RawMap::Tegra(raw)) => {
                    raw.cache_op(dev, offset, len, flags)
                }
                #[allow(unreachable_patterns)]
                _ => Err(Error::Fault),
            },
            CpuCache::WriteCombine => {
                crate::utils::write_fence();
                Ok(())
            }
            CpuCache::Uncacheable | CpuCache::Unmapped => Ok(()),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size()
    }

    pub fn handle(&self) -> u32 {
        self.inner.state().handle
    }

    pub fn flags(&self) -> MapFlags {
        self.inner.state().flags
    }

    /// CPU view, or null when the map was created CPU-unmapped.
    pub fn cpu_addr(&self) -> *mut c_void {
        self.inner.cpu_addr()
    }

    /// Pitch-linear GPU address, or 0 when the map is GPU-unmapped.
    pub fn gpu_addr(&self) -> u64 {
        self.inner.gpu_addr_pitch()
    }

    /// CPU view as a byte slice, when mapped.
    ///
    /// # Safety
    ///
    /// The caller must ensure no engine writes the range for the lifetime of
    /// the returned slice and that cache maintenance has been performed.
    pub unsafe fn as_slice(&self) -> Option<&[u8]> {
        let addr = self.inner.cpu_addr();
        if addr.is_null() {
            None
        } else {
            Some(std::slice::from_raw_parts(addr as *const u8, self.inner.size()))
        }
    }

    /// Mutable CPU view, with the same caveats as [`Map::as_slice`].
    ///
    /// # Safety
    ///
    /// See [`Map::as_slice`]; additionally nothing else may alias the range.
    pub unsafe fn as_mut_slice(&self) -> Option<&mut [u8]> {
        let addr = self.inner.cpu_addr();
        if addr.is_null() {
            None
        } else {
            Some(std::slice::from_raw_parts_mut(addr as *mut u8, self.inner.size()))
        }
    }

}

/// Re-establishes `pin` for the freshly reallocated `map`.
fn pin_like(map: &Arc<MapInner>, pin: &Pin) -> Result<Pin> {
    match (&map.device.backend, &map.raw) {
        #[cfg(feature = "tegra")]
        (BackendDevice::Tegra(dev), RawMap::Tegra(raw)) => dev.repin(raw, pin),
        #[allow(unreachable_patterns)]
        _ => Err(Error::Fault),
    }
}
