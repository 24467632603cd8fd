// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The root handle: backend probing, hardware discovery, and fence waits.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use log::info;

use crate::constraints::CodecSupport;
use crate::error::{Error, Result};
use crate::{DriverKind, Fence, NvdecGeneration, NvencGeneration, NvjpgGeneration};

/// Backend payload of a device.
pub(crate) enum BackendDevice {
    #[cfg(feature = "rm")]
    Rm(crate::backend::rm::RmDevice),
    #[cfg(feature = "tegra")]
    Tegra(crate::backend::tegra::TegraDevice),
}

pub(crate) struct DeviceInner {
    pub driver: DriverKind,
    pub page_size: usize,
    pub nvdec: NvdecGeneration,
    pub nvenc: NvencGeneration,
    pub nvjpg: NvjpgGeneration,
    pub support: CodecSupport,
    /// Decoded surfaces use the Tegra16x16 layout instead of GOB tiling on
    /// early decoder generations.
    pub tegra_layout: bool,
    /// Source of device-unique channel identities for the pin tables.
    pub channel_serial: AtomicU64,
    pub backend: BackendDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub is_tegra: bool,
    pub driver: DriverKind,
    pub nvdec: NvdecGeneration,
    pub nvenc: NvencGeneration,
    pub nvjpg: NvjpgGeneration,
    /// Decoded surfaces use the 16x16 Tegra tiling instead of GOB
    /// block-linear on early decoder generations.
    pub tegra_surface_layout: bool,
}

/// The root handle. Probes which kernel interface is present, owns the
/// process-global address-space and semaphore/syncpoint resources, and
/// implements fence wait and poll. Vends [`crate::Channel`]s and
/// [`crate::Map`]s through their constructors.
pub struct Device {
    pub(crate) inner: Arc<DeviceInner>,
}

impl Device {
    /// Probes backends in order (discrete GPU first, then Tegra) and brings
    /// the first one that responds fully up. Fails with
    /// [`Error::NotImplemented`] when neither kernel interface exists.
    pub fn new() -> Result<Device> {
        let page_size = page_size()?;

        #[cfg(feature = "rm")]
        if crate::backend::rm::probe() {
            info!("probed resource-manager backend");
            return Ok(Device { inner: Arc::new(crate::backend::rm::create_device(page_size)?) });
        }

        #[cfg(feature = "tegra")]
        if crate::backend::tegra::probe() {
            info!("probed tegra backend");
            return Ok(Device { inner: Arc::new(crate::backend::tegra::create_device(page_size)?) });
        }

        Err(Error::NotImplemented)
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            is_tegra: matches!(self.inner.driver, DriverKind::Tegra),
            driver: self.inner.driver,
            nvdec: self.inner.nvdec,
            nvenc: self.inner.nvenc,
            nvjpg: self.inner.nvjpg,
            tegra_surface_layout: self.inner.tegra_layout,
        }
    }

    /// Allocation granularity of the kernel interface.
    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Blocks until `fence` signals or `timeout_us` elapses.
    ///
    /// Fence id 0 is reserved-invalid on every backend.
    pub fn wait_fence(&self, fence: Fence, timeout_us: u64) -> Result<()> {
        if fence.id() == 0 {
            return Err(Error::InvalidArgument);
        }
        match &self.inner.backend {
            #[cfg(feature = "rm")]
            BackendDevice::Rm(dev) => dev.wait(fence, timeout_us),
            #[cfg(feature = "tegra")]
            BackendDevice::Tegra(dev) => dev.wait(fence, timeout_us),
        }
    }

    /// Reads the hardware counter behind `fence` once and reports whether it
    /// has reached the fence value (wrapping comparison). Never blocks.
    pub fn poll_fence(&self, fence: Fence) -> Result<bool> {
        if fence.id() == 0 {
            return Err(Error::InvalidArgument);
        }
        match &self.inner.backend {
            #[cfg(feature = "rm")]
            BackendDevice::Rm(dev) => dev.poll(fence),
            #[cfg(feature = "tegra")]
            BackendDevice::Tegra(dev) => dev.poll(fence),
        }
    }

    /// Hardware decode limits for a codec / subsampling / bit-depth triple.
    pub fn decode_constraints(
        &self,
        codec: crate::Codec,
        subsampling: crate::Subsampling,
        depth: u32,
    ) -> Result<crate::DecodeConstraints> {
        crate::constraints::decode_constraints(&self.inner, codec, subsampling, depth)
    }
}

fn page_size() -> Result<usize> {
    match nix::unistd::sysconf(nix::unistd::SysconfVar::PAGE_SIZE) {
        Ok(Some(sz)) if sz > 0 => Ok(sz as usize),
        Ok(_) => Err(Error::NotImplemented),
        Err(errno) => Err(errno.into()),
    }
}
