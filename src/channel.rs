// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware execution contexts, one per engine.
//!
//! A channel materializes queue state for a single engine, turns a
//! [`CommandBuffer`] into a kernel submission, and returns the [`Fence`] that
//! signals its completion. Submissions on one channel execute and signal in
//! program order. The submit path is single-writer: it takes `&mut self`, and
//! clients sharing a channel across threads must serialize it themselves.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::cmdbuf::CommandBuffer;
use crate::device::{BackendDevice, Device, DeviceInner};
use crate::dfs::DfsState;
use crate::error::{Error, Result};
use crate::utils::write_fence;
use crate::{Engine, Fence};

pub(crate) enum ChannelBackend {
    #[cfg(feature = "rm")]
    Rm(crate::backend::rm::RmChannel),
    #[cfg(feature = "tegra")]
    Host1x(crate::backend::tegra::Host1xChannel),
    #[cfg(feature = "tegra")]
    TegraGpfifo(crate::backend::tegra::TegraGpfifoChannel),
}

/// A hardware execution context bound to one engine.
pub struct Channel {
    device: Arc<DeviceInner>,
    engine: Engine,
    /// Device-unique identity used by map pin tables.
    serial: u64,
    dfs: Option<DfsState>,
    backend: ChannelBackend,
}

impl Channel {
    /// Opens an execution context on `engine`. The host engine is the GPU
    /// frontend itself and cannot be a submission target.
    pub fn new(device: &Device, engine: Engine) -> Result<Channel> {
        if engine == Engine::Host {
            return Err(Error::InvalidArgument);
        }

        let serial = device.inner.channel_serial.fetch_add(1, Ordering::Relaxed) + 1;
        let backend = match &device.inner.backend {
            #[cfg(feature = "rm")]
            BackendDevice::Rm(dev) => {
                ChannelBackend::Rm(crate::backend::rm::RmChannel::new(dev, engine)?)
            }
            #[cfg(feature = "tegra")]
            BackendDevice::Tegra(dev) => {
                if engine == Engine::Copy {
                    // The copy engine lives on the GPU, not behind host1x,
                    // and is driven through a GPFIFO even on Tegra.
                    ChannelBackend::TegraGpfifo(crate::backend::tegra::TegraGpfifoChannel::new(
                        dev,
                    )?)
                } else {
                    ChannelBackend::Host1x(crate::backend::tegra::Host1xChannel::new(dev, engine)?)
                }
            }
        };

        Ok(Channel { device: Arc::clone(&device.inner), engine, serial, dfs: None, backend })
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Submits `cmdbuf` and returns the fence that signals when the engine
    /// has executed it. The buffer must stay untouched until then.
    pub fn submit(&mut self, cmdbuf: &mut CommandBuffer) -> Result<Fence> {
        // Make the method words visible to the device before it fetches them.
        if !cmdbuf.window_uncached() {
            write_fence();
        }

        match (&mut self.backend, &self.device.backend) {
            #[cfg(feature = "rm")]
            (ChannelBackend::Rm(ch), BackendDevice::Rm(dev)) => {
                ch.submit(dev, self.engine, cmdbuf)
            }
            #[cfg(feature = "tegra")]
            (ChannelBackend::Host1x(ch), BackendDevice::Tegra(dev)) => {
                ch.submit(dev, self.engine, cmdbuf)
            }
            #[cfg(feature = "tegra")]
            (ChannelBackend::TegraGpfifo(ch), BackendDevice::Tegra(dev)) => {
                ch.submit(dev, cmdbuf)
            }
            #[allow(unreachable_patterns)]
            _ => Err(Error::Fault),
        }
    }

    /// Reads the engine clock in Hz. Multimedia engines only.
    pub fn get_clock_rate(&self) -> Result<u32> {
        if !self.engine.is_multimedia() {
            return Err(Error::NotImplemented);
        }
        match (&self.backend, &self.device.backend) {
            #[cfg(feature = "rm")]
            (ChannelBackend::Rm(_), BackendDevice::Rm(dev)) => dev.read_video_clock(),
            #[cfg(feature = "tegra")]
            (ChannelBackend::Host1x(ch), BackendDevice::Tegra(_)) => ch.get_clock_rate(),
            #[allow(unreachable_patterns)]
            _ => Err(Error::NotImplemented),
        }
    }

    /// Requests an engine clock of `rate` Hz. Multimedia engines only.
    pub fn set_clock_rate(&self, rate: u32) -> Result<()> {
        if !self.engine.is_multimedia() {
            return Err(Error::NotImplemented);
        }
        match (&self.backend, &self.device.backend) {
            #[cfg(feature = "rm")]
            (ChannelBackend::Rm(_), BackendDevice::Rm(_)) => {
                // The resource manager exposes no per-engine clock control;
                // accepted so DFS clients run unchanged.
                let _ = rate;
                Ok(())
            }
            #[cfg(feature = "tegra")]
            (ChannelBackend::Host1x(ch), BackendDevice::Tegra(_)) => ch.set_clock_rate(rate),
            #[allow(unreachable_patterns)]
            _ => Err(Error::NotImplemented),
        }
    }

    /// Arms dynamic frequency scaling with the stream's nominal framerate.
    pub fn dfs_initialize(&mut self, framerate: f32) -> Result<()> {
        if !self.engine.is_multimedia() {
            return Err(Error::NotImplemented);
        }
        self.dfs = Some(DfsState::new(framerate));
        Ok(())
    }

    /// Disarms DFS and releases the clock floor.
    pub fn dfs_finalize(&mut self) -> Result<()> {
        if self.dfs.take().is_none() {
            return Err(Error::NotImplemented);
        }
        self.set_clock_rate(0)
    }

    pub fn dfs_set_damping(&mut self, damping: f64) -> Result<()> {
        self.dfs.as_mut().ok_or(Error::NotImplemented)?.set_damping(damping)
    }

    /// Accounts one decoded frame: bitstream bytes consumed and the cycle
    /// count reported by the engine.
    pub fn dfs_update(&mut self, len: u32, cycles: u32) -> Result<()> {
        self.dfs.as_mut().ok_or(Error::NotImplemented)?.update(len, cycles)
    }

    /// Closes the current sampling window, retuning the engine clock if the
    /// window was usable. Call at most once per presentation tick.
    pub fn dfs_commit(&mut self) -> Result<()> {
        let dfs = self.dfs.as_mut().ok_or(Error::NotImplemented)?;
        match dfs.commit(Instant::now()) {
            Some(clock) => self.set_clock_rate(clock),
            None => Ok(()),
        }
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn backend(&self) -> &ChannelBackend {
        &self.backend
    }

    #[cfg(feature = "rm")]
    pub(crate) fn semaphore_gpu_base(&self) -> u64 {
        match &self.device.backend {
            BackendDevice::Rm(dev) => dev.semaphore_gpu_base(),
            #[allow(unreachable_patterns)]
            _ => 0,
        }
    }

    #[cfg(feature = "tegra")]
    pub(crate) fn syncpt_window(&self) -> Option<(u64, u64)> {
        match &self.device.backend {
            BackendDevice::Tegra(dev) => dev.syncpt_window(),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    #[cfg(feature = "tegra")]
    pub(crate) fn host1x_v6(&self) -> bool {
        match &self.device.backend {
            BackendDevice::Tegra(dev) => dev.host1x_version() >= 6,
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    #[cfg(feature = "tegra")]
    pub(crate) fn is_drm(&self) -> bool {
        match &self.device.backend {
            BackendDevice::Tegra(dev) => dev.is_drm(),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        match (&mut self.backend, &self.device.backend) {
            #[cfg(feature = "rm")]
            (ChannelBackend::Rm(ch), BackendDevice::Rm(dev)) => ch.finalize(dev),
            #[cfg(feature = "tegra")]
            (ChannelBackend::Host1x(ch), BackendDevice::Tegra(dev)) => ch.finalize(dev),
            #[cfg(feature = "tegra")]
            (ChannelBackend::TegraGpfifo(ch), BackendDevice::Tegra(dev)) => ch.finalize(dev),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}
