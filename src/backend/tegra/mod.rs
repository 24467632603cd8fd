// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tegra SoC backend.
//!
//! Multimedia engines hang off the host1x command fabric and are reached
//! either through the legacy per-engine nvhost character devices or, on
//! kernels that expose it, the Tegra DRM job interface (preferred). The copy
//! engine lives on the GPU proper and is driven through nvgpu GPFIFO
//! channels. Memory comes from nvmap in both cases.

pub mod channel;
pub mod device;
pub mod ioctl;
pub mod map;

pub(crate) use channel::{Host1xChannel, TegraGpfifoChannel};
pub(crate) use device::{create_device, probe, TegraDevice};
pub(crate) use map::TegraMapRaw;
