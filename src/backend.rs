// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Kernel backends.
//!
//! A backend owns the file descriptors and driver objects of one kernel
//! interface and implements the device, map and channel operations over it.
//! Probing order is fixed: the discrete-GPU resource manager first, then
//! Tegra.

#[cfg(feature = "rm")]
pub mod rm;
#[cfg(feature = "tegra")]
pub mod tegra;
