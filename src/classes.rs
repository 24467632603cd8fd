// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware method tables for the engine classes this crate drives.
//!
//! Offsets and field layouts mirror the vendor class headers; each module
//! names its source. Only the methods the crate actually emits are listed.

pub mod copy;
pub mod gpfifo;
pub mod host1x;
pub mod video;
