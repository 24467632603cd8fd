// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! User-space submission library for the multimedia engines of NVIDIA GPUs:
//! the video decoder (nvdec), encoder (nvenc), still-image codec (nvjpg),
//! optical flow accelerator (ofa), video image compositor (vic) and the
//! asynchronous copy engine.
//!
//! Two kernel backends hide behind one API: the discrete-GPU resource-manager
//! driver and the Tegra nvhost/DRM driver. A [`Device`] probes whichever is
//! present, vends [`Channel`]s (one hardware execution context per engine) and
//! [`Map`]s (memory objects with CPU/GPU views), and waits on [`Fence`]s
//! produced by channel submission. Method streams are assembled through
//! [`CommandBuffer`], which encodes the backend wire format.

#[cfg(not(any(feature = "rm", feature = "tegra")))]
compile_error!("at least one backend feature (`rm` or `tegra`) must be enabled");

pub mod classes;
pub mod regs;

mod backend;
mod channel;
mod cmdbuf;
mod constraints;
mod device;
mod dfs;
mod error;
mod map;
mod surface;
mod utils;

pub use channel::Channel;
pub use cmdbuf::CommandBuffer;
pub use constraints::DecodeConstraints;
pub use device::{Device, DeviceInfo};
pub use error::{Error, Result};
pub use map::Map;
pub use surface::{surface_transfer, SurfaceInfo};

/// Minimum alignment for any [`Map`]: the multimedia engine command stream
/// ignores the low 8 bits of buffer addresses.
pub const MAP_ALIGN: usize = 1 << 8;

/// Tiled surface widths must cover a whole GOB, which is 64 bytes wide.
pub const fn surface_width_align(bytes_per_pixel: u32) -> u32 {
    64 / bytes_per_pixel
}

/// Tiled surface heights must be a multiple of two GOB heights, doubled so the
/// requirement also holds for the subsampled chroma plane.
pub const fn surface_height_align() -> u32 {
    32
}

/// A named functional unit on the GPU or SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// The GPU frontend itself; valid inside command buffers only.
    Host,
    Copy,
    Nvdec,
    Nvenc,
    Nvjpg,
    Ofa,
    Vic,
}

impl Engine {
    /// Whether this engine is one of the multimedia falcons (as opposed to the
    /// host frontend or the copy engine, which live on the GPU proper).
    pub fn is_multimedia(self) -> bool {
        matches!(self, Engine::Nvdec | Engine::Nvenc | Engine::Nvjpg | Engine::Ofa | Engine::Vic)
    }

    pub(crate) fn host1x_class(self) -> Option<u32> {
        Some(match self {
            Engine::Host => classes::host1x::CLASS_HOST1X,
            Engine::Nvdec => classes::host1x::CLASS_NVDEC,
            Engine::Nvenc => classes::host1x::CLASS_NVENC,
            Engine::Nvjpg => classes::host1x::CLASS_NVJPG,
            Engine::Ofa => classes::host1x::CLASS_OFA,
            Engine::Vic => classes::host1x::CLASS_VIC,
            Engine::Copy => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Mjpeg,
    Mpeg1,
    Mpeg2,
    Mpeg4,
    Vc1,
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
}

/// Chroma subsampling of a decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsampling {
    Monochrome,
    S420,
    S422,
    S440,
    S444,
}

/// CPU view cacheability of a [`Map`]. Field of [`MapFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuCache {
    #[default]
    Cacheable = 0,
    WriteCombine = 1,
    Uncacheable = 2,
    /// No CPU mapping is established at all.
    Unmapped = 3,
}

/// GPU view cacheability of a [`Map`]. Field of [`MapFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuCache {
    #[default]
    Cacheable = 0,
    Uncacheable = 1,
    /// No GPU mapping is established at all.
    Unmapped = 2,
}

/// Physical placement of a [`Map`]'s backing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    /// System memory.
    #[default]
    Host = 0,
    /// Video memory.
    Device = 1,
}

/// What a [`Map`] is for; selects page size, heap and page-table kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Usage {
    #[default]
    Generic = 0,
    /// Image memory; carries both a pitch-linear and a block-linear GPU view.
    Framebuffer = 1,
    Engine = 2,
    Cmdbuf = 3,
}

/// Bit-packed allocation flags: CPU mode in bits 0..4, GPU mode in bits 4..8,
/// usage in bits 8..12, location in bits 12..16. Each field is an enum, not a
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapFlags(u32);

impl MapFlags {
    pub const fn new(cpu: CpuCache, gpu: GpuCache, location: Location, usage: Usage) -> Self {
        Self((cpu as u32) | ((gpu as u32) << 4) | ((usage as u32) << 8) | ((location as u32) << 12))
    }

    pub fn cpu(self) -> CpuCache {
        match self.0 & 0xf {
            0 => CpuCache::Cacheable,
            1 => CpuCache::WriteCombine,
            2 => CpuCache::Uncacheable,
            _ => CpuCache::Unmapped,
        }
    }

    pub fn gpu(self) -> GpuCache {
        match (self.0 >> 4) & 0xf {
            0 => GpuCache::Cacheable,
            1 => GpuCache::Uncacheable,
            _ => GpuCache::Unmapped,
        }
    }

    pub fn usage(self) -> Usage {
        match (self.0 >> 8) & 0xf {
            0 => Usage::Generic,
            1 => Usage::Framebuffer,
            2 => Usage::Engine,
            _ => Usage::Cmdbuf,
        }
    }

    pub fn location(self) -> Location {
        match (self.0 >> 12) & 0xf {
            0 => Location::Host,
            _ => Location::Device,
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Rebuilds flags from a packed word, rejecting out-of-range fields.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !0xffff != 0
            || bits & 0xf > 3
            || (bits >> 4) & 0xf > 2
            || (bits >> 8) & 0xf > 3
            || (bits >> 12) & 0xf > 1
        {
            return Err(Error::InvalidArgument);
        }
        Ok(Self(bits))
    }
}

/// Cache-maintenance request, a combination of [`CacheFlags::WRITEBACK`] and
/// [`CacheFlags::INVALIDATE`]. The empty combination is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFlags(u32);

impl CacheFlags {
    pub const WRITEBACK: CacheFlags = CacheFlags(1 << 0);
    pub const INVALIDATE: CacheFlags = CacheFlags(1 << 1);

    pub fn contains(self, other: CacheFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub(crate) fn is_valid(self) -> bool {
        self.0 != 0 && self.0 & !3 == 0
    }

    #[cfg(test)]
    pub(crate) fn empty_for_test() -> CacheFlags {
        CacheFlags(0)
    }
}

impl std::ops::BitOr for CacheFlags {
    type Output = CacheFlags;
    fn bitor(self, rhs: CacheFlags) -> CacheFlags {
        CacheFlags(self.0 | rhs.0)
    }
}

/// Which GPU view of a target a relocation resolves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    Default,
    Pitch,
    Tiled,
}

/// Completion token for one submission: `(id << 32) | value`, where `id`
/// selects a semaphore cell (discrete GPU) or a syncpoint (Tegra) and `value`
/// is the threshold the counter must reach. Counters wrap; all comparisons are
/// modulo 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fence(u64);

impl Fence {
    pub const fn new(id: u32, value: u32) -> Self {
        Self(((id as u64) << 32) | value as u64)
    }

    pub const fn id(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn value(self) -> u32 {
        self.0 as u32
    }

    pub const fn into_raw(self) -> u64 {
        self.0
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Whether a counter currently at `current` satisfies this fence, under
    /// wrapping comparison (deltas up to 2^31 - 1 order correctly).
    pub(crate) fn reached_by(self, current: u32) -> bool {
        current.wrapping_sub(self.value()) as i32 >= 0
    }
}

/// Which kernel driver a [`Device`] ended up bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Discrete-GPU resource manager (`/dev/nvidiactl`).
    Rm,
    /// Tegra nvhost/DRM (`/dev/nvmap` plus host1x or a render node).
    Tegra,
}

/// Hardware generation of the video decoder, in falcon engine numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NvdecGeneration {
    None,
    V10,
    V11,
    V20,
    V30,
    V31,
    V32,
    V40,
    V41,
    V42,
    V50,
    V51,
    V60,
    V61,
    V62,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NvencGeneration {
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NvjpgGeneration {
    None,
    V10,
    V11,
    V12,
    V13,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_flags_pack_and_unpack() {
        let flags = MapFlags::new(
            CpuCache::WriteCombine,
            GpuCache::Uncacheable,
            Location::Device,
            Usage::Cmdbuf,
        );
        assert_eq!(flags.cpu(), CpuCache::WriteCombine);
        assert_eq!(flags.gpu(), GpuCache::Uncacheable);
        assert_eq!(flags.location(), Location::Device);
        assert_eq!(flags.usage(), Usage::Cmdbuf);
        assert_eq!(flags.bits(), 0x1301 | 0x10);
        assert_eq!(MapFlags::from_bits(flags.bits()), Ok(flags));
    }

    #[test]
    fn map_flags_reject_out_of_range_fields() {
        assert!(MapFlags::from_bits(0x0004).is_err());
        assert!(MapFlags::from_bits(0x0030).is_err());
        assert!(MapFlags::from_bits(0x2000).is_err());
        assert!(MapFlags::from_bits(0x1_0000).is_err());
    }

    #[test]
    fn fence_splits_and_wraps() {
        let fence = Fence::new(7, 0xffff_fffe);
        assert_eq!(fence.id(), 7);
        assert_eq!(fence.value(), 0xffff_fffe);
        assert!(!fence.reached_by(0xffff_fffd));
        assert!(fence.reached_by(0xffff_fffe));
        // One increment past the wrap still satisfies the fence.
        assert!(fence.reached_by(1));
        // A counter half a range behind does not.
        assert!(!fence.reached_by(0x7fff_fffd));
    }

    #[test]
    fn cache_flags_validity() {
        assert!(CacheFlags::WRITEBACK.is_valid());
        assert!((CacheFlags::WRITEBACK | CacheFlags::INVALIDATE).is_valid());
        assert!(!CacheFlags(0).is_valid());
        assert!(!CacheFlags(4).is_valid());
    }
}
