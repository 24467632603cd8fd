// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware decode limits per codec, subsampling and bit depth.
//!
//! The numbers follow the vendor decode libraries (nvcuvid for the discrete
//! GPUs, the L4T multimedia stack for NVJPG). Unsupported combinations are a
//! successful answer with `supported == false`, not an error: only an
//! unknown codec is invalid.

use crate::device::DeviceInner;
use crate::error::Result;
use crate::{Codec, NvdecGeneration, NvjpgGeneration, Subsampling};

/// Per-codec capability bits discovered at device initialization.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CodecSupport {
    pub vp8_unsupported: bool,
    pub vp9_unsupported: bool,
    pub vp9_high_depth_unsupported: bool,
    pub h264_unsupported: bool,
    pub hevc_unsupported: bool,
    pub av1_unsupported: bool,
}

/// Decoder generation from the low byte pair of the engine class id.
pub(crate) fn nvdec_generation_from_class(class: u32) -> NvdecGeneration {
    match (class >> 8) & 0xff {
        0xa0 => NvdecGeneration::V10, // Kepler
        0xb0 => NvdecGeneration::V11, // Maxwell A
        0xb6 => NvdecGeneration::V20, // Maxwell B
        0xc1 => NvdecGeneration::V30, // Pascal A
        0xc2 => NvdecGeneration::V31, // Pascal B
        0xc3 => NvdecGeneration::V32, // Volta
        0xc4 => NvdecGeneration::V40, // Turing
        0xc6 => NvdecGeneration::V41, // Ampere A
        0xb8 => NvdecGeneration::V42, // Hopper
        0xc7 => NvdecGeneration::V50, // Ampere B
        0xc9 => NvdecGeneration::V51, // Ada
        0xcd => NvdecGeneration::V60, // Blackwell A
        0xcf => NvdecGeneration::V61, // Blackwell B
        _ => NvdecGeneration::None,
    }
}

/// Decode limits for one codec / subsampling / depth combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeConstraints {
    pub supported: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Maximum picture size in 16x16 macroblocks.
    pub max_mbs: u32,
}

impl DecodeConstraints {
    fn supported(
        min_width: u32,
        min_height: u32,
        max_width: u32,
        max_height: u32,
        max_mbs: u32,
    ) -> Self {
        DecodeConstraints { supported: true, min_width, min_height, max_width, max_height, max_mbs }
    }

    const UNSUPPORTED: DecodeConstraints = DecodeConstraints {
        supported: false,
        min_width: 0,
        min_height: 0,
        max_width: 0,
        max_height: 0,
        max_mbs: 0,
    };
}

pub(crate) fn decode_constraints(
    device: &DeviceInner,
    codec: Codec,
    subsampling: Subsampling,
    depth: u32,
) -> Result<DecodeConstraints> {
    lookup(device.nvdec, device.nvjpg, &device.support, codec, subsampling, depth)
}

fn lookup(
    nvdec: NvdecGeneration,
    nvjpg: NvjpgGeneration,
    support: &CodecSupport,
    codec: Codec,
    subsampling: Subsampling,
    depth: u32,
) -> Result<DecodeConstraints> {
    use DecodeConstraints as C;
    use Subsampling as S;

    if depth != 8 && depth != 10 && depth != 12 {
        return Ok(C::UNSUPPORTED);
    }

    // The relevant engine must exist at all.
    match codec {
        Codec::Mjpeg => {
            if nvjpg == NvjpgGeneration::None {
                return Ok(C::UNSUPPORTED);
            }
        }
        _ => {
            if nvdec == NvdecGeneration::None {
                return Ok(C::UNSUPPORTED);
            }
        }
    }

    let constraints = match codec {
        Codec::Mjpeg => {
            if depth != 8 || nvjpg > NvjpgGeneration::V13 {
                C::UNSUPPORTED
            } else {
                C::supported(0x10, 0x10, 0x4000, 0x4000, u32::MAX)
            }
        }

        Codec::Mpeg1 | Codec::Mpeg2 => {
            if depth != 8 || subsampling != S::S420 {
                C::UNSUPPORTED
            } else {
                C::supported(0x30, 0x10, 0xff0, 0xff0, 0xff00)
            }
        }

        Codec::Mpeg4 | Codec::Vc1 => {
            if depth != 8 || subsampling != S::S420 {
                C::UNSUPPORTED
            } else {
                C::supported(0x30, 0x10, 0x7f0, 0x7f0, 0x2000)
            }
        }

        Codec::H264 => {
            if support.h264_unsupported {
                C::UNSUPPORTED
            } else if nvdec >= NvdecGeneration::V60 {
                if depth > 10 || !matches!(subsampling, S::S420 | S::S422) {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x30, 0x40, 0x2000, 0x2000, 0x40000)
                }
            } else if depth > 8 || subsampling != S::S420 {
                C::UNSUPPORTED
            } else {
                C::supported(0x30, 0x10, 0x1000, 0x1000, 0x10000)
            }
        }

        Codec::H265 => {
            if support.hevc_unsupported {
                C::UNSUPPORTED
            } else if nvdec >= NvdecGeneration::V60 {
                if !matches!(subsampling, S::S420 | S::S422 | S::S444) {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x90, 0x90, 0x2000, 0x2000, 0x40000)
                }
            } else if nvdec >= NvdecGeneration::V40 {
                if !matches!(subsampling, S::S420 | S::S444) {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x90, 0x90, 0x2000, 0x2000, 0x40000)
                }
            } else if nvdec >= NvdecGeneration::V31 {
                if subsampling != S::S420 {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x90, 0x90, 0x2000, 0x2000, 0x40000)
                }
            } else if nvdec <= NvdecGeneration::V30 {
                if subsampling != S::S420 {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x90, 0x90, 0x1000, 0x1000, 0x10000)
                }
            } else if nvdec >= NvdecGeneration::V20 {
                if subsampling != S::S420 || depth > 10 {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x90, 0x90, 0x1000, 0x1000, 0x9000)
                }
            } else {
                C::UNSUPPORTED
            }
        }

        Codec::Vp8 => {
            if support.vp8_unsupported || nvdec < NvdecGeneration::V20 {
                C::UNSUPPORTED
            } else if depth != 8 || subsampling != S::S420 {
                C::UNSUPPORTED
            } else {
                C::supported(0x30, 0x10, 0x1000, 0x1000, 0x10000)
            }
        }

        Codec::Vp9 => {
            if support.vp9_unsupported || subsampling != S::S420 {
                C::UNSUPPORTED
            } else if nvdec >= NvdecGeneration::V31 {
                if depth > 8 && support.vp9_high_depth_unsupported {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x80, 0x80, 0x2000, 0x2000, 0x40000)
                }
            } else if nvdec >= NvdecGeneration::V30 {
                if depth > 8 {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x80, 0x80, 0x1000, 0x1000, 0x10000)
                }
            } else if nvdec >= NvdecGeneration::V20 {
                if depth > 8 {
                    C::UNSUPPORTED
                } else {
                    C::supported(0x80, 0x80, 0x1000, 0x1000, 0x9000)
                }
            } else {
                C::UNSUPPORTED
            }
        }

        Codec::Av1 => {
            if support.av1_unsupported
                || depth > 10
                || !matches!(subsampling, S::Monochrome | S::S420)
                || nvdec < NvdecGeneration::V50
            {
                C::UNSUPPORTED
            } else {
                C::supported(0x80, 0x80, 0x2000, 0x2000, 0x40000)
            }
        }
    };

    Ok(constraints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_gen(
        nvdec: NvdecGeneration,
        codec: Codec,
        subsampling: Subsampling,
        depth: u32,
    ) -> DecodeConstraints {
        lookup(nvdec, NvjpgGeneration::None, &CodecSupport::default(), codec, subsampling, depth)
            .unwrap()
    }

    #[test]
    fn h265_on_v60() {
        let c = lookup_gen(NvdecGeneration::V60, Codec::H265, Subsampling::S420, 10);
        assert!(c.supported);
        assert_eq!(
            (c.min_width, c.min_height, c.max_width, c.max_height, c.max_mbs),
            (0x90, 0x90, 0x2000, 0x2000, 0x40000)
        );

        let c = lookup_gen(NvdecGeneration::V60, Codec::H265, Subsampling::S440, 10);
        assert!(!c.supported);

        // 4:2:2 appears with V60 but not before.
        assert!(lookup_gen(NvdecGeneration::V60, Codec::H265, Subsampling::S422, 8).supported);
        assert!(!lookup_gen(NvdecGeneration::V51, Codec::H265, Subsampling::S422, 8).supported);
    }

    #[test]
    fn h265_generation_ladder() {
        // Turing and Ampere admit 4:4:4; Pascal B only 4:2:0 with the large
        // maxima; Pascal A and earlier fall back to 4K.
        assert!(lookup_gen(NvdecGeneration::V40, Codec::H265, Subsampling::S444, 8).supported);
        assert!(!lookup_gen(NvdecGeneration::V31, Codec::H265, Subsampling::S444, 8).supported);
        let pascal_b = lookup_gen(NvdecGeneration::V31, Codec::H265, Subsampling::S420, 8);
        assert_eq!(pascal_b.max_width, 0x2000);
        let pascal_a = lookup_gen(NvdecGeneration::V30, Codec::H265, Subsampling::S420, 8);
        assert_eq!(pascal_a.max_width, 0x1000);
        assert!(!lookup_gen(NvdecGeneration::None, Codec::H265, Subsampling::S420, 8).supported);
    }

    #[test]
    fn h264_generations() {
        let new = lookup_gen(NvdecGeneration::V60, Codec::H264, Subsampling::S420, 10);
        assert!(new.supported);
        assert_eq!(new.max_mbs, 0x40000);

        let old = lookup_gen(NvdecGeneration::V41, Codec::H264, Subsampling::S420, 8);
        assert!(old.supported);
        assert_eq!(old.max_width, 0x1000);
        assert!(!lookup_gen(NvdecGeneration::V41, Codec::H264, Subsampling::S420, 10).supported);
    }

    #[test]
    fn depth_gate_is_global() {
        for depth in [9, 11, 16, 0] {
            assert!(!lookup_gen(NvdecGeneration::V60, Codec::H265, Subsampling::S420, depth)
                .supported);
        }
    }

    #[test]
    fn caps_bits_override_generations() {
        let mut support = CodecSupport::default();
        support.hevc_unsupported = true;
        let c = lookup(
            NvdecGeneration::V60,
            NvjpgGeneration::None,
            &support,
            Codec::H265,
            Subsampling::S420,
            8,
        )
        .unwrap();
        assert!(!c.supported);
    }

    #[test]
    fn vp9_high_depth_needs_cap_bit() {
        let mut support = CodecSupport::default();
        support.vp9_high_depth_unsupported = true;
        let c = lookup(
            NvdecGeneration::V40,
            NvjpgGeneration::None,
            &support,
            Codec::Vp9,
            Subsampling::S420,
            10,
        )
        .unwrap();
        assert!(!c.supported);

        let c = lookup(
            NvdecGeneration::V40,
            NvjpgGeneration::None,
            &CodecSupport::default(),
            Codec::Vp9,
            Subsampling::S420,
            10,
        )
        .unwrap();
        assert!(c.supported);
    }

    #[test]
    fn mjpeg_uses_the_still_image_engine() {
        let c = lookup(
            NvdecGeneration::None,
            NvjpgGeneration::V13,
            &CodecSupport::default(),
            Codec::Mjpeg,
            Subsampling::S420,
            8,
        )
        .unwrap();
        assert!(c.supported);
        assert_eq!(c.max_width, 0x4000);
        assert_eq!(c.max_mbs, u32::MAX);

        assert!(!lookup_gen(NvdecGeneration::V60, Codec::Mjpeg, Subsampling::S420, 8).supported);
    }

    #[test]
    fn class_id_to_generation() {
        assert_eq!(nvdec_generation_from_class(0xc9b0), NvdecGeneration::V51);
        assert_eq!(nvdec_generation_from_class(0xcdb0), NvdecGeneration::V60);
        assert_eq!(nvdec_generation_from_class(0xb6b0), NvdecGeneration::V20);
        assert_eq!(nvdec_generation_from_class(0x1234), NvdecGeneration::None);
    }
}
