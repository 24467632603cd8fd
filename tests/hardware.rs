// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! End-to-end tests against real hardware. Every test opens its own device
//! and skips silently when no supported kernel interface probes, so the suite
//! is safe to run anywhere.

use nvmm::{
    surface_transfer, CacheFlags, Channel, Codec, CommandBuffer, CpuCache, Device, Engine, Fence,
    GpuCache, Location, Map, MapFlags, Subsampling, SurfaceInfo, Usage,
};
use xxhash_rust::xxh64::xxh64;

use nvmm::classes::copy as clcopy;
use nvmm::classes::gpfifo as clgpfifo;

const WAIT_US: u64 = 5_000_000;

fn device() -> Option<Device> {
    let _ = env_logger::builder().is_test(true).try_init();
    match Device::new() {
        Ok(dev) => Some(dev),
        Err(e) => {
            eprintln!("skipping: no device ({e})");
            None
        }
    }
}

fn cmdbuf_flags() -> MapFlags {
    MapFlags::new(CpuCache::WriteCombine, GpuCache::Uncacheable, Location::Host, Usage::Cmdbuf)
}

fn framebuffer_flags() -> MapFlags {
    MapFlags::new(CpuCache::Cacheable, GpuCache::Cacheable, Location::Host, Usage::Framebuffer)
}

/// Copy channel plus a bound command buffer, the fixture most tests share.
struct CopyRig {
    dev: Device,
    chan: Channel,
    cmdbuf_map: Map,
    cmdbuf: CommandBuffer,
}

fn copy_rig() -> Option<CopyRig> {
    let dev = device()?;
    let chan = Channel::new(&dev, Engine::Copy).expect("copy channel");
    let cmdbuf_map = Map::new(&dev, 0x10000, 0x1000, cmdbuf_flags()).expect("cmdbuf map");
    cmdbuf_map.pin(&chan).expect("pin cmdbuf map");
    let mut cmdbuf = CommandBuffer::new(&chan);
    cmdbuf.add_memory(&cmdbuf_map, 0, 0x10000).expect("bind window");
    Some(CopyRig { dev, chan, cmdbuf_map, cmdbuf })
}

#[test]
fn device_reports_driver() {
    let Some(dev) = device() else { return };
    let info = dev.info();
    // One of the two backends answered; the info block must be coherent.
    assert_eq!(info.is_tegra, matches!(info.driver, nvmm::DriverKind::Tegra));
}

#[test]
fn map_basic_accessors() {
    let Some(dev) = device() else { return };

    let flags =
        MapFlags::new(CpuCache::Cacheable, GpuCache::Cacheable, Location::Host, Usage::Generic);
    let map = Map::new(&dev, 0x1000, 0x1000, flags).expect("map");
    assert_ne!(map.handle(), 0);
    assert!(!map.cpu_addr().is_null());
    assert_ne!(map.gpu_addr(), 0);
    assert!(map.size() >= 0x1000);
    drop(map);

    assert!(Map::new(&dev, 0, 0x1000, flags).is_err());
    assert!(Map::new(&dev, 0x1000, 0, flags).is_err());
    assert!(Map::new(&dev, 0x1000, 0x300, flags).is_err());
}

#[test]
fn map_flag_combinations() {
    let Some(dev) = device() else { return };

    let cpus = [CpuCache::Cacheable, CpuCache::WriteCombine, CpuCache::Uncacheable, CpuCache::Unmapped];
    let gpus = [GpuCache::Cacheable, GpuCache::Uncacheable, GpuCache::Unmapped];
    let locations = [Location::Host, Location::Device];
    let usages = [Usage::Generic, Usage::Framebuffer, Usage::Engine, Usage::Cmdbuf];

    for cpu in cpus {
        for gpu in gpus {
            for location in locations {
                for usage in usages {
                    let flags = MapFlags::new(cpu, gpu, location, usage);
                    let map = match Map::new(&dev, 0x1000, 0x1000, flags) {
                        Ok(map) => map,
                        Err(e) => panic!("map {flags:?} failed: {e}"),
                    };

                    assert_ne!(map.handle(), 0);
                    assert!(map.size() >= 0x1000);
                    assert_eq!(map.cpu_addr().is_null(), cpu == CpuCache::Unmapped);
                    assert_eq!(map.gpu_addr() == 0, gpu == GpuCache::Unmapped);

                    map.cache_op(0, 0x1000, CacheFlags::WRITEBACK).unwrap();
                    map.cache_op(0, 0x1000, CacheFlags::INVALIDATE).unwrap();
                    map.cache_op(0, 0x1000, CacheFlags::WRITEBACK | CacheFlags::INVALIDATE)
                        .unwrap();
                }
            }
        }
    }
}

#[test]
fn map_from_caller_memory() {
    let Some(dev) = device() else { return };

    let layout = std::alloc::Layout::from_size_align(0x1000, 0x1000).unwrap();
    let mem = unsafe { std::alloc::alloc_zeroed(layout) };
    assert!(!mem.is_null());

    let flags =
        MapFlags::new(CpuCache::WriteCombine, GpuCache::Cacheable, Location::Host, Usage::Generic);
    {
        let map = unsafe { Map::from_ptr(&dev, mem as *mut _, 0x1000, 0x1000, flags) }
            .expect("wrap memory");
        assert_ne!(map.handle(), 0);
        assert!(!map.cpu_addr().is_null());
        assert_ne!(map.gpu_addr(), 0);
    }

    unsafe { std::alloc::dealloc(mem, layout) };
}

#[test]
fn map_realloc_preserves_handle_identity() {
    let Some(dev) = device() else { return };

    let flags =
        MapFlags::new(CpuCache::Cacheable, GpuCache::Cacheable, Location::Host, Usage::Generic);
    let mut map = Map::new(&dev, 0x1000, 0x1000, flags).expect("map");

    unsafe { map.as_mut_slice().unwrap()[..4].copy_from_slice(&[1, 2, 3, 4]) };

    // Shrinking is rejected, growing carries contents over.
    assert!(map.realloc(0x1000, 0x1000).is_err());
    map.realloc(0x10000, 0x1000).expect("realloc");
    assert!(map.size() >= 0x10000);
    assert!(!map.cpu_addr().is_null());
    assert_ne!(map.gpu_addr(), 0);
    assert_eq!(unsafe { &map.as_slice().unwrap()[..4] }, &[1, 2, 3, 4]);
}

#[test]
fn pin_is_idempotent() {
    let Some(dev) = device() else { return };
    let chan = Channel::new(&dev, Engine::Copy).expect("channel");

    let flags =
        MapFlags::new(CpuCache::Cacheable, GpuCache::Cacheable, Location::Host, Usage::Generic);
    let map = Map::new(&dev, 0x1000, 0x1000, flags).expect("map");

    map.pin(&chan).expect("pin");
    map.pin(&chan).expect("second pin is a no-op");
}

#[test]
fn channels_per_engine() {
    let Some(dev) = device() else { return };

    // The host engine is not a channel target.
    assert!(Channel::new(&dev, Engine::Host).is_err());

    // These engines are present on every supported part.
    for engine in [Engine::Copy, Engine::Nvdec, Engine::Nvenc] {
        Channel::new(&dev, engine).unwrap_or_else(|e| panic!("{engine:?} channel: {e}"));
    }

    // These may legitimately be missing.
    for engine in [Engine::Nvjpg, Engine::Ofa, Engine::Vic] {
        match Channel::new(&dev, engine) {
            Ok(chan) => drop(chan),
            Err(e) => eprintln!("{engine:?} not available: {e}"),
        }
    }
}

#[test]
fn submit_nop_and_wait() {
    let Some(mut rig) = copy_rig() else { return };

    rig.cmdbuf.begin(Engine::Host).unwrap();
    rig.cmdbuf.push_value(clgpfifo::NOP, 0).unwrap();
    rig.cmdbuf.end().unwrap();

    let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
    rig.dev.wait_fence(fence, WAIT_US).expect("wait");
    assert!(rig.dev.poll_fence(fence).unwrap());

    // A value the channel has not reached yet neither polls done nor waits.
    let future = Fence::new(fence.id(), fence.value().wrapping_add(100));
    assert!(!rig.dev.poll_fence(future).unwrap());
    assert_eq!(rig.dev.wait_fence(future, 0), Err(nvmm::Error::Timeout));

    // Fence id zero is reserved-invalid.
    assert!(rig.dev.wait_fence(Fence::new(0, 1), 0).is_err());
    assert!(rig.dev.poll_fence(Fence::new(0, 1)).is_err());
}

#[test]
fn ring_wraps_through_the_256_entry_boundary() {
    let Some(mut rig) = copy_rig() else { return };

    for _ in 0..0x1000 {
        rig.cmdbuf.clear().unwrap();
        rig.cmdbuf.begin(Engine::Host).unwrap();
        rig.cmdbuf.push_value(clgpfifo::NOP, 0).unwrap();
        rig.cmdbuf.end().unwrap();

        let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
        rig.dev.wait_fence(fence, WAIT_US).expect("wait");
    }
}

#[test]
fn window_budget_on_a_real_map() {
    let Some(mut rig) = copy_rig() else { return };

    let window = 0xffffu32;
    rig.cmdbuf = CommandBuffer::new(&rig.chan);
    rig.cmdbuf.add_memory(&rig.cmdbuf_map, 0, window).unwrap();

    rig.cmdbuf.begin(Engine::Host).unwrap();
    for _ in 0..window / 4 {
        rig.cmdbuf.push_word(0).unwrap();
    }
    assert_eq!(rig.cmdbuf.push_word(0), Err(nvmm::Error::OutOfMemory));
}

#[test]
fn memset_via_copy_engine() {
    let Some(mut rig) = copy_rig() else { return };

    let size = 0x100000usize;
    let map = Map::new(&rig.dev, size, 0x1000, framebuffer_flags()).expect("target");
    map.pin(&rig.chan).expect("pin");

    rig.cmdbuf.begin(Engine::Copy).unwrap();
    rig.cmdbuf
        .push_reloc(clcopy::OFFSET_OUT_UPPER, &map, 0, nvmm::RelocKind::Pitch, 0)
        .unwrap();
    rig.cmdbuf.push_value(clcopy::LINE_LENGTH_IN, size as u32).unwrap();
    rig.cmdbuf.push_value(clcopy::SET_REMAP_CONST_A, 0xcc).unwrap();
    rig.cmdbuf
        .push_value(
            clcopy::SET_REMAP_COMPONENTS,
            clcopy::REMAP_DST_X.val(clcopy::REMAP_DST_X_CONST_A)
                | clcopy::REMAP_COMPONENT_SIZE.val(clcopy::REMAP_COMPONENT_SIZE_ONE)
                | clcopy::REMAP_NUM_DST_COMPONENTS.val(clcopy::REMAP_NUM_COMPONENTS_ONE),
        )
        .unwrap();
    rig.cmdbuf
        .push_value(
            clcopy::LAUNCH_DMA,
            clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE
                .val(clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE_NON_PIPELINED)
                | clcopy::LAUNCH_DMA_FLUSH_ENABLE.val(clcopy::LAUNCH_DMA_FLUSH_ENABLE_TRUE)
                | clcopy::LAUNCH_DMA_SRC_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_DST_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_REMAP_ENABLE.val(1)
                | clcopy::LAUNCH_DMA_SRC_TYPE.val(clcopy::LAUNCH_DMA_TYPE_VIRTUAL)
                | clcopy::LAUNCH_DMA_DST_TYPE.val(clcopy::LAUNCH_DMA_TYPE_VIRTUAL),
        )
        .unwrap();
    rig.cmdbuf.cache_op(CacheFlags::WRITEBACK).unwrap();
    rig.cmdbuf.end().unwrap();

    let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
    map.cache_op(0, map.size(), CacheFlags::INVALIDATE).unwrap();
    rig.dev.wait_fence(fence, WAIT_US).expect("wait");

    // xxhash.xxh64_hexdigest(b"\xcc" * 0x100000) == be85ef1c71f4bbbe
    let data = unsafe { map.as_slice().unwrap() };
    assert_eq!(xxh64(&data[..size], 0), 0xbe85_ef1c_71f4_bbbe);
}

#[test]
fn memcpy_via_copy_engine() {
    let Some(mut rig) = copy_rig() else { return };

    let size = 0x100000usize;
    let src = Map::new(&rig.dev, size, 0x1000, framebuffer_flags()).expect("src");
    let dst = Map::new(&rig.dev, size, 0x1000, framebuffer_flags()).expect("dst");
    src.pin(&rig.chan).unwrap();
    dst.pin(&rig.chan).unwrap();

    unsafe { src.as_mut_slice().unwrap()[..size].fill(0x11) };
    src.cache_op(0, size, CacheFlags::WRITEBACK).unwrap();

    rig.cmdbuf.begin(Engine::Copy).unwrap();
    rig.cmdbuf
        .push_reloc(clcopy::OFFSET_IN_UPPER, &src, 0, nvmm::RelocKind::Default, 0)
        .unwrap();
    rig.cmdbuf
        .push_reloc(clcopy::OFFSET_OUT_UPPER, &dst, 0, nvmm::RelocKind::Default, 0)
        .unwrap();
    rig.cmdbuf.push_value(clcopy::LINE_LENGTH_IN, size as u32).unwrap();
    rig.cmdbuf
        .push_value(
            clcopy::LAUNCH_DMA,
            clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE
                .val(clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE_NON_PIPELINED)
                | clcopy::LAUNCH_DMA_FLUSH_ENABLE.val(clcopy::LAUNCH_DMA_FLUSH_ENABLE_TRUE)
                | clcopy::LAUNCH_DMA_SRC_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_DST_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_SRC_TYPE.val(clcopy::LAUNCH_DMA_TYPE_VIRTUAL)
                | clcopy::LAUNCH_DMA_DST_TYPE.val(clcopy::LAUNCH_DMA_TYPE_VIRTUAL),
        )
        .unwrap();
    rig.cmdbuf.cache_op(CacheFlags::WRITEBACK).unwrap();
    rig.cmdbuf.end().unwrap();

    let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
    dst.cache_op(0, size, CacheFlags::INVALIDATE).unwrap();
    rig.dev.wait_fence(fence, WAIT_US).expect("wait");

    // xxhash.xxh64_hexdigest(b"\x11" * 0x100000) == 8b16293e51d6e10c
    let data = unsafe { dst.as_slice().unwrap() };
    assert_eq!(xxh64(&data[..size], 0), 0x8b16_293e_51d6_e10c);
}

#[test]
fn surface_transfer_device_to_host() {
    let Some(mut rig) = copy_rig() else { return };

    let (width, height) = (1920u32, 1080u32);
    let size = (width * height) as usize;

    let src_flags =
        MapFlags::new(CpuCache::Unmapped, GpuCache::Cacheable, Location::Device, Usage::Framebuffer);
    let src = Map::new(&rig.dev, size, 0x1000, src_flags).expect("src");
    src.pin(&rig.chan).unwrap();

    let dst = Map::new(&rig.dev, size, 0x1000, framebuffer_flags()).expect("dst");
    dst.pin(&rig.chan).unwrap();

    // Fill the device-local source with 0x0a via a remap memset.
    rig.cmdbuf.begin(Engine::Copy).unwrap();
    rig.cmdbuf
        .push_reloc(clcopy::OFFSET_OUT_UPPER, &src, 0, nvmm::RelocKind::Pitch, 0)
        .unwrap();
    rig.cmdbuf.push_value(clcopy::PITCH_IN, width).unwrap();
    rig.cmdbuf.push_value(clcopy::PITCH_OUT, width).unwrap();
    rig.cmdbuf.push_value(clcopy::LINE_LENGTH_IN, width).unwrap();
    rig.cmdbuf.push_value(clcopy::LINE_COUNT, height).unwrap();
    rig.cmdbuf.push_value(clcopy::SET_REMAP_CONST_A, 0x0a).unwrap();
    rig.cmdbuf
        .push_value(
            clcopy::SET_REMAP_COMPONENTS,
            clcopy::REMAP_DST_X.val(clcopy::REMAP_DST_X_CONST_A)
                | clcopy::REMAP_COMPONENT_SIZE.val(clcopy::REMAP_COMPONENT_SIZE_ONE)
                | clcopy::REMAP_NUM_DST_COMPONENTS.val(clcopy::REMAP_NUM_COMPONENTS_ONE),
        )
        .unwrap();
    rig.cmdbuf
        .push_value(
            clcopy::LAUNCH_DMA,
            clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE
                .val(clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE_NON_PIPELINED)
                | clcopy::LAUNCH_DMA_FLUSH_ENABLE.val(clcopy::LAUNCH_DMA_FLUSH_ENABLE_TRUE)
                | clcopy::LAUNCH_DMA_SRC_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_DST_MEMORY_LAYOUT.val(clcopy::LAUNCH_DMA_MEMORY_LAYOUT_PITCH)
                | clcopy::LAUNCH_DMA_MULTI_LINE_ENABLE.val(1)
                | clcopy::LAUNCH_DMA_REMAP_ENABLE.val(1)
                | clcopy::LAUNCH_DMA_DST_TYPE.val(clcopy::LAUNCH_DMA_TYPE_VIRTUAL),
        )
        .unwrap();
    rig.cmdbuf.end().unwrap();

    let src_info = SurfaceInfo {
        map: &src,
        map_offset: 0,
        width,
        height,
        stride: width,
        tiled: false,
        gob_height: 0,
    };
    let dst_info = SurfaceInfo {
        map: &dst,
        map_offset: 0,
        width,
        height,
        stride: width,
        tiled: false,
        gob_height: 0,
    };
    surface_transfer(&mut rig.cmdbuf, &src_info, &dst_info).expect("transfer");

    rig.cmdbuf.begin(Engine::Host).unwrap();
    rig.cmdbuf.cache_op(CacheFlags::WRITEBACK).unwrap();
    rig.cmdbuf.end().unwrap();

    let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
    dst.cache_op(0, dst.size(), CacheFlags::INVALIDATE).unwrap();
    rig.dev.wait_fence(fence, WAIT_US).expect("wait");

    // xxhash.xxh64_hexdigest(b"\x0a" * 1920 * 1080) == 538a2a80c0e10548
    let data = unsafe { dst.as_slice().unwrap() };
    assert_eq!(xxh64(&data[..size], 0), 0x538a_2a80_c0e1_0548);
}

#[test]
fn cross_channel_wait_fence() {
    let Some(mut rig) = copy_rig() else { return };
    let Some(mut other) = copy_rig() else { return };

    other.cmdbuf.begin(Engine::Host).unwrap();
    other.cmdbuf.push_value(clgpfifo::NOP, 0).unwrap();
    other.cmdbuf.end().unwrap();
    let other_fence = other.chan.submit(&mut other.cmdbuf).expect("submit");

    // The only cross-channel ordering primitive: stall this channel until
    // the other channel's fence signals.
    rig.cmdbuf.begin(Engine::Host).unwrap();
    rig.cmdbuf.wait_fence(other_fence).unwrap();
    rig.cmdbuf.push_value(clgpfifo::NOP, 0).unwrap();
    rig.cmdbuf.end().unwrap();

    let fence = rig.chan.submit(&mut rig.cmdbuf).expect("submit");
    rig.dev.wait_fence(fence, WAIT_US).expect("wait");
}

#[test]
fn dfs_drives_the_decoder_clock() {
    let Some(dev) = device() else { return };
    let mut chan = match Channel::new(&dev, Engine::Nvdec) {
        Ok(chan) => chan,
        Err(e) => {
            eprintln!("skipping: no nvdec channel ({e})");
            return;
        }
    };

    // DFS entry points are rejected before initialize().
    assert!(chan.dfs_update(1000, 50_000).is_err());

    chan.dfs_initialize(30.0).unwrap();
    chan.dfs_set_damping(0.2).unwrap();
    for _ in 0..16 {
        chan.dfs_update(1000, 50_000).unwrap();
    }
    chan.dfs_commit().unwrap();
    chan.dfs_finalize().unwrap();

    // A copy channel has no clock to scale.
    let mut copy = Channel::new(&dev, Engine::Copy).unwrap();
    assert!(copy.dfs_initialize(30.0).is_err());
    assert!(copy.get_clock_rate().is_err());
}

#[test]
fn decode_constraints_follow_the_decoder_generation() {
    let Some(dev) = device() else { return };
    if dev.info().nvdec == nvmm::NvdecGeneration::None {
        eprintln!("skipping: no decoder");
        return;
    }

    let c = dev.decode_constraints(Codec::H264, Subsampling::S420, 8).unwrap();
    assert!(c.supported);
    assert!(c.max_width >= 0x1000);

    // 4:4:0 subsampling has no hardware path anywhere.
    let c = dev.decode_constraints(Codec::H265, Subsampling::S440, 10).unwrap();
    assert!(!c.supported);
}
