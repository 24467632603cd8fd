// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource-manager channels: user-mode GPFIFO rings submitted by doorbell.

use log::debug;

use super::device::RmDevice;
use super::ioctl::*;
use super::map::RmMapRaw;
use super::Object;
use crate::classes::{copy as clcopy, gpfifo as clgpfifo, video as clvideo};
use crate::cmdbuf::{CmdbufKind, CommandBuffer};
use crate::error::{Error, Result};
use crate::utils::{align_up, write_fence};
use crate::{CpuCache, Engine, Fence, GpuCache, Location, MapFlags, Usage};

/// GP entries in the ring. Must be one plus the maximum value of an unsigned
/// integer type: the hardware read cursor is compared with 8-bit modular
/// arithmetic.
pub(crate) const NUM_CMDLISTS: u32 = u8::MAX as u32 + 1;

pub(crate) struct RmChannel {
    pub channel_idx: u32,
    pub gpfifo: Object,
    pub eng: Object,
    pub event: Object,
    pub userd: RmMapRaw,
    pub entries: RmMapRaw,
    pub engine_type: u32,
    pub notifier_type: Option<u32>,
    pub submit_token: u32,
    /// Ring write cursor, in `[0, NUM_CMDLISTS)`.
    pub gpfifo_pos: u32,
}

// The ring and control-page pointers are device-shared mappings; the submit
// path that writes through them is single-writer by contract (`&mut self`).
unsafe impl Send for RmChannel {}
unsafe impl Sync for RmChannel {}

fn engine_type(engine: Engine, instance: u32) -> Result<u32> {
    Ok(match engine {
        Engine::Copy => engine_type_copy(instance),
        Engine::Nvdec => engine_type_nvdec(instance),
        Engine::Nvenc => engine_type_nvenc(instance),
        Engine::Nvjpg => engine_type_nvjpeg(instance),
        Engine::Ofa => engine_type_ofa(instance),
        Engine::Vic => NV2080_ENGINE_TYPE_VIC,
        Engine::Host => return Err(Error::InvalidArgument),
    })
}

fn notifier_type(engine: Engine, instance: u32) -> Option<u32> {
    match engine {
        Engine::Copy => Some(notifier_ce(instance)),
        Engine::Nvdec => Some(notifier_nvdec(instance)),
        Engine::Nvenc => Some(notifier_nvenc(instance)),
        Engine::Nvjpg => Some(notifier_nvjpeg(instance)),
        Engine::Ofa => Some(notifier_ofa(instance)),
        Engine::Host | Engine::Vic => None,
    }
}

impl RmChannel {
    pub fn new(dev: &RmDevice, engine: Engine) -> Result<RmChannel> {
        let mut channel = RmChannel {
            channel_idx: 0,
            gpfifo: Object::default(),
            eng: Object::default(),
            event: Object::default(),
            userd: RmMapRaw::default(),
            entries: RmMapRaw::default(),
            engine_type: 0,
            notifier_type: None,
            submit_token: 0,
            gpfifo_pos: 0,
        };
        if let Err(e) = channel.initialize(dev, engine) {
            channel.finalize(dev);
            return Err(e);
        }
        Ok(channel)
    }

    fn initialize(&mut self, dev: &RmDevice, engine: Engine) -> Result<()> {
        // For copy, pick the first engine instance that is not a graphics
        // companion (GRCE): those are reserved for the 3D context.
        let mut instance = 0;
        if engine == Engine::Copy {
            loop {
                let mut caps = Nv2080CtrlCeGetCapsV2Params {
                    ce_engine_type: engine_type_copy(instance),
                    ..Default::default()
                };
                dev.rm_control(dev.subdevice, NV2080_CTRL_CMD_CE_GET_CAPS_V2, &mut caps)?;
                if caps.caps_tbl[CE_CAPS_GRCE_INDEX] & CE_CAPS_GRCE_MASK == 0 {
                    break;
                }
                instance += 1;
            }
        }

        self.engine_type = engine_type(engine, instance)?;
        self.notifier_type = notifier_type(engine, instance);

        if !dev.engines.contains(&self.engine_type) {
            return Err(Error::NotImplemented);
        }
        self.channel_idx = dev.alloc_channel_index()?;

        // Reset read-head tracking for this channel's pbdma cell.
        unsafe {
            dev.semaphore_cell(dev.pbdma_fence_id(self.channel_idx)).write_volatile(self.gpfifo_pos)
        };

        let gpfifo_cl = dev.find_class(0x6f);
        let engine_cl = dev.get_class_id(self.engine_type)?;
        if gpfifo_cl == 0 || engine_cl == 0 {
            return Err(Error::NotImplemented);
        }

        // Ring and control page, write-combined host memory.
        let ring_flags = MapFlags::new(
            CpuCache::WriteCombine,
            GpuCache::Uncacheable,
            Location::Host,
            Usage::Cmdbuf,
        );
        let userd_flags = MapFlags::new(
            CpuCache::WriteCombine,
            GpuCache::Uncacheable,
            Location::Host,
            Usage::Generic,
        );
        let ring_size =
            align_up(NUM_CMDLISTS as usize * clgpfifo::GP_ENTRY_SIZE, dev.page_size);
        self.entries = RmMapRaw::allocate(dev, ring_size, dev.page_size, ring_flags)?;
        self.userd = RmMapRaw::allocate(dev, dev.page_size, dev.page_size, userd_flags)?;

        let mut alloc = NvChannelAllocParams {
            gpfifo_offset: self.entries.state.gpu_addr_pitch,
            gpfifo_entries: NUM_CMDLISTS,
            engine_type: self.engine_type,
            ..Default::default()
        };
        alloc.userd_memory[0] = self.userd.object.handle;
        alloc.userd_offset[0] = 0;
        self.gpfifo = dev.rm_alloc(dev.device, gpfifo_cl, &mut alloc)?;

        self.eng = match engine {
            Engine::Copy => dev.rm_alloc(
                self.gpfifo,
                engine_cl,
                &mut Nvb0b5AllocationParameters { version: 0, engine_type: instance },
            )?,
            Engine::Nvdec | Engine::Nvenc | Engine::Nvjpg | Engine::Ofa => dev.rm_alloc(
                self.gpfifo,
                engine_cl,
                &mut NvFalconAllocationParameters {
                    size: std::mem::size_of::<NvFalconAllocationParameters>() as u32,
                    prohibit_multiple_instances: 0,
                    engine_instance: instance,
                },
            )?,
            // No allocation-parameter shape is published for VIC contexts.
            Engine::Vic => return Err(Error::NotImplemented),
            Engine::Host => return Err(Error::InvalidArgument),
        };

        dev.rm_control(
            self.gpfifo,
            NVA06F_CTRL_CMD_BIND,
            &mut Nva06fCtrlBindParams { engine_type: self.engine_type },
        )?;

        dev.rm_control(
            self.gpfifo,
            NVA06F_CTRL_CMD_GPFIFO_SCHEDULE,
            &mut Nva06fCtrlGpfifoScheduleParams { enable: 1, skip_submit: 0 },
        )?;

        let mut token = Nvc36fCtrlGpfifoGetWorkSubmitTokenParams::default();
        dev.rm_control(self.gpfifo, NVC36F_CTRL_CMD_GPFIFO_GET_WORK_SUBMIT_TOKEN, &mut token)?;
        self.submit_token = token.work_submit_token;

        if let Some(notifier) = self.notifier_type {
            self.event = dev.rm_alloc_fd(
                dev.os_event_fd,
                dev.subdevice,
                NV01_EVENT_OS_EVENT,
                &mut Nv0005AllocParameters {
                    parent_client: dev.root.handle,
                    src_resource: 0,
                    class: NV01_EVENT_OS_EVENT,
                    notify_index: notifier | NV01_EVENT_NONSTALL_INTR | NV01_EVENT_WITHOUT_EVENT_DATA,
                    data: dev.os_event_fd as u64,
                },
            )?;
            dev.register_event(notifier)?;
        }

        debug!(
            "rm: channel {} engine_type {:#x} class {:#x} token {:#x}",
            self.channel_idx, self.engine_type, engine_cl, self.submit_token
        );
        Ok(())
    }

    pub fn finalize(&mut self, dev: &RmDevice) {
        if let Some(notifier) = self.notifier_type.take() {
            dev.unregister_event(notifier);
        }

        self.userd.finalize(dev);
        self.entries.finalize(dev);

        dev.rm_free(self.event);
        dev.rm_free(self.eng);
        dev.rm_free(self.gpfifo);
        self.event = Object::default();
        self.eng = Object::default();
        self.gpfifo = Object::default();

        dev.free_channel_index(self.channel_idx);
        self.channel_idx = 0;
    }

    pub fn submit(
        &mut self,
        dev: &RmDevice,
        engine: Engine,
        cmdbuf: &mut CommandBuffer,
    ) -> Result<Fence> {
        let CmdbufKind::Gpfifo(gp) = cmdbuf.kind() else { return Err(Error::InvalidArgument) };

        // Reserve ring slots for the caller's entries plus the two injected
        // release gathers, wrapping to the start when the block would cross
        // the ring end.
        let num_entries = gp.entries.len() as u32 + 2;
        if num_entries >= NUM_CMDLISTS - 1 {
            return Err(Error::OutOfMemory);
        }
        let (prev_pos, new_pos) = if self.gpfifo_pos + num_entries >= NUM_CMDLISTS - 1 {
            (0, num_entries)
        } else {
            (self.gpfifo_pos, self.gpfifo_pos + num_entries)
        };

        // The hardware's fetch position, mirrored into the pbdma cell by the
        // gather we append below, must not be ahead of our previous write
        // head (8-bit modular comparison).
        let fetch =
            unsafe { dev.semaphore_cell(dev.pbdma_fence_id(self.channel_idx)).read_volatile() };
        if fetch.wrapping_sub(prev_pos) as u8 as i8 > 0 {
            return Err(Error::Fault);
        }
        self.gpfifo_pos = new_pos;

        let channel_fence = dev.next_channel_fence(self.channel_idx);
        let sem_base = dev.semaphore_gpu_base();
        let channel_sem_addr = sem_base + channel_fence.id() as u64 * 4;
        let pbdma_sem_addr = sem_base + dev.pbdma_fence_id(self.channel_idx) as u64 * 4;

        // Engine-complete release: semaphore write plus a non-stalling
        // interrupt, in the engine's own method dialect.
        cmdbuf.begin(engine)?;
        match engine {
            Engine::Copy => {
                cmdbuf.push_reloc_addr(clcopy::SET_SEMAPHORE_A, channel_sem_addr, 0)?;
                cmdbuf.push_value(clcopy::SET_SEMAPHORE_PAYLOAD, channel_fence.value())?;
                cmdbuf.push_value(
                    clcopy::LAUNCH_DMA,
                    clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE
                        .val(clcopy::LAUNCH_DMA_DATA_TRANSFER_TYPE_NONE)
                        | clcopy::LAUNCH_DMA_SEMAPHORE_TYPE
                            .val(clcopy::LAUNCH_DMA_SEMAPHORE_TYPE_RELEASE_ONE_WORD)
                        | clcopy::LAUNCH_DMA_INTERRUPT_TYPE
                            .val(clcopy::LAUNCH_DMA_INTERRUPT_TYPE_NON_BLOCKING),
                )?;
            }
            Engine::Nvdec => {
                cmdbuf.push_reloc_addr(clvideo::nvdec::SEMAPHORE_A, channel_sem_addr, 0)?;
                cmdbuf.push_value(clvideo::nvdec::SEMAPHORE_C, channel_fence.value())?;
                cmdbuf.push_value(
                    clvideo::nvdec::SEMAPHORE_D,
                    clvideo::SEMAPHORE_D_OPERATION.val(clvideo::SEMAPHORE_D_OPERATION_RELEASE)
                        | clvideo::SEMAPHORE_D_STRUCTURE_SIZE
                            .val(clvideo::SEMAPHORE_D_STRUCTURE_SIZE_ONE)
                        | clvideo::SEMAPHORE_D_PAYLOAD_SIZE
                            .val(clvideo::SEMAPHORE_D_PAYLOAD_SIZE_32BIT),
                )?;
                cmdbuf.push_value(
                    clvideo::nvdec::SEMAPHORE_D,
                    clvideo::SEMAPHORE_D_OPERATION.val(clvideo::SEMAPHORE_D_OPERATION_TRAP),
                )?;
            }
            Engine::Nvenc => {
                cmdbuf.push_reloc_addr(clvideo::nvenc::SEMAPHORE_A, channel_sem_addr, 0)?;
                cmdbuf.push_value(clvideo::nvenc::SEMAPHORE_C, channel_fence.value())?;
                cmdbuf.push_value(
                    clvideo::nvenc::SEMAPHORE_D,
                    clvideo::SEMAPHORE_D_OPERATION.val(clvideo::SEMAPHORE_D_OPERATION_RELEASE)
                        | clvideo::SEMAPHORE_D_STRUCTURE_SIZE
                            .val(clvideo::SEMAPHORE_D_STRUCTURE_SIZE_ONE)
                        | clvideo::SEMAPHORE_D_PAYLOAD_SIZE
                            .val(clvideo::SEMAPHORE_D_PAYLOAD_SIZE_32BIT),
                )?;
                cmdbuf.push_value(
                    clvideo::nvenc::SEMAPHORE_D,
                    clvideo::SEMAPHORE_D_OPERATION.val(clvideo::SEMAPHORE_D_OPERATION_TRAP),
                )?;
            }
            Engine::Nvjpg | Engine::Ofa | Engine::Vic | Engine::Host => {
                return Err(Error::NotImplemented)
            }
        }
        cmdbuf.end()?;

        // Pipeline-fetch mark: a host gather that mirrors the ring tail into
        // the pbdma cell once the frontend has fetched everything before it.
        // The semaphore unit wants the address little-end first, hence the
        // two plain value writes instead of the relocation helper.
        cmdbuf.begin(Engine::Host)?;
        cmdbuf.push_value(clgpfifo::SEM_ADDR_LO, pbdma_sem_addr as u32)?;
        cmdbuf.push_value(clgpfifo::SEM_ADDR_HI, (pbdma_sem_addr >> 32) as u32)?;
        cmdbuf.push_value(clgpfifo::SEM_PAYLOAD_LO, new_pos)?;
        cmdbuf.push_value(
            clgpfifo::SEM_EXECUTE,
            clgpfifo::SEM_EXECUTE_OPERATION.val(clgpfifo::SEM_EXECUTE_OPERATION_RELEASE)
                | clgpfifo::SEM_EXECUTE_RELEASE_WFI.val(clgpfifo::SEM_EXECUTE_RELEASE_WFI_DIS)
                | clgpfifo::SEM_EXECUTE_PAYLOAD_SIZE.val(clgpfifo::SEM_EXECUTE_PAYLOAD_SIZE_32BIT)
                | clgpfifo::SEM_EXECUTE_RELEASE_TIMESTAMP
                    .val(clgpfifo::SEM_EXECUTE_RELEASE_TIMESTAMP_DIS),
        )?;
        cmdbuf.end()?;

        // Copy the GP entries into the ring at the reserved block.
        let CmdbufKind::Gpfifo(gp) = cmdbuf.kind() else { return Err(Error::Fault) };
        let ring = self.entries.state.cpu_addr as *mut u64;
        for (i, entry) in gp.entries.iter().enumerate() {
            unsafe { ring.add(prev_pos as usize + i).write_volatile(*entry) };
        }

        // Publish the new tail and ring the doorbell. The store fence orders
        // the ring and GPPut stores ahead of the doorbell write.
        let gp_put = unsafe {
            (self.userd.state.cpu_addr as *mut u8).add(clgpfifo::USERD_GP_PUT)
        } as *mut u32;
        unsafe { gp_put.write_volatile(new_pos) };
        write_fence();
        dev.kickoff(self.submit_token);

        Ok(channel_fence)
    }
}
