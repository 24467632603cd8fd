// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command buffers: append-only method writers over a window of a [`Map`].
//!
//! Two wire formats hide behind one interface. The GPFIFO variant drives the
//! GPU frontend (all engines on the discrete GPU, and the copy engine on
//! Tegra): methods are packed behind incrementing headers and each
//! `begin()`/`end()` pair produces one 64-bit GP entry describing the gather.
//! The host1x variant drives the Tegra multimedia engines: 32-bit opcodes,
//! with engine registers reached through the THI method0/method1 indirection
//! and addresses resolved either from a channel pin or by kernel-side
//! relocation.
//!
//! The kernel reads the method words straight out of the backing map at
//! submit time; nothing is copied into driver memory. A buffer may be
//! resubmitted after `clear()`, and must not be mutated between submit and
//! fence signal.
//!
//! [`Map`]: crate::Map

use std::sync::Arc;

use crate::channel::{Channel, ChannelBackend};
use crate::classes::gpfifo as clgpfifo;
#[cfg(feature = "tegra")]
use crate::classes::host1x as clhost1x;
use crate::error::{Error, Result};
use crate::map::MapInner;
use crate::{CacheFlags, Engine, Fence, Map, RelocKind};

#[cfg(feature = "tegra")]
use crate::backend::tegra::ioctl as tegra_ioctl;

/// Sentinel written where the kernel patches a relocation.
#[cfg(feature = "tegra")]
const RELOC_SENTINEL: u32 = 0xdead_beef;

const SUBCHANNEL_ENGINE: u32 = 4;
const SUBCHANNEL_HOST: u32 = 6;

fn engine_subchannel(engine: Engine) -> u32 {
    match engine {
        Engine::Host => SUBCHANNEL_HOST,
        _ => SUBCHANNEL_ENGINE,
    }
}

/// The bound window: raw cursors into the backing map, plus an owning
/// reference that keeps the map alive while the kernel may still read it.
struct Window {
    keepalive: Option<Arc<MapInner>>,
    /// CPU address of the window start.
    base: *mut u32,
    /// GPU address of the window start (pitch view).
    gpu_base: u64,
    /// Kernel handle of the backing map.
    handle: u32,
    /// Byte offset of the window within the backing map.
    map_offset: u32,
    /// Window length in bytes.
    size: u32,
}

// The window pointer aliases a process-wide mapping; access is serialized by
// the single-writer submission contract.
unsafe impl Send for Window {}
unsafe impl Sync for Window {}

pub(crate) struct GpfifoStream {
    pub entries: Vec<u64>,
    cur_words: u32,
    cur_subchannel: u32,
    /// Fences are syncpoints (Tegra) rather than semaphore cells.
    use_syncpts: bool,
    /// GPU address of the device semaphore pool, when fences are semaphores.
    sem_base: u64,
    /// Read-only syncpoint aperture `(base, stride)`, when the kernel
    /// exposes one.
    syncpt_window: Option<(u64, u64)>,
}

#[cfg(feature = "tegra")]
#[derive(Default)]
pub(crate) struct Host1xStream {
    /// Emit a SETCL opcode on `begin()`; channels that bind the class at
    /// submit level don't need one.
    need_setclass: bool,
    /// host1x v6 widened the syncpoint-increment index field.
    v6: bool,
    pub drm: bool,

    // Legacy nvhost submit records.
    pub cmdbufs: Vec<tegra_ioctl::NvhostCmdbuf>,
    pub cmdbuf_exts: Vec<tegra_ioctl::NvhostCmdbufExt>,
    pub class_ids: Vec<u32>,
    pub relocs: Vec<tegra_ioctl::NvhostReloc>,
    pub reloc_types: Vec<tegra_ioctl::NvhostRelocType>,
    pub reloc_shifts: Vec<tegra_ioctl::NvhostRelocShift>,
    pub syncpt_incrs: Vec<tegra_ioctl::NvhostSyncptIncr>,
    pub fences: Vec<u32>,

    // DRM submit records.
    pub cmds: Vec<tegra_ioctl::DrmTegraSubmitCmd>,
    pub bufs: Vec<tegra_ioctl::DrmTegraSubmitBuf>,

    /// Relocation targets stay alive until the records are cleared.
    targets: Vec<Arc<MapInner>>,
}

pub(crate) enum CmdbufKind {
    Gpfifo(GpfifoStream),
    #[cfg(feature = "tegra")]
    Host1x(Host1xStream),
}

/// An append-only method writer bound to a window of a [`Map`].
pub struct CommandBuffer {
    window: Option<Window>,
    /// Write position, in words from the window start.
    pos: u32,
    cur_engine: Engine,
    /// A `begin()` is pending its `end()`.
    open: bool,
    kind: CmdbufKind,
}

impl CommandBuffer {
    /// Creates a command buffer encoding the wire format of `channel`'s
    /// backend. Bind a window with [`CommandBuffer::add_memory`] before use.
    pub fn new(channel: &Channel) -> CommandBuffer {
        let kind = match channel.backend() {
            #[cfg(feature = "rm")]
            ChannelBackend::Rm(_) => CmdbufKind::Gpfifo(GpfifoStream {
                entries: Vec::new(),
                cur_words: 0,
                cur_subchannel: SUBCHANNEL_ENGINE,
                use_syncpts: false,
                sem_base: channel.semaphore_gpu_base(),
                syncpt_window: None,
            }),
            #[cfg(feature = "tegra")]
            ChannelBackend::TegraGpfifo(_) => CmdbufKind::Gpfifo(GpfifoStream {
                entries: Vec::new(),
                cur_words: 0,
                cur_subchannel: SUBCHANNEL_ENGINE,
                use_syncpts: true,
                sem_base: 0,
                syncpt_window: channel.syncpt_window(),
            }),
            #[cfg(feature = "tegra")]
            ChannelBackend::Host1x(_) => CmdbufKind::Host1x(Host1xStream {
                need_setclass: false,
                v6: channel.host1x_v6(),
                drm: channel.is_drm(),
                ..Default::default()
            }),
        };

        CommandBuffer { window: None, pos: 0, cur_engine: Engine::Host, open: false, kind }
    }

    /// Binds the writable window `[offset, offset + size)` of `map` and
    /// rewinds. The map must be CPU-mapped; for submission it must have been
    /// allocated with command-buffer usage.
    pub fn add_memory(&mut self, map: &Map, offset: u32, size: u32) -> Result<()> {
        if (offset as usize).checked_add(size as usize).map_or(true, |end| end > map.size()) {
            return Err(Error::InvalidArgument);
        }
        let cpu = map.cpu_addr();
        if cpu.is_null() {
            return Err(Error::InvalidArgument);
        }

        self.window = Some(Window {
            base: unsafe { (cpu as *mut u8).add(offset as usize) } as *mut u32,
            gpu_base: map.inner.gpu_addr_pitch().wrapping_add(offset as u64),
            handle: map.handle(),
            map_offset: offset,
            size,
            keepalive: Some(Arc::clone(&map.inner)),
        });
        self.clear()
    }

    /// Rewinds to the window start and drops all accumulated records.
    pub fn clear(&mut self) -> Result<()> {
        if self.window.is_none() {
            return Err(Error::InvalidArgument);
        }
        self.pos = 0;
        self.open = false;
        match &mut self.kind {
            CmdbufKind::Gpfifo(gp) => {
                gp.entries.clear();
                gp.cur_words = 0;
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(hx) => {
                hx.cmdbufs.clear();
                hx.cmdbuf_exts.clear();
                hx.class_ids.clear();
                hx.relocs.clear();
                hx.reloc_types.clear();
                hx.reloc_shifts.clear();
                hx.syncpt_incrs.clear();
                hx.fences.clear();
                hx.cmds.clear();
                hx.bufs.clear();
                hx.targets.clear();
            }
        }
        Ok(())
    }

    /// Opens a new gather / GP entry targeting `engine`.
    pub fn begin(&mut self, engine: Engine) -> Result<()> {
        let window = self.window.as_ref().ok_or(Error::InvalidArgument)?;
        let gpu_addr = window.gpu_base + self.pos as u64 * 4;
        let handle = window.handle;
        let byte_offset = window.map_offset + self.pos * 4;
        self.cur_engine = engine;

        #[allow(unused_mut)]
        let mut emit_setcl: Option<u32> = None;
        match &mut self.kind {
            CmdbufKind::Gpfifo(gp) => {
                gp.cur_words = 0;
                gp.cur_subchannel = engine_subchannel(engine);
                gp.entries.push(clgpfifo::gp_entry(gpu_addr));
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(hx) => {
                let class_id = engine.host1x_class().ok_or(Error::InvalidArgument)?;
                if hx.drm {
                    hx.cmds.push(tegra_ioctl::DrmTegraSubmitCmd::gather_uptr());
                } else {
                    hx.cmdbufs.push(tegra_ioctl::NvhostCmdbuf {
                        mem: handle,
                        offset: byte_offset,
                        words: 0,
                    });
                    hx.cmdbuf_exts
                        .push(tegra_ioctl::NvhostCmdbufExt { pre_fence: -1, reserved: 0 });
                    hx.class_ids.push(class_id);
                }
                if hx.need_setclass {
                    emit_setcl = Some(class_id);
                }
            }
        }
        self.open = true;

        #[cfg(feature = "tegra")]
        if let Some(class_id) = emit_setcl {
            self.push_word(clhost1x::setcl(class_id))?;
        }
        let _ = (handle, byte_offset, emit_setcl);
        Ok(())
    }

    /// Closes the gather opened by the last `begin()`.
    pub fn end(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::InvalidArgument);
        }
        self.open = false;
        match &mut self.kind {
            CmdbufKind::Gpfifo(gp) => {
                let entry = gp.entries.last_mut().ok_or(Error::InvalidArgument)?;
                *entry |= clgpfifo::GP_ENTRY1_LENGTH.val(gp.cur_words as u64) << 32;
                Ok(())
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(_) => Ok(()),
        }
    }

    /// Appends one raw word. Fails with [`Error::OutOfMemory`] when the
    /// window is full.
    pub fn push_word(&mut self, word: u32) -> Result<()> {
        let window = self.window.as_ref().ok_or(Error::InvalidArgument)?;
        if !self.open {
            return Err(Error::InvalidArgument);
        }
        if (self.pos + 1) * 4 >= window.size {
            return Err(Error::OutOfMemory);
        }

        // In bounds per the check above; the mapping is engine-visible, so
        // use a volatile store the compiler cannot elide or reorder away.
        unsafe { window.base.add(self.pos as usize).write_volatile(word) };
        self.pos += 1;

        match &mut self.kind {
            CmdbufKind::Gpfifo(gp) => gp.cur_words += 1,
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(hx) => {
                if hx.drm {
                    if let Some(cmd) = hx.cmds.last_mut() {
                        cmd.bump_gather_words();
                    }
                } else if let Some(cmdbuf) = hx.cmdbufs.last_mut() {
                    cmdbuf.words += 1;
                }
            }
        }
        Ok(())
    }

    /// Writes `value` to the engine method (register) at byte offset
    /// `offset`.
    pub fn push_value(&mut self, offset: u32, value: u32) -> Result<()> {
        match &self.kind {
            CmdbufKind::Gpfifo(gp) => {
                let header = clgpfifo::incr_header(offset, gp.cur_subchannel, 1);
                self.push_word(header)?;
                self.push_word(value)
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(_) => {
                // Engine registers are reached through the THI indirection:
                // method0 takes the destination offset in words, method1 the
                // data.
                self.push_word(clhost1x::incr(clhost1x::THI_METHOD0 >> 2, 2))?;
                self.push_word(offset >> 2)?;
                self.push_word(value)
            }
        }
    }

    /// Writes the GPU address of `target` + `target_offset`, shifted right by
    /// `shift`, into the method at `offset`.
    pub fn push_reloc(
        &mut self,
        offset: u32,
        target: &Map,
        target_offset: u32,
        kind: RelocKind,
        shift: u32,
    ) -> Result<()> {
        match &self.kind {
            CmdbufKind::Gpfifo(_) => {
                let base = match kind {
                    RelocKind::Tiled => target.inner.gpu_addr_block(),
                    _ => target.inner.gpu_addr_pitch(),
                };
                if base == 0 {
                    return Err(Error::Fault);
                }
                self.push_reloc_addr(offset, (base + target_offset as u64) >> shift, shift)
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(hx) => {
                let drm = hx.drm;
                let pin = target.inner.find_pin_by_engine(self.cur_engine);

                if drm {
                    // The kernel patches the gather in place, addressed by
                    // the channel-local mapping id recorded at pin time.
                    let Some(mapping) = pin else { return Err(Error::Fault) };
                    let target_arc = Arc::clone(&target.inner);
                    self.push_value(offset, RELOC_SENTINEL)?;
                    let gather_offset_words = self.pos - 1;
                    if let CmdbufKind::Host1x(hx) = &mut self.kind {
                        hx.bufs.push(tegra_ioctl::DrmTegraSubmitBuf::reloc(
                            mapping as u32,
                            target_offset,
                            gather_offset_words,
                            shift,
                        ));
                        hx.targets.push(target_arc);
                    }
                    Ok(())
                } else if let Some(iova) = pin {
                    self.push_value(offset, ((iova + target_offset as u64) >> shift) as u32)
                } else {
                    // Not pinned: leave a sentinel and let the kernel fix it
                    // up from the relocation record.
                    let reloc_type = tegra_ioctl::NvhostRelocType::from_kind(kind);
                    let window = self.window.as_ref().ok_or(Error::InvalidArgument)?;
                    let window_handle = window.handle;
                    let window_offset = window.map_offset;
                    let target_arc = Arc::clone(&target.inner);
                    let target_handle = target.handle();
                    self.push_value(offset, RELOC_SENTINEL)?;
                    let cmdbuf_offset = window_offset + (self.pos - 1) * 4;
                    if let CmdbufKind::Host1x(hx) = &mut self.kind {
                        hx.relocs.push(tegra_ioctl::NvhostReloc {
                            cmdbuf_mem: window_handle,
                            cmdbuf_offset,
                            target: target_handle,
                            target_offset,
                        });
                        hx.reloc_types.push(reloc_type);
                        hx.reloc_shifts.push(tegra_ioctl::NvhostRelocShift { shift });
                        hx.targets.push(target_arc);
                    }
                    Ok(())
                }
            }
        }
    }

    /// Makes the engine stall until `fence` has signaled.
    pub fn wait_fence(&mut self, fence: Fence) -> Result<()> {
        match &self.kind {
            CmdbufKind::Gpfifo(gp) => {
                if gp.use_syncpts && gp.syncpt_window.is_none() {
                    // In-stream host syncpoint wait.
                    let header = clgpfifo::incr_header(
                        clgpfifo::SYNCPOINTA,
                        engine_subchannel(Engine::Host),
                        2,
                    );
                    let op = clgpfifo::SYNCPOINTB_OPERATION
                        .val(clgpfifo::SYNCPOINTB_OPERATION_WAIT)
                        | clgpfifo::SYNCPOINTB_WAIT_SWITCH.val(clgpfifo::SYNCPOINTB_WAIT_SWITCH_EN)
                        | clgpfifo::SYNCPOINTB_SYNCPT_INDEX.val(fence.id());
                    self.push_word(header)?;
                    self.push_word(fence.value())?;
                    self.push_word(op)
                } else {
                    let gpu_addr = if gp.use_syncpts {
                        let (base, stride) = gp.syncpt_window.unwrap_or((0, 0));
                        base + fence.id() as u64 * stride
                    } else {
                        if gp.sem_base == 0 {
                            return Err(Error::OutOfMemory);
                        }
                        gp.sem_base + fence.id() as u64 * 4
                    };

                    let execute = clgpfifo::SEM_EXECUTE_OPERATION
                        .val(clgpfifo::SEM_EXECUTE_OPERATION_ACQ_CIRC_GEQ)
                        | clgpfifo::SEM_EXECUTE_ACQUIRE_SWITCH_TSG
                            .val(clgpfifo::SEM_EXECUTE_ACQUIRE_SWITCH_TSG_EN);

                    // The semaphore unit takes its address little-end first,
                    // unlike every other engine, so the relocation helper
                    // (which writes high then low) cannot be used here.
                    self.push_value(clgpfifo::SEM_ADDR_LO, gpu_addr as u32)?;
                    self.push_value(clgpfifo::SEM_ADDR_HI, (gpu_addr >> 32) as u32)?;
                    self.push_value(clgpfifo::SEM_PAYLOAD_LO, fence.value())?;
                    self.push_value(clgpfifo::SEM_EXECUTE, execute)
                }
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(hx) => {
                if hx.drm {
                    if let CmdbufKind::Host1x(hx) = &mut self.kind {
                        hx.cmds.push(tegra_ioctl::DrmTegraSubmitCmd::wait_syncpt(
                            fence.id(),
                            fence.value(),
                        ));
                    }
                    Ok(())
                } else {
                    // One mask opcode loads the wait payload and triggers the
                    // wait in a single go. The first shift term is zero by
                    // construction; kept spelled out because it derives from
                    // the method numbering and must track it.
                    let mask = (1u32
                        << ((clhost1x::HOST_LOAD_SYNCPT_PAYLOAD
                            - clhost1x::HOST_LOAD_SYNCPT_PAYLOAD)
                            >> 2))
                        | (1u32
                            << ((clhost1x::HOST_WAIT_SYNCPT - clhost1x::HOST_LOAD_SYNCPT_PAYLOAD)
                                >> 2));
                    self.push_word(clhost1x::mask(clhost1x::HOST_LOAD_SYNCPT_PAYLOAD >> 2, mask))?;
                    self.push_word(fence.value())?;
                    self.push_word(fence.id())
                }
            }
        }
    }

    /// Emits GPU-side cache maintenance. Multimedia engines sit outside the
    /// L2 coherence domain, so this is a no-op for them.
    pub fn cache_op(&mut self, flags: CacheFlags) -> Result<()> {
        if !flags.is_valid() {
            return Err(Error::InvalidArgument);
        }
        match &self.kind {
            CmdbufKind::Gpfifo(_) => {
                if self.cur_engine.is_multimedia() {
                    return Ok(());
                }

                let mut op = 0;
                if flags.contains(CacheFlags::WRITEBACK) {
                    op |= clgpfifo::MEM_OP_D_OPERATION
                        .val(clgpfifo::MEM_OP_D_OPERATION_L2_FLUSH_DIRTY);
                }
                if flags.contains(CacheFlags::INVALIDATE) {
                    op |= clgpfifo::MEM_OP_D_OPERATION
                        .val(clgpfifo::MEM_OP_D_OPERATION_L2_SYSMEM_INVALIDATE);
                }

                // Host wait-for-idle first; the MEM_OP_D write must be
                // preceded by writes to MEM_OP_A..C per the pbdma manual.
                self.push_value(clgpfifo::SET_REFERENCE, 0)?;
                self.push_value(clgpfifo::MEM_OP_A, 0)?;
                self.push_value(clgpfifo::MEM_OP_B, 0)?;
                self.push_value(clgpfifo::MEM_OP_C, 0)?;
                self.push_value(clgpfifo::MEM_OP_D, op)
            }
            #[cfg(feature = "tegra")]
            CmdbufKind::Host1x(_) => Ok(()),
        }
    }

    /// Emits a syncpoint increment that fires when the engine finishes the
    /// preceding operations. host1x variant only.
    #[cfg(feature = "tegra")]
    pub(crate) fn add_syncpt_incr(&mut self, syncpt: u32) -> Result<()> {
        let v6 = match &mut self.kind {
            CmdbufKind::Host1x(hx) => {
                if !hx.drm {
                    hx.syncpt_incrs
                        .push(tegra_ioctl::NvhostSyncptIncr { syncpt_id: syncpt, syncpt_incrs: 1 });
                    hx.fences.push(0);
                }
                hx.v6
            }
            _ => return Err(Error::InvalidArgument),
        };

        let cond = if v6 {
            clhost1x::THI_INCR_SYNCPT_INDX_V6.val(syncpt)
                | clhost1x::THI_INCR_SYNCPT_COND_V6.val(clhost1x::THI_INCR_SYNCPT_COND_OP_DONE)
        } else {
            clhost1x::THI_INCR_SYNCPT_INDX.val(syncpt)
                | clhost1x::THI_INCR_SYNCPT_COND.val(clhost1x::THI_INCR_SYNCPT_COND_OP_DONE)
        };

        self.push_word(clhost1x::nonincr(clhost1x::THI_INCR_SYNCPT >> 2, 1))?;
        self.push_word(cond)
    }

    /// Writes a (possibly split) GPU address into the method at `offset`.
    /// `shifted_addr` has already had `shift` applied.
    pub(crate) fn push_reloc_addr(
        &mut self,
        offset: u32,
        shifted_addr: u64,
        shift: u32,
    ) -> Result<()> {
        // The GPU has 40 bits of address space: with a shift of 8 or more the
        // whole address fits one register write, otherwise the high half goes
        // first in a two-register burst.
        if shift >= 8 {
            self.push_value(offset, shifted_addr as u32)
        } else {
            let header = match &self.kind {
                CmdbufKind::Gpfifo(gp) => clgpfifo::incr_header(offset, gp.cur_subchannel, 2),
                #[cfg(feature = "tegra")]
                CmdbufKind::Host1x(_) => return Err(Error::InvalidArgument),
            };
            self.push_word(header)?;
            self.push_word((shifted_addr >> 32) as u32)?;
            self.push_word(shifted_addr as u32)
        }
    }

    /// Words written to the window so far.
    pub(crate) fn num_words(&self) -> u32 {
        self.pos
    }

    /// CPU address of the window start.
    #[cfg(feature = "tegra")]
    pub(crate) fn words_ptr(&self) -> *const u32 {
        self.window.as_ref().map(|w| w.base as *const u32).unwrap_or(std::ptr::null())
    }

    pub(crate) fn kind(&self) -> &CmdbufKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut CmdbufKind {
        &mut self.kind
    }

    /// Whether the window's CPU view bypasses the cache entirely (no store
    /// fence needed before submit).
    pub(crate) fn window_uncached(&self) -> bool {
        self.window
            .as_ref()
            .and_then(|w| w.keepalive.as_ref())
            .map(|m| m.state().flags.cpu() == crate::CpuCache::Uncacheable)
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn test_gpfifo(
        buf: &mut [u32],
        gpu_base: u64,
        use_syncpts: bool,
        sem_base: u64,
        syncpt_window: Option<(u64, u64)>,
    ) -> CommandBuffer {
        CommandBuffer {
            window: Some(Window {
                keepalive: None,
                base: buf.as_mut_ptr(),
                gpu_base,
                handle: 1,
                map_offset: 0,
                size: (buf.len() * 4) as u32,
            }),
            pos: 0,
            cur_engine: Engine::Host,
            open: false,
            kind: CmdbufKind::Gpfifo(GpfifoStream {
                entries: Vec::new(),
                cur_words: 0,
                cur_subchannel: SUBCHANNEL_ENGINE,
                use_syncpts,
                sem_base,
                syncpt_window,
            }),
        }
    }

    #[cfg(all(test, feature = "tegra"))]
    pub(crate) fn test_host1x(
        buf: &mut [u32],
        drm: bool,
        v6: bool,
        setclass: bool,
    ) -> CommandBuffer {
        CommandBuffer {
            window: Some(Window {
                keepalive: None,
                base: buf.as_mut_ptr(),
                gpu_base: 0,
                handle: 9,
                map_offset: 0,
                size: (buf.len() * 4) as u32,
            }),
            pos: 0,
            cur_engine: Engine::Host,
            open: false,
            kind: CmdbufKind::Host1x(Host1xStream {
                need_setclass: setclass,
                v6,
                drm,
                ..Default::default()
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn test_set_window_size(&mut self, size: u32) {
        if let Some(window) = self.window.as_mut() {
            window.size = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::gpfifo as cl;

    #[test]
    fn window_budget_is_enforced() {
        // A 0xffff-byte window accepts exactly 0xffff / 4 words, then fails.
        let mut buf = vec![0u32; 0x4000];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0x1000, false, 0x8000, None);
        cmdbuf.test_set_window_size(0xffff);

        cmdbuf.begin(Engine::Host).unwrap();
        for _ in 0..0xffff / 4 {
            cmdbuf.push_word(0).unwrap();
        }
        assert_eq!(cmdbuf.push_word(0), Err(Error::OutOfMemory));

        // clear() rewinds and the window is usable again.
        cmdbuf.clear().unwrap();
        cmdbuf.begin(Engine::Host).unwrap();
        assert_eq!(cmdbuf.push_word(0), Ok(()));
    }

    #[test]
    fn push_requires_open_gather() {
        let mut buf = vec![0u32; 64];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, 0x8000, None);
        assert_eq!(cmdbuf.push_word(0), Err(Error::InvalidArgument));
        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.push_word(0).unwrap();
        cmdbuf.end().unwrap();
        assert_eq!(cmdbuf.end(), Err(Error::InvalidArgument));
    }

    #[test]
    fn gp_entries_encode_address_and_length() {
        let mut buf = vec![0u32; 64];
        let gpu_base = 0x2_0000_1000u64;
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, gpu_base, false, 0x8000, None);

        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.push_value(crate::classes::copy::LINE_LENGTH_IN, 0x100).unwrap();
        cmdbuf.end().unwrap();

        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.push_value(crate::classes::copy::LINE_COUNT, 1).unwrap();
        cmdbuf.end().unwrap();

        let CmdbufKind::Gpfifo(gp) = cmdbuf.kind() else { panic!() };
        assert_eq!(gp.entries.len(), 2);

        let first = gp.entries[0];
        assert_eq!(first as u32, cl::GP_ENTRY0_GET.val((gpu_base >> 2) as u32));
        assert_eq!((first >> 32) as u32 & 0xff, (gpu_base >> 32) as u32);
        assert_eq!(((first >> 32) >> 10) as u32 & 0x1f_ffff, 2);

        // The second gather starts right after the first one's two words.
        let second = gp.entries[1];
        let addr2 = gpu_base + 2 * 4;
        assert_eq!(second as u32, cl::GP_ENTRY0_GET.val((addr2 >> 2) as u32));
    }

    #[test]
    fn push_value_emits_header_and_data() {
        let mut buf = vec![0u32; 16];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, 0x8000, None);
        cmdbuf.begin(Engine::Nvdec).unwrap();
        cmdbuf.push_value(0x240, 0x1234).unwrap();
        cmdbuf.end().unwrap();

        assert_eq!(buf[0], cl::incr_header(0x240, 4, 1));
        assert_eq!(buf[1], 0x1234);
    }

    #[test]
    fn host_methods_use_subchannel_six() {
        let mut buf = vec![0u32; 16];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, 0x8000, None);
        cmdbuf.begin(Engine::Host).unwrap();
        cmdbuf.push_value(cl::NOP, 0).unwrap();
        cmdbuf.end().unwrap();
        assert_eq!(cl::DMA_INCR_SUBCHANNEL.get(buf[0]), 6);
    }

    #[test]
    fn reloc_splits_forty_bit_addresses() {
        let mut buf = vec![0u32; 16];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, 0x8000, None);
        cmdbuf.begin(Engine::Copy).unwrap();

        let addr = 0x12_3456_7800u64;
        cmdbuf.push_reloc_addr(0x400, addr, 0).unwrap();
        assert_eq!(buf[0], cl::incr_header(0x400, 4, 2));
        assert_eq!(buf[1], 0x12);
        assert_eq!(buf[2], 0x3456_7800);

        // With shift >= 8 the address collapses into one write.
        cmdbuf.push_reloc_addr(0x400, addr >> 8, 8).unwrap();
        assert_eq!(buf[3], cl::incr_header(0x400, 4, 1));
        assert_eq!(buf[4], (addr >> 8) as u32);
    }

    #[test]
    fn semaphore_wait_writes_address_low_first() {
        let mut buf = vec![0u32; 32];
        let sem_base = 0xab_0000_1000u64;
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, sem_base, None);
        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.wait_fence(Fence::new(3, 77)).unwrap();
        cmdbuf.end().unwrap();

        let addr = sem_base + 3 * 4;
        assert_eq!(buf[0], cl::incr_header(cl::SEM_ADDR_LO, 4, 1));
        assert_eq!(buf[1], addr as u32);
        assert_eq!(buf[2], cl::incr_header(cl::SEM_ADDR_HI, 4, 1));
        assert_eq!(buf[3], (addr >> 32) as u32);
        assert_eq!(buf[5], 77);
        let execute = buf[7];
        assert_eq!(cl::SEM_EXECUTE_OPERATION.get(execute), cl::SEM_EXECUTE_OPERATION_ACQ_CIRC_GEQ);
        assert_eq!(cl::SEM_EXECUTE_ACQUIRE_SWITCH_TSG.get(execute), 1);
    }

    #[test]
    fn syncpoint_wait_uses_host_syncpoint_methods() {
        let mut buf = vec![0u32; 16];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, true, 0, None);
        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.wait_fence(Fence::new(11, 42)).unwrap();
        cmdbuf.end().unwrap();

        assert_eq!(buf[0], cl::incr_header(cl::SYNCPOINTA, 6, 2));
        assert_eq!(buf[1], 42);
        assert_eq!(cl::SYNCPOINTB_SYNCPT_INDEX.get(buf[2]), 11);
        assert_eq!(cl::SYNCPOINTB_WAIT_SWITCH.get(buf[2]), 1);
    }

    #[test]
    fn syncpoint_va_wait_uses_semaphore_acquire() {
        let mut buf = vec![0u32; 32];
        let mut cmdbuf =
            CommandBuffer::test_gpfifo(&mut buf, 0, true, 0, Some((0x5000_0000, 0x1000)));
        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.wait_fence(Fence::new(2, 9)).unwrap();
        cmdbuf.end().unwrap();

        let addr = 0x5000_0000u64 + 2 * 0x1000;
        assert_eq!(buf[1], addr as u32);
        assert_eq!(buf[3], (addr >> 32) as u32);
        assert_eq!(buf[5], 9);
    }

    #[test]
    fn cache_op_noops_on_multimedia_engines() {
        let mut buf = vec![0u32; 32];
        let mut cmdbuf = CommandBuffer::test_gpfifo(&mut buf, 0, false, 0x8000, None);
        cmdbuf.begin(Engine::Nvdec).unwrap();
        cmdbuf.cache_op(CacheFlags::WRITEBACK).unwrap();
        assert_eq!(cmdbuf.num_words(), 0);

        cmdbuf.begin(Engine::Copy).unwrap();
        cmdbuf.cache_op(CacheFlags::WRITEBACK | CacheFlags::INVALIDATE).unwrap();
        // SET_REFERENCE + MEM_OP_A..D, two words each.
        assert_eq!(cmdbuf.num_words(), 10);
        let op = buf[9];
        assert_eq!(
            op,
            cl::MEM_OP_D_OPERATION.val(cl::MEM_OP_D_OPERATION_L2_FLUSH_DIRTY)
                | cl::MEM_OP_D_OPERATION.val(cl::MEM_OP_D_OPERATION_L2_SYSMEM_INVALIDATE)
        );

        assert_eq!(cmdbuf.cache_op(CacheFlags::empty_for_test()), Err(Error::InvalidArgument));
    }

    #[cfg(feature = "tegra")]
    mod host1x {
        use super::super::*;
        use crate::classes::host1x as cl;

        #[test]
        fn begin_records_gather_and_optional_setclass() {
            let mut buf = vec![0u32; 32];
            let mut cmdbuf = CommandBuffer::test_host1x(&mut buf, false, true, true);
            cmdbuf.begin(Engine::Nvdec).unwrap();

            let CmdbufKind::Host1x(hx) = cmdbuf.kind() else { panic!() };
            assert_eq!(hx.cmdbufs.len(), 1);
            assert_eq!(hx.cmdbufs[0].words, 1);
            assert_eq!(hx.class_ids[0], cl::CLASS_NVDEC);
            assert_eq!(buf[0], cl::setcl(cl::CLASS_NVDEC));
        }

        #[test]
        fn push_value_goes_through_thi() {
            let mut buf = vec![0u32; 32];
            let mut cmdbuf = CommandBuffer::test_host1x(&mut buf, false, true, false);
            cmdbuf.begin(Engine::Nvdec).unwrap();
            cmdbuf.push_value(0x700, 0xabcd).unwrap();

            assert_eq!(buf[0], cl::incr(cl::THI_METHOD0 >> 2, 2));
            assert_eq!(buf[1], 0x700 >> 2);
            assert_eq!(buf[2], 0xabcd);

            let CmdbufKind::Host1x(hx) = cmdbuf.kind() else { panic!() };
            assert_eq!(hx.cmdbufs[0].words, 3);
        }

        #[test]
        fn legacy_wait_packs_payload_and_id() {
            let mut buf = vec![0u32; 32];
            let mut cmdbuf = CommandBuffer::test_host1x(&mut buf, false, true, false);
            cmdbuf.begin(Engine::Nvdec).unwrap();
            cmdbuf.wait_fence(Fence::new(5, 0x60)).unwrap();

            // Payload register and wait register, two method slots apart.
            assert_eq!(buf[0], cl::mask(cl::HOST_LOAD_SYNCPT_PAYLOAD >> 2, 0b101));
            assert_eq!(buf[1], 0x60);
            assert_eq!(buf[2], 5);
        }

        #[test]
        fn drm_wait_is_a_submit_record() {
            let mut buf = vec![0u32; 32];
            let mut cmdbuf = CommandBuffer::test_host1x(&mut buf, true, true, false);
            cmdbuf.begin(Engine::Nvdec).unwrap();
            cmdbuf.wait_fence(Fence::new(5, 0x60)).unwrap();

            let CmdbufKind::Host1x(hx) = cmdbuf.kind() else { panic!() };
            assert_eq!(hx.cmds.len(), 2);
            assert_eq!(cmdbuf.num_words(), 0);
        }

        #[test]
        fn syncpt_incr_encoding_changes_at_v6() {
            let mut buf = vec![0u32; 32];
            let mut cmdbuf = CommandBuffer::test_host1x(&mut buf, false, false, false);
            cmdbuf.begin(Engine::Nvdec).unwrap();
            cmdbuf.add_syncpt_incr(0x2a).unwrap();
            assert_eq!(buf[0], cl::nonincr(cl::THI_INCR_SYNCPT >> 2, 1));
            assert_eq!(
                buf[1],
                cl::THI_INCR_SYNCPT_INDX.val(0x2a) | cl::THI_INCR_SYNCPT_COND.val(1)
            );

            let mut buf6 = vec![0u32; 32];
            let mut cmdbuf6 = CommandBuffer::test_host1x(&mut buf6, false, true, false);
            cmdbuf6.begin(Engine::Nvdec).unwrap();
            cmdbuf6.add_syncpt_incr(0x2a).unwrap();
            assert_eq!(
                buf6[1],
                cl::THI_INCR_SYNCPT_INDX_V6.val(0x2a) | cl::THI_INCR_SYNCPT_COND_V6.val(1)
            );

            let CmdbufKind::Host1x(hx) = cmdbuf.kind() else { panic!() };
            assert_eq!(hx.syncpt_incrs.len(), 1);
            assert_eq!(hx.syncpt_incrs[0].syncpt_id, 0x2a);
        }
    }
}
