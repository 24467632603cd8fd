// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource-manager device bring-up and fence tracking.

use std::collections::HashMap;
use std::mem::size_of;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use libc::c_void;
use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;

use super::ioctl::*;
use super::map::RmMapRaw;
use super::Object;
use crate::constraints::{nvdec_generation_from_class, CodecSupport};
use crate::device::{BackendDevice, DeviceInner};
use crate::error::{Error, Result};
use crate::utils::bit;
use crate::{
    CpuCache, DriverKind, Fence, GpuCache, Location, MapFlags, NvencGeneration, NvjpgGeneration,
    Usage,
};

const CTL_PATH: &str = "/dev/nvidiactl";

/// The semaphore pool is one uncached host page; each channel owns two
/// consecutive 32-bit cells (pipeline fetch, engine complete).
const SEMA_MAP_SIZE: usize = 0x1000;
pub(crate) const NUM_QUEUES: usize = SEMA_MAP_SIZE / size_of::<u32>() / 2;
const CHANNEL_MASK_WORDS: usize = NUM_QUEUES / 64;

pub(crate) struct RmDevice {
    pub page_size: usize,
    pub ctl_fd: RawFd,
    pub card_fd: RawFd,
    pub os_event_fd: RawFd,
    pub card_path: String,

    pub root: Object,
    pub device: Object,
    pub subdevice: Object,
    pub vaspace: Object,

    pub rusd: RmMapRaw,
    pub usermode: RmMapRaw,
    pub semaphores: RmMapRaw,

    pub classes: Vec<u32>,
    pub engines: Vec<u32>,

    event_refs: Mutex<HashMap<u32, u32>>,
    channels_mask: Mutex<[u64; CHANNEL_MASK_WORDS]>,
    fence_values: Vec<AtomicU32>,
}

// The raw CPU pointers inside the embedded maps refer to process-wide
// mappings; the cells they expose are only ever read or written with volatile
// accesses under the wrapping-counter protocol.
unsafe impl Send for RmDevice {}
unsafe impl Sync for RmDevice {}

/// Whether a control node with at least one present card answers.
pub(crate) fn probe() -> bool {
    let Ok(fd) = open(CTL_PATH, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty()) else {
        return false;
    };

    let mut cards = [NvIoctlCardInfo::default(); 32];
    let present = unsafe { nv_esc_iow(fd, NV_ESC_CARD_INFO, &mut cards) }.is_ok()
        && cards.iter().any(|c| c.flags & CARD_INFO_FLAG_PRESENT != 0);

    let _ = nix::unistd::close(fd);
    present
}

pub(crate) fn create_device(page_size: usize) -> Result<DeviceInner> {
    let mut dev = RmDevice {
        page_size,
        ctl_fd: -1,
        card_fd: -1,
        os_event_fd: -1,
        card_path: String::new(),
        root: Object::default(),
        device: Object::default(),
        subdevice: Object::default(),
        vaspace: Object::default(),
        rusd: RmMapRaw::default(),
        usermode: RmMapRaw::default(),
        semaphores: RmMapRaw::default(),
        classes: Vec::new(),
        engines: Vec::new(),
        event_refs: Mutex::new(HashMap::new()),
        channels_mask: Mutex::new([0; CHANNEL_MASK_WORDS]),
        fence_values: (0..NUM_QUEUES * 2).map(|_| AtomicU32::new(0)).collect(),
    };

    let (nvdec, support) = match dev.initialize() {
        Ok(found) => found,
        Err(e) => {
            dev.teardown();
            return Err(e);
        }
    };

    Ok(DeviceInner {
        driver: DriverKind::Rm,
        page_size,
        nvdec,
        nvenc: NvencGeneration::None,
        nvjpg: NvjpgGeneration::None,
        support,
        tegra_layout: false,
        channel_serial: AtomicU64::new(0),
        backend: BackendDevice::Rm(dev),
    })
}

impl RmDevice {
    fn initialize(&mut self) -> Result<(crate::NvdecGeneration, CodecSupport)> {
        self.ctl_fd = open(CTL_PATH, OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())
            .map_err(Error::from)?;

        // Find the first present card and register its fd with the control
        // node so they share the same client space.
        let mut cards = [NvIoctlCardInfo::default(); 32];
        unsafe { nv_esc_iow(self.ctl_fd, NV_ESC_CARD_INFO, &mut cards) }.map_err(Error::from)?;
        let card =
            cards.iter().find(|c| c.flags & CARD_INFO_FLAG_PRESENT != 0).ok_or(Error::NotImplemented)?;

        self.card_path = format!("/dev/nvidia{}", card.minor_number);
        self.card_fd = open(self.card_path.as_str(), OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())
            .map_err(Error::from)?;
        let mut ctl = self.ctl_fd;
        unsafe { nv_esc_iowr(self.card_fd, NV_ESC_REGISTER_FD, &mut ctl) }.map_err(Error::from)?;

        // Root client, device, subdevice.
        self.root = self.rm_alloc_noparams(Object::default(), NV01_ROOT_CLIENT)?;

        let mut gpu_info = Nv0000CtrlGpuGetIdInfoV2Params { gpu_id: card.gpu_id, ..Default::default() };
        self.rm_control(self.root, NV0000_CTRL_CMD_GPU_GET_ID_INFO_V2, &mut gpu_info)?;

        self.device = self.rm_alloc(
            self.root,
            NV01_DEVICE_0,
            &mut Nv0080AllocParameters {
                device_id: gpu_info.device_instance,
                client_share: self.root.handle,
                ..Default::default()
            },
        )?;

        self.subdevice = self.rm_alloc(
            self.device,
            NV20_SUBDEVICE_0,
            &mut Nv2080AllocParameters { sub_device_id: gpu_info.sub_device_instance },
        )?;

        debug!(
            "rm: card {} gpu_id {:#x} soc {}",
            self.card_path,
            card.gpu_id,
            GPU_ID_INFO_SOC.get(gpu_info.gpu_flags)
        );

        // User shared data page, polled for clock telemetry.
        let rusd_object = self.rm_alloc(
            self.subdevice,
            RM_USER_SHARED_DATA,
            &mut Nv00deAllocParameters { polled_data_mask: NV00DE_RUSD_POLL_CLOCK },
        )?;
        let mut rusd = RmMapRaw::from_object(rusd_object, self.page_size);
        let mapped = rusd.map_cpu(self, true);
        self.rusd = rusd;
        mapped?;

        // Supported engine and class sets.
        let mut engine_list = Nv2080CtrlGpuGetEnginesV2Params::default();
        self.rm_control(self.subdevice, NV2080_CTRL_CMD_GPU_GET_ENGINES_V2, &mut engine_list)?;
        let count = (engine_list.engine_count as usize).min(NV2080_GPU_MAX_ENGINES_LIST_SIZE);
        self.engines = engine_list.engine_list[..count].to_vec();

        let mut class_list = Nv0080CtrlGpuGetClasslistV2Params::default();
        self.rm_control(self.device, NV0080_CTRL_CMD_GPU_GET_CLASSLIST_V2, &mut class_list)?;
        let count = (class_list.num_classes as usize).min(NV0080_CTRL_GPU_CLASSLIST_MAX_SIZE);
        self.classes = class_list.class_list[..count].to_vec();

        let usermode_cl = self.find_class(0x61);
        let gpfifo_cl = self.find_class(0x6f);
        if usermode_cl == 0 || gpfifo_cl == 0 {
            return Err(Error::NotImplemented);
        }

        // One address space shared by every engine.
        self.vaspace = self.rm_alloc(
            self.device,
            NV01_MEMORY_VIRTUAL,
            &mut NvMemoryVirtualAllocationParams::default(),
        )?;

        // Doorbell page.
        let usermode_object = self.rm_alloc_noparams(self.subdevice, usermode_cl)?;
        let mut usermode =
            RmMapRaw::from_object(usermode_object, crate::classes::gpfifo::USERMODE_SIZE);
        let mapped = usermode.map_cpu(self, false);
        self.usermode = usermode;
        mapped?;

        // OS event fd, used by wait() to block on non-stalling interrupts.
        self.os_event_fd =
            open(self.card_path.as_str(), OFlag::O_RDWR | OFlag::O_CLOEXEC, Mode::empty())
                .map_err(Error::from)?;
        let mut ctl = self.ctl_fd;
        unsafe { nv_esc_iowr(self.os_event_fd, NV_ESC_REGISTER_FD, &mut ctl) }
            .map_err(Error::from)?;

        let mut event = NvIoctlAllocOsEvent {
            client: self.root.handle,
            device: self.device.handle,
            fd: self.os_event_fd as u32,
            status: 0,
        };
        unsafe { nv_esc_iowr(self.os_event_fd, NV_ESC_ALLOC_OS_EVENT, &mut event) }
            .map_err(Error::from)?;
        if event.status != 0 {
            return Err(Error::RmStatus(event.status));
        }

        // Semaphore pool: one page of uncached host memory.
        self.semaphores = RmMapRaw::allocate(
            self,
            SEMA_MAP_SIZE,
            self.page_size,
            MapFlags::new(CpuCache::WriteCombine, GpuCache::Uncacheable, Location::Host, Usage::Generic),
        )?;

        // NVDEC generation and codec capability bits.
        let nvdec_cl = self.get_class_id(engine_type_nvdec(0))?;
        let nvdec = nvdec_generation_from_class(nvdec_cl);

        let mut caps = Nv0080CtrlBspGetCapsParamsV2::default();
        self.rm_control(self.device, NV0080_CTRL_CMD_BSP_GET_CAPS_V2, &mut caps)?;

        let mut support = CodecSupport::default();
        if caps.caps_tbl[0] & bit(0) as u8 == 0 {
            support.vp8_unsupported = true;
            support.vp9_unsupported = true;
            support.vp9_high_depth_unsupported = true;
        } else {
            support.vp8_unsupported = caps.caps_tbl[4] & bit(2) as u8 == 0;
            support.vp9_unsupported = caps.caps_tbl[3] & bit(1) as u8 != 0;
            if !support.vp9_unsupported {
                support.vp9_high_depth_unsupported = caps.caps_tbl[4] & bit(4) as u8 == 0;
            }
        }
        support.h264_unsupported = caps.caps_tbl[2] & bit(0) as u8 != 0;
        support.hevc_unsupported = caps.caps_tbl[1] & bit(0) as u8 != 0;
        support.av1_unsupported = caps.caps_tbl[3] & bit(0) as u8 != 0;

        Ok((nvdec, support))
    }

    fn teardown(&mut self) {
        if self.os_event_fd >= 0 {
            let mut event = NvIoctlFreeOsEvent {
                client: self.root.handle,
                device: self.device.handle,
                fd: self.os_event_fd as u32,
                status: 0,
            };
            if let Err(e) = unsafe { nv_esc_iowr(self.os_event_fd, NV_ESC_FREE_OS_EVENT, &mut event) }
            {
                warn!("rm: freeing os event failed: {e}");
            }
            let _ = nix::unistd::close(self.os_event_fd);
            self.os_event_fd = -1;
        }

        let mut semaphores = std::mem::take(&mut self.semaphores);
        semaphores.finalize(self);
        let mut usermode = std::mem::take(&mut self.usermode);
        usermode.finalize(self);
        let mut rusd = std::mem::take(&mut self.rusd);
        rusd.finalize(self);

        for obj in [self.vaspace, self.subdevice, self.device, self.root] {
            self.rm_free(obj);
        }
        self.vaspace = Object::default();
        self.subdevice = Object::default();
        self.device = Object::default();
        self.root = Object::default();

        if self.card_fd >= 0 {
            let _ = nix::unistd::close(self.card_fd);
            self.card_fd = -1;
        }
        if self.ctl_fd >= 0 {
            let _ = nix::unistd::close(self.ctl_fd);
            self.ctl_fd = -1;
        }
    }

    // Object plumbing.

    pub fn rm_alloc_raw(
        &self,
        fd: RawFd,
        parent: Object,
        class: u32,
        params: *mut c_void,
        params_size: u32,
    ) -> Result<Object> {
        let mut p = Nvos64Parameters {
            root: self.root.handle,
            object_parent: parent.handle,
            object_new: 0,
            class,
            alloc_parms: params as u64,
            params_size,
            ..Default::default()
        };
        unsafe { nv_esc_iowr(fd, NV_ESC_RM_ALLOC, &mut p) }.map_err(Error::from)?;
        if p.status != 0 {
            return Err(Error::RmStatus(p.status));
        }
        Ok(Object { handle: p.object_new, parent: parent.handle })
    }

    pub fn rm_alloc<T>(&self, parent: Object, class: u32, params: &mut T) -> Result<Object> {
        self.rm_alloc_raw(
            self.ctl_fd,
            parent,
            class,
            params as *mut T as *mut c_void,
            size_of::<T>() as u32,
        )
    }

    pub fn rm_alloc_noparams(&self, parent: Object, class: u32) -> Result<Object> {
        self.rm_alloc_raw(self.ctl_fd, parent, class, std::ptr::null_mut(), 0)
    }

    pub fn rm_alloc_fd<T>(
        &self,
        fd: RawFd,
        parent: Object,
        class: u32,
        params: &mut T,
    ) -> Result<Object> {
        self.rm_alloc_raw(fd, parent, class, params as *mut T as *mut c_void, size_of::<T>() as u32)
    }

    /// Freeing is used on teardown paths; failures are logged, not raised.
    pub fn rm_free(&self, obj: Object) {
        if obj.handle == 0 {
            return;
        }
        let mut p = Nvos00Parameters {
            root: self.root.handle,
            object_parent: obj.parent,
            object_old: obj.handle,
            status: 0,
        };
        match unsafe { nv_esc_iowr(self.ctl_fd, NV_ESC_RM_FREE, &mut p) } {
            Ok(()) if p.status != 0 => warn!("rm: free of {:#x} status {:#x}", obj.handle, p.status),
            Ok(()) => {}
            Err(e) => warn!("rm: free of {:#x} failed: {e}", obj.handle),
        }
    }

    pub fn rm_control<T>(&self, obj: Object, cmd: u32, params: &mut T) -> Result<()> {
        let mut p = Nvos54Parameters {
            client: self.root.handle,
            object: obj.handle,
            cmd,
            flags: 0,
            params: params as *mut T as u64,
            params_size: size_of::<T>() as u32,
            status: 0,
        };
        unsafe { nv_esc_iowr(self.ctl_fd, NV_ESC_RM_CONTROL, &mut p) }.map_err(Error::from)?;
        if p.status != 0 {
            return Err(Error::RmStatus(p.status));
        }
        Ok(())
    }

    // Discovery helpers.

    /// First cached class whose low byte matches `target`.
    pub fn find_class(&self, target: u32) -> u32 {
        self.classes.iter().copied().find(|c| c & 0xff == target).unwrap_or(0)
    }

    /// First class supported by the engine instance of `engine_type`.
    pub fn get_class_id(&self, engine_type: u32) -> Result<u32> {
        let mut params =
            Nv2080CtrlGpuGetEngineClasslistParams { engine_type, ..Default::default() };
        self.rm_control(self.subdevice, NV2080_CTRL_CMD_GPU_GET_ENGINE_CLASSLIST, &mut params)?;
        if params.num_classes == 0 {
            return Err(Error::NotImplemented);
        }

        let mut classes = vec![0u32; params.num_classes as usize];
        params.class_list = classes.as_mut_ptr() as u64;
        self.rm_control(self.subdevice, NV2080_CTRL_CMD_GPU_GET_ENGINE_CLASSLIST, &mut params)?;
        Ok(classes[0])
    }

    // Channel index allocator: first zero bit over the mask words, 1-based.

    pub fn alloc_channel_index(&self) -> Result<u32> {
        let mut mask = self.channels_mask.lock().unwrap();
        for (word_index, word) in mask.iter_mut().enumerate() {
            let pos = word.trailing_ones();
            if pos < 64 {
                *word |= 1u64 << pos;
                return Ok(word_index as u32 * 64 + pos + 1);
            }
        }
        Err(Error::OutOfMemory)
    }

    pub fn free_channel_index(&self, idx: u32) {
        if idx == 0 {
            return;
        }
        let mut mask = self.channels_mask.lock().unwrap();
        mask[(idx as usize - 1) / 64] &= !(1u64 << ((idx - 1) & 63));
    }

    pub fn check_channel_index(&self, idx: u32) -> bool {
        if idx == 0 || idx as usize > NUM_QUEUES {
            return false;
        }
        let mask = self.channels_mask.lock().unwrap();
        mask[(idx as usize - 1) / 64] & (1u64 << ((idx - 1) & 63)) != 0
    }

    // Event registration is refcounted per notifier type; only the edges talk
    // to the kernel.

    pub fn register_event(&self, notifier_type: u32) -> Result<()> {
        let mut refs = self.event_refs.lock().unwrap();
        let count = refs.entry(notifier_type).or_insert(0);
        *count += 1;
        if *count > 1 {
            return Ok(());
        }
        self.rm_control(
            self.subdevice,
            NV2080_CTRL_CMD_EVENT_SET_NOTIFICATION,
            &mut Nv2080CtrlEventSetNotificationParams {
                event: notifier_type,
                action: NV2080_CTRL_EVENT_SET_NOTIFICATION_ACTION_SINGLE,
            },
        )
    }

    pub fn unregister_event(&self, notifier_type: u32) {
        let mut refs = self.event_refs.lock().unwrap();
        let Some(count) = refs.get_mut(&notifier_type) else { return };
        *count = count.saturating_sub(1);
        if *count > 0 {
            return;
        }
        refs.remove(&notifier_type);
        if let Err(e) = self.rm_control(
            self.subdevice,
            NV2080_CTRL_CMD_EVENT_SET_NOTIFICATION,
            &mut Nv2080CtrlEventSetNotificationParams {
                event: notifier_type,
                action: NV2080_CTRL_EVENT_SET_NOTIFICATION_ACTION_DISABLE,
            },
        ) {
            warn!("rm: disabling notifier {notifier_type} failed: {e}");
        }
    }

    // Semaphore pool and fence counters. Fence ids: channel index `i` owns
    // cells `2(i-1)` (pipeline fetch) and `2(i-1)+1` (engine complete).

    pub fn pbdma_fence_id(&self, idx: u32) -> u32 {
        (idx - 1) * 2
    }

    pub fn channel_fence_id(&self, idx: u32) -> u32 {
        (idx - 1) * 2 + 1
    }

    /// Increments and returns the engine-complete fence for channel `idx`.
    pub fn next_channel_fence(&self, idx: u32) -> Fence {
        let id = self.channel_fence_id(idx);
        let value = self.fence_values[id as usize].fetch_add(1, Ordering::AcqRel) + 1;
        Fence::new(id, value)
    }

    pub fn semaphore_cell(&self, id: u32) -> *mut u32 {
        // The pool is a live page shared with the hardware; all accesses are
        // volatile.
        unsafe { (self.semaphores.state.cpu_addr as *mut u32).add(id as usize) }
    }

    pub fn semaphore_gpu_base(&self) -> u64 {
        self.semaphores.state.gpu_addr_pitch
    }

    fn fence_done(&self, fence: Fence) -> bool {
        let cell = unsafe { self.semaphore_cell(fence.id()).read_volatile() };
        fence.reached_by(cell)
    }

    /// Rings the doorbell with a channel's submit token.
    pub fn kickoff(&self, token: u32) {
        let doorbell = unsafe {
            (self.usermode.state.cpu_addr as *mut u8)
                .add(crate::classes::gpfifo::USERMODE_NOTIFY_CHANNEL_PENDING)
        } as *mut u32;
        unsafe { doorbell.write_volatile(token) };
    }

    // Fence wait: hybrid loop over the semaphore cell and the OS event fd.

    pub fn wait(&self, fence: Fence, timeout_us: u64) -> Result<()> {
        let idx = (fence.id() >> 1) + 1;
        if !self.check_channel_index(idx) {
            return Err(Error::InvalidArgument);
        }

        let deadline = Instant::now() + Duration::from_micros(timeout_us);
        loop {
            if self.fence_done(fence) {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }

            // Block on the non-stalling interrupt, but re-check the cell at
            // least every 100 ms: the event fd is shared across channels and
            // wakeups are not one-to-one with our fence.
            let budget = (deadline - now).min(Duration::from_millis(100));
            let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(self.os_event_fd) };
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN | PollFlags::POLLPRI)];
            let timeout = PollTimeout::from(budget.as_millis().clamp(1, 100) as u16);
            match poll(&mut fds, timeout) {
                Ok(_) => {}
                Err(Errno::EINTR) => {}
                Err(errno) => return Err(errno.into()),
            }
        }
    }

    pub fn poll(&self, fence: Fence) -> Result<bool> {
        let idx = (fence.id() >> 1) + 1;
        if !self.check_channel_index(idx) {
            return Err(Error::InvalidArgument);
        }
        Ok(self.fence_done(fence))
    }

    /// Live video-domain clock from the user shared-data page, in Hz.
    pub fn read_video_clock(&self) -> Result<u32> {
        self.rm_control(
            self.rusd.object,
            NV00DE_CTRL_CMD_REQUEST_DATA_POLL,
            &mut Nv00deCtrlRequestDataPollParams { polled_data_mask: NV00DE_RUSD_POLL_CLOCK },
        )?;

        let shared = self.rusd.state.cpu_addr as *const Nv00deSharedData;
        // Seqlock read: the kernel bumps `seq` to odd while updating.
        loop {
            let seq0 = unsafe { std::ptr::addr_of!((*shared).seq).read_volatile() };
            if seq0 & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let info = unsafe {
                std::ptr::addr_of!((*shared).clk_public_domain_infos[RUSD_CLK_PUBLIC_DOMAIN_VIDEO])
                    .read_volatile()
            };
            let seq1 = unsafe { std::ptr::addr_of!((*shared).seq).read_volatile() };
            if seq0 == seq1 {
                return Ok(info.target_clk_mhz.saturating_mul(1_000_000));
            }
        }
    }
}

impl Drop for RmDevice {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_for_mask_tests() -> RmDevice {
        RmDevice {
            page_size: 0x1000,
            ctl_fd: -1,
            card_fd: -1,
            os_event_fd: -1,
            card_path: String::new(),
            root: Object::default(),
            device: Object::default(),
            subdevice: Object::default(),
            vaspace: Object::default(),
            rusd: RmMapRaw::default(),
            usermode: RmMapRaw::default(),
            semaphores: RmMapRaw::default(),
            classes: vec![0xc7b5, 0xc9b0, 0xc361, 0xc76f],
            engines: Vec::new(),
            event_refs: Mutex::new(HashMap::new()),
            channels_mask: Mutex::new([0; CHANNEL_MASK_WORDS]),
            fence_values: (0..NUM_QUEUES * 2).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    #[test]
    fn channel_indices_are_one_based_and_reusable() {
        let dev = device_for_mask_tests();
        assert_eq!(dev.alloc_channel_index().unwrap(), 1);
        assert_eq!(dev.alloc_channel_index().unwrap(), 2);
        assert!(dev.check_channel_index(1));
        assert!(!dev.check_channel_index(3));

        dev.free_channel_index(1);
        assert!(!dev.check_channel_index(1));
        assert_eq!(dev.alloc_channel_index().unwrap(), 1);
    }

    #[test]
    fn channel_index_allocator_crosses_word_boundaries() {
        let dev = device_for_mask_tests();
        for expected in 1..=NUM_QUEUES as u32 {
            assert_eq!(dev.alloc_channel_index().unwrap(), expected);
        }
        assert_eq!(dev.alloc_channel_index(), Err(Error::OutOfMemory));

        dev.free_channel_index(100);
        assert_eq!(dev.alloc_channel_index().unwrap(), 100);
    }

    #[test]
    fn fence_counters_are_monotonic_per_channel() {
        let dev = device_for_mask_tests();
        let f1 = dev.next_channel_fence(1);
        let f2 = dev.next_channel_fence(1);
        assert_eq!(f1.id(), 1);
        assert_eq!(f2.value(), f1.value() + 1);

        let other = dev.next_channel_fence(2);
        assert_eq!(other.id(), 3);
        assert_eq!(other.value(), 1);
    }

    #[test]
    fn find_class_matches_low_byte() {
        let dev = device_for_mask_tests();
        assert_eq!(dev.find_class(0x6f), 0xc76f);
        assert_eq!(dev.find_class(0x61), 0xc361);
        assert_eq!(dev.find_class(0x99), 0);
    }
}
