// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Dynamic frequency scaling for decode channels.
//!
//! Official software drives DFS from a flat average of decoder pool occupancy.
//! We instead combine the decode cycle counts reported by engine microcode
//! with the observed bitrate (bitstream bits fed to the hardware per wall
//! time, not video time) and derive a clock target:
//!
//! ```text
//! freq = decode_cycles_per_bit * bits_per_second * 1.2
//! ```
//!
//! Cycles per bit are smoothed with an exponential moving average; the
//! bitrate is averaged over a sampling window that is rejected wholesale when
//! wall time stalls (e.g. the client paused playback).

use std::time::Instant;

use crate::error::{Error, Result};

/// Minimum number of samples before a window may commit.
const SAMPLES_THRESHOLD: u32 = 10;

/// Headroom factor applied to the computed clock target.
const CLOCK_HEADROOM: f64 = 1.2;

#[derive(Debug)]
pub(crate) struct DfsState {
    framerate: f64,
    decode_cycles_ema: f64,
    ema_damping: f64,
    num_samples: u32,
    bitrate_sum: u32,
    sampling_start: Instant,
    last_window_us: i64,
}

impl DfsState {
    /// Seeds the running state. Falls back to 10 Hz when the container
    /// carries no usable framerate.
    pub fn new(framerate: f32) -> Self {
        let framerate =
            if framerate.is_finite() && framerate >= 0.1 { framerate as f64 } else { 10.0 };
        Self {
            framerate,
            decode_cycles_ema: 0.0,
            ema_damping: 0.1,
            num_samples: 0,
            bitrate_sum: 0,
            sampling_start: Instant::now(),
            last_window_us: 0,
        }
    }

    pub fn set_damping(&mut self, damping: f64) -> Result<()> {
        if !(damping.is_finite() && damping > 0.0 && damping <= 1.0) {
            return Err(Error::InvalidArgument);
        }
        self.ema_damping = damping;
        Ok(())
    }

    /// Accounts one decoded frame: `len` bytes of bitstream consumed and the
    /// cycle count the engine reported for it. The first sample ever seeds
    /// the moving average directly.
    pub fn update(&mut self, len: u32, cycles: u32) -> Result<()> {
        if len == 0 {
            return Err(Error::InvalidArgument);
        }
        let bits = len * 8;

        let cycles_per_bit = cycles as f64 / bits as f64;
        if self.decode_cycles_ema == 0.0 {
            self.decode_cycles_ema = cycles_per_bit;
        } else {
            self.decode_cycles_ema = self.ema_damping * cycles_per_bit
                + (1.0 - self.ema_damping) * self.decode_cycles_ema;
        }

        self.bitrate_sum = self.bitrate_sum.wrapping_add(bits);
        self.num_samples += 1;
        Ok(())
    }

    /// Closes the sampling window at `now` and returns the clock target to
    /// apply, or `None` when the window is too small or was rejected.
    ///
    /// A window is rejected when wall time ran far ahead of the nominal frame
    /// cadence (over 1.5x the frame time per sample) and the previous window
    /// does not explain it (none known, or this one is over 1.5x longer).
    /// Rejection keeps the current clock and does not update the
    /// last-window time; either way the accumulators restart at `now`.
    pub fn commit(&mut self, now: Instant) -> Option<u32> {
        if self.num_samples < SAMPLES_THRESHOLD {
            return None;
        }

        let window_us = now.duration_since(self.sampling_start).as_micros() as i64;
        let frame_time_us = 1.0e6 / self.framerate;

        let stalled = window_us as f64 / self.num_samples as f64 >= 1.5 * frame_time_us
            && (self.last_window_us == 0 || window_us as f64 >= 1.5 * self.last_window_us as f64);

        let clock = if stalled {
            None
        } else {
            let bits_per_second = self.bitrate_sum as f64 * 1.0e6 / window_us as f64;
            self.last_window_us = window_us;
            Some((self.decode_cycles_ema * bits_per_second * CLOCK_HEADROOM) as u32)
        };

        self.num_samples = 0;
        self.bitrate_sum = 0;
        self.sampling_start = now;

        clock
    }

    #[cfg(test)]
    fn rebase(&mut self, start: Instant) {
        self.sampling_start = start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_window(state: &mut DfsState, frames: u32, len: u32, cycles: u32, window: Duration) -> Option<u32> {
        let start = Instant::now();
        state.rebase(start);
        for _ in 0..frames {
            state.update(len, cycles).unwrap();
        }
        state.commit(start + window)
    }

    #[test]
    fn framerate_fallback() {
        assert_eq!(DfsState::new(f32::NAN).framerate, 10.0);
        assert_eq!(DfsState::new(0.0).framerate, 10.0);
        assert_eq!(DfsState::new(-24.0).framerate, 10.0);
        assert_eq!(DfsState::new(29.97).framerate, 29.97f32 as f64);
    }

    #[test]
    fn too_few_samples_keep_accumulating() {
        let mut state = DfsState::new(30.0);
        for _ in 0..SAMPLES_THRESHOLD - 1 {
            state.update(1000, 50_000).unwrap();
        }
        assert_eq!(state.commit(Instant::now() + Duration::from_millis(300)), None);
        // The early return must not reset the window.
        assert_eq!(state.num_samples, SAMPLES_THRESHOLD - 1);
    }

    #[test]
    fn steady_stream_commits_expected_clock() {
        let mut state = DfsState::new(30.0);
        // 30 frames of 1000 bytes / 80_000 cycles over exactly one second.
        let clock = run_window(&mut state, 30, 1000, 80_000, Duration::from_secs(1)).unwrap();

        // cycles/bit = 80000/8000 = 10; bitrate = 240_000 bits/s.
        let expected = (10.0 * 240_000.0 * 1.2) as u32;
        assert_eq!(clock, expected);
        assert_eq!(state.num_samples, 0);
        assert_eq!(state.bitrate_sum, 0);
    }

    #[test]
    fn ema_converges_to_steady_rate() {
        let mut state = DfsState::new(30.0);
        // Seed with an outlier, then feed a constant workload; the EMA must
        // approach cycles / (8 * bytes) monotonically.
        state.update(1000, 800_000).unwrap();
        let target = 80_000.0 / 8000.0;
        let mut prev = state.decode_cycles_ema;
        for _ in 0..200 {
            state.update(1000, 80_000).unwrap();
            let cur = state.decode_cycles_ema;
            assert!(cur <= prev);
            assert!(cur >= target);
            prev = cur;
        }
        assert!((prev - target).abs() / target < 1e-3);
    }

    #[test]
    fn stalled_window_is_rejected_then_long_windows_accepted() {
        let mut state = DfsState::new(30.0);

        // 10 samples spread over 3 s: 300 ms per sample >> 1.5 * 33 ms, and
        // no previous window to excuse it.
        assert_eq!(run_window(&mut state, 10, 1000, 80_000, Duration::from_secs(3)), None);
        assert_eq!(state.last_window_us, 0);

        // A normal window commits and records its length.
        assert!(run_window(&mut state, 30, 1000, 80_000, Duration::from_secs(1)).is_some());
        assert_eq!(state.last_window_us, 1_000_000);

        // A slow window comparable to the previous one (< 1.5x) is accepted.
        assert!(run_window(&mut state, 10, 1000, 80_000, Duration::from_millis(1400)).is_some());

        // A slow window much longer than the previous one is rejected and
        // does not update the last-window time.
        assert_eq!(run_window(&mut state, 10, 1000, 80_000, Duration::from_secs(4)), None);
        assert_eq!(state.last_window_us, 1_400_000);
    }

    #[test]
    fn damping_validation() {
        let mut state = DfsState::new(30.0);
        assert!(state.set_damping(0.5).is_ok());
        assert!(state.set_damping(1.0).is_ok());
        assert_eq!(state.set_damping(0.0), Err(Error::InvalidArgument));
        assert_eq!(state.set_damping(1.5), Err(Error::InvalidArgument));
        assert_eq!(state.set_damping(f64::NAN), Err(Error::InvalidArgument));
    }
}
