//! Background decode thread feeding the frame queue
//!
//! The capture thread owns the [`VideoSource`] exclusively. Each iteration it:
//! 1. Services a pending restart request
//! 2. Backs off briefly if the queue is full
//! 3. Advances one stream frame, decoding only every `skip_ratio`-th frame
//!    and grabbing the rest so skipped frames cost no pixel copy
//! 4. Pushes decoded frames into the queue with a short timeout
//!
//! End of stream and decode failures rewind to the first frame. Backend
//! failures count towards a consecutive-error limit; reaching it stops the
//! worker for good and the playback loop reports the halt.

use super::frame::Frame;
use super::queue::FrameQueue;
use super::source::{DecodeError, StreamInfo, VideoSource};
use crate::config::CaptureSettings;
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Backoff while the queue is full
const FULL_QUEUE_BACKOFF: Duration = Duration::from_millis(10);

/// Poll interval while paused
const PAUSED_POLL: Duration = Duration::from_millis(100);

/// How often the capture thread logs that it is alive
const ALIVE_LOG_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Running,
    Paused,
}

impl CaptureState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CaptureState::Running,
            2 => CaptureState::Paused,
            _ => CaptureState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CaptureState::Stopped => 0,
            CaptureState::Running => 1,
            CaptureState::Paused => 2,
        }
    }
}

/// Decode every `ratio`-th frame so the output rate stays close to the target.
///
/// The ratio is floored, so a 60 fps stream at a 25 fps target decodes every
/// 2nd frame (30 fps output) rather than under-shooting.
pub fn skip_ratio(native_fps: f64, target_fps: u32) -> u32 {
    if target_fps == 0 || native_fps <= target_fps as f64 {
        return 1;
    }
    ((native_fps / target_fps as f64).floor() as u32).max(1)
}

/// Snapshot of the capture thread's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounters {
    pub frames_decoded: u64,
    pub frames_skipped: u64,
    /// Decoded frames discarded because the queue stayed full
    pub frames_dropped: u64,
    pub loops: u64,
}

/// State shared between the worker handle and the capture thread
struct Shared {
    state: AtomicU8,
    skip_ratio: AtomicU32,
    restart_requested: AtomicBool,
    /// Incremented every time the stream is rewound or reopened
    loop_generation: AtomicU64,
    frames_decoded: AtomicU64,
    frames_skipped: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Shared {
    fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CaptureState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn transition(&self, from: CaptureState, to: CaptureState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Outcome of one capture loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Queue full, nothing done
    Backpressure,
    /// Frame advanced without decoding
    Skipped,
    /// Frame decoded and queued
    Decoded,
    /// Frame decoded but the queue stayed full
    Dropped,
    /// Frame decoded after a pause or stop took effect
    Discarded,
    /// Grab failed below the escalation thresholds
    GrabFailed,
    /// Stream rewound or reopened
    Looped,
    /// Recoverable error recorded
    Failed,
    /// Too many consecutive errors, worker stopped
    Halted,
}

/// Capture thread state: the decoder plus its failure counters
pub(crate) struct CaptureLoop {
    source: Box<dyn VideoSource>,
    shared: Arc<Shared>,
    queue: Arc<FrameQueue>,
    settings: CaptureSettings,
    /// Stream frames consumed since the current loop started
    frame_index: u64,
    grab_failures: u32,
    consecutive_errors: u32,
}

impl CaptureLoop {
    pub(crate) fn step(&mut self) -> Step {
        if self.shared.restart_requested.swap(false, Ordering::AcqRel) {
            self.queue.clear();
            log::debug!("Restart requested, rewinding video");
            return self.restart_loop();
        }

        if self.queue.is_full() {
            return Step::Backpressure;
        }

        self.frame_index += 1;
        let ratio = u64::from(self.shared.skip_ratio.load(Ordering::Relaxed).max(1));

        if self.frame_index % ratio != 0 {
            self.skip_frame()
        } else {
            self.decode_frame()
        }
    }

    fn skip_frame(&mut self) -> Step {
        if self.source.grab() {
            self.grab_failures = 0;
            self.shared.frames_skipped.fetch_add(1, Ordering::Relaxed);
            return Step::Skipped;
        }

        self.grab_failures += 1;

        if self.grab_failures >= self.settings.max_grab_failures {
            log::warn!(
                "{} consecutive grab failures, reinitializing decoder",
                self.grab_failures
            );
            self.grab_failures = 0;

            if self.source.reinitialize() {
                self.begin_new_loop();
                return Step::Looped;
            }
            return self.record_error(&DecodeError::Backend("decoder reinitialization failed".into()));
        }

        if self.grab_failures % self.settings.grab_restart_every.max(1) == 0 {
            log::debug!("{} grab failures, rewinding", self.grab_failures);
            return self.restart_loop();
        }

        Step::GrabFailed
    }

    fn decode_frame(&mut self) -> Step {
        match self.source.decode_next() {
            Ok(frame) => {
                self.grab_failures = 0;
                self.consecutive_errors = 0;
                self.shared.frames_decoded.fetch_add(1, Ordering::Relaxed);
                self.enqueue(frame)
            }
            Err(e) if e.restarts_loop() => {
                log::debug!("{}, rewinding to first frame", e);
                self.grab_failures = 0;
                self.restart_loop()
            }
            Err(e) => self.record_error(&e),
        }
    }

    fn enqueue(&mut self, mut frame: Frame) -> Step {
        frame.position = self.frame_index.saturating_sub(1);
        frame.loop_generation = self.shared.loop_generation.load(Ordering::Acquire);

        // A decode that straddled pause() must not leave a stale frame behind
        if self.shared.state() != CaptureState::Running {
            log::trace!("Capture no longer running, discarding decoded frame");
            return Step::Discarded;
        }

        match self.queue.push_timeout(frame, self.settings.put_timeout()) {
            Ok(()) if self.shared.state() != CaptureState::Running => {
                self.queue.clear();
                Step::Discarded
            }
            Ok(()) => Step::Decoded,
            Err(_) => {
                self.shared.frames_dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("Frame queue stayed full, dropping decoded frame");
                Step::Dropped
            }
        }
    }

    fn restart_loop(&mut self) -> Step {
        match self.source.seek_to_start() {
            Ok(()) => {
                self.consecutive_errors = 0;
                self.begin_new_loop();
                Step::Looped
            }
            Err(e) => self.record_error(&e),
        }
    }

    fn begin_new_loop(&mut self) {
        self.frame_index = 0;
        self.shared.loop_generation.fetch_add(1, Ordering::AcqRel);
    }

    fn record_error(&mut self, error: &DecodeError) -> Step {
        self.consecutive_errors += 1;
        log::error!(
            "Capture error ({}/{}): {}",
            self.consecutive_errors,
            self.settings.max_consecutive_errors,
            error
        );

        if self.consecutive_errors >= self.settings.max_consecutive_errors {
            log::error!("Too many consecutive capture errors, stopping capture thread");
            self.shared.set_state(CaptureState::Stopped);
            return Step::Halted;
        }

        let backoff = self.settings.error_backoff();
        if !backoff.is_zero() {
            thread::sleep(backoff);
        }
        Step::Failed
    }

    fn run(mut self) {
        log::info!("Capture thread started");
        let mut last_alive_log = Instant::now();
        let mut iterations: u64 = 0;

        loop {
            match self.shared.state() {
                CaptureState::Stopped => break,
                CaptureState::Paused => {
                    let stale = self.queue.clear();
                    if stale > 0 {
                        log::debug!("Discarded {} frames queued while pausing", stale);
                    }
                    thread::sleep(PAUSED_POLL);
                    continue;
                }
                CaptureState::Running => {}
            }

            iterations += 1;
            if last_alive_log.elapsed() >= ALIVE_LOG_INTERVAL {
                log::debug!(
                    "Capture thread alive: {} iterations, queue {}/{}",
                    iterations,
                    self.queue.len(),
                    self.queue.capacity()
                );
                last_alive_log = Instant::now();
            }

            match self.step() {
                Step::Backpressure => thread::sleep(FULL_QUEUE_BACKOFF),
                Step::Halted => break,
                _ => {}
            }
        }

        log::info!("Capture thread stopped after {} iterations", iterations);
    }
}

/// Owns the capture thread and exposes its control surface
pub struct CaptureWorker {
    shared: Arc<Shared>,
    queue: Arc<FrameQueue>,
    settings: CaptureSettings,
    info: StreamInfo,
    /// Decoder waiting for `start`
    pending: Option<Box<dyn VideoSource>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn VideoSource>,
        queue: Arc<FrameQueue>,
        target_fps: u32,
        settings: CaptureSettings,
    ) -> Self {
        let info = source.info();
        let ratio = skip_ratio(info.native_fps, target_fps);

        log::info!(
            "Capture configured: native {:.2} fps, target {} fps, decoding every {} frame(s)",
            info.native_fps,
            target_fps,
            ratio
        );

        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(CaptureState::Stopped.as_u8()),
                skip_ratio: AtomicU32::new(ratio),
                restart_requested: AtomicBool::new(false),
                loop_generation: AtomicU64::new(0),
                frames_decoded: AtomicU64::new(0),
                frames_skipped: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
            }),
            queue,
            settings,
            info,
            pending: Some(source),
            handle: None,
        }
    }

    fn capture_loop(&self, source: Box<dyn VideoSource>) -> CaptureLoop {
        CaptureLoop {
            source,
            shared: Arc::clone(&self.shared),
            queue: Arc::clone(&self.queue),
            settings: self.settings.clone(),
            frame_index: 0,
            grab_failures: 0,
            consecutive_errors: 0,
        }
    }

    /// Spawn the capture thread. A worker can only be started once.
    pub fn start(&mut self) -> Result<()> {
        let source = self
            .pending
            .take()
            .ok_or_else(|| anyhow::anyhow!("Capture worker already started"))?;

        self.shared.set_state(CaptureState::Running);
        let capture = self.capture_loop(source);

        let handle = thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture.run());

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(CaptureState::Stopped);
                Err(anyhow::anyhow!("Failed to spawn capture thread: {}", e))
            }
        }
    }

    /// Suspend decoding and discard buffered frames
    pub fn pause(&self) {
        if self.shared.transition(CaptureState::Running, CaptureState::Paused) {
            let discarded = self.queue.clear();
            log::info!("Capture paused ({} buffered frames discarded)", discarded);
        }
    }

    /// Resume decoding and wait briefly for the queue to refill halfway.
    ///
    /// Returns the number of buffered frames once the wait ends.
    pub fn resume(&self) -> usize {
        if !self.shared.transition(CaptureState::Paused, CaptureState::Running) {
            return self.queue.len();
        }

        let buffered = self
            .queue
            .wait_for_len(self.queue.capacity() / 2, self.settings.refill_timeout());
        log::info!("Capture resumed with {} frames buffered", buffered);
        buffered
    }

    /// Stop the capture thread, waiting a bounded time for it to exit.
    ///
    /// Returns false if the thread did not finish in time and was detached.
    pub fn stop(&mut self) -> bool {
        self.shared.set_state(CaptureState::Stopped);
        self.pending = None;

        let Some(handle) = self.handle.take() else {
            self.queue.clear();
            return true;
        };

        let deadline = Instant::now() + self.settings.join_timeout();
        while !handle.is_finished() && Instant::now() < deadline {
            // Unblock a producer waiting on a full queue
            self.queue.clear();
            thread::sleep(Duration::from_millis(5));
        }

        let joined = if handle.is_finished() {
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
            true
        } else {
            log::warn!(
                "Capture thread did not exit within {:?}, detaching",
                self.settings.join_timeout()
            );
            false
        };

        self.queue.clear();
        joined
    }

    /// Retarget the output rate; takes effect on the next iteration
    pub fn update_fps(&self, target_fps: u32) {
        let ratio = skip_ratio(self.info.native_fps, target_fps);
        let previous = self.shared.skip_ratio.swap(ratio, Ordering::Relaxed);

        if previous != ratio {
            log::info!(
                "Capture target {} fps: decoding every {} frame(s) (was {})",
                target_fps,
                ratio,
                previous
            );
        }
    }

    /// Ask the capture thread to rewind to the first frame
    pub fn request_restart(&self) {
        self.queue.clear();
        self.shared.restart_requested.store(true, Ordering::Release);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.state()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == CaptureState::Paused
    }

    /// True once stopped, whether by request or after too many errors
    pub fn is_stopped(&self) -> bool {
        self.state() == CaptureState::Stopped
    }

    pub fn skip_ratio(&self) -> u32 {
        self.shared.skip_ratio.load(Ordering::Relaxed)
    }

    pub fn stream_info(&self) -> StreamInfo {
        self.info
    }

    pub fn loop_generation(&self) -> u64 {
        self.shared.loop_generation.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> CaptureCounters {
        CaptureCounters {
            frames_decoded: self.shared.frames_decoded.load(Ordering::Relaxed),
            frames_skipped: self.shared.frames_skipped.load(Ordering::Relaxed),
            frames_dropped: self.shared.frames_dropped.load(Ordering::Relaxed),
            loops: self.loop_generation(),
        }
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::source::mock::{Scripted, ScriptedSource, SourceCounters};

    fn test_settings() -> CaptureSettings {
        CaptureSettings {
            put_timeout_ms: 5,
            error_backoff_ms: 0,
            refill_timeout_ms: 500,
            join_timeout_ms: 1000,
            ..Default::default()
        }
    }

    fn new_loop(source: ScriptedSource, target_fps: u32, capacity: usize) -> (CaptureWorker, CaptureLoop) {
        let queue = Arc::new(FrameQueue::new(capacity));
        let mut worker = CaptureWorker::new(Box::new(source), queue, target_fps, test_settings());
        let source = worker.pending.take().unwrap();
        let capture = worker.capture_loop(source);
        worker.shared.set_state(CaptureState::Running);
        (worker, capture)
    }

    /// Step until the first loop restart, draining the queue as a consumer would
    fn run_one_pass(capture: &mut CaptureLoop) -> Vec<Step> {
        let mut steps = Vec::new();
        for _ in 0..10_000 {
            let step = capture.step();
            steps.push(step);
            while capture.queue.try_pop().is_some() {}
            if step == Step::Looped {
                break;
            }
        }
        steps
    }

    #[test]
    fn test_skip_ratio() {
        assert_eq!(skip_ratio(60.0, 30), 2);
        assert_eq!(skip_ratio(60.0, 25), 2);
        assert_eq!(skip_ratio(59.94, 30), 1);
        assert_eq!(skip_ratio(120.0, 30), 4);
        assert_eq!(skip_ratio(24.0, 30), 1);
        assert_eq!(skip_ratio(30.0, 30), 1);
        assert_eq!(skip_ratio(30.0, 0), 1);
    }

    #[test]
    fn test_one_pass_decodes_every_nth_frame() {
        for (frames, native, target) in [
            (60, 60.0, 30),
            (7, 30.0, 10),
            (90, 30.0, 30),
            (100, 120.0, 30),
            (300, 30.0, 15),
        ] {
            let source = ScriptedSource::new(frames, native);
            let counters = Arc::clone(&source.counters);
            let (worker, mut capture) = new_loop(source, target, 4);
            let ratio = worker.skip_ratio() as u64;

            run_one_pass(&mut capture);

            assert_eq!(
                SourceCounters::get(&counters.decodes),
                frames / ratio,
                "decodes for {} frames at ratio {}",
                frames,
                ratio
            );
            assert_eq!(
                SourceCounters::get(&counters.grabs),
                frames - frames / ratio,
                "grabs for {} frames at ratio {}",
                frames,
                ratio
            );
        }
    }

    #[test]
    fn test_half_rate_decodes_alternate_frames() {
        let source = ScriptedSource::new(300, 30.0);
        let counters = Arc::clone(&source.counters);
        let (worker, mut capture) = new_loop(source, 15, 4);
        assert_eq!(worker.skip_ratio(), 2);

        let steps: Vec<Step> = (0..60)
            .map(|_| {
                let step = capture.step();
                while capture.queue.try_pop().is_some() {}
                step
            })
            .collect();

        assert_eq!(steps.iter().filter(|s| **s == Step::Decoded).count(), 30);
        assert_eq!(steps.iter().filter(|s| **s == Step::Skipped).count(), 30);
        assert_eq!(SourceCounters::get(&counters.decodes), 30);
        assert_eq!(SourceCounters::get(&counters.grabs), 30);
    }

    #[test]
    fn test_end_of_stream_rewinds_to_first_frame() {
        let source = ScriptedSource::new(3, 30.0);
        let counters = Arc::clone(&source.counters);
        let (worker, mut capture) = new_loop(source, 30, 8);

        let positions: Vec<u64> = (0..3)
            .map(|_| {
                assert_eq!(capture.step(), Step::Decoded);
                capture.queue.try_pop().unwrap().position
            })
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);

        assert_eq!(capture.step(), Step::Looped);
        assert_eq!(SourceCounters::get(&counters.seeks), 1);
        assert_eq!(worker.loop_generation(), 1);

        assert_eq!(capture.step(), Step::Decoded);
        let frame = capture.queue.try_pop().unwrap();
        assert_eq!(frame.position, 0);
        assert_eq!(frame.loop_generation, 1);
    }

    #[test]
    fn test_decode_failure_rewinds() {
        let source = ScriptedSource::new(10, 30.0).with_errors([Scripted::DecodeFailed]);
        let counters = Arc::clone(&source.counters);
        let (_worker, mut capture) = new_loop(source, 30, 8);

        assert_eq!(capture.step(), Step::Looped);
        assert_eq!(SourceCounters::get(&counters.seeks), 1);
        assert_eq!(capture.step(), Step::Decoded);
    }

    #[test]
    fn test_nine_backend_errors_are_survivable() {
        let source = ScriptedSource::new(10, 30.0).with_errors((0..9).map(|_| Scripted::Backend));
        let (worker, mut capture) = new_loop(source, 30, 8);

        for _ in 0..9 {
            assert_eq!(capture.step(), Step::Failed);
        }
        assert_eq!(capture.step(), Step::Decoded);
        assert_eq!(capture.consecutive_errors, 0);
        assert_eq!(worker.state(), CaptureState::Running);
    }

    #[test]
    fn test_ten_backend_errors_stop_the_worker() {
        let source = ScriptedSource::new(10, 30.0).with_errors((0..10).map(|_| Scripted::Backend));
        let (worker, mut capture) = new_loop(source, 30, 8);

        for _ in 0..9 {
            assert_eq!(capture.step(), Step::Failed);
        }
        assert_eq!(capture.step(), Step::Halted);
        assert!(worker.is_stopped());
    }

    #[test]
    fn test_failed_seeks_count_as_errors() {
        let mut source = ScriptedSource::new(1, 30.0);
        source.fail_seek = true;
        let (worker, mut capture) = new_loop(source, 30, 8);

        assert_eq!(capture.step(), Step::Decoded);
        capture.queue.try_pop();

        // Every end-of-stream rewind now fails
        for _ in 0..9 {
            assert_eq!(capture.step(), Step::Failed);
        }
        assert_eq!(capture.step(), Step::Halted);
        assert!(worker.is_stopped());
    }

    #[test]
    fn test_grab_failures_escalate() {
        let mut source = ScriptedSource::new(1000, 120.0);
        source.always_fail_grab = true;
        let counters = Arc::clone(&source.counters);
        // ratio 120 so nearly every step is a grab
        let (_worker, mut capture) = new_loop(source, 1, 8);

        let mut steps = Vec::new();
        for _ in 0..50 {
            steps.push(capture.step());
        }

        // Periodic rewinds on every 10th failure, reinitialize on the 50th
        assert_eq!(SourceCounters::get(&counters.seeks), 4);
        assert_eq!(SourceCounters::get(&counters.reinits), 1);
        assert_eq!(steps.iter().filter(|s| **s == Step::Looped).count(), 5);
        assert_eq!(capture.grab_failures, 0);
    }

    #[test]
    fn test_restart_request_clears_queue_and_rewinds() {
        let source = ScriptedSource::new(10, 30.0);
        let (worker, mut capture) = new_loop(source, 30, 8);

        for _ in 0..4 {
            capture.step();
        }
        assert_eq!(capture.queue.len(), 4);

        worker.request_restart();
        assert!(capture.queue.is_empty());
        assert_eq!(capture.step(), Step::Looped);

        assert_eq!(capture.step(), Step::Decoded);
        assert_eq!(capture.queue.try_pop().unwrap().position, 0);
    }

    #[test]
    fn test_full_queue_backpressure() {
        let source = ScriptedSource::new(10, 30.0);
        let (_worker, mut capture) = new_loop(source, 30, 2);

        assert_eq!(capture.step(), Step::Decoded);
        assert_eq!(capture.step(), Step::Decoded);
        assert_eq!(capture.step(), Step::Backpressure);
        assert_eq!(capture.frame_index, 2);
    }

    #[test]
    fn test_update_fps_changes_ratio() {
        let source = ScriptedSource::new(10, 60.0);
        let (worker, _capture) = new_loop(source, 60, 8);
        assert_eq!(worker.skip_ratio(), 1);

        worker.update_fps(20);
        assert_eq!(worker.skip_ratio(), 3);
    }

    #[test]
    fn test_threaded_lifecycle() {
        let mut source = ScriptedSource::new(30, 30.0);
        source.decode_delay = Duration::from_millis(1);
        let queue = Arc::new(FrameQueue::new(8));
        let mut worker = CaptureWorker::new(Box::new(source), Arc::clone(&queue), 30, test_settings());

        worker.start().unwrap();
        assert!(worker.start().is_err());
        assert_eq!(worker.state(), CaptureState::Running);

        assert!(queue.pop_timeout(Duration::from_secs(2)).is_some());

        worker.pause();
        assert!(worker.is_paused());
        thread::sleep(Duration::from_millis(150));
        assert!(queue.is_empty());

        let buffered = worker.resume();
        assert!(buffered >= 4);
        assert_eq!(worker.state(), CaptureState::Running);

        assert!(worker.stop());
        assert!(worker.is_stopped());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_decode_finishing_after_pause_is_discarded() {
        let source = ScriptedSource::new(10, 30.0);
        let (worker, mut capture) = new_loop(source, 30, 4);

        worker.shared.set_state(CaptureState::Paused);
        assert_eq!(capture.step(), Step::Discarded);
        assert!(capture.queue.is_empty());
    }

    #[test]
    fn test_pause_discards_in_flight_frame() {
        let mut source = ScriptedSource::new(100, 30.0);
        source.decode_delay = Duration::from_millis(50);
        let queue = Arc::new(FrameQueue::new(4));
        let mut worker = CaptureWorker::new(Box::new(source), Arc::clone(&queue), 30, test_settings());
        worker.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !queue.is_full() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(queue.is_full());

        // Free a slot so the capture thread starts another slow decode, then pause mid-decode
        assert!(queue.try_pop().is_some());
        thread::sleep(Duration::from_millis(15));
        worker.pause();
        thread::sleep(Duration::from_millis(300));

        assert!(worker.is_paused());
        assert_eq!(queue.len(), 0);
        assert!(worker.stop());
    }

    #[test]
    fn test_worker_halts_after_repeated_errors() {
        let source = ScriptedSource::new(30, 30.0).with_errors((0..10).map(|_| Scripted::Backend));
        let queue = Arc::new(FrameQueue::new(8));
        let mut worker = CaptureWorker::new(Box::new(source), queue, 30, test_settings());
        worker.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !worker.is_stopped() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(worker.is_stopped());
        assert!(worker.stop());
    }
}
