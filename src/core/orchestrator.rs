//! Read-ahead decode orchestration over a shared frame cache
//!
//! Each frame of a clip moves through
//! `NotRequested -> Decoding -> Cached` (or `Failed`). At most one decode per
//! frame is in flight: a second `request` while decoding attaches to the same
//! job and receives the same result.
//!
//! # Window
//!
//! `seek(frame)` moves the playback cursor and schedules every frame in
//! `[cursor - behind, cursor + ahead]` (counted in sequence positions, so gaps
//! are skipped). `poll_next` hands frames to the player strictly in order;
//! completions that arrive early wait in a reorder buffer.
//!
//! # Cancellation
//!
//! Running decodes are never interrupted. A job that is still queued when its
//! frame leaves the window releases the frame without decoding. A decode that
//! finishes outside the window and has no explicit requester is discarded.
//!
//! # Memory
//!
//! Frames waiting in the reorder buffer are held outside the cache budget.
//! Up to `ahead + 1` decoded images can stay alive there after the cache has
//! evicted them, until `poll_next`, `seek` or `set_window` releases them.
//!
//! # Locking
//!
//! State mutex first, cache mutex second. Events are emitted after both are
//! released, so callbacks may call back into the orchestrator.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, trace, warn};
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::core::cache_events::{FrameCached, FrameDiscarded, FrameFailed, FramesEvicted};
use crate::core::event_bus::EventBus;
use crate::core::frame_cache::{FrameCache, FrameKey};
use crate::core::workers::Workers;
use crate::entities::frame::Image;
use crate::entities::sequence::Sequence;
use crate::error::DecodeError;

type DecodeResult = Result<Image, DecodeError>;

/// Source of decoded frames for one clip
pub trait FrameReader: Send + Sync + 'static {
    fn read(&self, frame: i64) -> DecodeResult;
}

impl<F> FrameReader for F
where
    F: Fn(i64) -> DecodeResult + Send + Sync + 'static,
{
    fn read(&self, frame: i64) -> DecodeResult {
        self(frame)
    }
}

/// Read-ahead window in sequence positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub ahead: usize,
    pub behind: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { ahead: 24, behind: 2 }
    }
}

/// Per-frame decode state as seen from outside
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    NotRequested,
    Decoding,
    Cached,
    Failed(DecodeError),
}

/// Next frame for the player
#[derive(Debug, Clone)]
pub enum Delivery {
    Frame { frame: i64, image: Image },
    /// Frame failed to decode; playback moves past it
    Skipped { frame: i64, error: DecodeError },
}

impl Delivery {
    pub fn frame(&self) -> i64 {
        match self {
            Delivery::Frame { frame, .. } | Delivery::Skipped { frame, .. } => *frame,
        }
    }

    pub fn image(&self) -> Option<&Image> {
        match self {
            Delivery::Frame { image, .. } => Some(image),
            Delivery::Skipped { .. } => None,
        }
    }
}

/// Handle to the result of an explicit `request`
#[derive(Debug)]
pub struct Ticket {
    frame: i64,
    rx: Option<Receiver<DecodeResult>>,
    result: OnceCell<DecodeResult>,
}

impl Ticket {
    fn ready(frame: i64, result: DecodeResult) -> Self {
        Self {
            frame,
            rx: None,
            result: OnceCell::from(result),
        }
    }

    fn pending(frame: i64, rx: Receiver<DecodeResult>) -> Self {
        Self {
            frame,
            rx: Some(rx),
            result: OnceCell::new(),
        }
    }

    pub fn frame(&self) -> i64 {
        self.frame
    }

    /// Result if the decode has finished, without blocking
    pub fn try_result(&self) -> Option<DecodeResult> {
        if let Some(result) = self.result.get() {
            return Some(result.clone());
        }
        let rx = self.rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(DecodeError::Cancelled(self.frame)),
        };
        Some(self.result.get_or_init(|| result).clone())
    }

    /// Block until the decode finishes
    pub fn wait(self) -> DecodeResult {
        if let Some(result) = self.result.into_inner() {
            return result;
        }
        match self.rx {
            Some(rx) => rx.recv().unwrap_or(Err(DecodeError::Cancelled(self.frame))),
            None => Err(DecodeError::Cancelled(self.frame)),
        }
    }

    /// Block up to `timeout`; `None` if still decoding
    pub fn wait_timeout(&self, timeout: Duration) -> Option<DecodeResult> {
        if let Some(result) = self.try_result() {
            return Some(result);
        }
        let rx = self.rx.as_ref()?;
        let result = match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => return None,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(DecodeError::Cancelled(self.frame))
            }
        };
        Some(self.result.get_or_init(|| result).clone())
    }
}

/// Counters for monitoring
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    decodes: AtomicU64,
    coalesced: AtomicU64,
    discarded: AtomicU64,
    dropped_jobs: AtomicU64,
    failed: AtomicU64,
}

impl OrchestratorStats {
    /// Calls into the frame reader
    pub fn decodes(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Requests that attached to an in-flight decode
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Finished decodes thrown away because the frame left the window
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Queued jobs skipped before decoding
    pub fn dropped_jobs(&self) -> u64 {
        self.dropped_jobs.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

enum Slot {
    Decoding {
        waiters: Vec<Sender<DecodeResult>>,
        explicit: bool,
    },
    Failed(DecodeError),
}

struct State {
    slots: HashMap<i64, Slot>,
    /// Position in the sequence of the next frame to deliver; `len` = finished
    cursor: Option<usize>,
    generation: u64,
    window: OrchestratorConfig,
    reorder: BTreeMap<i64, Image>,
}

impl State {
    fn in_window(&self, pos: usize) -> bool {
        match self.cursor {
            Some(cursor) => {
                pos + self.window.behind >= cursor && pos <= cursor.saturating_add(self.window.ahead)
            }
            None => false,
        }
    }
}

struct Shared {
    clip: Uuid,
    sequence: Sequence,
    reader: Arc<dyn FrameReader>,
    cache: Arc<FrameCache<FrameKey, Image>>,
    events: EventBus,
    state: Mutex<State>,
    stats: OrchestratorStats,
}

/// Events produced under the lock, emitted after it is released
enum Outcome {
    Cached(FrameCached, Vec<FrameKey>),
    Failed(FrameFailed),
    Discarded(FrameDiscarded),
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key(&self, frame: i64) -> FrameKey {
        FrameKey::new(self.clip, frame)
    }

    fn in_window(&self, state: &State, frame: i64) -> bool {
        self.sequence
            .index_of(frame)
            .is_some_and(|pos| state.in_window(pos))
    }

    /// Worker-side entry point for one scheduled frame
    fn run_job(&self, frame: i64) {
        {
            let mut state = self.lock();
            let keep = match state.slots.get(&frame) {
                Some(Slot::Decoding { explicit, .. }) => *explicit || self.in_window(&state, frame),
                _ => false,
            };
            if !keep {
                if matches!(state.slots.get(&frame), Some(Slot::Decoding { .. })) {
                    state.slots.remove(&frame);
                }
                self.stats.dropped_jobs.fetch_add(1, Ordering::Relaxed);
                trace!("Dropping stale decode job for frame {}", frame);
                return;
            }
        }

        self.stats.decodes.fetch_add(1, Ordering::Relaxed);
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.reader.read(frame)))
            .unwrap_or_else(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(DecodeError::Panicked(msg))
            });
        self.complete(frame, result);
    }

    fn complete(&self, frame: i64, result: DecodeResult) {
        let (waiters, outcome) = {
            let mut state = self.lock();
            let (waiters, explicit) = match state.slots.remove(&frame) {
                Some(Slot::Decoding { waiters, explicit }) => (waiters, explicit),
                Some(failed @ Slot::Failed(_)) => {
                    state.slots.insert(frame, failed);
                    (Vec::new(), false)
                }
                None => (Vec::new(), false),
            };

            let outcome = match &result {
                Ok(image) => {
                    let in_window = self.in_window(&state, frame);
                    if explicit || in_window {
                        let evicted = self.cache.add(self.key(frame), image.clone());
                        let ahead_of_cursor = match (state.cursor, self.sequence.index_of(frame)) {
                            (Some(cursor), Some(pos)) => pos >= cursor,
                            _ => false,
                        };
                        if in_window && ahead_of_cursor {
                            state.reorder.insert(frame, image.clone());
                        }
                        Outcome::Cached(
                            FrameCached {
                                clip: self.clip,
                                frame,
                                bytes: image.mem(),
                            },
                            evicted,
                        )
                    } else {
                        self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                        Outcome::Discarded(FrameDiscarded { clip: self.clip, frame })
                    }
                }
                Err(error) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    state.slots.insert(frame, Slot::Failed(error.clone()));
                    Outcome::Failed(FrameFailed {
                        clip: self.clip,
                        frame,
                        error: error.clone(),
                    })
                }
            };
            (waiters, outcome)
        };

        for tx in waiters {
            // Receiver gone means the requester lost interest
            let _ = tx.send(result.clone());
        }

        match outcome {
            Outcome::Cached(event, evicted) => {
                trace!("Cached frame {}:{} ({} bytes)", event.clip, event.frame, event.bytes);
                self.events.emit(event);
                if !evicted.is_empty() {
                    self.events.emit(FramesEvicted(evicted));
                }
            }
            Outcome::Failed(event) => {
                warn!("Frame {} failed to decode: {}", event.frame, event.error);
                self.events.emit(event);
            }
            Outcome::Discarded(event) => {
                debug!("Discarded frame {} (outside window)", event.frame);
                self.events.emit(event);
            }
        }
    }
}

/// Decodes frames of one clip on a worker pool into a shared cache
pub struct CacheOrchestrator {
    shared: Arc<Shared>,
    workers: Arc<Workers>,
}

impl CacheOrchestrator {
    pub fn new(
        reader: Arc<dyn FrameReader>,
        sequence: Sequence,
        cache: Arc<FrameCache<FrameKey, Image>>,
        workers: Arc<Workers>,
        config: OrchestratorConfig,
    ) -> Self {
        let clip = Uuid::new_v4();
        debug!(
            "CacheOrchestrator {}: {} frames, window -{}/+{}",
            clip,
            sequence.len(),
            config.behind,
            config.ahead
        );
        Self {
            shared: Arc::new(Shared {
                clip,
                sequence,
                reader,
                cache,
                events: EventBus::new(),
                state: Mutex::new(State {
                    slots: HashMap::new(),
                    cursor: None,
                    generation: 0,
                    window: config,
                    reorder: BTreeMap::new(),
                }),
                stats: OrchestratorStats::default(),
            }),
            workers,
        }
    }

    /// Cache key namespace of this clip
    pub fn clip(&self) -> Uuid {
        self.shared.clip
    }

    pub fn frames(&self) -> &Sequence {
        &self.shared.sequence
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.shared.stats
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn window(&self) -> OrchestratorConfig {
        self.shared.lock().window
    }

    /// Frame `poll_next` will deliver next; `None` before the first seek or at the end
    pub fn cursor(&self) -> Option<i64> {
        let state = self.shared.lock();
        state.cursor.and_then(|pos| self.shared.sequence.frame_at(pos))
    }

    /// Every frame has been delivered
    pub fn at_end(&self) -> bool {
        self.shared.lock().cursor.is_some_and(|pos| pos >= self.shared.sequence.len())
    }

    pub fn status(&self, frame: i64) -> FrameStatus {
        let state = self.shared.lock();
        if self.shared.cache.contains(&self.shared.key(frame)) {
            return FrameStatus::Cached;
        }
        match state.slots.get(&frame) {
            Some(Slot::Decoding { .. }) => FrameStatus::Decoding,
            Some(Slot::Failed(error)) => FrameStatus::Failed(error.clone()),
            None => FrameStatus::NotRequested,
        }
    }

    /// Cached image, never waits for a decode
    pub fn get(&self, frame: i64) -> Option<Image> {
        self.shared.cache.get(&self.shared.key(frame))
    }

    /// Ask for a frame regardless of the window.
    ///
    /// Joins an in-flight decode if there is one. A frame in `Failed` is
    /// retried once per call.
    pub fn request(&self, frame: i64) -> Ticket {
        if !self.shared.sequence.contains(frame) {
            return Ticket::ready(frame, Err(DecodeError::NoSuchFrame(frame)));
        }

        let mut state = self.shared.lock();
        if let Some(image) = self.shared.cache.get(&self.shared.key(frame)) {
            return Ticket::ready(frame, Ok(image));
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        if let Some(Slot::Decoding { waiters, explicit }) = state.slots.get_mut(&frame) {
            waiters.push(tx);
            *explicit = true;
            self.shared.stats.coalesced.fetch_add(1, Ordering::Relaxed);
            trace!("Frame {} already decoding, attaching request", frame);
            return Ticket::pending(frame, rx);
        }

        // Not requested yet, or failed before: (re)start the decode
        state.slots.insert(
            frame,
            Slot::Decoding {
                waiters: vec![tx],
                explicit: true,
            },
        );
        drop(state);
        self.schedule(frame);
        Ticket::pending(frame, rx)
    }

    /// Move the playback cursor and start read-ahead around it.
    ///
    /// Seeking to a frame that is not part of the sequence lands on the next
    /// existing frame (or the last one). Returns the number of decodes queued.
    pub fn seek(&self, frame: i64) -> usize {
        let seq = &self.shared.sequence;
        if seq.is_empty() {
            return 0;
        }
        let pos = match seq.frames().binary_search(&frame) {
            Ok(pos) => pos,
            Err(pos) => pos.min(seq.len() - 1),
        };

        let scheduled = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.cursor = Some(pos);
            state.reorder.clear();
            debug!(
                "Seek to frame {:?} (generation {})",
                seq.frame_at(pos),
                state.generation
            );
            self.claim_window(&mut state)
        };
        let count = scheduled.len();
        for frame in scheduled {
            self.schedule(frame);
        }
        count
    }

    /// Resize the read-ahead window; newly covered frames are scheduled
    pub fn set_window(&self, ahead: usize, behind: usize) {
        let scheduled = {
            let mut state = self.shared.lock();
            state.window = OrchestratorConfig { ahead, behind };
            let cursor = state.cursor;
            let sequence = &self.shared.sequence;
            state.reorder.retain(|frame, _| {
                match (cursor, sequence.index_of(*frame)) {
                    (Some(c), Some(p)) => p >= c && p <= c.saturating_add(ahead),
                    _ => false,
                }
            });
            self.claim_window(&mut state)
        };
        for frame in scheduled {
            self.schedule(frame);
        }
    }

    /// Next frame in playback order, if it is ready
    pub fn poll_next(&self) -> Option<Delivery> {
        let (delivery, scheduled) = {
            let mut state = self.shared.lock();
            let pos = state.cursor?;
            let frame = self.shared.sequence.frame_at(pos)?;

            let delivery = if let Some(image) = state.reorder.remove(&frame) {
                Some(Delivery::Frame { frame, image })
            } else if let Some(image) = self.shared.cache.get(&self.shared.key(frame)) {
                Some(Delivery::Frame { frame, image })
            } else if let Some(Slot::Failed(error)) = state.slots.get(&frame) {
                Some(Delivery::Skipped {
                    frame,
                    error: error.clone(),
                })
            } else {
                None
            };

            if delivery.is_some() {
                state.cursor = Some(pos + 1);
            }
            // Refill the window; also re-queues the current frame if it was evicted
            (delivery, self.claim_window(&mut state))
        };

        for frame in scheduled {
            self.schedule(frame);
        }
        delivery
    }

    /// Mark window frames with no state as decoding; returns them in priority order
    fn claim_window(&self, state: &mut State) -> Vec<i64> {
        let Some(cursor) = state.cursor else {
            return Vec::new();
        };
        let seq = &self.shared.sequence;
        let last = seq.len().saturating_sub(1);
        let ahead = (cursor..=cursor.saturating_add(state.window.ahead).min(last)).filter(|&p| p < seq.len());
        let behind = (cursor.saturating_sub(state.window.behind)..cursor).rev();

        let mut claimed = Vec::new();
        for pos in ahead.chain(behind) {
            let Some(frame) = seq.frame_at(pos) else {
                continue;
            };
            if state.slots.contains_key(&frame)
                || state.reorder.contains_key(&frame)
                || self.shared.cache.contains(&self.shared.key(frame))
            {
                continue;
            }
            state.slots.insert(
                frame,
                Slot::Decoding {
                    waiters: Vec::new(),
                    explicit: false,
                },
            );
            claimed.push(frame);
        }
        claimed
    }

    fn schedule(&self, frame: i64) {
        let shared = Arc::clone(&self.shared);
        self.workers.execute(move || shared.run_job(frame));
    }
}

impl std::fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("clip", &self.shared.clip)
            .field("frames", &self.shared.sequence.len())
            .field("workers", &self.workers.threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache_man::CacheBudget;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn setup(
        reader: impl FrameReader,
        frames: std::ops::RangeInclusive<i64>,
        config: OrchestratorConfig,
    ) -> CacheOrchestrator {
        let cache = Arc::new(FrameCache::new(CacheBudget::Items(100)));
        let workers = Arc::new(Workers::new(2).unwrap());
        CacheOrchestrator::new(
            Arc::new(reader),
            Sequence::from_range(*frames.start(), *frames.end(), 4),
            cache,
            workers,
            config,
        )
    }

    fn tiny(_frame: i64) -> DecodeResult {
        Ok(Image::solid(2, 2, [0, 0, 0, 255]))
    }

    /// Poll until a delivery arrives or the deadline passes
    fn next(orch: &CacheOrchestrator) -> Option<Delivery> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(d) = orch.poll_next() {
                return Some(d);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_request_decodes_and_caches() {
        let orch = setup(tiny, 1..=10, OrchestratorConfig::default());
        assert_eq!(orch.status(3), FrameStatus::NotRequested);
        let image = orch.request(3).wait().unwrap();
        assert_eq!(image.resolution(), (2, 2));
        assert_eq!(orch.status(3), FrameStatus::Cached);
        assert!(orch.get(3).is_some());
        // Cached: answered without another decode
        assert!(orch.request(3).try_result().unwrap().is_ok());
        assert_eq!(orch.stats().decodes(), 1);
    }

    #[test]
    fn test_unknown_frame() {
        let orch = setup(tiny, 1..=10, OrchestratorConfig::default());
        let err = orch.request(42).wait().unwrap_err();
        assert_eq!(err, DecodeError::NoSuchFrame(42));
    }

    #[test]
    fn test_failure_then_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let reader = move |frame: i64| {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DecodeError::Image(format!("corrupt frame {}", frame)))
            } else {
                tiny(frame)
            }
        };
        let orch = setup(reader, 1..=3, OrchestratorConfig::default());
        assert!(orch.request(2).wait().is_err());
        assert!(matches!(orch.status(2), FrameStatus::Failed(_)));
        assert!(orch.request(2).wait().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_becomes_failed() {
        let reader = |frame: i64| -> DecodeResult {
            if frame == 2 {
                panic!("codec exploded");
            }
            tiny(frame)
        };
        let orch = setup(reader, 1..=3, OrchestratorConfig::default());
        let err = orch.request(2).wait().unwrap_err();
        assert!(matches!(err, DecodeError::Panicked(ref m) if m.contains("exploded")));
        assert!(orch.request(3).wait().is_ok());
    }

    #[test]
    fn test_in_order_delivery_with_skips() {
        let reader = |frame: i64| -> DecodeResult {
            // Later frames finish first
            std::thread::sleep(Duration::from_millis((10 - frame as u64) * 2));
            if frame == 4 {
                Err(DecodeError::Image("bad".into()))
            } else {
                tiny(frame)
            }
        };
        let orch = setup(reader, 1..=6, OrchestratorConfig { ahead: 10, behind: 0 });
        orch.seek(1);
        let mut seen = Vec::new();
        while let Some(d) = next(&orch) {
            seen.push((d.frame(), d.image().is_some()));
            if orch.at_end() {
                break;
            }
        }
        assert_eq!(
            seen,
            vec![(1, true), (2, true), (3, true), (4, false), (5, true), (6, true)]
        );
        assert!(orch.poll_next().is_none());
    }

    #[test]
    fn test_reorder_outlives_cache_budget() {
        let cache = Arc::new(FrameCache::new(CacheBudget::Items(1)));
        let orch = CacheOrchestrator::new(
            Arc::new(tiny),
            Sequence::from_range(1, 8, 0),
            Arc::clone(&cache),
            Arc::new(Workers::new(2).unwrap()),
            OrchestratorConfig { ahead: 3, behind: 0 },
        );
        assert_eq!(orch.seek(1), 4);
        let deadline = Instant::now() + Duration::from_secs(5);
        while orch.shared.lock().reorder.len() < 4 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(orch.shared.lock().reorder.len(), 4);
        assert_eq!(cache.len(), 1);

        // Evicted frames are still handed out from the reorder buffer
        for frame in 1..=4 {
            let d = next(&orch).unwrap();
            assert_eq!(d.frame(), frame);
            assert!(d.image().is_some());
        }

        orch.seek(8);
        assert!(orch.shared.lock().reorder.len() <= 1);
    }

    #[test]
    fn test_seek_bumps_generation_and_snaps() {
        let orch = setup(tiny, 1..=10, OrchestratorConfig { ahead: 2, behind: 1 });
        assert_eq!(orch.generation(), 0);
        assert_eq!(orch.seek(5), 4);
        assert_eq!(orch.generation(), 1);
        assert_eq!(orch.cursor(), Some(5));
        orch.seek(100);
        assert_eq!(orch.cursor(), Some(10));
    }

    #[test]
    fn test_events_reported() {
        let orch = setup(tiny, 1..=3, OrchestratorConfig::default());
        orch.request(1).wait().unwrap();
        // Event is emitted right after waiters are released
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut cached = Vec::new();
        while cached.is_empty() && Instant::now() < deadline {
            cached = orch.events().poll_of::<FrameCached>();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].frame, 1);
        assert_eq!(cached[0].clip, orch.clip());
    }
}
