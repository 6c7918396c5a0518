//! Frame-rate pacing on top of a `CacheOrchestrator`
//!
//! # Timing Model
//!
//! Each frame has a fixed duration (`1/fps`). `tick(now)` is called from the
//! caller's loop as often as it likes and hands out at most one frame per
//! duration. If the next frame is not decoded yet the player holds the last
//! one (no skipping ahead) and counts the frame as late.
//!
//! At the end of the sequence the player either loops back to the first
//! frame or stops.

use log::{info, trace};
use std::time::Instant;

use crate::core::orchestrator::{CacheOrchestrator, Delivery};
use crate::entities::speed::{Speed, PRESETS};

/// Playback state over one clip
#[derive(Debug)]
pub struct Player {
    orch: CacheOrchestrator,
    speed: Speed,
    playing: bool,
    looping: bool,
    /// Time the last frame was handed out
    last_frame_time: Option<Instant>,
    /// Currently holding because the next frame is not ready
    waiting: bool,
    late_frames: u64,
    delivered: u64,
}

impl Player {
    pub fn new(orch: CacheOrchestrator) -> Self {
        let speed = orch.frames().speed();
        info!("Player initialized: {} frames at {} fps", orch.frames().len(), speed);
        Self {
            orch,
            speed,
            playing: false,
            looping: true,
            last_frame_time: None,
            waiting: false,
            late_frames: 0,
            delivered: 0,
        }
    }

    pub fn orchestrator(&self) -> &CacheOrchestrator {
        &self.orch
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Speed) {
        trace!("Speed {} -> {}", self.speed, speed);
        self.speed = speed;
    }

    /// Next faster preset, if any
    pub fn faster(&mut self) {
        let fps = self.speed.fps();
        if let Some(next) = PRESETS.iter().find(|p| p.fps() > fps + 1e-6) {
            self.set_speed(*next);
        }
    }

    /// Next slower preset, if any
    pub fn slower(&mut self) {
        let fps = self.speed.fps();
        if let Some(prev) = PRESETS.iter().rev().find(|p| p.fps() < fps - 1e-6) {
            self.set_speed(*prev);
        }
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Frames that were not ready when their time came
    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }

    /// Frames handed out since creation (skipped ones included)
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Start playing; the first play starts at the first frame
    pub fn play(&mut self) {
        if self.orch.cursor().is_none() || self.orch.at_end() {
            self.rewind();
        }
        self.playing = true;
        self.last_frame_time = None;
        trace!("Playback started");
    }

    pub fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.last_frame_time = None;
            trace!("Playback paused");
        }
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Jump to a frame; playback continues from there
    pub fn seek(&mut self, frame: i64) {
        self.orch.seek(frame);
        self.last_frame_time = None;
        self.waiting = false;
    }

    pub fn rewind(&mut self) {
        if let Some(first) = self.orch.frames().start() {
            self.seek(first);
        }
    }

    /// Advance playback to `now`; returns the frame to show, if a new one is due
    pub fn tick(&mut self, now: Instant) -> Option<Delivery> {
        if !self.playing {
            return None;
        }

        let due = match self.last_frame_time {
            Some(last) => now.duration_since(last) >= self.speed.frame_duration(),
            None => true,
        };
        if !due {
            return None;
        }

        if self.orch.at_end() {
            if self.looping {
                trace!("Frame loop: back to start");
                self.rewind();
            } else {
                trace!("Reached end, stopping");
                self.playing = false;
                return None;
            }
        }

        match self.orch.poll_next() {
            Some(delivery) => {
                self.last_frame_time = Some(now);
                self.waiting = false;
                self.delivered += 1;
                Some(delivery)
            }
            None => {
                if !self.waiting {
                    self.waiting = true;
                    self.late_frames += 1;
                    trace!("Frame {:?} not ready, holding", self.orch.cursor());
                }
                None
            }
        }
    }
}
