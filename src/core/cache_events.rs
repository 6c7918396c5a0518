//! Decode and cache events.

use uuid::Uuid;

use crate::core::frame_cache::FrameKey;
use crate::error::DecodeError;

// === Decode results ===

/// Frame decoded and inserted into the cache
#[derive(Clone, Debug, PartialEq)]
pub struct FrameCached {
    pub clip: Uuid,
    pub frame: i64,
    pub bytes: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameFailed {
    pub clip: Uuid,
    pub frame: i64,
    pub error: DecodeError,
}

/// Decode finished after the frame left the read-ahead window; result dropped
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDiscarded {
    pub clip: Uuid,
    pub frame: i64,
}

// === Cache ===

#[derive(Clone, Debug, PartialEq)]
pub struct FramesEvicted(pub Vec<FrameKey>);
