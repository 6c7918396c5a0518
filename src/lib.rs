//! seqcache - image sequence discovery and frame cache
//!
//! Re-exports the main types for use by the binary and integration tests.

// Core engine (cache, orchestrator, events, player, workers)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod utils;

pub use crate::core::cache_man::CacheBudget;
pub use crate::core::event_bus::{downcast_event, BoxedEvent, EventBus};
pub use crate::core::frame_cache::{FrameCache, FrameKey, Weighted};
pub use crate::core::orchestrator::{CacheOrchestrator, Delivery, FrameReader, OrchestratorConfig};
pub use crate::core::player::Player;

pub use crate::entities::{FileInfo, FileType, Image, Sequence, Speed};
pub use crate::error::{DecodeError, ParseError, SeqError, SeqResult};
