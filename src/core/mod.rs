//! Core engine modules - cache, orchestration, events, player, workers
//!
//! Independent of any front end; the CLI drives them from `main`.

pub mod cache_events;
pub mod cache_man;
pub mod event_bus;
pub mod frame_cache;
pub mod orchestrator;
pub mod player;
pub mod workers;

// Re-exports for convenience
pub use cache_man::CacheBudget;
pub use event_bus::EventBus;
pub use frame_cache::{CacheStats, FrameCache, FrameKey};
pub use orchestrator::{CacheOrchestrator, FrameStatus, Ticket};
pub use player::Player;
pub use workers::Workers;
