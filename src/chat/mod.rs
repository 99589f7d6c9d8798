//! Chat rendering: the queue state machine, paragraph pacing, the
//! rate-limit cool-down and the surface abstraction.
//!
//! The centerpiece is [`ChatController`], which serializes message
//! presentation so that only one message (or one paragraph-reveal
//! sequence) animates into the surface at a time, regardless of how many
//! producers enqueue concurrently.

pub mod controller;
pub mod paragraphs;
pub mod rate_limit;
pub mod surface;

pub use controller::{ChatController, PendingItem};
pub use paragraphs::{reveal_delay, split_paragraphs};
pub use rate_limit::RateLimitState;
pub use surface::{ChatSegment, ChatSurface, MemorySurface, SurfaceError};
