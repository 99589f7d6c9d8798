//! Abstraction over the visual chat container.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a chat surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The chat interface could not be created or reached.
    #[error("chat interface unavailable: {0}")]
    Unavailable(String),

    /// A segment could not be rendered.
    #[error("failed to render segment: {0}")]
    Render(String),
}

/// One rendered unit of chat output: either a whole message or a single
/// revealed paragraph of one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatSegment {
    /// Text of the segment.
    pub text: String,
    /// Whether the segment belongs to a user-originated message.
    pub from_user: bool,
}

impl ChatSegment {
    /// Create a segment.
    #[must_use]
    pub fn new(text: impl Into<String>, from_user: bool) -> Self {
        Self {
            text: text.into(),
            from_user,
        }
    }
}

/// Where rendered chat output goes.
///
/// The real host backs this with the injected DOM container; tests and
/// headless embedders use [`MemorySurface`].
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Create the chat interface if it does not exist yet. Idempotent:
    /// repeated calls reuse the existing interface rather than creating
    /// duplicate containers.
    async fn ensure_interface(&self) -> Result<(), SurfaceError>;

    /// Append a segment to the display.
    async fn append(&self, segment: ChatSegment) -> Result<(), SurfaceError>;

    /// Enable or disable the input affordance.
    async fn set_input_enabled(&self, enabled: bool);
}

/// Headless surface recording everything in order.
pub struct MemorySurface {
    segments: Mutex<Vec<ChatSegment>>,
    interface_ready: AtomicBool,
    interfaces_created: AtomicUsize,
    input_enabled: AtomicBool,
}

impl MemorySurface {
    /// Create an empty surface with input enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            segments: Mutex::new(Vec::new()),
            interface_ready: AtomicBool::new(false),
            interfaces_created: AtomicUsize::new(0),
            input_enabled: AtomicBool::new(true),
        }
    }

    /// Snapshot of rendered segments in display order.
    #[must_use]
    pub fn segments(&self) -> Vec<ChatSegment> {
        self.segments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Segment texts in display order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.segments().into_iter().map(|s| s.text).collect()
    }

    /// How many times an interface was actually created (not merely
    /// re-checked).
    #[must_use]
    pub fn interfaces_created(&self) -> usize {
        self.interfaces_created.load(Ordering::SeqCst)
    }

    /// Current state of the input affordance.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::SeqCst)
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatSurface for MemorySurface {
    async fn ensure_interface(&self) -> Result<(), SurfaceError> {
        if !self.interface_ready.swap(true, Ordering::SeqCst) {
            self.interfaces_created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn append(&self, segment: ChatSegment) -> Result<(), SurfaceError> {
        if !self.interface_ready.load(Ordering::SeqCst) {
            return Err(SurfaceError::Unavailable("interface not created".into()));
        }
        self.segments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(segment);
        Ok(())
    }

    async fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_interface_is_idempotent() {
        let surface = MemorySurface::new();
        surface.ensure_interface().await.unwrap();
        surface.ensure_interface().await.unwrap();
        assert_eq!(surface.interfaces_created(), 1);
    }

    #[tokio::test]
    async fn test_append_requires_interface() {
        let surface = MemorySurface::new();
        let result = surface.append(ChatSegment::new("hi", true)).await;
        assert!(result.is_err());

        surface.ensure_interface().await.unwrap();
        surface.append(ChatSegment::new("hi", true)).await.unwrap();
        assert_eq!(surface.texts(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_input_toggle() {
        let surface = MemorySurface::new();
        assert!(surface.input_enabled());
        surface.set_input_enabled(false).await;
        assert!(!surface.input_enabled());
    }
}
